#[cfg(test)]
#[path = "layout_test.rs"]
mod tests;

use crate::domain::models::Position;
use crate::infrastructure::page::ClickAction;
use crate::infrastructure::page::Document;
use crate::infrastructure::page::ElementId;

/// Both ids are relied upon by the assistant's own stylesheet.
pub const WRAPPER_ID: &str = "alphablocks-assistant-container";
pub const PILL_ID: &str = "alphablocks-chat-icon-container";

pub const WRAPPER_Z_INDEX: &str = "2147480000";
pub const DESKTOP_MARGIN: &str = "24px";
pub const MOBILE_MARGIN: &str = "16px";

pub struct PillMarkup<'a> {
    pub name: &'a str,
    pub avatar: &'a str,
    pub bg_color: &'a str,
    pub text_color: &'a str,
}

pub struct Layout {}

impl Layout {
    pub fn wrapper(doc: &Document) -> Option<ElementId> {
        return doc.get_element_by_id(WRAPPER_ID);
    }

    /// Returns the fixed-position wrapper, creating it bottom-right if the
    /// page does not have one yet.
    pub fn ensure_wrapper(doc: &mut Document) -> ElementId {
        if let Some(wrapper) = Layout::wrapper(doc) {
            return wrapper;
        }

        let wrapper = doc.create_element("div");
        doc.set_attribute(wrapper, "id", WRAPPER_ID);
        doc.set_style(wrapper, "position", "fixed");
        doc.set_style(wrapper, "right", DESKTOP_MARGIN);
        doc.set_style(wrapper, "bottom", DESKTOP_MARGIN);
        let body = doc.body();
        doc.append_child(body, wrapper);

        tracing::debug!("Created assistant wrapper");
        return wrapper;
    }

    /// Anchors the wrapper horizontally. `edge_offset` is the distance kept
    /// from whichever side the wrapper is anchored to.
    pub fn apply_position(
        doc: &mut Document,
        wrapper: ElementId,
        position: Position,
        edge_offset: &str,
    ) {
        doc.set_style(wrapper, "left", "");
        doc.set_style(wrapper, "right", "");
        doc.set_style(wrapper, "transform", "");

        match position {
            Position::BottomLeft => {
                doc.set_style(wrapper, "left", edge_offset);
            }
            Position::BottomCenter => {
                doc.set_style(wrapper, "left", "50%");
                doc.set_style(wrapper, "transform", "translateX(-50%)");
            }
            Position::Default => {
                doc.set_style(wrapper, "right", edge_offset);
            }
        }
    }

    pub fn pill(doc: &Document) -> Option<ElementId> {
        return doc.get_element_by_id(PILL_ID);
    }

    /// Appends the chat pill under `container`. Returns `None` without
    /// touching the document if the container already holds one.
    pub fn render_pill(
        doc: &mut Document,
        container: ElementId,
        markup: &PillMarkup,
    ) -> Option<ElementId> {
        if doc.query_descendant_by_id(container, PILL_ID).is_some() {
            return None;
        }

        let pill = doc.create_element("div");
        doc.set_attribute(pill, "id", PILL_ID);

        let button = doc.create_element("button");
        doc.set_attribute(button, "class", "alphablocks-chat-icon-btn");
        doc.set_style(button, "background-color", markup.bg_color);

        let avatar = doc.create_element("img");
        doc.set_attribute(avatar, "class", "alphablocks-chat-icon-avatar");
        doc.set_attribute(avatar, "src", markup.avatar);

        let label = doc.create_element("p");
        doc.set_attribute(label, "class", "alphablocks-chat-icon-name");
        doc.set_style(label, "color", markup.text_color);
        doc.set_text(label, markup.name);

        doc.append_child(button, avatar);
        doc.append_child(button, label);
        doc.append_child(pill, button);
        doc.append_child(container, pill);
        doc.set_on_click(pill, ClickAction::OpenAssistant);

        return Some(pill);
    }

    pub fn show(doc: &mut Document, el: ElementId) {
        doc.set_style(el, "display", "block");
    }

    pub fn hide(doc: &mut Document, el: ElementId) {
        doc.set_style(el, "display", "none");
    }

    pub fn raise(doc: &mut Document, wrapper: ElementId) {
        doc.set_style(wrapper, "z-index", WRAPPER_Z_INDEX);
    }
}
