#[cfg(test)]
#[path = "iframe_test.rs"]
mod tests;

use anyhow::Result;
use reqwest::Url;

use super::layout::Layout;
use super::layout::DESKTOP_MARGIN;
use super::layout::MOBILE_MARGIN;
use crate::domain::models::CustomOffsets;
use crate::domain::models::OutboundMessage;
use crate::domain::models::Position;
use crate::domain::models::ResizeRequest;
use crate::infrastructure::page::Document;
use crate::infrastructure::page::ElementId;
use crate::infrastructure::page::Page;

/// Viewports at or below this width get the mobile margins.
pub const MOBILE_BREAKPOINT: u32 = 500;

/// `event` value on a resize that asks for an edge-to-edge frame on small
/// screens.
pub const MOBILE_NUDGE_EVENT: &str = "mobile-nudge";

pub const ASK_ASA_PARAM: &str = "ask_asa";
pub const QUERY_PARAM: &str = "query";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameVersion {
    /// Pill-sized launcher frame.
    Compact,
    /// Full chat window.
    Expanded,
}

impl FrameVersion {
    pub fn number(&self) -> u8 {
        return match self {
            FrameVersion::Compact => 1,
            FrameVersion::Expanded => 2,
        };
    }
}

/// Where the wrapper is anchored and any host overrides, carried across
/// resizes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WrapperLayout {
    pub position: Position,
    pub offsets: CustomOffsets,
}

pub struct IFrameManager {
    chatbot_url: String,
    origin: String,
}

impl IFrameManager {
    pub fn new(chatbot_url: &str) -> IFrameManager {
        let chatbot_url = chatbot_url.trim_end_matches('/').to_string();
        let origin = match Url::parse(&chatbot_url) {
            Ok(url) => url.origin().ascii_serialization(),
            Err(err) => {
                tracing::warn!(error = ?err, url = chatbot_url.as_str(), "Unparseable chatbot URL");
                chatbot_url.to_string()
            }
        };

        return IFrameManager {
            chatbot_url,
            origin,
        };
    }

    /// Origin every outbound message is scoped to.
    pub fn origin(&self) -> &str {
        return &self.origin;
    }

    pub fn frame_url(&self, token: &str, version: FrameVersion, theme: &str) -> String {
        return format!(
            "{url}/?token={token}&version={version}&theme={theme}",
            url = self.chatbot_url,
            version = version.number()
        );
    }

    /// Bands are measured in UTF-16 code units, the way the page measures
    /// the name.
    pub fn compact_width(name: &str) -> &'static str {
        let len = name.encode_utf16().count();
        if len <= 7 {
            return "120px";
        }
        if len <= 15 {
            return "170px";
        }

        return "235px";
    }

    /// Builds a detached iframe sized for `version`. Later resize messages
    /// from the assistant take over the sizing.
    pub fn create_iframe(
        &self,
        doc: &mut Document,
        token: &str,
        theme: &str,
        name: &str,
        version: FrameVersion,
    ) -> ElementId {
        let iframe = doc.create_element("iframe");
        doc.set_attribute(iframe, "src", &self.frame_url(token, version, theme));
        doc.set_attribute(iframe, "allow", "microphone");

        let (width, height) = match version {
            FrameVersion::Compact => (IFrameManager::compact_width(name), "60px"),
            FrameVersion::Expanded => ("562px", "545px"),
        };
        doc.set_style(iframe, "width", width);
        doc.set_style(iframe, "height", height);
        doc.set_style(iframe, "border", "none");
        doc.set_style(iframe, "background", "transparent");
        doc.attach_content_window(iframe, &self.origin);

        return iframe;
    }

    /// Re-points an existing frame, re-applying the current token and theme.
    pub fn refresh(
        &self,
        doc: &mut Document,
        iframe: ElementId,
        token: &str,
        theme: &str,
        version: FrameVersion,
    ) {
        doc.set_attribute(iframe, "src", &self.frame_url(token, version, theme));
    }

    /// Posts `message` into the frame, scoped to the assistant origin.
    /// Returns false when there is no frame or it has no content window.
    pub fn post(
        &self,
        doc: &mut Document,
        iframe: Option<ElementId>,
        message: &OutboundMessage,
    ) -> Result<bool> {
        let iframe = match iframe {
            Some(iframe) => iframe,
            None => return Ok(false),
        };

        let window = match doc.element_mut(iframe).content_window_mut() {
            Some(window) => window,
            None => return Ok(false),
        };

        let value = serde_json::to_value(message)?;
        return Ok(window.post_message(value, &self.origin));
    }

    pub fn has_content_window(doc: &Document, iframe: Option<ElementId>) -> bool {
        return iframe
            .map(|e| return doc.element(e).content_window().is_some())
            .unwrap_or(false);
    }

    /// Applies assistant-requested dimensions and re-derives the wrapper
    /// offsets. Returns false when the request was ignored.
    ///
    /// Offset precedence, lowest first: breakpoint margin, frame supplied
    /// offsets on mobile, host custom offsets. The mobile nudge and then the
    /// docked layout override all of it.
    pub fn set_iframe_size(
        &self,
        page: &mut Page,
        iframe: Option<ElementId>,
        request: &ResizeRequest,
        layout: &WrapperLayout,
    ) -> bool {
        let iframe = match iframe {
            Some(iframe) => iframe,
            None => return false,
        };
        let (width, height) = match request.dimensions() {
            Some(dimensions) => dimensions,
            None => return false,
        };

        let mobile = page.window.inner_width <= MOBILE_BREAKPOINT;
        let doc = &mut page.document;
        let wrapper = Layout::ensure_wrapper(doc);

        doc.set_style(iframe, "width", width);
        doc.set_style(iframe, "height", height);
        doc.set_style(wrapper, "width", "fit-content");
        doc.set_style(wrapper, "height", "fit-content");

        let margin = if mobile { MOBILE_MARGIN } else { DESKTOP_MARGIN };
        let mut edge = margin.to_string();
        let mut bottom = margin.to_string();

        if mobile {
            doc.set_style(wrapper, "width", width);
            if let (Some(right), Some(req_bottom)) = (&request.right, &request.bottom) {
                edge = right.to_string();
                bottom = req_bottom.to_string();
            }
        }

        if let Some(right) = &layout.offsets.right {
            edge = right.to_string();
        }
        if let Some(custom_bottom) = &layout.offsets.bottom {
            bottom = custom_bottom.to_string();
        }

        Layout::apply_position(doc, wrapper, layout.position, &edge);
        doc.set_style(wrapper, "bottom", &bottom);

        if request.event.as_deref() == Some(MOBILE_NUDGE_EVENT) {
            doc.set_style(iframe, "width", "100%");
            doc.set_style(wrapper, "right", "");
            doc.set_style(wrapper, "transform", "");
            doc.set_style(wrapper, "left", "0px");
            doc.set_style(wrapper, "width", "100%");
            return true;
        }

        if request.is_docked() {
            doc.set_style(wrapper, "transform", "");
            doc.set_style(wrapper, "right", request.right.as_deref().unwrap_or(""));
            doc.set_style(wrapper, "left", request.left.as_deref().unwrap_or(""));
            doc.set_style(wrapper, "bottom", request.bottom.as_deref().unwrap_or(""));
            doc.set_style(wrapper, "width", "100%");
            doc.set_style(wrapper, "height", "100%");
        }

        return true;
    }

    pub fn send_original_window_message(
        &self,
        page: &mut Page,
        iframe: Option<ElementId>,
    ) -> Result<bool> {
        let message = OutboundMessage::OriginalSize {
            width: page.window.inner_width,
            height: page.window.inner_height,
        };

        return self.post(&mut page.document, iframe, &message);
    }

    /// Hides the frame and brings the pill back. Returns whether a pill was
    /// revealed.
    pub fn hide_iframe(doc: &mut Document, iframe: Option<ElementId>) -> bool {
        let iframe = match iframe {
            Some(iframe) => iframe,
            None => return false,
        };
        Layout::hide(doc, iframe);

        if let Some(pill) = Layout::pill(doc) {
            Layout::show(doc, pill);
            return true;
        }

        return false;
    }

    /// Hands the page path and one-shot query flags to the assistant, and
    /// strips those flags from the visible URL so a refresh does not replay
    /// them.
    pub fn send_parent_url_params(
        &self,
        page: &mut Page,
        iframe: Option<ElementId>,
        session_cookie: &str,
    ) -> Result<bool> {
        let mut url = Url::parse(page.location.href())?;

        let mut ask_asa = false;
        let mut query = "".to_string();
        let mut kept: Vec<(String, String)> = vec![];
        for (k, v) in url.query_pairs() {
            match &*k {
                ASK_ASA_PARAM => ask_asa = v == "true",
                QUERY_PARAM => query = v.to_string(),
                _ => kept.push((k.to_string(), v.to_string())),
            }
        }
        let url_path = url.path().to_string();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
        page.location.replace_state(url.as_str());

        let message = OutboundMessage::ParentUrl {
            ask_asa,
            query,
            url_path,
            session_cookie: session_cookie.to_string(),
        };

        return self.post(&mut page.document, iframe, &message);
    }
}
