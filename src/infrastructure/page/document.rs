#[cfg(test)]
#[path = "document_test.rs"]
mod tests;

use std::collections::BTreeMap;

use serde_json::Value;

/// Handle to an element owned by a [`Document`]. Handles are never reused, so
/// a detached element keeps its handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickAction {
    /// Hide the chat pill and open the assistant iframe.
    OpenAssistant,
}

/// The window living inside an iframe. Messages are only delivered when the
/// sender targets this window's origin, or `*`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContentWindow {
    origin: String,
    inbox: Vec<Value>,
}

impl ContentWindow {
    pub fn new(origin: &str) -> ContentWindow {
        return ContentWindow {
            origin: origin.to_string(),
            inbox: vec![],
        };
    }

    pub fn origin(&self) -> &str {
        return &self.origin;
    }

    pub fn post_message(&mut self, message: Value, target_origin: &str) -> bool {
        if target_origin != "*" && target_origin != self.origin {
            tracing::trace!(
                target_origin = target_origin,
                origin = self.origin,
                "Dropped message for mismatched origin"
            );
            return false;
        }

        self.inbox.push(message);
        return true;
    }

    pub fn messages(&self) -> &[Value] {
        return &self.inbox;
    }

    pub fn drain(&mut self) -> Vec<Value> {
        return std::mem::take(&mut self.inbox);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DocumentEvent {
    pub name: String,
    pub detail: Value,
}

#[derive(Clone, Debug)]
pub struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    text: String,
    inner_html: Option<String>,
    children: Vec<ElementId>,
    parent: Option<ElementId>,
    on_click: Option<ClickAction>,
    content_window: Option<ContentWindow>,
}

impl Element {
    fn new(tag: &str) -> Element {
        return Element {
            tag: tag.to_lowercase(),
            attributes: BTreeMap::new(),
            style: BTreeMap::new(),
            text: "".to_string(),
            inner_html: None,
            children: vec![],
            parent: None,
            on_click: None,
            content_window: None,
        };
    }

    pub fn tag(&self) -> &str {
        return &self.tag;
    }

    pub fn id(&self) -> &str {
        return self.attribute("id").unwrap_or("");
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        return self.attributes.get(name).map(|e| return e.as_str());
    }

    pub fn has_class(&self, class: &str) -> bool {
        return self
            .attribute("class")
            .map(|classes| return classes.split_whitespace().any(|e| return e == class))
            .unwrap_or(false);
    }

    /// Mirrors `element.style.<prop>`: unset properties read as an empty
    /// string.
    pub fn style(&self, property: &str) -> &str {
        return self.style.get(property).map(|e| return e.as_str()).unwrap_or("");
    }

    pub fn text(&self) -> &str {
        return &self.text;
    }

    pub fn inner_html(&self) -> Option<&str> {
        return self.inner_html.as_deref();
    }

    pub fn children(&self) -> &[ElementId] {
        return &self.children;
    }

    pub fn parent(&self) -> Option<ElementId> {
        return self.parent;
    }

    pub fn on_click(&self) -> Option<ClickAction> {
        return self.on_click;
    }

    pub fn content_window(&self) -> Option<&ContentWindow> {
        return self.content_window.as_ref();
    }

    pub fn content_window_mut(&mut self) -> Option<&mut ContentWindow> {
        return self.content_window.as_mut();
    }
}

/// Minimal host document: the subset of the DOM the widget reads and writes.
#[derive(Clone, Debug)]
pub struct Document {
    elements: Vec<Element>,
    body: ElementId,
    events: Vec<DocumentEvent>,
}

impl Default for Document {
    fn default() -> Document {
        return Document {
            elements: vec![Element::new("body")],
            body: ElementId(0),
            events: vec![],
        };
    }
}

impl Document {
    pub fn body(&self) -> ElementId {
        return self.body;
    }

    pub fn create_element(&mut self, tag: &str) -> ElementId {
        self.elements.push(Element::new(tag));
        return ElementId(self.elements.len() - 1);
    }

    pub fn element(&self, id: ElementId) -> &Element {
        return &self.elements[id.0];
    }

    pub fn element_mut(&mut self, id: ElementId) -> &mut Element {
        return &mut self.elements[id.0];
    }

    pub fn append_child(&mut self, parent: ElementId, child: ElementId) {
        self.detach(child);
        self.elements[child.0].parent = Some(parent);
        self.elements[parent.0].children.push(child);
    }

    fn detach(&mut self, child: ElementId) {
        if let Some(old_parent) = self.elements[child.0].parent.take() {
            self.elements[old_parent.0]
                .children
                .retain(|e| return *e != child);
        }
    }

    pub fn is_connected(&self, id: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(el) = current {
            if el == self.body {
                return true;
            }
            current = self.elements[el.0].parent;
        }

        return false;
    }

    /// Pre-order walk of every element below `root`, excluding `root`.
    pub fn descendants(&self, root: ElementId) -> Vec<ElementId> {
        let mut res = vec![];
        let mut stack: Vec<ElementId> = self.elements[root.0]
            .children
            .iter()
            .rev()
            .copied()
            .collect();

        while let Some(el) = stack.pop() {
            res.push(el);
            stack.extend(self.elements[el.0].children.iter().rev().copied());
        }

        return res;
    }

    /// Finds the first connected element carrying the given `id` attribute.
    pub fn get_element_by_id(&self, id: &str) -> Option<ElementId> {
        return self.query_descendant_by_id(self.body, id);
    }

    pub fn query_descendant_by_id(&self, root: ElementId, id: &str) -> Option<ElementId> {
        if id.is_empty() {
            return None;
        }

        return self
            .descendants(root)
            .into_iter()
            .find(|e| return self.element(*e).id() == id);
    }

    pub fn query_descendant_by_tag(&self, root: ElementId, tag: &str) -> Option<ElementId> {
        let tag = tag.to_lowercase();
        return self
            .descendants(root)
            .into_iter()
            .find(|e| return self.element(*e).tag == tag);
    }

    pub fn count_by_id(&self, id: &str) -> usize {
        return self
            .descendants(self.body)
            .iter()
            .filter(|e| return self.element(**e).id() == id)
            .count();
    }

    /// Nearest ancestor-or-self matching `predicate`.
    pub fn closest<F>(&self, id: ElementId, predicate: F) -> Option<ElementId>
    where
        F: Fn(&Element) -> bool,
    {
        let mut current = Some(id);
        while let Some(el) = current {
            if predicate(self.element(el)) {
                return Some(el);
            }
            current = self.elements[el.0].parent;
        }

        return None;
    }

    pub fn set_attribute(&mut self, id: ElementId, name: &str, value: &str) {
        self.elements[id.0]
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    /// Setting a property to an empty string clears it, as with inline
    /// styles in the browser.
    pub fn set_style(&mut self, id: ElementId, property: &str, value: &str) {
        let style = &mut self.elements[id.0].style;
        if value.is_empty() {
            style.remove(property);
            return;
        }

        style.insert(property.to_string(), value.to_string());
    }

    pub fn style(&self, id: ElementId, property: &str) -> &str {
        return self.element(id).style(property);
    }

    pub fn set_text(&mut self, id: ElementId, text: &str) {
        self.elements[id.0].text = text.to_string();
    }

    /// Replaces the element's subtree with opaque markup.
    pub fn set_inner_html(&mut self, id: ElementId, html: &str) {
        let children = std::mem::take(&mut self.elements[id.0].children);
        for child in children {
            self.elements[child.0].parent = None;
        }
        self.elements[id.0].inner_html = Some(html.to_string());
    }

    pub fn set_on_click(&mut self, id: ElementId, action: ClickAction) {
        self.elements[id.0].on_click = Some(action);
    }

    /// Click handlers are resolved the way a bubbling click would: the
    /// nearest ancestor-or-self with a handler wins.
    pub fn click_target(&self, id: ElementId) -> Option<ClickAction> {
        return self
            .closest(id, |e| return e.on_click.is_some())
            .and_then(|e| return self.element(e).on_click);
    }

    pub fn attach_content_window(&mut self, id: ElementId, origin: &str) {
        self.elements[id.0].content_window = Some(ContentWindow::new(origin));
    }

    pub fn detach_content_window(&mut self, id: ElementId) {
        self.elements[id.0].content_window = None;
    }

    pub fn dispatch_event(&mut self, name: &str, detail: Value) {
        self.events.push(DocumentEvent {
            name: name.to_string(),
            detail,
        });
    }

    pub fn events(&self) -> &[DocumentEvent] {
        return &self.events;
    }

    /// Serializes an element and its subtree. Attributes and styles are
    /// emitted in sorted order so output is stable.
    pub fn outer_html(&self, id: ElementId) -> String {
        let el = self.element(id);
        let mut attrs = el
            .attributes
            .iter()
            .map(|(k, v)| return format!(" {k}=\"{v}\""))
            .collect::<Vec<String>>()
            .join("");

        if !el.style.is_empty() {
            let style = el
                .style
                .iter()
                .map(|(k, v)| return format!("{k}:{v}"))
                .collect::<Vec<String>>()
                .join(";");
            attrs += &format!(" style=\"{style}\"");
        }

        if el.tag == "img" {
            return format!("<img{attrs} />");
        }

        let mut inner = el.text.to_string();
        if let Some(html) = &el.inner_html {
            inner += html;
        }
        for child in &el.children {
            inner += &self.outer_html(*child);
        }

        return format!("<{tag}{attrs}>{inner}</{tag}>", tag = el.tag);
    }
}
