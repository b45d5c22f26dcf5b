mod cookies;
mod document;
mod window;

pub use cookies::*;
pub use document::*;
pub use window::*;

/// Everything the widget can touch on the host page.
#[derive(Debug)]
pub struct Page {
    pub document: Document,
    pub window: Window,
    pub location: Location,
    pub cookies: CookieJar,
    pub session_storage: SessionStorage,
}

impl Page {
    pub fn new(href: &str, inner_width: u32, inner_height: u32) -> Page {
        return Page {
            document: Document::default(),
            window: Window::new(inner_width, inner_height),
            location: Location::new(href),
            cookies: CookieJar::default(),
            session_storage: SessionStorage::default(),
        };
    }

    /// Adds an empty `<div id="...">` to the body, the usual mount point for
    /// the chat pill.
    pub fn add_container(&mut self, id: &str) -> ElementId {
        let el = self.document.create_element("div");
        self.document.set_attribute(el, "id", id);
        let body = self.document.body();
        self.document.append_child(body, el);
        return el;
    }
}

impl Default for Page {
    fn default() -> Page {
        return Page::new("http://localhost/", 1280, 800);
    }
}
