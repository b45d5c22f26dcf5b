use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::mpsc;

/// Top-level host window. Every registered listener receives every message
/// posted to the window.
#[derive(Debug)]
pub struct Window {
    pub inner_width: u32,
    pub inner_height: u32,
    listeners: Vec<mpsc::UnboundedSender<Value>>,
}

impl Window {
    pub fn new(inner_width: u32, inner_height: u32) -> Window {
        return Window {
            inner_width,
            inner_height,
            listeners: vec![],
        };
    }

    pub fn add_message_listener(&mut self) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel::<Value>();
        self.listeners.push(tx);
        return rx;
    }

    pub fn listener_count(&self) -> usize {
        return self.listeners.len();
    }

    /// Delivers to every live listener. Listeners whose receiving side was
    /// dropped are pruned.
    pub fn post_message(&mut self, message: Value) {
        self.listeners
            .retain(|listener| return listener.send(message.clone()).is_ok());
    }
}

#[derive(Clone, Debug, Default)]
pub struct Location {
    href: String,
    reloads: u32,
}

impl Location {
    pub fn new(href: &str) -> Location {
        return Location {
            href: href.to_string(),
            reloads: 0,
        };
    }

    pub fn href(&self) -> &str {
        return &self.href;
    }

    /// `history.replaceState`: swaps the visible URL without navigating.
    pub fn replace_state(&mut self, href: &str) {
        self.href = href.to_string();
    }

    pub fn reload(&mut self) {
        self.reloads += 1;
    }

    pub fn reloads(&self) -> u32 {
        return self.reloads;
    }
}

/// Tab-scoped key/value storage, cleared when the browsing session ends.
#[derive(Clone, Debug, Default)]
pub struct SessionStorage {
    items: HashMap<String, String>,
}

impl SessionStorage {
    pub fn get_item(&self, key: &str) -> Option<&str> {
        return self.items.get(key).map(|e| return e.as_str());
    }

    pub fn set_item(&mut self, key: &str, value: &str) {
        self.items.insert(key.to_string(), value.to_string());
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
