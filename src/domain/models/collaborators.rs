use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

use super::AssistantDetails;
use super::Cart;
use super::CartUpdate;

/// The AlphaBlocks backend.
#[async_trait]
pub trait AssistantApi {
    /// Resolves the assistant an access token belongs to, including its
    /// preferred on-page position.
    async fn assistant_details(&self, token: &str) -> Result<AssistantDetails>;

    /// Looks up the backend's record for a visitor. The widget only triggers
    /// this to warm the backend; the record itself is not used.
    async fn end_user(
        &self,
        assistant_id: u64,
        end_user_id: &str,
        user_id: Option<&str>,
    ) -> Result<Value>;
}

/// The storefront's own cart API (`/cart.js` and friends).
#[async_trait]
pub trait CartApi {
    async fn get_cart(&self) -> Result<Cart>;

    async fn update_cart(&self, update: &CartUpdate) -> Result<Cart>;

    async fn add_item(&self, variant_id: u64, quantity: u64) -> Result<Value>;

    /// Renders theme sections server side, keyed by section id.
    async fn sections(&self, section_id: &str) -> Result<Map<String, Value>>;
}

pub type AssistantApiBox = Arc<dyn AssistantApi + Send + Sync>;
pub type CartApiBox = Arc<dyn CartApi + Send + Sync>;

/// External collaborators and the embedded assistant's base URL, everything
/// a widget instance needs beyond its own configuration.
#[derive(Clone)]
pub struct Environment {
    pub chatbot_url: String,
    pub assistant_api: AssistantApiBox,
    pub cart_api: CartApiBox,
}
