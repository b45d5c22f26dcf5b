#[cfg(test)]
#[path = "storefront_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Cart;
use crate::domain::models::CartAddItem;
use crate::domain::models::CartAddRequest;
use crate::domain::models::CartApi;
use crate::domain::models::CartUpdate;

/// Ajax cart API of the storefront the widget is embedded in. Requests are
/// made relative to the storefront origin and share one client so the cart
/// cookie travels with every call.
pub struct StorefrontCart {
    url: String,
    client: reqwest::Client,
}

impl Default for StorefrontCart {
    fn default() -> StorefrontCart {
        return StorefrontCart::new(&Config::get(ConfigKey::StorefrontURL));
    }
}

impl StorefrontCart {
    pub fn new(url: &str) -> StorefrontCart {
        return StorefrontCart {
            url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        };
    }

    async fn check(res: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            tracing::error!(status, body = body.as_str(), action, "Cart request failed");
            bail!("Cart {action} failed with status {status}");
        }

        return Ok(res);
    }
}

#[async_trait]
impl CartApi for StorefrontCart {
    #[allow(clippy::implicit_return)]
    async fn get_cart(&self) -> Result<Cart> {
        let res = self
            .client
            .get(format!("{url}/cart.js", url = self.url))
            .send()
            .await?;

        let cart = StorefrontCart::check(res, "fetch")
            .await?
            .json::<Cart>()
            .await?;

        return Ok(cart);
    }

    #[allow(clippy::implicit_return)]
    async fn update_cart(&self, update: &CartUpdate) -> Result<Cart> {
        tracing::debug!(body = ?update, "Updating cart");
        let res = self
            .client
            .post(format!("{url}/cart/update.js", url = self.url))
            .json(update)
            .send()
            .await?;

        let cart = StorefrontCart::check(res, "update")
            .await?
            .json::<Cart>()
            .await?;

        return Ok(cart);
    }

    #[allow(clippy::implicit_return)]
    async fn add_item(&self, variant_id: u64, quantity: u64) -> Result<Value> {
        let req = CartAddRequest {
            items: vec![CartAddItem {
                id: variant_id,
                quantity,
            }],
        };

        let res = self
            .client
            .post(format!("{url}/cart/add.js", url = self.url))
            .json(&req)
            .send()
            .await?;

        let body = StorefrontCart::check(res, "add")
            .await?
            .json::<Value>()
            .await?;

        return Ok(body);
    }

    #[allow(clippy::implicit_return)]
    async fn sections(&self, section_id: &str) -> Result<Map<String, Value>> {
        let res = self
            .client
            .get(format!("{url}/", url = self.url))
            .query(&[("sections", section_id)])
            .send()
            .await?;

        let sections = StorefrontCart::check(res, "section render")
            .await?
            .json::<Map<String, Value>>()
            .await?;

        return Ok(sections);
    }
}
