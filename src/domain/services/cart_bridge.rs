#[cfg(test)]
#[path = "cart_bridge_test.rs"]
mod tests;

use anyhow::Result;
use serde_json::Value;

use super::retry::RetryOutcome;
use super::retry::RetryPolicy;
use crate::domain::models::AddToCartResponse;
use crate::domain::models::Cart;
use crate::domain::models::CartApiBox;
use crate::domain::models::CartUpdate;
use crate::domain::models::INIT_CART_NOTE;
use crate::infrastructure::page::Document;
use crate::infrastructure::page::Element;
use crate::infrastructure::page::ElementId;

pub const SECTION_ID_PREFIX: &str = "shopify-section-";
pub const CART_REFRESH_EVENT: &str = "cart:refresh";

/// Which storefront refresh strategy ended the cart UI refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartRefresh {
    /// A theme section was re-rendered in place.
    Section(String),
    /// A `cart:refresh` event was dispatched and a no-op quantity update
    /// posted.
    Event,
    /// The cart could not be read, nothing was refreshed.
    Skipped,
}

/// Document changes left over from a cart UI refresh whose network calls
/// already finished.
#[derive(Clone, Debug, PartialEq)]
pub enum CartUiUpdate {
    Section {
        element: ElementId,
        section_id: String,
        html: String,
    },
    /// Dispatch `cart:refresh`, carrying the cart when it serialized.
    Event(Option<Value>),
    Skipped,
}

impl CartUiUpdate {
    pub fn apply(self, doc: &mut Document) -> CartRefresh {
        return match self {
            CartUiUpdate::Section {
                element,
                section_id,
                html,
            } => {
                doc.set_inner_html(element, &html);
                CartRefresh::Section(section_id)
            }
            CartUiUpdate::Event(detail) => {
                if let Some(detail) = detail {
                    doc.dispatch_event(CART_REFRESH_EVENT, detail);
                }
                CartRefresh::Event
            }
            CartUiUpdate::Skipped => CartRefresh::Skipped,
        };
    }
}

/// Relays cart operations from the assistant to the storefront and keeps the
/// widget's attributes on the cart in sync.
pub struct CartBridge {
    cart: CartApiBox,
    retry: RetryPolicy,
}

impl CartBridge {
    pub fn new(cart: CartApiBox) -> CartBridge {
        return CartBridge {
            cart,
            retry: RetryPolicy::default(),
        };
    }

    pub async fn get_cart_details(&self) -> Result<Cart> {
        return self.cart.get_cart().await;
    }

    /// Writes the assistant/end user pair onto the cart and re-reads it to
    /// confirm it stuck. Returns `None` when there is no identity to write.
    pub async fn set_cart_attributes(
        &self,
        assistant_id: Option<u64>,
        end_user_id: &str,
    ) -> Result<Option<RetryOutcome>> {
        let assistant_id = match assistant_id {
            Some(id) if !end_user_id.is_empty() => id,
            _ => return Ok(None),
        };

        let cart = self.cart.get_cart().await?;
        let mut payload = CartUpdate::attributes(cart.with_identity(assistant_id, end_user_id));
        // An empty cart has no server side record to attach attributes to.
        if cart.item_count == 0 {
            payload.note = Some(INIT_CART_NOTE.to_string());
        }

        let api = &self.cart;
        let payload = &payload;
        let outcome = self
            .retry
            .run(|attempt| {
                return async move {
                    tracing::debug!(attempt, assistant_id, "Setting cart attributes");
                    api.update_cart(payload).await?;
                    let cart = api.get_cart().await?;
                    return Ok(cart.has_identity(assistant_id, end_user_id));
                };
            })
            .await?;

        if !outcome.succeeded {
            tracing::warn!(
                attempts = outcome.attempts,
                "Cart attributes did not verify"
            );
        }

        return Ok(Some(outcome));
    }

    /// Adds a variant and reconciles the tracked line items, refreshing the
    /// storefront cart UI in `doc`. Failures are folded into the response
    /// rather than returned.
    pub async fn add_product_to_cart(
        &self,
        doc: &mut Document,
        variant_id: u64,
        quantity: u64,
        assistant_id: Option<u64>,
        end_user_id: &str,
    ) -> AddToCartResponse {
        let section = CartBridge::find_cart_section(doc);
        let (res, ui) = self
            .add_product(variant_id, quantity, assistant_id, end_user_id, section)
            .await;
        ui.apply(doc);

        return res;
    }

    /// Network half of [`CartBridge::add_product_to_cart`]. Touches no
    /// document, the returned [`CartUiUpdate`] is applied by the caller once
    /// it holds the page again.
    pub async fn add_product(
        &self,
        variant_id: u64,
        quantity: u64,
        assistant_id: Option<u64>,
        end_user_id: &str,
        section: Option<(ElementId, String)>,
    ) -> (AddToCartResponse, CartUiUpdate) {
        let mut ui = CartUiUpdate::Skipped;
        let res = self
            .reconcile_added_product(variant_id, quantity, assistant_id, end_user_id, section, &mut ui)
            .await;

        let res = match res {
            Ok(cart) => AddToCartResponse {
                success: true,
                cart: Some(cart),
                error: None,
            },
            Err(err) => {
                tracing::error!(error = ?err, variant_id, "Failed to add product to cart");
                AddToCartResponse {
                    success: false,
                    cart: None,
                    error: Some(err.to_string()),
                }
            }
        };

        return (res, ui);
    }

    async fn reconcile_added_product(
        &self,
        variant_id: u64,
        quantity: u64,
        assistant_id: Option<u64>,
        end_user_id: &str,
        section: Option<(ElementId, String)>,
        ui: &mut CartUiUpdate,
    ) -> Result<Cart> {
        self.cart.add_item(variant_id, quantity).await?;

        // Always merge against a fresh read, never a local copy.
        let cart = self.cart.get_cart().await?;
        let attributes = cart.with_tracked_variant(variant_id, assistant_id, end_user_id);
        self.cart
            .update_cart(&CartUpdate::attributes(attributes.clone()))
            .await?;

        *ui = self.fetch_cart_ui_update(section).await;

        let mut final_cart = self.cart.get_cart().await?;
        final_cart.attributes = Some(attributes);

        return Ok(final_cart);
    }

    /// Nudges the storefront theme to redraw its cart. Every strategy is
    /// best effort and failures are only logged.
    pub async fn refresh_cart_ui(&self, doc: &mut Document) -> CartRefresh {
        let section = CartBridge::find_cart_section(doc);
        return self.fetch_cart_ui_update(section).await.apply(doc);
    }

    /// Runs the network side of a cart UI refresh against a previously
    /// located cart section.
    pub async fn fetch_cart_ui_update(
        &self,
        section: Option<(ElementId, String)>,
    ) -> CartUiUpdate {
        let cart = match self.cart.get_cart().await {
            Ok(cart) => cart,
            Err(err) => {
                tracing::error!(error = ?err, "Failed to read cart for UI refresh");
                return CartUiUpdate::Skipped;
            }
        };

        if let Some((element, section_id)) = section {
            match self.cart.sections(&section_id).await {
                Ok(sections) => {
                    if let Some(html) = sections.get(&section_id).and_then(|e| return e.as_str()) {
                        return CartUiUpdate::Section {
                            element,
                            section_id,
                            html: html.to_string(),
                        };
                    }
                    tracing::debug!(section_id = section_id.as_str(), "Section missing from render response");
                }
                Err(err) => {
                    tracing::error!(error = ?err, section_id = section_id.as_str(), "Failed to render cart section");
                }
            }
        }

        let detail = match serde_json::to_value(&cart) {
            Ok(detail) => Some(detail),
            Err(err) => {
                tracing::error!(error = ?err, "Failed to serialize cart for refresh event");
                None
            }
        };

        if let Some(item) = cart.items.first() {
            if let Some(key) = &item.key {
                let update = CartUpdate::quantity(key, item.quantity);
                if let Err(err) = self.cart.update_cart(&update).await {
                    tracing::error!(error = ?err, "No-op cart update failed");
                }
            }
        }

        return CartUiUpdate::Event(detail);
    }

    /// Locates the theme section wrapping the cart drawer, returning the
    /// section element and its id without the section prefix.
    pub fn find_cart_section(doc: &Document) -> Option<(ElementId, String)> {
        let elements = doc.descendants(doc.body());
        let drawer = elements
            .iter()
            .find(|e| return is_cart_drawer(doc.element(**e)))
            .or_else(|| {
                return elements.iter().find(|e| {
                    let id = doc.element(**e).id();
                    return id.starts_with(SECTION_ID_PREFIX) && id.contains("cart");
                });
            })?;

        let section = doc.closest(*drawer, |e| return e.id().starts_with(SECTION_ID_PREFIX))?;
        let id = doc.element(section).id();
        let section_id = id.strip_prefix(SECTION_ID_PREFIX).unwrap_or(id).to_string();

        return Some((section, section_id));
    }
}

fn is_cart_drawer(el: &Element) -> bool {
    return el.tag() == "cart-drawer"
        || el.tag() == "cart-drawer-component"
        || el.has_class("cart-drawer")
        || el.id() == "cart-drawer";
}
