#[cfg(test)]
#[path = "envelope_test.rs"]
mod tests;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Value;

use super::Cart;

pub const RESIZE: &str = "alphablocks-resize";
pub const REQUEST_ORIGINAL_SIZE: &str = "alphablocks-request-original-size";
pub const HIDE_IFRAME: &str = "alphablocks-hide-iframe";
pub const REQUEST_SESSION_COOKIE: &str = "alphablocks-request-session-cookie";
pub const REQUEST_PARENT_URL: &str = "alphablocks-request-parent-url";
pub const REQUEST_CART_COOKIE: &str = "alphablocks-request-cart-cookie";
pub const STORE_CART_COOKIE: &str = "alphablocks-store-cart-cookie";
pub const SET_CART_ATTRIBUTES: &str = "alphablocks-set-cart-attributes";
pub const ADD_PRODUCT_TO_CART: &str = "alphablocks-add-product-to-cart";
pub const GET_CART_DETAILS: &str = "alphablocks-get-cart-details";
pub const NUDGE_RENDER: &str = "alphablocks-nudge-render";

/// Loose shape of every inbound `data` object. Each field decodes on its
/// own: a value of the wrong JSON type reads as absent instead of voiding the
/// whole message, and ids may arrive as numbers or numeric strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameEventData {
    #[serde(default, deserialize_with = "lenient_string")]
    pub height: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub width: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub right: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bottom: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub left: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cart: Option<String>,
    #[serde(rename = "cart_sig", default, deserialize_with = "lenient_string")]
    pub cart_sig: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub assistant_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub end_user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub variant_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub quantity: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub event: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    return match Value::deserialize(deserializer)? {
        Value::String(val) => Ok(Some(val)),
        _ => Ok(None),
    };
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    return match Value::deserialize(deserializer)? {
        Value::Number(val) => Ok(val.as_u64()),
        Value::String(val) => Ok(val.trim().parse::<u64>().ok()),
        _ => Ok(None),
    };
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResizeRequest {
    pub width: Option<String>,
    pub height: Option<String>,
    pub right: Option<String>,
    pub bottom: Option<String>,
    pub left: Option<String>,
    pub event: Option<String>,
}

impl ResizeRequest {
    /// Both dimensions are required, anything less is ignored.
    pub fn dimensions(&self) -> Option<(&str, &str)> {
        return match (self.width.as_deref(), self.height.as_deref()) {
            (Some(w), Some(h)) if !w.is_empty() && !h.is_empty() => Some((w, h)),
            _ => None,
        };
    }

    /// Full-bleed layout: the frame pins the wrapper on three edges.
    pub fn is_docked(&self) -> bool {
        return [&self.right, &self.left, &self.bottom]
            .iter()
            .all(|e| return e.as_deref().map(|v| return !v.is_empty()).unwrap_or(false));
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CartCookies {
    pub cart: Option<String>,
    pub cart_sig: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CartIdentity {
    pub assistant_id: Option<u64>,
    pub end_user_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddProduct {
    pub variant_id: Option<u64>,
    pub quantity: u64,
}

/// Every message the embedded assistant may send to the host page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Resize(ResizeRequest),
    RequestOriginalSize,
    HideIframe,
    RequestSessionCookie,
    RequestParentUrl,
    RequestCartCookie,
    StoreCartCookie(CartCookies),
    SetCartAttributes(CartIdentity),
    AddProductToCart(AddProduct),
    GetCartDetails,
    NudgeRender,
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        return match self {
            InboundEvent::Resize(_) => RESIZE,
            InboundEvent::RequestOriginalSize => REQUEST_ORIGINAL_SIZE,
            InboundEvent::HideIframe => HIDE_IFRAME,
            InboundEvent::RequestSessionCookie => REQUEST_SESSION_COOKIE,
            InboundEvent::RequestParentUrl => REQUEST_PARENT_URL,
            InboundEvent::RequestCartCookie => REQUEST_CART_COOKIE,
            InboundEvent::StoreCartCookie(_) => STORE_CART_COOKIE,
            InboundEvent::SetCartAttributes(_) => SET_CART_ATTRIBUTES,
            InboundEvent::AddProductToCart(_) => ADD_PRODUCT_TO_CART,
            InboundEvent::GetCartDetails => GET_CART_DETAILS,
            InboundEvent::NudgeRender => NUDGE_RENDER,
        };
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// A validated inbound message. `assistant_id` is the sender's claimed
/// assistant, used to keep co-existing widget instances apart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEnvelope {
    pub event: InboundEvent,
    pub assistant_id: Option<u64>,
}

impl InboundEnvelope {
    /// Returns `None` for anything that is not a recognised, well formed
    /// envelope. Those are protocol noise and are dropped without comment.
    pub fn parse(raw: &Value) -> Option<InboundEnvelope> {
        let envelope: RawEnvelope = serde_json::from_value(raw.clone()).ok()?;
        let kind = envelope.kind.filter(|e| return !e.is_empty())?;

        let data = match envelope.data {
            Some(Value::Object(obj)) => {
                serde_json::from_value::<FrameEventData>(Value::Object(obj)).ok()?
            }
            _ => FrameEventData::default(),
        };

        let event = match kind.as_str() {
            RESIZE => InboundEvent::Resize(ResizeRequest {
                width: data.width,
                height: data.height,
                right: data.right,
                bottom: data.bottom,
                left: data.left,
                event: data.event,
            }),
            REQUEST_ORIGINAL_SIZE => InboundEvent::RequestOriginalSize,
            HIDE_IFRAME => InboundEvent::HideIframe,
            REQUEST_SESSION_COOKIE => InboundEvent::RequestSessionCookie,
            REQUEST_PARENT_URL => InboundEvent::RequestParentUrl,
            REQUEST_CART_COOKIE => InboundEvent::RequestCartCookie,
            STORE_CART_COOKIE => InboundEvent::StoreCartCookie(CartCookies {
                cart: data.cart,
                cart_sig: data.cart_sig,
            }),
            SET_CART_ATTRIBUTES => InboundEvent::SetCartAttributes(CartIdentity {
                assistant_id: data.assistant_id,
                end_user_id: data.end_user_id,
            }),
            ADD_PRODUCT_TO_CART => InboundEvent::AddProductToCart(AddProduct {
                variant_id: data.variant_id,
                quantity: data.quantity.filter(|e| return *e > 0).unwrap_or(1),
            }),
            GET_CART_DETAILS => InboundEvent::GetCartDetails,
            NUDGE_RENDER => InboundEvent::NudgeRender,
            _ => return None,
        };

        return Some(InboundEnvelope {
            event,
            assistant_id: data.assistant_id,
        });
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AddToCartResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart: Option<Cart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Every message the host page sends into the assistant iframe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OutboundMessage {
    #[serde(rename = "alphablocks-original-size")]
    OriginalSize { width: u32, height: u32 },
    #[serde(rename = "session-cookie")]
    SessionCookie {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "cookieIsExisted")]
        cookie_is_existed: bool,
        #[serde(rename = "userId")]
        user_id: Option<String>,
    },
    #[serde(rename = "cart-cookie")]
    CartCookie { cart: String, cart_sig: String },
    #[serde(rename = "alphablocks-parent-url")]
    ParentUrl {
        ask_asa: bool,
        query: String,
        #[serde(rename = "urlPath")]
        url_path: String,
        #[serde(rename = "sessionCookie")]
        session_cookie: String,
    },
    #[serde(rename = "alphablocks-get-cart-details-response")]
    CartDetails(Cart),
    #[serde(rename = "alphablocks-add-product-to-cart-response")]
    AddProductToCart(AddToCartResponse),
}
