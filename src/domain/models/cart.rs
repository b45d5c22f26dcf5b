#[cfg(test)]
#[path = "cart_test.rs"]
mod tests;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

pub const ASSISTANT_ID_ATTRIBUTE: &str = "asa.alphablocks.ai_assistant_id";
pub const END_USER_ID_ATTRIBUTE: &str = "asa.alphablocks.ai_end_user_id";
pub const LINE_ITEMS_ATTRIBUTE: &str = "asa.alphablocks.ai_line_items";
pub const INIT_CART_NOTE: &str = "init_cart";

pub type CartAttributes = Map<String, Value>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub quantity: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Storefront cart as returned by `/cart.js`. Only the fields the widget
/// reconciles are typed; everything else round-trips through `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub attributes: Option<CartAttributes>,
    #[serde(default)]
    pub item_count: u64,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Cart {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        return self
            .attributes
            .as_ref()
            .and_then(|e| return e.get(key))
            .and_then(|e| return e.as_str());
    }

    pub fn attributes_or_empty(&self) -> CartAttributes {
        return self.attributes.clone().unwrap_or_default();
    }

    /// Existing attributes with the identity pair written over them.
    pub fn with_identity(&self, assistant_id: u64, end_user_id: &str) -> CartAttributes {
        let mut attrs = self.attributes_or_empty();
        attrs.extend(identity_attributes(assistant_id, end_user_id));
        return attrs;
    }

    pub fn has_identity(&self, assistant_id: u64, end_user_id: &str) -> bool {
        return identity_attributes(assistant_id, end_user_id)
            .iter()
            .all(|(k, v)| return self.attribute(k) == v.as_str());
    }

    /// Attributes after a widget add-to-cart: the variant is appended to the
    /// tracked line items, and the identity pair is only filled in where the
    /// cart does not carry one yet.
    pub fn with_tracked_variant(
        &self,
        variant_id: u64,
        assistant_id: Option<u64>,
        end_user_id: &str,
    ) -> CartAttributes {
        let mut attrs = self.attributes_or_empty();
        let existing = self.attribute(LINE_ITEMS_ATTRIBUTE).unwrap_or("");
        attrs.insert(
            LINE_ITEMS_ATTRIBUTE.to_string(),
            Value::String(merge_tracked_items(existing, variant_id)),
        );

        if let Some(assistant_id) = assistant_id {
            if !end_user_id.is_empty() {
                for (k, v) in identity_attributes(assistant_id, end_user_id) {
                    let missing = attrs
                        .get(&k)
                        .map(|e| return is_blank(e))
                        .unwrap_or(true);
                    if missing {
                        attrs.insert(k, v);
                    }
                }
            }
        }

        return attrs;
    }
}

fn is_blank(value: &Value) -> bool {
    return match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    };
}

pub fn identity_attributes(assistant_id: u64, end_user_id: &str) -> CartAttributes {
    let mut attrs = CartAttributes::new();
    attrs.insert(
        ASSISTANT_ID_ATTRIBUTE.to_string(),
        Value::String(assistant_id.to_string()),
    );
    attrs.insert(
        END_USER_ID_ATTRIBUTE.to_string(),
        Value::String(end_user_id.to_string()),
    );
    return attrs;
}

/// Appends `variant_id` to a `", "` joined list, keeping first-seen order and
/// dropping duplicates.
pub fn merge_tracked_items(existing: &str, variant_id: u64) -> String {
    let mut ids: Vec<String> = vec![];
    for id in existing.split(',') {
        let id = id.trim();
        if !id.is_empty() && !ids.iter().any(|e| return e == id) {
            ids.push(id.to_string());
        }
    }

    let variant = variant_id.to_string();
    if !ids.contains(&variant) {
        ids.push(variant);
    }

    return ids.join(", ");
}

/// Body for `/cart/update.js`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CartUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<CartAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updates: Option<Map<String, Value>>,
}

impl CartUpdate {
    pub fn attributes(attributes: CartAttributes) -> CartUpdate {
        return CartUpdate {
            attributes: Some(attributes),
            ..CartUpdate::default()
        };
    }

    pub fn quantity(key: &str, quantity: u64) -> CartUpdate {
        let mut updates = Map::new();
        updates.insert(key.to_string(), Value::from(quantity));
        return CartUpdate {
            updates: Some(updates),
            ..CartUpdate::default()
        };
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartAddItem {
    pub id: u64,
    pub quantity: u64,
}

/// Body for `/cart/add.js`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartAddRequest {
    pub items: Vec<CartAddItem>,
}
