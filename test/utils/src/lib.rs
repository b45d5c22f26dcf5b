use serde_json::json;
use serde_json::Value;

/// Storefront `/cart.js` payload with a single line item and the given
/// attribute bag.
pub fn cart_fixture(attributes: Value) -> Value {
    return json!({
        "token": "c1-7a2b9f",
        "note": null,
        "attributes": attributes,
        "original_total_price": 2500,
        "total_price": 2500,
        "currency": "USD",
        "item_count": 1,
        "items": [
            {
                "id": 111,
                "key": "111:a8f0c2",
                "variant_id": 111,
                "quantity": 1,
                "title": "Trail Socks",
                "price": 2500
            }
        ],
        "requires_shipping": true
    });
}

pub fn empty_cart_fixture() -> Value {
    return json!({
        "token": "c1-7a2b9f",
        "note": null,
        "attributes": {},
        "original_total_price": 0,
        "total_price": 0,
        "currency": "USD",
        "item_count": 0,
        "items": [],
        "requires_shipping": false
    });
}

/// Backend `assistant-details` payload.
pub fn assistant_details_fixture(id: u64, name: &str, position: &str) -> Value {
    return json!({
        "data": {
            "id": id,
            "name": name,
            "position": position,
            "theme": "light",
            "avatar": "https://cdn.alphablocks.ai/avatars/asa.png"
        }
    });
}
