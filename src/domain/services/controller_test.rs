use std::future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use mockito::Matcher;
use serde_json::json;
use serde_json::Map;
use serde_json::Value;
use test_utils::assistant_details_fixture;
use test_utils::cart_fixture;

use super::Container;
use super::WidgetController;
use crate::domain::models::Cart;
use crate::domain::models::CartApi;
use crate::domain::models::CartUpdate;
use crate::domain::models::CustomOffsets;
use crate::domain::models::Environment;
use crate::domain::models::FrameState;
use crate::domain::models::PillState;
use crate::domain::models::Position;
use crate::domain::models::WidgetConfig;
use crate::domain::models::WidgetError;
use crate::domain::models::LINE_ITEMS_ATTRIBUTE;
use crate::domain::services::layout::Layout;
use crate::infrastructure::backends::AlphaBlocksApi;
use crate::infrastructure::backends::StorefrontCart;
use crate::infrastructure::page::Document;
use crate::infrastructure::page::Page;

const CHATBOT_URL: &str = "https://sdk.alphablocks.ai";
const UNUSED_URL: &str = "http://127.0.0.1:9";

fn environment(api_url: &str, storefront_url: &str) -> Environment {
    return Environment {
        chatbot_url: CHATBOT_URL.to_string(),
        assistant_api: Arc::new(AlphaBlocksApi::new(api_url)),
        cart_api: Arc::new(StorefrontCart::new(storefront_url)),
    };
}

fn bot_config() -> WidgetConfig {
    return WidgetConfig {
        name: Some("Bot".to_string()),
        avatar: Some("a.png".to_string()),
        bg_color: Some("blue".to_string()),
        text_color: Some("white".to_string()),
        ..WidgetConfig::new("t1")
    };
}

fn widget(config: WidgetConfig, page: Page) -> WidgetController {
    return WidgetController::new(config, page, environment(UNUSED_URL, UNUSED_URL)).unwrap();
}

/// Storefront that accepts requests and never answers.
struct StalledCart;

#[async_trait]
impl CartApi for StalledCart {
    async fn get_cart(&self) -> Result<Cart> {
        return future::pending().await;
    }

    async fn update_cart(&self, _update: &CartUpdate) -> Result<Cart> {
        return future::pending().await;
    }

    async fn add_item(&self, _variant_id: u64, _quantity: u64) -> Result<Value> {
        return future::pending().await;
    }

    async fn sections(&self, _section_id: &str) -> Result<Map<String, Value>> {
        return future::pending().await;
    }
}

fn count_frames(doc: &Document) -> usize {
    return doc
        .descendants(doc.body())
        .iter()
        .filter(|e| return doc.element(**e).tag() == "iframe")
        .count();
}

#[test]
fn it_requires_a_token() {
    let res = WidgetController::new(
        WidgetConfig::new("  "),
        Page::default(),
        environment(UNUSED_URL, UNUSED_URL),
    );

    assert_eq!(res.err(), Some(WidgetError::MissingToken));
}

#[test]
fn it_registers_one_listener() {
    let controller = widget(bot_config(), Page::default());

    assert_eq!(controller.page().window.listener_count(), 1);
    assert_eq!(controller.frame_state(), FrameState::NoIframe);
    assert_eq!(controller.pill_state(), PillState::Absent);
    assert_eq!(controller.iframe(), None);
}

#[test]
fn it_rejects_missing_container_without_mutation() {
    let mut controller = widget(bot_config(), Page::default());
    let body = controller.page().document.body();
    let before = controller.page().document.outer_html(body);

    assert_eq!(
        controller.render_pill(Container::Missing),
        Err(WidgetError::InvalidArgument)
    );
    assert_eq!(
        controller.render_pill(None::<&str>),
        Err(WidgetError::InvalidArgument)
    );
    assert_eq!(controller.render_pill(""), Err(WidgetError::InvalidArgument));
    assert_eq!(
        controller.render_pill("nope"),
        Err(WidgetError::ContainerNotFound("nope".to_string()))
    );

    assert_eq!(controller.page().document.outer_html(body), before);
    assert_eq!(controller.pill_state(), PillState::Absent);
}

#[test]
fn it_requires_display_details_for_pill() {
    let mut page = Page::default();
    page.add_container("c");
    let mut controller = widget(WidgetConfig::new("t1"), page);

    assert_eq!(
        controller.render_pill("c"),
        Err(WidgetError::MissingAssistantDetails)
    );
}

#[test]
fn it_renders_pill_once() {
    let mut page = Page::default();
    let container = page.add_container("c");
    let mut controller = widget(bot_config(), page);

    assert!(controller.render_pill("c").unwrap().is_some());
    assert_eq!(controller.render_pill(container), Ok(None));
    assert_eq!(
        controller
            .page()
            .document
            .count_by_id("alphablocks-chat-icon-container"),
        1
    );
}

#[test]
fn it_opens_assistant_from_pill_click() {
    let mut page = Page::default();
    page.add_container("c");
    let mut controller = widget(bot_config(), page);

    let pill = controller.render_pill("c").unwrap().unwrap();
    {
        let doc = &controller.page().document;
        let img = doc.query_descendant_by_tag(pill, "img").unwrap();
        let label = doc.query_descendant_by_tag(pill, "p").unwrap();
        assert_eq!(doc.element(img).attribute("src"), Some("a.png"));
        assert_eq!(doc.element(label).text(), "Bot");
    }
    assert_eq!(controller.pill_state(), PillState::Shown);

    let button = controller.page().document.element(pill).children()[0];
    assert!(controller.click(button));

    let doc = &controller.page().document;
    let iframe = controller.iframe().unwrap();
    assert_eq!(doc.style(pill, "display"), "none");
    assert!(doc.element(iframe).attribute("src").unwrap().contains("token=t1"));
    assert!(doc.is_connected(iframe));
    assert_eq!(controller.pill_state(), PillState::Hidden);
    assert_eq!(controller.frame_state(), FrameState::Visible);
}

#[test]
fn it_ignores_clicks_without_handler() {
    let mut controller = widget(bot_config(), Page::default());
    let body = controller.page().document.body();

    assert!(!controller.click(body));
    assert_eq!(controller.iframe(), None);
}

#[test]
fn it_reuses_the_iframe() {
    let mut controller = widget(bot_config(), Page::default());

    controller.show_assistant();
    let first = controller.iframe();
    controller.show_assistant();
    controller.show_assistant_on_btn_click();

    assert_eq!(controller.iframe(), first);
    assert_eq!(count_frames(&controller.page().document), 1);

    let doc = &controller.page().document;
    let wrapper = Layout::wrapper(doc).unwrap();
    assert_eq!(doc.style(wrapper, "z-index"), "2147480000");
    assert_eq!(doc.style(first.unwrap(), "width"), "120px");
}

#[test]
fn it_pre_renders_hidden_and_reuses_on_show() {
    let mut controller = widget(bot_config(), Page::default());

    controller.pre_render_assistant();
    controller.pre_render_assistant();
    let iframe = controller.iframe().unwrap();
    {
        let doc = &controller.page().document;
        assert_eq!(doc.style(iframe, "display"), "none");
        assert_eq!(doc.style(iframe, "width"), "562px");
        assert!(doc.element(iframe).attribute("src").unwrap().contains("version=2"));
    }
    assert_eq!(controller.frame_state(), FrameState::Hidden);
    assert_eq!(count_frames(&controller.page().document), 1);

    controller.show_assistant();

    let doc = &controller.page().document;
    assert_eq!(controller.iframe(), Some(iframe));
    assert_eq!(doc.style(iframe, "display"), "block");
    assert!(doc.element(iframe).attribute("src").unwrap().contains("version=1"));
    assert_eq!(controller.frame_state(), FrameState::Visible);
}

#[test]
fn it_shows_frame_when_pill_hidden() {
    let mut controller = widget(bot_config(), Page::default());
    controller.pre_render_assistant();

    controller.hide_chat_pill();

    assert_eq!(controller.frame_state(), FrameState::Visible);
    assert_eq!(controller.pill_state(), PillState::Absent);
}

#[tokio::test]
async fn it_looks_up_known_end_user_on_open() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/chat/widget/get-user/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("assistant_id".to_string(), "42".to_string()),
            Matcher::UrlEncoded("end_user_id".to_string(), "Ab3_x-9Z".to_string()),
        ]))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let config = WidgetConfig {
        id: Some(42),
        end_user_id: Some("Ab3_x-9Z".to_string()),
        ..bot_config()
    };
    let mut controller =
        WidgetController::new(config, Page::default(), environment(&server.url(), UNUSED_URL))?;

    let handle = controller.show_assistant_on_btn_click().unwrap();
    handle.await?;

    let iframe = controller.iframe().unwrap();
    assert_eq!(controller.page().document.style(iframe, "height"), "545px");
    mock.assert_async().await;

    return Ok(());
}

#[tokio::test]
async fn it_survives_failed_end_user_lookup() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/chat/widget/get-user/")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let config = WidgetConfig {
        id: Some(42),
        end_user_id: Some("Ab3_x-9Z".to_string()),
        ..bot_config()
    };
    let mut controller =
        WidgetController::new(config, Page::default(), environment(&server.url(), UNUSED_URL))?;

    controller.show_assistant_on_btn_click().unwrap().await?;
    assert_eq!(controller.frame_state(), FrameState::Visible);

    return Ok(());
}

#[test]
fn it_skips_lookup_for_unknown_visitor() {
    let mut controller = widget(bot_config(), Page::default());

    assert!(controller.show_assistant_on_btn_click().is_none());
    assert!(controller.iframe().is_some());
}

#[tokio::test]
async fn it_positions_wrapper_from_assistant_details() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/assistant/widget/assistant-details/")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(assistant_details_fixture(42, "Asa", "bottom-left").to_string())
        .expect(1)
        .create_async()
        .await;

    let mut controller = WidgetController::new(
        bot_config(),
        Page::default(),
        environment(&server.url(), UNUSED_URL),
    )?;
    controller.render_wrapper().await;
    controller.render_wrapper().await;

    let doc = &controller.page().document;
    let wrapper = Layout::wrapper(doc).unwrap();
    assert_eq!(doc.count_by_id("alphablocks-assistant-container"), 1);
    assert_eq!(doc.style(wrapper, "left"), "24px");
    assert_eq!(doc.style(wrapper, "right"), "");
    assert_eq!(controller.assistant_id(), Some(42));
    assert_eq!(controller.name(), "Asa");
    assert_eq!(controller.layout().position, Position::BottomLeft);
    assert!(controller
        .page()
        .session_storage
        .get_item("alphablocks-assistant-details-t1")
        .is_some());
    mock.assert_async().await;

    return Ok(());
}

#[tokio::test]
async fn it_keeps_default_position_when_details_fail() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/assistant/widget/assistant-details/")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let mut controller = WidgetController::new(
        bot_config(),
        Page::default(),
        environment(&server.url(), UNUSED_URL),
    )?;
    controller.render_wrapper().await;

    let doc = &controller.page().document;
    let wrapper = Layout::wrapper(doc).unwrap();
    assert_eq!(doc.style(wrapper, "right"), "24px");
    assert_eq!(doc.style(wrapper, "bottom"), "24px");
    assert_eq!(controller.assistant_id(), None);

    return Ok(());
}

#[tokio::test]
async fn it_replies_with_session_cookie() {
    let config = WidgetConfig {
        id: Some(42),
        user_id: Some("u-1".to_string()),
        ..bot_config()
    };
    let mut controller = widget(config, Page::default());
    controller.show_assistant();

    let request = json!({"type": "alphablocks-request-session-cookie"});
    controller.handle_message(request.clone()).await;
    controller.handle_message(request).await;

    let messages = controller.frame_messages();
    assert_eq!(messages.len(), 2);
    let first = &messages[0]["data"];
    let second = &messages[1]["data"];
    assert_eq!(messages[0]["type"], json!("session-cookie"));
    assert_eq!(first["cookieIsExisted"], json!(false));
    assert_eq!(second["cookieIsExisted"], json!(true));
    assert_eq!(first["sessionId"], second["sessionId"]);
    assert_eq!(first["userId"], json!("u-1"));
    assert_eq!(
        json!(controller.end_user_id()),
        first["sessionId"].clone()
    );
    assert!(controller
        .page()
        .cookies
        .get("alphablocks-sessionId-42")
        .is_some());
}

#[tokio::test]
async fn it_applies_breakpoint_margins_on_resize() {
    let resize = json!({"type": "alphablocks-resize", "data": {"width": "340px", "height": "600px"}});

    for (width, margin) in [(500, "16px"), (501, "24px")] {
        let mut controller = widget(bot_config(), Page::new("https://shop.example/", width, 800));
        controller.show_assistant();
        controller.handle_message(resize.clone()).await;

        let doc = &controller.page().document;
        let wrapper = Layout::wrapper(doc).unwrap();
        assert_eq!(doc.style(wrapper, "right"), margin);
        assert_eq!(doc.style(wrapper, "bottom"), margin);
        assert_eq!(doc.style(controller.iframe().unwrap(), "height"), "600px");
    }
}

#[tokio::test]
async fn it_prefers_custom_css_on_resize() {
    let resize = json!({"type": "alphablocks-resize", "data": {"width": "340px", "height": "600px"}});

    for width in [360, 1440] {
        let mut controller = widget(bot_config(), Page::new("https://shop.example/", width, 800));
        controller.add_custom_css(CustomOffsets {
            bottom: Some("100px".to_string()),
            right: Some("30px".to_string()),
        });
        controller.show_assistant();
        controller.handle_message(resize.clone()).await;

        let doc = &controller.page().document;
        let wrapper = Layout::wrapper(doc).unwrap();
        assert_eq!(doc.style(wrapper, "right"), "30px");
        assert_eq!(doc.style(wrapper, "bottom"), "100px");
    }
}

#[tokio::test]
async fn it_ignores_events_before_the_iframe_exists() {
    let mut controller = widget(bot_config(), Page::default());

    controller
        .handle_message(json!({"type": "alphablocks-resize", "data": {"width": "1px", "height": "1px"}}))
        .await;
    controller
        .handle_message(json!({"type": "alphablocks-request-original-size"}))
        .await;
    controller
        .handle_message(json!({"type": "alphablocks-hide-iframe"}))
        .await;
    controller
        .handle_message(json!({"type": "alphablocks-nudge-render"}))
        .await;

    assert_eq!(controller.iframe(), None);
    assert_eq!(controller.frame_state(), FrameState::NoIframe);
    assert!(controller.frame_messages().is_empty());
}

#[tokio::test]
async fn it_ignores_malformed_messages() {
    let mut controller = widget(bot_config(), Page::default());
    controller.show_assistant();

    for raw in [
        json!("hello"),
        json!({"data": {"width": "1px"}}),
        json!({"type": ""}),
        json!({"type": "alphablocks-unknown"}),
        json!({"type": "alphablocks-resize", "data": {"width": 10}}),
    ] {
        controller.handle_message(raw).await;
    }

    assert!(controller.frame_messages().is_empty());
    assert_eq!(controller.frame_state(), FrameState::Visible);
}

#[tokio::test]
async fn it_replies_with_original_size() {
    let mut controller = widget(bot_config(), Page::new("https://shop.example/", 390, 844));
    controller.show_assistant();

    controller
        .handle_message(json!({"type": "alphablocks-request-original-size"}))
        .await;

    assert_eq!(
        controller.frame_messages(),
        &[json!({"type": "alphablocks-original-size", "data": {"width": 390, "height": 844}})]
    );
}

#[tokio::test]
async fn it_ignores_messages_for_other_assistants() {
    let config = WidgetConfig {
        id: Some(42),
        ..bot_config()
    };
    let mut controller = widget(config, Page::default());
    controller.show_assistant();

    controller
        .handle_message(json!({"type": "alphablocks-request-original-size", "data": {"assistantId": 7}}))
        .await;
    assert!(controller.frame_messages().is_empty());

    controller
        .handle_message(json!({"type": "alphablocks-request-original-size", "data": {"assistantId": 42}}))
        .await;
    assert_eq!(controller.frame_messages().len(), 1);
}

#[tokio::test]
async fn it_toggles_between_frame_and_pill() {
    let mut page = Page::default();
    page.add_container("c");
    let mut controller = widget(bot_config(), page);
    let pill = controller.render_pill("c").unwrap().unwrap();
    controller.click(pill);

    controller
        .handle_message(json!({"type": "alphablocks-hide-iframe"}))
        .await;

    let iframe = controller.iframe().unwrap();
    assert_eq!(controller.page().document.style(iframe, "display"), "none");
    assert_eq!(controller.page().document.style(pill, "display"), "block");
    assert_eq!(controller.frame_state(), FrameState::Hidden);
    assert_eq!(controller.pill_state(), PillState::Shown);

    controller
        .handle_message(json!({"type": "alphablocks-nudge-render"}))
        .await;

    assert_eq!(controller.page().document.style(iframe, "display"), "block");
    assert_eq!(controller.frame_state(), FrameState::Visible);
}

#[tokio::test]
async fn it_stores_cart_cookies_and_reloads() {
    let mut controller = widget(bot_config(), Page::default());
    controller.show_assistant();

    controller
        .handle_message(json!({"type": "alphablocks-store-cart-cookie", "data": {"cart": "c1-7a2b9f", "cart_sig": "s1"}}))
        .await;
    controller
        .handle_message(json!({"type": "alphablocks-request-cart-cookie"}))
        .await;

    assert_eq!(controller.page().location.reloads(), 1);
    assert_eq!(
        controller.frame_messages(),
        &[json!({"type": "cart-cookie", "data": {"cart": "c1-7a2b9f", "cart_sig": "s1"}})]
    );
}

#[tokio::test]
async fn it_replies_with_empty_cart_cookies() {
    let mut controller = widget(bot_config(), Page::default());
    controller.show_assistant();

    controller
        .handle_message(json!({"type": "alphablocks-request-cart-cookie"}))
        .await;

    assert_eq!(
        controller.frame_messages(),
        &[json!({"type": "cart-cookie", "data": {"cart": "", "cart_sig": ""}})]
    );
}

#[tokio::test]
async fn it_sends_parent_url_with_session() {
    let config = WidgetConfig {
        id: Some(42),
        ..bot_config()
    };
    let mut page = Page::new("https://shop.example/search?query=socks&ask_asa=true", 1280, 800);
    page.cookies.write("alphablocks-sessionId-42=Ab3_x-9Z;path=/");
    let mut controller = widget(config, page);
    controller.show_assistant();

    controller
        .handle_message(json!({"type": "alphablocks-request-parent-url"}))
        .await;

    assert_eq!(controller.page().location.href(), "https://shop.example/search");
    assert_eq!(
        controller.frame_messages()[0]["data"],
        json!({"ask_asa": true, "query": "socks", "urlPath": "/search", "sessionCookie": "Ab3_x-9Z"})
    );
}

#[tokio::test]
async fn it_relays_add_to_cart() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let cart = cart_fixture(json!({ LINE_ITEMS_ATTRIBUTE: "111" }));
    server
        .mock("POST", "/cart/add.js")
        .match_body(Matcher::Json(json!({"items": [{"id": 222, "quantity": 2}]})))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    server
        .mock("GET", "/cart.js")
        .with_status(200)
        .with_body(cart.to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/cart/update.js")
        .with_status(200)
        .with_body(cart.to_string())
        .create_async()
        .await;

    let config = WidgetConfig {
        id: Some(42),
        end_user_id: Some("Ab3_x-9Z".to_string()),
        ..bot_config()
    };
    let mut controller =
        WidgetController::new(config, Page::default(), environment(UNUSED_URL, &server.url()))?;
    controller.show_assistant();

    controller
        .handle_message(json!({"type": "alphablocks-add-product-to-cart", "data": {"variantId": 222, "quantity": 2}}))
        .await;
    assert!(controller.frame_messages().is_empty());
    controller.settle().await;

    let messages = controller.frame_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0]["type"],
        json!("alphablocks-add-product-to-cart-response")
    );
    assert_eq!(messages[0]["data"]["success"], json!(true));
    assert_eq!(
        messages[0]["data"]["cart"]["attributes"][LINE_ITEMS_ATTRIBUTE],
        json!("111, 222")
    );

    return Ok(());
}

#[tokio::test]
async fn it_replies_with_add_to_cart_failure() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/cart/add.js")
        .with_status(422)
        .create_async()
        .await;

    let mut controller = WidgetController::new(
        bot_config(),
        Page::default(),
        environment(UNUSED_URL, &server.url()),
    )?;
    controller.show_assistant();

    controller
        .handle_message(json!({"type": "alphablocks-add-product-to-cart", "data": {"variantId": 222}}))
        .await;
    controller.settle().await;

    assert_eq!(
        controller.frame_messages(),
        &[json!({
            "type": "alphablocks-add-product-to-cart-response",
            "data": {"success": false, "error": "Cart add failed with status 422"}
        })]
    );

    return Ok(());
}

#[tokio::test]
async fn it_skips_add_to_cart_without_frame_or_variant() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/cart/add.js")
        .expect(0)
        .create_async()
        .await;

    let mut controller = WidgetController::new(
        bot_config(),
        Page::default(),
        environment(UNUSED_URL, &server.url()),
    )?;
    controller
        .handle_message(json!({"type": "alphablocks-add-product-to-cart", "data": {"variantId": 222}}))
        .await;

    controller.show_assistant();
    controller
        .handle_message(json!({"type": "alphablocks-add-product-to-cart", "data": {}}))
        .await;
    assert_eq!(controller.pending_cart_operations(), 0);
    controller.settle().await;

    assert!(controller.frame_messages().is_empty());
    mock.assert_async().await;

    return Ok(());
}

#[tokio::test]
async fn it_replies_with_cart_details() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/cart.js")
        .with_status(200)
        .with_body(cart_fixture(json!({})).to_string())
        .create_async()
        .await;

    let mut controller = WidgetController::new(
        bot_config(),
        Page::default(),
        environment(UNUSED_URL, &server.url()),
    )?;
    controller.show_assistant();

    controller
        .handle_message(json!({"type": "alphablocks-get-cart-details"}))
        .await;
    controller.settle().await;

    let messages = controller.frame_messages();
    assert_eq!(
        messages[0]["type"],
        json!("alphablocks-get-cart-details-response")
    );
    assert_eq!(messages[0]["data"]["item_count"], json!(1));
    assert_eq!(messages[0]["data"]["currency"], json!("USD"));

    return Ok(());
}

#[tokio::test]
async fn it_syncs_cart_attributes_with_session_identity() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let cart = cart_fixture(json!({
        "asa.alphablocks.ai_assistant_id": "42",
        "asa.alphablocks.ai_end_user_id": "Ab3_x-9Z"
    }));
    server
        .mock("GET", "/cart.js")
        .with_status(200)
        .with_body(cart.to_string())
        .create_async()
        .await;
    let update = server
        .mock("POST", "/cart/update.js")
        .match_body(Matcher::PartialJson(json!({
            "attributes": {
                "asa.alphablocks.ai_assistant_id": "42",
                "asa.alphablocks.ai_end_user_id": "Ab3_x-9Z"
            }
        })))
        .with_status(200)
        .with_body(cart.to_string())
        .expect(1)
        .create_async()
        .await;

    let config = WidgetConfig {
        id: Some(42),
        end_user_id: Some("Ab3_x-9Z".to_string()),
        ..bot_config()
    };
    let mut controller =
        WidgetController::new(config, Page::default(), environment(UNUSED_URL, &server.url()))?;

    controller
        .handle_message(json!({"type": "alphablocks-set-cart-attributes", "data": {"assistantId": 42}}))
        .await;
    controller.settle().await;

    assert!(controller.frame_messages().is_empty());
    update.assert_async().await;

    return Ok(());
}

#[tokio::test]
async fn it_pumps_queued_window_messages() {
    let mut controller = widget(bot_config(), Page::default());
    controller.show_assistant();

    controller
        .page_mut()
        .window
        .post_message(json!({"type": "alphablocks-request-original-size"}));
    controller
        .page_mut()
        .window
        .post_message(json!({"type": "alphablocks-hide-iframe"}));

    assert_eq!(controller.pump().await, 2);
    assert_eq!(controller.pump().await, 0);
    assert_eq!(controller.frame_messages().len(), 1);
    assert_eq!(controller.frame_state(), FrameState::Hidden);
    assert_eq!(controller.drain_frame_messages().len(), 1);
    assert!(controller.frame_messages().is_empty());
}

#[tokio::test]
async fn it_answers_other_messages_while_cart_hangs() -> Result<()> {
    let env = Environment {
        cart_api: Arc::new(StalledCart),
        ..environment(UNUSED_URL, UNUSED_URL)
    };
    let config = WidgetConfig {
        id: Some(42),
        ..bot_config()
    };
    let mut controller = WidgetController::new(config, Page::default(), env)?;
    controller.show_assistant();

    for message in [
        json!({"type": "alphablocks-get-cart-details"}),
        json!({"type": "alphablocks-add-product-to-cart", "data": {"variantId": 222}}),
        json!({"type": "alphablocks-request-session-cookie"}),
    ] {
        controller.page_mut().window.post_message(message);
    }

    let pumped = tokio::time::timeout(Duration::from_secs(2), controller.pump()).await?;

    assert_eq!(pumped, 3);
    assert_eq!(controller.pending_cart_operations(), 2);
    let messages = controller.frame_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["type"], json!("session-cookie"));

    return Ok(());
}

#[tokio::test]
async fn it_keeps_session_minted_before_assistant_id_resolves() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/assistant/widget/assistant-details/")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(assistant_details_fixture(42, "Asa", "bottom-right").to_string())
        .create_async()
        .await;

    let mut controller = WidgetController::new(
        bot_config(),
        Page::default(),
        environment(&server.url(), UNUSED_URL),
    )?;
    controller.show_assistant();

    let request = json!({"type": "alphablocks-request-session-cookie"});
    controller.handle_message(request.clone()).await;
    controller.render_wrapper().await;
    controller.handle_message(request).await;

    let messages = controller.frame_messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["data"]["cookieIsExisted"], json!(false));
    assert_eq!(messages[1]["data"]["cookieIsExisted"], json!(true));
    assert_eq!(
        messages[0]["data"]["sessionId"],
        messages[1]["data"]["sessionId"]
    );
    assert_eq!(json!(controller.end_user_id()), messages[1]["data"]["sessionId"]);
    assert!(controller
        .page()
        .cookies
        .get("alphablocks-sessionId-42")
        .is_some());

    return Ok(());
}
