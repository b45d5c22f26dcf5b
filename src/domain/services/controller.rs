#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::cart_bridge::CartBridge;
use super::cart_bridge::CartUiUpdate;
use super::iframe::FrameVersion;
use super::iframe::IFrameManager;
use super::iframe::WrapperLayout;
use super::layout::Layout;
use super::layout::PillMarkup;
use super::layout::DESKTOP_MARGIN;
use super::retry::RetryOutcome;
use super::session_store::SessionStore;
use super::session_store::CART_COOKIE;
use super::session_store::CART_SIG_COOKIE;
use crate::domain::models::AddProduct;
use crate::domain::models::AddToCartResponse;
use crate::domain::models::AssistantApiBox;
use crate::domain::models::AssistantDetails;
use crate::domain::models::Cart;
use crate::domain::models::CartCookies;
use crate::domain::models::CartIdentity;
use crate::domain::models::CustomOffsets;
use crate::domain::models::Environment;
use crate::domain::models::FrameState;
use crate::domain::models::InboundEnvelope;
use crate::domain::models::InboundEvent;
use crate::domain::models::OutboundMessage;
use crate::domain::models::PillState;
use crate::domain::models::WidgetConfig;
use crate::domain::models::WidgetError;
use crate::infrastructure::page::ClickAction;
use crate::infrastructure::page::ElementId;
use crate::infrastructure::page::Page;

pub const ASSISTANT_DETAILS_CACHE_PREFIX: &str = "alphablocks-assistant-details-";

/// Where the chat pill should be mounted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container<'a> {
    Missing,
    Id(&'a str),
    Element(ElementId),
}

impl<'a> From<&'a str> for Container<'a> {
    fn from(id: &'a str) -> Container<'a> {
        if id.is_empty() {
            return Container::Missing;
        }

        return Container::Id(id);
    }
}

impl<'a> From<Option<&'a str>> for Container<'a> {
    fn from(id: Option<&'a str>) -> Container<'a> {
        return id.map(Container::from).unwrap_or(Container::Missing);
    }
}

impl From<ElementId> for Container<'_> {
    fn from(el: ElementId) -> Self {
        return Container::Element(el);
    }
}

/// Result of a cart operation that ran off the message loop, applied to the
/// page on the next [`WidgetController::pump`] or
/// [`WidgetController::settle`].
enum CartCompletion {
    Details(Result<Cart>),
    Attributes(Result<Option<RetryOutcome>>),
    AddedProduct(AddToCartResponse, CartUiUpdate),
}

/// One embedded assistant on one page. Owns the page, the single iframe
/// handle and the page level message listener for its whole lifetime.
pub struct WidgetController {
    token: String,
    theme: String,
    name: String,
    avatar: String,
    bg_color: String,
    text_color: String,
    assistant_id: Option<u64>,
    end_user_id: String,
    user_id: Option<String>,
    iframe: Option<ElementId>,
    frame_state: FrameState,
    pill_state: PillState,
    layout: WrapperLayout,
    page: Page,
    listener: mpsc::UnboundedReceiver<Value>,
    frames: IFrameManager,
    assistant_api: AssistantApiBox,
    cart_bridge: Arc<CartBridge>,
    cart_tx: mpsc::UnboundedSender<CartCompletion>,
    cart_rx: mpsc::UnboundedReceiver<CartCompletion>,
    cart_tasks: Vec<JoinHandle<()>>,
}

impl WidgetController {
    pub fn new(
        config: WidgetConfig,
        mut page: Page,
        env: Environment,
    ) -> Result<WidgetController, WidgetError> {
        let token = config.token.trim().to_string();
        if token.is_empty() {
            return Err(WidgetError::MissingToken);
        }

        let listener = page.window.add_message_listener();
        let (cart_tx, cart_rx) = mpsc::unbounded_channel::<CartCompletion>();
        tracing::debug!(
            assistant_id = ?config.id,
            chatbot_url = env.chatbot_url.as_str(),
            "Widget created"
        );

        return Ok(WidgetController {
            token,
            theme: config.theme.unwrap_or_default(),
            name: config.name.unwrap_or_default(),
            avatar: config.avatar.unwrap_or_default(),
            bg_color: config.bg_color.unwrap_or_default(),
            text_color: config.text_color.unwrap_or_default(),
            assistant_id: config.id,
            end_user_id: config.end_user_id.unwrap_or_default(),
            user_id: config.user_id,
            iframe: None,
            frame_state: FrameState::default(),
            pill_state: PillState::default(),
            layout: WrapperLayout::default(),
            page,
            listener,
            frames: IFrameManager::new(&env.chatbot_url),
            assistant_api: env.assistant_api,
            cart_bridge: Arc::new(CartBridge::new(env.cart_api)),
            cart_tx,
            cart_rx,
            cart_tasks: vec![],
        });
    }

    pub fn page(&self) -> &Page {
        return &self.page;
    }

    pub fn page_mut(&mut self) -> &mut Page {
        return &mut self.page;
    }

    pub fn iframe(&self) -> Option<ElementId> {
        return self.iframe;
    }

    pub fn frame_state(&self) -> FrameState {
        return self.frame_state;
    }

    pub fn pill_state(&self) -> PillState {
        return self.pill_state;
    }

    pub fn end_user_id(&self) -> &str {
        return &self.end_user_id;
    }

    pub fn assistant_id(&self) -> Option<u64> {
        return self.assistant_id;
    }

    pub fn name(&self) -> &str {
        return &self.name;
    }

    pub fn layout(&self) -> &WrapperLayout {
        return &self.layout;
    }

    /// Everything posted into the iframe so far.
    pub fn frame_messages(&self) -> &[Value] {
        return self
            .iframe
            .and_then(|e| return self.page.document.element(e).content_window())
            .map(|e| return e.messages())
            .unwrap_or(&[]);
    }

    pub fn drain_frame_messages(&mut self) -> Vec<Value> {
        return match self.iframe {
            Some(iframe) => self
                .page
                .document
                .element_mut(iframe)
                .content_window_mut()
                .map(|e| return e.drain())
                .unwrap_or_default(),
            None => vec![],
        };
    }

    pub fn render_pill<'a>(
        &mut self,
        container: impl Into<Container<'a>>,
    ) -> Result<Option<ElementId>, WidgetError> {
        let container = container.into();
        if container == Container::Missing {
            return Err(WidgetError::InvalidArgument);
        }
        if self.name.is_empty() || self.avatar.is_empty() {
            return Err(WidgetError::MissingAssistantDetails);
        }

        let doc = &mut self.page.document;
        let element = match container {
            Container::Id(id) => doc
                .get_element_by_id(id)
                .ok_or_else(|| return WidgetError::ContainerNotFound(id.to_string()))?,
            Container::Element(el) => el,
            Container::Missing => return Err(WidgetError::InvalidArgument),
        };

        let markup = PillMarkup {
            name: &self.name,
            avatar: &self.avatar,
            bg_color: &self.bg_color,
            text_color: &self.text_color,
        };
        let pill = Layout::render_pill(doc, element, &markup);
        if pill.is_some() {
            self.pill_state = PillState::Shown;
        }

        return Ok(pill);
    }

    /// Runs whatever the element's click handler would. Returns false when
    /// nothing handled the click.
    pub fn click(&mut self, el: ElementId) -> bool {
        return match self.page.document.click_target(el) {
            Some(ClickAction::OpenAssistant) => {
                self.hide_chat_pill();
                self.show_assistant();
                true
            }
            None => false,
        };
    }

    pub fn hide_chat_pill(&mut self) {
        if let Some(pill) = Layout::pill(&self.page.document) {
            Layout::hide(&mut self.page.document, pill);
            self.pill_state = PillState::Hidden;
        }

        if let Some(iframe) = self.iframe {
            Layout::show(&mut self.page.document, iframe);
            self.frame_state = FrameState::Visible;
        }
    }

    pub fn show_assistant(&mut self) {
        self.open_frame(FrameVersion::Compact);
    }

    /// Opens the expanded assistant. When the visitor is already known the
    /// backend lookup is spawned on the current runtime; its handle is
    /// returned so callers may await it, but it never needs to be.
    pub fn show_assistant_on_btn_click(&mut self) -> Option<JoinHandle<()>> {
        self.open_frame(FrameVersion::Expanded);

        let assistant_id = self.assistant_id?;
        if self.end_user_id.is_empty() {
            return None;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(error = ?err, "No runtime for end user lookup");
                return None;
            }
        };

        let api = self.assistant_api.clone();
        let end_user_id = self.end_user_id.to_string();
        let user_id = self.user_id.clone();
        return Some(handle.spawn(async move {
            if let Err(err) = api
                .end_user(assistant_id, &end_user_id, user_id.as_deref())
                .await
            {
                tracing::error!(error = ?err, assistant_id, "End user lookup failed");
            }
        }));
    }

    fn open_frame(&mut self, version: FrameVersion) {
        let doc = &mut self.page.document;
        let wrapper = Layout::ensure_wrapper(doc);

        match self.iframe {
            Some(iframe) => {
                if version == FrameVersion::Compact {
                    self.frames
                        .refresh(doc, iframe, &self.token, &self.theme, version);
                }
                Layout::show(doc, iframe);
            }
            None => {
                let iframe =
                    self.frames
                        .create_iframe(doc, &self.token, &self.theme, &self.name, version);
                Layout::raise(doc, wrapper);
                doc.append_child(wrapper, iframe);
                self.iframe = Some(iframe);
                tracing::debug!(version = version.number(), "Created assistant iframe");
            }
        }

        self.frame_state = FrameState::Visible;
    }

    /// Loads the expanded frame hidden so the first open is instant. Does
    /// nothing once a frame exists.
    pub fn pre_render_assistant(&mut self) {
        if self.iframe.is_some() {
            return;
        }

        let doc = &mut self.page.document;
        let wrapper = Layout::ensure_wrapper(doc);
        let iframe = self.frames.create_iframe(
            doc,
            &self.token,
            &self.theme,
            &self.name,
            FrameVersion::Expanded,
        );
        Layout::hide(doc, iframe);
        Layout::raise(doc, wrapper);
        doc.append_child(wrapper, iframe);

        self.iframe = Some(iframe);
        self.frame_state = FrameState::Hidden;
    }

    pub fn add_custom_css(&mut self, offsets: CustomOffsets) {
        self.layout.offsets = offsets;
    }

    /// Creates the wrapper and anchors it where the assistant asks to be.
    /// Lookup failures leave the wrapper at its default position.
    pub async fn render_wrapper(&mut self) {
        let wrapper = Layout::ensure_wrapper(&mut self.page.document);

        let details = match self.assistant_details().await {
            Ok(details) => details,
            Err(err) => {
                tracing::error!(error = ?err, "Failed to resolve assistant details");
                return;
            }
        };

        if self.assistant_id.is_none() {
            self.adopt_token_session(details.id);
        }
        self.assistant_id = Some(details.id);
        if !details.name.is_empty() {
            self.name = details.name.to_string();
        }
        self.layout.position = details.position();
        Layout::apply_position(
            &mut self.page.document,
            wrapper,
            self.layout.position,
            DESKTOP_MARGIN,
        );
    }

    /// Keeps a session minted before the assistant id was known, so the
    /// visitor's id does not change mid-page.
    fn adopt_token_session(&mut self, assistant_id: u64) {
        let from = SessionStore::cookie_key(None, &self.token);
        let to = SessionStore::cookie_key(Some(assistant_id), &self.token);
        if let Some(id) = SessionStore::adopt(&mut self.page.cookies, &from, &to) {
            if self.end_user_id.is_empty() || self.end_user_id == id {
                self.end_user_id = id;
            }
        }
    }

    async fn assistant_details(&mut self) -> Result<AssistantDetails> {
        let cache_key = format!("{ASSISTANT_DETAILS_CACHE_PREFIX}{}", self.token);
        if let Some(cached) = self.page.session_storage.get_item(&cache_key) {
            match serde_json::from_str::<AssistantDetails>(cached) {
                Ok(details) => return Ok(details),
                Err(err) => tracing::warn!(error = ?err, "Ignoring unreadable cached details"),
            }
        }

        let details = self.assistant_api.assistant_details(&self.token).await?;
        self.page
            .session_storage
            .set_item(&cache_key, &serde_json::to_string(&details)?);

        return Ok(details);
    }

    /// Drains every message queued on the page listener, in arrival order,
    /// and applies whatever background cart work has finished. Never waits
    /// on the network.
    pub async fn pump(&mut self) -> usize {
        self.apply_cart_completions();

        let mut count = 0;
        while let Ok(message) = self.listener.try_recv() {
            self.handle_message(message).await;
            count += 1;
        }

        self.apply_cart_completions();
        return count;
    }

    /// Waits for every in-flight cart operation and applies its result.
    pub async fn settle(&mut self) {
        for task in std::mem::take(&mut self.cart_tasks) {
            if let Err(err) = task.await {
                tracing::error!(error = ?err, "Cart task failed");
            }
        }

        self.apply_cart_completions();
    }

    /// Cart operations started but not yet applied to the page.
    pub fn pending_cart_operations(&self) -> usize {
        return self.cart_tasks.len();
    }

    /// Entry point of the page `message` listener. Never fails: malformed
    /// envelopes are dropped and handler errors are logged. Cart events only
    /// start their network work here; replies follow on a later `pump`.
    pub async fn handle_message(&mut self, raw: Value) {
        let envelope = match InboundEnvelope::parse(&raw) {
            Some(envelope) => envelope,
            None => {
                tracing::trace!("Ignoring unrecognised message");
                return;
            }
        };

        if let (Some(sender), Some(own)) = (envelope.assistant_id, self.assistant_id) {
            if sender != own {
                tracing::trace!(sender, own, "Ignoring message for another assistant");
                return;
            }
        }

        let name = envelope.event.name();
        tracing::debug!(event = name, "Handling message");
        if let Err(err) = self.dispatch(envelope.event) {
            tracing::error!(error = ?err, event = name, "Message handler failed");
        }
    }

    fn dispatch(&mut self, event: InboundEvent) -> Result<()> {
        match event {
            InboundEvent::Resize(request) => {
                self.frames
                    .set_iframe_size(&mut self.page, self.iframe, &request, &self.layout);
            }
            InboundEvent::RequestOriginalSize => {
                self.frames
                    .send_original_window_message(&mut self.page, self.iframe)?;
            }
            InboundEvent::HideIframe => {
                self.hide_iframe();
            }
            InboundEvent::RequestSessionCookie => {
                self.send_session_cookie()?;
            }
            InboundEvent::RequestParentUrl => {
                let key = SessionStore::cookie_key(self.assistant_id, &self.token);
                let session = SessionStore::get_cookie(&self.page.cookies, &key);
                self.frames
                    .send_parent_url_params(&mut self.page, self.iframe, &session)?;
            }
            InboundEvent::RequestCartCookie => {
                let message = OutboundMessage::CartCookie {
                    cart: SessionStore::get_cookie(&self.page.cookies, CART_COOKIE),
                    cart_sig: SessionStore::get_cookie(&self.page.cookies, CART_SIG_COOKIE),
                };
                self.frames
                    .post(&mut self.page.document, self.iframe, &message)?;
            }
            InboundEvent::StoreCartCookie(cookies) => {
                self.store_cart_cookie(cookies);
            }
            InboundEvent::SetCartAttributes(identity) => {
                self.set_cart_attributes(identity);
            }
            InboundEvent::AddProductToCart(product) => {
                self.add_product_to_cart(product);
            }
            InboundEvent::GetCartDetails => {
                if !IFrameManager::has_content_window(&self.page.document, self.iframe) {
                    return Ok(());
                }
                let bridge = self.cart_bridge.clone();
                self.spawn_cart(async move {
                    return CartCompletion::Details(bridge.get_cart_details().await);
                });
            }
            InboundEvent::NudgeRender => {
                if let Some(iframe) = self.iframe {
                    Layout::show(&mut self.page.document, iframe);
                    self.frame_state = FrameState::Visible;
                }
            }
        }

        return Ok(());
    }

    fn spawn_cart<F>(&mut self, work: F)
    where
        F: Future<Output = CartCompletion> + Send + 'static,
    {
        let tx = self.cart_tx.clone();
        self.cart_tasks.push(tokio::spawn(async move {
            if tx.send(work.await).is_err() {
                tracing::debug!("Widget dropped before cart operation finished");
            }
        }));
    }

    fn apply_cart_completions(&mut self) {
        while let Ok(completion) = self.cart_rx.try_recv() {
            if let Err(err) = self.complete_cart(completion) {
                tracing::error!(error = ?err, "Failed to apply cart result");
            }
        }

        self.cart_tasks.retain(|e| return !e.is_finished());
    }

    fn complete_cart(&mut self, completion: CartCompletion) -> Result<()> {
        match completion {
            CartCompletion::Details(res) => {
                let cart = res?;
                self.frames.post(
                    &mut self.page.document,
                    self.iframe,
                    &OutboundMessage::CartDetails(cart),
                )?;
            }
            CartCompletion::Attributes(res) => {
                res?;
            }
            CartCompletion::AddedProduct(res, ui) => {
                ui.apply(&mut self.page.document);
                self.frames.post(
                    &mut self.page.document,
                    self.iframe,
                    &OutboundMessage::AddProductToCart(res),
                )?;
            }
        }

        return Ok(());
    }

    fn hide_iframe(&mut self) {
        if self.iframe.is_none() {
            return;
        }

        if IFrameManager::hide_iframe(&mut self.page.document, self.iframe) {
            self.pill_state = PillState::Shown;
        }
        self.frame_state = FrameState::Hidden;
    }

    fn send_session_cookie(&mut self) -> Result<()> {
        let key = SessionStore::cookie_key(self.assistant_id, &self.token);
        let session = SessionStore::get_or_create(&mut self.page.cookies, &key);
        self.end_user_id = session.id.to_string();

        let message = OutboundMessage::SessionCookie {
            session_id: session.id,
            cookie_is_existed: session.existed,
            user_id: self.user_id.clone(),
        };
        self.frames
            .post(&mut self.page.document, self.iframe, &message)?;

        return Ok(());
    }

    fn store_cart_cookie(&mut self, cookies: CartCookies) {
        if let Some(cart) = &cookies.cart {
            SessionStore::write_cookie(&mut self.page.cookies, CART_COOKIE, cart);
        }
        if let Some(cart_sig) = &cookies.cart_sig {
            SessionStore::write_cookie(&mut self.page.cookies, CART_SIG_COOKIE, cart_sig);
        }

        self.page.location.reload();
    }

    fn set_cart_attributes(&mut self, identity: CartIdentity) {
        let assistant_id = identity.assistant_id.or(self.assistant_id);
        let end_user_id = identity
            .end_user_id
            .filter(|e| return !e.is_empty())
            .unwrap_or_else(|| return self.end_user_id.to_string());

        let bridge = self.cart_bridge.clone();
        self.spawn_cart(async move {
            let res = bridge.set_cart_attributes(assistant_id, &end_user_id).await;
            return CartCompletion::Attributes(res);
        });
    }

    fn add_product_to_cart(&mut self, product: AddProduct) {
        let variant_id = match product.variant_id {
            Some(id) => id,
            None => return,
        };
        if !IFrameManager::has_content_window(&self.page.document, self.iframe) {
            return;
        }

        let section = CartBridge::find_cart_section(&self.page.document);
        let bridge = self.cart_bridge.clone();
        let assistant_id = self.assistant_id;
        let end_user_id = self.end_user_id.to_string();
        self.spawn_cart(async move {
            let (res, ui) = bridge
                .add_product(
                    variant_id,
                    product.quantity,
                    assistant_id,
                    &end_user_id,
                    section,
                )
                .await;
            return CartCompletion::AddedProduct(res, ui);
        });
    }
}
