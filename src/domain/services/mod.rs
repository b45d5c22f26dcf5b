pub mod cart_bridge;
pub mod controller;
pub mod iframe;
pub mod layout;
pub mod retry;
pub mod session_store;

pub use cart_bridge::CartBridge;
pub use controller::Container;
pub use controller::WidgetController;
pub use iframe::IFrameManager;
pub use layout::Layout;
pub use retry::RetryPolicy;
pub use session_store::SessionStore;
