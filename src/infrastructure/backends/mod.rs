mod alphablocks;
mod storefront;

use std::sync::Arc;

pub use alphablocks::*;
pub use storefront::*;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Environment;

pub struct BackendManager {}

impl BackendManager {
    /// Collaborators wired against the configured endpoints.
    pub fn get() -> Environment {
        return Environment {
            chatbot_url: Config::get(ConfigKey::ChatbotURL),
            assistant_api: Arc::<AlphaBlocksApi>::default(),
            cart_api: Arc::<StorefrontCart>::default(),
        };
    }
}
