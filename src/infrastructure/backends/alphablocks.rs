#[cfg(test)]
#[path = "alphablocks_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::AssistantApi;
use crate::domain::models::AssistantDetails;
use crate::domain::models::AssistantDetailsResponse;

pub struct AlphaBlocksApi {
    url: String,
}

impl Default for AlphaBlocksApi {
    fn default() -> AlphaBlocksApi {
        return AlphaBlocksApi::new(&Config::get(ConfigKey::ApiURL));
    }
}

impl AlphaBlocksApi {
    pub fn new(url: &str) -> AlphaBlocksApi {
        return AlphaBlocksApi {
            url: url.trim_end_matches('/').to_string(),
        };
    }
}

#[async_trait]
impl AssistantApi for AlphaBlocksApi {
    #[allow(clippy::implicit_return)]
    async fn assistant_details(&self, token: &str) -> Result<AssistantDetails> {
        let res = reqwest::Client::new()
            .get(format!(
                "{url}/assistant/widget/assistant-details/",
                url = self.url
            ))
            .query(&[("token", token), ("origin", "sdk")])
            .bearer_auth(token)
            .header("Content-Type", "*")
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(
                status = res.status().as_u16(),
                "Failed to fetch assistant details"
            );
            bail!("Failed to fetch assistant details");
        }

        let body = res.json::<AssistantDetailsResponse>().await?;
        tracing::debug!(assistant_id = body.data.id, "Fetched assistant details");

        return Ok(body.data);
    }

    #[allow(clippy::implicit_return)]
    async fn end_user(
        &self,
        assistant_id: u64,
        end_user_id: &str,
        user_id: Option<&str>,
    ) -> Result<Value> {
        let assistant_id = assistant_id.to_string();
        let mut query = vec![
            ("assistant_id", assistant_id.as_str()),
            ("end_user_id", end_user_id),
        ];
        if let Some(user_id) = user_id {
            query.push(("user_id", user_id));
        }

        let res = reqwest::Client::new()
            .get(format!("{url}/chat/widget/get-user/", url = self.url))
            .query(&query)
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(status = res.status().as_u16(), "Failed to fetch end user");
            bail!("Failed to fetch end user");
        }

        return Ok(res.json::<Value>().await?);
    }
}
