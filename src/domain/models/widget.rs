use serde::Deserialize;
use serde::Serialize;

/// Construction options for a widget instance. Only `token` is required; the
/// display fields are only needed for the chat pill.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    pub token: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub bg_color: Option<String>,
    pub text_color: Option<String>,
    pub theme: Option<String>,
    pub id: Option<u64>,
    pub end_user_id: Option<String>,
    pub user_id: Option<String>,
}

impl WidgetConfig {
    pub fn new(token: &str) -> WidgetConfig {
        return WidgetConfig {
            token: token.to_string(),
            ..WidgetConfig::default()
        };
    }
}

/// Host supplied offsets that win over the computed edge margins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomOffsets {
    pub bottom: Option<String>,
    pub right: Option<String>,
}
