use thiserror::Error;

/// Caller misuse of the widget API. These are raised synchronously; every
/// other failure is logged and absorbed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WidgetError {
    #[error("A non-empty token is required")]
    MissingToken,
    #[error("Please provide either id or element")]
    InvalidArgument,
    #[error("Please provide assistant details")]
    MissingAssistantDetails,
    #[error("Container not found: {0}")]
    ContainerNotFound(String),
}
