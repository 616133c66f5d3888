use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("response field '{0}' is missing")]
    MissingField(&'static str),

    #[error("response field '{field}' is not valid embedded JSON: {source}")]
    EmbeddedJson {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("response field '{field}' has an unexpected shape: {message}")]
    Shape {
        field: &'static str,
        message: String,
    },

    #[error("response field '{field}' uses the legacy flat tile layout, which is not supported")]
    LegacyShape { field: &'static str },

    #[error("could not decode response body: {0}")]
    Body(#[from] serde_json::Error),
}

impl ProtocolError {
    pub fn shape(field: &'static str, message: impl Into<String>) -> Self {
        Self::Shape {
            field,
            message: message.into(),
        }
    }
}
