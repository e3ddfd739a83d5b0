use thiserror::Error;

/// Any failure to retrieve a snapshot from the Nest API.
///
/// Transport, authentication and decoding failures are reported the same way;
/// the message is only meant for logs.
#[derive(Debug, Error)]
#[error("failed to fetch {resource}: {message}")]
pub struct FetchError {
    pub resource: &'static str,
    pub message: String,
}

impl FetchError {
    pub fn new(resource: &'static str, message: impl Into<String>) -> Self {
        Self {
            resource,
            message: message.into(),
        }
    }
}
