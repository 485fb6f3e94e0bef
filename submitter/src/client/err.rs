use err_derive::Error;
use reqwest::StatusCode;

use super::model::ErrorBody;

pub const GENERIC_VALIDATION_MSG: &str = "Submission was rejected by the judge";
pub const STREAM_UNAVAILABLE_MSG: &str = "stream unavailable";

#[derive(Debug, Error)]
pub enum ClientError {
    /// The judge rejected the request as malformed (`400 Bad Request`).
    #[error(display = "{}", _0)]
    Validation(String),

    /// The judge or the transport failed to deliver a usable response.
    #[error(display = "{}", _0)]
    Transport(String),

    #[error(display = "Web request error: {}", _0)]
    Network(#[error(source)] reqwest::Error),

    #[error(display = "IO error: {}", _0)]
    Io(#[error(source)] std::io::Error),

    #[error(display = "Progress callback failed: {:#}", _0)]
    Callback(anyhow::Error),

    #[error(display = "Submission was cancelled")]
    Cancelled,
}

impl ClientError {
    /// Whether this error belongs to the transport tier (as opposed to the
    /// judge refusing the request, or a local failure).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::Network(_) | ClientError::Io(_)
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }

    /// Build the error for a non-success response from its status and raw body.
    pub fn from_status(status: StatusCode, body: &[u8]) -> ClientError {
        if status == StatusCode::BAD_REQUEST {
            let msg = serde_json::from_slice::<ErrorBody>(body)
                .ok()
                .and_then(|b| b.msg)
                .filter(|m| !m.is_empty());
            match msg {
                Some(msg) => ClientError::Validation(msg),
                None => {
                    tracing::debug!(
                        "400 response without usable message: {}",
                        String::from_utf8_lossy(body)
                    );
                    ClientError::Validation(GENERIC_VALIDATION_MSG.into())
                }
            }
        } else {
            let text = String::from_utf8_lossy(body);
            if text.trim().is_empty() {
                ClientError::Transport(format!("Submission failed with status {}", status))
            } else {
                ClientError::Transport(text.into_owned())
            }
        }
    }
}
