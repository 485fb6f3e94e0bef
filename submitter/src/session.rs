//! Credentials attached to outgoing judge requests.

use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Supplies the `Authorization` header value for each request.
pub trait CredentialProvider: Send + Sync {
    /// `None` means the request is sent without credentials.
    fn authorization(&self) -> Option<String>;
}

/// The token of the current login session. Can be swapped while clients that
/// share it are in use; each request reads the token once, when it is sent.
#[derive(Debug, Default)]
pub struct SessionToken {
    token: ArcSwapOption<String>,
}

impl SessionToken {
    pub fn new(token: Option<String>) -> SessionToken {
        let s = SessionToken::default();
        if let Some(token) = token {
            s.login(token);
        }
        s
    }

    /// Replace the current token. An empty token logs out.
    pub fn login(&self, token: impl Into<String>) {
        let token = token.into();
        if token.is_empty() {
            self.logout();
        } else {
            self.token.store(Some(Arc::new(token)));
        }
    }

    pub fn logout(&self) {
        self.token.store(None);
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.load().is_some()
    }
}

impl CredentialProvider for SessionToken {
    fn authorization(&self) -> Option<String> {
        self.token.load_full().map(|t| (*t).clone())
    }
}

/// No credentials at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl CredentialProvider for Anonymous {
    fn authorization(&self) -> Option<String> {
        None
    }
}
