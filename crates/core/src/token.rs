//! Access-token seam between the sync engine and the host application.

use crate::errors::{Error, Result};

/// Supplies the bearer token attached to every remote call.
///
/// Hosts back this with whatever credential storage they use (keyring,
/// session state). Returning `None` means the user must re-authenticate.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Result<Option<String>>;
}

/// Fixed token, for hosts that manage the session themselves and for tests.
pub struct StaticTokenProvider(pub String);

impl TokenProvider for StaticTokenProvider {
    fn access_token(&self) -> Result<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

/// Resolve the current token or fail the cycle with an auth error.
pub fn require_token(provider: &dyn TokenProvider) -> Result<String> {
    provider
        .access_token()?
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::auth("no access token configured; please sign in first"))
}
