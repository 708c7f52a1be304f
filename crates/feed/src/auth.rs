use async_trait::async_trait;

use common::{Error, Result};

/// Source of bearer tokens for the provider's stream endpoint.
///
/// Called on every (re)connect so an implementation backed by a refresh
/// flow can hand out a fresh token each time.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// A fixed token, typically read from `ACCESS_TOKEN`.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        if self.token.trim().is_empty() {
            return Err(Error::Auth("access token is empty".into()));
        }
        Ok(self.token.clone())
    }
}
