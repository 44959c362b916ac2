//! Caller authentication.

use std::collections::HashMap;

use anyhow::anyhow;

use crate::domain::PlayerId;
use crate::error::Unauthorized;

/// Turns a connection's bearer token into a verified player identity.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<PlayerId, Unauthorized>;
}

/// Fixed token table, configured at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    tokens: HashMap<String, PlayerId>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_player(mut self, name: &str, token: &str) -> Self {
        self.insert(PlayerId::from(name), token.to_string());
        self
    }

    pub fn insert(&mut self, player: PlayerId, token: String) {
        self.tokens.insert(token, player);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Parse a `NAME=TOKEN` pair.
pub fn parse_token_entry(raw: &str) -> anyhow::Result<(PlayerId, String)> {
    let (name, token) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=TOKEN, got {:?}", raw))?;
    let (name, token) = (name.trim(), token.trim());
    if name.is_empty() || token.is_empty() {
        return Err(anyhow!("empty name or token in {:?}", raw));
    }
    Ok((PlayerId::from(name), token.to_string()))
}

#[async_trait::async_trait]
impl IdentityProvider for StaticIdentity {
    async fn authenticate(&self, token: &str) -> Result<PlayerId, Unauthorized> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(Unauthorized::BadCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_token_maps_to_player() {
        let ids = StaticIdentity::new().with_player("alice", "t-1");
        assert_eq!(ids.authenticate("t-1").await, Ok(PlayerId::from("alice")));
        assert_eq!(ids.authenticate("t-2").await, Err(Unauthorized::BadCredential));
    }

    #[test]
    fn parses_entries() {
        let (player, token) = parse_token_entry("bob=xyz").unwrap();
        assert_eq!(player, PlayerId::from("bob"));
        assert_eq!(token, "xyz");
        assert!(parse_token_entry("bob").is_err());
        assert!(parse_token_entry("=xyz").is_err());
    }
}
