// ABOUTME: Client auth attachment: query-param or subprotocol mode, fresh token per connect attempt
// ABOUTME: A token provider is re-invoked on every attempt so refreshed tokens reach reconnects

use crate::error::{Result, WirelinkError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Supplies a fresh auth token; called once per connect attempt so a refreshed
/// token reaches every reconnect, not just the first connect.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> BoxFuture<'_, Option<String>>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> BoxFuture<'static, Option<String>> + Send + Sync,
{
    fn token(&self) -> BoxFuture<'_, Option<String>> {
        (self)()
    }
}

#[derive(Debug, Clone)]
pub enum AuthMode {
    QueryParam { param: String },
    Subprotocol { prefix: String },
}

impl Default for AuthMode {
    fn default() -> Self {
        AuthMode::QueryParam {
            param: crate::constants::DEFAULT_AUTH_QUERY_PARAM.to_string(),
        }
    }
}

/// Attach `token` to the connect URL and/or subprotocol list per `mode`.
/// `base_subprotocols` are the caller's application-level subprotocols;
/// auth-mode subprotocol values are appended and deduplicated.
pub fn attach(
    mode: &AuthMode,
    token: Option<&str>,
    url: &str,
    base_subprotocols: &[String],
) -> Result<(String, Vec<String>)> {
    let token = match token {
        Some(t) => t,
        None => return Ok((url.to_string(), base_subprotocols.to_vec())),
    };

    match mode {
        AuthMode::QueryParam { param } => {
            let separator = if url.contains('?') { '&' } else { '?' };
            let url = format!("{}{}{}={}", url, separator, param, token);
            Ok((url, base_subprotocols.to_vec()))
        }
        AuthMode::Subprotocol { prefix } => {
            let mut subprotocols = base_subprotocols.to_vec();
            let value = format!("{}{}", prefix, token);
            if !subprotocols.contains(&value) {
                subprotocols.push(value);
            }
            Ok((url.to_string(), subprotocols))
        }
    }
}

/// RFC 6455 forbids whitespace and commas in a subprotocol token. Reject a
/// prefix containing either here, at client construction, instead of letting
/// a malformed handshake fail deep inside a connect attempt.
pub fn validate_subprotocol_prefix(prefix: &str) -> Result<()> {
    if prefix.chars().any(|c| c.is_whitespace() || c == ',') {
        return Err(WirelinkError::config(format!(
            "subprotocol prefix '{}' must not contain whitespace or commas",
            prefix
        )));
    }
    Ok(())
}

pub fn static_token(token: impl Into<String>) -> Arc<dyn TokenProvider> {
    let token = token.into();
    Arc::new(move || -> BoxFuture<'static, Option<String>> {
        let token = token.clone();
        Box::pin(async move { Some(token) })
    })
}
