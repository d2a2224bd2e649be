// Session check collaborator: request headers -> principal (or none)

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use std::collections::HashMap;

use crate::config::AuthConfig;

const SESSION_COOKIE: &str = "session_token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub identity: String,
}

#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, headers: &HeaderMap) -> Option<Principal>;
}

/// Token -> identity table from `[[auth.sessions]]`. Accepts `Authorization: Bearer <token>`
/// or a `session_token` cookie.
#[derive(Debug, Clone, Default)]
pub struct StaticSessions {
    tokens: HashMap<String, String>,
}

impl StaticSessions {
    pub fn from_config(auth: &AuthConfig) -> Self {
        Self {
            tokens: auth
                .sessions
                .iter()
                .map(|s| (s.token.clone(), s.identity.clone()))
                .collect(),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE).then_some(value)
        })
}

#[async_trait]
impl SessionVerifier for StaticSessions {
    async fn verify(&self, headers: &HeaderMap) -> Option<Principal> {
        let token = bearer_token(headers).or_else(|| cookie_token(headers))?;
        self.tokens.get(token).map(|identity| Principal {
            identity: identity.clone(),
        })
    }
}
