//! Authorization strategies for HTTP Basic credentials.
//!
//! A strategy is picked once at startup and shared by every request; the
//! handler only sees `validate(identity, secret)`.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const GITHUB_API_BASE: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("lfs-batch-gateway/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user must be member of Github organization {0}")]
    NotOrgMember(String),
    #[error("organization lookup failed: {0}")]
    Lookup(#[from] reqwest::Error),
}

#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// `Ok(())` when the identity/secret pair is allowed through.
    async fn validate(&self, identity: &str, secret: &str) -> Result<(), AuthError>;
}

/// Exact match against a single configured user and password.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    user: String,
    pass: String,
}

impl StaticCredentials {
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
        }
    }
}

#[async_trait]
impl AuthStrategy for StaticCredentials {
    async fn validate(&self, identity: &str, secret: &str) -> Result<(), AuthError> {
        if identity != self.user || secret != self.pass {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct GithubOrg {
    login: String,
}

/// Treats the secret as a GitHub token and requires membership of `org`.
/// The identity half of the credentials is ignored.
#[derive(Debug, Clone)]
pub struct GithubOrgMembership {
    org: String,
    api_base: String,
    client: reqwest::Client,
}

impl GithubOrgMembership {
    pub fn new(org: impl Into<String>) -> Self {
        Self::with_api_base(org, GITHUB_API_BASE)
    }

    /// Same as [`GithubOrgMembership::new`] against a different API root.
    pub fn with_api_base(org: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn user_orgs(&self, token: &str) -> Result<Vec<GithubOrg>, reqwest::Error> {
        self.client
            .get(format!("{}/user/orgs", self.api_base))
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .query(&[("per_page", "100")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl AuthStrategy for GithubOrgMembership {
    async fn validate(&self, _identity: &str, secret: &str) -> Result<(), AuthError> {
        let orgs = self.user_orgs(secret).await?;
        debug!(org = %self.org, memberships = orgs.len(), "fetched GitHub organizations");

        if orgs.iter().any(|o| o.login == self.org) {
            Ok(())
        } else {
            Err(AuthError::NotOrgMember(self.org.clone()))
        }
    }
}
