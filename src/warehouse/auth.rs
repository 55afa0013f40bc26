//! Access tokens for the Google REST APIs
//!
//! Credential acquisition itself is delegated: a token is taken from
//! `GOOGLE_OAUTH_ACCESS_TOKEN` when set, otherwise from the gcloud CLI using
//! the application-default credentials.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::OpsError;

/// Ambient credentials for the warehouse
#[derive(Debug, Clone)]
pub struct Credentials {
    pub credentials_path: PathBuf,
    access_token: String,
}

impl Credentials {
    pub fn new(credentials_path: impl Into<PathBuf>, access_token: impl Into<String>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Resolve a bearer token for the credential file at `credentials_path`.
    pub async fn acquire(credentials_path: &Path) -> Result<Self> {
        if let Some(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
        {
            debug!("Using access token from GOOGLE_OAUTH_ACCESS_TOKEN");
            return Ok(Self::new(credentials_path, token.trim()));
        }

        debug!("Requesting access token from gcloud");
        let output = tokio::process::Command::new("gcloud")
            .args(["auth", "application-default", "print-access-token"])
            .env("GOOGLE_APPLICATION_CREDENTIALS", credentials_path)
            .output()
            .await
            .context("Failed to run gcloud to obtain an access token")?;

        if !output.status.success() {
            return Err(OpsError::Credentials(format!(
                "gcloud could not print an access token: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))
            .into());
        }

        let token = String::from_utf8(output.stdout)
            .context("gcloud returned a non UTF-8 token")?
            .trim()
            .to_string();
        if token.is_empty() {
            return Err(OpsError::Credentials("gcloud returned an empty token".to_string()).into());
        }
        Ok(Self::new(credentials_path, token))
    }
}
