use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::util::is_local_endpoint_url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chat_url: String,
    pub api_key: Option<String>,
    pub workspace: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let chat_url = std::env::var("TIDE_CHAT_URL")
            .unwrap_or_else(|_| "http://localhost:8000/chat".to_string());
        let api_key = std::env::var("TIDE_API_KEY").ok().and_then(|v| {
            if v.trim().is_empty() {
                None
            } else {
                Some(v)
            }
        });
        let workspace = match std::env::var("TIDE_WORKSPACE") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => std::env::current_dir()?,
        };

        Ok(Self {
            chat_url,
            api_key,
            workspace,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.chat_url.starts_with("http://") && !self.chat_url.starts_with("https://") {
            bail!(
                "Invalid TIDE_CHAT_URL '{}': expected http:// or https:// URL",
                self.chat_url
            );
        }

        if !self.is_local_endpoint() && self.api_key.is_none() {
            bail!(
                "TIDE_API_KEY must be set for non-local endpoints (url: '{}')",
                self.chat_url
            );
        }

        Ok(())
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.chat_url)
    }
}
