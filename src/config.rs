//! Shim configuration
//!
//! Defaults describe a plain desktop-sized page served from `https://example.com`.
//! Values can be overridden from JSON or from `PAGESHIM_*` environment variables.

use crate::utils::{Result, ShimError};
use serde::Deserialize;
use std::env;

/// How the legacy request client decides that its completion has arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyCompletion {
    /// Completion is tracked explicitly; an empty successful body still completes
    #[default]
    Explicit,
    /// An empty successful body is treated as "nothing arrived yet" and ignored
    EmptySentinel,
}

impl LegacyCompletion {
    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "explicit" => Some(Self::Explicit),
            "empty_sentinel" | "empty-sentinel" => Some(Self::EmptySentinel),
            _ => None,
        }
    }
}

/// Configuration for a shim environment
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    /// Origin the page is considered to be served from
    pub origin: String,
    /// `navigator.userAgent`
    pub user_agent: String,
    /// `navigator.platform`
    pub platform: String,
    /// `screen.width`
    pub screen_width: u32,
    /// `screen.height`
    pub screen_height: u32,
    /// `window.screenX`
    pub screen_x: i32,
    /// `window.screenY`
    pub screen_y: i32,
    /// Completion tracking mode for `XMLHttpRequest`
    pub legacy_completion: LegacyCompletion,
    /// How long the event loop waits for outstanding native completions
    pub idle_timeout_ms: u64,
    /// Tag name of the element addressed as `/0`
    pub root_tag: String,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            origin: "https://example.com".to_string(),
            user_agent: "pageshim".to_string(),
            platform: "linux".to_string(),
            screen_width: 1280,
            screen_height: 1024,
            screen_x: 0,
            screen_y: 25,
            legacy_completion: LegacyCompletion::Explicit,
            idle_timeout_ms: 10_000,
            root_tag: "BODY".to_string(),
        }
    }
}

impl ShimConfig {
    /// Load a configuration from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ShimError::Config(e.to_string()))
    }

    /// Defaults overridden by `PAGESHIM_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(origin) = lookup("PAGESHIM_ORIGIN") {
            self.origin = origin;
        }
        if let Some(user_agent) = lookup("PAGESHIM_USER_AGENT") {
            self.user_agent = user_agent;
        }
        if let Some(mode) = lookup("PAGESHIM_LEGACY_COMPLETION") {
            self.legacy_completion = LegacyCompletion::parse(&mode).ok_or_else(|| {
                ShimError::Config(format!("unknown legacy completion mode '{}'", mode))
            })?;
        }
        if let Some(ms) = lookup("PAGESHIM_IDLE_TIMEOUT_MS") {
            self.idle_timeout_ms = ms
                .parse()
                .map_err(|_| ShimError::Config(format!("invalid idle timeout '{}'", ms)))?;
        }
        Ok(self)
    }
}
