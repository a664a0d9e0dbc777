use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::app::window::WindowPolicy;
use crate::cli::Cli;
use crate::error::SyncError;
use crate::paths::{DataPaths, default_data_dir};

#[derive(Debug, Clone)]
pub(crate) struct SyncConfig {
    pub(crate) token: Option<String>,
    pub(crate) base_url: String,
    pub(crate) data_dir: PathBuf,
    pub(crate) throttle: Duration,
    pub(crate) window: WindowPolicy,
    pub(crate) alias_confidence: f64,
    pub(crate) feed_window_days: i64,
}

impl SyncConfig {
    pub(crate) fn from_cli(cli: &Cli) -> Result<Self> {
        let data_dir = match &cli.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir()?,
        };

        Ok(Self {
            token: cli
                .token
                .as_deref()
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string),
            base_url: cli.base_url.trim_end_matches('/').to_string(),
            data_dir,
            throttle: Duration::from_millis(cli.throttle_ms),
            window: WindowPolicy {
                lookback_weeks: cli.lookback_weeks,
                lookahead_weeks: cli.lookahead_weeks,
            },
            alias_confidence: cli.alias_confidence.clamp(0.0, 1.0),
            feed_window_days: cli.feed_window_days.max(0),
        })
    }

    pub(crate) fn require_token(&self) -> Result<&str, SyncError> {
        self.token.as_deref().ok_or_else(|| {
            SyncError::Configuration(
                "ANIMESCHEDULE_TOKEN environment variable is not defined (or pass --token)"
                    .to_string(),
            )
        })
    }

    pub(crate) fn paths(&self) -> DataPaths {
        DataPaths::under(&self.data_dir)
    }
}
