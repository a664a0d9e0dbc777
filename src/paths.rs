use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct DataPaths {
    pub schedule: PathBuf,
    pub feed: PathBuf,
    pub overrides: PathBuf,
    pub changes: PathBuf,
}

impl DataPaths {
    pub fn under(root: &Path) -> Self {
        Self {
            schedule: root.join("raw").join("dub-schedule.json"),
            feed: root.join("raw").join("dub-episode-feed.json"),
            overrides: root.join("custom").join("custom-dubs.json"),
            changes: root.join("changes.txt"),
        }
    }
}

pub fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("dubfeed"))
}
