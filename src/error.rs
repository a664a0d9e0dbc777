use thiserror::Error;

/// Failures that abort a sync run before anything is written.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("remote unavailable while fetching {target}: {reason}")]
    RemoteUnavailable { target: String, reason: String },

    #[error("malformed response for {target}: {source}")]
    MalformedResponse {
        target: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Override problems that are recovered by dropping the entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverrideIssue {
    #[error(
        "Removing {route} as it has exceeded the episode count ({episode}/{total}), it has likely finished airing."
    )]
    Finished {
        route: String,
        episode: u32,
        total: u32,
    },

    #[error("Removing malformed custom dub '{route}': {reason}")]
    MalformedOverride { route: String, reason: String },
}
