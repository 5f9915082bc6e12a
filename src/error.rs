// Error types for the fallible edges of the sequencer
// Playback itself never fails: it clamps, repairs or skips. Errors come from
// loading configuration, importing pattern snapshots and controlling the
// playback thread.

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}

/// Pattern snapshot import/export errors
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pattern contains no tracks")]
    Empty,
}

/// Playback thread control errors
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("Failed to spawn playback thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Command queue is full")]
    QueueFull,

    #[error("Playback thread panicked")]
    Panicked,
}
