// Notifications - playback thread to control thread

/// Severity of a notification, for consumers that only want to surface some
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NotificationLevel {
    Trace,
    Info,
}

/// Something the playback thread did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notification {
    Started { bpm: f64 },
    Stopped,
    /// A tick was processed; `time` is the audio-clock time it sounds at
    Tick { step_index: u64, time: f64, hits: usize },
    /// The chain moved to slot `pos`
    ChainAdvanced { pos: usize },
}

impl Notification {
    pub fn level(&self) -> NotificationLevel {
        match self {
            Notification::Tick { .. } => NotificationLevel::Trace,
            _ => NotificationLevel::Info,
        }
    }
}
