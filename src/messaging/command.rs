// Command types - control thread to playback thread

/// Transport and chain control, applied by the playback thread between polls
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Start playback; an unusable BPM falls back to the configured default
    Start { bpm: f64 },
    Stop,
    /// Jump to a chain slot (negative or out-of-range indices wrap or clamp)
    GotoChainSlot(isize),
    SetFollowChain(bool),
    SetLoopChain(bool),
    /// Stop playback and end the thread
    Shutdown,
}
