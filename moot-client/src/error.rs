use thiserror::Error;

/// Device and capture failures. Permission and capability problems are kept
/// distinct from generic failures so the caller can phrase them differently.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("permission denied for camera/microphone")]
    PermissionDenied,
    #[error("no camera or microphone found")]
    DeviceNotFound,
    #[error("capture not supported: {0}")]
    CaptureUnsupported(String),
    #[error("media failure: {0}")]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("no such meeting: {0}")]
    MeetingNotFound(String),
    #[error("mailbox backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("peer link already closed")]
    Closed,
    #[error(transparent)]
    Rtc(#[from] webrtc::Error),
    #[error("peer link failure: {0}")]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Mailbox(#[from] MailboxError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("another participant is already sharing")]
    ShareBusy,
    #[error("meeting engine is no longer running")]
    EngineGone,
}
