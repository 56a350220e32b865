mod devices;
mod track;

pub use devices::{Capture, SampleDevices, UserMedia};
pub use track::LocalTrack;

use crate::error::MediaError;
use async_trait::async_trait;

/// Platform media acquisition. Every operation is fallible and must report
/// permission/capability problems distinctly from generic failures; the
/// engine surfaces them only to the local participant.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Camera + microphone. The caller becomes the owner of the returned
    /// tracks and is the only party allowed to stop them.
    async fn user_media(&self) -> Result<UserMedia, MediaError>;

    /// Screen capture, optionally with system audio. The returned capture
    /// carries an end-of-capture hook (user hit the platform "stop sharing"
    /// control).
    async fn display_media(&self) -> Result<Capture, MediaError>;

    /// Virtual capture of a locally playing shared video.
    async fn playback_capture(&self, name: &str) -> Result<Capture, MediaError>;
}
