use crate::link::PeerLink;
use crate::media::{Capture, UserMedia};
use moot_core::model::{ParticipantId, QualityHint, TrackKind};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareKind {
    Screen,
    CoWatch,
}

struct ActiveShare {
    kind: ShareKind,
    capture: Capture,
}

/// Decides which local track occupies each outgoing slot on every live
/// link, independent of signaling state. All substitutions are sender-level
/// replacements; a failure on one link never touches the others.
///
/// Screen share adds the capture audio as an auxiliary sender and leaves
/// the microphone sender alone; co-watch replaces the microphone sender
/// with the video's audio and asks for elevated quality on the video
/// sender.
#[derive(Default)]
pub struct TrackRouter {
    user_media: Option<UserMedia>,
    share: Option<ActiveShare>,
}

type Links<'a> = &'a [(ParticipantId, Arc<dyn PeerLink>)];

impl TrackRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_user_media(&mut self, media: UserMedia) {
        self.user_media = Some(media);
    }

    pub fn user_media(&self) -> Option<&UserMedia> {
        self.user_media.as_ref()
    }

    pub fn active_share(&self) -> Option<ShareKind> {
        self.share.as_ref().map(|s| s.kind)
    }

    /// Mirror the local mute flags onto the owned tracks. Links keep their
    /// senders; a disabled track simply carries no frames.
    pub fn apply_media_flags(&self, mic_muted: bool, camera_off: bool) {
        if let Some(media) = &self.user_media {
            media.audio.set_enabled(!mic_muted);
            media.video.set_enabled(!camera_off);
        }
    }

    /// Populate a freshly created link: camera and microphone first, then
    /// whatever share is currently active, so late joiners see the share
    /// immediately.
    pub async fn attach_link(&self, peer: &ParticipantId, link: &Arc<dyn PeerLink>) {
        let Some(media) = &self.user_media else {
            return;
        };
        if let Err(e) = link.set_outgoing(TrackKind::Video, media.video.clone()).await {
            warn!("failed to route camera to {peer}: {e}");
        }
        if let Err(e) = link.set_outgoing(TrackKind::Audio, media.audio.clone()).await {
            warn!("failed to route microphone to {peer}: {e}");
        }

        if let Some(share) = &self.share {
            if let Err(e) = link
                .set_outgoing(TrackKind::Video, share.capture.video.clone())
                .await
            {
                warn!("failed to route share video to {peer}: {e}");
            }
            match (share.kind, &share.capture.audio) {
                (ShareKind::Screen, Some(audio)) => {
                    if let Err(e) = link.add_aux_audio(audio.clone()).await {
                        warn!("failed to add share audio for {peer}: {e}");
                    }
                }
                (ShareKind::CoWatch, Some(audio)) => {
                    if let Err(e) = link.set_outgoing(TrackKind::Audio, audio.clone()).await {
                        warn!("failed to route share audio to {peer}: {e}");
                    }
                }
                _ => {}
            }
            if share.kind == ShareKind::CoWatch {
                if let Err(e) = link
                    .request_quality(TrackKind::Video, QualityHint::co_watch())
                    .await
                {
                    warn!("quality hint failed for {peer}: {e}");
                }
            }
        }
    }

    /// Swap the display capture into every link's video slot and attach its
    /// system audio as auxiliary senders.
    pub async fn start_screen(&mut self, capture: Capture, links: Links<'_>) {
        info!("starting screen share");
        for (peer, link) in links {
            if let Err(e) = link.set_outgoing(TrackKind::Video, capture.video.clone()).await {
                warn!("failed to route screen video to {peer}: {e}");
            }
            if let Some(audio) = &capture.audio {
                if let Err(e) = link.add_aux_audio(audio.clone()).await {
                    warn!("failed to add screen audio for {peer}: {e}");
                }
            }
        }
        self.share = Some(ActiveShare {
            kind: ShareKind::Screen,
            capture,
        });
    }

    /// Detach auxiliary audio and restore the camera on every link. The
    /// camera track goes back even when the camera is off; the sender then
    /// carries a disabled track rather than dangling.
    pub async fn stop_screen(&mut self, links: Links<'_>) {
        let Some(share) = self.share.take_if(|s| s.kind == ShareKind::Screen) else {
            return;
        };
        info!("stopping screen share");
        share.capture.stop();
        for (peer, link) in links {
            if let Err(e) = link.remove_aux_audio().await {
                warn!("failed to remove screen audio for {peer}: {e}");
            }
            if let Some(media) = &self.user_media {
                if let Err(e) = link.set_outgoing(TrackKind::Video, media.video.clone()).await {
                    warn!("failed to restore camera for {peer}: {e}");
                }
            }
        }
    }

    /// Route a captured playback stream like a screen share, but through
    /// the primary senders and with an elevated quality request.
    pub async fn start_co_watch(&mut self, capture: Capture, links: Links<'_>) {
        info!(name = capture.video.id(), "starting co-watch share");
        for (peer, link) in links {
            if let Err(e) = link.set_outgoing(TrackKind::Video, capture.video.clone()).await {
                warn!("failed to route co-watch video to {peer}: {e}");
            }
            if let Err(e) = link
                .request_quality(TrackKind::Video, QualityHint::co_watch())
                .await
            {
                warn!("quality hint failed for {peer}: {e}");
            }
            if let Some(audio) = &capture.audio {
                if let Err(e) = link.set_outgoing(TrackKind::Audio, audio.clone()).await {
                    warn!("failed to route co-watch audio to {peer}: {e}");
                }
            }
        }
        self.share = Some(ActiveShare {
            kind: ShareKind::CoWatch,
            capture,
        });
    }

    /// Stop the captured tracks and revert every link to camera and
    /// microphone.
    pub async fn stop_co_watch(&mut self, links: Links<'_>) {
        let Some(share) = self.share.take_if(|s| s.kind == ShareKind::CoWatch) else {
            return;
        };
        info!("stopping co-watch share");
        share.capture.stop();
        for (peer, link) in links {
            if let Some(media) = &self.user_media {
                if let Err(e) = link.set_outgoing(TrackKind::Video, media.video.clone()).await {
                    warn!("failed to restore camera for {peer}: {e}");
                }
                if let Err(e) = link.set_outgoing(TrackKind::Audio, media.audio.clone()).await {
                    warn!("failed to restore microphone for {peer}: {e}");
                }
            } else if let Err(e) = link.clear_outgoing(TrackKind::Video).await {
                warn!("failed to clear video for {peer}: {e}");
            }
        }
    }

    /// Stop everything the router owns besides the camera/microphone
    /// bundle, which the engine stops itself on leave.
    pub async fn stop_all(&mut self, links: Links<'_>) {
        self.stop_screen(links).await;
        self.stop_co_watch(links).await;
    }
}
