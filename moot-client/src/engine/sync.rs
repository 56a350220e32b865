use moot_core::model::PlaybackState;
use std::time::{Duration, Instant};
use tracing::debug;

/// Remote playback updates older than this are dropped.
pub const STALE_AFTER_MS: u64 = 5_000;
/// Local player events within this window of an applied remote update are
/// echoes of that update, not user actions.
pub const ECHO_SUPPRESS: Duration = Duration::from_millis(500);
/// Position is corrected only past this drift, to avoid visible jitter.
pub const DRIFT_SECONDS: f64 = 2.0;

/// What the follower's local player should do after a remote update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackDirective {
    pub seek: Option<f64>,
    pub set_playing: Option<bool>,
}

#[derive(Debug, Clone, Copy)]
struct LocalPlayback {
    is_playing: bool,
    position: f64,
    at: Instant,
}

/// Loose play/pause/position coupling for a co-watched video. The sharer
/// broadcasts; everyone else follows. Clocks are passed in explicitly so
/// the staleness and suppression rules test without sleeping.
#[derive(Debug, Default)]
pub struct PlaybackSync {
    local: Option<LocalPlayback>,
    applied_remote_at: Option<Instant>,
}

impl PlaybackSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.local = None;
        self.applied_remote_at = None;
    }

    /// Local position extrapolated from the last report.
    fn estimated_position(&self, now: Instant) -> Option<f64> {
        self.local.map(|l| {
            if l.is_playing {
                l.position + now.duration_since(l.at).as_secs_f64()
            } else {
                l.position
            }
        })
    }

    /// Record a local player event. Returns whether the broadcaster should
    /// publish it: events inside the echo-suppression window were caused by
    /// a just-applied remote update and stay local.
    pub fn note_local(&mut self, is_playing: bool, position: f64, now: Instant) -> bool {
        self.local = Some(LocalPlayback {
            is_playing,
            position,
            at: now,
        });
        match self.applied_remote_at {
            Some(applied) if now.duration_since(applied) <= ECHO_SUPPRESS => false,
            _ => true,
        }
    }

    /// Follower side: decide what to do with a published playback record.
    /// Stale records are dropped; position is resynchronized only past the
    /// drift threshold; play/pause applies without a seek otherwise.
    pub fn apply_remote(
        &mut self,
        remote: &PlaybackState,
        now_wall_ms: u64,
        now: Instant,
    ) -> Option<PlaybackDirective> {
        if now_wall_ms.saturating_sub(remote.updated_at) > STALE_AFTER_MS {
            debug!(
                updated_at = remote.updated_at,
                now_wall_ms, "dropping stale playback update"
            );
            return None;
        }

        let drift = self
            .estimated_position(now)
            .map(|pos| (pos - remote.position).abs());
        let seek = match drift {
            Some(d) if d <= DRIFT_SECONDS => None,
            _ => Some(remote.position),
        };
        let set_playing = match self.local {
            Some(l) if l.is_playing == remote.is_playing => None,
            _ => Some(remote.is_playing),
        };

        self.applied_remote_at = Some(now);
        self.local = Some(LocalPlayback {
            is_playing: remote.is_playing,
            position: remote.position,
            at: now,
        });

        if seek.is_none() && set_playing.is_none() {
            return None;
        }
        Some(PlaybackDirective { seek, set_playing })
    }
}
