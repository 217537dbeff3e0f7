// Playback pacing state machine: drives one simulated viewer through
// master fetch, variant selection, and the paced playlist/segment loop.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::fetch::Fetch;
use crate::playlist::{self, Segment};
use crate::resolve::{directory_of, resolve};
use crate::sample::{Sample, SampleKind};
use crate::select::select_variant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    AwaitingMaster,
    AwaitingPlaylist,
    AwaitingSegment,
    Done,
}

/// Internal outcome of one pass through the segment phase.
enum SegmentStep {
    /// A fetch happened (successfully or not) and is the step's result.
    Fetched(Sample),
    /// Every queued segment was an already-fetched duplicate; the step
    /// continues into a playlist reload without yielding.
    QueueDrained,
    /// The configured play duration was exceeded before the next fetch.
    CapReached,
}

/// One simulated viewer. `step()` advances the session by exactly one
/// state transition and performs at most one network fetch; duplicates
/// are skipped without yielding control. Not reentrant: the owner drives
/// `step()` serially.
pub struct PlaybackSession {
    fetch: Arc<dyn Fetch>,
    config: SessionConfig,
    cancel: CancellationToken,

    phase: SessionPhase,
    /// Media playlist URL, fixed once the variant is selected.
    playlist_url: Option<String>,
    /// Directory of the playlist URL, base for segment references.
    playlist_base: Option<String>,
    pending: VecDeque<Segment>,
    /// Trimmed URIs of every segment ever downloaded. Append-only for
    /// the session lifetime so a live window re-listing a segment never
    /// triggers a second fetch.
    fetched_keys: HashSet<String>,
    /// Sticky: a reload that reports no target duration keeps the
    /// previous value. Zero means none seen yet (no reload pacing).
    target_duration: u64,
    is_live: bool,
    started_at: Option<Instant>,
    last_reload_at: Option<Instant>,
    /// Seconds of content played so far; accumulates the duration of
    /// the previously downloaded segment, never the one about to be
    /// fetched. Monotonically non-decreasing.
    played_seconds: f64,
    last_segment_duration: f64,
}

// The fetch seam is a trait object, so Debug is written by hand over
// the session's own state.
impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("phase", &self.phase)
            .field("master_url", &self.config.master_url)
            .field("playlist_url", &self.playlist_url)
            .field("pending", &self.pending.len())
            .field("fetched_keys", &self.fetched_keys.len())
            .field("target_duration", &self.target_duration)
            .field("is_live", &self.is_live)
            .field("played_seconds", &self.played_seconds)
            .finish_non_exhaustive()
    }
}

impl PlaybackSession {
    /// Creates a session for the configured master playlist URL. A
    /// malformed URL is rejected here, before any fetch is attempted.
    pub fn new(config: SessionConfig, fetch: Arc<dyn Fetch>) -> Result<Self, SessionError> {
        let parsed = url::Url::parse(&config.master_url)
            .map_err(|e| SessionError::invalid_url(&config.master_url, e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SessionError::invalid_url(
                &config.master_url,
                format!("unsupported scheme `{}`", parsed.scheme()),
            ));
        }

        Ok(Self {
            fetch,
            config,
            cancel: CancellationToken::new(),
            phase: SessionPhase::AwaitingMaster,
            playlist_url: None,
            playlist_base: None,
            pending: VecDeque::new(),
            fetched_keys: HashSet::new(),
            target_duration: 0,
            is_live: false,
            started_at: None,
            last_reload_at: None,
            played_seconds: 0.0,
            last_segment_duration: 0.0,
        })
    }

    /// Attaches a cancellation token. Cancellation interrupts pacing
    /// sleeps only: the session resumes immediately and proceeds to its
    /// fetch, it does not error out.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn is_done(&self) -> bool {
        self.phase == SessionPhase::Done
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    pub fn played_seconds(&self) -> f64 {
        self.played_seconds
    }

    /// Clears all playback state so the same configured session can be
    /// restarted for a new iteration.
    pub fn reset(&mut self) {
        self.phase = SessionPhase::AwaitingMaster;
        self.playlist_url = None;
        self.playlist_base = None;
        self.pending.clear();
        self.fetched_keys.clear();
        self.target_duration = 0;
        self.is_live = false;
        self.started_at = None;
        self.last_reload_at = None;
        self.played_seconds = 0.0;
        self.last_segment_duration = 0.0;
    }

    /// Advances the session by one step and returns its fetch outcome,
    /// or `Ok(None)` once the session is done.
    ///
    /// An unsuccessful fetch is returned as a failed sample without
    /// advancing the phase, so the caller may retry the identical step.
    pub async fn step(&mut self) -> Result<Option<Sample>, SessionError> {
        loop {
            match self.phase {
                SessionPhase::AwaitingMaster => return self.step_master().await.map(Some),
                SessionPhase::AwaitingPlaylist => return self.step_playlist().await.map(Some),
                SessionPhase::AwaitingSegment => match self.step_segment().await? {
                    SegmentStep::Fetched(sample) => return Ok(Some(sample)),
                    // All duplicates: reload the playlist in this same
                    // call, keeping one network fetch per step.
                    SegmentStep::QueueDrained => continue,
                    SegmentStep::CapReached => return Ok(None),
                },
                SessionPhase::Done => return Ok(None),
            }
        }
    }

    async fn step_master(&mut self) -> Result<Sample, SessionError> {
        let master_url = self.config.master_url.clone();
        let sample = self.run_fetch(SampleKind::Master, &master_url, true).await;
        if !sample.success {
            return Ok(sample);
        }

        // The master fetch result is returned regardless of what
        // selection makes of the body; an empty or variant-less body
        // just means the supplied URL is already the media playlist.
        let body = String::from_utf8_lossy(&sample.body);
        let variants = playlist::parse_master(&body);
        let reference = match select_variant(&variants, &self.config.policy) {
            Some(variant) => {
                info!(
                    uri = %variant.uri,
                    bandwidth = variant.bandwidth,
                    "selected variant"
                );
                variant.uri.clone()
            }
            None => {
                info!("no variant matched; treating supplied URL as the media playlist");
                master_url.clone()
            }
        };

        let playlist_url = resolve(&master_url, &reference)?;
        debug!(playlist_url = %playlist_url, "media playlist resolved");
        self.playlist_base = Some(directory_of(&playlist_url));
        self.playlist_url = Some(playlist_url);
        self.started_at = Some(Instant::now());
        self.phase = SessionPhase::AwaitingPlaylist;
        Ok(sample)
    }

    async fn step_playlist(&mut self) -> Result<Sample, SessionError> {
        let Some(playlist_url) = self.playlist_url.clone() else {
            return Err(SessionError::playlist("no media playlist selected"));
        };

        // Live sources recommend refreshing no more often than half the
        // target duration. Unknown target duration applies no delay.
        if self.target_duration > 0
            && let Some(last) = self.last_reload_at
        {
            let due = last + Duration::from_millis(self.target_duration * 500);
            if Instant::now() < due {
                debug!("pacing playlist reload");
                self.pause_until(due).await;
            }
        }

        let sample = self.run_fetch(SampleKind::Playlist, &playlist_url, true).await;
        if !sample.success {
            return Ok(sample);
        }

        let body = String::from_utf8_lossy(&sample.body);
        let parsed = playlist::parse_media(&body)?;

        match parsed.target_duration {
            Some(td) if td > 0 => {
                if self.target_duration != 0 && td != self.target_duration {
                    info!(
                        old = self.target_duration,
                        new = td,
                        "playlist target duration changed"
                    );
                }
                self.target_duration = td;
            }
            _ => warn!("playlist reports no target duration; keeping previous value"),
        }

        self.is_live = parsed.is_live;
        if parsed.is_live {
            debug!("live playlist detected");
        }

        // The queue is only ever refilled here, and only when empty;
        // duplicates are filtered at fetch time against the session-wide
        // fetched set.
        self.pending.extend(parsed.segments);
        self.last_reload_at = Some(Instant::now());

        if !self.pending.is_empty() {
            self.phase = SessionPhase::AwaitingSegment;
        }
        Ok(sample)
    }

    async fn step_segment(&mut self) -> Result<SegmentStep, SessionError> {
        loop {
            let Some(segment) = self.pending.pop_front() else {
                // A drained queue still owes the final segment's duration
                // to the playback clock; a capped session may be finished
                // here rather than reloading.
                if self.fold_and_check_cap() {
                    return Ok(SegmentStep::CapReached);
                }
                self.phase = SessionPhase::AwaitingPlaylist;
                return Ok(SegmentStep::QueueDrained);
            };

            let key = segment.uri.trim().to_string();
            if self.fetched_keys.contains(&key) {
                debug!(uri = %key, "segment already fetched, skipping");
                continue;
            }

            if self.fold_and_check_cap() {
                return Ok(SegmentStep::CapReached);
            }

            // Never fetch ahead of the playback clock.
            if let Some(started) = self.started_at {
                let due = started + Duration::from_secs_f64(self.played_seconds);
                let now = Instant::now();
                if now < due {
                    debug!(
                        sleep_ms = (due - now).as_millis() as u64,
                        "pacing segment fetch"
                    );
                    self.pause_until(due).await;
                }
            }

            let base = self
                .playlist_base
                .as_deref()
                .unwrap_or(&self.config.master_url);
            let segment_url = resolve(base, &segment.uri)?;

            let sample = self
                .run_fetch(SampleKind::VideoSegment, &segment_url, false)
                .await;
            if !sample.success {
                // Leave the segment queued so the caller can retry the
                // identical step.
                self.pending.push_front(segment);
                return Ok(SegmentStep::Fetched(sample));
            }

            self.last_segment_duration = segment.duration;
            self.fetched_keys.insert(key);
            return Ok(SegmentStep::Fetched(sample));
        }
    }

    /// Folds the previous segment's duration into the playback clock and
    /// reports whether the configured play duration is now exceeded.
    /// The folded duration is cleared immediately so a failed fetch
    /// retried by the caller does not fold it twice.
    fn fold_and_check_cap(&mut self) -> bool {
        self.played_seconds += self.last_segment_duration;
        self.last_segment_duration = 0.0;

        if let Some(cap) = self.config.duration_cap
            && self.played_seconds > cap
        {
            info!(
                played_seconds = self.played_seconds,
                cap, "configured play duration reached"
            );
            self.phase = SessionPhase::Done;
            return true;
        }
        false
    }

    /// Pacing sleep. Cancellation resumes immediately; the step then
    /// proceeds straight to its fetch.
    async fn pause_until(&self, deadline: Instant) {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("pacing sleep interrupted, resuming");
            }
            _ = tokio::time::sleep_until(deadline) => {}
        }
    }

    async fn run_fetch(&self, kind: SampleKind, url: &str, collect_body: bool) -> Sample {
        let started_at = SystemTime::now();
        let started = Instant::now();
        let response = self.fetch.fetch(url, collect_body).await;
        let elapsed = started.elapsed();
        if !response.success {
            warn!(
                label = kind.label(),
                url,
                status = response.status,
                message = %response.message,
                "fetch failed"
            );
        }
        Sample::from_response(kind, url.to_string(), response, started_at, elapsed)
    }
}
