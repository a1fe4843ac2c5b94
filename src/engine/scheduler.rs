//! Playback Scheduler
//!
//! Turns a `ComputedTimeline` into voices on an `AudioGraph` for a session
//! starting at any output time.
//!
//! All voices of a session are placed against one captured graph time `T0`:
//! a segment starting at output time `s` plays at `T0 + max(0, s - from)`,
//! and a segment straddling `from` starts `from - s` seconds into its
//! buffer. The position is pulled, never pushed:
//!
//! ```text
//! current_time = graph.current_time() - T0 + from
//! ```

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::PlayerConfig;
use crate::engine::buffer::AudioBuffer;
use crate::engine::cache::{AudioBufferCache, PreloadReport};
use crate::engine::fade::FadeCurve;
use crate::engine::graph::{AudioGraph, GainEnvelope, Voice, VoiceId};
use crate::engine::source::ByteSource;
use crate::error::{MixlineError, Result};
use crate::timeline::{ComputedTimeline, PlaybackSegment, SegmentKind, SourceRange};

/// Playback states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "Stopped"),
            PlaybackState::Playing => write!(f, "Playing"),
            PlaybackState::Paused => write!(f, "Paused"),
        }
    }
}

/// A segment left silent because its audio could not be loaded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSegment {
    pub entry: usize,
    pub out_start: f64,
    pub out_end: f64,
    pub resource_id: String,
    pub code: &'static str,
    pub message: String,
}

/// What `play` scheduled
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionReport {
    pub from_time: f64,
    pub scheduled_voices: usize,
    pub skipped: Vec<SkippedSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    Started(SessionReport),
    /// A session was already running; nothing new was scheduled
    AlreadyPlaying,
}

impl PlayOutcome {
    pub fn report(&self) -> Option<&SessionReport> {
        match self {
            PlayOutcome::Started(report) => Some(report),
            PlayOutcome::AlreadyPlaying => None,
        }
    }
}

/// Snapshot for progress displays
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub time: f64,
    pub total: f64,
    pub state: PlaybackState,
}

#[derive(Debug)]
struct Session {
    /// Graph time captured when the session started (T0)
    started_at: f64,
    from: f64,
    /// Graph time at which the session runs out
    ends_at: f64,
    voices: Vec<VoiceId>,
}

/// Drives gapless preview playback of a computed timeline
///
/// # Example
/// ```
/// use mixline::config::PlayerConfig;
/// use mixline::engine::{MemorySource, OfflineGraph, PlaybackScheduler, PlaybackState};
///
/// let config = PlayerConfig::default();
/// let mut player = PlaybackScheduler::new(OfflineGraph::new(48000), MemorySource::new(), &config);
/// player.seek(3.0).unwrap();
/// assert_eq!(player.state(), PlaybackState::Stopped);
/// assert_eq!(player.current_time(), 0.0); // empty timeline clamps to 0
/// ```
pub struct PlaybackScheduler<G, S> {
    graph: G,
    cache: AudioBufferCache<S>,
    timeline: ComputedTimeline,
    fade_curve: FadeCurve,
    state: PlaybackState,
    session: Option<Session>,
    /// Where the next session starts; the paused or seeked-to position
    position: f64,
    destroyed: bool,
}

impl<G: AudioGraph, S: ByteSource> PlaybackScheduler<G, S> {
    /// Create a stopped scheduler with an empty timeline
    ///
    /// Resources are decoded to the graph's sample rate.
    pub fn new(graph: G, source: S, config: &PlayerConfig) -> Self {
        let cache = AudioBufferCache::new(source, graph.sample_rate())
            .with_decoded_cache(config.cache_decoded);

        Self {
            graph,
            cache,
            timeline: ComputedTimeline::empty(),
            fade_curve: config.fade_curve,
            state: PlaybackState::Stopped,
            session: None,
            position: 0.0,
            destroyed: false,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current state; a session whose end has passed reads as stopped
    pub fn state(&self) -> PlaybackState {
        if self.session_expired() {
            PlaybackState::Stopped
        } else {
            self.state
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn timeline(&self) -> &ComputedTimeline {
        &self.timeline
    }

    pub fn total_duration(&self) -> f64 {
        self.timeline.total_duration()
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Mutable graph access, e.g. to drive an offline clock
    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    pub fn cache(&self) -> &AudioBufferCache<S> {
        &self.cache
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Replace the schedule
    ///
    /// Only allowed while stopped. When the material changed, cached ranges
    /// of resources the new timeline no longer references are evicted.
    pub fn set_segments(&mut self, timeline: ComputedTimeline) -> Result<()> {
        self.ensure_alive()?;
        self.expire_session();
        if self.state != PlaybackState::Stopped {
            return Err(MixlineError::ReconfigureWhileActive {
                state: self.state.to_string(),
            });
        }

        if timeline.fingerprint() != self.timeline.fingerprint() {
            let keep = timeline.resource_ids();
            let evicted = self.cache.retain_resources(&keep);
            debug!(
                "[Scheduler] new schedule: {} segments, {:.3}s, evicted {} ranges",
                timeline.len(),
                timeline.total_duration(),
                evicted
            );
        }

        self.position = self.position.min(timeline.total_duration());
        self.timeline = timeline;
        Ok(())
    }

    /// Decode every range the timeline plays ahead of time
    pub fn preload(&mut self) -> Result<PreloadReport> {
        self.ensure_alive()?;
        let report = self.cache.preload(self.timeline.source_ranges());
        info!(
            "[Scheduler] preloaded {} ranges, {} failed",
            report.loaded,
            report.failed.len()
        );
        Ok(report)
    }

    // ========================================================================
    // Transport Controls
    // ========================================================================

    /// Start a session at output time `from`
    ///
    /// A negative `from` plays from 0. A second call while playing is
    /// reported as `AlreadyPlaying` and schedules nothing.
    ///
    /// # Errors
    /// * `EmptyTimeline` - nothing to play
    /// * `PastEnd` - `from` is at or past the end of the timeline
    /// * `SessionDestroyed` - `destroy` was called
    pub fn play(&mut self, from: f64) -> Result<PlayOutcome> {
        self.ensure_alive()?;
        self.expire_session();

        if self.state == PlaybackState::Playing {
            debug!("[Scheduler] play ignored, already playing");
            return Ok(PlayOutcome::AlreadyPlaying);
        }

        let total = self.timeline.total_duration();
        if self.timeline.is_empty() || total <= 0.0 {
            return Err(MixlineError::EmptyTimeline);
        }

        let from = from.max(0.0);
        if from >= total {
            return Err(MixlineError::PastEnd { from, total });
        }

        let report = self.start_session(from);
        self.state = PlaybackState::Playing;
        self.position = from;
        Ok(PlayOutcome::Started(report))
    }

    /// Pause and remember the current position
    pub fn pause(&mut self) {
        self.expire_session();
        if self.state != PlaybackState::Playing {
            return;
        }

        let elapsed = self.current_time();
        self.cancel_session();
        self.position = elapsed;
        self.state = PlaybackState::Paused;
        info!("[Scheduler] paused at {:.3}s", elapsed);
    }

    /// Play from the remembered position
    pub fn resume(&mut self) -> Result<PlayOutcome> {
        self.expire_session();
        self.play(self.position)
    }

    /// Move the playhead to `time`, clamped to the timeline
    ///
    /// A running session restarts at the new position. Seeking to the very
    /// end while playing leaves the scheduler paused there.
    pub fn seek(&mut self, time: f64) -> Result<()> {
        self.ensure_alive()?;
        self.expire_session();

        let total = self.timeline.total_duration();
        // NaN seeks to 0
        let target = time.max(0.0).min(total.max(0.0));
        debug!("[Scheduler] seek to {:.3}s", target);

        if self.state != PlaybackState::Playing {
            self.position = target;
            return Ok(());
        }

        self.cancel_session();
        self.position = target;
        if target >= total {
            self.state = PlaybackState::Paused;
            return Ok(());
        }

        self.state = PlaybackState::Stopped;
        self.play(target).map(|_| ())
    }

    /// Stop playback and rewind to 0
    pub fn stop(&mut self) {
        self.cancel_session();
        if self.state != PlaybackState::Stopped {
            info!("[Scheduler] stopped");
        }
        self.state = PlaybackState::Stopped;
        self.position = 0.0;
    }

    /// Pause when playing, otherwise resume; returns the new state
    pub fn toggle_play_pause(&mut self) -> Result<PlaybackState> {
        self.expire_session();
        if self.state == PlaybackState::Playing {
            self.pause();
        } else {
            self.resume()?;
        }
        Ok(self.state)
    }

    /// Current output time in seconds
    pub fn current_time(&self) -> f64 {
        if self.session_expired() {
            return 0.0;
        }
        match (&self.session, self.state) {
            (Some(session), PlaybackState::Playing) => {
                let elapsed = self.graph.current_time() - session.started_at + session.from;
                elapsed.clamp(0.0, self.timeline.total_duration())
            }
            _ => self.position,
        }
    }

    /// Per-frame pull from the host
    ///
    /// Ends the session once the graph clock passes its end, then reports
    /// the position.
    pub fn tick(&mut self) -> Progress {
        self.expire_session();

        Progress {
            time: self.current_time(),
            total: self.timeline.total_duration(),
            state: self.state,
        }
    }

    /// Stop everything and release the graph and the cache
    ///
    /// Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop();
        self.graph.close();
        self.cache.clear();
        self.destroyed = true;
        info!("[Scheduler] destroyed");
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            Err(MixlineError::SessionDestroyed)
        } else {
            Ok(())
        }
    }

    /// The graph clock has passed the end of the running session
    fn session_expired(&self) -> bool {
        matches!(
            (&self.session, self.state),
            (Some(session), PlaybackState::Playing) if self.graph.current_time() >= session.ends_at
        )
    }

    /// Stop a session that ran out, whichever call notices first
    fn expire_session(&mut self) {
        if self.session_expired() {
            info!("[Scheduler] playback finished");
            self.stop();
        }
    }

    fn cancel_session(&mut self) {
        if let Some(session) = self.session.take() {
            for id in session.voices {
                self.graph.stop_voice(id);
            }
        }
    }

    fn start_session(&mut self, from: f64) -> SessionReport {
        self.cancel_session();

        let started_at = self.graph.current_time();
        let total = self.timeline.total_duration();
        let mut voices = Vec::new();
        let mut report = SessionReport {
            from_time: from,
            ..SessionReport::default()
        };

        info!(
            "[Scheduler] session from {:.3}s of {:.3}s at graph time {:.3}",
            from, total, started_at
        );

        for segment in self.timeline.segments() {
            if segment.out_end <= from || segment.duration() <= 0.0 {
                continue;
            }

            let when = started_at + (segment.out_start - from).max(0.0);
            let offset = (from - segment.out_start).max(0.0);
            let duration = segment.duration() - offset;

            match &segment.kind {
                SegmentKind::Clip { source } => {
                    match self.cache.load_range(&source.resource_id, source.start, source.end) {
                        Ok(buffer) => {
                            voices.push(self.graph.start_voice(Voice {
                                buffer,
                                when,
                                offset,
                                duration,
                                gain: GainEnvelope::Unity,
                            }));
                            debug!(
                                "[Scheduler] {} at {:.3} offset {:.3} for {:.3}s",
                                segment.label(),
                                when,
                                offset,
                                duration
                            );
                        }
                        Err(e) => report.skipped.push(skip(segment, source, e)),
                    }
                }
                SegmentKind::Crossfade { prev, next } => {
                    match load_pair(&mut self.cache, prev, next) {
                        Ok((prev_buffer, next_buffer)) => {
                            // Ramps span the whole window even when entered midway
                            let window_start = started_at + segment.out_start - from;
                            let window = segment.duration();
                            let curve = self.fade_curve;

                            voices.push(self.graph.start_voice(Voice {
                                buffer: prev_buffer,
                                when,
                                offset,
                                duration,
                                gain: GainEnvelope::FadeOut {
                                    start: window_start,
                                    duration: window,
                                    curve,
                                },
                            }));
                            voices.push(self.graph.start_voice(Voice {
                                buffer: next_buffer,
                                when,
                                offset,
                                duration,
                                gain: GainEnvelope::FadeIn {
                                    start: window_start,
                                    duration: window,
                                    curve,
                                },
                            }));
                            debug!(
                                "[Scheduler] crossfade at {:.3} offset {:.3} for {:.3}s",
                                when, offset, duration
                            );
                        }
                        Err((range, e)) => report.skipped.push(skip(segment, range, e)),
                    }
                }
                SegmentKind::Silence | SegmentKind::Pending { .. } => {
                    debug!("[Scheduler] {} for {:.3}s", segment.label(), duration);
                }
            }
        }

        report.scheduled_voices = voices.len();
        self.session = Some(Session {
            started_at,
            from,
            ends_at: started_at + (total - from),
            voices,
        });

        report
    }
}

/// Both sides of a crossfade, or the first range that failed
fn load_pair<'a, S: ByteSource>(
    cache: &mut AudioBufferCache<S>,
    prev: &'a SourceRange,
    next: &'a SourceRange,
) -> std::result::Result<(Arc<AudioBuffer>, Arc<AudioBuffer>), (&'a SourceRange, MixlineError)> {
    let prev_buffer = cache
        .load_range(&prev.resource_id, prev.start, prev.end)
        .map_err(|e| (prev, e))?;
    let next_buffer = cache
        .load_range(&next.resource_id, next.start, next.end)
        .map_err(|e| (next, e))?;
    Ok((prev_buffer, next_buffer))
}

fn skip(segment: &PlaybackSegment, range: &SourceRange, error: MixlineError) -> SkippedSegment {
    warn!(
        "[Scheduler] skipping {} [{:.3}, {:.3}): {}",
        segment.label(),
        segment.out_start,
        segment.out_end,
        error
    );
    SkippedSegment {
        entry: segment.entry,
        out_start: segment.out_start,
        out_end: segment.out_end,
        resource_id: range.resource_id.clone(),
        code: error.error_code(),
        message: error.to_string(),
    }
}

impl<G, S> fmt::Debug for PlaybackScheduler<G, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackScheduler")
            .field("state", &self.state)
            .field("position", &self.position)
            .field("segments", &self.timeline.len())
            .field("session", &self.session)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::ChannelLayout;
    use crate::engine::graph::OfflineGraph;
    use crate::engine::io::{encode_wav, generate_test_tone};
    use crate::engine::source::MemorySource;
    use crate::timeline::{compute, link_transitions, TimelineEntry, Track, TrackRegistry, TransitionKind};
    use approx::assert_relative_eq;

    const RATE: u32 = 1000;

    type TestPlayer = PlaybackScheduler<OfflineGraph, MemorySource>;

    fn registry() -> TrackRegistry {
        vec![
            Track::new("A", "res-a").with_clip(1, 0.0, 10.0).with_clip(2, 0.0, 5.0),
            Track::new("B", "res-b").with_clip(1, 0.0, 10.0).with_clip(2, 0.0, 3.0),
            Track::new("C", "missing").with_clip(1, 0.0, 4.0),
        ]
        .into_iter()
        .collect()
    }

    fn source() -> MemorySource {
        let a = generate_test_tone(110.0, 0.5, 10.0, ChannelLayout::Stereo, RATE);
        let b = generate_test_tone(220.0, 0.5, 10.0, ChannelLayout::Mono, RATE);
        MemorySource::new()
            .with("res-a", encode_wav(&a, 16).unwrap())
            .with("res-b", encode_wav(&b, 16).unwrap())
    }

    fn timeline(mut entries: Vec<TimelineEntry>) -> ComputedTimeline {
        let tracks = registry();
        link_transitions(&mut entries, &tracks);
        compute(&entries, &tracks).timeline
    }

    fn player(entries: Vec<TimelineEntry>) -> TestPlayer {
        let mut player = PlaybackScheduler::new(OfflineGraph::new(RATE), source(), &PlayerConfig::default());
        player.set_segments(timeline(entries)).unwrap();
        player
    }

    /// `[A 0-5, silence 2, B 0-3]`, 10s
    fn simple() -> Vec<TimelineEntry> {
        vec![
            TimelineEntry::clip("A", 2),
            TimelineEntry::transition(TransitionKind::Silence, 2.0),
            TimelineEntry::clip("B", 2),
        ]
    }

    /// `[A 0-10, crossfade 3, B 0-10]`, 17s
    fn crossfaded() -> Vec<TimelineEntry> {
        vec![
            TimelineEntry::clip("A", 1),
            TimelineEntry::transition(TransitionKind::Crossfade, 3.0),
            TimelineEntry::clip("B", 1),
        ]
    }

    fn voices(player: &TestPlayer) -> Vec<(f64, f64, f64, GainEnvelope)> {
        player
            .graph()
            .voices()
            .map(|(_, v, _)| (v.when, v.offset, v.duration, v.gain))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Basic State Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_default_state_is_stopped() {
        let player = player(simple());
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.current_time(), 0.0);
        assert_eq!(player.total_duration(), 10.0);
    }

    #[test]
    fn test_empty_timeline_errors() {
        let mut player = player(vec![]);
        let err = player.play(0.0).unwrap_err();
        assert_eq!(err.error_code(), "EMPTY_TIMELINE");
        assert_eq!(player.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_play_past_end_errors() {
        let mut player = player(simple());
        let err = player.play(10.0).unwrap_err();
        assert_eq!(err.error_code(), "PAST_END");
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.graph().voice_count(), 0);
    }

    // ------------------------------------------------------------------------
    // Scheduling Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_play_schedules_one_voice_per_clip() {
        let mut player = player(simple());

        let outcome = player.play(0.0).unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.scheduled_voices, 2);
        assert!(report.skipped.is_empty());
        assert_eq!(player.state(), PlaybackState::Playing);

        assert_eq!(
            voices(&player),
            vec![
                (0.0, 0.0, 5.0, GainEnvelope::Unity),
                (7.0, 0.0, 3.0, GainEnvelope::Unity),
            ]
        );
    }

    #[test]
    fn test_straddling_segment_starts_at_offset() {
        let mut player = player(simple());
        player.graph_mut().advance(100.0);

        player.play(3.0).unwrap();

        assert_eq!(
            voices(&player),
            vec![
                (100.0, 3.0, 2.0, GainEnvelope::Unity),
                (104.0, 0.0, 3.0, GainEnvelope::Unity),
            ]
        );
    }

    #[test]
    fn test_finished_segments_are_not_scheduled() {
        let mut player = player(simple());
        player.play(8.0).unwrap();

        assert_eq!(voices(&player), vec![(0.0, 1.0, 2.0, GainEnvelope::Unity)]);
    }

    #[test]
    fn test_negative_from_plays_from_zero() {
        let mut player = player(simple());
        let outcome = player.play(-4.0).unwrap();
        assert_eq!(outcome.report().unwrap().from_time, 0.0);
        assert_eq!(player.current_time(), 0.0);
    }

    #[test]
    fn test_double_play_keeps_one_session() {
        let mut player = player(simple());

        player.play(0.0).unwrap();
        assert_eq!(player.play(0.0).unwrap(), PlayOutcome::AlreadyPlaying);
        assert_eq!(player.resume().unwrap(), PlayOutcome::AlreadyPlaying);
        assert_eq!(player.graph().voice_count(), 2);
    }

    #[test]
    fn test_crossfade_schedules_two_ramped_voices() {
        let mut player = player(crossfaded());
        assert_eq!(player.total_duration(), 17.0);

        player.play(0.0).unwrap();

        let scheduled = voices(&player);
        assert_eq!(scheduled.len(), 4);
        assert_eq!(scheduled[0], (0.0, 0.0, 7.0, GainEnvelope::Unity));
        assert_eq!(
            scheduled[1],
            (
                7.0,
                0.0,
                3.0,
                GainEnvelope::FadeOut {
                    start: 7.0,
                    duration: 3.0,
                    curve: FadeCurve::Linear,
                }
            )
        );
        assert_eq!(
            scheduled[2].3,
            GainEnvelope::FadeIn {
                start: 7.0,
                duration: 3.0,
                curve: FadeCurve::Linear,
            }
        );
        assert_eq!(scheduled[3], (10.0, 0.0, 7.0, GainEnvelope::Unity));
    }

    #[test]
    fn test_seek_into_crossfade_resumes_mid_ramp() {
        let mut player = player(crossfaded());
        player.play(8.5).unwrap();

        let scheduled = voices(&player);
        assert_eq!(scheduled.len(), 3);

        let (when, offset, duration, fade_in) = scheduled[1];
        assert_eq!((when, offset, duration), (0.0, 1.5, 1.5));
        assert_relative_eq!(fade_in.gain_at(0.0), 0.5);
        assert_relative_eq!(scheduled[0].3.gain_at(0.0), 0.5);
        assert_eq!(scheduled[2].0, 1.5);
    }

    #[test]
    fn test_missing_resource_skips_segment_only() {
        let mut player = player(vec![TimelineEntry::clip("C", 1), TimelineEntry::clip("A", 2)]);

        let outcome = player.play(0.0).unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.scheduled_voices, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].resource_id, "missing");
        assert_eq!(report.skipped[0].code, "RESOURCE_NOT_FOUND");
        assert_eq!((report.skipped[0].out_start, report.skipped[0].out_end), (0.0, 4.0));
        assert_eq!(player.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_pending_and_silence_schedule_nothing() {
        let mut player = player(vec![
            TimelineEntry::transition(TransitionKind::Fill, 2.0),
            TimelineEntry::transition(TransitionKind::Silence, 1.0),
        ]);
        assert_eq!(player.total_duration(), 3.0);

        let outcome = player.play(0.0).unwrap();
        assert_eq!(outcome.report().unwrap().scheduled_voices, 0);
        assert!(player.is_playing());
    }

    // ------------------------------------------------------------------------
    // Position Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_seek_then_current_time_in_every_state() {
        let mut player = player(simple());

        player.seek(4.0).unwrap();
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.current_time(), 4.0);

        player.play(0.0).unwrap();
        player.graph_mut().advance(1.0);
        player.seek(6.0).unwrap();
        assert_eq!(player.state(), PlaybackState::Playing);
        assert_relative_eq!(player.current_time(), 6.0);

        player.pause();
        player.seek(2.0).unwrap();
        assert_eq!(player.state(), PlaybackState::Paused);
        assert_eq!(player.current_time(), 2.0);
    }

    #[test]
    fn test_seek_while_playing_replaces_session() {
        let mut player = player(simple());
        player.play(0.0).unwrap();
        player.seek(6.0).unwrap();

        // two cancelled, one silence skipped, B rescheduled
        assert_eq!(player.graph().voice_count(), 3);
        assert_eq!(player.graph().active_voice_count(), 1);
    }

    #[test]
    fn test_seek_clamps() {
        let mut player = player(simple());
        player.seek(-3.0).unwrap();
        assert_eq!(player.current_time(), 0.0);
        player.seek(99.0).unwrap();
        assert_eq!(player.current_time(), 10.0);
    }

    #[test]
    fn test_seek_to_end_while_playing_pauses() {
        let mut player = player(simple());
        player.play(0.0).unwrap();
        player.seek(50.0).unwrap();

        assert_eq!(player.state(), PlaybackState::Paused);
        assert_eq!(player.current_time(), 10.0);
        assert_eq!(player.graph().active_voice_count(), 0);
    }

    #[test]
    fn test_pause_resume_accumulates() {
        let mut player = player(simple());

        player.play(0.0).unwrap();
        player.graph_mut().advance(2.0);
        player.pause();
        assert_relative_eq!(player.current_time(), 2.0);
        assert_eq!(player.graph().active_voice_count(), 0);

        player.graph_mut().advance(5.0);
        assert_relative_eq!(player.current_time(), 2.0);

        player.resume().unwrap();
        player.graph_mut().advance(1.5);
        player.pause();
        assert_relative_eq!(player.current_time(), 3.5);
    }

    #[test]
    fn test_stop_resets_position() {
        let mut player = player(simple());
        player.play(0.0).unwrap();
        player.graph_mut().advance(3.0);
        player.stop();

        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.current_time(), 0.0);
        assert_eq!(player.graph().active_voice_count(), 0);
    }

    #[test]
    fn test_current_time_before_end_tracks_clock() {
        let mut player = player(simple());
        player.play(0.0).unwrap();
        player.graph_mut().advance(9.5);
        assert_relative_eq!(player.current_time(), 9.5);
    }

    #[test]
    fn test_session_past_end_reads_as_stopped() {
        let mut player = player(simple());
        player.play(0.0).unwrap();
        player.graph_mut().advance(12.0);

        assert_eq!(player.state(), PlaybackState::Stopped);
        assert!(!player.is_playing());
        assert_eq!(player.current_time(), 0.0);
    }

    #[test]
    fn test_pause_after_end_then_toggle_replays() {
        let mut player = player(simple());
        player.play(0.0).unwrap();
        player.graph_mut().advance(11.0);

        player.pause();
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.current_time(), 0.0);
        assert_eq!(player.graph().active_voice_count(), 0);

        assert_eq!(player.toggle_play_pause().unwrap(), PlaybackState::Playing);
        assert_eq!(player.current_time(), 0.0);
    }

    #[test]
    fn test_resume_and_seek_after_end() {
        let mut player = player(simple());
        player.play(0.0).unwrap();
        player.graph_mut().advance(10.0);

        assert!(player.resume().unwrap().report().is_some());
        assert_eq!(player.state(), PlaybackState::Playing);

        player.graph_mut().advance(10.5);
        player.seek(4.0).unwrap();
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.current_time(), 4.0);

        player.play(4.0).unwrap();
        player.graph_mut().advance(7.0);
        assert!(player.set_segments(timeline(simple())).is_ok());
    }

    #[test]
    fn test_tick_ends_session() {
        let mut player = player(simple());
        player.play(0.0).unwrap();

        player.graph_mut().advance(9.9);
        let progress = player.tick();
        assert_eq!(progress.state, PlaybackState::Playing);
        assert_relative_eq!(progress.time, 9.9);
        assert_eq!(progress.total, 10.0);

        player.graph_mut().advance(0.2);
        let progress = player.tick();
        assert_eq!(progress.state, PlaybackState::Stopped);
        assert_eq!(progress.time, 0.0);
    }

    #[test]
    fn test_toggle_play_pause() {
        let mut player = player(simple());

        assert_eq!(player.toggle_play_pause().unwrap(), PlaybackState::Playing);
        player.graph_mut().advance(1.0);
        assert_eq!(player.toggle_play_pause().unwrap(), PlaybackState::Paused);
        assert_relative_eq!(player.current_time(), 1.0);
        assert_eq!(player.toggle_play_pause().unwrap(), PlaybackState::Playing);
        assert_relative_eq!(player.current_time(), 1.0);
    }

    // ------------------------------------------------------------------------
    // Lifecycle Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_set_segments_requires_stopped() {
        let mut player = player(simple());

        player.play(0.0).unwrap();
        let err = player.set_segments(timeline(crossfaded())).unwrap_err();
        assert_eq!(err.error_code(), "RECONFIGURE_WHILE_ACTIVE");

        player.pause();
        assert!(player.set_segments(timeline(crossfaded())).is_err());

        player.stop();
        player.set_segments(timeline(crossfaded())).unwrap();
        assert_eq!(player.total_duration(), 17.0);
    }

    #[test]
    fn test_set_segments_evicts_unreferenced_resources() {
        let mut player = player(simple());
        player.preload().unwrap();
        assert!(player.cache().contains("res-a", 0.0, 5.0));
        assert!(player.cache().contains("res-b", 0.0, 3.0));

        player
            .set_segments(timeline(vec![TimelineEntry::clip("A", 2)]))
            .unwrap();
        assert!(player.cache().contains("res-a", 0.0, 5.0));
        assert!(!player.cache().contains("res-b", 0.0, 3.0));
    }

    #[test]
    fn test_preload_reports_missing_audio() {
        let mut player = player(vec![TimelineEntry::clip("A", 2), TimelineEntry::clip("C", 1)]);
        let report = player.preload().unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(report.failed.len(), 1);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut player = player(simple());
        player.play(0.0).unwrap();

        player.destroy();
        player.destroy();

        assert!(player.is_destroyed());
        assert!(player.graph().is_closed());
        assert!(player.cache().is_empty());
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.play(0.0).unwrap_err().error_code(), "SESSION_DESTROYED");
        assert!(player.seek(1.0).is_err());
        assert_eq!(player.tick().state, PlaybackState::Stopped);
    }
}
