//! Audio graph abstraction
//!
//! The scheduler never touches a sound device. It hands `Voice`s to an
//! `AudioGraph` with absolute start times on the graph's own clock. Hosts
//! bridge this to their engine; `OfflineGraph` is a manual-clock mixer that
//! renders voices into a buffer for tests and for file previews.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::engine::fade::FadeCurve;

pub type VoiceId = u64;

/// Absorbs float drift when mapping seconds onto sample frames
const FRAME_EPSILON: f64 = 1e-6;

/// Host audio engine as seen by the scheduler
pub trait AudioGraph {
    /// Graph clock in seconds; monotonic while the graph is open
    fn current_time(&self) -> f64;

    fn sample_rate(&self) -> u32;

    /// Schedule a voice and return a handle for cancelling it
    fn start_voice(&mut self, voice: Voice) -> VoiceId;

    /// Cancel a voice. Unknown or already finished voices are ignored.
    fn stop_voice(&mut self, id: VoiceId);

    /// Release the graph. Every voice is cancelled.
    fn close(&mut self);
}

/// Gain over absolute graph time
///
/// Ramps are anchored where the crossfade window starts on the graph clock,
/// which may lie before the voice's own start after a seek.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GainEnvelope {
    Unity,
    FadeOut {
        start: f64,
        duration: f64,
        curve: FadeCurve,
    },
    FadeIn {
        start: f64,
        duration: f64,
        curve: FadeCurve,
    },
}

impl GainEnvelope {
    pub fn gain_at(&self, time: f64) -> f32 {
        match *self {
            GainEnvelope::Unity => 1.0,
            GainEnvelope::FadeOut {
                start,
                duration,
                curve,
            } => curve.fade_out(ramp_position(time, start, duration)),
            GainEnvelope::FadeIn {
                start,
                duration,
                curve,
            } => curve.fade_in(ramp_position(time, start, duration)),
        }
    }
}

fn ramp_position(time: f64, start: f64, duration: f64) -> f32 {
    if duration <= 0.0 {
        return if time < start { 0.0 } else { 1.0 };
    }
    ((time - start) / duration).clamp(0.0, 1.0) as f32
}

/// Play `buffer[offset, offset + duration)` from graph time `when`
#[derive(Debug, Clone)]
pub struct Voice {
    pub buffer: Arc<AudioBuffer>,
    pub when: f64,
    pub offset: f64,
    pub duration: f64,
    pub gain: GainEnvelope,
}

impl Voice {
    /// Graph time at which the voice runs out
    pub fn end(&self) -> f64 {
        self.when + self.duration
    }
}

#[derive(Debug, Clone)]
struct VoiceSlot {
    voice: Voice,
    stopped_at: Option<f64>,
}

impl VoiceSlot {
    fn audible_until(&self) -> f64 {
        match self.stopped_at {
            Some(at) => at.min(self.voice.end()),
            None => self.voice.end(),
        }
    }
}

// ============================================================================
// Offline Graph
// ============================================================================

/// Manual-clock graph that mixes voices into stereo buffers on demand
#[derive(Debug, Clone)]
pub struct OfflineGraph {
    sample_rate: u32,
    now: f64,
    next_id: VoiceId,
    voices: BTreeMap<VoiceId, VoiceSlot>,
    closed: bool,
}

impl OfflineGraph {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            now: 0.0,
            next_id: 1,
            voices: BTreeMap::new(),
            closed: false,
        }
    }

    /// Move the clock forward by `seconds`
    pub fn advance(&mut self, seconds: f64) {
        self.now += seconds.max(0.0);
    }

    /// Jump the clock to `time`; it never runs backwards
    pub fn set_time(&mut self, time: f64) {
        self.now = self.now.max(time);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn voice(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.get(&id).map(|slot| &slot.voice)
    }

    /// Every voice ever started, in start order, with its stop time
    pub fn voices(&self) -> impl Iterator<Item = (VoiceId, &Voice, Option<f64>)> {
        self.voices
            .iter()
            .map(|(id, slot)| (*id, &slot.voice, slot.stopped_at))
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Voices neither cancelled nor finished at the current time
    pub fn active_voice_count(&self) -> usize {
        self.voices
            .values()
            .filter(|slot| slot.stopped_at.is_none() && slot.voice.end() > self.now)
            .count()
    }

    /// Forget voices that can no longer sound at or after the current time
    pub fn prune(&mut self) -> usize {
        let now = self.now;
        let before = self.voices.len();
        self.voices.retain(|_, slot| slot.audible_until() > now);
        before - self.voices.len()
    }

    /// Mix `[start, end)` of graph time into a stereo buffer
    ///
    /// Mono sources feed both channels. Cancelled voices fall silent at their
    /// stop time.
    pub fn render(&self, start: f64, end: f64) -> AudioBuffer {
        let rate = self.sample_rate as f64;
        let frames = ((end - start).max(0.0) * rate).round() as usize;
        let mut out = AudioBuffer::new(frames, ChannelLayout::Stereo, self.sample_rate);

        for slot in self.voices.values() {
            let voice = &slot.voice;
            let from = voice.when.max(start);
            let until = slot.audible_until().min(end);
            if until <= from {
                continue;
            }

            let first = ((from - start) * rate - FRAME_EPSILON).ceil() as usize;
            let last = (((until - start) * rate - FRAME_EPSILON).ceil() as usize).min(frames);
            let source = &voice.buffer;
            let source_rate = source.sample_rate as f64;

            for frame in first..last {
                let t = start + frame as f64 / rate;
                let index =
                    ((voice.offset + (t - voice.when)) * source_rate + FRAME_EPSILON).floor() as usize;
                if index >= source.len() {
                    break;
                }

                let gain = voice.gain.gain_at(t);
                let left = source.channel(0)[index];
                let right = if source.channels() > 1 {
                    source.channel(1)[index]
                } else {
                    left
                };
                out.channel_mut(0)[frame] += left * gain;
                out.channel_mut(1)[frame] += right * gain;
            }
        }

        out
    }
}

impl AudioGraph for OfflineGraph {
    fn current_time(&self) -> f64 {
        self.now
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start_voice(&mut self, voice: Voice) -> VoiceId {
        let id = self.next_id;
        self.next_id += 1;

        if self.closed {
            debug!("[OfflineGraph] ignoring voice {} on closed graph", id);
            return id;
        }

        self.voices.insert(
            id,
            VoiceSlot {
                voice,
                stopped_at: None,
            },
        );
        id
    }

    fn stop_voice(&mut self, id: VoiceId) {
        let now = self.now;
        if let Some(slot) = self.voices.get_mut(&id) {
            if slot.stopped_at.is_none() {
                slot.stopped_at = Some(now);
            }
        }
    }

    fn close(&mut self) {
        let ids: Vec<VoiceId> = self.voices.keys().copied().collect();
        for id in ids {
            self.stop_voice(id);
        }
        self.closed = true;
    }
}
