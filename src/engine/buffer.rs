//! Audio Buffer Management
//!
//! Decoded PCM held as non-interleaved 32-bit float channels. Buffers are
//! immutable once cached and shared between voices through `Arc`.

// ============================================================================
// Constants
// ============================================================================

/// Default output sample rate (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

// ============================================================================
// Levels
// ============================================================================

/// Linear amplitude to dBFS; silence is negative infinity
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear > 0.0 {
        20.0 * linear.log10()
    } else {
        f32::NEG_INFINITY
    }
}

/// RMS level of all channels in dBFS
pub fn calculate_rms(buffer: &AudioBuffer) -> f32 {
    let count = buffer.channels() * buffer.len();
    if count == 0 {
        return f32::NEG_INFINITY;
    }

    let energy: f64 = buffer.iter_samples().map(|s| f64::from(s) * f64::from(s)).sum();
    linear_to_db((energy / count as f64).sqrt() as f32)
}

/// Absolute peak of all channels in dBFS
pub fn calculate_peak(buffer: &AudioBuffer) -> f32 {
    linear_to_db(buffer.iter_samples().map(f32::abs).fold(0.0, f32::max))
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Channel layouts the decoder accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    Mono,
    #[default]
    Stereo,
}

impl ChannelLayout {
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Layout for a decoded channel count; None above stereo
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Decoded audio, one `Vec<f32>` per channel
///
/// # Example
/// ```
/// use mixline::engine::buffer::{AudioBuffer, ChannelLayout, DEFAULT_SAMPLE_RATE};
///
/// // 1-second stereo buffer
/// let buffer = AudioBuffer::new(DEFAULT_SAMPLE_RATE as usize, ChannelLayout::Stereo, DEFAULT_SAMPLE_RATE);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 48000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer
    pub fn new(num_samples: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        let num_channels = layout.num_channels();
        Self {
            samples: vec![vec![0.0_f32; num_samples]; num_channels],
            sample_rate,
        }
    }

    /// Frames as L, R, L, R, ... for the WAV writer
    pub fn to_interleaved(&self) -> Vec<f32> {
        (0..self.len())
            .flat_map(|frame| self.samples.iter().map(move |channel| channel[frame]))
            .collect()
    }

    /// Every sample of every channel, channel by channel
    fn iter_samples(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples.iter().flat_map(|channel| channel.iter().copied())
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Frames per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Sample index for a time offset, rounded down
    #[inline]
    pub fn sample_index(&self, secs: f64) -> usize {
        (secs.max(0.0) * self.sample_rate as f64).floor() as usize
    }

    /// Copy out `[start, end)` seconds
    ///
    /// The end is clamped to the buffer. Returns None when the range is empty
    /// or starts at or past the end of the audio.
    pub fn slice_secs(&self, start: f64, end: f64) -> Option<AudioBuffer> {
        let first = self.sample_index(start);
        let last = self.sample_index(end).min(self.len());
        if first >= last {
            return None;
        }

        Some(AudioBuffer {
            samples: self
                .samples
                .iter()
                .map(|channel| channel[first..last].to_vec())
                .collect(),
            sample_rate: self.sample_rate,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
