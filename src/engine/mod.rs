//! Audio Engine Module
//!
//! Everything between a computed timeline and sound:
//! - Decoded buffers and WAV I/O
//! - Byte sources and the range cache
//! - Fade curves and the audio graph seam
//! - The playback scheduler

pub mod buffer;
pub mod cache;
pub mod fade;
pub mod graph;
pub mod io;
pub mod scheduler;
pub mod source;

pub use buffer::{AudioBuffer, ChannelLayout, DEFAULT_SAMPLE_RATE};
pub use cache::{AudioBufferCache, CacheStats, PreloadFailure, PreloadReport};
pub use fade::FadeCurve;
pub use graph::{AudioGraph, GainEnvelope, OfflineGraph, Voice, VoiceId};
pub use io::{decode_audio, encode_wav, export_audio, generate_test_tone};
pub use scheduler::{
    PlayOutcome, PlaybackScheduler, PlaybackState, Progress, SessionReport, SkippedSegment,
};
#[cfg(feature = "remote")]
pub use source::HttpSource;
pub use source::{ByteSource, DirectorySource, MemorySource};
