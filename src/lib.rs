//! Mixline - Gapless Preview Timelines
//!
//! Mixline plays an edited sequence of audio clips and transitions as one
//! continuous preview:
//! 1. Timeline - authored entries resolved into a gap-free output timeline
//! 2. Engine - decoded range cache and a scheduler that places every
//!    segment on an audio graph from one captured start time
//!
//! # Example
//!
//! ```
//! use mixline::timeline::{compute, TimelineEntry, Track, TrackRegistry, TransitionKind};
//!
//! let tracks: TrackRegistry = vec![
//!     Track::new("A", "res-a").with_clip(1, 0.0, 5.0),
//!     Track::new("B", "res-b").with_clip(1, 0.0, 3.0),
//! ]
//! .into_iter()
//! .collect();
//!
//! let entries = vec![
//!     TimelineEntry::clip("A", 1),
//!     TimelineEntry::transition(TransitionKind::Silence, 2.0),
//!     TimelineEntry::clip("B", 1),
//! ];
//!
//! let resolution = compute(&entries, &tracks);
//! assert_eq!(resolution.total_duration(), 10.0);
//! assert!(resolution.warnings.is_empty());
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod timeline;

pub use config::PlayerConfig;
pub use error::{MixlineError, Result};
