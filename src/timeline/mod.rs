//! Timeline Module
//!
//! Authored entries, the resolver that turns them into a gap-free output
//! timeline, and the linkage helpers that complete transitions.

pub mod document;
pub mod entry;
pub mod linkage;
pub mod resolver;
pub mod segment;

pub use document::TimelineDocument;
pub use entry::{
    ClipId, SourceClip, SourceRange, TimelineEntry, Track, TrackRegistry, TransitionKind,
    TransitionLinkage,
};
pub use linkage::{attach_generated_output, link_transitions, pending_generation};
pub use resolver::{compute, Resolution, ResolutionWarning, SegmentResolver};
pub use segment::{ComputedTimeline, PlaybackSegment, SegmentKind};
