//! Resolved playback segments
//!
//! A `ComputedTimeline` is produced only by the resolver and is immutable
//! afterwards. Its segments tile `[0, total_duration)` without gaps or
//! overlaps, even though crossfades overlap in *source* time.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::entry::{SourceRange, TransitionKind};

/// What a segment plays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SegmentKind {
    /// One source range at unity gain
    Clip { source: SourceRange },
    /// Tail of the previous clip fading out over the head of the next one
    Crossfade { prev: SourceRange, next: SourceRange },
    /// Timing placeholder with no audio
    Silence,
    /// Reserved span whose audio has not arrived yet
    Pending {
        transition_id: String,
        transition: TransitionKind,
    },
}

/// One resolved span of the output timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSegment {
    /// Index of the authored entry that produced this segment
    pub entry: usize,
    pub out_start: f64,
    pub out_end: f64,
    pub kind: SegmentKind,
}

impl PlaybackSegment {
    pub fn duration(&self) -> f64 {
        self.out_end - self.out_start
    }

    /// Whether playback schedules audio for this segment
    pub fn is_playable(&self) -> bool {
        matches!(
            self.kind,
            SegmentKind::Clip { .. } | SegmentKind::Crossfade { .. }
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.kind, SegmentKind::Pending { .. })
    }

    /// Source ranges this segment reads
    pub fn sources(&self) -> Vec<&SourceRange> {
        match &self.kind {
            SegmentKind::Clip { source } => vec![source],
            SegmentKind::Crossfade { prev, next } => vec![prev, next],
            SegmentKind::Silence | SegmentKind::Pending { .. } => Vec::new(),
        }
    }

    /// Short label for progress bars and logs
    pub fn label(&self) -> String {
        match &self.kind {
            SegmentKind::Clip { source } => format!("clip:{}", source.resource_id),
            SegmentKind::Crossfade { .. } => "crossfade".to_string(),
            SegmentKind::Silence => "silence".to_string(),
            SegmentKind::Pending { transition, .. } => format!("pending:{}", transition),
        }
    }
}

/// Gap-free ordered output timeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputedTimeline {
    segments: Vec<PlaybackSegment>,
    total_duration: f64,
}

impl ComputedTimeline {
    /// Only the resolver builds timelines
    pub(crate) fn from_segments(segments: Vec<PlaybackSegment>, total_duration: f64) -> Self {
        Self {
            segments,
            total_duration,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PlaybackSegment] {
        &self.segments
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments that carry audio
    pub fn playable(&self) -> impl Iterator<Item = &PlaybackSegment> {
        self.segments.iter().filter(|s| s.is_playable())
    }

    /// Segment covering `time`; zero-length segments never match
    pub fn segment_at(&self, time: f64) -> Option<&PlaybackSegment> {
        self.segments
            .iter()
            .find(|s| time >= s.out_start && time < s.out_end)
    }

    /// Distinct resources playback will request
    pub fn resource_ids(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .flat_map(|s| s.sources())
            .map(|r| r.resource_id.as_str())
            .collect()
    }

    /// Every source range playback will request, in schedule order
    pub fn source_ranges(&self) -> Vec<&SourceRange> {
        self.segments.iter().flat_map(|s| s.sources()).collect()
    }

    /// SHA-256 over the serialized segments
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        // Serializing plain data structs cannot fail.
        if let Ok(bytes) = serde_json::to_vec(self) {
            hasher.update(&bytes);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Check the tiling invariant
    pub fn is_contiguous(&self) -> bool {
        Self::tiles(&self.segments, self.total_duration)
    }

    fn tiles(segments: &[PlaybackSegment], total_duration: f64) -> bool {
        const EPS: f64 = 1e-9;
        match (segments.first(), segments.last()) {
            (None, _) | (_, None) => total_duration.abs() < EPS,
            (Some(first), Some(last)) => {
                first.out_start.abs() < EPS
                    && (last.out_end - total_duration).abs() < EPS
                    && segments.iter().all(|s| s.out_end >= s.out_start - EPS)
                    && segments
                        .windows(2)
                        .all(|w| (w[0].out_end - w[1].out_start).abs() < EPS)
            }
        }
    }
}
