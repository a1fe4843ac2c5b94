//! Segment Resolver
//!
//! Turns the authored entry sequence into a gap-free output timeline.
//!
//! Two join rules exist:
//! - additive joins (fill, silence) lengthen the output by their duration
//! - overlapping joins (crossfade, beatsync) play the tail of the preceding
//!   clip over the head of the following one, so the shared seconds are
//!   counted once
//!
//! Resolution runs in three passes:
//! 1. classify every entry into a [`Step`]
//! 2. group each clip with its neighbouring complete crossfades and decide
//!    how much of its head and tail they claim
//! 3. walk the steps once, accumulating the output cursor
//!
//! Nothing in here fails. Anomalies become dropped entries or pending
//! segments and are reported as [`ResolutionWarning`]s.

use std::fmt;

use log::{debug, warn};
use serde::Serialize;

use super::entry::{ClipId, SourceRange, TimelineEntry, TrackRegistry, TransitionKind};
use super::segment::{ComputedTimeline, PlaybackSegment, SegmentKind};

/// Durations at or below this are treated as zero
const EPSILON: f64 = 1e-9;

/// Non-fatal anomaly found while resolving
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum ResolutionWarning {
    /// Clip references a track that does not exist; entry dropped
    MissingTrack { entry: usize, track_id: String },
    /// Clip references a clip the track does not have; entry dropped
    MissingClip {
        entry: usize,
        track_id: String,
        clip_id: ClipId,
    },
    /// Effective clip range is empty or inverted; entry dropped
    InvalidClipRange { entry: usize, start: f64, end: f64 },
    /// Transition duration is not a positive number; entry dropped
    InvalidDuration { entry: usize, duration: f64 },
    /// Transition lacks supporting data; resolved as pending
    IncompleteLinkage {
        entry: usize,
        transition_id: String,
        kind: TransitionKind,
    },
    /// Overlap longer than a neighbouring clip; shortened
    CrossfadeClamped {
        entry: usize,
        requested: f64,
        applied: f64,
    },
}

impl ResolutionWarning {
    /// Index of the entry the warning is about
    pub fn entry(&self) -> usize {
        match self {
            ResolutionWarning::MissingTrack { entry, .. }
            | ResolutionWarning::MissingClip { entry, .. }
            | ResolutionWarning::InvalidClipRange { entry, .. }
            | ResolutionWarning::InvalidDuration { entry, .. }
            | ResolutionWarning::IncompleteLinkage { entry, .. }
            | ResolutionWarning::CrossfadeClamped { entry, .. } => *entry,
        }
    }
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionWarning::MissingTrack { entry, track_id } => {
                write!(f, "entry {}: track '{}' not found, skipped", entry, track_id)
            }
            ResolutionWarning::MissingClip {
                entry,
                track_id,
                clip_id,
            } => write!(
                f,
                "entry {}: clip {} not found in track '{}', skipped",
                entry, clip_id, track_id
            ),
            ResolutionWarning::InvalidClipRange { entry, start, end } => write!(
                f,
                "entry {}: clip range {:.3}s-{:.3}s is empty, skipped",
                entry, start, end
            ),
            ResolutionWarning::InvalidDuration { entry, duration } => write!(
                f,
                "entry {}: duration {} is not a usable positive length, skipped",
                entry, duration
            ),
            ResolutionWarning::IncompleteLinkage {
                entry,
                transition_id,
                kind,
            } => write!(
                f,
                "entry {}: {} '{}' is waiting for data",
                entry, kind, transition_id
            ),
            ResolutionWarning::CrossfadeClamped {
                entry,
                requested,
                applied,
            } => write!(
                f,
                "entry {}: overlap of {:.3}s exceeds a neighbouring clip, clamped to {:.3}s",
                entry, requested, applied
            ),
        }
    }
}

/// Output of [`SegmentResolver::compute`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Resolution {
    pub timeline: ComputedTimeline,
    pub warnings: Vec<ResolutionWarning>,
}

impl Resolution {
    pub fn total_duration(&self) -> f64 {
        self.timeline.total_duration()
    }
}

/// Resolves entries against an injected track registry
#[derive(Debug, Clone, Copy)]
pub struct SegmentResolver<'a> {
    tracks: &'a TrackRegistry,
}

/// Shorthand for `SegmentResolver::new(tracks).compute(entries)`
pub fn compute(entries: &[TimelineEntry], tracks: &TrackRegistry) -> Resolution {
    SegmentResolver::new(tracks).compute(entries)
}

/// One classified entry
#[derive(Debug, Clone)]
enum Step {
    Dropped,
    Clip {
        source: SourceRange,
        head_trim: f64,
        tail_trim: f64,
    },
    /// Additive span; `kind` is Clip (generated fill), Silence or Pending
    Additive { duration: f64, kind: SegmentKind },
    /// Complete overlap; `applied` is decided by the grouping pass
    Overlap {
        transition_id: String,
        kind: TransitionKind,
        requested: f64,
        applied: f64,
        prev: SourceRange,
        next: SourceRange,
    },
    /// Overlap without its data; zero-length placeholder
    PendingOverlap {
        transition_id: String,
        kind: TransitionKind,
    },
}

impl<'a> SegmentResolver<'a> {
    pub fn new(tracks: &'a TrackRegistry) -> Self {
        Self { tracks }
    }

    /// Resolve `entries` into a contiguous output timeline
    ///
    /// Pure: the same inputs always give the same timeline and neither input
    /// is modified.
    pub fn compute(&self, entries: &[TimelineEntry]) -> Resolution {
        let mut warnings = Vec::new();

        let mut steps: Vec<Step> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| self.classify(i, entry, &mut warnings))
            .collect();

        group_overlaps(&mut steps, &mut warnings);

        let (segments, total) = accumulate(&steps, &mut warnings);

        for w in &warnings {
            warn!("[Resolver] {}", w);
        }
        debug!(
            "[Resolver] {} entries -> {} segments, total {:.3}s",
            entries.len(),
            segments.len(),
            total
        );

        Resolution {
            timeline: ComputedTimeline::from_segments(segments, total),
            warnings,
        }
    }

    fn classify(&self, index: usize, entry: &TimelineEntry, warnings: &mut Vec<ResolutionWarning>) -> Step {
        match entry {
            TimelineEntry::Clip {
                track_id,
                clip_id,
                custom_start,
                custom_end,
            } => {
                let Some(track) = self.tracks.track(track_id) else {
                    warnings.push(ResolutionWarning::MissingTrack {
                        entry: index,
                        track_id: track_id.clone(),
                    });
                    return Step::Dropped;
                };
                let Some(clip) = track.clip(*clip_id) else {
                    warnings.push(ResolutionWarning::MissingClip {
                        entry: index,
                        track_id: track_id.clone(),
                        clip_id: *clip_id,
                    });
                    return Step::Dropped;
                };

                let start = custom_start.unwrap_or(clip.start);
                let end = custom_end.unwrap_or(clip.end);
                if !(start.is_finite() && end.is_finite()) || end - start <= EPSILON {
                    warnings.push(ResolutionWarning::InvalidClipRange {
                        entry: index,
                        start,
                        end,
                    });
                    return Step::Dropped;
                }

                Step::Clip {
                    source: SourceRange::new(track.resource_id.clone(), start, end),
                    head_trim: 0.0,
                    tail_trim: 0.0,
                }
            }
            TimelineEntry::Transition {
                id,
                kind,
                duration,
                linkage,
            } => {
                let duration = *duration;
                if !duration.is_finite() || duration <= EPSILON {
                    warnings.push(ResolutionWarning::InvalidDuration {
                        entry: index,
                        duration,
                    });
                    return Step::Dropped;
                }

                let pending = |warnings: &mut Vec<ResolutionWarning>| {
                    warnings.push(ResolutionWarning::IncompleteLinkage {
                        entry: index,
                        transition_id: id.clone(),
                        kind: *kind,
                    });
                    SegmentKind::Pending {
                        transition_id: id.clone(),
                        transition: *kind,
                    }
                };

                match kind {
                    TransitionKind::Silence => Step::Additive {
                        duration,
                        kind: SegmentKind::Silence,
                    },
                    TransitionKind::Fill => {
                        let output = linkage.as_ref().and_then(|l| l.output_id.as_ref());
                        let kind = match output {
                            Some(resource_id) => SegmentKind::Clip {
                                source: SourceRange::new(resource_id.clone(), 0.0, duration),
                            },
                            None => pending(warnings),
                        };
                        Step::Additive { duration, kind }
                    }
                    TransitionKind::Crossfade | TransitionKind::Beatsync => {
                        match linkage.as_ref().and_then(|l| l.prev.clone().zip(l.next.clone())) {
                            Some((prev, next)) => Step::Overlap {
                                transition_id: id.clone(),
                                kind: *kind,
                                requested: duration,
                                applied: 0.0,
                                prev,
                                next,
                            },
                            None => {
                                pending(warnings);
                                Step::PendingOverlap {
                                    transition_id: id.clone(),
                                    kind: *kind,
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Length of a clip step still unclaimed by overlaps
fn remaining(step: &Step) -> f64 {
    match step {
        Step::Clip {
            source,
            head_trim,
            tail_trim,
        } => (source.duration() - head_trim - tail_trim).max(0.0),
        _ => 0.0,
    }
}

/// Pair each complete overlap with the clips on either side
///
/// An overlap needs a resolved clip immediately before and after it; without
/// one it falls back to a pending placeholder. The applied overlap never
/// exceeds what either neighbour has left, so trims cannot go negative.
fn group_overlaps(steps: &mut [Step], warnings: &mut Vec<ResolutionWarning>) {
    for i in 0..steps.len() {
        let (requested, prev_end) = match &steps[i] {
            Step::Overlap { requested, prev, .. } => (*requested, prev.end),
            _ => continue,
        };

        let has_prev = i > 0 && matches!(steps[i - 1], Step::Clip { .. });
        let has_next = matches!(steps.get(i + 1), Some(Step::Clip { .. }));
        if !(has_prev && has_next) {
            demote(steps, i, warnings);
            continue;
        }

        // the linked tail cannot reach before the start of its resource
        let available = remaining(&steps[i - 1])
            .min(remaining(&steps[i + 1]))
            .min(prev_end.max(0.0));
        let applied = requested.min(available);
        if applied < requested - EPSILON {
            warnings.push(ResolutionWarning::CrossfadeClamped {
                entry: i,
                requested,
                applied,
            });
        }
        if applied <= EPSILON {
            steps[i] = pending_overlap(&steps[i]);
            continue;
        }

        if let Step::Clip { tail_trim, .. } = &mut steps[i - 1] {
            *tail_trim = applied;
        }
        if let Step::Clip { head_trim, .. } = &mut steps[i + 1] {
            *head_trim = applied;
        }
        if let Step::Overlap {
            applied: slot,
            prev,
            next,
            ..
        } = &mut steps[i]
        {
            *slot = applied;
            prev.start = prev.end - applied;
            next.end = next.start + applied;
        }
    }
}

/// Overlap without a clip on both sides
fn demote(steps: &mut [Step], i: usize, warnings: &mut Vec<ResolutionWarning>) {
    let placeholder = pending_overlap(&steps[i]);
    if let Step::PendingOverlap {
        transition_id,
        kind,
    } = &placeholder
    {
        warnings.push(ResolutionWarning::IncompleteLinkage {
            entry: i,
            transition_id: transition_id.clone(),
            kind: *kind,
        });
    }
    steps[i] = placeholder;
}

fn pending_overlap(step: &Step) -> Step {
    match step {
        Step::Overlap {
            transition_id,
            kind,
            ..
        } => Step::PendingOverlap {
            transition_id: transition_id.clone(),
            kind: *kind,
        },
        other => other.clone(),
    }
}

/// Final walk: place every step after the cursor
///
/// A step that would push the cursor past the largest finite time is
/// dropped with an `InvalidDuration` warning.
fn accumulate(steps: &[Step], warnings: &mut Vec<ResolutionWarning>) -> (Vec<PlaybackSegment>, f64) {
    let mut segments = Vec::with_capacity(steps.len());
    let mut cursor = 0.0_f64;

    for (entry, step) in steps.iter().enumerate() {
        let (length, kind) = match step {
            Step::Dropped => continue,
            Step::Clip {
                source,
                head_trim,
                tail_trim,
            } => {
                let length = remaining(step);
                if length <= EPSILON {
                    debug!("[Resolver] entry {}: fully consumed by crossfades", entry);
                    continue;
                }
                let trimmed = SourceRange::new(
                    source.resource_id.clone(),
                    source.start + head_trim,
                    source.end - tail_trim,
                );
                (length, SegmentKind::Clip { source: trimmed })
            }
            Step::Additive { duration, kind } => (*duration, kind.clone()),
            Step::Overlap {
                applied,
                prev,
                next,
                ..
            } => (
                *applied,
                SegmentKind::Crossfade {
                    prev: prev.clone(),
                    next: next.clone(),
                },
            ),
            Step::PendingOverlap {
                transition_id,
                kind,
            } => (
                0.0,
                SegmentKind::Pending {
                    transition_id: transition_id.clone(),
                    transition: *kind,
                },
            ),
        };

        let out_end = cursor + length;
        if !out_end.is_finite() {
            warnings.push(ResolutionWarning::InvalidDuration {
                entry,
                duration: length,
            });
            continue;
        }

        segments.push(PlaybackSegment {
            entry,
            out_start: cursor,
            out_end,
            kind,
        });
        cursor = out_end;
    }

    (segments, cursor)
}
