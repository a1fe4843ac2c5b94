//! Authored timeline entries and the track/clip registry
//!
//! Entries are owned and mutated by the editor. The JSON form is a list of
//! records tagged by `type`:
//!
//! ```json
//! [
//!   {"type": "clip", "track_id": "A", "clip_id": 1},
//!   {"type": "transition", "id": "t-1", "kind": "silence", "duration": 2.0}
//! ]
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a clip inside a track
pub type ClipId = u32;

/// A time range inside a decodable audio resource, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRange {
    pub resource_id: String,
    pub start: f64,
    pub end: f64,
}

impl SourceRange {
    pub fn new(resource_id: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            resource_id: resource_id.into(),
            start,
            end,
        }
    }

    /// Length of the range in seconds (never negative)
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Kind of a transition block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    /// Generated filler audio (additive)
    Fill,
    /// Beat-aligned overlap join
    Beatsync,
    /// Volume crossfade overlap join
    Crossfade,
    /// Blank audio (additive)
    Silence,
}

impl TransitionKind {
    /// Overlapping joins shrink the timeline instead of lengthening it
    pub fn is_overlapping(&self) -> bool {
        matches!(self, TransitionKind::Crossfade | TransitionKind::Beatsync)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Fill => "fill",
            TransitionKind::Beatsync => "beatsync",
            TransitionKind::Crossfade => "crossfade",
            TransitionKind::Silence => "silence",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supporting data a transition needs before it can be played
///
/// Overlapping transitions need both `prev` (tail of the preceding clip) and
/// `next` (head of the following clip). Fills need `output_id`, the resource
/// produced by the generation service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionLinkage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<SourceRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<SourceRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_id: Option<String>,
}

impl TransitionLinkage {
    /// Both overlap sides are known
    pub fn has_overlap(&self) -> bool {
        self.prev.is_some() && self.next.is_some()
    }
}

/// One authored building block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TimelineEntry {
    Clip {
        track_id: String,
        clip_id: ClipId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        custom_start: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        custom_end: Option<f64>,
    },
    Transition {
        #[serde(default = "new_entry_id")]
        id: String,
        kind: TransitionKind,
        duration: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        linkage: Option<TransitionLinkage>,
    },
}

fn new_entry_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl TimelineEntry {
    /// Reference a stored clip with its own range
    pub fn clip(track_id: impl Into<String>, clip_id: ClipId) -> Self {
        TimelineEntry::Clip {
            track_id: track_id.into(),
            clip_id,
            custom_start: None,
            custom_end: None,
        }
    }

    /// Reference a stored clip with an overridden range
    pub fn custom_clip(track_id: impl Into<String>, clip_id: ClipId, start: f64, end: f64) -> Self {
        TimelineEntry::Clip {
            track_id: track_id.into(),
            clip_id,
            custom_start: Some(start),
            custom_end: Some(end),
        }
    }

    /// New unlinked transition with a fresh id
    pub fn transition(kind: TransitionKind, duration: f64) -> Self {
        TimelineEntry::Transition {
            id: new_entry_id(),
            kind,
            duration,
            linkage: None,
        }
    }

    /// Transition with supporting data already attached
    pub fn linked_transition(kind: TransitionKind, duration: f64, linkage: TransitionLinkage) -> Self {
        TimelineEntry::Transition {
            id: new_entry_id(),
            kind,
            duration,
            linkage: Some(linkage),
        }
    }

    pub fn is_clip(&self) -> bool {
        matches!(self, TimelineEntry::Clip { .. })
    }

    /// Transition id, if this is a transition
    pub fn transition_id(&self) -> Option<&str> {
        match self {
            TimelineEntry::Transition { id, .. } => Some(id),
            TimelineEntry::Clip { .. } => None,
        }
    }
}

/// A named range inside a track's source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceClip {
    pub id: ClipId,
    pub start: f64,
    pub end: f64,
}

impl SourceClip {
    pub fn new(id: ClipId, start: f64, end: f64) -> Self {
        Self { id, start, end }
    }
}

/// An uploaded track and the clips cut from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    /// Opaque id of the uploaded audio
    pub resource_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub clips: Vec<SourceClip>,
}

impl Track {
    pub fn new(id: impl Into<String>, resource_id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            resource_id: resource_id.into(),
            clips: Vec::new(),
        }
    }

    /// Builder-style clip registration
    pub fn with_clip(mut self, id: ClipId, start: f64, end: f64) -> Self {
        self.clips.push(SourceClip::new(id, start, end));
        self
    }

    pub fn clip(&self, id: ClipId) -> Option<&SourceClip> {
        self.clips.iter().find(|c| c.id == id)
    }
}

/// Lookup of tracks by id, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackRegistry {
    tracks: Vec<Track>,
    index: HashMap<String, usize>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a track
    pub fn insert(&mut self, track: Track) {
        match self.index.get(&track.id) {
            Some(&i) => self.tracks[i] = track,
            None => {
                self.index.insert(track.id.clone(), self.tracks.len());
                self.tracks.push(track);
            }
        }
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.index.get(id).map(|&i| &self.tracks[i])
    }

    pub fn clip(&self, track_id: &str, clip_id: ClipId) -> Option<&SourceClip> {
        self.track(track_id).and_then(|t| t.clip(clip_id))
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl FromIterator<Track> for TrackRegistry {
    fn from_iter<I: IntoIterator<Item = Track>>(iter: I) -> Self {
        let mut registry = TrackRegistry::new();
        for track in iter {
            registry.insert(track);
        }
        registry
    }
}

impl Serialize for TrackRegistry {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.tracks.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TrackRegistry {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tracks = Vec::<Track>::deserialize(deserializer)?;
        Ok(tracks.into_iter().collect())
    }
}
