//! Timeline document
//!
//! The on-disk form the CLI works with: the track registry plus the ordered
//! entry list, as plain JSON.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::entry::{TimelineEntry, TrackRegistry};
use super::resolver::{Resolution, SegmentResolver};
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineDocument {
    #[serde(default)]
    pub tracks: TrackRegistry,
    #[serde(default)]
    pub entries: Vec<TimelineEntry>,
}

impl TimelineDocument {
    pub fn new(tracks: TrackRegistry, entries: Vec<TimelineEntry>) -> Self {
        Self { tracks, entries }
    }

    /// Read a document from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let document = serde_json::from_reader(BufReader::new(file))?;
        Ok(document)
    }

    /// Write the document as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn resolve(&self) -> Resolution {
        SegmentResolver::new(&self.tracks).compute(&self.entries)
    }
}
