//! Integration Tests
//!
//! End-to-end tests: timeline document on disk, source audio in a
//! directory, offline render to WAV.

use std::path::Path;

use hound::WavReader;
use tempfile::{tempdir, TempDir};

use mixline::cli::commands::{render, RenderManifest, RenderOptions};
use mixline::engine::{export_audio, AudioBuffer, ChannelLayout};
use mixline::timeline::{
    attach_generated_output, link_transitions, TimelineDocument, TimelineEntry, Track,
    TransitionKind,
};

const RATE: u32 = 8000;

/// Write a constant-level mono WAV
fn write_constant(dir: &Path, name: &str, level: f32, secs: f64) {
    let mut buffer = AudioBuffer::new((secs * RATE as f64) as usize, ChannelLayout::Mono, RATE);
    buffer.channel_mut(0).fill(level);
    export_audio(&buffer, &dir.join(format!("{}.wav", name)), 32).unwrap();
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let sources = dir.path().join("sources");
        std::fs::create_dir(&sources).unwrap();
        write_constant(&sources, "res-a", 0.5, 10.0);
        write_constant(&sources, "res-b", 0.25, 10.0);
        write_constant(&sources, "gen-1", 0.8, 2.0);

        std::fs::write(
            dir.path().join("player.json"),
            format!(r#"{{ "sample_rate": {} }}"#, RATE),
        )
        .unwrap();

        Self { dir }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn write_document(&self, mut entries: Vec<TimelineEntry>) -> std::path::PathBuf {
        let tracks = vec![
            Track::new("A", "res-a").with_clip(1, 0.0, 10.0),
            Track::new("B", "res-b").with_clip(1, 0.0, 10.0),
            Track::new("X", "gone").with_clip(1, 0.0, 2.0),
        ]
        .into_iter()
        .collect();
        link_transitions(&mut entries, &tracks);

        let path = self.path("timeline.json");
        TimelineDocument::new(tracks, entries).save(&path).unwrap();
        path
    }

    fn render(&self, document: &Path, from: f64) -> (RenderManifest, Vec<f32>) {
        let out = self.path("preview.wav");
        let options = RenderOptions {
            out: out.clone(),
            from,
            config: Some(self.path("player.json")),
            sources: Some(self.path("sources")),
            bit_depth: 32,
        };
        let manifest = render(document, &options).unwrap();

        let mut reader = WavReader::open(&out).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, RATE);
        let left: Vec<f32> = reader
            .samples::<f32>()
            .map(|s| s.unwrap())
            .step_by(2)
            .collect();
        (manifest, left)
    }
}

fn at(samples: &[f32], secs: f64) -> f32 {
    samples[(secs * RATE as f64) as usize]
}

// === Render Tests ===

#[test]
fn test_render_crossfade_document() {
    let fixture = Fixture::new();
    let document = fixture.write_document(vec![
        TimelineEntry::clip("A", 1),
        TimelineEntry::transition(TransitionKind::Crossfade, 3.0),
        TimelineEntry::clip("B", 1),
    ]);

    let (manifest, left) = fixture.render(&document, 0.0);

    assert_eq!(manifest.duration, 17.0);
    assert!(manifest.skipped.is_empty());
    assert!(manifest.preload.is_complete());
    assert!(manifest.warnings.is_empty());
    assert_eq!(left.len(), 17 * RATE as usize);

    assert!((at(&left, 1.0) - 0.5).abs() < 1e-4);
    // linear ramp halfway through the crossfade
    assert!((at(&left, 8.5) - 0.375).abs() < 1e-3);
    assert!((at(&left, 12.0) - 0.25).abs() < 1e-4);

    // no gap anywhere
    assert!(left.iter().all(|&s| s > 0.2));
    assert!(fixture.path("preview.json").exists());
}

#[test]
fn test_render_from_offset() {
    let fixture = Fixture::new();
    let document = fixture.write_document(vec![
        TimelineEntry::clip("A", 1),
        TimelineEntry::transition(TransitionKind::Silence, 2.0),
        TimelineEntry::clip("B", 1),
    ]);

    let (manifest, left) = fixture.render(&document, 11.0);

    assert_eq!(manifest.from, 11.0);
    assert_eq!(manifest.duration, 11.0);
    // 11s lands inside the silence
    assert_eq!(at(&left, 0.5), 0.0);
    assert!((at(&left, 1.5) - 0.25).abs() < 1e-4);
}

#[test]
fn test_render_skips_missing_audio() {
    let fixture = Fixture::new();
    let document = fixture.write_document(vec![
        TimelineEntry::clip("X", 1),
        TimelineEntry::clip("A", 1),
    ]);

    let (manifest, left) = fixture.render(&document, 0.0);

    assert_eq!(manifest.duration, 12.0);
    assert_eq!(manifest.skipped.len(), 1);
    assert_eq!(manifest.skipped[0].resource_id, "gone");
    assert_eq!(manifest.preload.failed.len(), 1);
    assert_eq!(at(&left, 1.0), 0.0);
    assert!((at(&left, 3.0) - 0.5).abs() < 1e-4);
}

#[test]
fn test_render_fill_before_and_after_generation() {
    let fixture = Fixture::new();
    let document = fixture.write_document(vec![
        TimelineEntry::clip("A", 1),
        TimelineEntry::transition(TransitionKind::Fill, 2.0),
        TimelineEntry::clip("B", 1),
    ]);

    let (_, pending) = fixture.render(&document, 0.0);
    assert_eq!(pending.len(), 22 * RATE as usize);
    assert_eq!(at(&pending, 11.0), 0.0);

    let mut doc = TimelineDocument::load(&document).unwrap();
    let fill_id = doc.entries[1].transition_id().unwrap().to_string();
    assert!(attach_generated_output(&mut doc.entries, &fill_id, "gen-1"));
    doc.save(&document).unwrap();

    let (manifest, generated) = fixture.render(&document, 0.0);
    assert_eq!(manifest.duration, 22.0);
    assert!((at(&generated, 11.0) - 0.8).abs() < 1e-4);
}

#[test]
fn test_render_without_source_fails() {
    let fixture = Fixture::new();
    let document = fixture.write_document(vec![TimelineEntry::clip("A", 1)]);

    let options = RenderOptions {
        out: fixture.path("preview.wav"),
        from: 0.0,
        config: Some(fixture.path("player.json")),
        sources: None,
        bit_depth: 16,
    };

    if std::env::var_os("MIXLINE_SOURCE_DIR").is_none() {
        let err = render(&document, &options).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}

#[test]
fn test_render_empty_document_fails() {
    let fixture = Fixture::new();
    let document = fixture.write_document(vec![]);

    let options = RenderOptions {
        out: fixture.path("preview.wav"),
        from: 0.0,
        config: Some(fixture.path("player.json")),
        sources: Some(fixture.path("sources")),
        bit_depth: 16,
    };
    let err = render(&document, &options).unwrap_err();
    assert_eq!(err.error_code(), "EMPTY_TIMELINE");
}
