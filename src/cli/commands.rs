//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::config::PlayerConfig;
use crate::engine::buffer::{calculate_peak, calculate_rms};
use crate::engine::cache::{CacheStats, PreloadReport};
use crate::engine::io::export_audio;
use crate::engine::source::{ByteSource, DirectorySource};
use crate::engine::{AudioGraph, FadeCurve, OfflineGraph, PlaybackScheduler, SkippedSegment};
use crate::error::{MixlineError, Result};
use crate::timeline::{
    attach_generated_output, link_transitions, pending_generation, SegmentKind, TimelineDocument,
};

/// Print the computed timeline and any resolution warnings.
pub fn resolve(document: &Path, json: bool) -> Result<()> {
    info!("Resolving timeline: {}", document.display());

    let doc = TimelineDocument::load(document)?;
    let resolution = doc.resolve();

    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
        return Ok(());
    }

    println!("Segments:");
    println!("{:-<60}", "");
    for (i, segment) in resolution.timeline.segments().iter().enumerate() {
        let detail = match &segment.kind {
            SegmentKind::Clip { source } => {
                format!("{} [{:.3}, {:.3})", source.resource_id, source.start, source.end)
            }
            SegmentKind::Crossfade { prev, next } => format!("{} -> {}", prev.resource_id, next.resource_id),
            SegmentKind::Pending { transition_id, .. } => transition_id.clone(),
            SegmentKind::Silence => String::new(),
        };
        println!(
            "{:>3}  {:>9.3}  {:>9.3}  {:<16} {}",
            i,
            segment.out_start,
            segment.out_end,
            segment.label(),
            detail
        );
    }
    println!("{:-<60}", "");
    println!("Total duration: {:.3}s", resolution.total_duration());

    if !resolution.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &resolution.warnings {
            println!("  - {}", warning);
        }
    }

    Ok(())
}

/// Establish crossfade linkage from the neighbouring clips.
pub fn link(document: &Path, write: bool) -> Result<()> {
    info!("Linking transitions: {}", document.display());

    let mut doc = TimelineDocument::load(document)?;
    let linked = link_transitions(&mut doc.entries, &doc.tracks);
    println!("Linked transitions: {}", linked);

    let pending = pending_generation(&doc.entries);
    if !pending.is_empty() {
        println!("Fills awaiting generation: {}", pending.join(", "));
    }

    if write {
        doc.save(document)?;
        println!("Document saved: {}", document.display());
    }

    Ok(())
}

/// Attach a generated resource to a fill transition.
pub fn attach(document: &Path, transition_id: &str, resource_id: &str) -> Result<()> {
    let mut doc = TimelineDocument::load(document)?;

    if !attach_generated_output(&mut doc.entries, transition_id, resource_id) {
        return Err(MixlineError::InvalidConfig {
            reason: format!("no fill transition with id '{}'", transition_id),
        });
    }

    doc.save(document)?;
    println!("Fill {} now plays {}", transition_id, resource_id);
    Ok(())
}

/// Side-car written next to every rendered preview
#[derive(Debug, Serialize)]
pub struct RenderManifest {
    pub rendered_at: DateTime<Utc>,
    pub document: PathBuf,
    pub output: PathBuf,
    pub fingerprint: String,
    pub from: f64,
    pub duration: f64,
    pub sample_rate: u32,
    pub fade_curve: FadeCurve,
    pub peak_db: f32,
    pub rms_db: f32,
    pub warnings: Vec<String>,
    pub preload: PreloadReport,
    pub skipped: Vec<SkippedSegment>,
    pub cache: CacheStats,
}

/// Options for `render`
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub out: PathBuf,
    pub from: f64,
    pub config: Option<PathBuf>,
    pub sources: Option<PathBuf>,
    pub bit_depth: u16,
}

/// Resolve, play into an offline graph and export the mix.
pub fn render(document: &Path, options: &RenderOptions) -> Result<RenderManifest> {
    info!("Rendering timeline: {}", document.display());

    let mut config = match &options.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    }
    .with_env_overrides()?;
    if let Some(dir) = &options.sources {
        config.source_dir = Some(dir.clone());
    }

    let doc = TimelineDocument::load(document)?;
    let resolution = doc.resolve();
    for warning in &resolution.warnings {
        warn!("{}", warning);
    }
    let fingerprint = resolution.timeline.fingerprint();

    let source = open_source(&config)?;
    let mut player = PlaybackScheduler::new(OfflineGraph::new(config.sample_rate), source, &config);
    player.set_segments(resolution.timeline)?;

    let preload = player.preload()?;
    let outcome = player.play(options.from)?;
    let report = outcome.report().cloned().unwrap_or_default();

    let start = player.graph().current_time();
    let duration = player.total_duration() - report.from_time;
    let mix = player.graph().render(start, start + duration);
    player.graph_mut().advance(duration);
    player.tick();

    export_audio(&mix, &options.out, options.bit_depth)?;

    let manifest = RenderManifest {
        rendered_at: Utc::now(),
        document: document.to_path_buf(),
        output: options.out.clone(),
        fingerprint,
        from: report.from_time,
        duration,
        sample_rate: config.sample_rate,
        fade_curve: config.fade_curve,
        peak_db: calculate_peak(&mix),
        rms_db: calculate_rms(&mix),
        warnings: resolution.warnings.iter().map(|w| w.to_string()).collect(),
        preload,
        skipped: report.skipped,
        cache: player.cache().stats(),
    };
    player.destroy();

    let manifest_path = options.out.with_extension("json");
    std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;

    println!("Rendered {:.3}s to {}", duration, options.out.display());
    println!("Peak: {:.1} dBFS, RMS: {:.1} dBFS", manifest.peak_db, manifest.rms_db);
    if !manifest.skipped.is_empty() {
        println!("Skipped segments: {}", manifest.skipped.len());
    }

    Ok(manifest)
}

/// Pick the byte source the configuration names
fn open_source(config: &PlayerConfig) -> Result<Box<dyn ByteSource>> {
    if let Some(dir) = &config.source_dir {
        return Ok(Box::new(DirectorySource::scan(dir)?));
    }
    if let Some(source) = open_remote(config)? {
        return Ok(source);
    }

    Err(MixlineError::InvalidConfig {
        reason: "no audio source: pass --sources or set source_dir/remote_url".to_string(),
    })
}

#[cfg(feature = "remote")]
fn open_remote(config: &PlayerConfig) -> Result<Option<Box<dyn ByteSource>>> {
    match &config.remote_url {
        Some(url) => {
            let source = crate::engine::source::HttpSource::new(url.clone(), config.fetch_timeout_ms)?;
            Ok(Some(Box::new(source)))
        }
        None => Ok(None),
    }
}

#[cfg(not(feature = "remote"))]
fn open_remote(config: &PlayerConfig) -> Result<Option<Box<dyn ByteSource>>> {
    if config.remote_url.is_some() {
        warn!("remote_url is set but this build has no `remote` feature");
    }
    Ok(None)
}
