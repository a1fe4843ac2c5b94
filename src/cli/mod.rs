//! CLI Module
//!
//! Command-line interface for resolving, linking and rendering timeline
//! documents.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mixline - gapless preview timelines
#[derive(Parser, Debug)]
#[command(name = "mixline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the computed timeline of a document
    #[command(name = "resolve")]
    Resolve {
        /// Timeline document (JSON)
        document: PathBuf,

        /// Print the resolution as JSON
        #[arg(long)]
        json: bool,
    },

    /// Link crossfades and beatsyncs to their neighbouring clips
    #[command(name = "link")]
    Link {
        /// Timeline document (JSON)
        document: PathBuf,

        /// Write the linked document back
        #[arg(short, long)]
        write: bool,
    },

    /// Record the generated audio for a fill transition
    #[command(name = "attach")]
    Attach {
        /// Timeline document (JSON)
        document: PathBuf,

        /// Id of the fill transition
        transition_id: String,

        /// Resource id of the generated audio
        resource_id: String,
    },

    /// Play the timeline offline into a WAV file
    #[command(name = "render")]
    Render {
        /// Timeline document (JSON)
        document: PathBuf,

        /// Output WAV path; a JSON manifest is written next to it
        #[arg(short, long)]
        out: PathBuf,

        /// Start position in seconds
        #[arg(long, default_value_t = 0.0)]
        from: f64,

        /// Player configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory holding the source audio
        #[arg(short, long)]
        sources: Option<PathBuf>,

        /// Output bit depth: 16, 24 or 32
        #[arg(long, default_value_t = 24)]
        bit_depth: u16,
    },
}
