use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gallery::types::MediaKind;

/// Resolve random image/video API endpoints into displayable media URLs
#[derive(Parser)]
#[command(name = "gallery")]
#[command(about = "Resolve and browse random media sources", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Database URL for saved sources (overrides config and GALLERY_DATABASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List known sources (built-in, configured and saved)
    Sources {
        /// Only show sources of this kind (image, video)
        #[arg(short, long)]
        kind: Option<MediaKind>,
    },
    /// Resolve one source and print its locator
    Resolve {
        /// Source id
        id: String,
    },
    /// Drive one gallery through a sequence of selections, printing each outcome
    Roll {
        /// Gallery kind (image, video)
        #[arg(short, long, default_value = "image")]
        kind: MediaKind,
        /// Source ids to select in order; refreshes the initial source when empty
        ids: Vec<String>,
    },
    /// Manage saved sources
    Saved {
        #[command(subcommand)]
        action: SavedAction,
    },
    /// Download a video through the download proxy
    Download {
        /// Video URL to fetch
        video_url: String,
        /// File name offered in the attachment disposition
        #[arg(short, long)]
        filename: Option<String>,
        /// Byte range to request, e.g. `bytes=0-1023`
        #[arg(long)]
        range: Option<String>,
        /// Write the body here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Forward a GET through an edge-proxy route and print the response
    Proxy {
        /// Route id
        id: String,
        /// Query string passed to the upstream (without `?`)
        #[arg(short, long)]
        query: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SavedAction {
    /// List saved sources
    List {
        /// Only show sources of this kind (image, video)
        #[arg(short, long)]
        kind: Option<MediaKind>,
    },
    /// Save (or replace) a source
    Add {
        id: String,
        name: String,
        endpoint: String,
        /// Extraction path; omit for raw endpoints
        #[arg(short, long)]
        path: Option<String>,
        #[arg(short, long, default_value = "image")]
        kind: MediaKind,
    },
    /// Remove a saved source
    Remove { id: String },
}
