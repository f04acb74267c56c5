//! TileSync CLI: plan and export synchronized video grids.
//!
//! Usage:
//!   tilesync layout --clips N      Show how N clips are laid out
//!   tilesync plan <FILES>...       Probe clips and print the filter graph
//!   tilesync export <FILES>... -o  Compose clips into one grid video
//!   tilesync check                 Check for ffmpeg and ffprobe

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use tilesync_clip_model::LayoutPattern;
use tilesync_layout_core::GridSpec;

mod commands;

#[derive(Parser)]
#[command(
    name = "tilesync",
    about = "Synchronized playback and grid export for video comparisons",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Grid shape options shared by every command that lays out clips.
#[derive(Args, Debug, Clone, Default)]
pub struct GridArgs {
    /// Tiles per row
    #[arg(long, conflicts_with = "grid")]
    per_row: Option<usize>,

    /// Grid preset as ROWSxCOLUMNS (e.g. 2x3); sets tiles per row to COLUMNS
    #[arg(long)]
    grid: Option<GridSpec>,

    /// Layout pattern: row-major or serpentine
    #[arg(long)]
    pattern: Option<LayoutPattern>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the tile assignment for a number of clips
    Layout {
        /// Number of clips
        #[arg(long)]
        clips: usize,

        #[command(flatten)]
        grid: GridArgs,

        /// Print the assignment as JSON
        #[arg(long)]
        json: bool,
    },

    /// Probe clips and print the composition filter graph
    Plan {
        /// Video files in tile order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        grid: GridArgs,

        /// Tile width in pixels
        #[arg(long)]
        tile_width: Option<u32>,

        /// Print the graph as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compose clips into a single grid video
    Export {
        /// Video files in tile order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        grid: GridArgs,

        /// Tile width in pixels
        #[arg(long)]
        tile_width: Option<u32>,

        /// Mute these clips (zero-based, repeatable); the first unmuted clip supplies the audio
        #[arg(long = "mute", value_name = "INDEX")]
        muted: Vec<usize>,

        /// Export without audio
        #[arg(long)]
        no_audio: bool,
    },

    /// Check for the external tools TileSync needs
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = tilesync_common::config::AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    tilesync_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Layout { clips, grid, json } => commands::layout::run(&config, clips, grid, json),
        Commands::Plan {
            files,
            grid,
            tile_width,
            json,
        } => commands::plan::run(&config, files, grid, tile_width, json).await,
        Commands::Export {
            files,
            output,
            grid,
            tile_width,
            muted,
            no_audio,
        } => {
            commands::export::run(
                &config,
                commands::export::ExportArgs {
                    files,
                    output,
                    grid,
                    tile_width,
                    muted,
                    no_audio,
                },
            )
            .await
        }
        Commands::Check => commands::check::run(),
    }
}
