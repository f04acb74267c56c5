//! Probe clips and print the composition plan.

use std::path::PathBuf;

use tilesync_common::clock::format_hms;
use tilesync_common::config::AppConfig;
use tilesync_render_engine::{CompositionGraphBuilder, GraphConfig};

use crate::GridArgs;

pub async fn run(
    config: &AppConfig,
    files: Vec<PathBuf>,
    grid: GridArgs,
    tile_width: Option<u32>,
    json: bool,
) -> anyhow::Result<()> {
    let session = super::session_config(config, &grid)?;
    let controller = super::load_session(&files, session).await?;

    let mut graph_config = GraphConfig::from(&config.export);
    if let Some(width) = tile_width {
        graph_config.tile_width = width;
    }

    let clips: Vec<_> = controller.clips().cloned().collect();
    let assignment = controller.tile_assignment();
    let graph = CompositionGraphBuilder::new(graph_config).build(&clips, &assignment)?;

    if json {
        let report = serde_json::json!({
            "session": controller.session().snapshot(),
            "graph": graph,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Inputs:");
    for clip in &clips {
        let index = graph
            .input_index(clip.id)
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".to_string());
        let geometry = clip
            .aspect
            .map(|a| format!("{a} ({:.2}:1)", a.ratio()))
            .unwrap_or_else(|| "?".to_string());
        let duration = clip
            .duration_ms
            .map(format_hms)
            .unwrap_or_else(|| "--:--:--".to_string());
        let cell = assignment
            .cell_of(clip.id)
            .map(|c| format!("({}, {})", c.row, c.column))
            .unwrap_or_default();
        println!(
            "  {index}: {} {geometry} {duration} {cell}",
            clip.display_name()
        );
    }
    println!();
    println!(
        "Grid: {} x {} -> {}x{}, duration {}",
        graph.rows,
        graph.columns,
        graph.canvas_width,
        graph.canvas_height,
        graph
            .duration_ms
            .map(format_hms)
            .unwrap_or_else(|| "unknown".to_string())
    );
    println!();
    println!("Filter graph:");
    print!("{}", graph.to_script());

    Ok(())
}
