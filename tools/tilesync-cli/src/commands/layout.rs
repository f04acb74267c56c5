//! Show how clips are assigned to grid cells.

use tilesync_clip_model::ClipId;
use tilesync_common::config::AppConfig;
use tilesync_layout_core::{GridLayoutAssigner, GridSpec};

use crate::GridArgs;

pub fn run(config: &AppConfig, clips: usize, grid: GridArgs, json: bool) -> anyhow::Result<()> {
    let session = super::session_config(config, &grid)?;
    let assigner = GridLayoutAssigner::new(session.tiles_per_row, session.pattern)?;
    let ids: Vec<ClipId> = (0..clips).map(ClipId).collect();
    let assignment = assigner.assign(&ids);

    if json {
        println!("{}", serde_json::to_string_pretty(&assignment)?);
        return Ok(());
    }

    println!(
        "{clips} clip(s), {} per row, {}: {} row(s)",
        assignment.columns, session.pattern, assignment.rows
    );
    if let Some(spec) = grid.grid {
        if clips > spec.capacity() {
            println!("  [WARN] {clips} clips exceed the {spec} preset ({} cells)", spec.capacity());
            if let Some(fit) = GridSpec::smallest_fitting(clips) {
                println!("  [HINT] --grid {fit} fits {clips} clips");
            }
        }
    }
    println!();

    for row in assignment.grid() {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| match cell {
                Some(id) => format!("[{:>3}]", id.index()),
                None => "[ --]".to_string(),
            })
            .collect();
        println!("  {}", cells.join(" "));
    }

    let fillers = assignment.unassigned_cells();
    if !fillers.is_empty() {
        println!();
        println!("Filler tiles:");
        for cell in fillers {
            println!("  row {}, column {}", cell.row, cell.column);
        }
    }

    Ok(())
}
