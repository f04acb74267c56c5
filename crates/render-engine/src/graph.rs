//! Grid composition graph.
//!
//! Every real clip is scaled to the tile width with its aspect preserved
//! and converted to a common pixel format. Tiles shorter than the tallest
//! tile of their row are letterboxed up to the row height, empty cells of
//! the last row get solid filler tiles, rows are stacked horizontally and
//! the rows vertically, and the result is padded by the margin.
//!
//! The graph is plain data; [`FilterGraph::to_filter_complex`] renders it
//! as ffmpeg filtergraph syntax.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use tilesync_clip_model::{Clip, ClipId, TileAssignment, TileCell};
use tilesync_common::clock::ms_to_secs;
use tilesync_common::config::ExportDefaults;
use tilesync_common::error::{TileSyncError, TileSyncResult};

/// Label of the composed video stream.
pub const OUTPUT_LABEL: &str = "vout";

/// Geometry and colors of the composed grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Width every tile is scaled to.
    pub tile_width: u32,
    /// Border around the whole grid.
    pub margin: u32,
    /// Letterbox, filler and margin color (any ffmpeg color).
    pub background: String,
    pub pixel_format: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            tile_width: 640,
            margin: 10,
            background: "black".to_string(),
            pixel_format: "yuv420p".to_string(),
        }
    }
}

impl From<&ExportDefaults> for GraphConfig {
    fn from(defaults: &ExportDefaults) -> Self {
        Self {
            tile_width: defaults.tile_width,
            margin: defaults.margin,
            background: defaults.background.clone(),
            pixel_format: defaults.encoding.pixel_format.clone(),
        }
    }
}

/// A processing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum FilterKind {
    /// Aspect-preserving scale of a clip to the tile size.
    Scale { width: u32, height: u32 },
    Format { pixel_format: String },
    /// Centered letterbox up to the row height.
    Pad {
        width: u32,
        height: u32,
        color: String,
    },
    /// Solid filler tile. Unbounded when `duration_secs` is `None`.
    Color {
        width: u32,
        height: u32,
        color: String,
        duration_secs: Option<f64>,
    },
    HStack { inputs: usize, shortest: bool },
    VStack { inputs: usize, shortest: bool },
    /// Margin around the whole grid.
    FinalPad { margin: u32, color: String },
}

impl FilterKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scale { .. } => "scale",
            Self::Format { .. } => "format",
            Self::Pad { .. } => "pad",
            Self::Color { .. } => "color",
            Self::HStack { .. } => "hstack",
            Self::VStack { .. } => "vstack",
            Self::FinalPad { .. } => "final_pad",
        }
    }

    /// ffmpeg filter expression.
    pub fn to_filter(&self) -> String {
        match self {
            Self::Scale { width, height } => format!("scale={width}:{height},setsar=1"),
            Self::Format { pixel_format } => format!("format={pixel_format}"),
            Self::Pad {
                width,
                height,
                color,
            } => format!("pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:color={color}"),
            Self::Color {
                width,
                height,
                color,
                duration_secs,
            } => match duration_secs {
                Some(secs) => format!("color=c={color}:s={width}x{height}:d={secs:.3}"),
                None => format!("color=c={color}:s={width}x{height}"),
            },
            Self::HStack { inputs, shortest } => stack_filter("hstack", *inputs, *shortest),
            Self::VStack { inputs, shortest } => stack_filter("vstack", *inputs, *shortest),
            Self::FinalPad { margin, color } => {
                let twice = margin * 2;
                format!("pad=iw+{twice}:ih+{twice}:{margin}:{margin}:color={color}")
            }
        }
    }
}

/// ffmpeg rejects stacks with fewer than two inputs.
fn stack_filter(name: &str, inputs: usize, shortest: bool) -> String {
    if inputs < 2 {
        return "null".to_string();
    }
    let mut filter = format!("{name}=inputs={inputs}");
    if shortest {
        filter.push_str(":shortest=1");
    }
    filter
}

/// One node: labeled inputs, a filter, one labeled output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterNode {
    pub inputs: Vec<String>,
    pub kind: FilterKind,
    pub output: String,
}

impl FilterNode {
    fn new(inputs: Vec<String>, kind: FilterKind, output: impl Into<String>) -> Self {
        Self {
            inputs,
            kind,
            output: output.into(),
        }
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{input}]")?;
        }
        write!(f, "{}[{}]", self.kind.to_filter(), self.output)
    }
}

/// Export-time composition DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGraph {
    /// Input locators; position `i` is ffmpeg input `i`.
    pub inputs: Vec<PathBuf>,
    /// Clip behind each input.
    pub input_clips: Vec<ClipId>,
    /// Nodes in dependency order.
    pub nodes: Vec<FilterNode>,
    pub output_label: String,
    pub rows: usize,
    pub columns: usize,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Longest known clip duration.
    pub duration_ms: Option<u64>,
}

impl FilterGraph {
    /// `-filter_complex` argument.
    pub fn to_filter_complex(&self) -> String {
        self.render(";")
    }

    /// Same graph, one filterchain per line, for `-filter_complex_script`.
    pub fn to_script(&self) -> String {
        let mut script = self.render(";\n");
        script.push('\n');
        script
    }

    fn render(&self, separator: &str) -> String {
        self.nodes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Number of nodes whose filter has the given [`FilterKind::name`].
    pub fn count(&self, name: &str) -> usize {
        self.nodes.iter().filter(|n| n.kind.name() == name).count()
    }

    pub fn nodes_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FilterNode> + 'a {
        self.nodes.iter().filter(move |n| n.kind.name() == name)
    }

    /// ffmpeg input index of `clip`.
    pub fn input_index(&self, clip: ClipId) -> Option<usize> {
        self.input_clips.iter().position(|id| *id == clip)
    }
}

/// Builds [`FilterGraph`]s for a tile assignment.
#[derive(Debug, Clone, Default)]
pub struct CompositionGraphBuilder {
    config: GraphConfig,
}

impl CompositionGraphBuilder {
    pub fn new(config: GraphConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Compose `clips` (in registry order) laid out by `tiles`.
    ///
    /// Fails with `EmptyInput` for no clips and `UnknownGeometry` when any
    /// clip's aspect ratio has not been probed yet.
    pub fn build(&self, clips: &[Clip], tiles: &TileAssignment) -> TileSyncResult<FilterGraph> {
        if clips.is_empty() {
            return Err(TileSyncError::EmptyInput);
        }
        if self.config.tile_width == 0 {
            return Err(TileSyncError::out_of_range("tile width must be positive"));
        }

        let width = self.config.tile_width;
        let rows = tiles.rows;
        let columns = tiles.columns;

        // Scaled height and cell of every input.
        let mut placed = Vec::with_capacity(clips.len());
        for clip in clips {
            let aspect = clip.aspect.ok_or_else(|| TileSyncError::UnknownGeometry {
                index: clip.id.index(),
                path: clip.locator.clone(),
            })?;
            let cell = tiles
                .cell_of(clip.id)
                .ok_or_else(|| TileSyncError::not_found(clip.id.index()))?;
            placed.push((cell, aspect.even_height_for_width(width)));
        }

        let mut row_heights = vec![0u32; rows];
        for (cell, height) in &placed {
            let row = row_heights.get_mut(cell.row).ok_or_else(|| {
                TileSyncError::out_of_range(format!("tile row {} outside a {rows}-row grid", cell.row))
            })?;
            *row = (*row).max(*height);
        }

        let duration_ms = clips.iter().filter_map(|clip| clip.duration_ms).max();
        let mut nodes = Vec::new();
        let mut cell_labels: Vec<Vec<Option<String>>> = vec![vec![None; columns]; rows];

        for (input, (cell, height)) in placed.iter().enumerate() {
            nodes.push(FilterNode::new(
                vec![format!("{input}:v")],
                FilterKind::Scale {
                    width,
                    height: *height,
                },
                format!("s{input}"),
            ));
            nodes.push(FilterNode::new(
                vec![format!("s{input}")],
                FilterKind::Format {
                    pixel_format: self.config.pixel_format.clone(),
                },
                format!("f{input}"),
            ));

            let row_height = row_heights[cell.row];
            let label = if *height < row_height {
                nodes.push(FilterNode::new(
                    vec![format!("f{input}")],
                    FilterKind::Pad {
                        width,
                        height: row_height,
                        color: self.config.background.clone(),
                    },
                    format!("p{input}"),
                ));
                format!("p{input}")
            } else {
                format!("f{input}")
            };
            cell_labels[cell.row][cell.column] = Some(label);
        }

        let mut unbounded_rows = vec![false; rows];
        for TileCell { row, column } in tiles.unassigned_cells() {
            let color = format!("c{row}_{column}");
            let filler = format!("cf{row}_{column}");
            nodes.push(FilterNode::new(
                Vec::new(),
                FilterKind::Color {
                    width,
                    height: row_heights[row],
                    color: self.config.background.clone(),
                    duration_secs: duration_ms.map(ms_to_secs),
                },
                color.clone(),
            ));
            nodes.push(FilterNode::new(
                vec![color],
                FilterKind::Format {
                    pixel_format: self.config.pixel_format.clone(),
                },
                filler.clone(),
            ));
            cell_labels[row][column] = Some(filler);
            unbounded_rows[row] |= duration_ms.is_none();
        }

        let mut row_labels = Vec::with_capacity(rows);
        for (row, labels) in cell_labels.into_iter().enumerate() {
            let inputs: Vec<String> = labels.into_iter().flatten().collect();
            if inputs.len() != columns {
                return Err(TileSyncError::out_of_range(format!(
                    "row {row} has {} tiles, expected {columns}",
                    inputs.len()
                )));
            }
            let label = format!("row{row}");
            nodes.push(FilterNode::new(
                inputs,
                FilterKind::HStack {
                    inputs: columns,
                    shortest: unbounded_rows[row],
                },
                label.clone(),
            ));
            row_labels.push(label);
        }

        nodes.push(FilterNode::new(
            row_labels,
            FilterKind::VStack {
                inputs: rows,
                shortest: false,
            },
            "grid",
        ));
        nodes.push(FilterNode::new(
            vec!["grid".to_string()],
            FilterKind::FinalPad {
                margin: self.config.margin,
                color: self.config.background.clone(),
            },
            OUTPUT_LABEL,
        ));

        let margin = self.config.margin;
        let graph = FilterGraph {
            inputs: clips.iter().map(|clip| clip.locator.clone()).collect(),
            input_clips: clips.iter().map(|clip| clip.id).collect(),
            nodes,
            output_label: OUTPUT_LABEL.to_string(),
            rows,
            columns,
            canvas_width: width * columns as u32 + 2 * margin,
            canvas_height: row_heights.iter().sum::<u32>() + 2 * margin,
            duration_ms,
        };

        tracing::debug!(
            inputs = graph.inputs.len(),
            nodes = graph.nodes.len(),
            rows,
            columns,
            canvas_width = graph.canvas_width,
            canvas_height = graph.canvas_height,
            "Composition graph built"
        );
        Ok(graph)
    }
}
