use std::collections::HashMap;

use proptest::prelude::*;
use tilesync_clip_model::{AspectRatio, Clip, ClipId, LayoutPattern};
use tilesync_layout_core::GridLayoutAssigner;
use tilesync_render_engine::{CompositionGraphBuilder, FilterKind, GraphConfig, OUTPUT_LABEL};

fn clips(dimensions: &[(u32, u32)], duration_ms: Option<u64>) -> Vec<Clip> {
    dimensions
        .iter()
        .enumerate()
        .map(|(i, (w, h))| {
            let mut clip = Clip::new(ClipId(i), format!("/media/clip{i}.mp4"));
            clip.aspect = AspectRatio::new(*w, *h);
            clip.duration_ms = duration_ms;
            clip
        })
        .collect()
}

fn pattern_strategy() -> impl Strategy<Value = LayoutPattern> {
    prop_oneof![Just(LayoutPattern::RowMajor), Just(LayoutPattern::Serpentine)]
}

fn dimension_strategy() -> impl Strategy<Value = (u32, u32)> {
    prop_oneof![
        Just((1920, 1080)),
        Just((1080, 1920)),
        Just((640, 480)),
        Just((720, 720)),
        (16u32..4096, 16u32..4096),
    ]
}

proptest! {
    #[test]
    fn every_row_stacks_tiles_of_equal_height(
        dims in prop::collection::vec(dimension_strategy(), 1..12),
        k in 1usize..5,
        pattern in pattern_strategy(),
        duration in prop::option::of(1u64..600_000),
    ) {
        let clips = clips(&dims, duration);
        let ids: Vec<ClipId> = clips.iter().map(|c| c.id).collect();
        let tiles = GridLayoutAssigner::new(k, pattern).unwrap().assign(&ids);
        let graph = CompositionGraphBuilder::new(GraphConfig::default())
            .build(&clips, &tiles)
            .unwrap();

        let n = clips.len();
        let rows = n.div_ceil(k);
        prop_assert_eq!(graph.count("scale"), n);
        prop_assert_eq!(graph.count("color"), rows * k - n);
        prop_assert_eq!(graph.count("hstack"), rows);
        prop_assert_eq!(graph.count("vstack"), 1);
        prop_assert_eq!(graph.count("final_pad"), 1);
        prop_assert_eq!(graph.nodes.last().map(|n| n.output.as_str()), Some(OUTPUT_LABEL));

        // Height of the stream behind every label that feeds a row.
        let mut heights: HashMap<&str, u32> = HashMap::new();
        for node in &graph.nodes {
            match &node.kind {
                FilterKind::Scale { height, .. }
                | FilterKind::Pad { height, .. }
                | FilterKind::Color { height, .. } => {
                    heights.insert(node.output.as_str(), *height);
                }
                FilterKind::Format { .. } => {
                    let input = heights.get(node.inputs[0].as_str()).copied();
                    if let Some(h) = input {
                        heights.insert(node.output.as_str(), h);
                    }
                }
                _ => {}
            }
        }

        for row in graph.nodes_named("hstack") {
            prop_assert_eq!(row.inputs.len(), k);
            let row_heights: Vec<u32> = row.inputs.iter().map(|l| heights[l.as_str()]).collect();
            prop_assert!(row_heights.windows(2).all(|w| w[0] == w[1]), "uneven row {:?}", row_heights);
        }

        let stack_height: u32 = graph
            .nodes_named("hstack")
            .map(|row| heights[row.inputs[0].as_str()])
            .sum();
        prop_assert_eq!(graph.canvas_height, stack_height + 20);
        prop_assert_eq!(graph.canvas_width, 640 * k as u32 + 20);
    }
}

#[test]
fn serpentine_script_places_filler_first_on_odd_row() {
    let clips = clips(&[(1920, 1080); 5], Some(30_000));
    let ids: Vec<ClipId> = clips.iter().map(|c| c.id).collect();
    let tiles = GridLayoutAssigner::new(3, LayoutPattern::Serpentine)
        .unwrap()
        .assign(&ids);
    let graph = CompositionGraphBuilder::new(GraphConfig::default())
        .build(&clips, &tiles)
        .unwrap();

    let script = graph.to_script();
    assert!(script.contains("[f0][f1][f2]hstack=inputs=3[row0]"));
    assert!(script.contains("[cf1_0][f4][f3]hstack=inputs=3[row1]"));
    assert!(script.contains("color=c=black:s=640x360:d=30.000[c1_0]"));
    assert!(script.ends_with("[grid]pad=iw+20:ih+20:10:10:color=black[vout]\n"));
}
