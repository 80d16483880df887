//! Multi-pass recording, mid-frame resizes and realized graph topology.

mod common;

use ash::vk;
use common::{Event, Harness, count, extent};
use rstest::rstest;
use vulkanisch_core::Error;
use vulkanisch_renderer::{
    AbandonReason, BloomChain, BloomPipelines, CanonicalPipelines, ClearPolicy, Destination,
    FrameOutcome, PassDesc, PipelineId, RenderGraph, RenderGraphBuilder, TargetDesc, TargetSize,
    canonical_graph,
};

fn pipelines() -> CanonicalPipelines {
    CanonicalPipelines {
        shadow: PipelineId(0),
        color: PipelineId(1),
        bloom: BloomPipelines {
            threshold: PipelineId(2),
            horizontal_blur: PipelineId(3),
            vertical_blur: PipelineId(4),
            tonemap: PipelineId(5),
        },
    }
}

fn canonical(iterations: u32) -> RenderGraph {
    canonical_graph(pipelines(), iterations).unwrap()
}

fn target_extent(harness: &Harness, name: &str) -> vk::Extent2D {
    let id = harness.orchestrator.graph().find_target(name).unwrap();
    harness
        .orchestrator
        .topology()
        .target_extents
        .into_iter()
        .find(|(t, _)| *t == id)
        .map(|(_, e)| e)
        .unwrap()
}

#[rstest]
#[case(1)]
#[case(4)]
fn test_bloom_chain_records_every_pass_in_order(#[case] k: u32) {
    let mut harness = Harness::new(canonical(k), 2);
    harness.clear_log();
    harness.orchestrator.render_frame().unwrap();

    let recorded: Vec<String> = harness
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Record { pass, .. } => Some(pass),
            _ => None,
        })
        .collect();
    let mut expected = vec!["shadow".to_string(), "color".into(), "threshold".into()];
    for i in 0..k {
        expected.push(format!("hblur{i}"));
        expected.push(format!("vblur{i}"));
    }
    expected.push("tonemap".into());
    assert_eq!(recorded, expected);
    // 2K + 2 passes after the color pass.
    assert_eq!(recorded.len() - 2, 2 * k as usize + 2);
    assert_eq!(
        count(&harness.log, |e| matches!(e, Event::Submit { passes, .. } if *passes == recorded.len())),
        1
    );
}

#[test]
fn test_passes_bind_inputs_before_beginning() {
    let mut harness = Harness::new(canonical(1), 2);
    harness.clear_log();
    harness.orchestrator.render_frame().unwrap();
    let events = harness.events();

    let begin = |destination: &str| {
        events
            .iter()
            .position(|e| matches!(e, Event::BeginPass { destination: d, .. } if d == destination))
            .unwrap()
    };

    let color = begin("hdr");
    assert_eq!(events[color - 1], Event::BindInput("shadow".into()));
    assert!(matches!(
        &events[color],
        Event::BeginPass { depth: Some(d), clear: ClearPolicy::Color(_), .. } if d == "depth"
    ));

    let hblur = begin("bloom1");
    assert_eq!(events[hblur - 1], Event::BindInput("bloom0".into()));

    let tonemap = begin("presentable0");
    assert_eq!(
        events[tonemap - 2..tonemap],
        [Event::BindInput("hdr".into()), Event::BindInput("bloom0".into())]
    );

    let shadow = begin("shadow");
    assert!(matches!(
        &events[shadow],
        Event::BeginPass { depth: None, clear: ClearPolicy::Depth(d), .. } if *d == 1.0
    ));
}

#[test]
fn test_resize_during_recording_abandons_frame() {
    let mut harness = Harness::new(canonical(4), 2);
    harness.orchestrator.render_frame().unwrap();
    harness.orchestrator.render_frame().unwrap();
    harness.resize_during(2, extent(1024, 768));
    harness.clear_log();

    let outcome = harness.orchestrator.render_frame().unwrap();
    assert_eq!(outcome, FrameOutcome::Abandoned(AbandonReason::Resized));
    assert_eq!(count(&harness.log, |e| matches!(e, Event::Submit { .. })), 0);
    assert_eq!(count(&harness.log, |e| matches!(e, Event::Present { .. })), 0);
    assert_eq!(count(&harness.log, |e| *e == Event::WaitIdle), 1);
    assert!(harness.events().contains(&Event::CreateChain {
        extent: extent(1024, 768),
        images: 3,
    }));

    assert!(matches!(
        harness.orchestrator.render_frame().unwrap(),
        FrameOutcome::Presented { .. }
    ));
    assert_eq!(harness.orchestrator.surface().extent(), extent(1024, 768));
    assert_eq!(target_extent(&harness, "hdr"), extent(1024, 768));
    assert_eq!(target_extent(&harness, "bloom0"), extent(1024, 768));
}

#[test]
fn test_fixed_targets_survive_recreation() {
    let mut harness = Harness::new(canonical(1), 2);
    harness.orchestrator.render_frame().unwrap();
    harness.orchestrator.notify_resize(extent(640, 480));
    harness.orchestrator.render_frame().unwrap();
    harness.orchestrator.notify_resize(extent(320, 240));
    harness.orchestrator.render_frame().unwrap();

    let created = |name: &str| {
        count(&harness.log, |e| matches!(e, Event::CreateTarget { name: n, .. } if n == name))
    };
    assert_eq!(created("shadow"), 1);
    assert_eq!(created("hdr"), 3);
    assert_eq!(created("depth"), 3);
    assert_eq!(target_extent(&harness, "shadow"), extent(2048, 2048));
    assert_eq!(target_extent(&harness, "depth"), extent(320, 240));
}

#[test]
fn test_topology_is_stable_across_recreation() {
    let mut harness = Harness::new(canonical(4), 2);
    let before = harness.orchestrator.topology();
    assert_eq!(before, harness.orchestrator.topology());

    let graph = harness.orchestrator.graph().clone();
    assert_eq!(before.passes.len(), graph.passes().len());
    for (topology, pass) in before.passes.iter().zip(graph.passes()) {
        assert_eq!(topology.name, pass.name);
        assert_eq!(topology.destination, pass.destination);
        assert_eq!(topology.inputs, pass.inputs);
        assert_eq!(topology.depth, pass.depth);
        if let Destination::Target(id) = pass.destination {
            assert!(!pass.inputs.contains(&id));
        }
    }

    harness.orchestrator.notify_resize(extent(1280, 720));
    harness.orchestrator.render_frame().unwrap();
    let after = harness.orchestrator.topology();
    assert_eq!(before.passes, after.passes);
    assert_ne!(before.target_extents, after.target_extents);
    assert_eq!(after.target_extents.len(), graph.targets().len());
}

#[test]
fn test_same_extent_recreation_reproduces_topology() {
    let mut harness = Harness::new(canonical(4), 2);
    harness.orchestrator.render_frame().unwrap();
    let before = harness.orchestrator.topology();

    harness.backend().fail_next_acquires(1);
    harness.clear_log();
    assert_eq!(
        harness.orchestrator.render_frame().unwrap(),
        FrameOutcome::Abandoned(AbandonReason::StaleAcquire)
    );
    let events = harness.events();
    let teardown = events.iter().position(|e| *e == Event::SurfaceTeardown).unwrap();
    let ready = events
        .iter()
        .position(|e| matches!(e, Event::SurfaceReady(_)))
        .unwrap();
    assert!(teardown < ready);
    assert_eq!(harness.orchestrator.surface().recreations(), 1);

    // Same extent: passes, bindings and realized target sizes all match.
    assert_eq!(before, harness.orchestrator.topology());
    assert!(matches!(
        harness.orchestrator.render_frame().unwrap(),
        FrameOutcome::Presented { .. }
    ));
    assert_eq!(before, harness.orchestrator.topology());
}

#[test]
fn test_renderer_records_with_declared_inputs_bound() {
    let mut harness = Harness::new(canonical(1), 2);
    harness.clear_log();
    harness.orchestrator.render_frame().unwrap();

    let inputs: Vec<(String, Vec<String>)> = harness
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Record { pass, inputs, .. } => Some((pass, inputs)),
            _ => None,
        })
        .collect();
    let expect = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
    assert_eq!(
        inputs,
        [
            ("shadow".to_string(), expect(&[])),
            ("color".into(), expect(&["shadow"])),
            ("threshold".into(), expect(&["hdr"])),
            ("hblur0".into(), expect(&["bloom0"])),
            ("vblur0".into(), expect(&["bloom1"])),
            ("tonemap".into(), expect(&["hdr", "bloom0"])),
        ]
    );
}

#[test]
fn test_scaled_bloom_targets_follow_surface() {
    let mut builder = RenderGraphBuilder::new();
    let hdr = builder.add_target(TargetDesc::new(
        "hdr",
        vk::Format::R16G16B16A16_SFLOAT,
        TargetSize::Surface,
    ));
    builder
        .add_pass(
            PassDesc::new("color", PipelineId(0), Destination::Target(hdr))
                .with_clear(ClearPolicy::Color([0.0; 4])),
        )
        .unwrap();
    BloomChain::new(pipelines().bloom)
        .with_divisor(2)
        .append(&mut builder, hdr)
        .unwrap();
    let harness = Harness::new(builder.build().unwrap(), 2);

    assert_eq!(target_extent(&harness, "bloom0"), extent(400, 300));
    assert_eq!(target_extent(&harness, "bloom1"), extent(400, 300));
}

#[test]
fn test_bloom_chain_needs_written_hdr() {
    let mut builder = RenderGraphBuilder::new();
    let hdr = builder.add_target(TargetDesc::new(
        "hdr",
        vk::Format::R16G16B16A16_SFLOAT,
        TargetSize::Surface,
    ));
    let err = BloomChain::new(pipelines().bloom)
        .append(&mut builder, hdr)
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}
