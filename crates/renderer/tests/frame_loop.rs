//! Frame pacing, presentation order and failure handling of the frame loop.

mod common;

use common::{Event, Harness, count, extent, single_pass_graph};
use rstest::rstest;
use vulkanisch_core::Error;
use vulkanisch_renderer::{AbandonReason, FrameConfig, FrameOrchestrator, FrameOutcome};

#[test]
fn test_hundred_frames_present_in_acquisition_order() {
    let mut harness = Harness::new(single_pass_graph(), 2);
    harness.clear_log();

    for i in 0..100u32 {
        let outcome = harness.orchestrator.render_frame().unwrap();
        assert_eq!(
            outcome,
            FrameOutcome::Presented {
                image: i % 3,
                slot: (i % 2) as usize,
            }
        );
    }
    assert_eq!(harness.orchestrator.presented_frames(), 100);

    let events = harness.events();
    let acquired: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            Event::Acquire { image, .. } => Some(*image),
            _ => None,
        })
        .collect();
    let presented: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            Event::Present { image, .. } => Some(*image),
            _ => None,
        })
        .collect();
    assert_eq!(acquired.len(), 100);
    assert_eq!(acquired, presented);

    // Every present directly follows the submission of the same slot.
    for (i, event) in events.iter().enumerate() {
        if let Event::Present { slot, .. } = event {
            assert!(matches!(events[i - 1], Event::Submit { slot: s, passes: 1 } if s == *slot));
        }
    }
}

#[rstest]
#[case(2)]
#[case(3)]
fn test_in_flight_bounded_by_slot_count(#[case] frames_in_flight: usize) {
    let mut harness = Harness::new(single_pass_graph(), frames_in_flight);
    for _ in 0..50 {
        harness.orchestrator.render_frame().unwrap();
        assert!(harness.backend().in_flight() <= frames_in_flight);
    }
    assert_eq!(harness.backend().max_in_flight(), frames_in_flight);
}

#[test]
fn test_reacquired_image_waits_for_previous_slot() {
    // 3 images, 2 slots: frame 3 gets image 0 on slot 1 while slot 0 last used it.
    let mut harness = Harness::new(single_pass_graph(), 2);
    harness.clear_log();
    for _ in 0..4 {
        harness.orchestrator.render_frame().unwrap();
    }

    let events = harness.events();
    let acquire = events
        .iter()
        .position(|e| *e == Event::Acquire { slot: 1, image: 0 })
        .unwrap();
    assert_eq!(events[acquire + 1], Event::WaitSlot(0));
    let submit = events[acquire..]
        .iter()
        .position(|e| matches!(e, Event::Submit { .. }))
        .unwrap();
    assert!(submit > 1);

    let sync = harness.orchestrator.surface().synchronizer().unwrap();
    assert_eq!(sync.current_index(), 0);
    assert_eq!(sync.image_owner(0), Some(1));
    assert_eq!(sync.image_owner(2), Some(0));
}

#[test]
fn test_wait_timeout_is_device_lost() {
    let mut harness = Harness::new(single_pass_graph(), 2);
    harness.orchestrator.render_frame().unwrap();
    harness.orchestrator.render_frame().unwrap();
    harness.backend().hang();

    let err = harness.orchestrator.render_frame().unwrap_err();
    assert!(matches!(err, Error::DeviceLost(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_stale_acquire_abandons_and_recreates() {
    let mut harness = Harness::new(single_pass_graph(), 2);
    harness.orchestrator.render_frame().unwrap();
    harness.backend().fail_next_acquires(1);
    harness.clear_log();

    let outcome = harness.orchestrator.render_frame().unwrap();
    assert_eq!(outcome, FrameOutcome::Abandoned(AbandonReason::StaleAcquire));
    assert_eq!(count(&harness.log, |e| matches!(e, Event::Submit { .. })), 0);
    assert_eq!(count(&harness.log, |e| matches!(e, Event::CreateChain { .. })), 1);
    assert_eq!(harness.orchestrator.surface().recreations(), 1);

    assert!(matches!(
        harness.orchestrator.render_frame().unwrap(),
        FrameOutcome::Presented { .. }
    ));
}

#[test]
fn test_stale_present_recreates_before_next_frame() {
    let mut harness = Harness::new(single_pass_graph(), 2);
    harness.backend().fail_next_presents(1);
    harness.clear_log();

    assert_eq!(
        harness.orchestrator.render_frame().unwrap(),
        FrameOutcome::PresentStale
    );
    assert_eq!(count(&harness.log, |e| matches!(e, Event::Submit { .. })), 1);
    assert_eq!(count(&harness.log, |e| matches!(e, Event::CreateChain { .. })), 0);

    assert!(matches!(
        harness.orchestrator.render_frame().unwrap(),
        FrameOutcome::Presented { .. }
    ));
    assert_eq!(count(&harness.log, |e| matches!(e, Event::CreateChain { .. })), 1);
}

#[test]
fn test_zero_extent_skips_until_restored() {
    let mut harness = Harness::new(single_pass_graph(), 2);
    harness.backend().set_surface_extent(Some(extent(0, 0)));
    harness.orchestrator.notify_resize(extent(0, 0));
    harness.clear_log();

    for _ in 0..3 {
        assert_eq!(
            harness.orchestrator.render_frame().unwrap(),
            FrameOutcome::Skipped
        );
    }
    assert_eq!(count(&harness.log, |e| matches!(e, Event::Acquire { .. })), 0);
    assert_eq!(count(&harness.log, |e| matches!(e, Event::Record { .. })), 0);

    harness.backend().set_surface_extent(None);
    harness.orchestrator.notify_resize(extent(1024, 768));
    assert!(matches!(
        harness.orchestrator.render_frame().unwrap(),
        FrameOutcome::Presented { .. }
    ));
    assert_eq!(harness.orchestrator.surface().extent(), extent(1024, 768));
}

#[test]
fn test_minimized_at_startup_defers_initialization() {
    let mut harness = Harness::with_window(single_pass_graph(), 2, extent(0, 0));
    assert_eq!(count(&harness.log, |e| matches!(e, Event::CreateChain { .. })), 0);
    assert_eq!(
        harness.orchestrator.render_frame().unwrap(),
        FrameOutcome::Skipped
    );

    harness.orchestrator.notify_resize(extent(640, 480));
    assert!(matches!(
        harness.orchestrator.render_frame().unwrap(),
        FrameOutcome::Presented { .. }
    ));
}

#[test]
fn test_single_slot_ring_rejected() {
    let log = common::new_log();
    let renderer = common::ScriptedRenderer::new(single_pass_graph(), log.clone());
    let result = FrameOrchestrator::new(
        common::MockBackend::new(log.clone()),
        Box::new(renderer),
        FrameConfig::default().with_frames_in_flight(1),
        common::WINDOW,
    );
    assert!(matches!(result, Err(Error::Configuration(_))));
    assert!(log.borrow().is_empty());
}

#[test]
fn test_shutdown_releases_everything_once() {
    let mut harness = Harness::new(single_pass_graph(), 2);
    for _ in 0..5 {
        harness.orchestrator.render_frame().unwrap();
    }
    harness.clear_log();

    harness.orchestrator.shutdown().unwrap();
    harness.orchestrator.shutdown().unwrap();

    let events = harness.events();
    assert_eq!(events.first(), Some(&Event::WaitIdle));
    assert_eq!(count(&harness.log, |e| *e == Event::SurfaceTeardown), 1);
    assert_eq!(count(&harness.log, |e| *e == Event::DestroyChain), 1);
    assert_eq!(count(&harness.log, |e| matches!(e, Event::DestroySlot(_))), 2);
    assert_eq!(
        count(&harness.log, |e| matches!(e, Event::DestroyTarget { .. })),
        1
    );
    // Hosted renderer resources go before the targets they were built over.
    let teardown = events.iter().position(|e| *e == Event::SurfaceTeardown).unwrap();
    let target = events
        .iter()
        .position(|e| matches!(e, Event::DestroyTarget { .. }))
        .unwrap();
    assert!(teardown < target);
    assert_eq!(harness.backend().in_flight(), 0);
}
