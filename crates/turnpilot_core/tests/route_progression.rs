//! Integration tests for route progression, loops and turn matching.

use turnpilot_core::{
    match_turn, Activity, GameState, GameStateKind, PlannedRoute, RouteError, Segment,
    SegmentSequenceBuilder, TrackPoint, TurnAvailabilityTracker, TurnDecision, TurnDirection,
};

fn seven_segment_route() -> PlannedRoute {
    SegmentSequenceBuilder::starting_at("seg-1")
        .turning_left_to("seg-2")
        .going_straight_to("seg-3")
        .turning_right_to("seg-4")
        .going_straight_to("seg-5")
        .going_straight_to("seg-6")
        .turning_right_to("seg-7")
        .build("test")
}

#[test]
fn test_following_segments_updates_accessors() {
    let mut route = SegmentSequenceBuilder::starting_at("seg-1")
        .going_straight_to("seg-2")
        .turning_right_to("seg-3")
        .build("test");

    route.entered_segment("seg-1").unwrap();
    route.entered_segment("seg-2").unwrap();

    assert_eq!(route.current_segment_id(), Some("seg-2"));
    assert_eq!(route.next_segment_id(), Some("seg-3"));
    assert_eq!(route.turn_to_next_segment(), TurnDirection::Right);
}

#[test]
fn test_every_step_of_a_long_route() {
    let mut route = seven_segment_route();
    let expected_turns = [
        TurnDirection::Left,
        TurnDirection::GoStraight,
        TurnDirection::Right,
        TurnDirection::GoStraight,
        TurnDirection::GoStraight,
        TurnDirection::Right,
        TurnDirection::None,
    ];

    for (index, expected) in expected_turns.iter().enumerate() {
        let id = format!("seg-{}", index + 1);
        route.entered_segment(&id).unwrap();

        assert_eq!(route.current_segment_id(), Some(id.as_str()));
        assert_eq!(route.turn_to_next_segment(), *expected);
    }

    assert!(route.is_on_last_segment());
}

#[test]
fn test_segment_not_on_route_is_rejected_and_cursor_unchanged() {
    let mut route = seven_segment_route();
    route.entered_segment("seg-1").unwrap();
    route.entered_segment("seg-2").unwrap();

    let result = route.entered_segment("seg-NOT-ON-ROUTE");

    assert!(matches!(result, Err(RouteError::UnexpectedSegment { .. })));
    assert_eq!(route.current_segment_id(), Some("seg-2"));
    assert_eq!(route.next_segment_id(), Some("seg-3"));
}

#[test]
fn test_segment_before_start_is_rejected() {
    let mut route = seven_segment_route();

    assert!(route.entered_segment("seg-3").is_err());
    assert_eq!(route.current_segment_id(), None);
}

#[test]
fn test_turn_matching_sends_only_expected_turn() {
    let mut route = seven_segment_route();
    route.entered_segment("seg-1").unwrap();
    route.entered_segment("seg-2").unwrap();
    route.entered_segment("seg-3").unwrap();

    assert_eq!(
        match_turn(&route, &[TurnDirection::Left, TurnDirection::Right]),
        TurnDecision::Execute(TurnDirection::Right)
    );
    assert!(matches!(
        match_turn(&route, &[TurnDirection::Left, TurnDirection::GoStraight]),
        TurnDecision::Mismatch { .. }
    ));
}

#[test]
fn test_tracker_feeds_matcher() {
    let mut route = seven_segment_route();
    route.entered_segment("seg-1").unwrap();
    let mut tracker = TurnAvailabilityTracker::new();

    assert_eq!(tracker.observe("somethingempty", Some("seg-1")), None);
    assert_eq!(tracker.observe("gostraight", Some("seg-1")), None);
    let options = tracker.observe("turnleft", Some("seg-1")).unwrap();

    assert_eq!(
        match_turn(&route, &options),
        TurnDecision::Execute(TurnDirection::Left)
    );
}

// ============================================================================
// LOOPS
// ============================================================================

/// A square loop with a lead-in: seg-0 → (seg-1 → seg-2 → seg-3 → seg-4) → seg-1
fn loop_segments() -> Vec<Segment> {
    vec![
        Segment::new("seg-0", vec![TrackPoint::new(0.0, 0.0, 0.0)])
            .with_next_from_b(TurnDirection::GoStraight, "seg-1"),
        Segment::new("seg-1", vec![TrackPoint::new(1.0, 0.0, 0.0)])
            .with_next_from_b(TurnDirection::Left, "seg-2"),
        Segment::new("seg-2", vec![TrackPoint::new(1.0, 1.0, 0.0)])
            .with_next_from_b(TurnDirection::Left, "seg-3"),
        Segment::new("seg-3", vec![TrackPoint::new(2.0, 1.0, 0.0)])
            .with_next_from_b(TurnDirection::Left, "seg-4"),
        Segment::new("seg-4", vec![TrackPoint::new(2.0, 0.0, 0.0)])
            .with_next_from_b(TurnDirection::Left, "seg-1"),
    ]
}

fn loop_route() -> PlannedRoute {
    SegmentSequenceBuilder::starting_at("seg-0")
        .going_straight_to("seg-1")
        .turning_left_to("seg-2")
        .turning_left_to("seg-3")
        .turning_left_to("seg-4")
        .loop_from("seg-1")
        .build("square")
}

fn ride_loop_once() -> GameState {
    let segments = loop_segments();
    let route = loop_route();
    let positions = [
        TrackPoint::new(0.0, 0.0, 0.0),
        TrackPoint::new(1.0, 0.0, 0.0),
        TrackPoint::new(1.0, 1.0, 0.0),
        TrackPoint::new(2.0, 1.0, 0.0),
        TrackPoint::new(2.0, 0.0, 0.0),
        // back on seg-1, adjacent to the last segment
        TrackPoint::new(1.0, 0.0, 0.0),
    ];

    positions
        .iter()
        .fold(GameState::InGame(Activity::new(7, 8)), |state, position| {
            state.update_position(*position, &segments, &route).unwrap()
        })
}

#[test]
fn test_loop_route_completes_after_last_segment() {
    let state = ride_loop_once();

    assert_eq!(state.kind(), GameStateKind::CompletedRoute);
    assert!(state.route().unwrap().is_loop());
}

#[test]
fn test_loop_restart_rewinds_to_loop_start() {
    let state = ride_loop_once().restart_loop(&loop_segments()).unwrap();

    assert_eq!(state.kind(), GameStateKind::OnRoute);
    let route = state.route().unwrap();
    assert!(!route.has_completed());
    assert_eq!(route.current_segment_id(), Some("seg-1"));
    assert_eq!(route.next_segment_id(), Some("seg-2"));
    assert_eq!(route.loop_count(), 1);
    assert_eq!(state.current_segment_id(), Some("seg-1"));
}

#[test]
fn test_second_lap_progresses_normally() {
    let segments = loop_segments();
    let state = ride_loop_once().restart_loop(&segments).unwrap();

    let state = state
        .update_position(TrackPoint::new(1.0, 1.0, 0.0), &segments, &loop_route())
        .unwrap();

    assert_eq!(
        state.route().unwrap().current_segment_id(),
        Some("seg-2")
    );
}

#[test]
fn test_non_loop_route_cannot_restart() {
    let segments = vec![
        Segment::new("a", vec![TrackPoint::new(0.0, 0.0, 0.0)])
            .with_next_from_b(TurnDirection::Left, "b"),
        Segment::new("b", vec![TrackPoint::new(1.0, 0.0, 0.0)])
            .with_next_from_b(TurnDirection::Left, "c"),
        Segment::new("c", vec![TrackPoint::new(2.0, 0.0, 0.0)]),
    ];
    let route = SegmentSequenceBuilder::starting_at("a")
        .turning_left_to("b")
        .build("line");
    let completed = [
        TrackPoint::new(0.0, 0.0, 0.0),
        TrackPoint::new(1.0, 0.0, 0.0),
        TrackPoint::new(2.0, 0.0, 0.0),
    ]
    .iter()
    .fold(GameState::InGame(Activity::new(1, 1)), |state, position| {
        state.update_position(*position, &segments, &route).unwrap()
    });

    assert_eq!(completed.kind(), GameStateKind::CompletedRoute);
    assert!(completed.restart_loop(&segments).is_err());
}
