//! Integration tests for position-driven game state transitions.
//!
//! Segment graph used throughout:
//!
//! ```text
//! segment-1 (1,2)─(3,2)        segment-2 (4,2)
//!
//! route-segment-1 (10,1)─(10,2)─(10,3)
//!     B: Left → route-segment-2, Right → route-segment-3, Straight → segment-4
//! route-segment-2 (12,2)
//! route-segment-3 (13,3)─(13,4)  B: Straight → segment-4
//! segment-4 (14,1)
//!
//! route: route-segment-1 ─Left─► route-segment-2 ─Right─► route-segment-3
//! ```

use turnpilot_core::{
    Activity, GameState, GameStateKind, PlannedRoute, Segment, SegmentDirection, SegmentFix,
    SegmentSequenceBuilder, TrackPoint, TransitionError, TurnDirection,
};

const RIDER: u32 = 1;
const ACTIVITY: u64 = 2;

fn position_on_segment() -> TrackPoint {
    TrackPoint::new(1.0, 2.0, 3.0)
}

fn position_off_segment() -> TrackPoint {
    TrackPoint::new(2.0, 2.0, 0.0)
}

fn route_position_1() -> TrackPoint {
    TrackPoint::new(10.0, 1.0, 3.0)
}

fn route_position_1_point_2() -> TrackPoint {
    TrackPoint::new(10.0, 2.0, 3.0)
}

fn route_position_2() -> TrackPoint {
    TrackPoint::new(12.0, 2.0, 3.0)
}

fn route_position_3() -> TrackPoint {
    TrackPoint::new(13.0, 3.0, 3.0)
}

fn route_position_3_point_2() -> TrackPoint {
    TrackPoint::new(13.0, 4.0, 3.0)
}

fn position_4() -> TrackPoint {
    TrackPoint::new(14.0, 1.0, 3.0)
}

fn segments() -> Vec<Segment> {
    vec![
        Segment::new("segment-1", vec![position_on_segment(), TrackPoint::new(3.0, 2.0, 3.0)]),
        Segment::new("segment-2", vec![TrackPoint::new(4.0, 2.0, 3.0)]),
        Segment::new(
            "route-segment-1",
            vec![
                route_position_1(),
                route_position_1_point_2(),
                TrackPoint::new(10.0, 3.0, 3.0),
            ],
        )
        .with_next_from_b(TurnDirection::Left, "route-segment-2")
        .with_next_from_b(TurnDirection::Right, "route-segment-3")
        .with_next_from_b(TurnDirection::GoStraight, "segment-4"),
        Segment::new("route-segment-2", vec![route_position_2()])
            .with_next_from_a(TurnDirection::GoStraight, "route-segment-1")
            .with_next_from_b(TurnDirection::GoStraight, "route-segment-3"),
        Segment::new(
            "route-segment-3",
            vec![route_position_3(), route_position_3_point_2()],
        )
        .with_next_from_a(TurnDirection::GoStraight, "route-segment-2")
        .with_next_from_b(TurnDirection::GoStraight, "segment-4"),
        Segment::new("segment-4", vec![position_4()])
            .with_next_from_a(TurnDirection::GoStraight, "route-segment-3")
            .with_next_from_b(TurnDirection::GoStraight, "segment-1"),
    ]
}

fn route() -> PlannedRoute {
    SegmentSequenceBuilder::starting_at("route-segment-1")
        .turning_left_to("route-segment-2")
        .turning_right_to("route-segment-3")
        .build("test")
}

fn in_game() -> GameState {
    GameState::InGame(Activity::new(RIDER, ACTIVITY))
}

/// Feeds positions from `InGame`, always offering the unstarted route.
fn ride(positions: &[TrackPoint]) -> GameState {
    let segments = segments();
    let route = route();

    positions.iter().fold(in_game(), |state, position| {
        state.update_position(*position, &segments, &route).unwrap()
    })
}

fn on_last_segment() -> GameState {
    ride(&[route_position_1(), route_position_2(), route_position_3()])
}

fn on_segment(segment_id: &str, position: TrackPoint, point_index: usize) -> GameState {
    GameState::OnSegment {
        activity: Activity::new(RIDER, ACTIVITY),
        fix: SegmentFix {
            position,
            segment_id: segment_id.to_string(),
            direction: SegmentDirection::Unknown,
            point_index,
        },
    }
}

fn direction_of(state: &GameState) -> SegmentDirection {
    match state {
        GameState::OnSegment { fix, .. }
        | GameState::OnRoute { fix, .. }
        | GameState::UpcomingTurn { fix, .. } => fix.direction,
        other => panic!("no direction in {other:?}"),
    }
}

// ============================================================================
// FROM INGAME / POSITIONED
// ============================================================================

#[test]
fn test_in_game_position_off_segment_is_positioned() {
    let state = ride(&[position_off_segment()]);

    assert_eq!(
        state,
        GameState::Positioned {
            activity: Activity::new(RIDER, ACTIVITY),
            position: position_off_segment(),
        }
    );
}

#[test]
fn test_in_game_position_on_segment_is_on_segment() {
    let state = ride(&[position_on_segment()]);

    assert_eq!(state.kind(), GameStateKind::OnSegment);
    assert_eq!(state.current_segment_id(), Some("segment-1"));
}

#[test]
fn test_in_game_position_on_route_start_is_on_route() {
    let state = ride(&[route_position_1()]);

    assert_eq!(state.kind(), GameStateKind::OnRoute);
    let route = state.route().unwrap();
    assert!(route.has_started());
    assert_eq!(route.current_segment_id(), Some("route-segment-1"));
}

#[test]
fn test_positioned_then_on_segment() {
    let state = ride(&[position_off_segment(), position_on_segment()]);

    assert_eq!(state.kind(), GameStateKind::OnSegment);
}

// ============================================================================
// ON ROUTE
// ============================================================================

#[test]
fn test_on_route_same_segment_stays_on_route_with_direction() {
    let state = ride(&[route_position_1(), route_position_1_point_2()]);

    assert_eq!(state.kind(), GameStateKind::OnRoute);
    assert_eq!(direction_of(&state), SegmentDirection::AtoB);
    assert_eq!(state.position(), Some(route_position_1_point_2()));
}

#[test]
fn test_on_route_entering_next_segment_advances_route() {
    let state = ride(&[route_position_1(), route_position_2()]);

    assert_eq!(state.kind(), GameStateKind::OnRoute);
    let route = state.route().unwrap();
    assert_eq!(route.current_segment_id(), Some("route-segment-2"));
    assert_eq!(route.next_segment_id(), Some("route-segment-3"));
    assert_eq!(route.turn_to_next_segment(), TurnDirection::Right);
}

#[test]
fn test_on_route_entering_other_segment_goes_off_route() {
    let state = ride(&[route_position_1(), position_4()]);

    assert_eq!(state.kind(), GameStateKind::OnSegment);
    assert_eq!(state.current_segment_id(), Some("segment-4"));
}

#[test]
fn test_on_route_without_segment_loses_route_lock() {
    let lost = ride(&[route_position_1(), position_off_segment()]);

    assert_eq!(lost.kind(), GameStateKind::LostRouteLock);
    assert!(lost.is_in_game());
    assert_eq!(
        lost.route().unwrap().current_segment_id(),
        Some("route-segment-1")
    );

    let regained = lost
        .update_position(route_position_1_point_2(), &segments(), &route())
        .unwrap();
    assert_eq!(regained.kind(), GameStateKind::OnRoute);
}

#[test]
fn test_lost_route_lock_regained_on_next_segment() {
    let lost = ride(&[route_position_1(), position_off_segment()]);

    let regained = lost
        .update_position(route_position_2(), &segments(), &route())
        .unwrap();

    assert_eq!(
        regained.route().unwrap().current_segment_id(),
        Some("route-segment-2")
    );
}

// ============================================================================
// ON SEGMENT
// ============================================================================

#[test]
fn test_on_segment_entering_next_route_segment_is_on_route() {
    let mut route = route();
    route.entered_segment("route-segment-1").unwrap();
    let state = on_segment("route-segment-1", route_position_1(), 0);

    let state = state
        .update_position(route_position_2(), &segments(), &route)
        .unwrap();

    assert_eq!(state.kind(), GameStateKind::OnRoute);
    assert_eq!(
        state.route().unwrap().current_segment_id(),
        Some("route-segment-2")
    );
}

#[test]
fn test_on_segment_back_on_current_route_segment_is_on_route() {
    let on_route = ride(&[route_position_1(), route_position_2()]);
    let route = on_route.route().cloned().unwrap();
    let off = on_route
        .update_position(position_on_segment(), &segments(), &route)
        .unwrap();
    assert_eq!(off.kind(), GameStateKind::OnSegment);

    let back = off
        .update_position(route_position_2(), &segments(), &route)
        .unwrap();

    assert_eq!(back.kind(), GameStateKind::OnRoute);
    assert_eq!(back.current_segment_id(), Some("route-segment-2"));
}

#[test]
fn test_direction_follows_point_index() {
    let segments = segments();
    let route = route();
    let state = on_segment("segment-1", position_on_segment(), 0);

    let forward = state
        .update_position(TrackPoint::new(3.0, 2.0, 3.0), &segments, &route)
        .unwrap();
    assert_eq!(direction_of(&forward), SegmentDirection::AtoB);

    let unchanged = forward
        .update_position(TrackPoint::new(3.0, 2.0, 3.0), &segments, &route)
        .unwrap();
    assert_eq!(direction_of(&unchanged), SegmentDirection::AtoB);

    let backward = unchanged
        .update_position(position_on_segment(), &segments, &route)
        .unwrap();
    assert_eq!(direction_of(&backward), SegmentDirection::BtoA);
}

#[test]
fn test_new_segment_starts_with_unknown_direction() {
    let state = ride(&[position_on_segment(), position_4()]);

    assert_eq!(direction_of(&state), SegmentDirection::Unknown);
}

// ============================================================================
// TURNS
// ============================================================================

#[test]
fn test_single_turn_option_stays_on_route() {
    let state = ride(&[route_position_1()]).turn_command_available("turnleft");

    assert_eq!(state.kind(), GameStateKind::OnRoute);
}

#[test]
fn test_two_turn_options_make_upcoming_turn() {
    let state = ride(&[route_position_1()])
        .turn_command_available("turnleft")
        .turn_command_available("TurnRight");

    match state {
        GameState::UpcomingTurn { directions, .. } => {
            assert_eq!(directions, vec![TurnDirection::Left, TurnDirection::Right]);
        }
        other => panic!("expected UpcomingTurn, got {other:?}"),
    }
}

#[test]
fn test_separator_does_not_change_state() {
    let state = ride(&[route_position_1()]).turn_command_available("turnleft");

    assert_eq!(state.turn_command_available("somethingempty"), state);
}

#[test]
fn test_upcoming_turn_moving_on_same_segment_keeps_options() {
    let state = ride(&[route_position_1()])
        .turn_command_available("turnleft")
        .turn_command_available("turnright");

    let state = state
        .update_position(route_position_1_point_2(), &segments(), &route())
        .unwrap();

    assert_eq!(state.kind(), GameStateKind::UpcomingTurn);
    assert_eq!(state.position(), Some(route_position_1_point_2()));
}

#[test]
fn test_upcoming_turn_taking_the_turn_clears_options() {
    let state = ride(&[route_position_1()])
        .turn_command_available("turnleft")
        .turn_command_available("turnright");

    let state = state
        .update_position(route_position_2(), &segments(), &route())
        .unwrap();

    match state {
        GameState::OnRoute {
            available_turns, ..
        } => assert!(available_turns.is_empty()),
        other => panic!("expected OnRoute, got {other:?}"),
    }
}

// ============================================================================
// LAST SEGMENT & COMPLETION
// ============================================================================

#[test]
fn test_last_segment_moving_within_stays_on_route() {
    let state = on_last_segment()
        .update_position(route_position_3_point_2(), &segments(), &route())
        .unwrap();

    assert_eq!(state.kind(), GameStateKind::OnRoute);
}

#[test]
fn test_last_segment_to_non_adjacent_segment_is_on_segment() {
    let state = on_last_segment()
        .update_position(position_on_segment(), &segments(), &route())
        .unwrap();

    assert_eq!(state.kind(), GameStateKind::OnSegment);
}

#[test]
fn test_re_entering_last_segment_stays_on_segment() {
    let last = on_last_segment();
    let route = last.route().cloned().unwrap();
    let off = last
        .update_position(position_on_segment(), &segments(), &route)
        .unwrap();

    let state = off
        .update_position(route_position_3(), &segments(), &route)
        .unwrap();

    assert_eq!(state.kind(), GameStateKind::OnSegment);
}

#[test]
fn test_last_segment_to_adjacent_segment_completes_route() {
    let state = on_last_segment()
        .update_position(position_4(), &segments(), &route())
        .unwrap();

    assert_eq!(state.kind(), GameStateKind::CompletedRoute);
    assert!(state.route().unwrap().has_completed());
}

#[test]
fn test_completed_route_tracks_position_only() {
    let completed = on_last_segment()
        .update_position(position_4(), &segments(), &route())
        .unwrap();

    let moved = completed
        .update_position(route_position_1(), &segments(), &route())
        .unwrap();

    assert_eq!(moved.kind(), GameStateKind::CompletedRoute);
    assert_eq!(moved.position(), Some(route_position_1()));
    assert_eq!(moved.turn_command_available("turnleft"), moved);
    assert_eq!(
        moved.enter_game(RIDER, ACTIVITY),
        Err(TransitionError::AlreadyInGame {
            state: GameStateKind::CompletedRoute
        })
    );
    assert_eq!(moved.leave_game(), GameState::ConnectedToZwift);
}
