//! # Route Store
//!
//! A route plan is a single TOML file holding the route and the segments it
//! rides:
//!
//! ```toml
//! name = "Figure eight"
//! zwift_route_name = "Volcano Flat"
//! sport = "cycling"
//! loop_from = "seg-2"            # optional
//!
//! [world]
//! id = "watopia"
//! name = "Watopia"
//!
//! [[sequence]]
//! segment_id = "seg-1"
//! turn = "left"                  # turn onto the next entry
//! direction = "a_to_b"
//!
//! [[sequence]]
//! segment_id = "seg-2"
//!
//! [[segments]]
//! id = "seg-1"
//! points = [[-11.63, 166.95, 12.0], [-11.631, 166.951, 12.4]]
//! next_from_b = [{ turn = "left", segment_id = "seg-2" }]
//! ```
//!
//! Each entry's `next_segment_id` is the following entry. The segment
//! graph is validated on load.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};
use turnpilot_core::{
    validate_segments, PlannedRoute, Segment, SegmentDirection, SegmentSequence,
    SegmentSequenceType, SportType, TrackPoint, TurnDirection, World,
};

use crate::error::{StoreError, StoreResult};

/// Source of the route to ride and the segments it runs over.
pub trait RouteStore {
    /// The planned route, not started.
    ///
    /// # Errors
    ///
    /// Whatever kept the route from loading.
    fn load_route(&self) -> StoreResult<PlannedRoute>;

    /// The segments the route runs over.
    ///
    /// # Errors
    ///
    /// Whatever kept the segments from loading.
    fn load_segments(&self) -> StoreResult<Vec<Segment>>;
}

// ============================================================================
// FILE FORMAT
// ============================================================================

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TurnEntry {
    #[default]
    None,
    Left,
    GoStraight,
    Right,
}

impl From<TurnEntry> for TurnDirection {
    fn from(turn: TurnEntry) -> Self {
        match turn {
            TurnEntry::None => Self::None,
            TurnEntry::Left => Self::Left,
            TurnEntry::GoStraight => Self::GoStraight,
            TurnEntry::Right => Self::Right,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
enum DirectionEntry {
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "a_to_b")]
    AtoB,
    #[serde(rename = "b_to_a")]
    BtoA,
}

impl From<DirectionEntry> for SegmentDirection {
    fn from(direction: DirectionEntry) -> Self {
        match direction {
            DirectionEntry::Unknown => Self::Unknown,
            DirectionEntry::AtoB => Self::AtoB,
            DirectionEntry::BtoA => Self::BtoA,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SportEntry {
    #[default]
    Unknown,
    Cycling,
    Running,
}

impl From<SportEntry> for SportType {
    fn from(sport: SportEntry) -> Self {
        match sport {
            SportEntry::Unknown => Self::Unknown,
            SportEntry::Cycling => Self::Cycling,
            SportEntry::Running => Self::Running,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
struct WorldEntry {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Clone, Debug, Deserialize)]
struct SequenceEntry {
    segment_id: String,
    #[serde(default)]
    turn: TurnEntry,
    #[serde(default)]
    direction: DirectionEntry,
}

#[derive(Clone, Debug, Deserialize)]
struct TurnLink {
    turn: TurnEntry,
    segment_id: String,
}

#[derive(Clone, Debug, Deserialize)]
struct SegmentEntry {
    id: String,
    points: Vec<[f64; 3]>,
    #[serde(default)]
    next_from_a: Vec<TurnLink>,
    #[serde(default)]
    next_from_b: Vec<TurnLink>,
}

#[derive(Clone, Debug, Deserialize)]
struct PlanFile {
    name: String,
    #[serde(default)]
    zwift_route_name: String,
    #[serde(default)]
    sport: SportEntry,
    world: Option<WorldEntry>,
    loop_from: Option<String>,
    #[serde(default)]
    sequence: Vec<SequenceEntry>,
    #[serde(default)]
    segments: Vec<SegmentEntry>,
}

impl PlanFile {
    fn route(&self) -> PlannedRoute {
        let loop_start = self
            .loop_from
            .as_deref()
            .and_then(|id| self.sequence.iter().position(|entry| entry.segment_id == id));

        let mut entries: Vec<SegmentSequence> = Vec::with_capacity(self.sequence.len());
        for (index, entry) in self.sequence.iter().enumerate() {
            let next = self.sequence.get(index + 1);
            let mut turn = TurnDirection::from(entry.turn);
            if next.is_none() && turn != TurnDirection::None {
                warn!("Ignoring turn {} after the last segment {}", turn, entry.segment_id);
                turn = TurnDirection::None;
            }

            entries.push(SegmentSequence {
                segment_id: entry.segment_id.clone(),
                turn_to_next_segment: turn,
                next_segment_id: next.map(|next| next.segment_id.clone()),
                direction: entry.direction.into(),
                kind: match loop_start {
                    Some(start) if index < start => SegmentSequenceType::LeadIn,
                    Some(_) => SegmentSequenceType::Loop,
                    None => SegmentSequenceType::Regular,
                },
            });
        }

        let mut route = PlannedRoute::new(self.name.clone(), entries);
        route.zwift_route_name = self.zwift_route_name.clone();
        route.sport = self.sport.into();
        route.world = self.world.as_ref().map(|world| World {
            id: world.id.clone(),
            name: world.name.clone(),
        });
        route
    }

    fn segments(&self) -> Vec<Segment> {
        self.segments
            .iter()
            .map(|entry| {
                let points = entry
                    .points
                    .iter()
                    .map(|[latitude, longitude, altitude]| {
                        TrackPoint::new(*latitude, *longitude, *altitude)
                    })
                    .collect();

                let segment = entry
                    .next_from_a
                    .iter()
                    .fold(Segment::new(entry.id.clone(), points), |segment, link| {
                        segment.with_next_from_a(link.turn.into(), &link.segment_id)
                    });
                entry.next_from_b.iter().fold(segment, |segment, link| {
                    segment.with_next_from_b(link.turn.into(), &link.segment_id)
                })
            })
            .collect()
    }
}

// ============================================================================
// TOML STORE
// ============================================================================

/// Route plan loaded from a TOML file.
#[derive(Clone, Debug)]
pub struct TomlRouteStore {
    path: PathBuf,
    route: PlannedRoute,
    segments: Vec<Segment>,
}

impl TomlRouteStore {
    /// Reads, parses and validates a plan file.
    ///
    /// # Errors
    ///
    /// [`StoreError::Read`] or any error from [`TomlRouteStore::from_toml_str`].
    pub fn open(path: &Path) -> StoreResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&text, path)
    }

    /// Parses and validates plan text. `path` is only used in errors.
    ///
    /// # Errors
    ///
    /// [`StoreError::Parse`] for malformed TOML, [`StoreError::EmptyRoute`]
    /// without sequence entries, [`StoreError::Segments`] for dangling
    /// adjacency and [`StoreError::UnknownRouteSegment`] when the route
    /// rides a segment that is not defined.
    pub fn from_toml_str(text: &str, path: &Path) -> StoreResult<Self> {
        let plan: PlanFile = toml::from_str(text).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if plan.sequence.is_empty() {
            return Err(StoreError::EmptyRoute {
                path: path.to_path_buf(),
            });
        }

        let segments = plan.segments();
        validate_segments(&segments)?;

        if let Some(missing) = plan
            .sequence
            .iter()
            .find(|entry| !segments.iter().any(|segment| segment.id() == entry.segment_id))
        {
            return Err(StoreError::UnknownRouteSegment {
                segment_id: missing.segment_id.clone(),
            });
        }

        let route = plan.route();
        info!(
            "Loaded route '{}' with {} entries over {} segments",
            route.name,
            route.route_segment_sequence.len(),
            segments.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            route,
            segments,
        })
    }

    /// File the plan came from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RouteStore for TomlRouteStore {
    fn load_route(&self) -> StoreResult<PlannedRoute> {
        Ok(self.route.clone())
    }

    fn load_segments(&self) -> StoreResult<Vec<Segment>> {
        Ok(self.segments.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnpilot_core::SegmentError;

    const FIGURE_EIGHT: &str = r#"
        name = "Figure eight"
        zwift_route_name = "Volcano Flat"
        sport = "cycling"
        loop_from = "seg-2"

        [world]
        id = "watopia"
        name = "Watopia"

        [[sequence]]
        segment_id = "seg-1"
        turn = "left"
        direction = "a_to_b"

        [[sequence]]
        segment_id = "seg-2"
        turn = "go_straight"

        [[sequence]]
        segment_id = "seg-3"
        turn = "right"

        [[segments]]
        id = "seg-1"
        points = [[1.0, 1.0, 0.0], [1.0, 1.0001, 0.0]]
        next_from_b = [{ turn = "left", segment_id = "seg-2" }]

        [[segments]]
        id = "seg-2"
        points = [[2.0, 2.0, 0.0]]
        next_from_b = [{ turn = "go_straight", segment_id = "seg-3" }]

        [[segments]]
        id = "seg-3"
        points = [[3.0, 3.0, 0.0]]
        next_from_a = [{ turn = "right", segment_id = "seg-2" }]
    "#;

    fn plan_path() -> &'static Path {
        Path::new("figure-eight.toml")
    }

    #[test]
    fn test_route_is_linked() {
        let store = TomlRouteStore::from_toml_str(FIGURE_EIGHT, plan_path()).unwrap();
        let route = store.load_route().unwrap();

        assert_eq!(route.name, "Figure eight");
        assert_eq!(route.zwift_route_name, "Volcano Flat");
        assert_eq!(route.sport, SportType::Cycling);
        assert_eq!(route.world.as_ref().map(|w| w.id.as_str()), Some("watopia"));
        assert_eq!(route.starting_segment_id(), Some("seg-1"));

        let sequence = &route.route_segment_sequence;
        assert_eq!(sequence[0].next_segment_id.as_deref(), Some("seg-2"));
        assert_eq!(sequence[0].turn_to_next_segment, TurnDirection::Left);
        assert_eq!(sequence[0].direction, SegmentDirection::AtoB);
        assert_eq!(sequence[1].turn_to_next_segment, TurnDirection::GoStraight);
        assert_eq!(sequence[2].next_segment_id, None);
    }

    #[test]
    fn test_turn_after_last_entry_is_dropped() {
        let store = TomlRouteStore::from_toml_str(FIGURE_EIGHT, plan_path()).unwrap();
        let route = store.load_route().unwrap();

        assert_eq!(route.route_segment_sequence[2].turn_to_next_segment, TurnDirection::None);
    }

    #[test]
    fn test_loop_from_marks_lead_in_and_loop() {
        let route = TomlRouteStore::from_toml_str(FIGURE_EIGHT, plan_path())
            .unwrap()
            .load_route()
            .unwrap();

        let kinds: Vec<SegmentSequenceType> = route
            .route_segment_sequence
            .iter()
            .map(|entry| entry.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                SegmentSequenceType::LeadIn,
                SegmentSequenceType::Loop,
                SegmentSequenceType::Loop
            ]
        );
        assert!(route.is_loop());
    }

    #[test]
    fn test_segments_are_built() {
        let segments = TomlRouteStore::from_toml_str(FIGURE_EIGHT, plan_path())
            .unwrap()
            .load_segments()
            .unwrap();

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].points().len(), 2);
        assert_eq!(segments[0].points()[1].index(), Some(1));
        assert!(segments[0].is_adjacent_to("seg-2"));
        assert!(segments[2].is_adjacent_to("seg-2"));
    }

    #[test]
    fn test_dangling_adjacency_is_rejected() {
        let text = FIGURE_EIGHT.replace(
            r#"next_from_b = [{ turn = "go_straight", segment_id = "seg-3" }]"#,
            r#"next_from_b = [{ turn = "go_straight", segment_id = "seg-99" }]"#,
        );

        let result = TomlRouteStore::from_toml_str(&text, plan_path());

        assert!(matches!(
            result,
            Err(StoreError::Segments(SegmentError::UnknownAdjacentSegment { .. }))
        ));
    }

    #[test]
    fn test_route_over_unknown_segment_is_rejected() {
        let text = r#"
            name = "Detour"

            [[sequence]]
            segment_id = "seg-1"
            turn = "left"

            [[sequence]]
            segment_id = "seg-7"

            [[segments]]
            id = "seg-1"
            points = [[1.0, 1.0, 0.0]]
        "#;

        let result = TomlRouteStore::from_toml_str(text, plan_path());

        assert!(matches!(
            result,
            Err(StoreError::UnknownRouteSegment { segment_id }) if segment_id == "seg-7"
        ));
    }

    #[test]
    fn test_empty_route_is_rejected() {
        let result = TomlRouteStore::from_toml_str("name = \"Nothing\"\n", plan_path());

        assert!(matches!(result, Err(StoreError::EmptyRoute { .. })));
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let result = TomlRouteStore::from_toml_str("name = ", plan_path());

        assert!(matches!(result, Err(StoreError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = TomlRouteStore::open(Path::new("/nonexistent/plan.toml"));

        assert!(matches!(result, Err(StoreError::Read { .. })));
    }
}
