//! Interpolates a vehicle's position along its trip's shape between its last
//! report and its next predicted stop.

use crate::entity::Vehicle;
use crate::geometry::{self, LatLng, MIN_SEGMENT_LENGTH};
use crate::shape::Shape;
use crate::store::EntityStore;
use chrono::{DateTime, TimeDelta, Utc};
use geo::Coord;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    pub enabled: bool,
    /// Minimum age of a report, and minimum time to the predicted stop,
    /// before estimating is worth it.
    pub tolerance: TimeDelta,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            tolerance: TimeDelta::seconds(10),
        }
    }
}

/// Estimated position of `vehicle` at `now`, or `None` whenever a toggle,
/// a prediction, a trip, a shape or an anchor needed for it is missing.
pub fn estimate(
    store: &EntityStore,
    vehicle: &Vehicle,
    settings: &EstimatorSettings,
    now: DateTime<Utc>,
) -> Option<LatLng> {
    if !settings.enabled {
        return None;
    }

    let predictions = vehicle.predictions.as_deref()?;
    let first = predictions.first()?;
    let reported_at = vehicle.updated_at?;

    if now.signed_duration_since(reported_at) < settings.tolerance {
        return None;
    }

    let next = predictions
        .iter()
        .find(|prediction| prediction.time().is_some_and(|time| time > now))
        .unwrap_or(first);
    let predicted_at = next.time()?;

    let travel = predicted_at.signed_duration_since(reported_at);
    if travel < settings.tolerance {
        return None;
    }

    let trip = store.trip(vehicle.trip_id.as_deref()?)?;
    let shape = store.shape(trip.shape_id.as_deref()?)?;
    let anchors = shape.anchors()?;

    let target = anchor_for_stop(store, shape, &next.stop_id)?;
    let window_start = anchors.previous_anchor(
        anchor_for_stop(store, shape, &first.stop_id)
            .unwrap_or(target)
            .min(target),
    );

    let reported = store.projection().project(vehicle.position);
    let (segment, fraction) = closest_segment(
        &shape.planar,
        &anchors.segment_lengths,
        window_start,
        target,
        reported,
    )?;

    let remaining_at_report = anchors.segment_lengths[segment] * (1.0 - fraction)
        + anchors.segment_lengths[segment + 1..target]
            .iter()
            .sum::<f64>();

    let remaining_time = predicted_at.signed_duration_since(now);
    let remaining_fraction = (remaining_time.num_milliseconds() as f64
        / travel.num_milliseconds() as f64)
        .clamp(0.0, 1.0);

    let point = walk_back(
        &shape.planar,
        &anchors.segment_lengths,
        target,
        remaining_at_report * remaining_fraction,
    );

    Some(store.projection().unproject(point))
}

/// The estimate when there is one, the last reported position otherwise.
pub fn position_or_reported(
    store: &EntityStore,
    vehicle: &Vehicle,
    settings: &EstimatorSettings,
    now: DateTime<Utc>,
) -> LatLng {
    estimate(store, vehicle, settings, now).unwrap_or(vehicle.position)
}

/// Vertex of a stop on a shape, trying the stop's parent station when the
/// stop itself is not anchored.
fn anchor_for_stop(store: &EntityStore, shape: &Shape, stop_id: &str) -> Option<usize> {
    shape.vertex_index_for_stop(stop_id).or_else(|| {
        let parent = store.stop(stop_id)?.parent_station_id.as_deref()?;
        shape.vertex_index_for_stop(parent)
    })
}

/// Segment in `start..end` closest to `point`, with the fraction along it.
fn closest_segment(
    planar: &[Coord<f64>],
    segment_lengths: &[f64],
    start: usize,
    end: usize,
    point: Coord<f64>,
) -> Option<(usize, f64)> {
    (start..end.min(segment_lengths.len()))
        .filter(|segment| segment_lengths[*segment] >= MIN_SEGMENT_LENGTH)
        .map(|segment| {
            (
                segment,
                geometry::project_onto_segment(point, planar[segment], planar[segment + 1]),
            )
        })
        .min_by(|(_, a), (_, b)| a.distance.total_cmp(&b.distance))
        .map(|(segment, projection)| (segment, projection.fraction))
}

fn walk_back(
    planar: &[Coord<f64>],
    segment_lengths: &[f64],
    from_vertex: usize,
    distance: f64,
) -> Coord<f64> {
    let mut remaining = distance;

    for segment in (0..from_vertex.min(segment_lengths.len())).rev() {
        let length = segment_lengths[segment];
        if remaining <= length {
            let fraction = match length < MIN_SEGMENT_LENGTH {
                true => 1.0,
                false => remaining / length,
            };
            return geometry::interpolate(planar[segment + 1], planar[segment], fraction);
        }
        remaining -= length;
    }

    planar.first().copied().unwrap_or_default()
}
