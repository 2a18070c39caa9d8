use crate::api::{PredictionAttributes, Resource};
use crate::entity::parse_api_time;
use crate::store::EntityStore;
use ahash::AHashSet;
use chrono::{DateTime, FixedOffset};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub id: String,
    pub trip_id: String,
    pub route_id: Option<String>,
    pub stop_id: String,
    pub direction_id: Option<u8>,
    pub arrival_time: Option<DateTime<FixedOffset>>,
    pub departure_time: Option<DateTime<FixedOffset>>,
    pub stop_sequence: Option<u32>,
}

impl Prediction {
    /// Rows without a trip or a stop are of no use to anything downstream.
    pub fn from_resource(resource: &Resource<PredictionAttributes>) -> Option<Self> {
        let attributes = &resource.attributes;
        Some(Self {
            id: resource.id.clone(),
            trip_id: resource.related_id("trip")?.to_string(),
            route_id: resource.related_id("route").map(String::from),
            stop_id: resource.related_id("stop")?.to_string(),
            direction_id: attributes.direction_id,
            arrival_time: parse_api_time(attributes.arrival_time.as_deref()),
            departure_time: parse_api_time(attributes.departure_time.as_deref()),
            stop_sequence: attributes.stop_sequence,
        })
    }

    /// Arrival time, or departure time at the first stop of a trip.
    pub fn time(&self) -> Option<DateTime<FixedOffset>> {
        self.arrival_time.or(self.departure_time)
    }
}

/// Queue of vehicles waiting for predictions, drained in bounded batches.
#[derive(Debug)]
pub struct PredictionBatcher {
    queue: VecDeque<String>,
    queued: AHashSet<String>,
    max_trip_ids: usize,
}

impl PredictionBatcher {
    pub fn new(max_trip_ids: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            queued: AHashSet::new(),
            max_trip_ids: max_trip_ids.max(1),
        }
    }

    /// Queues a vehicle, once, until the next drain.
    pub fn enqueue(&mut self, vehicle_id: &str) {
        if self.queued.insert(vehicle_id.to_string()) {
            self.queue.push_back(vehicle_id.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Drains the queue into batches of trip ids. Vehicles that are gone or
    /// have no trip are dropped; they come back when a refresh re-queues them.
    pub fn take_batches(&mut self, store: &EntityStore) -> Vec<Vec<String>> {
        self.queued.clear();

        let mut seen = AHashSet::new();
        let trip_ids: Vec<String> = self
            .queue
            .drain(..)
            .filter_map(|vehicle_id| store.vehicle(&vehicle_id)?.trip_id.clone())
            .filter(|trip_id| seen.insert(trip_id.clone()))
            .collect();

        trip_ids
            .chunks(self.max_trip_ids)
            .map(|chunk| chunk.to_vec())
            .collect()
    }
}

/// Splits a prediction response by trip id, keeping response order.
pub fn group_by_trip(predictions: Vec<Prediction>) -> Vec<(String, Vec<Prediction>)> {
    let mut groups: Vec<(String, Vec<Prediction>)> = Vec::new();

    for prediction in predictions {
        match groups
            .iter_mut()
            .find(|(trip_id, _)| *trip_id == prediction.trip_id)
        {
            Some((_, group)) => group.push(prediction),
            None => groups.push((prediction.trip_id.clone(), vec![prediction])),
        }
    }

    groups
}

/// First timed prediction of every route, in response order.
pub fn first_per_route(predictions: &[Prediction]) -> Vec<&Prediction> {
    let mut seen = AHashSet::new();
    predictions
        .iter()
        .filter(|prediction| prediction.time().is_some())
        .filter(|prediction| seen.insert(prediction.route_id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityData, Vehicle};
    use crate::geometry::LatLng;

    fn prediction(trip_id: &str, route_id: &str, stop_id: &str) -> Prediction {
        Prediction {
            id: format!("prediction-{}-{}", trip_id, stop_id),
            trip_id: trip_id.to_string(),
            route_id: Some(route_id.to_string()),
            stop_id: stop_id.to_string(),
            direction_id: Some(0),
            arrival_time: None,
            departure_time: None,
            stop_sequence: None,
        }
    }

    fn store_with_vehicles(count: usize) -> EntityStore {
        let mut store = EntityStore::default();
        for i in 0..count {
            store.put(Entity::new(
                format!("v{}", i),
                EntityData::Vehicle(Vehicle {
                    route_id: String::from("Red"),
                    trip_id: Some(format!("t{}", i)),
                    label: None,
                    position: LatLng::new(42.35, -71.06),
                    bearing: 0.0,
                    direction_id: None,
                    current_status: None,
                    updated_at: None,
                    predictions: None,
                }),
            ));
        }
        store
    }

    #[test]
    fn test_batches_are_bounded() {
        let store = store_with_vehicles(23);
        let mut batcher = PredictionBatcher::new(10);

        for i in 0..23 {
            batcher.enqueue(&format!("v{}", i));
        }
        batcher.enqueue("v0");
        batcher.enqueue("missing");
        assert_eq!(batcher.len(), 24);

        let batches = batcher.take_batches(&store);
        assert_eq!(
            batches.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![10, 10, 3]
        );
        assert!(batcher.is_empty());
        assert!(batcher.take_batches(&store).is_empty());
    }

    #[test]
    fn test_group_by_trip_keeps_order() {
        let groups = group_by_trip(vec![
            prediction("t1", "Red", "a"),
            prediction("t2", "Red", "a"),
            prediction("t1", "Red", "b"),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "t1");
        assert_eq!(
            groups[0].1.iter().map(|p| p.stop_id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_first_per_route() {
        let departure = chrono::DateTime::parse_from_rfc3339("2018-07-29T10:56:28-04:00").ok();
        let timed = |trip_id: &str, route_id: &str| Prediction {
            departure_time: departure,
            ..prediction(trip_id, route_id, "a")
        };

        let rows = vec![
            prediction("t0", "Red", "a"),
            timed("t1", "Red"),
            timed("t2", "Red"),
            timed("t3", "Orange"),
        ];
        let firsts = first_per_route(&rows);
        assert_eq!(firsts.len(), 2);
        assert_eq!(firsts[0].trip_id, "t1");
        assert_eq!(firsts[1].trip_id, "t3");
    }
}
