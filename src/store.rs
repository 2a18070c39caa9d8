use crate::entity::{Entity, EntityData, EntityKind, Route, Stop, Trip, Vehicle};
use crate::geometry::PlanarProjection;
use crate::render::RenderHandle;
use crate::shape::Shape;
use ahash::{AHashMap, AHashSet};
use geo::Coord;

/// The five keyed entity collections of one map session.
///
/// Entities are never removed. Writing an entity that is already resident
/// replaces its data and keeps its identity (visibility, mark and render
/// handle).
#[derive(Debug, Default)]
pub struct EntityStore {
    routes: AHashMap<String, Entity>,
    shapes: AHashMap<String, Entity>,
    stops: AHashMap<String, Entity>,
    trips: AHashMap<String, Entity>,
    vehicles: AHashMap<String, Entity>,
    projection: PlanarProjection,
    //route ids whose shapes have been fetched
    routes_with_shapes: AHashSet<String>,
    next_render_handle: u64,
    new_renderables: Vec<(EntityKind, String)>,
}

impl EntityStore {
    pub fn new(projection: PlanarProjection) -> Self {
        Self {
            projection,
            ..Default::default()
        }
    }

    pub fn projection(&self) -> &PlanarProjection {
        &self.projection
    }

    fn collection(&self, kind: EntityKind) -> &AHashMap<String, Entity> {
        match kind {
            EntityKind::Route => &self.routes,
            EntityKind::Shape => &self.shapes,
            EntityKind::Stop => &self.stops,
            EntityKind::Trip => &self.trips,
            EntityKind::Vehicle => &self.vehicles,
        }
    }

    fn collection_mut(&mut self, kind: EntityKind) -> &mut AHashMap<String, Entity> {
        match kind {
            EntityKind::Route => &mut self.routes,
            EntityKind::Shape => &mut self.shapes,
            EntityKind::Stop => &mut self.stops,
            EntityKind::Trip => &mut self.trips,
            EntityKind::Vehicle => &mut self.vehicles,
        }
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> Option<&Entity> {
        self.collection(kind).get(id)
    }

    pub fn get_mut(&mut self, kind: EntityKind, id: &str) -> Option<&mut Entity> {
        self.collection_mut(kind).get_mut(id)
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.collection(kind).contains_key(id)
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.collection(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        EntityKind::ALL.iter().all(|kind| self.collection(*kind).is_empty())
    }

    /// Inserts `entity` if its id is absent from its kind's collection,
    /// otherwise replaces the resident entity's data. Returns true on insert.
    pub fn put(&mut self, entity: Entity) -> bool {
        let kind = entity.kind();

        if let Some(resident) = self.collection_mut(kind).get_mut(&entity.id) {
            resident.data = entity.data;
            return false;
        }

        let mut entity = entity;
        if kind.is_renderable() && entity.render_handle.is_none() {
            self.next_render_handle += 1;
            entity.render_handle = Some(RenderHandle(self.next_render_handle));
            self.new_renderables.push((kind, entity.id.clone()));
        }

        self.collection_mut(kind).insert(entity.id.clone(), entity);
        true
    }

    /// Replaces a vehicle's reported attributes, keeping any predictions
    /// already attached to it. Returns the previous trip id when the vehicle
    /// was already resident.
    pub fn update_vehicle(&mut self, id: &str, mut vehicle: Vehicle) -> Option<Option<String>> {
        match self.vehicles.get_mut(id) {
            Some(entity) => {
                let previous = match &mut entity.data {
                    EntityData::Vehicle(old) => {
                        vehicle.predictions = old.predictions.take();
                        old.trip_id.clone()
                    }
                    _ => None,
                };
                entity.data = EntityData::Vehicle(vehicle);
                Some(previous)
            }
            None => {
                self.put(Entity::new(id, EntityData::Vehicle(vehicle)));
                None
            }
        }
    }

    pub fn for_each(&self, kind: EntityKind, mut f: impl FnMut(&Entity)) {
        self.collection(kind).values().for_each(|entity| f(entity));
    }

    pub fn for_each_mut(&mut self, kind: EntityKind, mut f: impl FnMut(&mut Entity)) {
        self.collection_mut(kind)
            .values_mut()
            .for_each(|entity| f(entity));
    }

    pub fn ids(&self, kind: EntityKind) -> Vec<String> {
        self.collection(kind).keys().cloned().collect()
    }

    /// Entities inserted since the last call that have something to draw.
    pub fn take_new_renderables(&mut self) -> Vec<(EntityKind, String)> {
        std::mem::take(&mut self.new_renderables)
    }

    pub fn route(&self, id: &str) -> Option<&Route> {
        self.routes.get(id).and_then(Entity::as_route)
    }

    pub fn shape(&self, id: &str) -> Option<&Shape> {
        self.shapes.get(id).and_then(Entity::as_shape)
    }

    pub fn stop(&self, id: &str) -> Option<&Stop> {
        self.stops.get(id).and_then(Entity::as_stop)
    }

    pub fn trip(&self, id: &str) -> Option<&Trip> {
        self.trips.get(id).and_then(Entity::as_trip)
    }

    pub fn vehicle(&self, id: &str) -> Option<&Vehicle> {
        self.vehicles.get(id).and_then(Entity::as_vehicle)
    }

    pub fn vehicle_mut(&mut self, id: &str) -> Option<&mut Vehicle> {
        match &mut self.vehicles.get_mut(id)?.data {
            EntityData::Vehicle(vehicle) => Some(vehicle),
            _ => None,
        }
    }

    pub fn has_shapes_for_route(&self, route_id: &str) -> bool {
        self.routes_with_shapes.contains(route_id)
    }

    pub fn set_shapes_loaded_for_route(&mut self, route_id: &str) {
        self.routes_with_shapes.insert(route_id.to_string());
    }

    /// Recomputes a shape's stop anchors against the stops currently resident.
    pub fn update_shape_anchors(&mut self, shape_id: &str) {
        let stops = &self.stops;
        let stop_position = |stop_id: &str| -> Option<Coord<f64>> {
            stops
                .get(stop_id)
                .and_then(Entity::as_stop)
                .map(|stop| stop.planar)
        };

        if let Some(EntityData::Shape(shape)) =
            self.shapes.get_mut(shape_id).map(|entity| &mut entity.data)
        {
            shape.stops_updated(stop_position);
        }
    }
}
