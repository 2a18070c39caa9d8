use crate::api::{
    ApiUrls, Document, Filter, PredictionAttributes, Resource, RouteAttributes, ShapeAttributes,
    StopAttributes, TripAttributes, VehicleAttributes,
};
use crate::entity::{Entity, EntityData, EntityKind, Route, RouteType, Stop, Trip, Vehicle};
use crate::error::FetchError;
use crate::predictions::Prediction;
use crate::shape::Shape;
use crate::store::EntityStore;
use crate::transport::Transport;
use async_recursion::async_recursion;
use futures::StreamExt;
use itertools::Itertools;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Most ids, or filter values, sent in one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub routes: usize,
    pub shapes: usize,
    pub shapes_by_route: usize,
    pub stops: usize,
    pub trips: usize,
    pub vehicles: usize,
    pub vehicles_by_route: usize,
    pub prediction_trips: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            routes: 5,
            shapes: 50,
            shapes_by_route: 5,
            stops: 50,
            trips: 50,
            vehicles: 50,
            vehicles_by_route: 5,
            prediction_trips: 10,
        }
    }
}

impl BatchLimits {
    /// Limit for id filtered requests of a kind.
    pub fn for_kind(&self, kind: EntityKind) -> usize {
        let limit = match kind {
            EntityKind::Route => self.routes,
            EntityKind::Shape => self.shapes,
            EntityKind::Stop => self.stops,
            EntityKind::Trip => self.trips,
            EntityKind::Vehicle => self.vehicles,
        };
        limit.max(1)
    }
}

enum Batch {
    Routes(Vec<Resource<RouteAttributes>>),
    Shapes(Vec<Resource<ShapeAttributes>>),
    Stops(Vec<Resource<StopAttributes>>),
    Trips(Vec<Resource<TripAttributes>>),
    Vehicles(Vec<Resource<VehicleAttributes>>),
}

/// What a set of batches brought into the store, and what it now depends on.
#[derive(Default)]
struct Merged {
    ids: Vec<String>,
    trip_ids: Vec<String>,
    shape_ids: Vec<String>,
    stop_ids: Vec<String>,
    //filter values of the batches that succeeded
    covered: Vec<String>,
    failures: Vec<FetchError>,
    batches: usize,
}

impl Merged {
    fn into_result(mut self, resource: &'static str) -> Result<(), FetchError> {
        if self.failures.is_empty() {
            return Ok(());
        }

        let failed = self.failures.len();
        Err(FetchError::BatchFailed {
            resource,
            failed,
            total: self.batches,
            first: Box::new(self.failures.swap_remove(0)),
        })
    }
}

/// Outcome of a vehicle refresh. Vehicles from batches that succeeded are
/// merged even when a sibling batch failed.
#[derive(Debug)]
pub struct VehicleRefresh {
    pub vehicle_ids: Vec<String>,
    pub failure: Option<FetchError>,
}

/// Resolves entity ids against the store, fetching only what is missing.
pub struct Fetcher<T> {
    transport: T,
    urls: ApiUrls,
    limits: BatchLimits,
}

impl<T: Transport + 'static> Fetcher<T> {
    pub fn new(transport: T, urls: ApiUrls, limits: BatchLimits) -> Self {
        Self {
            transport,
            urls,
            limits,
        }
    }

    pub fn limits(&self) -> &BatchLimits {
        &self.limits
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Makes sure every id in `ids` is resident, fetching the missing ones in
    /// bounded parallel batches, then the trips, shapes and stops they depend
    /// on. Returns the requested ids that are resident afterwards.
    ///
    /// A failed batch only loses its own ids; siblings are still merged and
    /// the error is returned once everything else is done.
    #[async_recursion(?Send)]
    pub async fn resolve(
        &self,
        store: &mut EntityStore,
        kind: EntityKind,
        ids: &[String],
    ) -> Result<Vec<String>, FetchError> {
        let requested: Vec<String> = ids.iter().unique().cloned().collect();

        let missing: Vec<String> = requested
            .iter()
            .filter(|id| !store.contains(kind, id))
            .cloned()
            .collect();

        let result = match missing.is_empty() {
            true => Ok(()),
            false => {
                debug!(
                    "fetching {} of {} requested {}",
                    missing.len(),
                    requested.len(),
                    kind
                );

                let merged = self
                    .fetch_batches(
                        store,
                        kind,
                        Filter::Id,
                        &missing,
                        self.limits.for_kind(kind),
                    )
                    .await;

                let trip_ids = merged.trip_ids.clone();
                let shape_ids = merged.shape_ids.clone();
                let stop_ids = merged.stop_ids.clone();
                let result = merged.into_result(kind.collection());

                self.resolve_dependents(store, trip_ids, shape_ids, stop_ids)
                    .await;

                result
            }
        };

        let result = match kind {
            EntityKind::Shape => result.and(self.anchor_shapes(store, &requested).await),
            _ => result,
        };

        result.map(|_| {
            requested
                .into_iter()
                .filter(|id| store.contains(kind, id))
                .collect()
        })
    }

    /// Fetches the shapes of routes whose shapes have never been loaded.
    pub async fn fetch_shapes_for_routes(
        &self,
        store: &mut EntityStore,
        route_ids: &[String],
    ) -> Result<(), FetchError> {
        let needed: Vec<String> = route_ids
            .iter()
            .unique()
            .filter(|route_id| !store.has_shapes_for_route(route_id))
            .cloned()
            .collect();

        if needed.is_empty() {
            return Ok(());
        }

        let merged = self
            .fetch_batches(
                store,
                EntityKind::Shape,
                Filter::Route,
                &needed,
                self.limits.shapes_by_route.max(1),
            )
            .await;

        for route_id in &merged.covered {
            store.set_shapes_loaded_for_route(route_id);
        }

        let shape_ids = merged.ids.clone();
        let result = merged.into_result("shapes");
        let anchored = self.anchor_shapes(store, &shape_ids).await;

        result.and(anchored)
    }

    /// Retries what routes whose shapes are already loaded still lack: the
    /// stops of their shapes and the shapes of their trips. Resident ids cost
    /// nothing, and shapes left incomplete by an earlier failure are anchored
    /// again once their stops arrive.
    pub async fn resolve_route_dependents(
        &self,
        store: &mut EntityStore,
        route_ids: &[String],
    ) -> Result<(), FetchError> {
        let mut trip_shape_ids = Vec::new();
        store.for_each(EntityKind::Trip, |entity| {
            if let Some(trip) = entity
                .as_trip()
                .filter(|trip| route_ids.contains(&trip.route_id))
            {
                trip_shape_ids.extend(trip.shape_id.iter().cloned());
            }
        });

        let mut route_shape_ids = Vec::new();
        store.for_each(EntityKind::Shape, |entity| {
            if entity
                .route_id()
                .is_some_and(|route_id| route_ids.iter().any(|id| id == route_id))
            {
                route_shape_ids.push(entity.id.clone());
            }
        });

        let missing_shapes: Vec<String> = trip_shape_ids
            .into_iter()
            .unique()
            .filter(|shape_id| !store.contains(EntityKind::Shape, shape_id))
            .collect();

        let resolved = match missing_shapes.is_empty() {
            true => Ok(()),
            false => {
                debug!("retrying {} trip shapes", missing_shapes.len());
                self.resolve(store, EntityKind::Shape, &missing_shapes)
                    .await
                    .map(|_| ())
            }
        };

        let anchored = self.anchor_shapes(store, &route_shape_ids).await;
        resolved.and(anchored)
    }

    /// Re-fetches every vehicle on the given routes and resolves any trip
    /// they reference that is not resident yet.
    pub async fn refresh_vehicles(
        &self,
        store: &mut EntityStore,
        route_ids: &[String],
    ) -> VehicleRefresh {
        let route_ids: Vec<String> = route_ids.iter().unique().cloned().collect();
        if route_ids.is_empty() {
            return VehicleRefresh {
                vehicle_ids: vec![],
                failure: None,
            };
        }

        let merged = self
            .fetch_batches(
                store,
                EntityKind::Vehicle,
                Filter::Route,
                &route_ids,
                self.limits.vehicles_by_route.max(1),
            )
            .await;

        let vehicle_ids = merged.ids.clone();
        let trip_ids = merged.trip_ids.clone();
        let failure = merged.into_result("vehicles").err();

        self.resolve_dependents(store, trip_ids, vec![], vec![])
            .await;

        VehicleRefresh {
            vehicle_ids,
            failure,
        }
    }

    /// Lists the ids of every route of the given types, merging the routes
    /// into the store on the way.
    pub async fn fetch_route_ids(
        &self,
        store: &mut EntityStore,
        route_types: &[RouteType],
    ) -> Result<Vec<String>, FetchError> {
        let values: Vec<String> = route_types
            .iter()
            .map(|route_type| u8::from(*route_type).to_string())
            .collect();

        let url = self.urls.collection("routes", Filter::RouteType, &values);
        let resources: Vec<Resource<RouteAttributes>> =
            self.fetch_resources("routes", &url, values.len()).await?;

        let mut merged = Merged::default();
        merge(store, Batch::Routes(resources), &mut merged);
        Ok(merged.ids)
    }

    pub async fn fetch_predictions_for_trips(
        &self,
        trip_ids: &[String],
    ) -> Result<Vec<Prediction>, FetchError> {
        self.fetch_predictions(Filter::Trip, trip_ids).await
    }

    pub async fn fetch_predictions_for_stop(
        &self,
        stop_id: &str,
    ) -> Result<Vec<Prediction>, FetchError> {
        self.fetch_predictions(Filter::Stop, &[stop_id]).await
    }

    async fn fetch_predictions<S: AsRef<str>>(
        &self,
        filter: Filter,
        values: &[S],
    ) -> Result<Vec<Prediction>, FetchError> {
        let url = self.urls.collection("predictions", filter, values);
        let resources: Vec<Resource<PredictionAttributes>> =
            self.fetch_resources("predictions", &url, values.len()).await?;

        Ok(resources
            .iter()
            .filter_map(|resource| {
                let prediction = Prediction::from_resource(resource);
                if prediction.is_none() {
                    warn!("prediction {} has no trip or stop, skipping", resource.id);
                }
                prediction
            })
            .collect())
    }

    /// Trips before shapes before stops, so each level's own dependents are
    /// picked up by its resolve.
    async fn resolve_dependents(
        &self,
        store: &mut EntityStore,
        trip_ids: Vec<String>,
        shape_ids: Vec<String>,
        stop_ids: Vec<String>,
    ) {
        for (kind, ids) in [
            (EntityKind::Trip, trip_ids),
            (EntityKind::Shape, shape_ids),
            (EntityKind::Stop, stop_ids),
        ] {
            if ids.is_empty() {
                continue;
            }

            if let Err(error) = self.resolve(store, kind, &ids).await {
                warn!("could not resolve {} dependent {}: {}", ids.len(), kind, error);
            }
        }
    }

    /// Anchors every listed shape without complete anchors, resolving its
    /// stops first. Shapes are anchored with whatever stops did arrive.
    async fn anchor_shapes(
        &self,
        store: &mut EntityStore,
        shape_ids: &[String],
    ) -> Result<(), FetchError> {
        let unanchored: Vec<String> = shape_ids
            .iter()
            .filter(|id| store.shape(id).is_some_and(Shape::needs_anchoring))
            .cloned()
            .collect();

        if unanchored.is_empty() {
            return Ok(());
        }

        let stop_ids: Vec<String> = unanchored
            .iter()
            .filter_map(|id| store.shape(id))
            .flat_map(|shape| shape.stop_ids.iter().cloned())
            .unique()
            .collect();

        let resolved = match stop_ids.is_empty() {
            true => Ok(()),
            false => self
                .resolve(store, EntityKind::Stop, &stop_ids)
                .await
                .map(|_| ()),
        };

        if let Err(error) = &resolved {
            warn!("stops of {} shapes are incomplete: {}", unanchored.len(), error);
        }

        for shape_id in &unanchored {
            store.update_shape_anchors(shape_id);
        }

        resolved
    }

    async fn fetch_batches(
        &self,
        store: &mut EntityStore,
        kind: EntityKind,
        filter: Filter,
        values: &[String],
        limit: usize,
    ) -> Merged {
        let chunks: Vec<&[String]> = values.chunks(limit).collect();
        let mut merged = Merged {
            batches: chunks.len(),
            ..Default::default()
        };

        if chunks.is_empty() {
            return merged;
        }

        let mut responses = futures::stream::iter(
            chunks
                .iter()
                .map(|chunk| async move { (*chunk, self.fetch_batch(kind, filter, chunk).await) }),
        )
        .buffer_unordered(merged.batches);

        //merges happen in arrival order
        while let Some((chunk, response)) = responses.next().await {
            match response {
                Ok(batch) => {
                    merged.covered.extend(chunk.iter().cloned());
                    merge(store, batch, &mut merged);
                }
                Err(error) => {
                    warn!(
                        "batch of {} {} failed, leaving them unresolved: {}",
                        chunk.len(),
                        kind,
                        error
                    );
                    merged.failures.push(error);
                }
            }
        }

        merged
    }

    async fn fetch_batch(
        &self,
        kind: EntityKind,
        filter: Filter,
        values: &[String],
    ) -> Result<Batch, FetchError> {
        let resource = kind.collection();
        let url = self.urls.collection(resource, filter, values);
        let count = values.len();

        Ok(match kind {
            EntityKind::Route => Batch::Routes(self.fetch_resources(resource, &url, count).await?),
            EntityKind::Shape => Batch::Shapes(self.fetch_resources(resource, &url, count).await?),
            EntityKind::Stop => Batch::Stops(self.fetch_resources(resource, &url, count).await?),
            EntityKind::Trip => Batch::Trips(self.fetch_resources(resource, &url, count).await?),
            EntityKind::Vehicle => {
                Batch::Vehicles(self.fetch_resources(resource, &url, count).await?)
            }
        })
    }

    async fn fetch_resources<A: DeserializeOwned>(
        &self,
        resource: &'static str,
        url: &str,
        count: usize,
    ) -> Result<Vec<Resource<A>>, FetchError> {
        let value = self
            .transport
            .fetch_json(url)
            .await
            .map_err(|source| FetchError::Transport {
                resource,
                count,
                source,
            })?;

        let document: Document<A> = serde_json::from_value(value)
            .map_err(|source| FetchError::Document { resource, source })?;

        let mut resources = document.data.into_vec();
        resources.extend(document.included);
        Ok(resources)
    }
}

fn merge(store: &mut EntityStore, batch: Batch, merged: &mut Merged) {
    match batch {
        Batch::Routes(resources) => {
            for resource in resources {
                store.put(Entity::new(
                    resource.id.clone(),
                    EntityData::Route(Route::from_resource(&resource)),
                ));
                merged.ids.push(resource.id);
            }
        }
        Batch::Shapes(resources) => {
            for resource in resources {
                let shape = match Shape::from_resource(&resource, store.projection()) {
                    Ok(shape) => shape,
                    Err(error) => {
                        warn!("{}", error);
                        continue;
                    }
                };

                merged.stop_ids.extend(shape.stop_ids.iter().cloned());
                store.put(Entity::new(resource.id.clone(), EntityData::Shape(shape)));
                merged.ids.push(resource.id);
            }
        }
        Batch::Stops(resources) => {
            for resource in resources {
                let stop = Stop::from_resource(&resource, store.projection());
                merged.stop_ids.extend(stop.child_stop_ids.iter().cloned());
                store.put(Entity::new(resource.id.clone(), EntityData::Stop(stop)));
                merged.ids.push(resource.id);
            }
        }
        Batch::Trips(resources) => {
            for resource in resources {
                let Some(trip) = Trip::from_resource(&resource) else {
                    warn!("trip {} has no route, skipping", resource.id);
                    continue;
                };

                merged.shape_ids.extend(trip.shape_id.iter().cloned());
                store.put(Entity::new(resource.id.clone(), EntityData::Trip(trip)));
                merged.ids.push(resource.id);
            }
        }
        Batch::Vehicles(resources) => {
            for resource in resources {
                let Some(vehicle) = Vehicle::from_resource(&resource) else {
                    warn!("vehicle {} has no route, skipping", resource.id);
                    continue;
                };

                //trips already resident cost nothing to resolve again
                merged.trip_ids.extend(vehicle.trip_id.iter().cloned());
                store.update_vehicle(&resource.id, vehicle);
                merged.ids.push(resource.id);
            }
        }
    }
}
