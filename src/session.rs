use crate::api::ApiUrls;
use crate::config::Config;
use crate::entity::{EntityKind, RouteCategory};
use crate::error::{FetchError, SettingsError};
use crate::estimator::{self, EstimatorSettings};
use crate::fetcher::Fetcher;
use crate::geometry::LatLng;
use crate::predictions::{Prediction, PredictionBatcher, group_by_trip};
use crate::refresh::{self, VisibilityChanges};
use crate::render::{self, Renderer, TooltipProvider};
use crate::settings::{
    ACTIVE_ROUTES_KEY, DISPLAY_KEY, DisplayToggles, ESTIMATE_SETTINGS_KEY, LayerSettings,
    SettingsStore, save_key,
};
use crate::store::EntityStore;
use crate::tooltip;
use crate::transport::Transport;
use ahash::AHashMap;
use chrono::{DateTime, TimeDelta, Utc};
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub generation: u64,
    pub routes: usize,
    pub vehicles: usize,
    pub failures: usize,
    pub visibility: VisibilityChanges,
}

/// One running map: the entity store plus everything that feeds and draws it.
pub struct LayersSession<T, R, S> {
    config: Config,
    fetcher: Fetcher<T>,
    store: EntityStore,
    renderer: R,
    settings_store: S,
    settings: LayerSettings,
    batcher: PredictionBatcher,
    generation: u64,
    stop_predictions: AHashMap<String, Vec<Prediction>>,
}

fn time_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

impl<T, R, S> LayersSession<T, R, S>
where
    T: Transport + 'static,
    R: Renderer,
    S: SettingsStore,
{
    pub fn new(config: Config, transport: T, renderer: R, settings_store: S) -> Self {
        let settings = LayerSettings::load(&settings_store);
        let fetcher = Fetcher::new(
            transport,
            ApiUrls::new(&config.api_base, config.api_key.clone()),
            config.batch_limits,
        );

        Self {
            store: EntityStore::new(config.projection()),
            batcher: PredictionBatcher::new(config.batch_limits.prediction_trips),
            config,
            fetcher,
            renderer,
            settings_store,
            settings,
            generation: 0,
            stop_predictions: AHashMap::new(),
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn settings(&self) -> &LayerSettings {
        &self.settings
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn estimator_settings(&self) -> EstimatorSettings {
        EstimatorSettings {
            enabled: self.settings.estimate.is_estimate_vehicle_locations,
            tolerance: time_delta(self.config.position_time_tolerance),
        }
    }

    /// Runs one refresh tick: clear every mark, resolve and mark each
    /// category's active routes, then show what was marked and hide the rest.
    ///
    /// Fetch failures leave their entities stale or hidden for this tick and
    /// are counted in the report.
    pub async fn refresh_tick(&mut self, now: DateTime<Utc>) -> TickReport {
        self.generation += 1;
        let generation = self.generation;
        let mut report = TickReport {
            generation,
            ..Default::default()
        };

        refresh::clear_marks(&mut self.store);

        for category in RouteCategory::ALL {
            let active = self.settings.active_routes.route_ids(category);
            if active.is_empty() {
                continue;
            }

            let route_ids = match self
                .fetcher
                .resolve(&mut self.store, EntityKind::Route, &active)
                .await
            {
                Ok(route_ids) => route_ids,
                Err(error) => {
                    warn!("resolving {:?} routes: {}", category, error);
                    report.failures += 1;
                    active
                        .into_iter()
                        .filter(|id| self.store.contains(EntityKind::Route, id))
                        .collect()
                }
            };

            //routes loaded by an earlier tick retry whatever that tick could not fetch
            let loaded: Vec<String> = route_ids
                .iter()
                .filter(|route_id| self.store.has_shapes_for_route(route_id))
                .cloned()
                .collect();

            if let Err(error) = self
                .fetcher
                .fetch_shapes_for_routes(&mut self.store, &route_ids)
                .await
            {
                warn!("loading shapes of {:?} routes: {}", category, error);
                report.failures += 1;
            }

            if !loaded.is_empty() {
                if let Err(error) = self
                    .fetcher
                    .resolve_route_dependents(&mut self.store, &loaded)
                    .await
                {
                    warn!("retrying stops and shapes of {:?} routes: {}", category, error);
                    report.failures += 1;
                }
            }

            let refreshed = self
                .fetcher
                .refresh_vehicles(&mut self.store, &route_ids)
                .await;

            if let Some(error) = &refreshed.failure {
                warn!("refreshing {:?} vehicles: {}", category, error);
                report.failures += 1;
            }

            for vehicle_id in &refreshed.vehicle_ids {
                self.vehicle_updated(vehicle_id);
            }

            for route_id in &route_ids {
                refresh::mark_route(&mut self.store, route_id, generation);
            }

            debug!(
                "{:?}: {} routes, {} vehicles",
                category,
                route_ids.len(),
                refreshed.vehicle_ids.len()
            );

            report.routes += route_ids.len();
            report.vehicles += refreshed.vehicle_ids.len();
        }

        render::install_new_renderables(
            &mut self.store,
            &mut self.renderer,
            now,
            time_delta(self.config.timestamp_fade),
        );
        self.reposition_vehicles(now);

        report.visibility = refresh::apply_visibility(
            &mut self.store,
            &mut self.renderer,
            &self.settings.display,
            generation,
        );

        info!(
            "tick {}: {} routes, {} vehicles, {} shown, {} hidden, {} failures",
            generation,
            report.routes,
            report.vehicles,
            report.visibility.shown,
            report.visibility.hidden,
            report.failures
        );

        report
    }

    /// Drops predictions a fresh report has overtaken and queues the vehicle
    /// for new ones. With estimation off predictions are dropped and nothing
    /// is queued.
    fn vehicle_updated(&mut self, vehicle_id: &str) {
        let estimating = self.settings.estimate.is_estimate_vehicle_locations;
        let tolerance = time_delta(self.config.position_time_tolerance);

        let Some(vehicle) = self.store.vehicle_mut(vehicle_id) else {
            return;
        };

        if !estimating {
            vehicle.predictions = None;
            return;
        }

        let overtaken = match vehicle.predictions.as_deref().and_then(|p| p.first()) {
            Some(first) if first.trip_id.as_str() != vehicle.trip_id.as_deref().unwrap_or_default() => {
                true
            }
            Some(first) => match (vehicle.updated_at, first.time()) {
                (Some(reported_at), Some(predicted_at)) => reported_at >= predicted_at - tolerance,
                _ => true,
            },
            None => false,
        };

        if overtaken {
            vehicle.predictions = None;
        }

        self.batcher.enqueue(vehicle_id);
    }

    /// Fetches predictions for every queued vehicle in bounded batches and
    /// hands each trip's rows to the vehicles running it. Returns how many
    /// vehicles received predictions.
    pub async fn process_prediction_queue(&mut self) -> usize {
        if self.batcher.is_empty() {
            return 0;
        }

        let batches = self.batcher.take_batches(&self.store);
        if batches.is_empty() {
            return 0;
        }

        let mut responses = futures::stream::iter(
            batches
                .iter()
                .map(|trip_ids| self.fetcher.fetch_predictions_for_trips(trip_ids)),
        )
        .buffer_unordered(batches.len());

        let mut vehicles_by_trip: AHashMap<String, Vec<String>> = AHashMap::new();
        self.store.for_each(EntityKind::Vehicle, |entity| {
            if let Some(trip_id) = entity.as_vehicle().and_then(|v| v.trip_id.clone()) {
                vehicles_by_trip
                    .entry(trip_id)
                    .or_default()
                    .push(entity.id.clone());
            }
        });

        let mut updated = 0;
        while let Some(response) = responses.next().await {
            let predictions = match response {
                Ok(predictions) => predictions,
                Err(error) => {
                    warn!("prediction batch failed: {}", error);
                    continue;
                }
            };

            for (trip_id, rows) in group_by_trip(predictions) {
                let Some(vehicle_ids) = vehicles_by_trip.get(&trip_id) else {
                    warn!("predictions for trip {} match no vehicle", trip_id);
                    continue;
                };

                for vehicle_id in vehicle_ids {
                    if let Some(vehicle) = self.store.vehicle_mut(vehicle_id) {
                        vehicle.predictions = Some(rows.clone());
                        updated += 1;
                    }
                }
            }
        }

        debug!("distributed predictions to {} vehicles", updated);
        updated
    }

    /// Predictions of a vehicle, fetching them when it has none yet.
    pub async fn ensure_predictions_loaded(
        &mut self,
        vehicle_id: &str,
    ) -> Result<Vec<Prediction>, FetchError> {
        let Some(vehicle) = self.store.vehicle(vehicle_id) else {
            return Ok(vec![]);
        };

        if let Some(predictions) = &vehicle.predictions {
            return Ok(predictions.clone());
        }

        let Some(trip_id) = vehicle.trip_id.clone() else {
            return Ok(vec![]);
        };

        let predictions = self
            .fetcher
            .fetch_predictions_for_trips(&[trip_id])
            .await?;

        if let Some(vehicle) = self.store.vehicle_mut(vehicle_id) {
            vehicle.predictions = Some(predictions.clone());
        }

        Ok(predictions)
    }

    /// Fetches the predictions at a stop and keeps them for its tooltip.
    pub async fn predictions_for_stop(
        &mut self,
        stop_id: &str,
    ) -> Result<Vec<Prediction>, FetchError> {
        let predictions = self.fetcher.fetch_predictions_for_stop(stop_id).await?;
        self.stop_predictions
            .insert(stop_id.to_string(), predictions.clone());
        Ok(predictions)
    }

    /// Where a vehicle should be drawn at `now`.
    pub fn estimate(&self, vehicle_id: &str, now: DateTime<Utc>) -> Option<LatLng> {
        let vehicle = self.store.vehicle(vehicle_id)?;
        Some(estimator::position_or_reported(
            &self.store,
            vehicle,
            &self.estimator_settings(),
            now,
        ))
    }

    /// Moves and restyles every vehicle reached by the current tick.
    pub fn reposition_vehicles(&mut self, now: DateTime<Utc>) {
        let settings = self.estimator_settings();
        let fade = time_delta(self.config.timestamp_fade);
        let Self {
            store,
            renderer,
            generation,
            ..
        } = self;

        store.for_each(EntityKind::Vehicle, |entity| {
            if !entity.is_marked_in(*generation) {
                return;
            }
            let (Some(handle), Some(vehicle)) = (entity.render_handle, entity.as_vehicle()) else {
                return;
            };

            let route_type = render::route_type_of(store, &vehicle.route_id);
            let position = estimator::position_or_reported(store, vehicle, &settings, now);

            renderer.set_position(
                handle,
                &render::vehicle_placement(vehicle, route_type, position),
            );
            renderer.set_style(
                handle,
                &render::vehicle_style(vehicle, route_type, now, fade),
            );
        });
    }

    pub fn tooltip_text(&self, provider: &TooltipProvider) -> String {
        let stop_predictions = match provider {
            TooltipProvider::Stop(stop_id) => self.stop_predictions.get(stop_id).map(Vec::as_slice),
            _ => None,
        };
        tooltip::tooltip_text(&self.store, provider, stop_predictions)
    }

    /// Lists every route id of a category, e.g. to offer them for selection.
    pub async fn fetch_route_ids(
        &mut self,
        category: RouteCategory,
    ) -> Result<Vec<String>, FetchError> {
        self.fetcher
            .fetch_route_ids(&mut self.store, category.route_types())
            .await
    }

    pub fn set_estimate_vehicle_locations(&mut self, enabled: bool) -> Result<(), SettingsError> {
        self.settings.estimate.is_estimate_vehicle_locations = enabled;
        save_key(
            &self.settings_store,
            ESTIMATE_SETTINGS_KEY,
            &self.settings.estimate,
        )
    }

    /// Applies new display toggles to the last tick's marks right away.
    pub fn set_display(&mut self, display: DisplayToggles) -> Result<VisibilityChanges, SettingsError> {
        self.settings.display = display;
        let changes = refresh::apply_visibility(
            &mut self.store,
            &mut self.renderer,
            &self.settings.display,
            self.generation,
        );
        save_key(&self.settings_store, DISPLAY_KEY, &self.settings.display)?;
        Ok(changes)
    }

    /// Takes effect on the next tick.
    pub fn set_active_routes(
        &mut self,
        category: RouteCategory,
        route_ids: impl IntoIterator<Item = String>,
    ) -> Result<(), SettingsError> {
        self.settings.active_routes.set(category, route_ids);
        save_key(
            &self.settings_store,
            ACTIVE_ROUTES_KEY,
            &self.settings.active_routes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PlanarProjection;
    use crate::render::Placement;
    use crate::render::recording::RecordingRenderer;
    use crate::settings::{ActiveRoutes, MemorySettings, SettingsStore};
    use crate::transport::mock::*;
    use chrono::TimeZone;
    use serde_json::json;

    type TestSession = LayersSession<MockTransport, RecordingRenderer, MemorySettings>;

    fn reported_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 7, 17, 22, 17, 20).unwrap()
    }

    const REPORTED_AT: &str = "2018-07-17T18:17:20-04:00";

    /// Red line along a 1000 m east-west shape, plus a bus route with one
    /// vehicle and no shapes.
    fn seed(mock: &MockTransport) -> PlanarProjection {
        let projection = PlanarProjection::default();
        let at = |x: f64| projection.unproject(geo::Coord { x, y: 0.0 });
        let vertices = vec![at(0.0), at(500.0), at(1000.0)];

        mock.insert("routes", route_json("Red", 1, "Red Line"));
        mock.insert("routes", route_json("57", 3, "57"));
        for (i, stop_id) in ["alewife", "davis", "porter"].iter().enumerate() {
            mock.insert("stops", stop_json(stop_id, stop_id, vertices[i], None));
        }
        mock.insert(
            "shapes",
            shape_json("sh1", "Red", &["alewife", "davis", "porter"], &vertices),
        );
        mock.insert("trips", trip_json("t1", "Red", Some("sh1")));
        mock.insert("trips", trip_json("t57", "57", None));
        mock.insert("vehicles", vehicle_json("R-1", "Red", "t1", at(600.0), REPORTED_AT));
        mock.insert("vehicles", vehicle_json("y1", "57", "t57", at(300.0), REPORTED_AT));

        projection
    }

    fn session(mock: &MockTransport, estimate: bool) -> TestSession {
        let settings = MemorySettings::new();
        settings
            .save(
                ESTIMATE_SETTINGS_KEY,
                json!({ "isEstimateVehicleLocations": estimate }),
            )
            .unwrap();

        let mut active = ActiveRoutes::none();
        active.set(RouteCategory::Subway, [String::from("Red")]);
        active.set(RouteCategory::Bus, [String::from("57")]);
        save_key(&settings, ACTIVE_ROUTES_KEY, &active).unwrap();

        LayersSession::new(
            Config {
                api_base: String::from("https://api.test"),
                ..Default::default()
            },
            mock.clone(),
            RecordingRenderer::default(),
            settings,
        )
    }

    fn vehicle_visible(session: &TestSession, id: &str) -> bool {
        session
            .store()
            .get(EntityKind::Vehicle, id)
            .is_some_and(|entity| entity.visible)
    }

    #[tokio::test]
    async fn test_inactive_route_vehicles_are_hidden() {
        let mock = MockTransport::new();
        seed(&mock);
        let mut session = session(&mock, false);

        let report = session.refresh_tick(reported_at()).await;
        assert_eq!(report.failures, 0);
        assert_eq!(report.routes, 2);
        assert!(vehicle_visible(&session, "R-1"));
        assert!(vehicle_visible(&session, "y1"));
        let shape_requests = mock.requests_to("shapes").len();

        session
            .set_active_routes(RouteCategory::Bus, Vec::new())
            .unwrap();
        let report = session.refresh_tick(reported_at()).await;

        assert_eq!(report.generation, 2);
        assert!(vehicle_visible(&session, "R-1"));
        assert!(!vehicle_visible(&session, "y1"));
        assert_eq!(report.visibility.hidden, 1);

        let handle = session
            .store()
            .get(EntityKind::Vehicle, "y1")
            .unwrap()
            .render_handle
            .unwrap();
        assert_eq!(session.renderer().removed(), vec![handle]);

        //shapes are fetched once per route
        assert_eq!(mock.requests_to("shapes").len(), shape_requests);
    }

    #[tokio::test]
    async fn test_failed_vehicle_batch_keeps_tick_going() {
        let mock = MockTransport::new();
        seed(&mock);
        mock.fail_matching("vehicles?filter%5Broute%5D=57");
        let mut session = session(&mock, false);

        let report = session.refresh_tick(reported_at()).await;

        assert_eq!(report.failures, 1);
        assert!(vehicle_visible(&session, "R-1"));
        assert!(session.store().vehicle("y1").is_none());
    }

    #[tokio::test]
    async fn test_predictions_drive_the_estimate() {
        let mock = MockTransport::new();
        let projection = seed(&mock);
        mock.insert(
            "predictions",
            prediction_json(
                "p1",
                "t1",
                "Red",
                "porter",
                Some("2018-07-17T18:18:20-04:00"),
                None,
            ),
        );
        let mut session = session(&mock, true);

        session.refresh_tick(reported_at()).await;
        assert_eq!(session.process_prediction_queue().await, 1);
        assert_eq!(mock.requests_to("predictions").len(), 1);

        let now = reported_at() + TimeDelta::seconds(30);
        let estimated = session.estimate("R-1", now).unwrap();
        assert!((projection.project(estimated).x - 800.0).abs() < 2.0);

        session.reposition_vehicles(now);
        let handle = session
            .store()
            .get(EntityKind::Vehicle, "R-1")
            .unwrap()
            .render_handle
            .unwrap();
        match session.renderer().last_position(handle) {
            Some(Placement::Polygon(outline)) => {
                assert!((projection.project(outline[0]).x - 800.0).abs() < 2.0)
            }
            other => panic!("expected a polygon, got {:?}", other),
        }

        // the bus has no shape, so it stays where it was reported
        let bus = session.store().vehicle("y1").unwrap().position;
        assert_eq!(session.estimate("y1", now), Some(bus));
    }

    #[tokio::test]
    async fn test_estimation_off_drops_predictions() {
        let mock = MockTransport::new();
        seed(&mock);
        mock.insert(
            "predictions",
            prediction_json("p1", "t1", "Red", "porter", Some("2018-07-17T18:18:20-04:00"), None),
        );
        let mut session = session(&mock, true);

        session.refresh_tick(reported_at()).await;
        session.process_prediction_queue().await;
        assert!(session.store().vehicle("R-1").unwrap().predictions.is_some());

        session.set_estimate_vehicle_locations(false).unwrap();
        session.refresh_tick(reported_at()).await;

        assert!(session.store().vehicle("R-1").unwrap().predictions.is_none());
        assert_eq!(session.process_prediction_queue().await, 0);

        let now = reported_at() + TimeDelta::seconds(30);
        let reported = session.store().vehicle("R-1").unwrap().position;
        assert_eq!(session.estimate("R-1", now), Some(reported));
    }

    #[tokio::test]
    async fn test_overtaken_predictions_are_dropped() {
        let mock = MockTransport::new();
        let projection = seed(&mock);
        mock.insert(
            "predictions",
            prediction_json("p1", "t1", "Red", "porter", Some("2018-07-17T18:18:20-04:00"), None),
        );
        let mut session = session(&mock, true);

        session.refresh_tick(reported_at()).await;
        session.process_prediction_queue().await;

        //the next report comes in 55 s later, inside the tolerance of the prediction
        mock.insert(
            "vehicles",
            vehicle_json(
                "R-1",
                "Red",
                "t1",
                projection.unproject(geo::Coord { x: 950.0, y: 0.0 }),
                "2018-07-17T18:18:15-04:00",
            ),
        );
        session
            .refresh_tick(reported_at() + TimeDelta::seconds(56))
            .await;

        assert!(session.store().vehicle("R-1").unwrap().predictions.is_none());
    }

    #[tokio::test]
    async fn test_trip_change_drops_predictions() {
        let mock = MockTransport::new();
        let projection = seed(&mock);
        mock.insert("trips", trip_json("t2", "Red", Some("sh1")));
        mock.insert(
            "predictions",
            prediction_json("p1", "t1", "Red", "porter", Some("2018-07-17T18:18:20-04:00"), None),
        );
        let mut session = session(&mock, true);

        session.refresh_tick(reported_at()).await;
        session.process_prediction_queue().await;
        assert!(session.store().vehicle("R-1").unwrap().predictions.is_some());

        //same report time, so only the new trip makes the predictions stale
        mock.insert(
            "vehicles",
            vehicle_json(
                "R-1",
                "Red",
                "t2",
                projection.unproject(geo::Coord { x: 600.0, y: 0.0 }),
                REPORTED_AT,
            ),
        );
        session.refresh_tick(reported_at()).await;

        let vehicle = session.store().vehicle("R-1").unwrap();
        assert_eq!(vehicle.trip_id.as_deref(), Some("t2"));
        assert!(vehicle.predictions.is_none());
    }

    #[tokio::test]
    async fn test_failed_stops_are_retried_on_the_next_tick() {
        let mock = MockTransport::new();
        seed(&mock);
        mock.fail_matching("/stops?");
        let mut session = session(&mock, false);

        let report = session.refresh_tick(reported_at()).await;
        assert!(report.failures >= 1);
        assert!(session.store().stop("davis").is_none());
        assert!(session.store().shape("sh1").unwrap().needs_anchoring());

        mock.clear_failures();
        let report = session.refresh_tick(reported_at()).await;

        assert_eq!(report.failures, 0);
        assert!(session.store().get(EntityKind::Stop, "davis").unwrap().visible);
        let shape = session.store().shape("sh1").unwrap();
        assert_eq!(shape.vertex_index_for_stop("davis"), Some(1));
        assert!(!shape.needs_anchoring());

        //once anchored, later ticks ask for nothing more
        let stop_requests = mock.requests_to("stops").len();
        session.refresh_tick(reported_at()).await;
        assert_eq!(mock.requests_to("stops").len(), stop_requests);
    }

    #[tokio::test]
    async fn test_ensure_predictions_loaded_fetches_once() {
        let mock = MockTransport::new();
        seed(&mock);
        mock.insert(
            "predictions",
            prediction_json("p1", "t1", "Red", "porter", Some("2018-07-17T18:18:20-04:00"), None),
        );
        let mut session = session(&mock, false);
        session.refresh_tick(reported_at()).await;

        let first = session.ensure_predictions_loaded("R-1").await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].stop_id, "porter");

        let second = session.ensure_predictions_loaded("R-1").await.unwrap();
        assert_eq!(second, first);
        assert_eq!(mock.requests_to("predictions").len(), 1);

        let text = session.tooltip_text(&TooltipProvider::Vehicle(String::from("R-1")));
        assert!(text.starts_with("Red Line North\nporter:  6:18:20 PM ARR"), "{}", text);
    }

    #[tokio::test]
    async fn test_stop_tooltip_uses_stop_predictions() {
        let mock = MockTransport::new();
        seed(&mock);
        mock.insert(
            "predictions",
            prediction_json("p1", "t1", "Red", "porter", None, Some("2018-07-17T18:18:20-04:00")),
        );
        let mut session = session(&mock, false);
        session.refresh_tick(reported_at()).await;

        let predictions = session.predictions_for_stop("porter").await.unwrap();
        assert_eq!(predictions.len(), 1);

        assert_eq!(
            session.tooltip_text(&TooltipProvider::Stop(String::from("porter"))),
            "porter\nRed Line:  6:18:20 PM DEP"
        );
    }

    #[tokio::test]
    async fn test_display_toggle_applies_immediately() {
        let mock = MockTransport::new();
        seed(&mock);
        let mut session = session(&mock, false);
        session.refresh_tick(reported_at()).await;

        assert!(session.store().get(EntityKind::Stop, "davis").unwrap().visible);

        let changes = session
            .set_display(DisplayToggles {
                stops: false,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(changes.hidden, 3);
        assert!(!session.store().get(EntityKind::Stop, "davis").unwrap().visible);
        assert!(vehicle_visible(&session, "R-1"));
        assert!(!session.settings().display.stops);
    }

    #[tokio::test]
    async fn test_fetch_route_ids_for_category() {
        let mock = MockTransport::new();
        seed(&mock);
        let mut session = session(&mock, false);

        let bus = session.fetch_route_ids(RouteCategory::Bus).await.unwrap();
        assert_eq!(bus, vec![String::from("57")]);
    }
}
