use crate::api::{Resource, RouteAttributes, StopAttributes, TripAttributes, VehicleAttributes};
use crate::geometry::{LatLng, PlanarProjection};
use crate::predictions::Prediction;
use crate::render::RenderHandle;
use crate::shape::Shape;
use chrono::{DateTime, FixedOffset};
use geo::Coord;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Route,
    Shape,
    Stop,
    Trip,
    Vehicle,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Route,
        EntityKind::Shape,
        EntityKind::Stop,
        EntityKind::Trip,
        EntityKind::Vehicle,
    ];

    /// Name of the remote collection holding this kind.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Route => "routes",
            EntityKind::Shape => "shapes",
            EntityKind::Stop => "stops",
            EntityKind::Trip => "trips",
            EntityKind::Vehicle => "vehicles",
        }
    }

    /// Routes and trips never get anything drawn for them.
    pub fn is_renderable(self) -> bool {
        matches!(
            self,
            EntityKind::Shape | EntityKind::Stop | EntityKind::Vehicle
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Reachability of an entity in the refresh cycle. Only "marked at least once
/// during generation N" matters, so there is no counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mark {
    #[default]
    Unmarked,
    Marked { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteType {
    LightRail,
    HeavyRail,
    CommuterRail,
    Bus,
    Ferry,
    Other(u8),
}

impl From<u8> for RouteType {
    fn from(value: u8) -> Self {
        match value {
            0 => RouteType::LightRail,
            1 => RouteType::HeavyRail,
            2 => RouteType::CommuterRail,
            3 => RouteType::Bus,
            4 => RouteType::Ferry,
            other => RouteType::Other(other),
        }
    }
}

impl From<RouteType> for u8 {
    fn from(value: RouteType) -> Self {
        match value {
            RouteType::LightRail => 0,
            RouteType::HeavyRail => 1,
            RouteType::CommuterRail => 2,
            RouteType::Bus => 3,
            RouteType::Ferry => 4,
            RouteType::Other(other) => other,
        }
    }
}

/// Groups of routes that are selected and refreshed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteCategory {
    Subway,
    CommuterRail,
    Bus,
    Ferry,
}

impl RouteCategory {
    pub const ALL: [RouteCategory; 4] = [
        RouteCategory::Subway,
        RouteCategory::CommuterRail,
        RouteCategory::Bus,
        RouteCategory::Ferry,
    ];

    pub fn route_types(self) -> &'static [RouteType] {
        match self {
            RouteCategory::Subway => &[RouteType::LightRail, RouteType::HeavyRail],
            RouteCategory::CommuterRail => &[RouteType::CommuterRail],
            RouteCategory::Bus => &[RouteType::Bus],
            RouteCategory::Ferry => &[RouteType::Ferry],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: String,
    pub data: EntityData,
    pub visible: bool,
    pub mark: Mark,
    pub render_handle: Option<RenderHandle>,
}

#[derive(Debug, Clone)]
pub enum EntityData {
    Route(Route),
    Shape(Shape),
    Stop(Stop),
    Trip(Trip),
    Vehicle(Vehicle),
}

impl EntityData {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityData::Route(_) => EntityKind::Route,
            EntityData::Shape(_) => EntityKind::Shape,
            EntityData::Stop(_) => EntityKind::Stop,
            EntityData::Trip(_) => EntityKind::Trip,
            EntityData::Vehicle(_) => EntityKind::Vehicle,
        }
    }
}

impl Entity {
    pub fn new(id: impl Into<String>, data: EntityData) -> Self {
        Self {
            id: id.into(),
            data,
            visible: false,
            mark: Mark::Unmarked,
            render_handle: None,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.data.kind()
    }

    pub fn mark(&mut self, generation: u64) {
        self.mark = Mark::Marked { generation };
    }

    pub fn clear_mark(&mut self) {
        self.mark = Mark::Unmarked;
    }

    pub fn is_marked_in(&self, generation: u64) -> bool {
        self.mark == Mark::Marked { generation }
    }

    pub fn as_route(&self) -> Option<&Route> {
        match &self.data {
            EntityData::Route(route) => Some(route),
            _ => None,
        }
    }

    pub fn as_shape(&self) -> Option<&Shape> {
        match &self.data {
            EntityData::Shape(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn as_stop(&self) -> Option<&Stop> {
        match &self.data {
            EntityData::Stop(stop) => Some(stop),
            _ => None,
        }
    }

    pub fn as_trip(&self) -> Option<&Trip> {
        match &self.data {
            EntityData::Trip(trip) => Some(trip),
            _ => None,
        }
    }

    pub fn as_vehicle(&self) -> Option<&Vehicle> {
        match &self.data {
            EntityData::Vehicle(vehicle) => Some(vehicle),
            _ => None,
        }
    }

    /// Route id an entity belongs to, for the kinds that carry one.
    pub fn route_id(&self) -> Option<&str> {
        match &self.data {
            EntityData::Route(_) => Some(self.id.as_str()),
            EntityData::Shape(shape) => Some(shape.route_id.as_str()),
            EntityData::Trip(trip) => Some(trip.route_id.as_str()),
            EntityData::Vehicle(vehicle) => Some(vehicle.route_id.as_str()),
            EntityData::Stop(_) => None,
        }
    }
}

pub(crate) fn parse_api_time(value: Option<&str>) -> Option<DateTime<FixedOffset>> {
    value.and_then(|value| DateTime::parse_from_rfc3339(value).ok())
}

#[derive(Debug, Clone)]
pub struct Route {
    pub route_type: RouteType,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub color: Option<String>,
    pub text_color: Option<String>,
    pub direction_names: Vec<Option<String>>,
    pub sort_order: Option<i64>,
}

impl Route {
    pub fn from_resource(resource: &Resource<RouteAttributes>) -> Self {
        let attributes = &resource.attributes;
        Self {
            route_type: RouteType::from(attributes.route_type),
            long_name: attributes.long_name.clone(),
            short_name: attributes.short_name.clone(),
            color: attributes.color.clone(),
            text_color: attributes.text_color.clone(),
            direction_names: attributes.direction_names.clone(),
            sort_order: attributes.sort_order,
        }
    }

    pub fn name(&self) -> &str {
        match (&self.long_name, &self.short_name) {
            (Some(long_name), _) if !long_name.is_empty() => long_name.as_str(),
            (_, Some(short_name)) => short_name.as_str(),
            _ => "",
        }
    }

    pub fn direction_name(&self, direction_id: Option<u8>) -> Option<&str> {
        self.direction_names
            .get(direction_id? as usize)?
            .as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct Stop {
    pub name: String,
    pub position: LatLng,
    pub planar: Coord<f64>,
    pub location_type: u8,
    pub platform_name: Option<String>,
    pub parent_station_id: Option<String>,
    pub child_stop_ids: Vec<String>,
}

impl Stop {
    pub fn from_resource(
        resource: &Resource<StopAttributes>,
        projection: &PlanarProjection,
    ) -> Self {
        let attributes = &resource.attributes;
        let position = LatLng::new(attributes.latitude, attributes.longitude);
        Self {
            name: attributes.name.clone(),
            position,
            planar: projection.project(position),
            location_type: attributes.location_type.unwrap_or(0),
            platform_name: attributes.platform_name.clone(),
            parent_station_id: resource.related_id("parent_station").map(String::from),
            child_stop_ids: resource.related_ids("child_stops"),
        }
    }

    /// Stations and station entrances, as opposed to boarding platforms.
    pub fn is_station(&self) -> bool {
        matches!(self.location_type, 1 | 2)
    }
}

#[derive(Debug, Clone)]
pub struct Trip {
    pub route_id: String,
    pub shape_id: Option<String>,
    pub headsign: Option<String>,
    pub direction_id: Option<u8>,
}

impl Trip {
    pub fn from_resource(resource: &Resource<TripAttributes>) -> Option<Self> {
        Some(Self {
            route_id: resource.related_id("route")?.to_string(),
            shape_id: resource.related_id("shape").map(String::from),
            headsign: resource.attributes.headsign.clone(),
            direction_id: resource.attributes.direction_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    pub route_id: String,
    pub trip_id: Option<String>,
    pub label: Option<String>,
    pub position: LatLng,
    pub bearing: f64,
    pub direction_id: Option<u8>,
    pub current_status: Option<String>,
    pub updated_at: Option<DateTime<FixedOffset>>,
    /// Filled in by the prediction batcher, never by a vehicle fetch.
    pub predictions: Option<Vec<Prediction>>,
}

impl Vehicle {
    pub fn from_resource(resource: &Resource<VehicleAttributes>) -> Option<Self> {
        let attributes = &resource.attributes;
        Some(Self {
            route_id: resource.related_id("route")?.to_string(),
            trip_id: resource.related_id("trip").map(String::from),
            label: attributes.label.clone(),
            position: LatLng::new(attributes.latitude, attributes.longitude),
            bearing: attributes.bearing.unwrap_or(0.0),
            direction_id: attributes.direction_id,
            current_status: attributes.current_status.clone(),
            updated_at: parse_api_time(attributes.updated_at.as_deref()),
            predictions: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Document;
    use serde_json::json;

    #[test]
    fn test_mark_is_per_generation() {
        let mut entity = Entity::new(
            "Red",
            EntityData::Trip(Trip {
                route_id: String::from("Red"),
                shape_id: None,
                headsign: None,
                direction_id: None,
            }),
        );

        assert!(!entity.is_marked_in(1));
        entity.mark(1);
        entity.mark(1);
        assert!(entity.is_marked_in(1));
        assert!(!entity.is_marked_in(2));
        entity.clear_mark();
        assert_eq!(entity.mark, Mark::Unmarked);
    }

    #[test]
    fn test_route_name_prefers_long_name() {
        let doc: Document<RouteAttributes> = serde_json::from_value(json!({
            "data": [
                { "id": "Red", "attributes": { "type": 1, "long_name": "Red Line", "short_name": "",
                  "direction_names": ["South", "North"] } },
                { "id": "78", "attributes": { "type": 3, "long_name": "", "short_name": "78",
                  "direction_names": ["Outbound", null] } }
            ]
        }))
        .unwrap();

        let routes: Vec<Route> = doc
            .data
            .into_vec()
            .iter()
            .map(Route::from_resource)
            .collect();

        assert_eq!(routes[0].name(), "Red Line");
        assert_eq!(routes[0].route_type, RouteType::HeavyRail);
        assert_eq!(routes[0].direction_name(Some(1)), Some("North"));
        assert_eq!(routes[1].name(), "78");
        assert_eq!(routes[1].direction_name(Some(1)), None);
        assert_eq!(routes[1].direction_name(None), None);
    }

    #[test]
    fn test_vehicle_without_route_is_rejected() {
        let doc: Document<VehicleAttributes> = serde_json::from_value(json!({
            "data": {
                "id": "y1923",
                "attributes": { "latitude": 42.37, "longitude": -71.11,
                  "updated_at": "2018-07-17T18:17:20-04:00" },
                "relationships": { "route": { "data": null } }
            }
        }))
        .unwrap();

        let resources = doc.data.into_vec();
        assert!(Vehicle::from_resource(&resources[0]).is_none());
    }

    #[test]
    fn test_stop_parent_and_children() {
        let doc: Document<StopAttributes> = serde_json::from_value(json!({
            "data": {
                "id": "place-harsq",
                "attributes": { "name": "Harvard", "latitude": 42.373362, "longitude": -71.118956,
                  "location_type": 1 },
                "relationships": {
                    "parent_station": { "data": null },
                    "child_stops": { "data": [ { "id": "70067", "type": "stop" } ] }
                }
            }
        }))
        .unwrap();

        let resources = doc.data.into_vec();
        let stop = Stop::from_resource(&resources[0], &PlanarProjection::default());
        assert!(stop.is_station());
        assert_eq!(stop.parent_station_id, None);
        assert_eq!(stop.child_stop_ids, vec![String::from("70067")]);
    }
}
