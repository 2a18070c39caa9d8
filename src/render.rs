//! The narrow interface to the map surface, and the styles and marker
//! geometry handed to it.

use crate::entity::{EntityKind, Route, RouteType, Stop, Vehicle};
use crate::geometry::{self, LatLng};
use crate::shape::Shape;
use crate::store::EntityStore;
use chrono::{DateTime, TimeDelta, Utc};

/// Opaque reference to a renderable owned by the map surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderHandle(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub color: Option<String>,
    pub fill_color: Option<String>,
    pub opacity: f64,
    pub fill_opacity: f64,
    pub weight: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            color: None,
            fill_color: None,
            opacity: 1.0,
            fill_opacity: 1.0,
            weight: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Polygon(Vec<LatLng>),
    Polyline(Vec<LatLng>),
    Circle { center: LatLng, radius_m: f64 },
}

/// Names the entity a tooltip is about; the text is built when it opens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TooltipProvider {
    Stop(String),
    Vehicle(String),
    Shape(String),
}

pub trait Renderer {
    fn add_to_map(&mut self, handle: RenderHandle);
    fn remove_from_map(&mut self, handle: RenderHandle);
    fn set_style(&mut self, handle: RenderHandle, style: &Style);
    fn set_position(&mut self, handle: RenderHandle, placement: &Placement);
    fn bind_tooltip(&mut self, handle: RenderHandle, provider: TooltipProvider);
}

const STOP_HALF_SIZE_M: f64 = 20.0;
const STATION_RADIUS_M: f64 = 100.0;

const LIGHT_RAIL_OUTLINE: [(f64, f64); 6] = [
    (0.0, 0.0),
    (50.0, -50.0),
    (50.0, -150.0),
    (0.0, -100.0),
    (-50.0, -150.0),
    (-50.0, -50.0),
];

const HEAVY_RAIL_OUTLINE: [(f64, f64); 6] = [
    (0.0, 0.0),
    (50.0, -50.0),
    (50.0, -200.0),
    (0.0, -150.0),
    (-50.0, -200.0),
    (-50.0, -50.0),
];

const COMMUTER_RAIL_OUTLINE: [(f64, f64); 6] = [
    (0.0, 0.0),
    (50.0, -50.0),
    (50.0, -250.0),
    (0.0, -200.0),
    (-50.0, -250.0),
    (-50.0, -50.0),
];

const BUS_HALF_WIDTH: f64 = 30.0;
const BUS_OUTLINE: [(f64, f64); 6] = [
    (0.0, 0.0),
    (BUS_HALF_WIDTH, -BUS_HALF_WIDTH),
    (BUS_HALF_WIDTH, -100.0),
    (0.0, -100.0 + BUS_HALF_WIDTH),
    (-BUS_HALF_WIDTH, -100.0),
    (-BUS_HALF_WIDTH, -BUS_HALF_WIDTH),
];

const STOP_OUTLINE: [(f64, f64); 4] = [
    (STOP_HALF_SIZE_M, -STOP_HALF_SIZE_M),
    (STOP_HALF_SIZE_M, STOP_HALF_SIZE_M),
    (-STOP_HALF_SIZE_M, STOP_HALF_SIZE_M),
    (-STOP_HALF_SIZE_M, -STOP_HALF_SIZE_M),
];

/// Marker outline in metres, nose at the origin pointing along +y.
pub fn vehicle_outline(route_type: RouteType) -> &'static [(f64, f64)] {
    match route_type {
        RouteType::HeavyRail => &HEAVY_RAIL_OUTLINE,
        RouteType::CommuterRail => &COMMUTER_RAIL_OUTLINE,
        RouteType::Bus => &BUS_OUTLINE,
        RouteType::LightRail | RouteType::Ferry | RouteType::Other(_) => &LIGHT_RAIL_OUTLINE,
    }
}

pub fn vehicle_color(route_id: &str, route_type: RouteType) -> &'static str {
    match route_type {
        RouteType::HeavyRail => match route_id {
            "Red" => "DarkRed",
            "Orange" => "DarkOrange",
            _ => "DarkBlue",
        },
        RouteType::CommuterRail => "purple",
        RouteType::Bus => "darkCyan",
        RouteType::Ferry => "white",
        RouteType::LightRail | RouteType::Other(_) => "DarkGreen",
    }
}

/// Fill opacity of a vehicle marker, fading from 1.0 for a fresh report to
/// 0.2 once the report is `fade` old. Unknown report times get 0.2.
pub fn fade_opacity<Tz: chrono::TimeZone>(
    updated_at: Option<&DateTime<Tz>>,
    now: DateTime<Utc>,
    fade: TimeDelta,
) -> f64 {
    let Some(updated_at) = updated_at else {
        return 0.2;
    };

    let fade_ms = fade.num_milliseconds().max(1) as f64;
    let age_ms = now
        .signed_duration_since(updated_at)
        .num_milliseconds()
        .clamp(0, fade.num_milliseconds().max(1)) as f64;

    1.0 - (age_ms / fade_ms) * 0.8
}

pub fn vehicle_style(
    vehicle: &Vehicle,
    route_type: RouteType,
    now: DateTime<Utc>,
    fade: TimeDelta,
) -> Style {
    let color = vehicle_color(&vehicle.route_id, route_type).to_string();
    Style {
        color: Some(color.clone()),
        fill_color: Some(color),
        opacity: 0.5,
        fill_opacity: fade_opacity(vehicle.updated_at.as_ref(), now, fade),
        weight: 0.0,
    }
}

pub fn vehicle_placement(vehicle: &Vehicle, route_type: RouteType, position: LatLng) -> Placement {
    Placement::Polygon(geometry::outline_at(
        position,
        vehicle.bearing,
        vehicle_outline(route_type),
    ))
}

pub fn shape_style(route: Option<&Route>) -> Style {
    let Some(route) = route else {
        return Style {
            opacity: 0.5,
            weight: 2.0,
            ..Default::default()
        };
    };

    let weight = match route.route_type {
        RouteType::LightRail | RouteType::HeavyRail => 4.0,
        RouteType::CommuterRail | RouteType::Ferry => 3.0,
        RouteType::Bus | RouteType::Other(_) => 2.0,
    };

    Style {
        color: route.color.as_ref().map(|color| format!("#{}", color)),
        fill_color: None,
        opacity: 0.5,
        fill_opacity: 0.0,
        weight,
    }
}

pub fn stop_style(stop: &Stop) -> Style {
    match stop.is_station() {
        true => Style {
            color: Some(String::from("darkblue")),
            fill_color: Some(String::from("darkblue")),
            opacity: 0.0,
            fill_opacity: 0.2,
            weight: 1.0,
        },
        false => Style {
            color: None,
            fill_color: Some(String::from("steelblue")),
            opacity: 1.0,
            fill_opacity: 0.2,
            weight: 0.0,
        },
    }
}

pub fn stop_placement(stop: &Stop) -> Placement {
    match stop.is_station() {
        true => Placement::Circle {
            center: stop.position,
            radius_m: STATION_RADIUS_M,
        },
        false => Placement::Polygon(geometry::outline_at(stop.position, 0.0, &STOP_OUTLINE)),
    }
}

pub fn shape_placement(shape: &Shape) -> Placement {
    Placement::Polyline(shape.vertices.clone())
}

/// Gives every entity inserted since the last call its style, placement and
/// tooltip. Nothing is added to the map here; visibility decides that.
pub fn install_new_renderables<R: Renderer>(
    store: &mut EntityStore,
    renderer: &mut R,
    now: DateTime<Utc>,
    fade: TimeDelta,
) {
    for (kind, id) in store.take_new_renderables() {
        let Some(handle) = store.get(kind, &id).and_then(|entity| entity.render_handle) else {
            continue;
        };

        match kind {
            EntityKind::Shape => {
                let Some(shape) = store.shape(&id) else {
                    continue;
                };
                renderer.set_style(handle, &shape_style(store.route(&shape.route_id)));
                renderer.set_position(handle, &shape_placement(shape));
                renderer.bind_tooltip(handle, TooltipProvider::Shape(id));
            }
            EntityKind::Stop => {
                let Some(stop) = store.stop(&id) else {
                    continue;
                };
                renderer.set_style(handle, &stop_style(stop));
                renderer.set_position(handle, &stop_placement(stop));
                renderer.bind_tooltip(handle, TooltipProvider::Stop(id));
            }
            EntityKind::Vehicle => {
                let Some(vehicle) = store.vehicle(&id) else {
                    continue;
                };
                let route_type = route_type_of(store, &vehicle.route_id);
                renderer.set_style(handle, &vehicle_style(vehicle, route_type, now, fade));
                renderer.set_position(
                    handle,
                    &vehicle_placement(vehicle, route_type, vehicle.position),
                );
                renderer.bind_tooltip(handle, TooltipProvider::Vehicle(id));
            }
            EntityKind::Route | EntityKind::Trip => {}
        }
    }
}

pub fn route_type_of(store: &EntityStore, route_id: &str) -> RouteType {
    store
        .route(route_id)
        .map(|route| route.route_type)
        .unwrap_or(RouteType::Bus)
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum RenderCall {
        Add(RenderHandle),
        Remove(RenderHandle),
        Style(RenderHandle, Style),
        Position(RenderHandle, Placement),
        Tooltip(RenderHandle, TooltipProvider),
    }

    #[derive(Debug, Default)]
    pub struct RecordingRenderer {
        pub calls: Vec<RenderCall>,
    }

    impl RecordingRenderer {
        pub fn added(&self) -> Vec<RenderHandle> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    RenderCall::Add(handle) => Some(*handle),
                    _ => None,
                })
                .collect()
        }

        pub fn removed(&self) -> Vec<RenderHandle> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    RenderCall::Remove(handle) => Some(*handle),
                    _ => None,
                })
                .collect()
        }

        pub fn last_position(&self, handle: RenderHandle) -> Option<&Placement> {
            self.calls.iter().rev().find_map(|call| match call {
                RenderCall::Position(h, placement) if *h == handle => Some(placement),
                _ => None,
            })
        }
    }

    impl Renderer for RecordingRenderer {
        fn add_to_map(&mut self, handle: RenderHandle) {
            self.calls.push(RenderCall::Add(handle));
        }

        fn remove_from_map(&mut self, handle: RenderHandle) {
            self.calls.push(RenderCall::Remove(handle));
        }

        fn set_style(&mut self, handle: RenderHandle, style: &Style) {
            self.calls.push(RenderCall::Style(handle, style.clone()));
        }

        fn set_position(&mut self, handle: RenderHandle, placement: &Placement) {
            self.calls.push(RenderCall::Position(handle, placement.clone()));
        }

        fn bind_tooltip(&mut self, handle: RenderHandle, provider: TooltipProvider) {
            self.calls.push(RenderCall::Tooltip(handle, provider));
        }
    }
}
