use crate::predictions::{Prediction, first_per_route};
use crate::render::TooltipProvider;
use crate::store::EntityStore;
use chrono::{DateTime, FixedOffset};

/// Wall clock time in the feed's own offset, e.g. " 2:05:09 PM".
pub fn clock_time(time: &DateTime<FixedOffset>) -> String {
    time.format("%l:%M:%S %p").to_string()
}

/// "ARR" and "DEP" times of a prediction, or `None` if it has neither.
pub fn prediction_text(prediction: &Prediction) -> Option<String> {
    match (prediction.arrival_time, prediction.departure_time) {
        (None, None) => None,
        (Some(arrival), Some(departure)) if arrival == departure => {
            Some(format!("{} DEP", clock_time(&departure)))
        }
        (Some(arrival), Some(departure)) => Some(format!(
            "{} ARR  {} DEP",
            clock_time(&arrival),
            clock_time(&departure)
        )),
        (Some(arrival), None) => Some(format!("{} ARR", clock_time(&arrival))),
        (None, Some(departure)) => Some(format!("{} DEP", clock_time(&departure))),
    }
}

fn route_name<'a>(store: &'a EntityStore, route_id: &'a str) -> &'a str {
    store
        .route(route_id)
        .map(|route| route.name())
        .filter(|name| !name.is_empty())
        .unwrap_or(route_id)
}

pub fn stop_text(store: &EntityStore, stop_id: &str, predictions: Option<&[Prediction]>) -> String {
    let mut lines = vec![
        store
            .stop(stop_id)
            .map(|stop| stop.name.clone())
            .unwrap_or_else(|| stop_id.to_string()),
    ];

    for prediction in first_per_route(predictions.unwrap_or_default()) {
        let Some(text) = prediction_text(prediction) else {
            continue;
        };
        let route = prediction
            .route_id
            .as_deref()
            .map(|route_id| route_name(store, route_id))
            .unwrap_or_default();
        lines.push(format!("{}: {}", route, text));
    }

    lines.join("\n")
}

pub fn vehicle_text(store: &EntityStore, vehicle_id: &str) -> String {
    let Some(vehicle) = store.vehicle(vehicle_id) else {
        return format!("Vehicle: {}", vehicle_id);
    };

    let heading = match store.route(&vehicle.route_id) {
        Some(route) => match route.direction_name(vehicle.direction_id) {
            Some(direction) => format!("{} {}", route_name(store, &vehicle.route_id), direction),
            None => route_name(store, &vehicle.route_id).to_string(),
        },
        None => vehicle.route_id.clone(),
    };

    let mut lines = vec![heading];

    if let Some(next) = vehicle.predictions.as_deref().and_then(|p| p.first()) {
        if let Some(text) = prediction_text(next) {
            let stop_name = store
                .stop(&next.stop_id)
                .map(|stop| stop.name.as_str())
                .unwrap_or(next.stop_id.as_str());
            lines.push(format!("{}: {}", stop_name, text));
        }
    }

    lines.push(format!("Vehicle: {}", vehicle_id));
    lines.push(format!("Bearing: {}", vehicle.bearing));
    lines.push(format!(
        "Last updated: {}",
        vehicle
            .updated_at
            .map(|updated_at| updated_at.to_rfc3339())
            .unwrap_or_else(|| String::from("unknown"))
    ));

    lines.join("\n")
}

pub fn shape_text(store: &EntityStore, shape_id: &str) -> String {
    let Some(shape) = store.shape(shape_id) else {
        return shape_id.to_string();
    };

    let name = route_name(store, &shape.route_id);
    match store
        .route(&shape.route_id)
        .and_then(|route| route.direction_name(shape.direction_id))
    {
        Some(direction) => format!("{}\n{}", name, direction),
        None => name.to_string(),
    }
}

/// Text for a tooltip. `stop_predictions` are the last predictions fetched
/// for the stop, if any.
pub fn tooltip_text(
    store: &EntityStore,
    provider: &TooltipProvider,
    stop_predictions: Option<&[Prediction]>,
) -> String {
    match provider {
        TooltipProvider::Stop(stop_id) => stop_text(store, stop_id, stop_predictions),
        TooltipProvider::Vehicle(vehicle_id) => vehicle_text(store, vehicle_id),
        TooltipProvider::Shape(shape_id) => shape_text(store, shape_id),
    }
}
