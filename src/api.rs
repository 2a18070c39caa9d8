//! JSON:API documents served by the remote transit API, and the urls used to query them.

use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct Document<A> {
    pub data: OneOrMany<Resource<A>>,
    /// Side-loaded resources. Only requested for stops, whose includes are stops too.
    #[serde(default = "Vec::new")]
    pub included: Vec<Resource<A>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Resource<A> {
    pub id: String,
    pub attributes: A,
    #[serde(default)]
    pub relationships: HashMap<String, Relationship>,
}

impl<A> Resource<A> {
    /// Id of a to-one relationship, if present and not null.
    pub fn related_id(&self, name: &str) -> Option<&str> {
        match self.relationships.get(name)?.data.as_ref()? {
            RelationshipData::One(identifier) => Some(identifier.id.as_str()),
            RelationshipData::Many(_) => None,
        }
    }

    /// Ids of a to-many relationship, in document order.
    pub fn related_ids(&self, name: &str) -> Vec<String> {
        match self
            .relationships
            .get(name)
            .and_then(|relationship| relationship.data.as_ref())
        {
            Some(RelationshipData::Many(identifiers)) => {
                identifiers.iter().map(|i| i.id.clone()).collect()
            }
            Some(RelationshipData::One(identifier)) => vec![identifier.id.clone()],
            None => vec![],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<RelationshipData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RelationshipData {
    Many(Vec<ResourceIdentifier>),
    One(ResourceIdentifier),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceIdentifier {
    pub id: String,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteAttributes {
    #[serde(rename = "type")]
    pub route_type: u8,
    pub color: Option<String>,
    pub text_color: Option<String>,
    pub description: Option<String>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    #[serde(default)]
    pub direction_names: Vec<Option<String>>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShapeAttributes {
    pub polyline: String,
    pub direction_id: Option<u8>,
    pub name: Option<String>,
    pub priority: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopAttributes {
    #[serde(default)]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub location_type: Option<u8>,
    pub platform_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripAttributes {
    pub headsign: Option<String>,
    pub direction_id: Option<u8>,
    pub block_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleAttributes {
    pub bearing: Option<f64>,
    pub current_status: Option<String>,
    pub current_stop_sequence: Option<u32>,
    pub direction_id: Option<u8>,
    pub label: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionAttributes {
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
    pub direction_id: Option<u8>,
    pub schedule_relationship: Option<String>,
    pub status: Option<String>,
    pub stop_sequence: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Id,
    Route,
    Stop,
    Trip,
    RouteType,
}

impl Filter {
    fn query_key(self) -> &'static str {
        match self {
            Filter::Id => "filter[id]",
            Filter::Route => "filter[route]",
            Filter::Stop => "filter[stop]",
            Filter::Trip => "filter[trip]",
            Filter::RouteType => "filter[type]",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiUrls {
    base: String,
    api_key: Option<String>,
}

impl ApiUrls {
    pub fn new(base: &str, api_key: Option<String>) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Url for a collection filtered by a comma joined list of values.
    pub fn collection<S: AsRef<str>>(&self, collection: &str, filter: Filter, values: &[S]) -> String {
        let joined = values
            .iter()
            .map(|value| value.as_ref())
            .collect::<Vec<&str>>()
            .join(",");

        let mut query = url::form_urlencoded::Serializer::new(String::new());

        //child stops come back in `included`, so stations arrive with their platforms
        if collection == "stops" {
            query.append_pair("include", "child_stops");
        }

        query.append_pair(filter.query_key(), &joined);

        if let Some(api_key) = &self.api_key {
            query.append_pair("api_key", api_key);
        }

        format!("{}/{}?{}", self.base, collection, query.finish())
    }
}
