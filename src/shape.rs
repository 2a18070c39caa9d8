use crate::api::{Resource, ShapeAttributes};
use crate::error::FetchError;
use crate::geometry::{
    self, LatLng, MIN_SEGMENT_LENGTH, PlanarProjection, STOP_ANCHOR_TOLERANCE,
};
use ahash::AHashMap;
use geo::Coord;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Shape {
    pub route_id: String,
    pub direction_id: Option<u8>,
    pub name: Option<String>,
    pub vertices: Vec<LatLng>,
    pub planar: Vec<Coord<f64>>,
    /// Stop ids in travel order.
    pub stop_ids: Vec<String>,
    anchors: Option<StopAnchors>,
}

/// Where each stop of a shape sits along its vertices.
#[derive(Debug, Clone, Default)]
pub struct StopAnchors {
    pub stop_id_vertex_indices: AHashMap<String, usize>,
    /// `segment_lengths[i]` is the projected length from vertex `i` to vertex `i + 1`.
    pub segment_lengths: Vec<f64>,
    /// Some stop of the shape was not loaded when these anchors were computed.
    pub incomplete: bool,
}

impl StopAnchors {
    /// Highest anchored vertex strictly before `vertex`, or 0.
    pub fn previous_anchor(&self, vertex: usize) -> usize {
        self.stop_id_vertex_indices
            .values()
            .copied()
            .filter(|v| *v < vertex)
            .max()
            .unwrap_or(0)
    }
}

impl Shape {
    pub fn new(
        route_id: impl Into<String>,
        stop_ids: Vec<String>,
        vertices: Vec<LatLng>,
        projection: &PlanarProjection,
    ) -> Self {
        let planar = vertices.iter().map(|v| projection.project(*v)).collect();
        Self {
            route_id: route_id.into(),
            direction_id: None,
            name: None,
            vertices,
            planar,
            stop_ids,
            anchors: None,
        }
    }

    pub fn from_resource(
        resource: &Resource<ShapeAttributes>,
        projection: &PlanarProjection,
    ) -> Result<Self, FetchError> {
        let vertices = geometry::decode_polyline(&resource.attributes.polyline).map_err(
            |message| FetchError::Polyline {
                shape_id: resource.id.clone(),
                message,
            },
        )?;

        let route_id = resource.related_id("route").unwrap_or_default();

        let mut shape = Shape::new(
            route_id,
            resource.related_ids("stops"),
            vertices,
            projection,
        );
        shape.direction_id = resource.attributes.direction_id;
        shape.name = resource.attributes.name.clone();

        Ok(shape)
    }

    pub fn anchors(&self) -> Option<&StopAnchors> {
        self.anchors.as_ref()
    }

    /// True until anchors exist that were computed with every stop loaded.
    pub fn needs_anchoring(&self) -> bool {
        self.anchors
            .as_ref()
            .is_none_or(|anchors| anchors.incomplete)
    }

    pub fn vertex_index_for_stop(&self, stop_id: &str) -> Option<usize> {
        self.anchors
            .as_ref()?
            .stop_id_vertex_indices
            .get(stop_id)
            .copied()
    }

    /// Recomputes segment lengths and the stop to vertex anchors once the
    /// shape's stops are resident. `stop_position` returns the projected
    /// position of a stop, or `None` if the stop is not loaded.
    ///
    /// The first stop sits on vertex 0 and the last on the final vertex.
    /// Intermediate stops are matched in order to the first segment past the
    /// previous anchor that passes within [`STOP_ANCHOR_TOLERANCE`] and take
    /// that segment's nearer vertex. A stop that never comes that close takes
    /// the nearest vertex past the previous anchor instead.
    pub fn stops_updated(&mut self, stop_position: impl Fn(&str) -> Option<Coord<f64>>) {
        let segment_lengths = geometry::segment_lengths(&self.planar);
        let mut indices = AHashMap::new();
        let mut incomplete = false;

        let vertex_count = self.planar.len();
        let (Some(first), Some(last)) = (self.stop_ids.first(), self.stop_ids.last()) else {
            self.anchors = Some(StopAnchors {
                stop_id_vertex_indices: indices,
                segment_lengths,
                incomplete,
            });
            return;
        };

        if vertex_count == 0 {
            warn!("shape for route {} has no vertices", self.route_id);
            self.anchors = Some(StopAnchors {
                stop_id_vertex_indices: indices,
                segment_lengths,
                incomplete,
            });
            return;
        }

        //first and last are anchored by list position, but still need to be loaded
        incomplete = stop_position(first).is_none() || stop_position(last).is_none();

        indices.insert(first.clone(), 0);

        let mut cursor = 0;
        let intermediate = match self.stop_ids.len() {
            0..=2 => &[][..],
            n => &self.stop_ids[1..n - 1],
        };

        for stop_id in intermediate {
            let Some(position) = stop_position(stop_id) else {
                warn!(
                    "stop {} of shape on route {} is not loaded, leaving it unanchored",
                    stop_id, self.route_id
                );
                incomplete = true;
                continue;
            };

            let vertex = anchor_vertex(&self.planar, &segment_lengths, cursor, position);
            indices.insert(stop_id.clone(), vertex);
            cursor = vertex;
        }

        if self.stop_ids.len() > 1 {
            indices.insert(last.clone(), vertex_count - 1);
        }

        self.anchors = Some(StopAnchors {
            stop_id_vertex_indices: indices,
            segment_lengths,
            incomplete,
        });
    }
}

fn anchor_vertex(
    planar: &[Coord<f64>],
    segment_lengths: &[f64],
    cursor: usize,
    stop: Coord<f64>,
) -> usize {
    for (segment, length) in segment_lengths.iter().enumerate().skip(cursor) {
        if *length < MIN_SEGMENT_LENGTH {
            continue;
        }

        let projection =
            geometry::project_onto_segment(stop, planar[segment], planar[segment + 1]);

        if projection.distance < STOP_ANCHOR_TOLERANCE {
            return if projection.fraction < 0.5 {
                segment
            } else {
                segment + 1
            };
        }
    }

    (cursor..planar.len())
        .min_by(|a, b| {
            geometry::distance(planar[*a], stop).total_cmp(&geometry::distance(planar[*b], stop))
        })
        .unwrap_or(cursor)
}
