// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::bytes_nth,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::cmp_null,
    clippy::op_ref
)]

//! Live transit layers: an entity cache of routes, shapes, stops, trips and
//! vehicles fetched in batches from a JSON:API transit feed, a mark and sweep
//! refresh cycle deciding what is shown on the map, and vehicle position
//! estimates along route shapes.

#[macro_use]
extern crate serde;

pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod estimator;
pub mod fetcher;
pub mod geometry;
pub mod predictions;
pub mod refresh;
pub mod render;
pub mod session;
pub mod settings;
pub mod shape;
pub mod store;
pub mod tooltip;
pub mod transport;

pub use config::Config;
pub use entity::{Entity, EntityData, EntityKind, Mark, RouteCategory, RouteType};
pub use error::{FetchError, SettingsError, TransportError};
pub use session::{LayersSession, TickReport};
pub use store::EntityStore;
