use crate::entity::{EntityKind, RouteCategory};
use crate::error::SettingsError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const ESTIMATE_SETTINGS_KEY: &str = "tLayers";
pub const ACTIVE_ROUTES_KEY: &str = "activeRoutes";
pub const DISPLAY_KEY: &str = "display";

/// Key value store for user settings.
pub trait SettingsStore {
    fn load(&self, key: &str) -> Option<Value>;
    fn save(&self, key: &str, value: Value) -> Result<(), SettingsError>;
}

#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RefCell<HashMap<String, Value>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn load(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    fn save(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.values.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }
}

/// All keys kept as one JSON object in a file, rewritten on every save.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    values: RefCell<serde_json::Map<String, Value>>,
}

impl JsonFileSettings {
    /// Opens the file at `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();

        let values = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => serde_json::Map::new(),
            Err(source) => return Err(SettingsError::Io { path, source }),
        };

        Ok(Self {
            path,
            values: RefCell::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileSettings {
    fn load(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    fn save(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        let bytes = {
            let mut values = self.values.borrow_mut();
            values.insert(key.to_string(), value);
            serde_json::to_vec_pretty(&*values)?
        };

        std::fs::write(&self.path, bytes).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EstimateSettings {
    pub is_estimate_vehicle_locations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayToggles {
    pub stops: bool,
    pub shapes: bool,
    pub vehicles: bool,
}

impl Default for DisplayToggles {
    fn default() -> Self {
        Self {
            stops: true,
            shapes: true,
            vehicles: true,
        }
    }
}

impl DisplayToggles {
    /// Routes and trips are never drawn.
    pub fn is_displayed(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Stop => self.stops,
            EntityKind::Shape => self.shapes,
            EntityKind::Vehicle => self.vehicles,
            EntityKind::Route | EntityKind::Trip => false,
        }
    }
}

/// Route ids selected for display, per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActiveRoutes(pub BTreeMap<RouteCategory, BTreeSet<String>>);

impl Default for ActiveRoutes {
    fn default() -> Self {
        let subway = ["Red", "Orange", "Blue", "Green-B", "Green-C", "Green-D", "Green-E"]
            .into_iter()
            .map(String::from)
            .collect();

        Self(BTreeMap::from([(RouteCategory::Subway, subway)]))
    }
}

impl ActiveRoutes {
    pub fn none() -> Self {
        Self(BTreeMap::new())
    }

    pub fn route_ids(&self, category: RouteCategory) -> Vec<String> {
        self.0
            .get(&category)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn set(&mut self, category: RouteCategory, route_ids: impl IntoIterator<Item = String>) {
        self.0.insert(category, route_ids.into_iter().collect());
    }
}

/// Everything persisted between sessions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayerSettings {
    pub estimate: EstimateSettings,
    pub active_routes: ActiveRoutes,
    pub display: DisplayToggles,
}

impl LayerSettings {
    /// Reads every key, keeping defaults for keys that are absent or malformed.
    pub fn load(store: &impl SettingsStore) -> Self {
        Self {
            estimate: load_key(store, ESTIMATE_SETTINGS_KEY),
            active_routes: load_key(store, ACTIVE_ROUTES_KEY),
            display: load_key(store, DISPLAY_KEY),
        }
    }

    pub fn save_to(&self, store: &impl SettingsStore) -> Result<(), SettingsError> {
        save_key(store, ESTIMATE_SETTINGS_KEY, &self.estimate)?;
        save_key(store, ACTIVE_ROUTES_KEY, &self.active_routes)?;
        save_key(store, DISPLAY_KEY, &self.display)
    }
}

pub(crate) fn load_key<T: DeserializeOwned + Default>(store: &impl SettingsStore, key: &str) -> T {
    let Some(value) = store.load(key) else {
        return T::default();
    };

    serde_json::from_value(value).unwrap_or_else(|error| {
        warn!("ignoring malformed setting '{}': {}", key, error);
        T::default()
    })
}

pub(crate) fn save_key<T: Serialize>(
    store: &impl SettingsStore,
    key: &str,
    value: &T,
) -> Result<(), SettingsError> {
    store.save(key, serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_estimate_settings_use_camel_case() {
        let store = MemorySettings::new();
        store
            .save(
                ESTIMATE_SETTINGS_KEY,
                json!({ "isEstimateVehicleLocations": true, "somethingElse": 3 }),
            )
            .unwrap();

        let settings = LayerSettings::load(&store);
        assert!(settings.estimate.is_estimate_vehicle_locations);
        assert_eq!(settings.active_routes, ActiveRoutes::default());
        assert_eq!(settings.display, DisplayToggles::default());
    }

    #[test]
    fn test_malformed_setting_keeps_default() {
        let store = MemorySettings::new();
        store.save(DISPLAY_KEY, json!("not an object")).unwrap();
        store.save(ACTIVE_ROUTES_KEY, json!({ "bus": ["57", "77"] })).unwrap();

        let settings = LayerSettings::load(&store);
        assert_eq!(settings.display, DisplayToggles::default());
        assert_eq!(
            settings.active_routes.route_ids(RouteCategory::Bus),
            vec![String::from("57"), String::from("77")]
        );
        assert!(settings
            .active_routes
            .route_ids(RouteCategory::Subway)
            .is_empty());
    }

    #[test]
    fn test_json_file_roundtrip() {
        let path = std::env::temp_dir().join(format!(
            "transit-layers-settings-{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let mut settings = LayerSettings::default();
        settings.display.stops = false;
        settings
            .active_routes
            .set(RouteCategory::Ferry, [String::from("Boat-F4")]);

        {
            let file = JsonFileSettings::open(&path).unwrap();
            settings.save_to(&file).unwrap();
        }

        let reopened = JsonFileSettings::open(&path).unwrap();
        assert_eq!(LayerSettings::load(&reopened), settings);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_display_toggles() {
        let toggles = DisplayToggles {
            stops: false,
            ..Default::default()
        };
        assert!(!toggles.is_displayed(EntityKind::Stop));
        assert!(toggles.is_displayed(EntityKind::Vehicle));
        assert!(!toggles.is_displayed(EntityKind::Trip));
    }
}
