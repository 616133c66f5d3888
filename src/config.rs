use crate::{
    error::{ErrorCode, ExplorerError},
    layers::LayerCatalog,
    query::{DEFAULT_BACKEND_URL, DEFAULT_TIMEOUT_SECS, RegionSource},
};
use serde::{Deserialize, Serialize};
use smoke_protocol::{DEFAULT_EE_BASE_URL, DetailsQuery};
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_CONFIG_FILE: &str = "smoke_explorer.json";

/// Map center over Borneo and Sumatra, as (longitude, latitude).
pub const DEFAULT_CENTER: (f64, f64) = (110.82, 3.35);
pub const DEFAULT_ZOOM: u8 = 5;
pub const MAX_ZOOM: u8 = 12;
pub const DEFAULT_BASEMAP_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub backend_url: String,
    pub ee_base_url: String,
    /// Base map tile template with `{z}`, `{x}` and `{y}` placeholders.
    pub basemap_url: String,
    pub request_timeout_secs: u64,
    /// Local directory with `{id}.json` boundary files; unset reads them from
    /// the backend.
    pub regions_dir: Option<String>,
    /// Regions drawn when the boot payload lists none.
    pub regions: Vec<String>,
    pub default_center: (f64, f64),
    pub default_zoom: u8,
    pub layers: LayerCatalog,
    pub default_query: DetailsQuery,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            ee_base_url: DEFAULT_EE_BASE_URL.to_string(),
            basemap_url: DEFAULT_BASEMAP_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            regions_dir: None,
            regions: vec![],
            default_center: DEFAULT_CENTER,
            default_zoom: DEFAULT_ZOOM,
            layers: LayerCatalog::default(),
            default_query: DetailsQuery::default(),
        }
    }
}

impl ExplorerConfig {
    pub fn load_from_path(path: &str) -> Result<Self, ExplorerError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExplorerError::new(
                ErrorCode::Io,
                format!("Could not read config file '{path}': {e}"),
            )
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            ExplorerError::invalid_input(format!("Could not parse config JSON '{path}': {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path` when given, else [`DEFAULT_CONFIG_FILE`] when it exists,
    /// else the built-in defaults.
    pub fn load_or_default(path: Option<&str>) -> Result<Self, ExplorerError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None if std::path::Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::load_from_path(DEFAULT_CONFIG_FILE)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn save_to_path(&self, path: &str) -> Result<(), ExplorerError> {
        let text = serde_json::to_string_pretty(self).map_err(|e| {
            ExplorerError::invalid_input(format!("Could not serialize config: {e}"))
        })?;
        std::fs::write(path, text).map_err(|e| {
            ExplorerError::new(
                ErrorCode::Io,
                format!("Could not write config file '{path}': {e}"),
            )
        })
    }

    pub fn validate(&self) -> Result<(), ExplorerError> {
        if self.backend_url.trim().is_empty() {
            return Err(ExplorerError::invalid_input("backend_url must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ExplorerError::invalid_input(
                "request_timeout_secs must be positive",
            ));
        }
        if self.default_zoom > MAX_ZOOM {
            return Err(ExplorerError::invalid_input(format!(
                "default_zoom {} exceeds {MAX_ZOOM}",
                self.default_zoom
            )));
        }
        let (lng, lat) = self.default_center;
        if !(-180.0..=180.0).contains(&lng) || !(-85.0..=85.0).contains(&lat) {
            return Err(ExplorerError::invalid_input(format!(
                "default_center ({lng}, {lat}) is off the map"
            )));
        }
        self.layers
            .validate()
            .map_err(ExplorerError::invalid_input)?;
        crate::query::validate_query(&self.default_query)
    }

    pub fn basemap_tile_url(&self, x: u32, y: u32, zoom: u32) -> String {
        self.basemap_url
            .replace("{z}", &zoom.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn region_source(&self) -> RegionSource {
        match &self.regions_dir {
            Some(dir) => RegionSource::Directory(PathBuf::from(dir)),
            None => RegionSource::Backend,
        }
    }
}
