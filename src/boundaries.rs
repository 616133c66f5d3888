use crate::{error::ExplorerError, query::DetailsTransport};
use serde_json::Value;
use std::{fs, path::Path};
use tracing::{debug, info, warn};

pub const REGION_DIR: &str = "static/regions";

pub fn region_path(region_id: &str) -> String {
    format!("{REGION_DIR}/{region_id}.json")
}

/// Region ids are bare file stems: no separators, no `..`, not empty.
pub fn check_region_id(region_id: &str) -> Result<(), ExplorerError> {
    let bad = region_id.is_empty()
        || region_id.contains(['/', '\\'])
        || region_id.contains("..");
    if bad {
        return Err(ExplorerError::invalid_input(format!(
            "Invalid region id '{region_id}'"
        )));
    }
    Ok(())
}

/// Raw boundary text (or the fetch error) for each id, in order.
pub type FetchedRegions = Vec<(String, Result<String, ExplorerError>)>;

/// Blocking fetch of every listed region; safe to run off the UI thread.
pub fn fetch_regions(region_ids: &[String], transport: &dyn DetailsTransport) -> FetchedRegions {
    region_ids
        .iter()
        .map(|id| (id.clone(), transport.get_region(id)))
        .collect()
}

/// Region ids available in a local boundary directory: the stems of its
/// `*.json` files, sorted.
pub fn list_region_ids(dir: &Path) -> Result<Vec<String>, ExplorerError> {
    let mut ids = fs::read_dir(dir)
        .map_err(|e| {
            ExplorerError::new(
                crate::error::ErrorCode::Io,
                format!("Could not list region directory '{}': {e}", dir.display()),
            )
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .filter_map(|path| Some(path.file_stem()?.to_string_lossy().to_string()))
        .collect::<Vec<_>>();
    ids.sort_unstable();
    Ok(ids)
}

/// Closed ring of (longitude, latitude) points.
pub type Ring = Vec<(f64, f64)>;

/// Outer ring first, holes after.
pub type Polygon = Vec<Ring>;

#[derive(Clone, Debug, PartialEq)]
pub struct RegionBoundary {
    pub id: String,
    pub name: Option<String>,
    pub polygons: Vec<Polygon>,
}

impl RegionBoundary {
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        self.polygons.iter().any(|polygon| {
            let mut rings = polygon.iter();
            let Some(outer) = rings.next() else {
                return false;
            };
            ring_contains(outer, lng, lat) && !rings.any(|hole| ring_contains(hole, lng, lat))
        })
    }

    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        self.polygons.iter().flatten()
    }
}

fn ring_contains(ring: &[(f64, f64)], x: f64, y: f64) -> bool {
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Reads a GeoJSON `FeatureCollection`, `Feature` or bare geometry holding
/// `Polygon` / `MultiPolygon` shapes.
pub fn parse_region_geojson(region_id: &str, json: &str) -> Result<RegionBoundary, String> {
    let v: Value = serde_json::from_str(json).map_err(|e| format!("{e}"))?;
    let mut name = None;
    let mut polygons = Vec::new();
    let features: Vec<&Value> = match v["type"].as_str() {
        Some("FeatureCollection") => v["features"]
            .as_array()
            .ok_or("FeatureCollection without features")?
            .iter()
            .collect(),
        Some("Feature") => vec![&v],
        Some(_) => {
            collect_polygons(&v, &mut polygons)?;
            vec![]
        }
        None => return Err("missing GeoJSON type".to_string()),
    };
    for feature in features {
        if name.is_none() {
            name = feature["properties"]["name"].as_str().map(str::to_string);
        }
        collect_polygons(&feature["geometry"], &mut polygons)?;
    }
    if polygons.is_empty() {
        return Err("no polygon geometry found".to_string());
    }
    Ok(RegionBoundary {
        id: region_id.to_string(),
        name,
        polygons,
    })
}

fn collect_polygons(geometry: &Value, out: &mut Vec<Polygon>) -> Result<(), String> {
    match geometry["type"].as_str() {
        Some("Polygon") => out.push(extract_polygon(&geometry["coordinates"])?),
        Some("MultiPolygon") => {
            for polygon in geometry["coordinates"]
                .as_array()
                .ok_or("MultiPolygon without coordinates")?
            {
                out.push(extract_polygon(polygon)?);
            }
        }
        Some("GeometryCollection") => {
            for inner in geometry["geometries"].as_array().into_iter().flatten() {
                collect_polygons(inner, out)?;
            }
        }
        // Points and lines carry no outline to draw.
        _ => {}
    }
    Ok(())
}

fn extract_polygon(coordinates: &Value) -> Result<Polygon, String> {
    coordinates
        .as_array()
        .ok_or("polygon coordinates are not an array")?
        .iter()
        .map(|ring| {
            ring.as_array()
                .ok_or_else(|| "ring is not an array".to_string())?
                .iter()
                .map(|p| {
                    let a = p.as_array().ok_or("position is not an array")?;
                    match (a.first().and_then(Value::as_f64), a.get(1).and_then(Value::as_f64)) {
                        (Some(lng), Some(lat)) => Ok((lng, lat)),
                        _ => Err("position without numeric lng/lat".to_string()),
                    }
                })
                .collect()
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub enum RegionLoadState {
    NotLoaded,
    Loaded(RegionBoundary),
    Failed(String),
}

/// Red outline without fill; the outline widens on hover or selection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundaryStyle {
    pub stroke_rgb: [u8; 3],
    pub stroke_width: f32,
    pub highlight_width: f32,
    pub fill_opacity: f32,
}

impl Default for BoundaryStyle {
    fn default() -> Self {
        Self {
            stroke_rgb: [0xff, 0x00, 0x00],
            stroke_width: 1.0,
            highlight_width: 3.0,
            fill_opacity: 0.0,
        }
    }
}

impl BoundaryStyle {
    pub fn width_for(&self, highlighted: bool) -> f32 {
        if highlighted {
            self.highlight_width
        } else {
            self.stroke_width
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BoundaryLayer {
    regions: Vec<(String, RegionLoadState)>,
    hovered: Option<String>,
    selected: Option<String>,
    pub style: BoundaryStyle,
}

impl BoundaryLayer {
    pub fn new(region_ids: &[String]) -> Self {
        Self {
            regions: region_ids
                .iter()
                .map(|id| (id.clone(), RegionLoadState::NotLoaded))
                .collect(),
            ..Default::default()
        }
    }

    /// Fetches every listed region once. Failures are recorded per region.
    pub fn load_all(&mut self, transport: &dyn DetailsTransport) {
        let ids: Vec<String> = self.region_ids().map(str::to_string).collect();
        self.install(fetch_regions(&ids, transport));
    }

    /// Parses fetched texts into the matching regions. Ids this layer does
    /// not list are ignored.
    pub fn install(&mut self, fetched: FetchedRegions) {
        for (id, outcome) in fetched {
            let Some((_, state)) = self.regions.iter_mut().find(|(r, _)| *r == id) else {
                debug!(region = %id, "ignoring boundary for unlisted region");
                continue;
            };
            *state = match outcome {
                Ok(text) => match parse_region_geojson(&id, &text) {
                    Ok(boundary) => RegionLoadState::Loaded(boundary),
                    Err(e) => {
                        warn!(region = %id, "could not parse boundary: {e}");
                        RegionLoadState::Failed(format!("Could not parse boundary: {e}"))
                    }
                },
                Err(e) => {
                    warn!(region = %id, "could not fetch boundary: {e}");
                    RegionLoadState::Failed(e.message)
                }
            };
        }
        info!(
            loaded = self.loaded().count(),
            listed = self.regions.len(),
            "region boundaries loaded"
        );
    }

    pub fn region_ids(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|(id, _)| id.as_str())
    }

    pub fn state(&self, region_id: &str) -> Option<&RegionLoadState> {
        self.regions
            .iter()
            .find(|(id, _)| id == region_id)
            .map(|(_, state)| state)
    }

    pub fn loaded(&self) -> impl Iterator<Item = &RegionBoundary> {
        self.regions.iter().filter_map(|(_, state)| match state {
            RegionLoadState::Loaded(boundary) => Some(boundary),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.regions.iter().filter_map(|(id, state)| match state {
            RegionLoadState::Failed(message) => Some((id.as_str(), message.as_str())),
            _ => None,
        })
    }

    pub fn region_at(&self, lng: f64, lat: f64) -> Option<&RegionBoundary> {
        self.loaded().find(|b| b.contains(lng, lat))
    }

    /// Updates the hovered region; `None` position clears it.
    pub fn hover_at(&mut self, position: Option<(f64, f64)>) -> Option<&str> {
        self.hovered = position
            .and_then(|(lng, lat)| self.region_at(lng, lat))
            .map(|b| b.id.clone());
        self.hovered.as_deref()
    }

    /// Selects the region under the position; clicking it again deselects.
    pub fn select_at(&mut self, lng: f64, lat: f64) -> Option<&str> {
        let hit = self.region_at(lng, lat).map(|b| b.id.clone());
        self.selected = if hit == self.selected { None } else { hit };
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_highlighted(&self, region_id: &str) -> bool {
        self.hovered.as_deref() == Some(region_id) || self.selected.as_deref() == Some(region_id)
    }
}
