//! Web Mercator math for the slippy map: projection between (longitude,
//! latitude) and viewport pixels, and the set of tiles covering a viewport.

use crate::config::{DEFAULT_CENTER, DEFAULT_ZOOM, MAX_ZOOM};
use serde::{Deserialize, Serialize};
use smoke_protocol::TILE_SIZE;
use std::f64::consts::PI;

pub const MAX_LATITUDE: f64 = 85.051_128_78;

/// Edge length of the whole world in pixels at `zoom`.
pub fn world_size(zoom: u8) -> f64 {
    TILE_SIZE as f64 * f64::from(1u32 << zoom)
}

pub fn lnglat_to_world(lng: f64, lat: f64, zoom: u8) -> (f64, f64) {
    let size = world_size(zoom);
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (lng + 180.0) / 360.0 * size;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
    (x, y)
}

pub fn world_to_lnglat(x: f64, y: f64, zoom: u8) -> (f64, f64) {
    let size = world_size(zoom);
    let lng = x / size * 360.0 - 180.0;
    let n = PI * (1.0 - 2.0 * y / size);
    let lat = n.sinh().atan().to_degrees();
    (lng, lat)
}

/// One tile to draw: its address and the viewport position of its top-left
/// corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TilePlacement {
    pub x: u32,
    pub y: u32,
    pub zoom: u32,
    pub left: f64,
    pub top: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    /// (longitude, latitude)
    pub center: (f64, f64),
    pub zoom: u8,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        }
    }
}

impl MapView {
    pub fn new(center: (f64, f64), zoom: u8) -> Self {
        Self {
            center,
            zoom: zoom.min(MAX_ZOOM),
        }
    }

    fn origin(&self, viewport: (f64, f64)) -> (f64, f64) {
        let (cx, cy) = lnglat_to_world(self.center.0, self.center.1, self.zoom);
        (cx - viewport.0 / 2.0, cy - viewport.1 / 2.0)
    }

    /// Viewport pixel offset of a geographic point.
    pub fn project(&self, lng: f64, lat: f64, viewport: (f64, f64)) -> (f64, f64) {
        let (ox, oy) = self.origin(viewport);
        let (x, y) = lnglat_to_world(lng, lat, self.zoom);
        (x - ox, y - oy)
    }

    pub fn unproject(&self, px: f64, py: f64, viewport: (f64, f64)) -> (f64, f64) {
        let (ox, oy) = self.origin(viewport);
        world_to_lnglat(ox + px, oy + py, self.zoom)
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let (cx, cy) = lnglat_to_world(self.center.0, self.center.1, self.zoom);
        let size = world_size(self.zoom);
        let x = (cx - dx).rem_euclid(size);
        let y = (cy - dy).clamp(0.0, size);
        self.center = world_to_lnglat(x, y, self.zoom);
    }

    pub fn zoom_by(&mut self, steps: i32) {
        let zoom = (i32::from(self.zoom) + steps).clamp(0, i32::from(MAX_ZOOM));
        self.zoom = zoom as u8;
    }

    /// Tiles intersecting the viewport. Columns wrap around the antimeridian;
    /// rows outside the world are skipped.
    pub fn visible_tiles(&self, viewport: (f64, f64)) -> Vec<TilePlacement> {
        let tile = TILE_SIZE as f64;
        let count = 1i64 << self.zoom;
        let (ox, oy) = self.origin(viewport);
        let first_col = (ox / tile).floor() as i64;
        let last_col = ((ox + viewport.0) / tile).ceil() as i64;
        let first_row = (oy / tile).floor().max(0.0) as i64;
        let last_row = (((oy + viewport.1) / tile).ceil() as i64).min(count);

        let mut tiles = Vec::new();
        for row in first_row..last_row {
            for col in first_col..last_col {
                tiles.push(TilePlacement {
                    x: col.rem_euclid(count) as u32,
                    y: row as u32,
                    zoom: u32::from(self.zoom),
                    left: col as f64 * tile - ox,
                    top: row as f64 * tile - oy,
                });
            }
        }
        tiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn world_origin_and_center() {
        assert_eq!(lnglat_to_world(-180.0, MAX_LATITUDE, 0).0, 0.0);
        let (x, y) = lnglat_to_world(0.0, 0.0, 1);
        assert!(close(x, 256.0) && close(y, 256.0));
    }

    #[test]
    fn projection_inverts() {
        let (x, y) = lnglat_to_world(110.82, 3.35, 5);
        let (lng, lat) = world_to_lnglat(x, y, 5);
        assert!(close(lng, 110.82));
        assert!(close(lat, 3.35));
    }

    #[test]
    fn center_projects_to_viewport_middle() {
        let view = MapView::default();
        let (px, py) = view.project(110.82, 3.35, (800.0, 600.0));
        assert!(close(px, 400.0) && close(py, 300.0));
        let (lng, lat) = view.unproject(400.0, 300.0, (800.0, 600.0));
        assert!(close(lng, 110.82) && close(lat, 3.35));
    }

    #[test]
    fn default_view_covers_borneo_tiles() {
        let tiles = MapView::default().visible_tiles((512.0, 512.0));
        assert!(!tiles.is_empty());
        assert!(tiles.iter().all(|t| t.zoom == 5));
        // Borneo sits in column 25 at zoom 5.
        assert!(tiles.iter().any(|t| t.x == 25 && t.y == 15));
        assert!(tiles.len() <= 9);
    }

    #[test]
    fn columns_wrap_and_rows_stop_at_the_poles() {
        let view = MapView::new((179.0, 80.0), 1);
        let tiles = view.visible_tiles((1024.0, 1024.0));
        assert!(tiles.iter().all(|t| t.x < 2 && t.y < 2));
        assert!(tiles.iter().any(|t| t.x == 0));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut view = MapView::new((0.0, 0.0), 40);
        assert_eq!(view.zoom, MAX_ZOOM);
        view.zoom_by(-100);
        assert_eq!(view.zoom, 0);
    }

    #[test]
    fn panning_moves_center_against_drag() {
        let mut view = MapView::default();
        view.pan_by(-256.0, 0.0);
        assert!(view.center.0 > 110.82);
        assert!(close(view.center.1, 3.35));
    }
}
