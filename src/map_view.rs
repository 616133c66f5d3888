//! Slippy map: base tiles, the scenario overlay stack and region outlines.

use crate::{controller::ExplorerController, geo::MapView};
use eframe::egui::{
    self, Align2, Color32, FontId, Pos2, Rect, Sense, Shape, Stroke, Ui, UiBuilder, Vec2, pos2,
};
use smoke_protocol::TILE_SIZE;

const BACKGROUND: Color32 = Color32::from_rgb(0xaa, 0xd3, 0xdf);

fn alpha_to_u8(opacity: f32) -> u8 {
    (opacity.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn viewport(rect: Rect) -> (f64, f64) {
    (f64::from(rect.width()), f64::from(rect.height()))
}

fn to_screen(view: &MapView, rect: Rect, lng: f64, lat: f64) -> Pos2 {
    let (x, y) = view.project(lng, lat, viewport(rect));
    pos2(rect.left() + x as f32, rect.top() + y as f32)
}

fn to_lnglat(view: &MapView, rect: Rect, pos: Pos2) -> (f64, f64) {
    view.unproject(
        f64::from(pos.x - rect.left()),
        f64::from(pos.y - rect.top()),
        viewport(rect),
    )
}

/// Draws the map into the remaining space and routes pan, zoom, hover and
/// click input to the controller.
pub fn show_map(ui: &mut Ui, controller: &mut ExplorerController) {
    let size = ui.available_size().max(Vec2::splat(64.0));
    let (rect, response) = ui.allocate_exact_size(size, Sense::click_and_drag());

    if response.dragged() {
        let delta = response.drag_delta();
        controller
            .view
            .pan_by(f64::from(delta.x), f64::from(delta.y));
    }
    if response.hovered() {
        let scroll = ui.input(|i| i.smooth_scroll_delta.y);
        if scroll.abs() > 30.0 {
            controller.view.zoom_by(if scroll > 0.0 { 1 } else { -1 });
        }
    }
    if response.double_clicked() {
        controller.view.zoom_by(1);
    }

    let view = controller.view;
    let mut map_ui = ui.new_child(UiBuilder::new().max_rect(rect));
    map_ui.set_clip_rect(rect);
    let painter = map_ui.painter().clone();
    painter.rect_filled(rect, 0.0, BACKGROUND);

    let tile_size = Vec2::splat(TILE_SIZE as f32);
    let tiles = view.visible_tiles(viewport(rect));
    for tile in &tiles {
        let tile_rect = Rect::from_min_size(
            pos2(rect.left() + tile.left as f32, rect.top() + tile.top as f32),
            tile_size,
        );
        egui::Image::new(controller.config().basemap_tile_url(tile.x, tile.y, tile.zoom))
            .paint_at(&map_ui, tile_rect);
    }

    // Bottom of the stack first so later overlays draw on top.
    let ee_base = controller.config().ee_base_url.clone();
    for overlay in controller.overlays().visual().iter() {
        let tint = Color32::from_rgba_unmultiplied(255, 255, 255, alpha_to_u8(overlay.opacity));
        for tile in &tiles {
            let tile_rect = Rect::from_min_size(
                pos2(rect.left() + tile.left as f32, rect.top() + tile.top as f32),
                tile_size,
            );
            egui::Image::new(overlay.tile_url(&ee_base, tile.x, tile.y, tile.zoom))
                .tint(tint)
                .paint_at(&map_ui, tile_rect);
        }
    }

    let hover = response
        .hover_pos()
        .filter(|p| rect.contains(*p))
        .map(|p| to_lnglat(&view, rect, p));
    controller.boundaries_mut().hover_at(hover);
    if response.clicked() {
        if let Some(pos) = response.interact_pointer_pos() {
            let (lng, lat) = to_lnglat(&view, rect, pos);
            controller.boundaries_mut().select_at(lng, lat);
        }
    }

    let boundaries = controller.boundaries();
    let style = boundaries.style;
    let [r, g, b] = style.stroke_rgb;
    let stroke_color = Color32::from_rgb(r, g, b);
    let mut hovered_label = None;
    for region in boundaries.loaded() {
        let highlighted = boundaries.is_highlighted(&region.id);
        let stroke = Stroke::new(style.width_for(highlighted), stroke_color);
        for ring in region.rings() {
            let points: Vec<Pos2> = ring
                .iter()
                .map(|(lng, lat)| to_screen(&view, rect, *lng, *lat))
                .collect();
            if style.fill_opacity > 0.0 {
                painter.add(Shape::convex_polygon(
                    points.clone(),
                    Color32::from_rgba_unmultiplied(r, g, b, alpha_to_u8(style.fill_opacity)),
                    Stroke::NONE,
                ));
            }
            painter.add(Shape::closed_line(points, stroke));
        }
        if highlighted && hover.is_some_and(|(lng, lat)| region.contains(lng, lat)) {
            hovered_label = Some(region.label().to_string());
        }
    }

    painter.text(
        rect.right_bottom() - Vec2::new(4.0, 2.0),
        Align2::RIGHT_BOTTOM,
        "Base map (c) OpenStreetMap contributors",
        FontId::proportional(10.0),
        Color32::from_gray(60),
    );
    if let Some(label) = hovered_label {
        response.on_hover_text_at_pointer(label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opacity_maps_to_alpha() {
        assert_eq!(alpha_to_u8(0.0), 0);
        assert_eq!(alpha_to_u8(0.4), 102);
        assert_eq!(alpha_to_u8(1.5), 255);
    }

    #[test]
    fn screen_and_geo_coordinates_agree() {
        let view = MapView::default();
        let rect = Rect::from_min_size(pos2(100.0, 50.0), Vec2::new(800.0, 600.0));
        let center = to_screen(&view, rect, view.center.0, view.center.1);
        assert!((center.x - 500.0).abs() < 0.01);
        assert!((center.y - 350.0).abs() < 0.01);
        let (lng, lat) = to_lnglat(&view, rect, center);
        assert!((lng - view.center.0).abs() < 1e-3);
        assert!((lat - view.center.1).abs() < 1e-3);
    }
}
