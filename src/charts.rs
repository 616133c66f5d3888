//! Painter-drawn charts for the side panel.

use crate::{
    layers::Legend,
    scenario::{ContributionTable, MonthlyExposure, MortalityTable},
};
use eframe::egui::{Align2, Color32, FontId, Pos2, Rect, Sense, Shape, Stroke, Ui, Vec2, pos2};
use std::f32::consts::TAU;

const PALETTE: [Color32; 8] = [
    Color32::from_rgb(0x33, 0x66, 0xcc),
    Color32::from_rgb(0xdc, 0x39, 0x12),
    Color32::from_rgb(0xff, 0x99, 0x00),
    Color32::from_rgb(0x10, 0x96, 0x18),
    Color32::from_rgb(0x99, 0x00, 0x99),
    Color32::from_rgb(0x00, 0x99, 0xc6),
    Color32::from_rgb(0xdd, 0x44, 0x77),
    Color32::from_rgb(0x66, 0xaa, 0x00),
];

const AXIS: Color32 = Color32::from_gray(140);

fn palette(i: usize) -> Color32 {
    PALETTE[i % PALETTE.len()]
}

/// Maps `values` onto `rect`: first value at the left edge, last at the right,
/// `range` spanning bottom to top.
pub fn scale_points(values: &[f64], range: (f64, f64), rect: Rect) -> Vec<Pos2> {
    let (lo, hi) = range;
    let span = if hi > lo { hi - lo } else { 1.0 };
    let step = if values.len() > 1 {
        rect.width() / (values.len() - 1) as f32
    } else {
        0.0
    };
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let t = ((v - lo) / span) as f32;
            pos2(rect.left() + step * i as f32, rect.bottom() - t * rect.height())
        })
        .collect()
}

pub fn pie_chart(ui: &mut Ui, table: &ContributionTable) {
    ui.strong(table.title());
    let slices = table.slices();
    if slices.is_empty() {
        ui.weak("No contributions");
        return;
    }
    let (rect, _) = ui.allocate_exact_size(Vec2::splat(140.0), Sense::hover());
    let painter = ui.painter_at(rect);
    let center = rect.center();
    let radius = rect.width() * 0.48;

    let mut start = -TAU / 4.0;
    for (i, slice) in slices.iter().enumerate() {
        let sweep = slice.fraction as f32 * TAU;
        let steps = ((sweep / TAU) * 64.0).ceil().max(1.0) as usize;
        for s in 0..steps {
            let a0 = start + sweep * s as f32 / steps as f32;
            let a1 = start + sweep * (s + 1) as f32 / steps as f32;
            painter.add(Shape::convex_polygon(
                vec![
                    center,
                    center + radius * Vec2::angled(a0),
                    center + radius * Vec2::angled(a1),
                ],
                palette(i),
                Stroke::NONE,
            ));
        }
        start += sweep;
    }

    for (i, slice) in slices.iter().enumerate() {
        ui.horizontal(|ui| {
            let (swatch, _) = ui.allocate_exact_size(Vec2::splat(10.0), Sense::hover());
            ui.painter().rect_filled(swatch, 0.0, palette(i));
            ui.label(format!("{} ({:.1}%)", slice.label, slice.fraction * 100.0));
        });
    }
}

pub fn timeseries_chart(ui: &mut Ui, series: &[MonthlyExposure], range: Option<(f64, f64)>) {
    ui.strong("Monthly PM2.5 exposure");
    if series.is_empty() {
        ui.weak("No time series");
        return;
    }
    let width = ui.available_width().max(160.0);
    let (rect, _) = ui.allocate_exact_size(Vec2::new(width, 120.0), Sense::hover());
    let painter = ui.painter_at(rect);
    let plot = rect.shrink2(Vec2::new(8.0, 14.0));

    let values: Vec<f64> = series.iter().map(|m| m.value).collect();
    let (lo, hi) = range.map_or((0.0, 0.0), |(lo, hi)| (lo.min(0.0), hi.max(0.0)));
    painter.line_segment([plot.left_bottom(), plot.right_bottom()], Stroke::new(1.0, AXIS));
    painter.line_segment([plot.left_bottom(), plot.left_top()], Stroke::new(1.0, AXIS));

    let points = scale_points(&values, (lo, hi), plot);
    painter.add(Shape::line(points.clone(), Stroke::new(2.0, palette(0))));
    for (point, month) in points.iter().zip(series) {
        painter.circle_filled(*point, 2.5, palette(0));
        painter.text(
            pos2(point.x, rect.bottom()),
            Align2::CENTER_BOTTOM,
            month.label.chars().next().unwrap_or(' '),
            FontId::proportional(9.0),
            AXIS,
        );
    }
    painter.text(
        plot.left_top(),
        Align2::LEFT_BOTTOM,
        format!("{hi:.2}"),
        FontId::proportional(9.0),
        AXIS,
    );
}

/// Central estimate as bars, lower and upper bounds as whiskers.
pub fn mortality_chart(ui: &mut Ui, table: &MortalityTable) {
    ui.strong("Attributable deaths");
    if table.is_empty() {
        ui.weak("No mortality estimate");
        return;
    }
    let width = ui.available_width().max(160.0);
    let (rect, _) = ui.allocate_exact_size(Vec2::new(width, 120.0), Sense::hover());
    let painter = ui.painter_at(rect);
    let plot = rect.shrink2(Vec2::new(8.0, 6.0));
    let hi = table
        .groups
        .iter()
        .map(|(_, e)| e.upper.max(e.central))
        .fold(0.0, f64::max)
        .max(f64::EPSILON);
    let slot = plot.width() / table.groups.len() as f32;
    let y = |v: f64| plot.bottom() - (v / hi) as f32 * plot.height();

    for (i, (group, estimate)) in table.groups.iter().enumerate() {
        let x = plot.left() + slot * (i as f32 + 0.5);
        let bar = Rect::from_min_max(
            pos2(x - slot * 0.3, y(estimate.central)),
            pos2(x + slot * 0.3, plot.bottom()),
        );
        painter.rect_filled(bar, 0.0, palette(i));
        let whisker = Stroke::new(1.0, Color32::BLACK);
        painter.line_segment([pos2(x, y(estimate.lower)), pos2(x, y(estimate.upper))], whisker);
        for v in [estimate.lower, estimate.upper] {
            painter.line_segment([pos2(x - 4.0, y(v)), pos2(x + 4.0, y(v))], whisker);
        }
        let response = ui.interact(bar, ui.id().with(("mortality", i)), Sense::hover());
        response.on_hover_text(format!(
            "{}: {:.0} ({:.0} - {:.0})",
            group.label(),
            estimate.central,
            estimate.lower,
            estimate.upper
        ));
    }
    painter.line_segment([plot.left_bottom(), plot.right_bottom()], Stroke::new(1.0, AXIS));
    ui.label(format!("Total: {}", table.range_label()));
}

pub fn legend_view(ui: &mut Ui, legend: &Legend) {
    ui.small(legend.title);
    if let (true, Some(low), Some(high)) =
        (legend.continuous, legend.entries.first(), legend.entries.last())
    {
        let width = ui.available_width().clamp(80.0, 200.0);
        let (rect, _) = ui.allocate_exact_size(Vec2::new(width, 10.0), Sense::hover());
        let steps = 24;
        for s in 0..steps {
            let t = s as f32 / (steps - 1) as f32;
            let color = Color32::from_rgb(
                lerp_u8(low.rgb[0], high.rgb[0], t),
                lerp_u8(low.rgb[1], high.rgb[1], t),
                lerp_u8(low.rgb[2], high.rgb[2], t),
            );
            let x0 = rect.left() + rect.width() * s as f32 / steps as f32;
            let x1 = rect.left() + rect.width() * (s + 1) as f32 / steps as f32;
            ui.painter().rect_filled(
                Rect::from_min_max(pos2(x0, rect.top()), pos2(x1, rect.bottom())),
                0.0,
                color,
            );
        }
        ui.horizontal(|ui| {
            ui.small(low.label);
            ui.add_space((width - 40.0).max(0.0));
            ui.small(high.label);
        });
        return;
    }
    for entry in &legend.entries {
        ui.horizontal(|ui| {
            let (swatch, _) = ui.allocate_exact_size(Vec2::splat(12.0), Sense::hover());
            ui.painter().rect_filled(
                swatch,
                2.0,
                Color32::from_rgb(entry.rgb[0], entry.rgb[1], entry.rgb[2]),
            );
            ui.label(entry.label);
        });
    }
}

fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8
}
