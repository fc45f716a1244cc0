use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2, vec2};

use crate::lineage::ItemSubtype;

pub(super) const ZOOM_MIN: f32 = 0.3;
pub(super) const ZOOM_MAX: f32 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct ZoomTransform {
    pub x: f32,
    pub y: f32,
    pub k: f32,
}

impl Default for ZoomTransform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            k: 1.0,
        }
    }
}

impl ZoomTransform {
    pub(super) fn world_to_screen(self, world: Vec2) -> Vec2 {
        vec2(world.x * self.k + self.x, world.y * self.k + self.y)
    }

    pub(super) fn screen_to_world(self, local: Vec2) -> Vec2 {
        vec2((local.x - self.x) / self.k, (local.y - self.y) / self.k)
    }

    pub(super) fn zoom_about(self, anchor: Vec2, factor: f32) -> Self {
        let world = self.screen_to_world(anchor);
        let k = (self.k * factor).clamp(ZOOM_MIN, ZOOM_MAX);
        Self {
            x: anchor.x - world.x * k,
            y: anchor.y - world.y * k,
            k,
        }
    }

    pub(super) fn translated(self, delta: Vec2) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
            k: self.k,
        }
    }
}

pub(super) fn to_screen(rect: Rect, transform: ZoomTransform, world: Vec2) -> Pos2 {
    rect.min + transform.world_to_screen(world)
}

pub(super) fn to_world(rect: Rect, transform: ZoomTransform, screen: Pos2) -> Vec2 {
    transform.screen_to_world(screen - rect.min)
}

pub(super) fn subtype_color(subtype: ItemSubtype) -> Color32 {
    match subtype {
        ItemSubtype::Create => Color32::from_rgb(236, 153, 82),
        ItemSubtype::Version => Color32::from_rgb(214, 120, 72),
        ItemSubtype::ModelRun => Color32::from_rgb(232, 96, 96),
        ItemSubtype::Study => Color32::from_rgb(201, 112, 190),
        ItemSubtype::Person => Color32::from_rgb(240, 205, 96),
        ItemSubtype::Organisation => Color32::from_rgb(198, 170, 70),
        ItemSubtype::Model => Color32::from_rgb(96, 178, 240),
        ItemSubtype::ModelRunWorkflowTemplate => Color32::from_rgb(130, 140, 235),
        ItemSubtype::DatasetTemplate => Color32::from_rgb(98, 206, 196),
        ItemSubtype::Dataset => Color32::from_rgb(110, 200, 120),
    }
}

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub(super) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor) as u8,
        (color.g() as f32 * factor) as u8,
        (color.b() as f32 * factor) as u8,
        (color.a() as f32 * (0.45 + (factor * 0.55))) as u8,
    )
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, transform: ZoomTransform) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = (56.0 * transform.k.clamp(0.6, 1.8)).max(20.0);
    let origin = rect.min + vec2(transform.x, transform.y);
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

pub(super) fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let min_x = start.x.min(end.x) - padding;
    let max_x = start.x.max(end.x) + padding;
    let min_y = start.y.min(end.y) - padding;
    let max_y = start.y.max(end.y) + padding;

    if max_x < rect.left() || min_x > rect.right() || max_y < rect.top() || min_y > rect.bottom() {
        return false;
    }

    if rect.contains(start) || rect.contains(end) {
        return true;
    }

    let top_left = rect.left_top();
    let top_right = rect.right_top();
    let bottom_left = rect.left_bottom();
    let bottom_right = rect.right_bottom();

    segments_intersect(start, end, top_left, top_right)
        || segments_intersect(start, end, top_right, bottom_right)
        || segments_intersect(start, end, bottom_right, bottom_left)
        || segments_intersect(start, end, bottom_left, top_left)
}

fn segments_intersect(a1: Pos2, a2: Pos2, b1: Pos2, b2: Pos2) -> bool {
    fn cross(o: Pos2, a: Pos2, b: Pos2) -> f32 {
        let oa = a - o;
        let ob = b - o;
        (oa.x * ob.y) - (oa.y * ob.x)
    }

    let c1 = cross(a1, a2, b1);
    let c2 = cross(a1, a2, b2);
    let c3 = cross(b1, b2, a1);
    let c4 = cross(b1, b2, a2);

    (c1 <= 0.0 && c2 >= 0.0 || c1 >= 0.0 && c2 <= 0.0)
        && (c3 <= 0.0 && c4 >= 0.0 || c3 >= 0.0 && c4 <= 0.0)
}

pub(super) fn trim_segment(start: Pos2, end: Pos2, start_radius: f32, end_radius: f32) -> Option<(Pos2, Pos2)> {
    let offset = end - start;
    let length = offset.length();
    if length <= start_radius + end_radius {
        return None;
    }
    let direction = offset / length;
    Some((start + direction * start_radius, end - direction * end_radius))
}
