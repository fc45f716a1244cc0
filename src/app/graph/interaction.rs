use std::time::Instant;

use eframe::egui::{self, Pos2, Rect, Ui, Vec2};

use super::super::render_utils::{circle_visible, to_world};
use super::super::ViewModel;

const SCROLL_ZOOM_RATE: f32 = 0.0018;
pub(in crate::app) const BUTTON_ZOOM_STEP: f32 = 1.25;

impl ViewModel {
    pub(in crate::app) fn handle_canvas_zoom(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
        now: Instant,
    ) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let factor = (1.0 + (scroll * SCROLL_ZOOM_RATE)).clamp(0.85, 1.15);
        self.zoom_about(pointer - rect.min, factor, now);
    }

    pub(in crate::app) fn zoom_about(&mut self, anchor: Vec2, factor: f32, now: Instant) {
        self.transform = self.transform.zoom_about(anchor, factor);
        self.zoom_persist.trigger(now);
    }

    pub(in crate::app) fn zoom_step(&mut self, factor: f32, now: Instant) {
        let anchor = self
            .canvas
            .as_ref()
            .map(|canvas| egui::vec2(canvas.width, canvas.height) * 0.5)
            .unwrap_or(Vec2::ZERO);
        self.zoom_about(anchor, factor, now);
    }

    pub(in crate::app) fn pan_by(&mut self, delta: Vec2, now: Instant) {
        if delta == Vec2::ZERO {
            return;
        }
        self.transform = self.transform.translated(delta);
        self.zoom_persist.trigger(now);
    }

    pub(in crate::app) fn handle_canvas_pointer(
        &mut self,
        rect: Rect,
        response: &egui::Response,
        hovered: Option<usize>,
        now: Instant,
    ) {
        let Some(simulation) = self.simulation.as_mut() else {
            return;
        };
        let hovered_id = hovered
            .and_then(|index| simulation.nodes.get(index))
            .map(|node| node.id.clone());

        if response.drag_started_by(egui::PointerButton::Primary) {
            match hovered {
                Some(index) if simulation.dragging().is_none() => {
                    simulation.drag_start(index);
                    self.drag_pans = false;
                }
                _ => self.drag_pans = true,
            }
        }

        if response.dragged_by(egui::PointerButton::Primary) {
            if simulation.dragging().is_some() {
                if let Some(pointer) = response.interact_pointer_pos() {
                    simulation.drag_to(to_world(rect, self.transform, pointer));
                }
            } else if self.drag_pans {
                let delta = response.drag_delta();
                self.pan_by(delta, now);
            }
        } else if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            let delta = response.drag_delta();
            self.pan_by(delta, now);
        }

        if response.drag_stopped() {
            if let Some(simulation) = self.simulation.as_mut()
                && simulation.dragging().is_some()
            {
                simulation.drag_end();
            }
            self.drag_pans = false;
        }

        match &hovered_id {
            Some(id) => self.accumulator.on_hover_enter(id),
            None => self.accumulator.on_hover_exit(now),
        }

        if response.clicked_by(egui::PointerButton::Primary) {
            match hovered_id {
                Some(id) => self.register_node_click(id, now),
                None => {
                    self.clicks.cancel();
                    self.accumulator.deselect_focus_node();
                }
            }
        }
    }

    pub(in crate::app) fn visible_indices_into(
        rect: Rect,
        screen_positions: &[Pos2],
        screen_radii: &[f32],
        visible: &mut Vec<usize>,
    ) {
        visible.clear();
        visible.extend(
            (0..screen_positions.len())
                .filter(|&index| circle_visible(rect, screen_positions[index], screen_radii[index])),
        );
    }

    pub(in crate::app) fn hovered_index(
        ui: &Ui,
        rect: Rect,
        screen_positions: &[Pos2],
        screen_radii: &[f32],
    ) -> Option<usize> {
        let pointer = ui.input(|input| input.pointer.hover_pos())?;
        if !rect.contains(pointer) {
            return None;
        }
        (0..screen_positions.len())
            .filter_map(|index| {
                let distance = screen_positions[index].distance(pointer);
                (distance <= screen_radii[index]).then_some((index, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }
}
