use std::time::Instant;

use eframe::egui::{self, Align, Key, Layout, Ui};

use crate::graph::ExpansionDirection;

use super::super::ViewModel;
use super::super::graph::BUTTON_ZOOM_STEP;

const DIRECTIONS: [ExpansionDirection; 3] = [
    ExpansionDirection::Both,
    ExpansionDirection::UpstreamOnly,
    ExpansionDirection::DownstreamOnly,
];

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui, now: Instant) {
        ui.horizontal_wrapped(|ui| {
            ui.heading("Provenance Explorer");
            ui.separator();

            ui.label("Root");
            let root_response = ui.add(
                egui::TextEdit::singleline(&mut self.root_input)
                    .hint_text("registry id, e.g. 10378.1/1400")
                    .desired_width(190.0),
            );
            let submitted =
                root_response.lost_focus() && ui.input(|input| input.key_pressed(Key::Enter));
            if submitted || ui.button("Explore").clicked() {
                let root = self.root_input.trim().to_owned();
                self.change_root(&root);
            }

            ui.separator();
            if ui.button("−").on_hover_text("Zoom out").clicked() {
                self.zoom_step(1.0 / BUTTON_ZOOM_STEP, now);
            }
            ui.label(format!("{:.0}%", self.transform.k * 100.0));
            if ui.button("+").on_hover_text("Zoom in").clicked() {
                self.zoom_step(BUTTON_ZOOM_STEP, now);
            }

            ui.separator();
            ui.checkbox(&mut self.show_labels, "Labels")
                .on_hover_text("Show every node and link label.");

            ui.label("Expand");
            for direction in DIRECTIONS {
                let selected = self.accumulator.direction() == direction;
                if ui
                    .selectable_label(selected, direction.label())
                    .on_hover_text("Which half of a double-click expansion is shown.")
                    .clicked()
                {
                    self.accumulator.set_direction(direction);
                }
            }

            ui.separator();
            let pinned = self
                .simulation
                .as_ref()
                .map(|simulation| simulation.pinned_count())
                .unwrap_or(0);
            if ui
                .add_enabled(self.simulation.is_some(), egui::Button::new("Reset physics"))
                .on_hover_text(format!("Release {pinned} pinned node(s) and re-run the layout."))
                .clicked()
            {
                self.reset_physics();
            }
            if ui
                .add_enabled(self.accumulator.root_id().is_some(), egui::Button::new("Restart"))
                .on_hover_text("Drop every expansion and start again from the root.")
                .clicked()
            {
                self.restart();
            }

            let canvas_label = if self.canvas_expanded {
                "Shrink canvas"
            } else {
                "Enlarge canvas"
            };
            if ui.button(canvas_label).clicked() {
                self.canvas_expanded = !self.canvas_expanded;
            }
            if ui.button("Help").clicked() {
                self.show_help = !self.show_help;
            }

            ui.separator();
            ui.add(
                egui::TextEdit::singleline(&mut self.search)
                    .hint_text("search nodes")
                    .desired_width(140.0),
            )
            .on_hover_text("Fuzzy-highlight nodes by handle, subtype or name.");

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                let status = self.accumulator.status();
                let graph = self.accumulator.graph();
                ui.label(format!(
                    "nodes: {}  links: {}  queries: {}/{}  cached: {}",
                    graph.nodes.len(),
                    graph.links.len(),
                    status.settled,
                    status.issued,
                    self.accumulator.cached_queries()
                ));
                if let Some(simulation) = &self.simulation
                    && simulation.is_active()
                {
                    ui.label(format!("layout energy {:.2}", simulation.alpha()));
                }
                if status.loading {
                    ui.spinner();
                }
            });
        });
    }

    pub(in crate::app) fn draw_help(&mut self, ctx: &egui::Context) {
        egui::Window::new("Using the lineage view")
            .open(&mut self.show_help)
            .resizable(false)
            .collapsible(false)
            .show(ctx, |ui| {
                ui.label("Click a node to focus it and show its details.");
                ui.label("Double-click a node to expand its upstream and downstream lineage.");
                ui.label("Drag a node to pin it in place. Reset physics releases every pin.");
                ui.label("Drag the background to pan, scroll to zoom.");
                ui.label("The expand setting chooses which half of new expansions is shown.");
                ui.label("Hidden expansions can be toggled back from the legend panel.");
            });
    }
}
