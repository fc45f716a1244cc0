use std::sync::Arc;
use std::time::Instant;

use eframe::egui::{self, Align, Color32, Context, Layout, RichText};
use tokio::runtime::Runtime;

use crate::graph::GraphAccumulator;
use crate::lineage::ReportService;
use crate::timing::{
    CLICK_DISAMBIGUATION, ClickDisambiguator, Debouncer, RESIZE_DEBOUNCE, ZOOM_PERSIST_DEBOUNCE,
};

use super::super::render_utils::ZoomTransform;
use super::super::{AppConfig, CanvasScratch, ViewModel};

impl ViewModel {
    pub(in crate::app) fn new(
        accumulator: GraphAccumulator,
        reports: Arc<dyn ReportService>,
        config: AppConfig,
    ) -> Self {
        Self {
            accumulator,
            reports,
            report_dir: config.report_dir,
            report_depth: config.report_depth,
            report_job: None,
            report_status: None,
            simulation: None,
            synced_revision: None,
            transform: ZoomTransform::default(),
            committed_transform: ZoomTransform::default(),
            zoom_persist: Debouncer::new(ZOOM_PERSIST_DEBOUNCE),
            canvas: None,
            measured_width: 0.0,
            resize: Debouncer::new(RESIZE_DEBOUNCE),
            canvas_expanded: false,
            show_labels: true,
            show_help: false,
            clicks: ClickDisambiguator::new(CLICK_DISAMBIGUATION),
            drag_pans: false,
            root_input: config.root.unwrap_or_default(),
            search: String::new(),
            dismissed_error: None,
            search_cache: None,
            canvas_scratch: CanvasScratch::default(),
        }
    }

    pub(in crate::app) fn show(&mut self, ctx: &Context, runtime: &Runtime) {
        let now = Instant::now();
        self.advance(now);

        egui::TopBottomPanel::top("control_bar")
            .resizable(false)
            .show(ctx, |ui| self.draw_controls(ui, now));

        if let Some(message) = self.banner_message() {
            egui::TopBottomPanel::top("error_banner")
                .resizable(false)
                .show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        ui.label(
                            RichText::new(format!("Lineage request failed: {message}"))
                                .color(Color32::from_rgb(240, 120, 110)),
                        );
                        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                            if ui.button("Dismiss").clicked() {
                                self.dismiss_banner();
                            }
                        });
                    });
                });
        }

        egui::SidePanel::left("legend")
            .resizable(true)
            .default_width(230.0)
            .show(ctx, |ui| self.draw_legend(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| self.draw_details(ui, runtime));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_canvas(ui, now));

        if self.show_help {
            self.draw_help(ctx);
        }

        let warm = self
            .simulation
            .as_ref()
            .is_some_and(|simulation| simulation.is_active());
        if warm || self.accumulator.status().loading || self.report_job.is_some() {
            ctx.request_repaint();
        } else if let Some(wait) = self.next_timer(now) {
            ctx.request_repaint_after(wait);
        }
    }
}
