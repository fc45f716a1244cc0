use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use eframe::egui::{Context, Pos2};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::graph::GraphAccumulator;
use crate::lineage::{
    FetchDriver, ItemService, LineageDispatcher, LineageService, ReportService,
};
use crate::timing::{ClickAction, ClickDisambiguator, Debouncer};

mod graph;
mod highlight;
mod physics;
mod render_utils;
mod ui;

use graph::SearchMatchCache;
use physics::Simulation;
use render_utils::ZoomTransform;

const CANVAS_HEIGHT_DEFAULT: f32 = 600.0;
const CANVAS_HEIGHT_EXPANDED: f32 = 1000.0;

pub struct AppConfig {
    pub root: Option<String>,
    pub report_dir: PathBuf,
    pub report_depth: u32,
}

pub struct Services {
    pub lineage: Arc<dyn LineageService>,
    pub items: Arc<dyn ItemService>,
    pub reports: Arc<dyn ReportService>,
}

pub struct ProvenanceApp {
    runtime: Runtime,
    view: ViewModel,
}

struct ReportJob {
    id: String,
    rx: Receiver<Result<PathBuf, String>>,
}

enum ReportStatus {
    Running(String),
    Written(PathBuf),
    Failed(String),
}

struct CanvasSize {
    width: f32,
    height: f32,
}

struct ViewModel {
    accumulator: GraphAccumulator,
    reports: Arc<dyn ReportService>,
    report_dir: PathBuf,
    report_depth: u32,
    report_job: Option<ReportJob>,
    report_status: Option<ReportStatus>,
    simulation: Option<Simulation>,
    synced_revision: Option<u64>,
    transform: ZoomTransform,
    committed_transform: ZoomTransform,
    zoom_persist: Debouncer,
    canvas: Option<CanvasSize>,
    measured_width: f32,
    resize: Debouncer,
    canvas_expanded: bool,
    show_labels: bool,
    show_help: bool,
    clicks: ClickDisambiguator<String>,
    drag_pans: bool,
    root_input: String,
    search: String,
    dismissed_error: Option<String>,
    search_cache: Option<SearchMatchCache>,
    canvas_scratch: CanvasScratch,
}

#[derive(Default)]
struct CanvasScratch {
    screen_positions: Vec<Pos2>,
    screen_radii: Vec<f32>,
    visible_indices: Vec<usize>,
}

impl ProvenanceApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        services: Services,
        runtime: Runtime,
    ) -> Self {
        let repaint = cc.egui_ctx.clone();
        let driver = FetchDriver::new(
            runtime.handle().clone(),
            Arc::new(move || repaint.request_repaint()),
        );
        let dispatcher =
            LineageDispatcher::new(services.lineage, services.items).with_driver(driver);
        let mut accumulator = GraphAccumulator::new(dispatcher);
        accumulator.set_root(config.root.as_deref());

        Self {
            runtime,
            view: ViewModel::new(accumulator, services.reports, config),
        }
    }
}

impl eframe::App for ProvenanceApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.view.show(ctx, &self.runtime);
    }
}

impl Drop for ProvenanceApp {
    fn drop(&mut self) {
        self.view.teardown_simulation();
        self.view.resize.cancel();
        self.view.zoom_persist.cancel();
        self.view.clicks.cancel();
        info!("provenance explorer shutting down");
    }
}

impl ViewModel {
    fn advance(&mut self, now: Instant) {
        self.poll_report_job();

        self.accumulator.poll_timers(now);

        if let Some(ClickAction::Single(id)) = self.clicks.poll(now) {
            self.accumulator.select_focus_node(&id);
        }

        if let Some(event) = self.accumulator.refresh()
            && event.updated
        {
            debug!(structural = event.changed, "lineage graph updated");
        }

        if self.resize.poll(now)
            && let Some(canvas) = &mut self.canvas
        {
            canvas.width = self.measured_width;
            self.recenter();
        }

        if self.zoom_persist.poll(now) {
            self.committed_transform = self.transform;
            self.recenter();
        }

        self.sync_simulation();
    }

    // Field-only updates are applied to the drawn nodes without reheating.
    fn sync_simulation(&mut self) {
        let revision = self.accumulator.content_revision();
        let Some(simulation) = self.simulation.as_mut() else {
            return;
        };
        if self.synced_revision == Some(revision) {
            return;
        }

        if simulation.merge_graph_data(self.accumulator.graph()) {
            simulation.reheat();
        }
        self.synced_revision = Some(revision);
    }

    fn measure_canvas(&mut self, width: f32, height: f32, now: Instant) {
        if !width.is_finite() || width <= 0.0 {
            return;
        }

        match &mut self.canvas {
            None => {
                self.canvas = Some(CanvasSize { width, height });
                self.measured_width = width;
            }
            Some(canvas) => {
                if (canvas.height - height).abs() > f32::EPSILON {
                    canvas.height = height;
                    self.recenter();
                }
                if (self.measured_width - width).abs() > 0.5 {
                    self.measured_width = width;
                    self.resize.trigger(now);
                }
            }
        }

        if self.simulation.is_none()
            && let Some(center) = self.center_target()
        {
            self.simulation = Some(Simulation::new(center));
            self.synced_revision = None;
            self.sync_simulation();
        }
    }

    fn center_target(&self) -> Option<eframe::egui::Vec2> {
        let canvas = self.canvas.as_ref()?;
        Some(
            self.committed_transform
                .screen_to_world(eframe::egui::vec2(canvas.width, canvas.height) * 0.5),
        )
    }

    fn recenter(&mut self) {
        if let Some(center) = self.center_target()
            && let Some(simulation) = &mut self.simulation
        {
            simulation.set_center(center);
        }
    }

    // Clamped to the panel height; the central panel does not scroll.
    fn canvas_height(&self, available: f32) -> f32 {
        let wanted = if self.canvas_expanded {
            CANVAS_HEIGHT_EXPANDED
        } else {
            CANVAS_HEIGHT_DEFAULT
        };
        if available.is_finite() && available > 0.0 {
            wanted.min(available)
        } else {
            wanted
        }
    }

    fn teardown_simulation(&mut self) {
        if let Some(mut simulation) = self.simulation.take() {
            simulation.dispose();
        }
        self.synced_revision = None;
    }

    fn change_root(&mut self, root: &str) {
        let root = root.trim();
        if root.is_empty() {
            return;
        }
        if self.accumulator.set_root(Some(root)) {
            self.teardown_simulation();
            self.clicks.cancel();
            self.dismissed_error = None;
        }
    }

    fn restart(&mut self) {
        self.accumulator.restart();
        self.teardown_simulation();
        self.clicks.cancel();
        self.dismissed_error = None;
    }

    fn reset_physics(&mut self) {
        if let Some(simulation) = &mut self.simulation {
            info!(pinned = simulation.pinned_count(), "releasing pinned nodes");
            simulation.reset_physics();
        }
    }

    fn register_node_click(&mut self, id: String, now: Instant) {
        match self.clicks.register(id, now) {
            Some(ClickAction::Double(id)) => self.accumulator.expand_node(&id),
            Some(ClickAction::Single(id)) => self.accumulator.select_focus_node(&id),
            None => {}
        }
    }

    fn start_report(&mut self, runtime: &Runtime, ctx: &Context, id: &str) {
        if self.report_job.is_some() {
            return;
        }
        let Some(node) = self.accumulator.graph().node(id) else {
            return;
        };

        let pending = self
            .reports
            .generate_report(id, node.item_subtype, self.report_depth);
        let dir = self.report_dir.clone();
        let report_id = id.to_owned();
        let repaint = ctx.clone();
        let (tx, rx) = std::sync::mpsc::channel();

        runtime.spawn(async move {
            let result = match pending.await {
                Ok(bytes) => ui::write_report(&dir, &report_id, &bytes)
                    .map_err(|error| format!("{error:#}")),
                Err(error) => Err(error.to_string()),
            };
            let _ = tx.send(result);
            repaint.request_repaint();
        });

        info!(id, "generating lineage report");
        self.report_status = Some(ReportStatus::Running(id.to_owned()));
        self.report_job = Some(ReportJob {
            id: id.to_owned(),
            rx,
        });
    }

    fn poll_report_job(&mut self) {
        let Some(job) = self.report_job.take() else {
            return;
        };

        match job.rx.try_recv() {
            Ok(Ok(path)) => {
                info!(id = %job.id, path = %path.display(), "report written");
                self.report_status = Some(ReportStatus::Written(path));
            }
            Ok(Err(error)) => {
                warn!(id = %job.id, %error, "report generation failed");
                self.report_status = Some(ReportStatus::Failed(error));
            }
            Err(TryRecvError::Empty) => {
                self.report_job = Some(job);
            }
            Err(TryRecvError::Disconnected) => {
                self.report_status =
                    Some(ReportStatus::Failed("report worker disconnected".to_owned()));
            }
        }
    }

    fn banner_message(&self) -> Option<String> {
        let message = self.accumulator.status().error_message.as_ref()?;
        if self.dismissed_error.as_ref() == Some(message) {
            return None;
        }
        Some(message.clone())
    }

    fn dismiss_banner(&mut self) {
        self.dismissed_error = self.accumulator.status().error_message.clone();
    }

    fn next_timer(&self, now: Instant) -> Option<Duration> {
        [
            self.clicks.remaining(now),
            self.resize.remaining(now),
            self.zoom_persist.remaining(now),
            self.accumulator
                .hover_exit_pending()
                .then_some(Duration::from_millis(50)),
        ]
        .into_iter()
        .flatten()
        .min()
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;
    use futures::future::BoxFuture;

    use super::*;
    use crate::lineage::{
        FetchError, FixtureRegistry, GraphLink, GraphNode, ItemCategory, ItemSubtype,
        LineageFragment, LineageRequest, LineageResponse, QueryType, ResponseStatus,
        SAMPLE_REGISTRY,
    };

    fn view_model() -> ViewModel {
        let registry = Arc::new(FixtureRegistry::parse(SAMPLE_REGISTRY).expect("sample"));
        let dispatcher = LineageDispatcher::new(registry.clone(), registry.clone());
        let accumulator = GraphAccumulator::new(dispatcher);
        ViewModel::new(
            accumulator,
            registry,
            AppConfig {
                root: None,
                report_dir: PathBuf::from("reports"),
                report_depth: 2,
            },
        )
    }

    async fn settle(view: &ViewModel) {
        for fragment in view.accumulator.unsettled() {
            let _ = fragment.await;
        }
    }

    #[test]
    fn no_simulation_until_width_is_known() {
        let now = Instant::now();
        let mut view = view_model();
        view.measure_canvas(f32::NAN, 600.0, now);
        assert!(view.simulation.is_none());
        view.measure_canvas(0.0, 600.0, now);
        assert!(view.simulation.is_none());
        view.measure_canvas(800.0, 600.0, now);
        let simulation = view.simulation.as_ref().expect("created once sized");
        assert_eq!(simulation.center(), eframe::egui::vec2(400.0, 300.0));
    }

    #[test]
    fn width_changes_are_debounced() {
        let now = Instant::now();
        let mut view = view_model();
        view.measure_canvas(800.0, 600.0, now);

        view.measure_canvas(1000.0, 600.0, now + Duration::from_millis(10));
        view.advance(now + Duration::from_millis(100));
        assert_eq!(view.simulation.as_ref().map(Simulation::center).map(|c| c.x), Some(400.0));

        view.advance(now + Duration::from_millis(260));
        assert_eq!(view.simulation.as_ref().map(Simulation::center).map(|c| c.x), Some(500.0));
    }

    #[tokio::test]
    async fn structural_merge_reheats_but_focus_does_not() {
        let now = Instant::now();
        let mut view = view_model();
        view.measure_canvas(800.0, 600.0, now);
        view.change_root("10378.1/1600");
        view.measure_canvas(800.0, 600.0, now);
        settle(&view).await;
        view.advance(now);

        let simulation = view.simulation.as_mut().expect("simulation");
        assert!(simulation.nodes.len() > 1);
        while simulation.tick() {}
        let cooled = simulation.alpha();

        view.accumulator.select_focus_node("10378.1/1600");
        view.show_labels = !view.show_labels;
        view.advance(now);
        assert_eq!(view.simulation.as_ref().map(Simulation::alpha), Some(cooled));

        view.accumulator.expand_node("10378.1/1500");
        settle(&view).await;
        view.advance(now);
        assert_eq!(view.simulation.as_ref().map(Simulation::alpha), Some(1.0));
    }

    #[tokio::test]
    async fn single_click_focuses_after_window_and_double_click_expands() {
        let now = Instant::now();
        let mut view = view_model();
        view.change_root("10378.1/1600");
        settle(&view).await;
        view.advance(now);
        let issued = view.accumulator.expansion_count();

        view.register_node_click("10378.1/1500".to_owned(), now);
        view.advance(now + Duration::from_millis(100));
        assert_eq!(view.accumulator.focused(), None);
        view.advance(now + Duration::from_millis(450));
        assert_eq!(view.accumulator.focused(), Some("10378.1/1500"));
        assert_eq!(view.accumulator.expansion_count(), issued);

        let later = now + Duration::from_secs(2);
        view.register_node_click("10378.1/1400".to_owned(), later);
        view.register_node_click("10378.1/1400".to_owned(), later + Duration::from_millis(200));
        view.advance(later + Duration::from_secs(1));
        assert_eq!(view.accumulator.expansion_count(), issued + 2);
        assert_eq!(view.accumulator.focused(), Some("10378.1/1500"));
    }

    struct Unreachable;

    impl LineageService for Unreachable {
        fn fetch_lineage(
            &self,
            _start_id: &str,
            _request: LineageRequest,
        ) -> BoxFuture<'static, Result<LineageResponse, FetchError>> {
            async { Err(FetchError::Transport("connection refused".to_owned())) }.boxed()
        }
    }

    #[tokio::test]
    async fn fetch_failures_raise_a_banner_without_dropping_the_canvas() {
        let now = Instant::now();
        let registry = Arc::new(FixtureRegistry::parse(SAMPLE_REGISTRY).expect("sample"));
        let dispatcher = LineageDispatcher::new(Arc::new(Unreachable), registry.clone());
        let mut view = ViewModel::new(
            GraphAccumulator::new(dispatcher),
            registry,
            AppConfig {
                root: Some("10378.1/1600".to_owned()),
                report_dir: PathBuf::from("reports"),
                report_depth: 2,
            },
        );
        view.accumulator.set_root(Some("10378.1/1600"));
        view.measure_canvas(800.0, 600.0, now);
        settle(&view).await;
        view.advance(now);

        assert_eq!(
            view.banner_message().as_deref(),
            Some("request failed: connection refused")
        );
        view.dismiss_banner();
        assert_eq!(view.banner_message(), None);
        assert!(view.simulation.is_some());
    }

    #[test]
    fn blank_root_input_keeps_the_current_exploration() {
        let now = Instant::now();
        let mut view = view_model();
        view.measure_canvas(800.0, 600.0, now);
        view.change_root("10378.1/1600");
        view.measure_canvas(800.0, 600.0, now);
        let issued = view.accumulator.expansion_count();

        view.change_root("   ");
        view.change_root("");
        assert_eq!(view.accumulator.root_id(), Some("10378.1/1600"));
        assert_eq!(view.accumulator.expansion_count(), issued);
        assert!(view.simulation.is_some());
    }

    #[test]
    fn canvas_height_fits_the_panel() {
        let mut view = view_model();
        assert_eq!(view.canvas_height(900.0), CANVAS_HEIGHT_DEFAULT);
        view.canvas_expanded = true;
        assert_eq!(view.canvas_height(1200.0), CANVAS_HEIGHT_EXPANDED);
        assert_eq!(view.canvas_height(820.0), 820.0);
        assert_eq!(view.canvas_height(f32::INFINITY), CANVAS_HEIGHT_EXPANDED);
    }

    #[tokio::test]
    async fn search_matches_pick_up_names_loaded_later() {
        let now = Instant::now();
        let mut view = view_model();
        view.change_root("10378.1/1600");
        settle(&view).await;
        view.advance(now);

        view.search = "Okafor".to_owned();
        let before = view.cached_search_matches().expect("query is set");
        assert!(!before.contains("10378.1/1001"));

        view.accumulator.load_details("10378.1/1001");
        view.accumulator.settle_details().await;
        let after = view.cached_search_matches().expect("query is set");
        assert!(after.contains("10378.1/1001"));
    }

    // Both seed directions return the same pair, disagreeing on the subtype of A.
    struct ConflictingSubtypes;

    fn seed_node(id: &str, subtype: ItemSubtype) -> GraphNode {
        GraphNode {
            id: id.to_owned(),
            item_category: ItemCategory::Entity,
            item_subtype: subtype,
            details: None,
        }
    }

    impl LineageService for ConflictingSubtypes {
        fn fetch_lineage(
            &self,
            _start_id: &str,
            request: LineageRequest,
        ) -> BoxFuture<'static, Result<LineageResponse, FetchError>> {
            let subtype = if request == QueryType::ExploreUpstream.request() {
                ItemSubtype::Dataset
            } else {
                ItemSubtype::Model
            };
            let fragment = LineageFragment {
                nodes: vec![
                    seed_node("X", ItemSubtype::Dataset),
                    seed_node("A", subtype),
                ],
                links: vec![GraphLink {
                    source: "A".to_owned(),
                    target: "X".to_owned(),
                    kind: "used".to_owned(),
                }],
            };
            async move {
                Ok(LineageResponse {
                    status: ResponseStatus::ok(),
                    graph: Some(fragment),
                })
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn field_updates_reach_the_drawn_graph_without_reheat() {
        let now = Instant::now();
        let registry = Arc::new(FixtureRegistry::parse(SAMPLE_REGISTRY).expect("sample"));
        let dispatcher = LineageDispatcher::new(Arc::new(ConflictingSubtypes), registry.clone());
        let mut view = ViewModel::new(
            GraphAccumulator::new(dispatcher),
            registry,
            AppConfig {
                root: None,
                report_dir: PathBuf::from("reports"),
                report_depth: 2,
            },
        );
        view.change_root("X");
        view.measure_canvas(800.0, 600.0, now);
        settle(&view).await;
        view.advance(now);

        let drawn_subtype = |view: &ViewModel| {
            view.simulation.as_ref().and_then(|simulation| {
                simulation
                    .nodes
                    .iter()
                    .find(|node| node.id == "A")
                    .map(|node| node.subtype)
            })
        };
        assert_eq!(drawn_subtype(&view), Some(ItemSubtype::Dataset));

        let simulation = view.simulation.as_mut().expect("simulation");
        while simulation.tick() {}
        let cooled = simulation.alpha();

        view.accumulator.set_expansion_visible(0, false);
        view.advance(now);
        assert_eq!(
            view.accumulator.graph().node("A").map(|node| node.item_subtype),
            Some(ItemSubtype::Model)
        );
        assert_eq!(drawn_subtype(&view), Some(ItemSubtype::Model));
        assert_eq!(view.simulation.as_ref().map(Simulation::alpha), Some(cooled));
    }
}
