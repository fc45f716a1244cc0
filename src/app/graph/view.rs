use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use eframe::egui::{self, Align2, Color32, FontId, Painter, Rect, Sense, Stroke, Ui, vec2};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::lineage::{ItemCategory, QueryState};
use crate::util::{short_handle, truncate_label};

use super::super::highlight::{HighlightState, build_highlight_state};
use super::super::physics::Simulation;
use super::super::render_utils::{
    ZoomTransform, blend_color, dim_color, draw_background, edge_visible, subtype_color,
    to_screen, trim_segment,
};
use super::super::{CanvasScratch, ViewModel};

const LABEL_CHARS: usize = 28;
const FOCUS_COLOR: Color32 = Color32::from_rgb(245, 206, 93);

pub(in crate::app) struct SearchMatchCache {
    pub query: String,
    pub graph_revision: u64,
    pub settled_details: usize,
    pub matches: Arc<HashSet<String>>,
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

impl ViewModel {
    fn update_screen_space(
        rect: Rect,
        simulation: &Simulation,
        transform: ZoomTransform,
        scratch: &mut CanvasScratch,
    ) {
        scratch.screen_positions.clear();
        scratch.screen_radii.clear();
        for node in &simulation.nodes {
            scratch
                .screen_positions
                .push(to_screen(rect, transform, node.position));
            scratch
                .screen_radii
                .push((node.radius * transform.k).clamp(3.0, 90.0));
        }
        Self::visible_indices_into(
            rect,
            &scratch.screen_positions,
            &scratch.screen_radii,
            &mut scratch.visible_indices,
        );
    }

    pub(in crate::app) fn cached_search_matches(&mut self) -> Option<Arc<HashSet<String>>> {
        let query = self.search.trim();
        if query.is_empty() {
            return None;
        }

        let revision = self.accumulator.graph_revision();
        let settled_details = self.accumulator.settled_details();
        if let Some(cached) = &self.search_cache
            && cached.graph_revision == revision
            && cached.settled_details == settled_details
            && cached.query == query
        {
            return Some(Arc::clone(&cached.matches));
        }

        let matcher = SkimMatcherV2::default();
        let matches = self
            .accumulator
            .graph()
            .nodes
            .iter()
            .filter(|node| {
                fuzzy_match_score(&matcher, &node.id, query).is_some()
                    || fuzzy_match_score(&matcher, node.item_subtype.label(), query).is_some()
                    || self
                        .display_name(&node.id)
                        .is_some_and(|name| fuzzy_match_score(&matcher, &name, query).is_some())
            })
            .map(|node| node.id.clone())
            .collect::<HashSet<_>>();
        let matches = Arc::new(matches);

        self.search_cache = Some(SearchMatchCache {
            query: query.to_owned(),
            graph_revision: revision,
            settled_details,
            matches: Arc::clone(&matches),
        });
        Some(matches)
    }

    pub(in crate::app) fn draw_canvas(&mut self, ui: &mut Ui, now: Instant) {
        let height = self.canvas_height(ui.available_height());
        let width = ui.available_width();
        let (rect, response) = ui.allocate_exact_size(vec2(width, height), Sense::click_and_drag());
        self.measure_canvas(rect.width(), rect.height(), now);

        let painter = ui.painter_at(rect);
        draw_background(&painter, rect, self.transform);

        if self.accumulator.root_id().is_none() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "Enter a registry id to explore its lineage.",
                FontId::proportional(15.0),
                Color32::from_gray(200),
            );
            return;
        }

        self.handle_canvas_zoom(ui, rect, &response, now);

        let mut scratch = std::mem::take(&mut self.canvas_scratch);
        let Some(simulation) = self.simulation.as_ref() else {
            self.canvas_scratch = scratch;
            return;
        };
        Self::update_screen_space(rect, simulation, self.transform, &mut scratch);
        let hovered = Self::hovered_index(ui, rect, &scratch.screen_positions, &scratch.screen_radii);
        if hovered.is_some() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
        }

        self.handle_canvas_pointer(rect, &response, hovered, now);

        if let Some(simulation) = self.simulation.as_mut()
            && simulation.tick()
        {
            ui.ctx().request_repaint();
        }

        let search_matches = self.cached_search_matches();
        let Some(simulation) = self.simulation.as_ref() else {
            self.canvas_scratch = scratch;
            return;
        };
        Self::update_screen_space(rect, simulation, self.transform, &mut scratch);

        let highlight = self.accumulator.focused().and_then(|id| {
            build_highlight_state(simulation, id, self.accumulator.root_id())
        });
        self.paint_links(&painter, rect, simulation, &scratch, highlight.as_ref());
        self.paint_nodes(
            &painter,
            simulation,
            &scratch,
            hovered,
            highlight.as_ref(),
            search_matches.as_deref(),
        );
        self.paint_tooltip(&painter, rect, simulation, &scratch);

        if simulation.nodes.is_empty() && self.accumulator.status().loading {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "Loading lineage...",
                FontId::proportional(15.0),
                Color32::from_gray(200),
            );
        }

        self.canvas_scratch = scratch;
    }

    fn paint_links(
        &self,
        painter: &Painter,
        rect: Rect,
        simulation: &Simulation,
        scratch: &CanvasScratch,
        highlight: Option<&HighlightState>,
    ) {
        let zoom_sqrt = self.transform.k.sqrt();
        let highlight_active = highlight.is_some_and(HighlightState::is_active);

        for link in &simulation.links {
            let (source, target) = link.ends;
            let start = scratch.screen_positions[source];
            let end = scratch.screen_positions[target];
            if !edge_visible(rect, start, end, 2.5) {
                continue;
            }
            let Some((start, end)) = trim_segment(
                start,
                end,
                scratch.screen_radii[source],
                scratch.screen_radii[target],
            ) else {
                continue;
            };

            let on_root_path =
                highlight.is_some_and(|state| state.root_path_edges.contains(&(source, target)));
            let related =
                highlight.is_some_and(|state| state.related_edges.contains(&(source, target)));

            let (width, color) = if on_root_path {
                ((2.8 * zoom_sqrt).clamp(1.5, 5.0), Color32::from_rgb(246, 206, 104))
            } else if related {
                ((2.2 * zoom_sqrt).clamp(1.2, 4.0), Color32::from_rgb(241, 146, 94))
            } else if highlight_active {
                (
                    (0.9 * zoom_sqrt).clamp(0.5, 2.0),
                    Color32::from_rgba_unmultiplied(80, 90, 104, 120),
                )
            } else {
                (
                    (1.2 * zoom_sqrt).clamp(0.6, 3.0),
                    Color32::from_rgba_unmultiplied(150, 156, 166, 190),
                )
            };

            painter.arrow(start, end - start, Stroke::new(width, color));

            if self.show_labels && self.transform.k > 0.8 {
                painter.text(
                    start + (end - start) * 0.5,
                    Align2::CENTER_CENTER,
                    &link.kind,
                    FontId::proportional(10.0),
                    dim_color(color, 0.85),
                );
            }
        }
    }

    fn paint_nodes(
        &self,
        painter: &Painter,
        simulation: &Simulation,
        scratch: &CanvasScratch,
        hovered: Option<usize>,
        highlight: Option<&HighlightState>,
        search_matches: Option<&HashSet<String>>,
    ) {
        let highlight_active = highlight.is_some_and(HighlightState::is_active);
        let search_active = search_matches.is_some_and(|matches| !matches.is_empty());
        let focused = self.accumulator.focused();
        let root = self.accumulator.root_id();

        for &index in &scratch.visible_indices {
            let node = &simulation.nodes[index];
            let position = scratch.screen_positions[index];
            let radius = scratch.screen_radii[index];

            let is_focused = focused == Some(node.id.as_str());
            let is_hovered = hovered == Some(index);
            let on_root_path = highlight.is_some_and(|state| state.root_path_nodes.contains(&index));
            let related = highlight.is_some_and(|state| state.related_nodes.contains(&index));
            let search_match = search_matches.is_some_and(|matches| matches.contains(&node.id));

            let base = subtype_color(node.subtype);
            let color = if is_hovered {
                blend_color(base, Color32::WHITE, 0.25)
            } else if on_root_path || related {
                base
            } else if search_match {
                blend_color(base, Color32::from_rgb(103, 196, 255), 0.55)
            } else if highlight_active {
                dim_color(base, 0.45)
            } else if search_active {
                dim_color(base, 0.38)
            } else {
                base
            };

            match node.category {
                ItemCategory::Activity => {
                    let square = Rect::from_center_size(position, vec2(radius, radius) * 1.7);
                    painter.rect_filled(square, 3.0, color);
                }
                ItemCategory::Agent | ItemCategory::Entity => {
                    painter.circle_filled(position, radius, color);
                }
            }

            let outline = if root == Some(node.id.as_str()) {
                Stroke::new(2.4, Color32::from_gray(235))
            } else if node.pinned.is_some() {
                Stroke::new(1.8, Color32::from_rgb(120, 200, 255))
            } else {
                Stroke::new(1.0, Color32::from_rgba_unmultiplied(15, 15, 15, 190))
            };
            painter.circle_stroke(position, radius, outline);

            if is_focused {
                painter.circle_stroke(position, radius + 5.0, Stroke::new(2.2, FOCUS_COLOR));
            }

            let draw_label = self.show_labels
                || is_focused
                || is_hovered
                || on_root_path
                || (search_match && self.transform.k > 0.35);
            if draw_label {
                let label = self
                    .display_name(&node.id)
                    .unwrap_or_else(|| short_handle(&node.id).to_owned());
                painter.text(
                    position + vec2(radius + 5.0, 0.0),
                    Align2::LEFT_CENTER,
                    truncate_label(&label, LABEL_CHARS),
                    FontId::proportional(12.0),
                    Color32::from_gray(238),
                );
            }
        }
    }

    fn paint_tooltip(
        &self,
        painter: &Painter,
        rect: Rect,
        simulation: &Simulation,
        scratch: &CanvasScratch,
    ) {
        let Some(id) = self.accumulator.hovered() else {
            return;
        };
        let Some(&index) = simulation.index_by_id.get(id) else {
            return;
        };
        let node = &simulation.nodes[index];

        let detail = match self.accumulator.details(id) {
            Some(QueryState::Ready(item)) => item.display_name.clone(),
            Some(QueryState::Failed(error)) => format!("details unavailable: {error}"),
            Some(QueryState::Pending) | None => "loading details...".to_owned(),
        };
        let text = format!("{}\n{}  |  {}", detail, node.subtype.label(), id);

        let anchor = scratch.screen_positions[index] + vec2(scratch.screen_radii[index] + 8.0, 8.0);
        let galley = painter.layout_no_wrap(text, FontId::proportional(12.5), Color32::from_gray(240));
        let mut frame = Rect::from_min_size(anchor, galley.size() + vec2(12.0, 8.0));
        if frame.right() > rect.right() {
            frame = frame.translate(vec2(rect.right() - frame.right(), 0.0));
        }
        if frame.bottom() > rect.bottom() {
            frame = frame.translate(vec2(0.0, rect.bottom() - frame.bottom()));
        }
        painter.rect_filled(frame, 4.0, Color32::from_rgba_unmultiplied(30, 34, 42, 235));
        painter.galley(frame.min + vec2(6.0, 4.0), galley, Color32::from_gray(240));
    }

    pub(in crate::app) fn display_name(&self, id: &str) -> Option<String> {
        match self.accumulator.details(id)? {
            QueryState::Ready(item) if !item.display_name.is_empty() => {
                Some(item.display_name.clone())
            }
            _ => None,
        }
    }
}
