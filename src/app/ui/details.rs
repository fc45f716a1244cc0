use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use eframe::egui::{self, Color32, RichText, Ui};
use tokio::runtime::Runtime;

use crate::lineage::{QueryState, QueryType};
use crate::util::{handle_file_stem, short_handle};

use super::super::{ReportStatus, ViewModel};

/// Writes a generated report as `<dir>/<handle>.json`.
pub(in crate::app) fn write_report(dir: &Path, id: &str, bytes: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create report directory {}", dir.display()))?;
    let path = dir.join(format!("{}.json", handle_file_stem(id)));
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui, runtime: &Runtime) {
        ui.heading("Focused node");
        ui.add_space(6.0);

        let Some(focused) = self.accumulator.focused().map(str::to_owned) else {
            ui.label("Click a node to see its registry record.");
            return;
        };

        let Some(node) = self.accumulator.graph().node(&focused).cloned() else {
            ui.label("The focused node is no longer part of the graph.");
            return;
        };

        match self.accumulator.details(&focused) {
            Some(QueryState::Ready(item)) => {
                ui.label(RichText::new(&item.display_name).strong());
                ui.small(focused.as_str());
                ui.label(format!(
                    "{} / {}",
                    item.item_category.label(),
                    item.item_subtype.label()
                ));
                ui.add_space(4.0);
                let record = serde_json::to_string_pretty(&item.record)
                    .unwrap_or_else(|_| item.record.to_string());
                egui::ScrollArea::vertical()
                    .id_salt("record_scroll")
                    .max_height(200.0)
                    .show(ui, |ui| {
                        ui.monospace(record);
                    });
            }
            Some(QueryState::Failed(error)) => {
                ui.label(RichText::new(short_handle(&focused)).strong());
                ui.colored_label(Color32::from_rgb(235, 110, 100), error.to_string());
            }
            Some(QueryState::Pending) | None => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(format!("Loading {focused}..."));
                });
            }
        }

        ui.separator();
        ui.label(RichText::new("Neighbours").strong());
        let graph = self.accumulator.graph();
        let mut neighbours = graph
            .links
            .iter()
            .filter_map(|link| {
                if link.source == focused {
                    Some((link.target.clone(), format!("{} →", link.kind)))
                } else if link.target == focused {
                    Some((link.source.clone(), format!("← {}", link.kind)))
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();
        neighbours.sort();

        let mut refocus = None;
        if neighbours.is_empty() {
            ui.label("No links to this node in the current graph.");
        } else {
            egui::ScrollArea::vertical()
                .id_salt("neighbour_scroll")
                .max_height(180.0)
                .show(ui, |ui| {
                    for (id, relation) in &neighbours {
                        let name = self
                            .display_name(id)
                            .unwrap_or_else(|| short_handle(id).to_owned());
                        if ui
                            .link(format!("{relation} {name}"))
                            .on_hover_text(id.as_str())
                            .clicked()
                        {
                            refocus = Some(id.clone());
                        }
                    }
                });
        }
        if let Some(id) = refocus {
            self.accumulator.select_focus_node(&id);
        }

        ui.separator();
        ui.horizontal(|ui| {
            if ui
                .button("Expand")
                .on_hover_text("Same as double-clicking the node.")
                .clicked()
            {
                self.accumulator.expand_node(&focused);
            }
            if ui.button("Make root").clicked() {
                self.root_input = focused.clone();
                self.change_root(&focused);
            }
            if ui.button("Clear focus").clicked() {
                self.accumulator.deselect_focus_node();
            }
        });
        if self.accumulator.focused().is_none() {
            return;
        }

        ui.collapsing("Lineage queries", |ui| {
            for query in QueryType::ALL {
                if ui.button(query.label()).clicked() {
                    self.accumulator.add_node_query(&focused, &[query]);
                }
            }
        });

        ui.separator();
        let busy = self.report_job.is_some();
        if ui
            .add_enabled(!busy, egui::Button::new("Generate report"))
            .on_hover_text(format!(
                "Writes a {}-hop lineage report for this {} to {}.",
                self.report_depth,
                node.item_subtype.label(),
                self.report_dir.display()
            ))
            .clicked()
        {
            let ctx = ui.ctx().clone();
            self.start_report(runtime, &ctx, &focused);
        }
        match &self.report_status {
            Some(ReportStatus::Running(id)) => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(format!("Generating report for {}", short_handle(id)));
                });
            }
            Some(ReportStatus::Written(path)) => {
                ui.label(format!("Report written to {}", path.display()));
            }
            Some(ReportStatus::Failed(error)) => {
                ui.colored_label(Color32::from_rgb(235, 110, 100), error);
            }
            None => {}
        }
    }
}
