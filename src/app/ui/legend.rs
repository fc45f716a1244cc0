use eframe::egui::{self, Color32, RichText, Sense, Ui, vec2};

use crate::lineage::ItemSubtype;
use crate::util::short_handle;

use super::super::ViewModel;
use super::super::render_utils::subtype_color;

impl ViewModel {
    pub(in crate::app) fn draw_legend(&mut self, ui: &mut Ui) {
        ui.heading("Legend");
        ui.add_space(4.0);

        for subtype in ItemSubtype::ALL {
            ui.horizontal(|ui| {
                let (swatch, _) = ui.allocate_exact_size(vec2(14.0, 14.0), Sense::hover());
                ui.painter()
                    .circle_filled(swatch.center(), 6.0, subtype_color(subtype));
                ui.label(subtype.label());
            });
        }
        ui.small("Squares are activities, circles are agents and entities.");
        ui.small("A white rim marks the root, a blue rim a pinned node.");

        ui.separator();
        ui.label(RichText::new("Expansions").strong());

        let entries = self
            .accumulator
            .expansions()
            .map(|entry| (entry.visible, entry.query.label(), entry.id.clone()))
            .collect::<Vec<_>>();
        if entries.is_empty() {
            ui.label("Nothing requested yet.");
            return;
        }

        let mut toggled = None;
        egui::ScrollArea::vertical()
            .id_salt("expansion_scroll")
            .auto_shrink([false, true])
            .show(ui, |ui| {
                for (index, (visible, query, id)) in entries.iter().enumerate() {
                    let mut shown = *visible;
                    let text = format!("{query}: {}", short_handle(id));
                    let response = ui.checkbox(&mut shown, text).on_hover_text(id.as_str());
                    if response.changed() {
                        toggled = Some((index, shown));
                    }
                }
            });
        if let Some((index, shown)) = toggled {
            self.accumulator.set_expansion_visible(index, shown);
        }

        if let Some(message) = &self.accumulator.status().error_message {
            ui.add_space(6.0);
            ui.colored_label(Color32::from_rgb(235, 110, 100), message);
        }
    }
}
