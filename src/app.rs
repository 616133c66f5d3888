use std::{
    sync::{
        Arc,
        mpsc::{Receiver, Sender, channel},
    },
    thread,
    time::Duration,
};

use crate::{
    about,
    boundaries::{FetchedRegions, RegionLoadState, fetch_regions},
    charts,
    controller::{ExplorerController, QueryOutcome},
    error::ExplorerError,
    layers::{LandcoverScenario, LayerKind, ModelView},
    map_view,
    query::{HttpTransport, QueryTicket, ScenarioQueryClient},
    scenario::ScenarioResult,
};
use eframe::egui::{self, ComboBox, DragValue, RichText, Ui};
use smoke_protocol::{KNOWN_RECEPTORS, KNOWN_SCENARIOS};
use tracing::{debug, error};

pub const MET_YEARS: std::ops::RangeInclusive<u16> = 2005..=2009;
pub const EMISS_YEARS: std::ops::RangeInclusive<u16> = 2005..=2030;

/// Worker-thread results, applied on the UI thread.
enum Reply {
    Query(QueryTicket, Result<ScenarioResult, ExplorerError>),
    Regions(FetchedRegions),
}

pub struct SmokeApp {
    controller: ExplorerController,
    client: Arc<ScenarioQueryClient<HttpTransport>>,
    replies_tx: Sender<Reply>,
    replies_rx: Receiver<Reply>,
    /// The first result still has to be fetched with default parameters.
    needs_initial_query: bool,
    /// Region ids from the boot payload, fetched on the first frame.
    pending_regions: Option<Vec<String>>,
    update_has_run_before: bool,
}

impl SmokeApp {
    pub fn new(
        controller: ExplorerController,
        client: ScenarioQueryClient<HttpTransport>,
        needs_initial_query: bool,
        pending_regions: Option<Vec<String>>,
    ) -> Self {
        let (replies_tx, replies_rx) = channel();
        Self {
            controller,
            client: Arc::new(client),
            replies_tx,
            replies_rx,
            needs_initial_query,
            pending_regions,
            update_has_run_before: false,
        }
    }

    /// Runs the blocking fetch on a worker thread; the reply is applied on
    /// the UI thread by [`Self::poll_replies`].
    fn start_query(&mut self, ctx: &egui::Context) {
        let Ok((ticket, query)) = self.controller.begin_query() else {
            return;
        };
        let client = self.client.clone();
        let tx = self.replies_tx.clone();
        let ctx = ctx.clone();
        let spawned = thread::Builder::new()
            .name(format!("details-query-{}", ticket.sequence()))
            .spawn(move || {
                let outcome = client.fetch(&query);
                if tx.send(Reply::Query(ticket, outcome)).is_err() {
                    debug!("explorer closed before query reply");
                }
                ctx.request_repaint();
            });
        if let Err(e) = spawned {
            error!("could not spawn query thread: {e}");
            self.controller.finish_query(
                ticket,
                Err(ExplorerError::network(format!("Could not start query: {e}"))),
            );
        }
    }

    /// Marks the regions as loading and fetches their boundaries off the UI
    /// thread.
    fn start_region_load(&mut self, region_ids: Vec<String>, ctx: &egui::Context) {
        self.controller.begin_regions(&region_ids);
        if region_ids.is_empty() {
            return;
        }
        let client = self.client.clone();
        let tx = self.replies_tx.clone();
        let ctx = ctx.clone();
        let spawned = thread::Builder::new()
            .name("region-boundaries".to_string())
            .spawn(move || {
                let fetched = fetch_regions(&region_ids, client.transport());
                if tx.send(Reply::Regions(fetched)).is_err() {
                    debug!("explorer closed before boundaries arrived");
                }
                ctx.request_repaint();
            });
        if let Err(e) = spawned {
            error!("could not spawn boundary thread: {e}");
        }
    }

    fn poll_replies(&mut self, ctx: &egui::Context) {
        while let Ok(reply) = self.replies_rx.try_recv() {
            match reply {
                Reply::Query(ticket, outcome) => {
                    let first = self.controller.result().is_none();
                    let applied =
                        self.controller.finish_query(ticket, outcome) == QueryOutcome::Applied;
                    if applied && first {
                        let regions = self.controller.config().regions.clone();
                        self.start_region_load(regions, ctx);
                    }
                }
                Reply::Regions(fetched) => self.controller.finish_regions(fetched),
            }
        }
    }

    fn render_query_controls(&mut self, ui: &mut Ui, ctx: &egui::Context) {
        ui.heading("Scenario");
        let params = &mut self.controller.params;
        ComboBox::from_label("Receptor")
            .selected_text(params.receptor.replace('_', " "))
            .show_ui(ui, |ui| {
                for receptor in KNOWN_RECEPTORS {
                    ui.selectable_value(
                        &mut params.receptor,
                        receptor.to_string(),
                        receptor.replace('_', " "),
                    );
                }
            });
        ComboBox::from_label("Emissions")
            .selected_text(params.scenario.clone())
            .show_ui(ui, |ui| {
                for scenario in KNOWN_SCENARIOS {
                    ui.selectable_value(&mut params.scenario, scenario.to_string(), scenario);
                }
            });
        ui.horizontal(|ui| {
            ui.label("Meteorology year");
            ui.add(DragValue::new(&mut params.met_year).range(MET_YEARS));
        });
        ui.horizontal(|ui| {
            ui.label("Emissions year");
            ui.add(DragValue::new(&mut params.emiss_year).range(EMISS_YEARS));
        });
        ui.label("Protect from conversion:");
        ui.checkbox(&mut params.logging, "Logging concessions");
        ui.checkbox(&mut params.oilpalm, "Oil palm concessions");
        ui.checkbox(&mut params.timber, "Timber plantations");
        ui.checkbox(&mut params.peatlands, "Peatlands");
        ui.checkbox(&mut params.conservation, "Conservation areas");

        ui.horizontal(|ui| {
            let busy = self.controller.in_flight();
            if ui
                .add_enabled(!busy, egui::Button::new("Run scenario"))
                .clicked()
            {
                self.start_query(ctx);
            }
            if busy {
                ui.spinner();
            }
        });
        if let Some(status) = self.controller.status() {
            ui.label(RichText::new(status).color(ui.visuals().warn_fg_color));
        }
    }

    fn render_layer_controls(&mut self, ui: &mut Ui) {
        ui.heading("Layers");
        let kinds: Vec<LayerKind> = self.controller.overlays().catalog().kinds().collect();
        for kind in kinds {
            let mut active = self.controller.overlays().is_active(kind);
            if ui.checkbox(&mut active, kind.display_name()).changed() {
                self.controller.toggle_layer(kind);
            }
            match kind {
                LayerKind::Landcover => {
                    let current = self.controller.selections.landcover;
                    ui.indent("landcover_variants", |ui| {
                        for scenario in LandcoverScenario::ALL {
                            if ui
                                .radio(current == Some(scenario), scenario.label())
                                .clicked()
                            {
                                self.controller.select_landcover(scenario);
                            }
                        }
                    });
                }
                LayerKind::Model => {
                    let current = self.controller.selections.model;
                    ui.indent("model_variants", |ui| {
                        ui.horizontal(|ui| {
                            for view in ModelView::ALL {
                                if ui.radio(current == Some(view), view.label()).clicked() {
                                    self.controller.select_model(view);
                                }
                            }
                        });
                    });
                }
                LayerKind::Emissions | LayerKind::Health => {}
            }
        }
        ui.separator();
        for layer in self.controller.overlays().active() {
            charts::legend_view(ui, &layer.kind.legend());
        }
    }

    fn render_results(&self, ui: &mut Ui) {
        let Some(result) = self.controller.result() else {
            ui.weak("No scenario loaded yet");
            return;
        };
        ui.heading("Results");
        ui.label(format!("Population-weighted PM2.5: {:.2} ug/m3", result.total_pm));
        ui.separator();
        charts::pie_chart(ui, &result.provincial);
        ui.separator();
        charts::timeseries_chart(ui, &result.timeseries, result.timeseries_range());
        ui.separator();
        charts::mortality_chart(ui, &result.mortality);
        let boundaries = self.controller.boundaries();
        for region in boundaries.region_ids() {
            match boundaries.state(region) {
                Some(RegionLoadState::NotLoaded) => {
                    ui.small(format!("Region {region}: loading"));
                }
                Some(RegionLoadState::Failed(message)) => {
                    ui.small(format!("Region {region}: {message}"));
                }
                Some(RegionLoadState::Loaded(_)) | None => {}
            }
        }
    }
}

impl eframe::App for SmokeApp {
    // All drawing happens in `update`, which eframe still calls before `ui`.
    fn ui(&mut self, _ui: &mut Ui, _frame: &mut eframe::Frame) {}

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !self.update_has_run_before {
            egui_extras::install_image_loaders(ctx);
            self.update_has_run_before = true;
        }
        if self.needs_initial_query {
            self.needs_initial_query = false;
            self.start_query(ctx);
        }
        if let Some(regions) = self.pending_regions.take() {
            self.start_region_load(regions, ctx);
        }
        self.poll_replies(ctx);

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.small(about::short_version_text());
                if let Some(region) = self.controller.boundaries().selected() {
                    ui.separator();
                    ui.small(format!("Selected region: {region}"));
                }
            });
        });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.render_query_controls(ui, ctx);
                    ui.separator();
                    self.render_layer_controls(ui);
                    ui.separator();
                    self.render_results(ui);
                });
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| map_view::show_map(ui, &mut self.controller));

        if self.controller.in_flight() {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}
