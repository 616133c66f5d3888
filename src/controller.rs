//! Explorer state owned by the UI thread.
//!
//! Every mutation goes through [`ExplorerController`]. Queries are split into
//! [`ExplorerController::begin_query`], which hands out a ticket, and
//! [`ExplorerController::finish_query`], which applies a result only when its
//! ticket is still the latest one. The blocking fetch in between may run
//! anywhere.

use crate::{
    boundaries::{BoundaryLayer, FetchedRegions},
    config::ExplorerConfig,
    error::ExplorerError,
    geo::MapView,
    layers::{LandcoverScenario, LayerKind, ModelView, UISelections},
    overlay::{LayerChange, LayerOverlayManager, MapOverlays},
    query::{DetailsTransport, QueryTicket, QueryTracker, ScenarioQueryClient, validate_query},
    scenario::ScenarioResult,
};
use smoke_protocol::{BootPayload, DetailsQuery};
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq)]
pub enum QueryOutcome {
    Applied,
    /// A newer query was issued after this one; its result was dropped.
    Stale,
    Failed(ExplorerError),
}

pub struct ExplorerController {
    config: ExplorerConfig,
    pub selections: UISelections,
    pub params: DetailsQuery,
    pub view: MapView,
    result: Option<ScenarioResult>,
    overlays: LayerOverlayManager<MapOverlays>,
    boundaries: BoundaryLayer,
    tracker: QueryTracker,
    status: Option<String>,
}

impl ExplorerController {
    pub fn new(config: ExplorerConfig) -> Self {
        Self {
            selections: UISelections::default(),
            params: config.default_query.clone(),
            view: MapView::new(config.default_center, config.default_zoom),
            result: None,
            overlays: LayerOverlayManager::new(config.layers.clone(), MapOverlays::default()),
            boundaries: BoundaryLayer::default(),
            tracker: QueryTracker::default(),
            status: None,
            config,
        }
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn result(&self) -> Option<&ScenarioResult> {
        self.result.as_ref()
    }

    pub fn overlays(&self) -> &LayerOverlayManager<MapOverlays> {
        &self.overlays
    }

    pub fn boundaries(&self) -> &BoundaryLayer {
        &self.boundaries
    }

    pub fn boundaries_mut(&mut self) -> &mut BoundaryLayer {
        &mut self.boundaries
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn in_flight(&self) -> bool {
        self.tracker.in_flight()
    }

    /// Installs the page-load payload: initial result, overlay stack reset to
    /// the primary layer and one fetch per listed boundary.
    pub fn boot(
        &mut self,
        boot: &BootPayload,
        transport: &dyn DetailsTransport,
    ) -> Result<(), ExplorerError> {
        let region_ids = self.install_boot(boot)?;
        self.load_regions(&region_ids, transport);
        Ok(())
    }

    /// Installs the page-load result and returns the region ids still to be
    /// fetched; the payload's list wins over the configured one.
    pub fn install_boot(&mut self, boot: &BootPayload) -> Result<Vec<String>, ExplorerError> {
        let result = ScenarioResult::from_boot(boot)?;
        let mut region_ids = boot.region_ids()?;
        if region_ids.is_empty() {
            region_ids = self.config.regions.clone();
        }
        info!(
            groups = result.tiles.group_count(),
            regions = region_ids.len(),
            "booting explorer"
        );
        self.apply(result);
        Ok(region_ids)
    }

    pub fn load_regions(&mut self, region_ids: &[String], transport: &dyn DetailsTransport) {
        self.begin_regions(region_ids);
        self.boundaries.load_all(transport);
    }

    /// Lists `region_ids` as not yet loaded; their texts arrive through
    /// [`Self::finish_regions`].
    pub fn begin_regions(&mut self, region_ids: &[String]) {
        self.boundaries = BoundaryLayer::new(region_ids);
    }

    pub fn finish_regions(&mut self, fetched: FetchedRegions) {
        self.boundaries.install(fetched);
    }

    /// Validates the current parameters and issues a ticket for them.
    pub fn begin_query(&mut self) -> Result<(QueryTicket, DetailsQuery), ExplorerError> {
        if let Err(e) = validate_query(&self.params) {
            self.status = Some(e.message.clone());
            return Err(e);
        }
        let ticket = self.tracker.issue();
        self.status = Some("Loading scenario...".to_string());
        Ok((ticket, self.params.clone()))
    }

    pub fn finish_query(
        &mut self,
        ticket: QueryTicket,
        outcome: Result<ScenarioResult, ExplorerError>,
    ) -> QueryOutcome {
        if !self.tracker.settle(ticket) {
            return QueryOutcome::Stale;
        }
        match outcome {
            Ok(result) => {
                self.apply(result);
                self.status = None;
                QueryOutcome::Applied
            }
            Err(e) => {
                warn!(ticket = ticket.sequence(), "scenario query failed: {e}");
                self.status = Some(format!("Query failed: {}", e.message));
                QueryOutcome::Failed(e)
            }
        }
    }

    pub fn query_blocking<T: DetailsTransport>(
        &mut self,
        client: &ScenarioQueryClient<T>,
    ) -> QueryOutcome {
        match self.begin_query() {
            Ok((ticket, query)) => {
                let outcome = client.fetch(&query);
                self.finish_query(ticket, outcome)
            }
            Err(e) => QueryOutcome::Failed(e),
        }
    }

    fn apply(&mut self, result: ScenarioResult) {
        let catalog = self.config.layers.fitted_to(result.tiles.group_count());
        if &catalog != self.overlays.catalog() {
            self.overlays.set_catalog(catalog);
        }
        self.result = Some(result);
        self.overlays
            .reset_all(self.result.as_ref(), &self.selections);
    }

    pub fn toggle_layer(&mut self, kind: LayerKind) -> LayerChange {
        self.overlays
            .toggle_layer(kind, self.result.as_ref(), &self.selections)
    }

    pub fn select_landcover(&mut self, scenario: LandcoverScenario) -> LayerChange {
        self.selections.landcover = Some(scenario);
        self.overlays
            .switch_variant(LayerKind::Landcover, self.result.as_ref(), &self.selections)
    }

    pub fn select_model(&mut self, view: ModelView) -> LayerChange {
        self.selections.model = Some(view);
        self.overlays
            .switch_variant(LayerKind::Model, self.result.as_ref(), &self.selections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        boundaries::{RegionLoadState, fetch_regions},
        error::ErrorCode,
        layers::LayerCatalog,
        query::testing::CannedTransport,
    };
    use smoke_protocol::TileCredential;

    fn nested() -> String {
        include_str!("../test_files/details.nested.json").to_string()
    }

    fn kalimantan_transport() -> CannedTransport {
        let mut transport = CannedTransport::default();
        transport.regions.insert(
            "kalimantan".to_string(),
            include_str!("../test_files/regions/kalimantan.json").to_string(),
        );
        transport
    }

    #[test]
    fn boot_installs_primary_layer_and_fetches_regions_once() {
        let mut controller = ExplorerController::new(ExplorerConfig::default());
        let transport = kalimantan_transport();
        let boot =
            BootPayload::from_json_str(include_str!("../test_files/boot.minimal.json")).unwrap();
        controller.boot(&boot, &transport).unwrap();

        let overlays = controller.overlays();
        assert_eq!(overlays.active_kinds(), vec![LayerKind::Model]);
        assert_eq!(
            overlays.visual().as_slice()[0].credential,
            TileCredential::new("m0", "t0")
        );
        assert_eq!(*transport.region_requests(), vec!["kalimantan"]);
        assert_eq!(controller.boundaries().loaded().count(), 1);
    }

    #[test]
    fn full_result_after_single_group_boot_restores_default_catalog() {
        let mut controller = ExplorerController::new(ExplorerConfig::default());
        let boot =
            BootPayload::from_json_str(include_str!("../test_files/boot.minimal.json")).unwrap();
        controller.install_boot(&boot).unwrap();
        assert_eq!(controller.overlays().catalog().layers.len(), 1);

        let client = ScenarioQueryClient::new(CannedTransport::with_details(vec![Ok(nested())]));
        assert_eq!(controller.query_blocking(&client), QueryOutcome::Applied);
        assert_eq!(controller.overlays().catalog(), &LayerCatalog::default());
        assert_eq!(controller.overlays().active_kinds(), vec![LayerKind::Model]);
        assert_eq!(controller.overlays().active()[0].choice.group, 2);
    }

    #[test]
    fn deferred_region_load_installs_fetched_boundaries() {
        let mut controller = ExplorerController::new(ExplorerConfig::default());
        let boot =
            BootPayload::from_json_str(include_str!("../test_files/boot.minimal.json")).unwrap();
        let ids = controller.install_boot(&boot).unwrap();
        assert_eq!(ids, vec!["kalimantan"]);

        controller.begin_regions(&ids);
        assert_eq!(
            controller.boundaries().state("kalimantan"),
            Some(&RegionLoadState::NotLoaded)
        );
        let transport = kalimantan_transport();
        let fetched = fetch_regions(&ids, &transport);
        controller.finish_regions(fetched);
        assert_eq!(controller.boundaries().loaded().count(), 1);
        assert_eq!(*transport.region_requests(), vec!["kalimantan"]);
    }

    #[test]
    fn boot_falls_back_to_configured_regions() {
        let config = ExplorerConfig {
            regions: vec!["kalimantan".to_string()],
            ..Default::default()
        };
        let mut controller = ExplorerController::new(config);
        let transport = kalimantan_transport();
        let boot = BootPayload::from_json_str(
            r#"{"eeMapId":"[[\"m0\"]]","eeToken":"[[\"t0\"]]"}"#,
        )
        .unwrap();
        controller.boot(&boot, &transport).unwrap();
        assert_eq!(*transport.region_requests(), vec!["kalimantan"]);
    }

    #[test]
    fn applied_query_replaces_result_and_resets_stack() {
        let mut controller = ExplorerController::new(ExplorerConfig::default());
        let client = ScenarioQueryClient::new(CannedTransport::with_details(vec![Ok(nested())]));
        assert_eq!(controller.query_blocking(&client), QueryOutcome::Applied);
        controller.toggle_layer(LayerKind::Landcover);
        assert_eq!(controller.overlays().active().len(), 2);

        let client = ScenarioQueryClient::new(CannedTransport::with_details(vec![Ok(nested())]));
        assert_eq!(controller.query_blocking(&client), QueryOutcome::Applied);
        assert_eq!(controller.overlays().active_kinds(), vec![LayerKind::Model]);
        assert_eq!(controller.result().unwrap().total_pm, 12.5);
        assert!(controller.status().is_none());
    }

    #[test]
    fn late_response_for_superseded_query_is_dropped() {
        let mut controller = ExplorerController::new(ExplorerConfig::default());
        let (a, _) = controller.begin_query().unwrap();
        controller.params.receptor = "Singapore".to_string();
        let (b, query_b) = controller.begin_query().unwrap();
        assert_eq!(query_b.receptor, "Singapore");

        let result_b = ScenarioResult {
            total_pm: 2.0,
            ..Default::default()
        };
        let result_a = ScenarioResult {
            total_pm: 1.0,
            ..Default::default()
        };

        assert_eq!(controller.finish_query(b, Ok(result_b)), QueryOutcome::Applied);
        assert_eq!(controller.finish_query(a, Ok(result_a)), QueryOutcome::Stale);
        assert_eq!(controller.result().unwrap().total_pm, 2.0);
        assert!(!controller.in_flight());
    }

    #[test]
    fn failed_query_keeps_previous_state() {
        let mut controller = ExplorerController::new(ExplorerConfig::default());
        let client = ScenarioQueryClient::new(CannedTransport::with_details(vec![
            Ok(nested()),
            Err(ExplorerError::network("connection refused")),
        ]));
        controller.query_blocking(&client);
        controller.toggle_layer(LayerKind::Health);
        let before = controller.overlays().active().to_vec();

        let outcome = controller.query_blocking(&client);
        assert!(matches!(outcome, QueryOutcome::Failed(ref e) if e.code == ErrorCode::Network));
        assert_eq!(controller.overlays().active(), before.as_slice());
        assert_eq!(controller.result().unwrap().total_pm, 12.5);
        assert!(controller.status().unwrap().contains("connection refused"));
    }

    #[test]
    fn invalid_params_never_reach_the_transport() {
        let mut controller = ExplorerController::new(ExplorerConfig::default());
        controller.params.receptor = "Atlantis".to_string();
        let client = ScenarioQueryClient::new(CannedTransport::default());
        let outcome = controller.query_blocking(&client);
        assert!(matches!(outcome, QueryOutcome::Failed(ref e) if e.code == ErrorCode::InvalidInput));
        assert!(client.transport().detail_requests.lock().unwrap().is_empty());
        assert!(!controller.in_flight());
    }

    #[test]
    fn radio_changes_swap_active_variants() {
        let mut controller = ExplorerController::new(ExplorerConfig::default());
        let client = ScenarioQueryClient::new(CannedTransport::with_details(vec![Ok(nested())]));
        controller.query_blocking(&client);

        let change = controller.select_model(ModelView::Concentration);
        assert!(change.is_change());
        assert_eq!(
            controller.overlays().active()[0].credential,
            TileCredential::new("pm0", "tk-pm0")
        );
        // Landcover is inactive, so only the selection is recorded.
        assert!(!controller.select_landcover(LandcoverScenario::Bau2020).is_change());
        assert_eq!(
            controller.selections.landcover,
            Some(LandcoverScenario::Bau2020)
        );
        controller.toggle_layer(LayerKind::Landcover);
        assert_eq!(
            controller.overlays().active()[1].credential,
            TileCredential::new("lc3", "tk3")
        );
    }
}
