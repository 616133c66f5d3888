//! Active overlay bookkeeping.
//!
//! [`LayerOverlayManager`] owns both the ordered list of active layers and the
//! visual overlay stack the map draws, and mutates them together: entry `i` of
//! the active list is always the overlay at position `i` of the visual stack.
//! Tile credentials are resolved before anything is touched, so an operation
//! that cannot complete leaves both stacks exactly as they were.

use crate::{
    layers::{LayerCatalog, LayerKind, UISelections, VariantChoice},
    scenario::ScenarioResult,
};
use smoke_protocol::{TileCredential, tile_url};
use tracing::{debug, info};

/// One image layer drawn over the base map.
#[derive(Clone, Debug, PartialEq)]
pub struct TileOverlay {
    pub kind: LayerKind,
    pub credential: TileCredential,
    pub opacity: f32,
}

impl TileOverlay {
    pub fn tile_url(&self, base_url: &str, x: u32, y: u32, zoom: u32) -> String {
        tile_url(base_url, &self.credential, x, y, zoom)
    }
}

/// Ordered image layers on top of the base map, bottom first.
pub trait OverlayStack {
    fn insert(&mut self, index: usize, overlay: TileOverlay);
    fn remove(&mut self, index: usize) -> Option<TileOverlay>;
    fn get(&self, index: usize) -> Option<&TileOverlay>;
    fn clear(&mut self);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapOverlays {
    overlays: Vec<TileOverlay>,
}

impl MapOverlays {
    pub fn iter(&self) -> impl Iterator<Item = &TileOverlay> {
        self.overlays.iter()
    }

    pub fn as_slice(&self) -> &[TileOverlay] {
        &self.overlays
    }
}

impl OverlayStack for MapOverlays {
    fn insert(&mut self, index: usize, overlay: TileOverlay) {
        let index = index.min(self.overlays.len());
        self.overlays.insert(index, overlay);
    }

    fn remove(&mut self, index: usize) -> Option<TileOverlay> {
        (index < self.overlays.len()).then(|| self.overlays.remove(index))
    }

    fn get(&self, index: usize) -> Option<&TileOverlay> {
        self.overlays.get(index)
    }

    fn clear(&mut self) {
        self.overlays.clear();
    }

    fn len(&self) -> usize {
        self.overlays.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveLayer {
    pub kind: LayerKind,
    pub choice: VariantChoice,
    pub credential: TileCredential,
}

/// Why an operation left the stacks untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoChange {
    /// No scenario result has been loaded yet.
    NoResult,
    NotInCatalog,
    /// The tile table has no entry for the resolved (group, variant).
    MissingCredential(VariantChoice),
    NotActive,
    SameVariant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerChange {
    Added { kind: LayerKind, index: usize },
    Removed { kind: LayerKind, index: usize },
    Replaced { kind: LayerKind, index: usize },
    Reset { active: usize },
    Unchanged { kind: LayerKind, reason: NoChange },
}

impl LayerChange {
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged { .. })
    }
}

#[derive(Clone, Debug)]
pub struct LayerOverlayManager<S: OverlayStack = MapOverlays> {
    catalog: LayerCatalog,
    active: Vec<ActiveLayer>,
    visual: S,
}

impl Default for LayerOverlayManager<MapOverlays> {
    fn default() -> Self {
        Self::new(LayerCatalog::default(), MapOverlays::default())
    }
}

impl<S: OverlayStack> LayerOverlayManager<S> {
    pub fn new(catalog: LayerCatalog, mut visual: S) -> Self {
        visual.clear();
        Self {
            catalog,
            active: vec![],
            visual,
        }
    }

    pub fn catalog(&self) -> &LayerCatalog {
        &self.catalog
    }

    /// Swaps the catalog; both stacks are emptied since their groups no
    /// longer apply.
    pub fn set_catalog(&mut self, catalog: LayerCatalog) {
        self.visual.clear();
        self.active.clear();
        self.catalog = catalog;
    }

    pub fn active(&self) -> &[ActiveLayer] {
        &self.active
    }

    pub fn active_kinds(&self) -> Vec<LayerKind> {
        self.active.iter().map(|l| l.kind).collect()
    }

    pub fn visual(&self) -> &S {
        &self.visual
    }

    pub fn position(&self, kind: LayerKind) -> Option<usize> {
        self.active.iter().position(|l| l.kind == kind)
    }

    pub fn is_active(&self, kind: LayerKind) -> bool {
        self.position(kind).is_some()
    }

    /// Removes `kind` when active, otherwise adds it on top of the stack.
    pub fn toggle_layer(
        &mut self,
        kind: LayerKind,
        result: Option<&ScenarioResult>,
        selections: &UISelections,
    ) -> LayerChange {
        if self.is_active(kind) {
            return self.remove_layer(kind);
        }
        let change = match self.resolve(kind, result, selections) {
            Ok((layer, overlay)) => {
                let index = self.active.len();
                self.visual.insert(index, overlay);
                self.active.push(layer);
                LayerChange::Added { kind, index }
            }
            Err(reason) => LayerChange::Unchanged { kind, reason },
        };
        self.log_change(&change);
        change
    }

    /// Re-resolves an active layer against the current selections and swaps
    /// it in place, keeping its position among the other active layers.
    pub fn switch_variant(
        &mut self,
        kind: LayerKind,
        result: Option<&ScenarioResult>,
        selections: &UISelections,
    ) -> LayerChange {
        let Some(index) = self.position(kind) else {
            return LayerChange::Unchanged {
                kind,
                reason: NoChange::NotActive,
            };
        };
        let change = match self.resolve(kind, result, selections) {
            Ok((layer, _)) if layer == self.active[index] => LayerChange::Unchanged {
                kind,
                reason: NoChange::SameVariant,
            },
            Ok((layer, overlay)) => {
                self.visual.remove(index);
                self.visual.insert(index, overlay);
                self.active[index] = layer;
                LayerChange::Replaced { kind, index }
            }
            Err(reason) => LayerChange::Unchanged { kind, reason },
        };
        self.log_change(&change);
        change
    }

    pub fn remove_layer(&mut self, kind: LayerKind) -> LayerChange {
        let change = match self.position(kind) {
            Some(index) => {
                self.visual.remove(index);
                self.active.remove(index);
                LayerChange::Removed { kind, index }
            }
            None => LayerChange::Unchanged {
                kind,
                reason: NoChange::NotActive,
            },
        };
        self.log_change(&change);
        change
    }

    /// Drops every overlay and re-adds the primary layer from `result`.
    pub fn reset_all(
        &mut self,
        result: Option<&ScenarioResult>,
        selections: &UISelections,
    ) -> LayerChange {
        self.visual.clear();
        self.active.clear();
        let primary = self.catalog.primary;
        match self.resolve(primary, result, selections) {
            Ok((layer, overlay)) => {
                self.visual.insert(0, overlay);
                self.active.push(layer);
            }
            Err(reason) => {
                debug!(layer = primary.as_str(), ?reason, "primary layer not restored");
            }
        }
        let change = LayerChange::Reset {
            active: self.active.len(),
        };
        self.log_change(&change);
        change
    }

    /// Both stacks have the same length and agree entry by entry.
    pub fn is_consistent(&self) -> bool {
        self.visual.len() == self.active.len()
            && self.active.iter().enumerate().all(|(i, layer)| {
                self.visual
                    .get(i)
                    .is_some_and(|o| o.kind == layer.kind && o.credential == layer.credential)
            })
            && self
                .active
                .iter()
                .enumerate()
                .all(|(i, layer)| !self.active[..i].iter().any(|l| l.kind == layer.kind))
    }

    fn resolve(
        &self,
        kind: LayerKind,
        result: Option<&ScenarioResult>,
        selections: &UISelections,
    ) -> Result<(ActiveLayer, TileOverlay), NoChange> {
        let result = result.ok_or(NoChange::NoResult)?;
        let spec = self.catalog.spec(kind).ok_or(NoChange::NotInCatalog)?;
        let choice = self
            .catalog
            .resolve(kind, selections)
            .ok_or(NoChange::NotInCatalog)?;
        let credential = result
            .tiles
            .get(choice.group, choice.variant)
            .ok_or(NoChange::MissingCredential(choice))?
            .clone();
        let overlay = TileOverlay {
            kind,
            credential: credential.clone(),
            opacity: spec.opacity,
        };
        Ok((
            ActiveLayer {
                kind,
                choice,
                credential,
            },
            overlay,
        ))
    }

    fn log_change(&self, change: &LayerChange) {
        debug_assert!(self.is_consistent(), "overlay stacks diverged");
        match change {
            LayerChange::Unchanged { kind, reason } => {
                debug!(layer = kind.as_str(), ?reason, "overlay stack unchanged");
            }
            _ => info!(?change, stack = ?self.active_kinds(), "overlay stack updated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{LandcoverScenario, ModelView};
    use smoke_protocol::TileCredentialTable;

    fn result_with(groups: Vec<Vec<(&str, &str)>>) -> ScenarioResult {
        ScenarioResult {
            tiles: TileCredentialTable::from_groups(
                groups
                    .into_iter()
                    .map(|g| {
                        g.into_iter()
                            .map(|(id, tok)| TileCredential::new(id, tok))
                            .collect()
                    })
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn full_result() -> ScenarioResult {
        result_with(vec![
            vec![("lc0", "tk0"), ("lc1", "tk1"), ("lc2", "tk2")],
            vec![("em0", "te0")],
            vec![("sens0", "ts0"), ("pm0", "tp0")],
            vec![("hl0", "th0")],
        ])
    }

    fn booted(result: &ScenarioResult, sel: &UISelections) -> LayerOverlayManager {
        let mut manager: LayerOverlayManager = LayerOverlayManager::default();
        manager.reset_all(Some(result), sel);
        manager
    }

    #[test]
    fn single_group_boot_shows_primary_layer() {
        let result = result_with(vec![vec![("m0", "t0")]]);
        let mut manager = LayerOverlayManager::new(
            LayerCatalog::default().fitted_to(result.tiles.group_count()),
            MapOverlays::default(),
        );
        manager.reset_all(Some(&result), &UISelections::default());
        assert_eq!(manager.active_kinds(), vec![LayerKind::Model]);
        assert_eq!(
            manager.visual().as_slice()[0].credential,
            TileCredential::new("m0", "t0")
        );
    }

    #[test]
    fn toggle_adds_landcover_with_tile_url() {
        let result = full_result();
        let sel = UISelections::default();
        let mut manager = booted(&result, &sel);
        let change = manager.toggle_layer(LayerKind::Landcover, Some(&result), &sel);
        assert_eq!(
            change,
            LayerChange::Added {
                kind: LayerKind::Landcover,
                index: 1
            }
        );
        let overlay = &manager.visual().as_slice()[1];
        assert_eq!(overlay.opacity, LayerKind::Landcover.default_opacity());
        let url = overlay.tile_url(smoke_protocol::DEFAULT_EE_BASE_URL, 3, 4, 5);
        assert!(url.starts_with("https://earthengine.googleapis.com/map/lc0/"));
        assert!(url.ends_with("?token=tk0"));
    }

    #[test]
    fn toggling_twice_restores_previous_stack() {
        let result = full_result();
        let sel = UISelections::default();
        let mut manager = booted(&result, &sel);
        manager.toggle_layer(LayerKind::Emissions, Some(&result), &sel);
        let before_active = manager.active().to_vec();
        let before_visual = manager.visual().clone();

        manager.toggle_layer(LayerKind::Landcover, Some(&result), &sel);
        assert_eq!(manager.active().len(), 3);
        manager.toggle_layer(LayerKind::Landcover, Some(&result), &sel);

        assert_eq!(manager.active(), before_active.as_slice());
        assert_eq!(manager.visual(), &before_visual);
    }

    #[test]
    fn removing_middle_layer_detaches_the_matching_overlay() {
        let result = full_result();
        let sel = UISelections::default();
        let mut manager = booted(&result, &sel);
        manager.toggle_layer(LayerKind::Landcover, Some(&result), &sel);
        manager.toggle_layer(LayerKind::Health, Some(&result), &sel);

        let change = manager.toggle_layer(LayerKind::Landcover, Some(&result), &sel);
        assert_eq!(
            change,
            LayerChange::Removed {
                kind: LayerKind::Landcover,
                index: 1
            }
        );
        let kinds: Vec<_> = manager.visual().iter().map(|o| o.kind).collect();
        assert_eq!(kinds, vec![LayerKind::Model, LayerKind::Health]);
        assert!(manager.is_consistent());
    }

    #[test]
    fn switch_variant_keeps_stack_position() {
        let result = full_result();
        let mut sel = UISelections::default();
        let mut manager = booted(&result, &sel);
        manager.toggle_layer(LayerKind::Landcover, Some(&result), &sel);
        manager.toggle_layer(LayerKind::Health, Some(&result), &sel);
        assert_eq!(
            manager.active_kinds(),
            vec![LayerKind::Model, LayerKind::Landcover, LayerKind::Health]
        );

        sel.landcover = Some(LandcoverScenario::Bau2015);
        let change = manager.switch_variant(LayerKind::Landcover, Some(&result), &sel);
        assert_eq!(
            change,
            LayerChange::Replaced {
                kind: LayerKind::Landcover,
                index: 1
            }
        );
        assert_eq!(
            manager.active_kinds(),
            vec![LayerKind::Model, LayerKind::Landcover, LayerKind::Health]
        );
        assert_eq!(manager.active()[1].credential, TileCredential::new("lc2", "tk2"));
        assert_eq!(
            manager.visual().as_slice()[1].credential,
            TileCredential::new("lc2", "tk2")
        );
        assert_eq!(manager.active()[0].credential, TileCredential::new("sens0", "ts0"));
        assert_eq!(manager.active()[2].credential, TileCredential::new("hl0", "th0"));
    }

    #[test]
    fn switch_variant_ignores_inactive_layers() {
        let result = full_result();
        let sel = UISelections::default();
        let mut manager = booted(&result, &sel);
        let change = manager.switch_variant(LayerKind::Landcover, Some(&result), &sel);
        assert_eq!(
            change,
            LayerChange::Unchanged {
                kind: LayerKind::Landcover,
                reason: NoChange::NotActive
            }
        );
        assert_eq!(manager.active_kinds(), vec![LayerKind::Model]);
    }

    #[test]
    fn switch_to_missing_variant_keeps_old_layer() {
        let result = full_result();
        let mut sel = UISelections::default();
        let mut manager = booted(&result, &sel);
        manager.toggle_layer(LayerKind::Landcover, Some(&result), &sel);
        let before = manager.active().to_vec();

        sel.landcover = Some(LandcoverScenario::Bau2030);
        let change = manager.switch_variant(LayerKind::Landcover, Some(&result), &sel);
        assert!(matches!(
            change,
            LayerChange::Unchanged {
                reason: NoChange::MissingCredential(VariantChoice {
                    group: 0,
                    variant: 5
                }),
                ..
            }
        ));
        assert_eq!(manager.active(), before.as_slice());
        assert!(manager.is_consistent());
    }

    #[test]
    fn model_switch_swaps_sensitivity_for_concentration() {
        let result = full_result();
        let mut sel = UISelections::default();
        let mut manager = booted(&result, &sel);
        sel.model = Some(ModelView::Concentration);
        manager.switch_variant(LayerKind::Model, Some(&result), &sel);
        assert_eq!(manager.active()[0].credential, TileCredential::new("pm0", "tp0"));

        let change = manager.switch_variant(LayerKind::Model, Some(&result), &sel);
        assert!(matches!(
            change,
            LayerChange::Unchanged {
                reason: NoChange::SameVariant,
                ..
            }
        ));
    }

    #[test]
    fn nothing_is_added_before_first_result() {
        let mut manager: LayerOverlayManager = LayerOverlayManager::default();
        let sel = UISelections::default();
        let change = manager.toggle_layer(LayerKind::Landcover, None, &sel);
        assert_eq!(
            change,
            LayerChange::Unchanged {
                kind: LayerKind::Landcover,
                reason: NoChange::NoResult
            }
        );
        assert!(manager.visual().is_empty());
    }

    #[test]
    fn missing_credential_is_a_silent_no_op() {
        let result = result_with(vec![vec![("lc0", "tk0")]]);
        let sel = UISelections::default();
        let mut manager: LayerOverlayManager = LayerOverlayManager::default();
        let change = manager.toggle_layer(LayerKind::Health, Some(&result), &sel);
        assert!(!change.is_change());
        assert!(manager.active().is_empty());
        assert!(manager.is_consistent());
    }

    #[test]
    fn removing_absent_layer_is_a_no_op() {
        let mut manager: LayerOverlayManager = LayerOverlayManager::default();
        assert!(!manager.remove_layer(LayerKind::Emissions).is_change());
    }

    #[test]
    fn reset_leaves_only_primary() {
        let result = full_result();
        let sel = UISelections::default();
        let mut manager = booted(&result, &sel);
        for kind in LayerKind::ALL {
            manager.toggle_layer(kind, Some(&result), &sel);
        }
        manager.reset_all(Some(&result), &sel);
        assert_eq!(manager.active_kinds(), vec![LayerKind::Model]);
        assert_eq!(manager.visual().len(), 1);
    }

    #[test]
    fn toggle_sequences_never_duplicate_a_layer() {
        let result = full_result();
        let sel = UISelections {
            landcover: None,
            model: None,
        };
        let mut manager = booted(&result, &sel);
        // Deterministic pseudo-random walk over all kinds.
        let mut state = 0x2545_f491_u32;
        for _ in 0..500 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let kind = LayerKind::ALL[(state % 4) as usize];
            if state % 3 == 0 {
                manager.switch_variant(kind, Some(&result), &sel);
            } else {
                manager.toggle_layer(kind, Some(&result), &sel);
            }
            assert!(manager.is_consistent());
            assert!(manager.active().len() <= LayerKind::ALL.len());
        }
    }
}
