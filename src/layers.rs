use serde::{Deserialize, Serialize};
use tracing::debug;

/// Conceptual overlay layers the backend publishes tiles for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    Landcover,
    Emissions,
    Model,
    Health,
}

impl LayerKind {
    pub const ALL: [LayerKind; 4] = [
        LayerKind::Landcover,
        LayerKind::Emissions,
        LayerKind::Model,
        LayerKind::Health,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landcover => "LANDCOVER",
            Self::Emissions => "EMISSIONS",
            Self::Model => "MODEL",
            Self::Health => "HEALTH",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Landcover => "Land cover",
            Self::Emissions => "Fire emissions",
            Self::Model => "Modeled PM2.5",
            Self::Health => "Health impact",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let norm = text.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|k| k.as_str() == norm)
    }

    /// Position of this layer in the backend tile table.
    pub fn default_group(self) -> usize {
        match self {
            Self::Landcover => 0,
            Self::Emissions => 1,
            Self::Model => 2,
            Self::Health => 3,
        }
    }

    pub fn default_opacity(self) -> f32 {
        match self {
            Self::Landcover => 0.6,
            Self::Emissions => 0.5,
            Self::Model => 0.4,
            Self::Health => 0.4,
        }
    }

    /// Maps the current radio selections to a variant index. A missing
    /// selection falls back to variant 0.
    pub fn variant_for(self, selections: &UISelections) -> VariantPick {
        let picked = match self {
            Self::Landcover => Some(selections.landcover.map(LandcoverScenario::index)),
            Self::Model => Some(selections.model.map(ModelView::index)),
            Self::Emissions | Self::Health => None,
        };
        match picked {
            None => VariantPick::exact(0),
            Some(Some(variant)) => VariantPick::exact(variant),
            Some(None) => VariantPick {
                variant: 0,
                fell_back: true,
            },
        }
    }

    pub fn legend(self) -> Legend {
        match self {
            Self::Landcover => Legend {
                title: "Land cover class",
                entries: vec![
                    LegendEntry::new("Degraded", [0x9d, 0x9d, 0x9d]),
                    LegendEntry::new("Intact", [0x00, 0x00, 0x00]),
                    LegendEntry::new("Non-Forest", [0xfd, 0xb7, 0x51]),
                    LegendEntry::new("Plantation", [0xff, 0x00, 0x00]),
                ],
                continuous: false,
            },
            Self::Emissions => Legend::ramp("OC + BC emissions", [0xaa, 0x00, 0x00]),
            Self::Model => Legend::ramp("PM2.5 / sensitivity", [0x22, 0x00, 0x66]),
            Self::Health => Legend::ramp("Population exposure", [0x60, 0x00, 0x20]),
        }
    }
}

/// Land-cover maps: the present-day map and business-as-usual projections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LandcoverScenario {
    Present,
    Bau2010,
    Bau2015,
    Bau2020,
    Bau2025,
    Bau2030,
}

impl LandcoverScenario {
    pub const ALL: [LandcoverScenario; 6] = [
        Self::Present,
        Self::Bau2010,
        Self::Bau2015,
        Self::Bau2020,
        Self::Bau2025,
        Self::Bau2030,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Present => 0,
            Self::Bau2010 => 1,
            Self::Bau2015 => 2,
            Self::Bau2020 => 3,
            Self::Bau2025 => 4,
            Self::Bau2030 => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Present => "Present (2005)",
            Self::Bau2010 => "BAU 2010",
            Self::Bau2015 => "BAU 2015",
            Self::Bau2020 => "BAU 2020",
            Self::Bau2025 => "BAU 2025",
            Self::Bau2030 => "BAU 2030",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelView {
    Sensitivity,
    Concentration,
}

impl ModelView {
    pub const ALL: [ModelView; 2] = [Self::Sensitivity, Self::Concentration];

    pub fn index(self) -> usize {
        match self {
            Self::Sensitivity => 0,
            Self::Concentration => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Sensitivity => "Sensitivity",
            Self::Concentration => "Concentration",
        }
    }
}

/// Radio-button state the overlay logic resolves variants against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UISelections {
    pub landcover: Option<LandcoverScenario>,
    pub model: Option<ModelView>,
}

impl Default for UISelections {
    fn default() -> Self {
        Self {
            landcover: Some(LandcoverScenario::Present),
            model: Some(ModelView::Sensitivity),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VariantPick {
    pub variant: usize,
    pub fell_back: bool,
}

impl VariantPick {
    fn exact(variant: usize) -> Self {
        Self {
            variant,
            fell_back: false,
        }
    }
}

/// Fully resolved tile-table address of one layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VariantChoice {
    pub group: usize,
    pub variant: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub kind: LayerKind,
    pub group: usize,
    pub opacity: f32,
}

impl LayerSpec {
    pub fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            group: kind.default_group(),
            opacity: kind.default_opacity(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerCatalog {
    pub layers: Vec<LayerSpec>,
    pub primary: LayerKind,
}

impl Default for LayerCatalog {
    fn default() -> Self {
        Self {
            layers: LayerKind::ALL.into_iter().map(LayerSpec::new).collect(),
            primary: LayerKind::Model,
        }
    }
}

impl LayerCatalog {
    /// Catalog for a tile table with `groups` groups. A single-group table
    /// only publishes the primary layer, at group 0.
    pub fn fitted_to(&self, groups: usize) -> Self {
        match self.spec(self.primary) {
            Some(spec) if groups == 1 && self.layers.len() > 1 => Self {
                layers: vec![LayerSpec { group: 0, ..*spec }],
                primary: self.primary,
            },
            _ => self.clone(),
        }
    }

    pub fn spec(&self, kind: LayerKind) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.kind == kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = LayerKind> + '_ {
        self.layers.iter().map(|l| l.kind)
    }

    pub fn resolve(&self, kind: LayerKind, selections: &UISelections) -> Option<VariantChoice> {
        let spec = self.spec(kind)?;
        let pick = kind.variant_for(selections);
        if pick.fell_back {
            debug!(layer = kind.as_str(), "no variant selected, using variant 0");
        }
        Some(VariantChoice {
            group: spec.group,
            variant: pick.variant,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        for (i, layer) in self.layers.iter().enumerate() {
            if self.layers[..i].iter().any(|l| l.kind == layer.kind) {
                return Err(format!("Layer {} is listed twice", layer.kind.as_str()));
            }
            if self.layers[..i].iter().any(|l| l.group == layer.group) {
                return Err(format!(
                    "Layers share tile group {} ({})",
                    layer.group,
                    layer.kind.as_str()
                ));
            }
            if !(0.0..=1.0).contains(&layer.opacity) {
                return Err(format!(
                    "Opacity {} of layer {} is outside 0..1",
                    layer.opacity,
                    layer.kind.as_str()
                ));
            }
        }
        if self.spec(self.primary).is_none() {
            return Err(format!(
                "Primary layer {} is not in the catalog",
                self.primary.as_str()
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegendEntry {
    pub label: &'static str,
    pub rgb: [u8; 3],
}

impl LegendEntry {
    fn new(label: &'static str, rgb: [u8; 3]) -> Self {
        Self { label, rgb }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Legend {
    pub title: &'static str,
    pub entries: Vec<LegendEntry>,
    /// Entries are the two ends of a linear palette rather than classes.
    pub continuous: bool,
}

impl Legend {
    fn ramp(title: &'static str, high: [u8; 3]) -> Self {
        Self {
            title,
            entries: vec![
                LegendEntry::new("low", [0xff, 0xff, 0xff]),
                LegendEntry::new("high", high),
            ],
            continuous: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_legacy_layer_names() {
        assert_eq!(LayerKind::parse("LANDCOVER"), Some(LayerKind::Landcover));
        assert_eq!(LayerKind::parse(" model "), Some(LayerKind::Model));
        assert_eq!(LayerKind::parse("population"), None);
    }

    #[test]
    fn landcover_variant_follows_radio() {
        let sel = UISelections {
            landcover: Some(LandcoverScenario::Bau2025),
            ..Default::default()
        };
        let pick = LayerKind::Landcover.variant_for(&sel);
        assert_eq!(pick.variant, 4);
        assert!(!pick.fell_back);
    }

    #[test]
    fn missing_radio_falls_back_to_first_variant() {
        let sel = UISelections {
            landcover: None,
            model: None,
        };
        for kind in [LayerKind::Landcover, LayerKind::Model] {
            let pick = kind.variant_for(&sel);
            assert_eq!(pick.variant, 0);
            assert!(pick.fell_back);
        }
        assert!(!LayerKind::Emissions.variant_for(&sel).fell_back);
    }

    #[test]
    fn default_catalog_follows_backend_group_order() {
        let catalog = LayerCatalog::default();
        assert!(catalog.validate().is_ok());
        let sel = UISelections {
            model: Some(ModelView::Concentration),
            ..Default::default()
        };
        assert_eq!(
            catalog.resolve(LayerKind::Model, &sel),
            Some(VariantChoice {
                group: 2,
                variant: 1
            })
        );
        assert_eq!(
            catalog.resolve(LayerKind::Landcover, &sel),
            Some(VariantChoice {
                group: 0,
                variant: 0
            })
        );
    }

    #[test]
    fn single_group_table_keeps_only_primary_at_group_zero() {
        let catalog = LayerCatalog::default();
        let fitted = catalog.fitted_to(1);
        assert_eq!(fitted.primary, LayerKind::Model);
        assert_eq!(fitted.layers.len(), 1);
        assert_eq!(fitted.layers[0].group, 0);
        assert_eq!(fitted.layers[0].opacity, LayerKind::Model.default_opacity());
        assert!(fitted.validate().is_ok());
        assert_eq!(catalog.fitted_to(4), catalog);
        assert_eq!(fitted.fitted_to(1), fitted);
    }

    #[test]
    fn catalog_rejects_duplicates_and_missing_primary() {
        let mut catalog = LayerCatalog::default();
        catalog.layers.push(LayerSpec::new(LayerKind::Model));
        assert!(catalog.validate().unwrap_err().contains("twice"));

        let catalog = LayerCatalog {
            layers: vec![LayerSpec::new(LayerKind::Landcover)],
            primary: LayerKind::Model,
        };
        assert!(catalog.validate().unwrap_err().contains("Primary"));
    }

    #[test]
    fn landcover_legend_lists_four_classes() {
        let legend = LayerKind::Landcover.legend();
        assert!(!legend.continuous);
        assert_eq!(legend.entries.len(), 4);
        assert_eq!(legend.entries[3].rgb, [0xff, 0, 0]);
    }
}
