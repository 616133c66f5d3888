use serde::{Deserialize, Serialize};

use crate::{ProtocolError, decode_embedded};

pub const KNOWN_RECEPTORS: [&str; 4] = [
    "Singapore",
    "Malaysia",
    "Indonesia",
    "Population_weighted_SEAsia",
];
pub const DEFAULT_RECEPTOR: &str = "Population_weighted_SEAsia";

/// `GFED4` uses observed fire emissions, `BAU` the land-use transition model.
pub const KNOWN_SCENARIOS: [&str; 2] = ["GFED4", "BAU"];
pub const DEFAULT_SCENARIO: &str = "GFED4";

pub const DEFAULT_MET_YEAR: u16 = 2008;
pub const DEFAULT_EMISS_YEAR: u16 = 2008;

/// Parameters of one `GET /details` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailsQuery {
    pub receptor: String,
    #[serde(rename = "metYear")]
    pub met_year: u16,
    #[serde(rename = "emissYear")]
    pub emiss_year: u16,
    pub scenario: String,
    pub logging: bool,
    pub oilpalm: bool,
    pub timber: bool,
    pub peatlands: bool,
    pub conservation: bool,
}

impl Default for DetailsQuery {
    fn default() -> Self {
        Self {
            receptor: DEFAULT_RECEPTOR.to_string(),
            met_year: DEFAULT_MET_YEAR,
            emiss_year: DEFAULT_EMISS_YEAR,
            scenario: DEFAULT_SCENARIO.to_string(),
            logging: false,
            oilpalm: false,
            timber: false,
            peatlands: false,
            conservation: false,
        }
    }
}

impl DetailsQuery {
    /// Query-string pairs in the order the backend documents them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("receptor", self.receptor.clone()),
            ("metYear", self.met_year.to_string()),
            ("emissYear", self.emiss_year.to_string()),
            ("scenario", self.scenario.clone()),
            ("logging", self.logging.to_string()),
            ("oilpalm", self.oilpalm.to_string()),
            ("timber", self.timber.to_string()),
            ("peatlands", self.peatlands.to_string()),
            ("conservation", self.conservation.to_string()),
        ]
    }

    pub fn has_known_receptor(&self) -> bool {
        KNOWN_RECEPTORS.contains(&self.receptor.as_str())
    }
}

/// Raw `/details` body after the transport-level decode. Array-valued fields
/// are still JSON strings; see [`decode_embedded`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailsResponse {
    #[serde(rename = "eeMapId")]
    pub ee_map_id: Option<String>,
    #[serde(rename = "eeToken")]
    pub ee_token: Option<String>,
    #[serde(rename = "totalPM")]
    pub total_pm: Option<f64>,
    pub provincial: Option<String>,
    pub timeseries: Option<String>,
    pub endeaths: Option<String>,
    pub lndeaths: Option<String>,
    pub pndeaths: Option<String>,
    pub a14deaths: Option<String>,
    pub adultdeaths: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetailsResponse {
    pub fn from_json_str(body: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Values the page is rendered with on first load: the initial tile table,
/// the boundary region ids and whatever scenario fields the server included.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootPayload {
    #[serde(flatten)]
    pub details: DetailsResponse,
    pub boundaries: Option<String>,
}

impl BootPayload {
    pub fn from_json_str(body: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(body)?)
    }

    pub fn region_ids(&self) -> Result<Vec<String>, ProtocolError> {
        match self.boundaries.as_deref() {
            Some(raw) => decode_embedded("boundaries", Some(raw)),
            None => Ok(vec![]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs_carry_all_toggles_as_words() {
        let query = DetailsQuery {
            receptor: "Singapore".to_string(),
            met_year: 2006,
            emiss_year: 2025,
            scenario: "BAU".to_string(),
            peatlands: true,
            ..Default::default()
        };
        let pairs = query.query_pairs();
        assert_eq!(pairs.len(), 9);
        assert_eq!(pairs[0], ("receptor", "Singapore".to_string()));
        assert_eq!(pairs[1], ("metYear", "2006".to_string()));
        assert_eq!(pairs[2], ("emissYear", "2025".to_string()));
        assert_eq!(pairs[4], ("logging", "false".to_string()));
        assert_eq!(pairs[7], ("peatlands", "true".to_string()));
    }

    #[test]
    fn default_query_targets_known_receptor() {
        assert!(DetailsQuery::default().has_known_receptor());
        let query = DetailsQuery {
            receptor: "Atlantis".to_string(),
            ..Default::default()
        };
        assert!(!query.has_known_receptor());
    }

    #[test]
    fn boot_payload_reads_region_ids_and_flattened_fields() {
        let boot = BootPayload::from_json_str(
            r#"{"eeMapId":"[[\"m0\"]]","eeToken":"[[\"t0\"]]","totalPM":1.5,
                "boundaries":"[\"kalimantan\",\"sumatra\"]"}"#,
        )
        .unwrap();
        assert_eq!(boot.region_ids().unwrap(), vec!["kalimantan", "sumatra"]);
        assert_eq!(boot.details.total_pm, Some(1.5));
        assert!(boot.details.timeseries.is_none());
    }
}
