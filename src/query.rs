use crate::{
    boundaries::{check_region_id, region_path},
    error::ExplorerError,
    scenario::ScenarioResult,
};
use smoke_protocol::{DetailsQuery, DetailsResponse, KNOWN_RECEPTORS};
use std::{fs, path::PathBuf, time::Duration};
use tracing::{debug, info};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Where boundary files are read from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegionSource {
    /// `{backend}/static/regions/{id}.json`
    Backend,
    /// `{dir}/{id}.json` on the local filesystem.
    Directory(PathBuf),
}

/// The two remote reads the explorer performs.
pub trait DetailsTransport: Send + Sync {
    /// Body of `GET /details` for `query`.
    fn get_details(&self, query: &DetailsQuery) -> Result<String, ExplorerError>;

    /// Raw boundary GeoJSON for one region id.
    fn get_region(&self, region_id: &str) -> Result<String, ExplorerError>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
    backend_url: String,
    regions: RegionSource,
}

impl HttpTransport {
    pub fn new(
        backend_url: &str,
        timeout: Duration,
        regions: RegionSource,
    ) -> Result<Self, ExplorerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExplorerError::network(format!("Could not build HTTP client: {e}")))?;
        Ok(Self {
            client,
            backend_url: backend_url.trim_end_matches('/').to_string(),
            regions,
        })
    }

    fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, ExplorerError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| ExplorerError::network(format!("Could not fetch '{url}': {e}")))?;
        if !response.status().is_success() {
            return Err(ExplorerError::network(format!(
                "Could not fetch '{url}': HTTP {}",
                response.status()
            )));
        }
        response
            .text()
            .map_err(|e| ExplorerError::network(format!("Could not read response '{url}': {e}")))
    }
}

impl DetailsTransport for HttpTransport {
    fn get_details(&self, query: &DetailsQuery) -> Result<String, ExplorerError> {
        let url = format!("{}/details", self.backend_url);
        self.get_text(&url, &query.query_pairs())
    }

    fn get_region(&self, region_id: &str) -> Result<String, ExplorerError> {
        check_region_id(region_id)?;
        match &self.regions {
            RegionSource::Backend => {
                let url = format!(
                    "{}/{}",
                    self.backend_url,
                    region_path(region_id)
                );
                self.get_text(&url, &[])
            }
            RegionSource::Directory(dir) => {
                let path = dir.join(format!("{region_id}.json"));
                fs::read_to_string(&path).map_err(|e| {
                    ExplorerError::network(format!(
                        "Could not read region file '{}': {e}",
                        path.display()
                    ))
                })
            }
        }
    }
}

/// Hands out increasing tickets; only the latest one may be applied.
#[derive(Debug, Default)]
pub struct QueryTracker {
    issued: u64,
    in_flight: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryTicket(u64);

impl QueryTicket {
    pub fn sequence(self) -> u64 {
        self.0
    }
}

impl QueryTracker {
    pub fn issue(&mut self) -> QueryTicket {
        self.issued += 1;
        self.in_flight = true;
        QueryTicket(self.issued)
    }

    pub fn is_current(&self, ticket: QueryTicket) -> bool {
        ticket.0 == self.issued
    }

    /// True when `ticket` is current; the tracker then considers it settled.
    pub fn settle(&mut self, ticket: QueryTicket) -> bool {
        if !self.is_current(ticket) {
            debug!(
                ticket = ticket.0,
                latest = self.issued,
                "discarding superseded response"
            );
            return false;
        }
        self.in_flight = false;
        true
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }
}

/// Issues `/details` queries and normalizes their responses.
pub struct ScenarioQueryClient<T: DetailsTransport> {
    transport: T,
}

impl<T: DetailsTransport> ScenarioQueryClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn fetch(&self, query: &DetailsQuery) -> Result<ScenarioResult, ExplorerError> {
        validate_query(query)?;
        info!(
            receptor = %query.receptor,
            met_year = query.met_year,
            emiss_year = query.emiss_year,
            scenario = %query.scenario,
            "querying scenario details"
        );
        let body = self.transport.get_details(query)?;
        let response = DetailsResponse::from_json_str(&body)?;
        ScenarioResult::from_response(&response)
    }
}

pub fn validate_query(query: &DetailsQuery) -> Result<(), ExplorerError> {
    if !query.has_known_receptor() {
        return Err(ExplorerError::invalid_input(format!(
            "Unknown receptor '{}', expected one of {}",
            query.receptor,
            KNOWN_RECEPTORS.join(", ")
        )));
    }
    if query.scenario.trim().is_empty() {
        return Err(ExplorerError::invalid_input("Scenario must not be empty"));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::CannedTransport;
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn fetch_normalizes_response() {
        let client = ScenarioQueryClient::new(CannedTransport::with_details(vec![Ok(
            include_str!("../test_files/details.nested.json").to_string(),
        )]));
        let result = client.fetch(&DetailsQuery::default()).unwrap();
        assert_eq!(result.total_pm, 12.5);
        let sent = client.transport().detail_requests.lock().unwrap();
        assert_eq!(sent[0].receptor, "Population_weighted_SEAsia");
    }

    #[test]
    fn transport_failure_is_network_error() {
        let client = ScenarioQueryClient::new(CannedTransport::with_details(vec![Err(
            ExplorerError::network("timed out"),
        )]));
        let err = client.fetch(&DetailsQuery::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::Network);
    }

    #[test]
    fn non_json_body_is_malformed() {
        let client = ScenarioQueryClient::new(CannedTransport::with_details(vec![Ok(
            "<html>502</html>".to_string(),
        )]));
        let err = client.fetch(&DetailsQuery::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedResponse);
    }

    #[test]
    fn unknown_receptor_is_rejected_before_sending() {
        let client = ScenarioQueryClient::new(CannedTransport::default());
        let query = DetailsQuery {
            receptor: "Atlantis".to_string(),
            ..Default::default()
        };
        let err = client.fetch(&query).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(client.transport().detail_requests.lock().unwrap().is_empty());
    }

    #[test]
    fn only_latest_ticket_settles() {
        let mut tracker = QueryTracker::default();
        let a = tracker.issue();
        let b = tracker.issue();
        assert!(tracker.in_flight());
        assert!(!tracker.settle(a));
        assert!(tracker.in_flight());
        assert!(tracker.settle(b));
        assert!(!tracker.in_flight());
        assert!(b > a);
    }

    #[test]
    fn local_region_directory_is_read_by_id() {
        let transport = HttpTransport::new(
            DEFAULT_BACKEND_URL,
            Duration::from_secs(1),
            RegionSource::Directory(PathBuf::from("test_files/regions")),
        )
        .unwrap();
        let text = transport.get_region("kalimantan").unwrap();
        assert!(text.contains("Kalimantan"));
        let err = transport.get_region("atlantis").unwrap_err();
        assert_eq!(err.code, ErrorCode::Network);
    }

    #[test]
    fn region_ids_cannot_escape_the_region_directory() {
        let dir = tempfile::tempdir().unwrap();
        let regions = dir.path().join("regions");
        fs::create_dir(&regions).unwrap();
        fs::write(dir.path().join("secret.json"), "{}").unwrap();
        let transport = HttpTransport::new(
            DEFAULT_BACKEND_URL,
            Duration::from_secs(1),
            RegionSource::Directory(regions),
        )
        .unwrap();
        let err = transport.get_region("../secret").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(err.message.contains("../secret"));
    }
}
