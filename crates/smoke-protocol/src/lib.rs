//! Machine-readable contracts shared between the smoke explorer front ends and
//! the scenario backend: the `/details` query, its response, the boot payload
//! and the tile credentials that address one backend tile layer.

pub mod details;
pub mod embedded;
pub mod error;
pub mod tiles;

pub use details::{
    BootPayload, DEFAULT_EMISS_YEAR, DEFAULT_MET_YEAR, DEFAULT_RECEPTOR, DEFAULT_SCENARIO,
    DetailsQuery, DetailsResponse, KNOWN_RECEPTORS, KNOWN_SCENARIOS,
};
pub use embedded::decode_embedded;
pub use error::ProtocolError;
pub use tiles::{DEFAULT_EE_BASE_URL, TILE_SIZE, TileCredential, TileCredentialTable, tile_url};
