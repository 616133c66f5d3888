use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ProtocolError, decode_embedded};

pub const DEFAULT_EE_BASE_URL: &str = "https://earthengine.googleapis.com";

/// Edge length of one backend tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// Opaque backend-issued pair addressing one tile layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCredential {
    pub map_id: String,
    pub token: String,
}

impl TileCredential {
    pub fn new(map_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            map_id: map_id.into(),
            token: token.into(),
        }
    }

    pub fn tile_url(&self, base_url: &str, x: u32, y: u32, zoom: u32) -> String {
        tile_url(base_url, self, x, y, zoom)
    }
}

/// `{base}/map/{mapId}/{z}/{x}/{y}?token={token}`
pub fn tile_url(base_url: &str, credential: &TileCredential, x: u32, y: u32, zoom: u32) -> String {
    format!(
        "{}/map/{}/{zoom}/{x}/{y}?token={}",
        base_url.trim_end_matches('/'),
        credential.map_id,
        credential.token
    )
}

/// `table[group][variant]`, rebuilt wholesale from every scenario response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileCredentialTable {
    groups: Vec<Vec<TileCredential>>,
}

impl TileCredentialTable {
    pub fn from_groups(groups: Vec<Vec<TileCredential>>) -> Self {
        Self { groups }
    }

    /// Pairs the two parallel nested arrays of ids and tokens. Both must have
    /// the same number of groups and the same number of variants per group.
    pub fn from_nested(
        map_ids: Vec<Vec<String>>,
        tokens: Vec<Vec<String>>,
    ) -> Result<Self, ProtocolError> {
        if map_ids.len() != tokens.len() {
            return Err(ProtocolError::shape(
                "eeToken",
                format!(
                    "{} token groups for {} map id groups",
                    tokens.len(),
                    map_ids.len()
                ),
            ));
        }
        let mut groups = Vec::with_capacity(map_ids.len());
        for (group, (ids, toks)) in map_ids.into_iter().zip(tokens).enumerate() {
            if ids.len() != toks.len() {
                return Err(ProtocolError::shape(
                    "eeToken",
                    format!(
                        "group {group} has {} tokens for {} map ids",
                        toks.len(),
                        ids.len()
                    ),
                ));
            }
            groups.push(
                ids.into_iter()
                    .zip(toks)
                    .map(|(map_id, token)| TileCredential { map_id, token })
                    .collect(),
            );
        }
        Ok(Self { groups })
    }

    /// Decodes the double-encoded `eeMapId` / `eeToken` response fields.
    pub fn from_embedded(map_ids: Option<&str>, tokens: Option<&str>) -> Result<Self, ProtocolError> {
        let map_ids = nested_strings("eeMapId", decode_embedded("eeMapId", map_ids)?)?;
        let tokens = nested_strings("eeToken", decode_embedded("eeToken", tokens)?)?;
        Self::from_nested(map_ids, tokens)
    }

    pub fn get(&self, group: usize, variant: usize) -> Option<&TileCredential> {
        self.groups.get(group)?.get(variant)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn variant_count(&self, group: usize) -> usize {
        self.groups.get(group).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(Vec::is_empty)
    }
}

fn nested_strings(field: &'static str, value: Value) -> Result<Vec<Vec<String>>, ProtocolError> {
    let groups = match value {
        Value::String(_) => return Err(ProtocolError::LegacyShape { field }),
        Value::Array(groups) => groups,
        other => {
            return Err(ProtocolError::shape(
                field,
                format!("expected a nested array, found {other}"),
            ));
        }
    };
    if groups.iter().any(Value::is_string) {
        return Err(ProtocolError::LegacyShape { field });
    }
    groups
        .into_iter()
        .enumerate()
        .map(|(group, variants)| {
            let Value::Array(variants) = variants else {
                return Err(ProtocolError::shape(
                    field,
                    format!("group {group} is not an array"),
                ));
            };
            variants
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s),
                    other => Err(ProtocolError::shape(
                        field,
                        format!("group {group} holds a non-string entry {other}"),
                    )),
                })
                .collect()
        })
        .collect()
}
