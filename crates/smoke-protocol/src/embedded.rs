use serde::de::DeserializeOwned;

use crate::ProtocolError;

/// Decodes a response field that carries JSON inside a JSON string.
///
/// Legacy wire artifact: the backend runs `json.dumps` on every array-valued
/// field before serializing the whole response, so the transport-level decode
/// only yields a string and the payload has to be decoded a second time here.
/// Kept as-is for backend compatibility.
pub fn decode_embedded<T: DeserializeOwned>(
    field: &'static str,
    raw: Option<&str>,
) -> Result<T, ProtocolError> {
    let raw = raw.ok_or(ProtocolError::MissingField(field))?;
    serde_json::from_str(raw).map_err(|source| ProtocolError::EmbeddedJson { field, source })
}
