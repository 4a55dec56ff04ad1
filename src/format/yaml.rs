//! YAML encoding for the config store

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{DecodeError, EncodeError};

/// Serializes a value to a YAML document.
pub fn to_yaml<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_yaml::to_string(value)?.into_bytes())
}

/// Parses a single YAML document into the requested shape.
pub fn from_yaml<T: DeserializeOwned>(data: &[u8]) -> Result<T, DecodeError> {
    Ok(serde_yaml::from_slice(data)?)
}

/// Like [`from_yaml`], but a file holding nothing but whitespace yields
/// `T::default()`.
pub fn from_yaml_or_default<T: DeserializeOwned + Default>(data: &[u8]) -> Result<T, DecodeError> {
    if is_blank(data) {
        return Ok(T::default());
    }
    from_yaml(data)
}

fn is_blank(data: &[u8]) -> bool {
    data.iter().all(u8::is_ascii_whitespace)
}
