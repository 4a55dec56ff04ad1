//! On-disk formats
//!
//! Pure encoders and decoders without any I/O concerns.
//!
//! | Store | Format | Module |
//! |-------|--------|--------|
//! | Config | YAML (one or more documents) | [`yaml`] |
//! | Cache | `key=value` lines, values escaped | [`flatmap`] |

pub mod escape;
pub mod flatmap;
pub mod yaml;

use thiserror::Error;

pub use escape::{escape_returns, unescape_returns};
pub use flatmap::{from_flat, to_flat};
pub use yaml::{from_yaml, from_yaml_or_default, to_yaml};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid YAML: {0}")]
    Scan(#[from] yaml_rust2::scanner::ScanError),

    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
