use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to '{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("response from '{url}' is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("'{0}' is unavailable")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("fetching {count} {resource} failed: {source}")]
    Transport {
        resource: &'static str,
        count: usize,
        #[source]
        source: TransportError,
    },
    #[error("malformed {resource} document: {source}")]
    Document {
        resource: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("polyline of shape '{shape_id}' could not be decoded: {message}")]
    Polyline { shape_id: String, message: String },
    #[error("{failed} of {total} {resource} batches failed, first error: {first}")]
    BatchFailed {
        resource: &'static str,
        failed: usize,
        total: usize,
        first: Box<FetchError>,
    },
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error accessing settings file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("settings are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
