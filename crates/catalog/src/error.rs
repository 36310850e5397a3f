use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors raised while loading the package index. All of these are fatal to
/// startup; per-entry problems inside the index are skipped, not reported here.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to fetch package index: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Malformed package index: {0}")]
    Parse(#[from] serde_json::Error),
}
