//! Metadata loader: populates the catalog once at startup.
//!
//! Write-through cache with no expiry: the local cache file is used as long
//! as it exists, however stale; remove it to force a re-fetch.

use crate::error::Result;
use crate::store::{Catalog, PackageRecord};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Remote package index, fetched once when no local cache exists.
pub const DEFAULT_INDEX_URL: &str =
    "https://raw.githubusercontent.com/pkgforge-dev/NixOS-Packages/refs/heads/main/nixpkgs.json";

const CACHE_FILE_ENV: &str = "NIXPKGS_MCP_CACHE_FILE";
const INDEX_URL_ENV: &str = "NIXPKGS_MCP_INDEX_URL";

/// Where the loader reads the index from.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub cache_file: PathBuf,
    pub index_url: String,
}

impl LoaderConfig {
    /// Default paths with `NIXPKGS_MCP_CACHE_FILE` / `NIXPKGS_MCP_INDEX_URL`
    /// overrides.
    pub fn from_env() -> Self {
        let cache_file = std::env::var(CACHE_FILE_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_cache_file);

        let index_url = std::env::var(INDEX_URL_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_INDEX_URL.to_string());

        Self {
            cache_file,
            index_url,
        }
    }

    fn default_cache_file() -> PathBuf {
        let base = dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
            .unwrap_or_else(|| PathBuf::from(".cache"));
        base.join("nixpkgs-mcp").join("nixpkgs.json")
    }
}

/// Raw index entry. Every field is optional upstream.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    pname: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

/// Load the full catalog: read the cache file if present, otherwise fetch the
/// remote index and persist it, then parse. Any IO/network/top-level parse
/// failure is fatal; the server must not start with a partial catalog.
pub async fn load_catalog(config: &LoaderConfig) -> Result<Catalog> {
    let raw = if config.cache_file.exists() {
        log::info!(
            "Loading cached nixpkgs metadata from {}",
            config.cache_file.display()
        );
        tokio::fs::read(&config.cache_file).await?
    } else {
        log::info!("Downloading nixpkgs metadata from {}", config.index_url);
        let body = reqwest::get(&config.index_url)
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        if let Some(parent) = config.cache_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&config.cache_file, &body).await?;
        body.to_vec()
    };

    // Document order matters here: preserve_order makes last-seen-wins on
    // duplicate extracted names deterministic.
    let index: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&raw)?;
    let catalog = catalog_from_index(index);
    log::info!("Loaded {} packages", catalog.len());
    Ok(catalog)
}

fn catalog_from_index(index: serde_json::Map<String, serde_json::Value>) -> Catalog {
    let mut packages: HashMap<String, PackageRecord> = HashMap::with_capacity(index.len());

    for (key, value) in index {
        // Key format: "legacyPackages.x86_64-linux.PACKAGE_NAME". Keys with
        // fewer than three segments are non-package entries, not errors.
        let Some(name) = package_name_from_key(&key) else {
            continue;
        };

        let entry: RawEntry = match serde_json::from_value(value) {
            Ok(entry) => entry,
            Err(err) => {
                log::debug!("Skipping malformed index entry '{key}': {err}");
                continue;
            }
        };

        let record = PackageRecord {
            display_name: entry.pname.unwrap_or_else(|| name.to_string()),
            description: entry.description.unwrap_or_default(),
            version: entry.version.unwrap_or_default(),
            name: name.to_string(),
        };
        packages.insert(record.name.clone(), record);
    }

    Catalog::new(packages)
}

fn package_name_from_key(key: &str) -> Option<&str> {
    let segments: Vec<&str> = key.split('.').collect();
    if segments.len() < 3 {
        return None;
    }
    segments.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn index(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn extracts_last_segment_as_package_name() {
        let catalog = catalog_from_index(index(json!({
            "legacyPackages.x86_64-linux.ripgrep": {
                "pname": "ripgrep",
                "description": "Line-oriented search tool",
                "version": "14.1.0"
            }
        })));

        let record = catalog.lookup("ripgrep").expect("ripgrep loaded");
        assert_eq!(record.description, "Line-oriented search tool");
        assert_eq!(record.version, "14.1.0");
    }

    #[test]
    fn skips_keys_with_fewer_than_three_segments() {
        let catalog = catalog_from_index(index(json!({
            "legacyPackages.ripgrep": {"pname": "ripgrep"},
            "version": {"pname": "version"}
        })));
        assert!(catalog.is_empty());
    }

    #[test]
    fn last_seen_wins_on_duplicate_names() {
        let catalog = catalog_from_index(index(json!({
            "legacyPackages.x86_64-linux.hello": {"version": "1.0"},
            "legacyPackages.aarch64-linux.hello": {"version": "2.0"}
        })));

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.lookup("hello").map(|r| r.version.as_str()), Some("2.0"));
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let catalog = catalog_from_index(index(json!({
            "legacyPackages.x86_64-linux.good": {"version": "1.0"},
            "legacyPackages.x86_64-linux.bad": "not an object"
        })));

        assert!(catalog.contains("good"));
        assert!(!catalog.contains("bad"));
    }

    #[test]
    fn missing_fields_get_defaults() {
        let catalog = catalog_from_index(index(json!({
            "legacyPackages.x86_64-linux.bare": {}
        })));

        let record = catalog.lookup("bare").expect("bare loaded");
        assert_eq!(record.display_name, "bare");
        assert_eq!(record.description, "");
        assert_eq!(record.version, "");
    }

    #[tokio::test]
    async fn loads_from_cache_file_when_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache_file = dir.path().join("nixpkgs.json");
        std::fs::write(
            &cache_file,
            serde_json::to_vec(&json!({
                "legacyPackages.x86_64-linux.jq": {
                    "pname": "jq",
                    "description": "JSON processor",
                    "version": "1.7"
                }
            }))
            .expect("serialize"),
        )
        .expect("write cache");

        let config = LoaderConfig {
            cache_file,
            // Unreachable on purpose: the cache must satisfy the load.
            index_url: "http://127.0.0.1:1/nixpkgs.json".to_string(),
        };
        let catalog = load_catalog(&config).await.expect("load from cache");
        assert!(catalog.contains("jq"));
    }

    #[tokio::test]
    async fn fetch_failure_without_cache_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = LoaderConfig {
            cache_file: dir.path().join("missing").join("nixpkgs.json"),
            index_url: "http://127.0.0.1:1/nixpkgs.json".to_string(),
        };

        let err = load_catalog(&config).await.expect_err("load must fail");
        assert!(matches!(err, crate::CatalogError::Fetch(_)));
    }
}
