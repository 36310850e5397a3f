//! # Nixpkgs Catalog
//!
//! In-memory catalog of the nixpkgs package index for the nixpkgs MCP server.
//!
//! ## Lifecycle
//!
//! ```text
//! Local cache (~/.cache/nixpkgs-mcp/nixpkgs.json)
//!     │ (missing? fetch remote index, write through)
//!     ▼
//! Loader ──> Catalog (name → PackageRecord, loaded exactly once)
//!     │
//!     └──> installed set (seeded with common tools, grows via install)
//! ```
//!
//! The catalog is read-only after the load phase; only the installed set
//! mutates, and it grows monotonically for the life of the process.
//!
//! ## Example
//!
//! ```no_run
//! use nixpkgs_catalog::{load_catalog, LoaderConfig};
//!
//! #[tokio::main]
//! async fn main() -> nixpkgs_catalog::Result<()> {
//!     let catalog = load_catalog(&LoaderConfig::from_env()).await?;
//!     println!("Loaded {} packages", catalog.len());
//!     Ok(())
//! }
//! ```

mod descriptor;
mod error;
mod loader;
mod store;

pub use descriptor::{describe, package_name, tool_name, ToolDescriptor, TOOL_PREFIX};
pub use error::{CatalogError, Result};
pub use loader::{load_catalog, LoaderConfig, DEFAULT_INDEX_URL};
pub use store::{Catalog, InstallOutcome, PackageRecord, COMMON_TOOLS};
