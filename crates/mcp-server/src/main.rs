//! Nixpkgs MCP Server
//!
//! Exposes nixpkgs packages to AI agents via the MCP protocol.
//!
//! ## Tools
//!
//! - `nixpkgs_search` - Find packages by name or description
//! - `nixpkgs_execute` - Run any package once without registering it
//! - `nixpkgs_install_tool` - Register a package as a directly callable tool
//! - `nixpkgs_list_installed` - List registered tools
//! - `nixpkgs_<package>` - One tool per registered package
//!
//! ## Usage
//!
//! Add to your MCP client configuration:
//! ```json
//! {
//!   "mcpServers": {
//!     "nixpkgs": {
//!       "command": "nixpkgs-mcp"
//!     }
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use nixpkgs_catalog::{load_catalog, LoaderConfig};
use nixpkgs_mcp::NixpkgsService;
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging goes to stderr only (stdout is for MCP protocol)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("Starting nixpkgs MCP server");

    let config = LoaderConfig::from_env();
    let catalog = load_catalog(&config)
        .await
        .context("Failed to load nixpkgs package index")?;

    let service = NixpkgsService::new(Arc::new(catalog));
    let server = service.serve(stdio()).await?;

    // Wait for shutdown
    server.waiting().await?;

    log::info!("nixpkgs MCP server stopped");
    Ok(())
}
