//! Nixpkgs MCP server library.
//!
//! Exposes the nixpkgs package collection over the Model Context Protocol:
//! four fixed meta-tools (search, execute, install, list-installed) plus one
//! dynamically registered tool per installed package.
//!
//! ```text
//! client ──> service (rmcp stdio) ──> dispatch ──> catalog (nixpkgs-catalog)
//!                                         │
//!                                         └─────> executor (nix run)
//! ```

pub mod dispatch;
pub mod executor;
pub mod service;

pub use executor::{ExecStatus, ExecutionResult, Executor};
pub use service::NixpkgsService;
