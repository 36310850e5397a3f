//! MCP wiring: one [`NixpkgsService`] handles the protocol, delegating tool
//! enumeration and calls to [`crate::dispatch`].
//!
//! `list_tools` regenerates the listing from the live catalog on every
//! request, so a tool installed by one call is visible to the next listing
//! without any notification machinery.

use crate::dispatch;
use crate::executor::Executor;
use nixpkgs_catalog::Catalog;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData as McpError, ServerHandler};
use std::sync::Arc;

#[derive(Clone)]
pub struct NixpkgsService {
    catalog: Arc<Catalog>,
    executor: Executor,
}

impl NixpkgsService {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_executor(catalog, Executor::from_env())
    }

    pub fn with_executor(catalog: Arc<Catalog>, executor: Executor) -> Self {
        Self { catalog, executor }
    }
}

impl ServerHandler for NixpkgsService {
    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<ListToolsResult, McpError>> + Send + '_
    {
        std::future::ready(Ok(ListToolsResult {
            next_cursor: None,
            tools: dispatch::tool_listing(&self.catalog),
        }))
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<CallToolResult, McpError>> + Send + '_
    {
        async move {
            // Domain failures surface as error-flagged results, never as
            // protocol errors.
            Ok(dispatch::handle(
                &self.catalog,
                &self.executor,
                &request.name,
                request.arguments.unwrap_or_default(),
            )
            .await)
        }
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Nixpkgs MCP exposes the nixpkgs package collection as tools. \
                 Use 'nixpkgs_search' to find packages, 'nixpkgs_execute' to run \
                 one ad hoc, 'nixpkgs_install_tool' to register a package as a \
                 directly callable tool, and 'nixpkgs_list_installed' to see \
                 what is registered."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}
