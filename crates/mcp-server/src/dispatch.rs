//! Tool dispatch for the nixpkgs MCP server.
//!
//! Incoming tool names are decoded once into [`ToolCall`] and handled via
//! exhaustive matching; no string-prefix check survives past the decode step.
//! Every call — success or failure — yields exactly one text response.
//! Domain failures (unknown package, timeout, launch error) become error-
//! flagged tool results, never transport errors, so a single bad request can
//! never take down the serving loop.

use crate::executor::{ExecStatus, ExecutionResult, Executor};
use nixpkgs_catalog::{describe, package_name, tool_name, Catalog, InstallOutcome};
use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

pub const SEARCH_TOOL: &str = "nixpkgs_search";
pub const EXECUTE_TOOL: &str = "nixpkgs_execute";
pub const INSTALL_TOOL: &str = "nixpkgs_install_tool";
pub const LIST_INSTALLED_TOOL: &str = "nixpkgs_list_installed";

const DEFAULT_SEARCH_LIMIT: usize = 20;

/// One incoming call, decoded once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Search,
    Execute,
    Install,
    ListInstalled,
    /// A previously installed tool invoked by its generated name; carries the
    /// recovered package name.
    Package(String),
    Unknown(String),
}

impl ToolCall {
    pub fn parse(name: &str) -> Self {
        match name {
            SEARCH_TOOL => Self::Search,
            EXECUTE_TOOL => Self::Execute,
            INSTALL_TOOL => Self::Install,
            LIST_INSTALLED_TOOL => Self::ListInstalled,
            other => match package_name(other) {
                Some(package) => Self::Package(package),
                None => Self::Unknown(other.to_string()),
            },
        }
    }
}

// ============================================================================
// Tool argument shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ExecuteArgs {
    package: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    stdin: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstallArgs {
    package: String,
}

#[derive(Debug, Default, Deserialize)]
struct PackageArgs {
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    stdin: Option<String>,
}

fn parse_args<T: DeserializeOwned>(arguments: JsonObject) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::Object(arguments)).map_err(|err| err.to_string())
}

// ============================================================================
// Dispatch
// ============================================================================

/// Handle one tool call end to end.
pub async fn handle(
    catalog: &Catalog,
    executor: &Executor,
    name: &str,
    arguments: JsonObject,
) -> CallToolResult {
    match ToolCall::parse(name) {
        ToolCall::Search => match parse_args::<SearchArgs>(arguments) {
            Ok(args) => search(catalog, &args.query, args.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)),
            Err(err) => invalid_args(SEARCH_TOOL, &err),
        },
        ToolCall::Execute => match parse_args::<ExecuteArgs>(arguments) {
            Ok(args) => {
                execute(catalog, executor, &args.package, &args.args, args.stdin.as_deref()).await
            }
            Err(err) => invalid_args(EXECUTE_TOOL, &err),
        },
        ToolCall::Install => match parse_args::<InstallArgs>(arguments) {
            Ok(args) => install(catalog, &args.package),
            Err(err) => invalid_args(INSTALL_TOOL, &err),
        },
        ToolCall::ListInstalled => list_installed(catalog),
        ToolCall::Package(package) => match parse_args::<PackageArgs>(arguments) {
            Ok(args) => {
                execute(catalog, executor, &package, &args.args, args.stdin.as_deref()).await
            }
            Err(err) => invalid_args(&tool_name(&package), &err),
        },
        ToolCall::Unknown(name) => {
            CallToolResult::error(vec![Content::text(format!("Unknown tool: {name}"))])
        }
    }
}

fn invalid_args(tool: &str, err: &str) -> CallToolResult {
    CallToolResult::error(vec![Content::text(format!(
        "❌ Invalid arguments for {tool}: {err}"
    ))])
}

/// Case-insensitive substring scan over name OR description, short-circuiting
/// at `limit`. Result order is catalog-iteration order, not relevance.
fn search(catalog: &Catalog, query: &str, limit: usize) -> CallToolResult {
    let needle = query.to_lowercase();
    let mut output = String::new();
    let mut matches = 0usize;

    for (name, record) in catalog.packages() {
        if matches >= limit {
            break;
        }
        if !name.to_lowercase().contains(&needle)
            && !record.description.to_lowercase().contains(&needle)
        {
            continue;
        }

        matches += 1;
        let installed = if catalog.is_installed(name) {
            " [INSTALLED]"
        } else {
            ""
        };
        output.push_str(&format!(
            "📦 {} (v{}){}\n   {}\n\n",
            name, record.version, installed, record.description
        ));
    }

    if matches == 0 {
        return CallToolResult::success(vec![Content::text(format!(
            "No packages found matching '{query}'"
        ))]);
    }

    CallToolResult::success(vec![Content::text(format!(
        "Found {matches} packages matching '{query}':\n\n{output}"
    ))])
}

/// Register a package as a directly callable tool. Pure catalog operation:
/// nothing is validated against the runner until first execution.
fn install(catalog: &Catalog, package: &str) -> CallToolResult {
    if !catalog.contains(package) {
        return CallToolResult::error(vec![Content::text(format!(
            "❌ Package '{package}' not found in nixpkgs"
        ))]);
    }

    match catalog.mark_installed(package) {
        InstallOutcome::AlreadyInstalled => CallToolResult::success(vec![Content::text(format!(
            "ℹ️  Package '{package}' is already installed as a tool"
        ))]),
        InstallOutcome::Installed => CallToolResult::success(vec![Content::text(format!(
            "✅ Installed '{package}' as tool: {}\nYou can now call it directly without using {EXECUTE_TOOL}.",
            tool_name(package)
        ))]),
    }
}

fn list_installed(catalog: &Catalog) -> CallToolResult {
    let installed = catalog.installed_names();
    let lines: Vec<String> = installed.iter().map(|name| format!("  - {name}")).collect();
    CallToolResult::success(vec![Content::text(format!(
        "Installed nixpkgs tools ({}):\n{}",
        installed.len(),
        lines.join("\n")
    ))])
}

/// Execute any cataloged package, installed or not. Catalog presence is
/// re-checked here even for installed names.
async fn execute(
    catalog: &Catalog,
    executor: &Executor,
    package: &str,
    args: &[String],
    stdin: Option<&str>,
) -> CallToolResult {
    if !catalog.contains(package) {
        return CallToolResult::error(vec![Content::text(format!(
            "❌ Package '{package}' not found in nixpkgs. Use {SEARCH_TOOL} to find it."
        ))]);
    }

    match executor.run(package, args, stdin).await {
        Ok(result) => format_execution(&result, executor.timeout()),
        Err(err) => CallToolResult::error(vec![Content::text(format!(
            "❌ Error executing package: {err}"
        ))]),
    }
}

fn format_execution(result: &ExecutionResult, timeout: Duration) -> CallToolResult {
    let code = match result.status {
        ExecStatus::TimedOut => {
            return CallToolResult::error(vec![Content::text(format!(
                "❌ Command timed out after {}",
                render_timeout(timeout)
            ))]);
        }
        ExecStatus::Exited(code) => code,
    };

    let mut output = String::new();
    if !result.stdout.is_empty() {
        output.push_str(&format!("📤 stdout:\n{}\n", result.stdout));
    }
    if !result.stderr.is_empty() {
        output.push_str(&format!("⚠️  stderr:\n{}\n", result.stderr));
    }
    if code == 0 {
        output.push_str("\n✅ Success (exit code: 0)");
    } else {
        output.push_str(&format!("\n❌ Exit code: {code}"));
    }

    CallToolResult::success(vec![Content::text(output)])
}

/// Sub-second limits (test overrides) would truncate to "0 seconds"; render
/// those in milliseconds instead.
fn render_timeout(timeout: Duration) -> String {
    if timeout < Duration::from_secs(1) {
        format!("{} ms", timeout.as_millis())
    } else {
        format!("{} seconds", timeout.as_secs())
    }
}

// ============================================================================
// Tool enumeration
// ============================================================================

/// The four meta-operations plus one descriptor per installed name that still
/// resolves in the catalog. Regenerated fresh on every listing request.
pub fn tool_listing(catalog: &Catalog) -> Vec<Tool> {
    let mut tools = meta_tools();
    for name in catalog.installed_names() {
        if !catalog.contains(&name) {
            continue;
        }
        tools.push(package_tool(catalog, &name));
    }
    tools
}

fn package_tool(catalog: &Catalog, package: &str) -> Tool {
    let descriptor = describe(catalog, package);
    tool(
        descriptor.name,
        descriptor.description,
        json!({
            "type": "object",
            "properties": {
                "args": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Command-line arguments to pass to the tool"
                },
                "stdin": {
                    "type": "string",
                    "description": "Optional input to pass via stdin"
                }
            },
            "required": []
        }),
    )
}

fn meta_tools() -> Vec<Tool> {
    vec![
        tool(
            SEARCH_TOOL.to_string(),
            "Search for packages in nixpkgs by name or description".to_string(),
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query (package name or keywords)"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of results (default: 20)",
                        "default": 20
                    }
                },
                "required": ["query"]
            }),
        ),
        tool(
            EXECUTE_TOOL.to_string(),
            "Execute any nixpkgs package once without registering as a tool".to_string(),
            json!({
                "type": "object",
                "properties": {
                    "package": {
                        "type": "string",
                        "description": "Package name from nixpkgs"
                    },
                    "args": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Command-line arguments"
                    },
                    "stdin": {
                        "type": "string",
                        "description": "Optional stdin input"
                    }
                },
                "required": ["package"]
            }),
        ),
        tool(
            INSTALL_TOOL.to_string(),
            "Permanently register a nixpkgs package as an MCP tool for future use".to_string(),
            json!({
                "type": "object",
                "properties": {
                    "package": {
                        "type": "string",
                        "description": "Package name to register as a tool"
                    }
                },
                "required": ["package"]
            }),
        ),
        tool(
            LIST_INSTALLED_TOOL.to_string(),
            "List all currently installed/registered nixpkgs tools".to_string(),
            json!({
                "type": "object",
                "properties": {}
            }),
        ),
    ]
}

fn tool(name: String, description: String, schema: serde_json::Value) -> Tool {
    let schema = match schema {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    Tool {
        name: Cow::Owned(name),
        title: None,
        description: Some(Cow::Owned(description)),
        input_schema: Arc::new(schema),
        output_schema: None,
        annotations: None,
        icons: None,
    }
}
