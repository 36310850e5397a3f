//! Tool descriptor generation: derive callable tool identities from catalog
//! entries. Pure functions, never cached; regenerating on every listing is
//! cheaper than keeping invalidation logic correct.

use crate::store::Catalog;

/// Namespace prefix shared by every tool this server exposes.
pub const TOOL_PREFIX: &str = "nixpkgs_";

/// Rendered, callable-tool representation of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// Tool identifier: [`TOOL_PREFIX`] + package name with `-` → `_`.
    pub name: String,
    /// Description text plus a version line.
    pub description: String,
}

/// Derive the tool identifier for a package name.
pub fn tool_name(package: &str) -> String {
    format!("{TOOL_PREFIX}{}", package.replace('-', "_"))
}

/// Recover the package name from a tool identifier, reversing [`tool_name`].
/// Returns `None` for names outside the namespace.
pub fn package_name(tool: &str) -> Option<String> {
    tool.strip_prefix(TOOL_PREFIX)
        .map(|rest| rest.replace('_', "-"))
}

/// Render the descriptor for a package. Total: an unknown name gets a generic
/// description rather than an error, since descriptors are normally only
/// generated for names known to exist.
pub fn describe(catalog: &Catalog, package: &str) -> ToolDescriptor {
    let (description, version) = match catalog.lookup(package) {
        Some(record) => (record.description.clone(), record.version.clone()),
        None => (format!("Run {package} from nixpkgs"), "unknown".to_string()),
    };

    ToolDescriptor {
        name: tool_name(package),
        description: format!("{description}\nVersion: {version}"),
    }
}
