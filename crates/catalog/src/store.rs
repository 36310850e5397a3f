//! Catalog store: the full package index plus the set of installed tool names.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Tools pre-registered at startup. Names absent from the loaded index are
/// kept in the installed set but silently dropped when rendering descriptors.
pub const COMMON_TOOLS: [&str; 12] = [
    "ripgrep", "jq", "fd", "bat", "eza", "fzf", "git", "curl", "wget", "htop", "tree", "nushell",
];

/// One entry of the package index. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    /// Canonical package name (unique key, last segment of the index key).
    pub name: String,
    /// Upstream `pname`, falling back to `name`.
    pub display_name: String,
    /// May be empty.
    pub description: String,
    /// May be empty.
    pub version: String,
}

/// Outcome of [`Catalog::mark_installed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The name was newly added to the installed set.
    Installed,
    /// The name was already present; the set is unchanged.
    AlreadyInstalled,
}

/// The package index and the working set of installed tool names.
///
/// `packages` is populated exactly once by the loader and never mutated
/// afterwards; the installed set only grows. Shared across concurrent
/// dispatch calls behind an `Arc`.
#[derive(Debug)]
pub struct Catalog {
    packages: HashMap<String, PackageRecord>,
    installed: RwLock<BTreeSet<String>>,
}

impl Catalog {
    /// Build a catalog from loaded records, seeding the installed set with
    /// [`COMMON_TOOLS`].
    pub fn new(packages: HashMap<String, PackageRecord>) -> Self {
        let installed = COMMON_TOOLS.iter().map(|name| (*name).to_string()).collect();
        Self {
            packages,
            installed: RwLock::new(installed),
        }
    }

    /// Convenience constructor for tests and embedding.
    pub fn from_records(records: impl IntoIterator<Item = PackageRecord>) -> Self {
        Self::new(
            records
                .into_iter()
                .map(|record| (record.name.clone(), record))
                .collect(),
        )
    }

    pub fn lookup(&self, name: &str) -> Option<&PackageRecord> {
        self.packages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.installed_read().contains(name)
    }

    /// Add `name` to the installed set. Idempotent: a repeated install reports
    /// [`InstallOutcome::AlreadyInstalled`] without mutating anything. The
    /// insert happens under the write lock, so two concurrent installs of the
    /// same name cannot both observe `Installed`.
    pub fn mark_installed(&self, name: &str) -> InstallOutcome {
        if self.installed_write().insert(name.to_string()) {
            InstallOutcome::Installed
        } else {
            InstallOutcome::AlreadyInstalled
        }
    }

    /// Installed names in sorted order, for deterministic listings.
    pub fn installed_names(&self) -> Vec<String> {
        self.installed_read().iter().cloned().collect()
    }

    /// Iterate all `(name, record)` pairs. Order is unspecified; callers that
    /// need determinism (listings) sort by name themselves.
    pub fn packages(&self) -> impl Iterator<Item = (&String, &PackageRecord)> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    fn installed_read(&self) -> RwLockReadGuard<'_, BTreeSet<String>> {
        self.installed.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn installed_write(&self) -> RwLockWriteGuard<'_, BTreeSet<String>> {
        self.installed.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(name: &str) -> PackageRecord {
        PackageRecord {
            name: name.to_string(),
            display_name: name.to_string(),
            description: format!("{name} description"),
            version: "1.0".to_string(),
        }
    }

    #[test]
    fn seed_tools_are_installed_at_startup() {
        let catalog = Catalog::from_records([record("ripgrep"), record("hello")]);
        assert!(catalog.is_installed("ripgrep"));
        assert!(catalog.is_installed("jq"));
        assert!(!catalog.is_installed("hello"));
    }

    #[test]
    fn mark_installed_is_idempotent() {
        let catalog = Catalog::from_records([record("hello")]);
        let before = catalog.installed_names().len();

        assert_eq!(catalog.mark_installed("hello"), InstallOutcome::Installed);
        assert_eq!(catalog.installed_names().len(), before + 1);

        assert_eq!(
            catalog.mark_installed("hello"),
            InstallOutcome::AlreadyInstalled
        );
        assert_eq!(catalog.installed_names().len(), before + 1);
    }

    #[test]
    fn installed_names_are_sorted() {
        let catalog = Catalog::from_records([record("zzz"), record("aaa")]);
        catalog.mark_installed("zzz");
        catalog.mark_installed("aaa");

        let names = catalog.installed_names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn lookup_and_contains_agree() {
        let catalog = Catalog::from_records([record("hello")]);
        assert!(catalog.contains("hello"));
        assert_eq!(catalog.lookup("hello").map(|r| r.name.as_str()), Some("hello"));
        assert!(!catalog.contains("missing"));
        assert!(catalog.lookup("missing").is_none());
    }

    #[test]
    fn concurrent_installs_report_one_winner() {
        use std::sync::Arc;

        let catalog = Arc::new(Catalog::from_records([record("hello")]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let catalog = catalog.clone();
                std::thread::spawn(move || catalog.mark_installed("hello"))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("install thread"))
            .filter(|outcome| *outcome == InstallOutcome::Installed)
            .count();
        assert_eq!(winners, 1);
    }
}
