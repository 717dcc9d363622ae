//! The fixed directory of package registries that names are checked against.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a known package registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryId {
    /// The npm registry (registry.npmjs.org).
    Npm,
    /// The Python Package Index (pypi.org).
    Pypi,
    /// The Rust package registry (crates.io).
    Cargo,
}

impl RegistryId {
    /// Every known registry, in display order.
    pub const ALL: [RegistryId; 3] = [RegistryId::Npm, RegistryId::Pypi, RegistryId::Cargo];

    /// The stable short key, e.g. `"npm"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pypi => "pypi",
            Self::Cargo => "cargo",
        }
    }

    /// Human-facing registry name, e.g. `"PyPI"`.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pypi => "PyPI",
            Self::Cargo => "Cargo",
        }
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a registry id that is not in the directory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown registry `{0}` (expected one of: npm, pypi, cargo)")]
pub struct UnknownRegistry(pub String);

impl FromStr for RegistryId {
    type Err = UnknownRegistry;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "npm" => Ok(Self::Npm),
            "pypi" => Ok(Self::Pypi),
            "cargo" | "crates" | "crates.io" => Ok(Self::Cargo),
            _ => Err(UnknownRegistry(s.to_string())),
        }
    }
}

/// A registry endpoint: where to ask about a name and where to send users
/// to look at a package that exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    id: RegistryId,
    api_base: String,
    page_base: String,
}

impl Registry {
    /// The registry with its public API endpoint.
    #[must_use]
    pub fn new(id: RegistryId) -> Self {
        let (api_base, page_base) = match id {
            RegistryId::Npm => ("https://registry.npmjs.org", "https://www.npmjs.com"),
            RegistryId::Pypi => ("https://pypi.org", "https://pypi.org"),
            RegistryId::Cargo => ("https://crates.io", "https://crates.io"),
        };
        Self {
            id,
            api_base: api_base.to_string(),
            page_base: page_base.to_string(),
        }
    }

    /// All known registries with their public endpoints, in display order.
    #[must_use]
    pub fn defaults() -> Vec<Registry> {
        RegistryId::ALL.into_iter().map(Registry::new).collect()
    }

    /// Look up a registry by its short id (`"npm"`, `"pypi"`, `"cargo"`).
    #[must_use]
    pub fn find(id: &str) -> Option<Registry> {
        id.parse().ok().map(Registry::new)
    }

    /// Look up a registry by its display name, ignoring case.
    #[must_use]
    pub fn find_by_name(name: &str) -> Option<Registry> {
        RegistryId::ALL
            .into_iter()
            .find(|id| id.display_name().eq_ignore_ascii_case(name))
            .map(Registry::new)
    }

    /// Point the query API at another base URL (a mirror, or a local server).
    ///
    /// Only the host part changes; the per-registry path layout is kept.
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// The registry identifier.
    #[must_use]
    pub fn id(&self) -> RegistryId {
        self.id
    }

    /// Human-facing registry name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        self.id.display_name()
    }

    /// Where the registry documents its packaging rules.
    #[must_use]
    pub fn docs_url(&self) -> &'static str {
        match self.id {
            RegistryId::Npm => "https://docs.npmjs.com/about-packages",
            RegistryId::Pypi => "https://pypi.org/help/",
            RegistryId::Cargo => "https://doc.rust-lang.org/cargo/",
        }
    }

    /// The read-API URL that answers 200 for an existing name and 404 otherwise.
    ///
    /// `name` must already be sanitized.
    ///
    /// ```
    /// use taken::registry::{Registry, RegistryId};
    /// let pypi = Registry::new(RegistryId::Pypi);
    /// assert_eq!(pypi.query_url("requests"), "https://pypi.org/pypi/requests/json");
    /// ```
    #[must_use]
    pub fn query_url(&self, name: &str) -> String {
        let base = &self.api_base;
        match self.id {
            RegistryId::Npm => format!("{base}/{name}"),
            RegistryId::Pypi => format!("{base}/pypi/{name}/json"),
            RegistryId::Cargo => format!("{base}/api/v1/crates/{name}"),
        }
    }

    /// The human-facing page of an existing package, if the registry has one.
    #[must_use]
    pub fn page_url(&self, name: &str) -> Option<String> {
        let base = &self.page_base;
        Some(match self.id {
            RegistryId::Npm => format!("{base}/package/{name}"),
            RegistryId::Pypi => format!("{base}/project/{name}/"),
            RegistryId::Cargo => format!("{base}/crates/{name}"),
        })
    }
}
