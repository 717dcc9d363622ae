//! Per-registry naming rules.
//!
//! A name that is free on a registry may still be unpublishable there. These
//! rules are advisory: they annotate results but never stop a probe.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use crate::registry::RegistryId;

/// Longest name accepted as input. npm's limit, and the longest any of the
/// supported registries allows.
pub const MAX_INPUT_LENGTH: usize = 214;

/// Longest crate name crates.io accepts.
pub const MAX_CRATE_NAME_LENGTH: usize = 64;

// Reserved names from crates.io database migrations:
//   20170305095748_create_reserved_crate_names (Rust compiler internals)
//   20170430202433_reserve_windows_crate_names (Windows device names)
//   2021-02-10-141019_reserve_com0_lpt0 (com0, lpt0)
const RESERVED_CRATE_NAMES: &[&str] = &[
    // Rust compiler internals
    "alloc",
    "arena",
    "ast",
    "builtins",
    "collections",
    "compiler-builtins",
    "compiler-rt",
    "compiletest",
    "core",
    "coretest",
    "debug",
    "driver",
    "flate",
    "fmt_macros",
    "grammar",
    "graphviz",
    "macro",
    "macros",
    "proc_macro",
    "rbml",
    "rust-installer",
    "rustbook",
    "rustc",
    "rustc_back",
    "rustc_borrowck",
    "rustc_driver",
    "rustc_llvm",
    "rustc_resolve",
    "rustc_trans",
    "rustc_typeck",
    "rustdoc",
    "rustllvm",
    "rustuv",
    "serialize",
    "std",
    "syntax",
    "test",
    "unicode",
    // Windows device names
    "nul",
    "con",
    "prn",
    "aux",
    "com0",
    "com1",
    "com2",
    "com3",
    "com4",
    "com5",
    "com6",
    "com7",
    "com8",
    "com9",
    "lpt0",
    "lpt1",
    "lpt2",
    "lpt3",
    "lpt4",
    "lpt5",
    "lpt6",
    "lpt7",
    "lpt8",
    "lpt9",
];

static RESERVED_SET: LazyLock<HashSet<String>> = LazyLock::new(|| {
    RESERVED_CRATE_NAMES
        .iter()
        .map(|s| canon_crate_name(s))
        .collect()
});

/// Why a registry would refuse to publish a name.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RuleViolation {
    /// The name is empty.
    Empty,
    /// The name is longer than the registry allows.
    TooLong {
        /// The registry's limit, in characters.
        max: usize,
    },
    /// The first character is not allowed in that position.
    Start {
        /// The offending character.
        first_char: char,
    },
    /// The last character is not allowed in that position.
    End {
        /// The offending character.
        last_char: char,
    },
    /// A character the registry never accepts.
    Char {
        /// The offending character.
        ch: char,
    },
    /// Uppercase letters where the registry requires lowercase.
    Uppercase,
    /// A malformed `@scope/name` package name.
    Scope,
    /// A crates.io reserved name (`std`, `core`, Windows device names, ...).
    Reserved,
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong { max } => write!(f, "name is too long (max {max} characters)"),
            Self::Start { first_char } => {
                write!(f, "name cannot start with `{first_char}`")
            }
            Self::End { last_char } => write!(f, "name cannot end with `{last_char}`"),
            Self::Char { ch } => write!(f, "invalid character `{ch}`"),
            Self::Uppercase => write!(f, "name must be lowercase"),
            Self::Scope => write!(f, "scoped names must look like `@scope/name`"),
            Self::Reserved => write!(f, "name is reserved"),
        }
    }
}

impl std::error::Error for RuleViolation {}

/// Canonicalize a crate name: lowercase and replace hyphens with underscores.
///
/// crates.io treats `foo-bar` and `foo_bar` as the same crate name.
///
/// ```
/// use taken::rules::canon_crate_name;
/// assert_eq!(canon_crate_name("My-Crate"), "my_crate");
/// ```
#[must_use]
pub fn canon_crate_name(name: &str) -> String {
    name.to_lowercase().replace('-', "_")
}

/// Check `name` against the publishing rules of `registry`.
///
/// # Errors
///
/// Returns the first rule the name breaks.
pub fn check_rules(registry: RegistryId, name: &str) -> Result<(), RuleViolation> {
    match registry {
        RegistryId::Npm => check_npm(name),
        RegistryId::Pypi => check_pypi(name),
        RegistryId::Cargo => check_crate(name),
    }
}

/// Every registry whose rules `name` breaks, with the first broken rule.
#[must_use]
pub fn violations(name: &str) -> Vec<(RegistryId, RuleViolation)> {
    RegistryId::ALL
        .into_iter()
        .filter_map(|id| check_rules(id, name).err().map(|v| (id, v)))
        .collect()
}

fn check_npm(name: &str) -> Result<(), RuleViolation> {
    if name.is_empty() {
        return Err(RuleViolation::Empty);
    }
    if name.chars().count() > MAX_INPUT_LENGTH {
        return Err(RuleViolation::TooLong {
            max: MAX_INPUT_LENGTH,
        });
    }

    if let Some(scoped) = name.strip_prefix('@') {
        let Some((scope, package)) = scoped.split_once('/') else {
            return Err(RuleViolation::Scope);
        };
        if scope.is_empty() || package.is_empty() || package.contains('/') {
            return Err(RuleViolation::Scope);
        }
        check_npm_part(scope)?;
        return check_npm_part(package);
    }

    check_npm_part(name)
}

fn check_npm_part(part: &str) -> Result<(), RuleViolation> {
    if let Some(first_char @ ('.' | '_')) = part.chars().next() {
        return Err(RuleViolation::Start { first_char });
    }
    if part.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(RuleViolation::Uppercase);
    }
    match part
        .chars()
        .find(|&c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || "-._~".contains(c)))
    {
        Some(ch) => Err(RuleViolation::Char { ch }),
        None => Ok(()),
    }
}

fn check_pypi(name: &str) -> Result<(), RuleViolation> {
    let (Some(first_char), Some(last_char)) = (name.chars().next(), name.chars().last()) else {
        return Err(RuleViolation::Empty);
    };
    if !first_char.is_ascii_alphanumeric() {
        return Err(RuleViolation::Start { first_char });
    }
    if let Some(ch) = name
        .chars()
        .find(|&c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(RuleViolation::Char { ch });
    }
    if !last_char.is_ascii_alphanumeric() {
        return Err(RuleViolation::End { last_char });
    }
    Ok(())
}

fn check_crate(name: &str) -> Result<(), RuleViolation> {
    if name.chars().count() > MAX_CRATE_NAME_LENGTH {
        return Err(RuleViolation::TooLong {
            max: MAX_CRATE_NAME_LENGTH,
        });
    }

    let mut chars = name.chars();
    let Some(first_char) = chars.next() else {
        return Err(RuleViolation::Empty);
    };
    if !first_char.is_ascii_alphabetic() {
        return Err(RuleViolation::Start { first_char });
    }
    if let Some(ch) = chars.find(|&c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_')) {
        return Err(RuleViolation::Char { ch });
    }

    if RESERVED_SET.contains(&canon_crate_name(name)) {
        return Err(RuleViolation::Reserved);
    }
    Ok(())
}
