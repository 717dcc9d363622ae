//! Probing registries for a name, and fanning one name out to all of them.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ureq::Agent;

use crate::cache::ResultCache;
use crate::metadata::{self, PackageMetadata};
use crate::registry::{Registry, RegistryId};
use crate::sanitize::sanitize;

/// How long a single probe may take before it is reported as an error.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// Package documents for popular npm packages run to tens of megabytes.
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Whether a name is free on a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[must_use]
pub enum Status {
    /// The registry answered 404: nothing is published under the name.
    Available,
    /// The registry answered 2xx: the name is in use.
    Taken,
    /// Any other answer, a network failure, or a timeout.
    Errored,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Taken => write!(f, "taken"),
            Self::Errored => write!(f, "error"),
        }
    }
}

/// What a probe found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// Nothing is published under the name.
    Available,
    /// A package exists under the name.
    Taken {
        /// The package's page on the registry website.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_url: Option<String>,
        /// Whatever the registry told us about the package.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<PackageMetadata>,
    },
    /// The registry could not give a definitive answer.
    #[serde(rename = "error")]
    Errored {
        /// HTTP status or transport failure, for display.
        detail: String,
    },
}

/// The result of checking one name against one registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Registry that was asked.
    pub registry: RegistryId,
    /// The sanitized name that was asked about.
    pub name: String,
    /// When the probe completed.
    pub timestamp: DateTime<Utc>,
    /// What the registry said.
    pub outcome: Outcome,
}

impl ProbeResult {
    /// A result for `name` on `registry`, stamped with the current time.
    #[must_use]
    pub fn new(registry: RegistryId, name: &str, outcome: Outcome) -> Self {
        Self {
            registry,
            name: name.to_string(),
            timestamp: Utc::now(),
            outcome,
        }
    }

    /// The availability status.
    pub fn status(&self) -> Status {
        match self.outcome {
            Outcome::Available => Status::Available,
            Outcome::Taken { .. } => Status::Taken,
            Outcome::Errored { .. } => Status::Errored,
        }
    }

    /// Package metadata, only ever present for taken names.
    #[must_use]
    pub fn metadata(&self) -> Option<&PackageMetadata> {
        match &self.outcome {
            Outcome::Taken { metadata, .. } => metadata.as_ref(),
            _ => None,
        }
    }

    /// Registry page of the existing package, only ever present for taken names.
    #[must_use]
    pub fn page_url(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Taken { page_url, .. } => page_url.as_deref(),
            _ => None,
        }
    }

    /// Why the probe failed, only ever present for errored probes.
    #[must_use]
    pub fn error_detail(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Errored { detail } => Some(detail),
            _ => None,
        }
    }
}

/// Errors that stop a check before any registry is contacted.
///
/// Failures of individual registries are never errors; they are reported as
/// [`Status::Errored`] results.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CheckError {
    /// Nothing was left of the name after sanitization.
    #[error("package name is required (`{raw}` has no usable characters)")]
    EmptyName {
        /// The name as given.
        raw: String,
    },
    /// The registry selection matched none of the configured registries.
    #[error("no registries selected")]
    NoRegistries,
}

/// Options for [`check_name`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOptions {
    /// Upper bound for each probe, including reading the response.
    pub timeout: Duration,
    /// Registries to ask; `None` asks every configured registry.
    pub registries: Option<Vec<RegistryId>>,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            registries: None,
        }
    }
}

/// An HTTP client together with the registries it checks against.
///
/// Wraps the underlying HTTP agent to insulate callers from the specific
/// HTTP library version used internally.
///
/// # Example
///
/// ```no_run
/// use taken::check::Client;
///
/// let client = Client::new();
/// assert_eq!(client.registries().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    agent: Agent,
    registries: Vec<Registry>,
}

impl Client {
    /// A client for the public npm, PyPI and crates.io endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registries(Registry::defaults())
    }

    /// A client for an explicit list of registries, checked in that order.
    #[must_use]
    pub fn with_registries(registries: Vec<Registry>) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(DEFAULT_TIMEOUT))
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION"),
                " (",
                env!("CARGO_PKG_REPOSITORY"),
                ")"
            ))
            .build();
        Self {
            agent: Agent::new_with_config(config),
            registries,
        }
    }

    /// The configured registries, in check order.
    #[must_use]
    pub fn registries(&self) -> &[Registry] {
        &self.registries
    }

    /// The configured registry with the given id.
    #[must_use]
    pub fn registry(&self, id: RegistryId) -> Option<&Registry> {
        self.registries.iter().find(|r| r.id() == id)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

/// Ask one registry whether `name` exists.
///
/// Never fails: timeouts, connection problems and unexpected HTTP statuses
/// come back as [`Status::Errored`] with a detail message. Existence is
/// decided by the HTTP status alone; the body only feeds the metadata.
pub fn probe(client: &Client, registry: &Registry, name: &str, timeout: Duration) -> ProbeResult {
    let name = sanitize(name);
    let url = registry.query_url(&name);
    let started = Instant::now();
    debug!(registry = %registry.id(), %url, "probing");

    let request = client
        .agent
        .get(&url)
        .config()
        .timeout_global(Some(timeout))
        .build();

    let outcome = match request.call() {
        Ok(mut response) if response.status().is_success() => {
            let metadata = read_document(&mut response, registry.id())
                .map(|raw| metadata::normalize(registry.id(), &name, &raw));
            Outcome::Taken {
                page_url: registry.page_url(&name),
                metadata,
            }
        }
        Ok(response) => Outcome::Errored {
            detail: format!("HTTP {}", response.status().as_u16()),
        },
        Err(ureq::Error::StatusCode(404)) => Outcome::Available,
        Err(ureq::Error::StatusCode(code)) => Outcome::Errored {
            detail: format!("HTTP {code}"),
        },
        Err(e) => Outcome::Errored {
            detail: e.to_string(),
        },
    };

    let result = ProbeResult::new(registry.id(), &name, outcome);
    debug!(
        registry = %registry.id(),
        name = %result.name,
        status = %result.status(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "probe finished"
    );
    result
}

fn read_document(
    response: &mut ureq::http::Response<ureq::Body>,
    registry: RegistryId,
) -> Option<serde_json::Value> {
    let body = match response
        .body_mut()
        .with_config()
        .limit(MAX_BODY_BYTES)
        .read_to_string()
    {
        Ok(body) => body,
        Err(e) => {
            debug!(%registry, error = %e, "could not read response body");
            return None;
        }
    };
    match serde_json::from_str(&body) {
        Ok(raw) => Some(raw),
        Err(e) => {
            debug!(%registry, error = %e, "response body is not JSON");
            None
        }
    }
}

// configured registries narrowed to the selection, in configured order
fn selected<'c>(client: &'c Client, options: &CheckOptions) -> Vec<&'c Registry> {
    client
        .registries
        .iter()
        .filter(|r| {
            options
                .registries
                .as_ref()
                .is_none_or(|wanted| wanted.contains(&r.id()))
        })
        .collect()
}

/// Check `name` against every selected registry at once.
///
/// The name is sanitized once and each registry is probed on its own thread
/// with its own timeout. All probes are awaited, whatever their outcome, and
/// the results come back in registry order.
///
/// # Errors
///
/// Returns [`CheckError::EmptyName`] if nothing is left of the name after
/// sanitization, or [`CheckError::NoRegistries`] if the selection matches no
/// configured registry. No request is made in either case.
///
/// # Example
///
/// ```no_run
/// use taken::check::{CheckOptions, Client, Status, check_name};
///
/// let client = Client::new();
/// for result in check_name(&client, "left-pad", &CheckOptions::default())? {
///     println!("{}: {}", result.registry, result.status());
/// }
/// # Ok::<(), taken::check::CheckError>(())
/// ```
pub fn check_name(
    client: &Client,
    name: &str,
    options: &CheckOptions,
) -> Result<Vec<ProbeResult>, CheckError> {
    let sanitized = sanitize(name);
    if sanitized.is_empty() {
        return Err(CheckError::EmptyName {
            raw: name.to_string(),
        });
    }

    let targets = selected(client, options);
    if targets.is_empty() {
        return Err(CheckError::NoRegistries);
    }

    let results = thread::scope(|s| {
        let handles: Vec<_> = targets
            .iter()
            .map(|&registry| {
                let sanitized = &sanitized;
                let handle = s.spawn(move || probe(client, registry, sanitized, options.timeout));
                (registry.id(), handle)
            })
            .collect();
        handles
            .into_iter()
            .map(|(id, handle)| {
                handle.join().unwrap_or_else(|_| {
                    warn!(registry = %id, "probe thread panicked");
                    ProbeResult::new(
                        id,
                        &sanitized,
                        Outcome::Errored {
                            detail: "internal error: probe panicked".to_string(),
                        },
                    )
                })
            })
            .collect()
    });
    Ok(results)
}

/// Check `name`, answering from `cache` where it can.
///
/// Each selected registry with a definitive cached result is answered from
/// the cache. The rest, including registries whose cached result is an
/// error, are probed together and written back. Results come back in
/// registry order, as from [`check_name`].
///
/// # Errors
///
/// Same as [`check_name`].
pub fn check_name_cached(
    client: &Client,
    cache: &ResultCache,
    name: &str,
    options: &CheckOptions,
) -> Result<Vec<ProbeResult>, CheckError> {
    let sanitized = sanitize(name);
    if sanitized.is_empty() {
        return Err(CheckError::EmptyName {
            raw: name.to_string(),
        });
    }

    let mut cached = Vec::new();
    let mut missing = Vec::new();
    for registry in selected(client, options) {
        match cache.get_one(registry.id(), &sanitized) {
            Some(hit) if hit.status() != Status::Errored => cached.push(hit),
            _ => missing.push(registry.id()),
        }
    }
    if cached.is_empty() && missing.is_empty() {
        return Err(CheckError::NoRegistries);
    }
    if missing.is_empty() {
        debug!(name = %sanitized, hits = cached.len(), "answered from cache");
        return Ok(cached);
    }

    let live = CheckOptions {
        timeout: options.timeout,
        registries: Some(missing),
    };
    let fresh = check_name(client, &sanitized, &live)?;
    cache.put(&sanitized, &fresh);
    debug!(
        name = %sanitized,
        hits = cached.len(),
        probed = fresh.len(),
        "merged cached and fresh results"
    );

    let mut merged = cached;
    merged.extend(fresh);
    merged.sort_by_key(|r| {
        client
            .registries
            .iter()
            .position(|registry| registry.id() == r.registry)
    });
    Ok(merged)
}

/// How many probes of a check gave a definitive answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CheckSummary {
    /// Number of probes.
    pub total: usize,
    /// Probes that came back available or taken.
    pub definitive: usize,
    /// `definitive / total` as a percentage; 0 when nothing was probed.
    pub success_rate: f64,
}

/// Summarize a set of results.
#[must_use]
pub fn summarize(results: &[ProbeResult]) -> CheckSummary {
    let total = results.len();
    let definitive = results
        .iter()
        .filter(|r| r.status() != Status::Errored)
        .count();
    let success_rate = if total == 0 {
        0.0
    } else {
        definitive as f64 / total as f64 * 100.0
    };
    CheckSummary {
        total,
        definitive,
        success_rate,
    }
}
