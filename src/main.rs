use std::collections::HashSet;
use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use taken::cache::ResultCache;
use taken::check::{
    CheckOptions, CheckSummary, Client, ProbeResult, Status, check_name, check_name_cached,
    summarize,
};
use taken::config::Config;
use taken::metadata::PackageMetadata;
use taken::registry::RegistryId;
use taken::rules::{self, MAX_INPUT_LENGTH};
use taken::sanitize::sanitize;

/// Names checked at the same time; each check fans out to every registry.
const MAX_CONCURRENT_NAMES: usize = 8;

#[derive(Parser)]
#[command(
    name = "taken",
    version,
    about = "Check whether a package name is already taken on npm, PyPI and crates.io",
    after_help = "Names are stripped of markup and of characters outside \
                  [A-Za-z0-9._/@-] before any request is made. A registry that \
                  answers 404 reports the name as available; any other failure \
                  is reported as an error and can simply be retried.\n\n\
                  Exit status: 0 if every name is available on every registry \
                  checked, 1 otherwise, 2 on usage or configuration errors."
)]
struct Cli {
    /// Package names to check (also reads from stdin)
    names: Vec<String>,

    /// Suppress output, exit code only
    #[arg(short, long)]
    quiet: bool,

    /// Only print registries where the name is available
    #[arg(short, long)]
    available_only: bool,

    /// Only check this registry: npm, pypi or cargo (repeatable)
    #[arg(short, long = "registry", value_name = "ID")]
    registries: Vec<RegistryId>,

    /// Per-registry timeout in milliseconds
    #[arg(short, long, value_name = "MS")]
    timeout: Option<u64>,

    /// Print results as JSON
    #[arg(long, conflicts_with = "available_only")]
    json: bool,

    /// Print package details for taken names
    #[arg(short, long)]
    details: bool,

    /// Read settings from a TOML file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Keep results in this file across runs
    #[arg(long, value_name = "FILE")]
    cache_file: Option<PathBuf>,

    /// Always ask the registries, ignoring cached results
    #[arg(long)]
    no_cache: bool,

    /// Forget all cached results before checking
    #[arg(long)]
    clear_cache: bool,

    /// Log what is being requested to stderr
    #[arg(short, long)]
    verbose: bool,
}

/// Everything learned about one input name.
#[derive(Serialize)]
struct Report {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<Vec<ProbeResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<CheckSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Report {
    fn invalid(name: &str, error: String) -> Self {
        Self {
            name: name.to_string(),
            results: None,
            summary: None,
            error: Some(error),
        }
    }

    fn checked(name: String, results: Vec<ProbeResult>) -> Self {
        Self {
            name,
            summary: Some(summarize(&results)),
            results: Some(results),
            error: None,
        }
    }

    fn all_available(&self) -> bool {
        self.results
            .as_ref()
            .is_some_and(|results| results.iter().all(|r| r.status() == Status::Available))
    }
}

#[cfg(unix)]
fn reset_sigpipe() {
    // SAFETY: restoring the default disposition before any other thread exists.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

#[cfg(not(unix))]
fn reset_sigpipe() {}

fn main() -> ExitCode {
    reset_sigpipe();
    let cli = Cli::parse();
    let _ = taken::logging::init(cli.verbose);

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    if let Some(ms) = cli.timeout {
        config.timeout_ms = ms;
    }
    if !cli.registries.is_empty() {
        config.registries = cli.registries.clone();
    }
    if let Some(path) = &cli.cache_file {
        config.cache.file = Some(path.clone());
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }

    let cache = config.result_cache();
    if cli.clear_cache {
        if let Some(cache) = &cache {
            cache.clear();
        }
    }

    let mut names: Vec<String> = cli.names.clone();

    // Read from stdin if not a terminal
    if !io::stdin().is_terminal() {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(l) => {
                    let trimmed = l.trim().to_string();
                    if !trimmed.is_empty() {
                        names.push(trimmed);
                    }
                }
                Err(e) => {
                    eprintln!("error: reading stdin: {e}");
                    return ExitCode::from(2);
                }
            }
        }
    }

    if names.is_empty() {
        if cli.clear_cache {
            return ExitCode::SUCCESS;
        }
        eprintln!("error: no package names provided");
        eprintln!("usage: taken [OPTIONS] [NAMES...]");
        return ExitCode::from(2);
    }

    // Deduplicate on the sanitized form while preserving order
    let mut seen = HashSet::new();
    names.retain(|n| {
        let key = sanitize(n);
        seen.insert(if key.is_empty() { n.clone() } else { key })
    });

    let client = config.client();
    let options = config.check_options();
    let reports = check_all(&client, cache.as_ref(), &names, &options);

    if !cli.quiet {
        if cli.json {
            match serde_json::to_string_pretty(&reports) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("error: encoding results: {e}");
                    return ExitCode::from(2);
                }
            }
        } else {
            for report in &reports {
                print_report(report, &cli);
            }
        }

        let errored = reports
            .iter()
            .flat_map(|r| r.results.iter().flatten())
            .any(|r| r.status() == Status::Errored);
        if errored {
            eprintln!("note: some registries could not be checked; run again to retry");
        }
    }

    if reports.iter().all(Report::all_available) {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn check_all(
    client: &Client,
    cache: Option<&ResultCache>,
    names: &[String],
    options: &CheckOptions,
) -> Vec<Report> {
    names
        .chunks(MAX_CONCURRENT_NAMES)
        .flat_map(|chunk| {
            std::thread::scope(|s| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|name| s.spawn(move || check_one(client, cache, name, options)))
                    .collect();
                handles
                    .into_iter()
                    .zip(chunk)
                    .map(|(h, name)| {
                        h.join().unwrap_or_else(|_| {
                            Report::invalid(name, "internal error: check panicked".to_string())
                        })
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect()
}

fn check_one(
    client: &Client,
    cache: Option<&ResultCache>,
    raw: &str,
    options: &CheckOptions,
) -> Report {
    let name = sanitize(raw);
    if name.chars().count() > MAX_INPUT_LENGTH {
        return Report::invalid(
            raw,
            format!("name is longer than {MAX_INPUT_LENGTH} characters"),
        );
    }
    let checked = match cache {
        Some(cache) => check_name_cached(client, cache, raw, options),
        None => check_name(client, raw, options),
    };
    match checked {
        Ok(results) => Report::checked(name, results),
        Err(e) => Report::invalid(raw, e.to_string()),
    }
}

fn print_report(report: &Report, cli: &Cli) {
    let name = &report.name;
    let Some(results) = &report.results else {
        if !cli.available_only {
            let error = report.error.as_deref().unwrap_or("unknown error");
            println!("{name}\tinvalid: {error}");
        }
        return;
    };

    for result in results {
        let status = result.status();
        if cli.available_only && status != Status::Available {
            continue;
        }
        let registry = result.registry;
        match status {
            Status::Available => match rules::check_rules(registry, name) {
                Ok(()) => println!("{name}\t{registry}\tavailable"),
                Err(v) => println!(
                    "{name}\t{registry}\tavailable\t(not a valid {} name: {v})",
                    registry.display_name()
                ),
            },
            Status::Taken => match result.page_url() {
                Some(url) => println!("{name}\t{registry}\ttaken\t{url}"),
                None => println!("{name}\t{registry}\ttaken"),
            },
            Status::Errored => println!(
                "{name}\t{registry}\terror: {}",
                result.error_detail().unwrap_or("unknown error")
            ),
        }
        if cli.details {
            if let Some(metadata) = result.metadata() {
                print_metadata(metadata);
            }
        }
    }
}

fn print_metadata(metadata: &PackageMetadata) {
    let fields = [
        ("version", &metadata.version),
        ("description", &metadata.description),
        ("author", &metadata.author),
        ("maintainer", &metadata.maintainer),
        ("license", &metadata.license),
        ("updated", &metadata.last_updated),
        ("published", &metadata.published_at),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            println!("    {label}: {value}");
        }
    }
    if let Some(tags) = metadata.tags.as_ref().filter(|t| !t.is_empty()) {
        println!("    tags: {}", tags.join(", "));
    }
    if let Some(deps) = metadata.dependencies.as_ref().filter(|d| !d.is_empty()) {
        println!("    dependencies: {}", deps.len());
    }
}
