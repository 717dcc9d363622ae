#![warn(missing_docs, missing_debug_implementations)]

//! Check whether a package name is already taken on npm, PyPI and crates.io.
//!
//! A name is sanitized once, then every registry is asked about it in
//! parallel. Each registry's answer is classified purely by HTTP status
//! (2xx taken, 404 available, anything else an error), and the package
//! document of a taken name is normalized into one [`PackageMetadata`]
//! shape. Results can be memoized in a [`ResultCache`] over any
//! [`CacheStore`](cache::CacheStore).
//!
//! # Example
//!
//! ```no_run
//! use taken::check::{CheckOptions, Client, Status, check_name};
//!
//! let client = Client::new();
//! match check_name(&client, "my-cool-package", &CheckOptions::default()) {
//!     Ok(results) => {
//!         for result in results {
//!             match result.status() {
//!                 Status::Available => println!("{}: free", result.registry),
//!                 Status::Taken => println!("{}: taken", result.registry),
//!                 Status::Errored => println!("{}: try again", result.registry),
//!             }
//!         }
//!     }
//!     Err(e) => eprintln!("error: {e}"),
//! }
//! ```

pub mod cache;
pub mod check;
pub mod config;
pub mod logging;
pub mod metadata;
pub mod registry;
pub mod rules;
pub mod sanitize;

pub use cache::ResultCache;
pub use check::{CheckError, CheckOptions, Client, ProbeResult, Status, check_name};
pub use metadata::PackageMetadata;
pub use registry::{Registry, RegistryId};
