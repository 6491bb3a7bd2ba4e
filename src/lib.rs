//! phpfacts - static facts extraction for legacy PHP codebases.
//!
//! phpfacts reads a PHP source tree without executing it and produces a
//! `FactsModel`: per-file symbols, HTTP endpoints, the persistence profile,
//! composer dependencies with known equivalents, the directory layout, and
//! summary tiers computed from all of them.
//!
//! # Architecture
//!
//! - `scan`: walks the tree and reads candidate files
//! - `analyze`: the per-file analyzers (symbols, endpoints, persistence,
//!   dependency usage) plus the tree-level structure analyzer
//! - `aggregate`: merges analyzer outputs into a `FactsModel`
//! - `pipeline`: runs the analyzers on a worker pool
//! - `config`: YAML scan configuration
//! - `report`: Output formatting (text, JSON)
//!
//! ```no_run
//! let model = phpfacts::scan("legacy-app")?;
//! println!("{} endpoints", model.totals.endpoints);
//! # Ok::<(), phpfacts::Error>(())
//! ```

pub mod aggregate;
pub mod analyze;
pub mod cli;
pub mod config;
pub mod error;
pub mod facts;
pub mod pipeline;
pub mod report;
pub mod scan;

pub use config::ScanConfig;
pub use error::{Error, FileWarning, Result, WarningKind};
pub use facts::FactsModel;
pub use pipeline::{scan, Runner};
pub use scan::{FileScanner, SourceFile};
