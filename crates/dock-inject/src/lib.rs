//! Dock Injection Catalog
//!
//! Static registry of the CSS/JS patches applied to hosted web apps after each
//! page load: one global bundle that always applies, plus at most one bundle
//! per app id. Bundles are immutable once the catalog is built.

mod builtin;
mod bundle;
mod catalog;
mod error;
mod patterns;

pub use bundle::InjectionBundle;
pub use catalog::{InjectionCatalog, InjectionPlan, InjectionStep, DEFAULT_BRIDGE};
pub use error::InjectError;
pub use patterns::DownloadPatterns;

pub type Result<T> = std::result::Result<T, InjectError>;
