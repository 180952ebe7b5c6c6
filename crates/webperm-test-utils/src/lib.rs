//! Shared test fixtures for the webperm workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`site`]: [`TestSite`] builder for a hosted WordPress layout over `MemoryOps`

pub mod site;

pub use site::{TestSite, CODE_OWNER, DOCUMENT_ROOT, HOME, INTRUDER, RUNTIME_USER};
