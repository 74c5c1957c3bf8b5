//! # Forcefield (login endpoint relocation)
//!
//! `forcefield` keeps a site's login handler behind a secret path by managing a
//! marker-delimited section of the web server's rewrite configuration
//! (`.htaccess`).
//!
//! ## Polarity
//!
//! In **normal** polarity the login answers at the configured default path and
//! direct requests for the real handler are refused. When failed logins arrive
//! faster than the attack threshold, polarity is **reversed**: the login moves to
//! a random five digit path, and every path handed out during the attack stays
//! blocked until a single cooldown task puts everything back.
//!
//! ## Rewrite Section
//!
//! Only the lines between `# BEGIN <marker>` and `# END <marker>` are ever
//! touched. Reconciling is idempotent, so it runs on every request and on every
//! daemon tick.
//!
//! ## Host
//!
//! Options, deferred tasks, files and time come from the traits in [`store`], so
//! the core runs the same against the real filesystem and in tests.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod markers;
pub mod monitor;
pub mod polarity;
pub mod rewrite;
pub mod rules;
pub mod shield;
pub mod state;
pub mod store;

pub use error::{Error, Result};
pub use shield::ForceField;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
