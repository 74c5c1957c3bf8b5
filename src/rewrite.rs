//! Keeps the generated rule section of the rewrite configuration in place.

use crate::{
    error::Error,
    markers,
    rules::{self, PolicyInput},
    store::FileStore,
};
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Installation {
    Absent,
    Installed,
}

/// What a call actually did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Unchanged,
    Written,
}

pub struct RewriteManager {
    files: Arc<dyn FileStore>,
    path: PathBuf,
    marker: String,
}

impl RewriteManager {
    #[must_use]
    pub fn new(
        files: Arc<dyn FileStore>,
        path: impl Into<PathBuf>,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            files,
            path: path.into(),
            marker: marker.into(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }

    #[must_use]
    pub fn installation(&self) -> Installation {
        if markers::contains(&self.files.read_lines(&self.path), &self.marker) {
            Installation::Installed
        } else {
            Installation::Absent
        }
    }

    /// Lines currently inside the section.
    #[must_use]
    pub fn installed_lines(&self) -> Vec<String> {
        markers::read(&self.files.read_lines(&self.path), &self.marker)
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.files.is_writable(&self.path)
    }

    /// The padded section as it would be installed.
    #[must_use]
    pub fn section(&self, policy: &PolicyInput) -> Vec<String> {
        rules::generate_section(policy, &self.marker)
    }

    /// # Errors
    /// Returns `Error::FileUnwritable` if the file can't be written.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn install(&self, policy: &PolicyInput) -> Result<Outcome, Error> {
        let document = self.files.read_lines(&self.path);
        if markers::contains(&document, &self.marker) {
            debug!("section already installed");
            return Ok(Outcome::Unchanged);
        }

        let document = markers::write(document, &self.marker, &rules::generate(policy));
        self.files.write_lines(&self.path, &document)?;

        info!("installed rewrite section for {}", policy.secret_path);

        Ok(Outcome::Written)
    }

    /// # Errors
    /// Returns `Error::FileUnwritable` if the file can't be written.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn uninstall(&self) -> Result<Outcome, Error> {
        let document = self.files.read_lines(&self.path);
        if !markers::contains(&document, &self.marker) {
            debug!("section not installed");
            return Ok(Outcome::Unchanged);
        }

        let document = markers::remove(document, &self.marker);
        self.files.write_lines(&self.path, &document)?;

        info!("removed rewrite section");

        Ok(Outcome::Written)
    }

    /// Remove then install, normalising whatever an older release left behind.
    ///
    /// # Errors
    /// Returns `Error::FileUnwritable` if the file can't be written.
    pub fn reinstall(&self, policy: &PolicyInput) -> Result<Outcome, Error> {
        self.uninstall()?;
        self.install(policy)
    }

    /// True when the installed section routes `policy.secret_path` and its
    /// anti-enumeration block matches `policy.permalinks_enabled`.
    #[must_use]
    pub fn is_consistent(&self, policy: &PolicyInput) -> bool {
        lines_match(&self.installed_lines(), policy)
    }

    /// Bring the installed section in line with `policy`, replacing the whole
    /// body when it drifted. Manual edits inside the section are lost; edits
    /// outside it are kept.
    ///
    /// # Errors
    /// Returns `Error::FileUnwritable` if the file can't be written.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn reconcile(&self, policy: &PolicyInput) -> Result<Outcome, Error> {
        let installed = self.installed_lines();

        if installed.is_empty() {
            self.uninstall()?;
            return self.install(policy);
        }

        if lines_match(&installed, policy) {
            debug!("rewrite section is current");
            return Ok(Outcome::Unchanged);
        }

        let document = markers::write(
            self.files.read_lines(&self.path),
            &self.marker,
            &rules::generate(policy),
        );
        self.files.write_lines(&self.path, &document)?;

        info!("rewrote rewrite section for {}", policy.secret_path);

        Ok(Outcome::Written)
    }
}

fn lines_match(installed: &[String], policy: &PolicyInput) -> bool {
    let route = rules::route_rule(&policy.secret_path);
    let routed = installed.iter().any(|line| *line == route);
    let anti_enumeration = installed
        .iter()
        .any(|line| line == rules::ANTI_ENUMERATION_QUERY);

    routed && anti_enumeration == policy.permalinks_enabled
}
