// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Version parsing helpers.
//!
//! Platform releases require strict semantic versions. Tool releases are
//! historically looser (`1.0.0-arduino5`, `5.1`, `latest`), so they parse
//! into a relaxed form that keeps the raw string and only orders as semver
//! when it can.

use std::cmp::Ordering;
use std::fmt;

use semver::Version;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./version_test.rs"]
mod version_test;

/// Parse a strict semantic version, as required for platform releases.
pub fn parse_strict(value: &str, context: &str) -> Result<Version> {
    Version::parse(value.trim()).map_err(|_| Error::InvalidVersion {
        value: value.to_string(),
        context: context.to_string(),
    })
}

/// A version that may or may not be a valid semantic version.
///
/// The raw string is kept for display. Two parseable values compare as
/// semver; everything else falls back to string comparison, with non-semver
/// values ordering below semver ones. That keeps "pick the latest installed
/// release" stable even for odd tool versions.
#[derive(Debug, Clone)]
pub struct RelaxedVersion {
    raw: String,
    parsed: Option<Version>,
}

impl RelaxedVersion {
    /// Parse leniently: anything is accepted.
    ///
    /// Two-segment numeric forms (`5.1`) are promoted to semver with a zero
    /// patch so they order numerically, while still displaying as written.
    pub fn parse(value: &str) -> Self {
        let raw = value.trim().to_string();
        let parsed = Version::parse(&raw).ok().or_else(|| {
            let parts: Vec<&str> = raw.split('.').collect();
            if parts.len() == 2 && parts.iter().all(|s| s.parse::<u64>().is_ok()) {
                Version::parse(&format!("{raw}.0")).ok()
            } else {
                None
            }
        });
        RelaxedVersion { raw, parsed }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_semver(&self) -> bool {
        self.parsed.is_some()
    }
}

impl From<&Version> for RelaxedVersion {
    fn from(v: &Version) -> Self {
        RelaxedVersion {
            raw: v.to_string(),
            parsed: Some(v.clone()),
        }
    }
}

impl fmt::Display for RelaxedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Ord for RelaxedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.parsed, &other.parsed) {
            (Some(a), Some(b)) => a.cmp(b),
            (None, None) => self.raw.cmp(&other.raw),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
        }
    }
}

impl PartialOrd for RelaxedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RelaxedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RelaxedVersion {}
