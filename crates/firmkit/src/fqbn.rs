// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Fully qualified board names.

use std::fmt;
use std::str::FromStr;

use crate::Error;

#[cfg(test)]
#[path = "./fqbn_test.rs"]
mod fqbn_test;

/// A fully qualified board name: `packager:architecture:board[:opt=val,...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fqbn {
    pub packager: String,
    pub architecture: String,
    pub board_id: String,
    /// Menu option selections, in the order given.
    pub options: Vec<(String, String)>,
}

impl Fqbn {
    fn invalid(fqbn: &str, reason: &str) -> Error {
        Error::InvalidFqbn {
            fqbn: fqbn.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl FromStr for Fqbn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(Fqbn::invalid(s, "expected 3 or 4 colon-separated segments"));
        }
        if parts[..3].iter().any(|p| p.is_empty()) {
            return Err(Fqbn::invalid(s, "empty segment"));
        }

        let mut options = Vec::new();
        if parts.len() == 4 {
            for pair in parts[3].split(',') {
                let Some((key, value)) = pair.split_once('=') else {
                    return Err(Fqbn::invalid(s, "board options must be key=value pairs"));
                };
                if key.is_empty() {
                    return Err(Fqbn::invalid(s, "empty board option name"));
                }
                if options.iter().any(|(k, _)| k == key) {
                    return Err(Fqbn::invalid(s, "duplicate board option"));
                }
                options.push((key.to_string(), value.to_string()));
            }
        }

        Ok(Fqbn {
            packager: parts[0].to_string(),
            architecture: parts[1].to_string(),
            board_id: parts[2].to_string(),
            options,
        })
    }
}

impl fmt::Display for Fqbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.packager, self.architecture, self.board_id
        )?;
        if !self.options.is_empty() {
            let opts: Vec<String> = self
                .options
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, ":{}", opts.join(","))?;
        }
        Ok(())
    }
}
