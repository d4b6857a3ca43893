// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Image size reporting and enforcement of board-declared maxima.

use regex::Regex;

use crate::properties::PropertyMap;
use crate::{Error, Result};

use super::exec::{expand_recipe, run_command_capture};
use super::BuildSession;

#[cfg(test)]
#[path = "./sizer_test.rs"]
mod sizer_test;

/// A measured executable section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSize {
    pub name: String,
    pub size: u64,
    pub max_size: Option<u64>,
}

/// Run the size recipe, report usage, and fail when a section exceeds its
/// board-declared maximum. A failed build has no image to measure, so the
/// sizer reports nothing for it.
pub async fn run_sizer(
    session: &BuildSession,
    build_failed: bool,
    properties: &PropertyMap,
) -> Result<Vec<SectionSize>> {
    if build_failed || session.only_update_compilation_database {
        return Ok(Vec::new());
    }
    if properties.get("recipe.size.pattern").unwrap_or("").is_empty() {
        return Ok(Vec::new());
    }

    let argv = expand_recipe(properties, "recipe.size.pattern")?;
    let output = run_command_capture(&argv, &session.sinks, session.verbose).await?;
    let output = String::from_utf8_lossy(&output);

    let program_size = compute_section_size(properties.get("recipe.size.regex"), &output)?;
    let data_size = compute_section_size(properties.get("recipe.size.regex.data"), &output)?;
    let eeprom_size = compute_section_size(properties.get("recipe.size.regex.eeprom"), &output)?;

    let max_program = parse_max(properties.get("upload.maximum_size"));
    let max_data = parse_max(properties.get("upload.maximum_data_size"));

    let mut sections = Vec::new();

    if let Some(size) = program_size {
        match max_program {
            Some(max) => {
                session.sinks.info(&format!(
                    "Sketch uses {size} bytes ({}%) of program storage space. Maximum is {max} bytes.",
                    size * 100 / max.max(1)
                ));
                if size > max {
                    return Err(Error::SizeExceeded {
                        region: "text",
                        size,
                        maximum: max,
                    });
                }
            }
            None => session
                .sinks
                .info(&format!("Sketch uses {size} bytes of program storage space.")),
        }
        sections.push(SectionSize {
            name: "text".to_string(),
            size,
            max_size: max_program,
        });
    }

    if let Some(size) = data_size {
        match max_data {
            Some(max) => {
                session.sinks.info(&format!(
                    "Global variables use {size} bytes ({}%) of dynamic memory, leaving {} bytes for local variables. Maximum is {max} bytes.",
                    size * 100 / max.max(1),
                    max.saturating_sub(size)
                ));
                if size > max {
                    return Err(Error::SizeExceeded {
                        region: "data",
                        size,
                        maximum: max,
                    });
                }
            }
            None => session
                .sinks
                .info(&format!("Global variables use {size} bytes of dynamic memory.")),
        }
        sections.push(SectionSize {
            name: "data".to_string(),
            size,
            max_size: max_data,
        });
    }

    if let Some(size) = eeprom_size {
        sections.push(SectionSize {
            name: "eeprom".to_string(),
            size,
            max_size: None,
        });
    }

    Ok(sections)
}

/// Sum every first-group match of the section regex over the size output.
/// `None` when the platform declares no regex for the section.
fn compute_section_size(regex: Option<&str>, output: &str) -> Result<Option<u64>> {
    let Some(regex) = regex.filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    let regex = Regex::new(&format!("(?m){regex}")).map_err(|err| Error::InvalidRecipe {
        key: "recipe.size.regex".to_string(),
        reason: err.to_string(),
    })?;

    let mut total = 0u64;
    for captures in regex.captures_iter(output) {
        if let Some(group) = captures.get(1) {
            total += group.as_str().trim().parse::<u64>().unwrap_or(0);
        }
    }
    Ok(Some(total))
}

fn parse_max(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.trim().parse::<u64>().ok())
}
