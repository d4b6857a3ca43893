// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

const AVR_SIZE_OUTPUT: &str = "\
AVR Memory Usage
----------------
.text    924
.data    12
.bss     9
.eeprom  4
";

#[rstest]
fn test_compute_section_size_sums_matches() {
    let size = compute_section_size(
        Some(r"^(?:\.text|\.data)\s+([0-9]+).*"),
        AVR_SIZE_OUTPUT,
    )
    .unwrap();
    assert_eq!(size, Some(936));
}

#[rstest]
fn test_compute_section_size_data_sections() {
    let size = compute_section_size(
        Some(r"^(?:\.data|\.bss)\s+([0-9]+).*"),
        AVR_SIZE_OUTPUT,
    )
    .unwrap();
    assert_eq!(size, Some(21));
}

#[rstest]
fn test_compute_section_size_without_regex() {
    assert_eq!(compute_section_size(None, AVR_SIZE_OUTPUT).unwrap(), None);
    assert_eq!(compute_section_size(Some(""), AVR_SIZE_OUTPUT).unwrap(), None);
}

#[rstest]
fn test_compute_section_size_no_match_is_zero() {
    let size = compute_section_size(Some(r"^\.missing\s+([0-9]+)"), AVR_SIZE_OUTPUT).unwrap();
    assert_eq!(size, Some(0));
}

#[rstest]
fn test_compute_section_size_invalid_regex() {
    match compute_section_size(Some(r"([unclosed"), AVR_SIZE_OUTPUT) {
        Err(crate::Error::InvalidRecipe { .. }) => {}
        other => panic!("expected InvalidRecipe, got: {other:?}"),
    }
}

#[rstest]
fn test_parse_max() {
    assert_eq!(parse_max(Some("32256")), Some(32256));
    assert_eq!(parse_max(Some(" 2048 ")), Some(2048));
    assert_eq!(parse_max(Some("unlimited")), None);
    assert_eq!(parse_max(None), None);
}
