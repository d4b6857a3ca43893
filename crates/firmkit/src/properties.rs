// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Ordered property maps and the `key=value` platform file format.
//!
//! Every platform configuration file (`platform.txt`, `boards.txt`,
//! `programmers.txt`, ...) is a flat list of dotted keys. Insertion order is
//! preserved because recipe hooks and menu entries are meaningful in file
//! order, and later files (`*.local.txt`) override earlier ones key by key.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./properties_test.rs"]
mod properties_test;

/// Upper bound for placeholder expansion rounds. Self-referential values
/// stop expanding here instead of looping forever.
const MAX_EXPANSION_ROUNDS: usize = 10;

/// An ordered mapping from dotted string keys to string values.
///
/// Keys are case-sensitive. `set` on an existing key updates the value in
/// place, keeping the key's original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap {
    order: Vec<String>,
    values: HashMap<String, String>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the `key=value` file format.
    ///
    /// Lines starting with `#` are comments, blank lines are skipped, values
    /// extend to the end of the line unquoted, and duplicate keys are
    /// last-wins. `path` is only used for error reporting.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut map = Self::new();
        for (n, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::InvalidPropertyLine {
                    path: path.to_path_buf(),
                    line: n + 1,
                });
            };
            map.set(key.trim(), value.trim());
        }
        Ok(map)
    }

    /// Load a property file. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|error| Error::ReadFailed {
            path: path.to_path_buf(),
            error,
        })?;
        Self::parse(&text, path)
    }

    /// Load a property file, treating a missing file as an empty map.
    ///
    /// Used for the optional `*.local.txt` overrides and for `platform.txt`
    /// files that unversioned platforms may legitimately omit.
    pub fn safe_load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        Self::load(path)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if !self.values.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.values.insert(key, value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .map(move |k| (k.as_str(), self.values[k].as_str()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Merge `other` into this map. On key conflict `other` wins; the
    /// position of a first-seen key is preserved.
    pub fn merge(&mut self, other: &PropertyMap) {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
    }

    /// Group entries by their top-level key segment.
    ///
    /// `uno.name=Uno` lands in the group `uno` as `name=Uno`. Groups appear
    /// in first-seen order. Keys without a dot are ignored, matching the
    /// file format where a bare key cannot address a group member.
    pub fn first_level_of(&self) -> Vec<(String, PropertyMap)> {
        let mut groups: Vec<(String, PropertyMap)> = Vec::new();
        for (key, value) in self.iter() {
            let Some((head, rest)) = key.split_once('.') else {
                continue;
            };
            match groups.iter_mut().find(|(name, _)| name == head) {
                Some((_, group)) => group.set(rest, value),
                None => {
                    let mut group = PropertyMap::new();
                    group.set(rest, value);
                    groups.push((head.to_string(), group));
                }
            }
        }
        groups
    }

    /// Entries whose key starts with `prefix.`, with the prefix stripped.
    pub fn sub_tree(&self, prefix: &str) -> PropertyMap {
        let mut sub = PropertyMap::new();
        let prefix = format!("{prefix}.");
        for (key, value) in self.iter() {
            if let Some(rest) = key.strip_prefix(&prefix) {
                sub.set(rest, value);
            }
        }
        sub
    }

    /// Values of `base.0`, `base.1`, ... in numeric order. When no indexed
    /// form exists, falls back to the single value of `base`.
    pub fn extract_sub_index_lists(&self, base: &str) -> Vec<String> {
        let prefix = format!("{base}.");
        let mut indexed: Vec<(u64, String)> = Vec::new();
        for (key, value) in self.iter() {
            if let Some(rest) = key.strip_prefix(&prefix) {
                if let Ok(idx) = rest.parse::<u64>() {
                    indexed.push((idx, value.to_string()));
                }
            }
        }
        if indexed.is_empty() {
            return self.get(base).map(str::to_string).into_iter().collect();
        }
        indexed.sort_by_key(|(idx, _)| *idx);
        indexed.into_iter().map(|(_, v)| v).collect()
    }

    /// Expand `{dotted.key}` placeholders in `source` against this map.
    ///
    /// Substitution repeats until a fixed point, bounded to stop runaway
    /// self-referential values. Tokens with no matching key are left
    /// literal.
    pub fn expand_props_in_string(&self, source: &str) -> String {
        let mut current = source.to_string();
        for _ in 0..MAX_EXPANSION_ROUNDS {
            let expanded = self.expand_once(&current);
            if expanded == current {
                break;
            }
            current = expanded;
        }
        current
    }

    fn expand_once(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        let mut rest = source;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    let token = &after[..close];
                    match self.get(token) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push('{');
                            out.push_str(token);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl fmt::Display for PropertyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in self.iter() {
            writeln!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = PropertyMap::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

/// Split a command line into argv, honoring double- and single-quoted
/// segments. Mismatched quotes are an error.
pub fn split_quoted_string(input: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;

    for ch in input.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_arg = true;
            }
            None if ch.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            None => {
                current.push(ch);
                in_arg = true;
            }
        }
    }
    if quote.is_some() {
        return Err(Error::Quote(input.to_string()));
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}
