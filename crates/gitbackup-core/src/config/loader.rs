//! INI configuration file loading.
//!
//! Keys may live in any section and are matched case-insensitively with
//! `_`, `-` and spaces ignored, so `SourcePath`, `source_path` and
//! `source-path` are the same key. Recognised keys:
//!
//! | key | meaning |
//! |---|---|
//! | `source`, `sourcepath`, `sourcedir` | directory to back up |
//! | `repository`, `repositorypath`, `repopath`, `destination` | repository path |
//! | `authorname`, `authoremail` | commit identity |
//! | `bare`, `usebarerepository`, `flatstore` | flat (bare) mode, default `true` |
//! | `exclude` | comma-separated patterns |
//! | `exclude1` ... `excludeN` | one pattern each |
//! | `maxfilesize`, `minfilesize` | bytes, `K`/`M`/`G` suffixes allowed |
//! | `excludebinary` | skip binary files |
//! | `branch` | snapshot branch |
//! | `flattenpaths` | legacy flattened layout |
//! | `workers` | ingestion threads |
//!
//! Patterns from `exclude` come first, followed by the numbered keys in
//! ascending order. When no pattern is configured the
//! [`DEFAULT_EXCLUDES`](super::DEFAULT_EXCLUDES) set is used.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat, Value};
use tracing::debug;

use super::{BackupConfig, DEFAULT_EXCLUDES, PathLayout};
use crate::error::{CoreError, Result};

const SOURCE_KEYS: &[&str] = &["source", "sourcepath", "sourcedir"];
const STORE_KEYS: &[&str] = &["repository", "repositorypath", "repopath", "destination"];
const BARE_KEYS: &[&str] = &["bare", "usebarerepository", "flatstore"];

/// Loads and validates a backup configuration from an INI file.
///
/// Relative paths in the file are resolved against the file's directory.
pub fn load_config(path: &Path) -> Result<BackupConfig> {
    let settings = Config::builder()
        .add_source(File::from(path).format(FileFormat::Ini))
        .build()
        .map_err(|e| CoreError::config_file_with_cause(path, "could not read INI file", e))?;

    let raw: HashMap<String, Value> = settings
        .try_deserialize()
        .map_err(|e| CoreError::config_file_with_cause(path, "unexpected INI structure", e))?;

    let entries = flatten(path, raw)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    debug!("Loaded {} settings from {:?}", entries.len(), path);

    from_entries(&entries, base)
}

/// Collapses sections into one key space. Top-level keys are applied
/// first, then sections in name order; later values override earlier ones.
fn flatten(path: &Path, raw: HashMap<String, Value>) -> Result<BTreeMap<String, String>> {
    let mut top = Vec::new();
    let mut sections = BTreeMap::new();

    for (key, value) in raw {
        match value.clone().into_table() {
            Ok(table) => {
                sections.insert(key, table);
            },
            Err(_) => top.push((key, value)),
        }
    }

    let mut entries = BTreeMap::new();
    let section_values = sections.into_values().flat_map(|table| table.into_iter());

    for (key, value) in top.into_iter().chain(section_values) {
        let text = value.into_string().map_err(|e| {
            CoreError::config_file_with_cause(path, format!("value of '{}' is not text", key), e)
        })?;
        entries.insert(normalize_key(&key), text);
    }

    Ok(entries)
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

fn lookup<'a>(entries: &'a BTreeMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| entries.get(*k))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Builds a configuration from normalized key/value entries.
pub(crate) fn from_entries(entries: &BTreeMap<String, String>, base: &Path) -> Result<BackupConfig> {
    let resolve = |value: &str| -> PathBuf {
        let p = PathBuf::from(value);
        if p.is_absolute() { p } else { base.join(p) }
    };

    let mut builder = BackupConfig::builder();

    if let Some(source) = lookup(entries, SOURCE_KEYS) {
        builder = builder.source_root(resolve(source));
    }
    if let Some(store) = lookup(entries, STORE_KEYS) {
        builder = builder.snapshot_store(resolve(store));
    }

    let name = lookup(entries, &["authorname", "author"]);
    let email = lookup(entries, &["authoremail", "email"]);
    if let (Some(name), Some(email)) = (name, email) {
        builder = builder.author(name, email);
    }

    if let Some(value) = lookup(entries, BARE_KEYS) {
        builder = builder.use_flat_store(parse_bool("bare", value)?);
    }
    if let Some(value) = lookup(entries, &["excludebinary"]) {
        builder = builder.exclude_binary(parse_bool("exclude_binary", value)?);
    }
    if let Some(value) = lookup(entries, &["flattenpaths"])
        && parse_bool("flatten_paths", value)?
    {
        builder = builder.path_layout(PathLayout::Flatten);
    }
    if let Some(branch) = lookup(entries, &["branch"]) {
        builder = builder.branch(branch);
    }
    if let Some(value) = lookup(entries, &["workers"]) {
        let workers = value
            .parse::<usize>()
            .map_err(|_| CoreError::invalid_config("workers", format!("'{}' is not a number", value)))?;
        builder = builder.workers(workers);
    }

    let min = lookup(entries, &["minfilesize"])
        .map(|v| parse_size("min_file_size", v))
        .transpose()?
        .unwrap_or(0);
    let max = lookup(entries, &["maxfilesize"])
        .map(|v| parse_size("max_file_size", v))
        .transpose()?
        .unwrap_or(0);
    builder = builder.file_size_limits(min, max);

    let patterns = collect_patterns(entries);
    builder = if patterns.is_empty() {
        builder.exclusion_patterns(DEFAULT_EXCLUDES.to_vec())
    } else {
        builder.exclusion_patterns(patterns)
    };

    builder.build()
}

/// `exclude` (comma-separated) first, then `excludeN` by ascending N.
fn collect_patterns(entries: &BTreeMap<String, String>) -> Vec<String> {
    let mut patterns: Vec<String> = entries
        .get("exclude")
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut numbered: Vec<(u32, &str)> = entries
        .iter()
        .filter_map(|(key, value)| {
            let n = key.strip_prefix("exclude")?.parse::<u32>().ok()?;
            Some((n, value.trim()))
        })
        .filter(|(_, value)| !value.is_empty())
        .collect();
    numbered.sort_by_key(|(n, _)| *n);

    patterns.extend(numbered.into_iter().map(|(_, p)| p.to_string()));
    patterns
}

fn parse_bool(field: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CoreError::invalid_config(
            field,
            format!("'{}' is not a boolean", value),
        )),
    }
}

/// Parses a byte count with an optional binary suffix (`K`, `M`, `G`, with
/// or without a trailing `B`).
pub fn parse_size(field: &str, value: &str) -> Result<u64> {
    let upper = value.trim().to_ascii_uppercase();
    let digits = upper.strip_suffix('B').unwrap_or(&upper);

    let (number, multiplier) = match digits.chars().last() {
        Some('K') => (&digits[..digits.len() - 1], 1024),
        Some('M') => (&digits[..digits.len() - 1], 1024 * 1024),
        Some('G') => (&digits[..digits.len() - 1], 1024 * 1024 * 1024),
        _ => (digits, 1),
    };

    number
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| CoreError::invalid_config(field, format!("'{}' is not a size", value)))
}
