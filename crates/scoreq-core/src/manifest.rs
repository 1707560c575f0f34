//! Scoring program manifest (`metadata`) parsing.
//!
//! The manifest is a list of `key: value` lines. The entry whose key
//! contains `command` names the program to run through a token of the form
//! `$program/<executable>`.

use crate::error::PackagingError;

/// Placeholder standing for the unpacked program directory.
pub const PROGRAM_PLACEHOLDER: &str = "$program";

/// File name of the manifest inside a scoring program bundle.
pub const MANIFEST_FILE: &str = "metadata";

/// Split a manifest line on its first `:`. Lines without a colon yield `None`.
pub fn split_entry(line: &str) -> Option<(&str, &str)> {
    line.split_once(':')
        .map(|(key, value)| (key.trim(), value.trim()))
}

/// The value of the last entry whose key contains `command` (case-insensitive).
/// A later command entry overrides an earlier one.
pub fn command_entry(manifest: &str) -> Option<&str> {
    manifest
        .lines()
        .filter_map(split_entry)
        .filter(|(key, _)| key.to_ascii_lowercase().contains("command"))
        .last()
        .map(|(_, value)| value)
}

/// Resolve the executable path, relative to the program directory, named by
/// the manifest's command entry.
///
/// `command: $program/run.sh input output` resolves to `run.sh`.
pub fn resolve_executable(manifest: &str) -> Result<String, PackagingError> {
    let command = command_entry(manifest).ok_or(PackagingError::NoCommand)?;

    let token = command
        .split_whitespace()
        .find(|token| token.contains(PROGRAM_PLACEHOLDER))
        .ok_or_else(|| PackagingError::NoProgramToken {
            command: command.to_string(),
        })?;

    let executable = token
        .split_once('/')
        .map(|(_, rest)| rest.trim_start_matches('/'))
        .unwrap_or("");
    if executable.is_empty() {
        return Err(PackagingError::EmptyExecutable {
            token: token.to_string(),
        });
    }
    Ok(executable.to_string())
}
