//! Environment override-and-merge.

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};

/// Split a `KEY=VALUE` entry at the first `=`.
///
/// An entry without `=` is treated as a key with an empty value.
pub fn split_entry(entry: &str) -> (&str, &str) {
    entry.split_once('=').unwrap_or((entry, ""))
}

/// Build the child environment from caller overrides and the inherited set.
///
/// Overrides come first, in the order given. Inherited variables follow,
/// minus any whose key was overridden. Repeated overrides of one key are kept
/// in order, so the last one wins when the environment is applied.
pub fn merge_env<I>(overrides: &[String], inherited: I) -> Vec<(OsString, OsString)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut merged = Vec::with_capacity(overrides.len());
    let mut overridden: HashSet<&OsStr> = HashSet::new();

    for entry in overrides {
        let (key, value) = split_entry(entry);
        overridden.insert(OsStr::new(key));
        merged.push((OsString::from(key), OsString::from(value)));
    }

    merged.extend(
        inherited
            .into_iter()
            .filter(|(key, _)| !overridden.contains(key.as_os_str())),
    );
    merged
}
