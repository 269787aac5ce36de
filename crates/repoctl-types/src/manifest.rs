use std::collections::BTreeMap;

use thiserror::Error;

/// Parser/formatter for the `libbutl`-style line manifest format used
/// by `loadtab`, `packages.manifest`, `repositories.manifest`, and the
/// on-disk CI submission manifests (§6): one `name: value` pair per
/// line, blank lines separate records, `#` prefixes a comment.
///
/// This is *not* a general bpkg/bdep manifest implementation (parsing
/// package manifests themselves is delegated to an external manifest
/// library per §1 Non-goals); it only covers the flat name/value shape
/// the loader and CI endpoints read and write directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestRecord {
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestParseError {
    #[error("line {0}: expected 'name: value', found {1:?}")]
    MalformedLine(usize, String),
}

impl ManifestRecord {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.fields
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }
}

/// Parses a single manifest record (one "paragraph" of `name: value`
/// lines). Comments (`#...`) and blank lines are skipped.
pub fn parse_record(text: &str) -> Result<ManifestRecord, ManifestParseError> {
    let mut record = ManifestRecord::default();
    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim_end();
        if line.is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ManifestParseError::MalformedLine(idx + 1, line.to_string()))?;
        record.push(name.trim(), value.trim());
    }
    Ok(record)
}

/// Splits a multi-record manifest file (records separated by blank
/// lines) into individual `ManifestRecord`s.
pub fn parse_records(text: &str) -> Result<Vec<ManifestRecord>, ManifestParseError> {
    let mut records = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.trim().is_empty() {
                records.push(parse_record(&current)?);
                current.clear();
            }
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.trim().is_empty() {
        records.push(parse_record(&current)?);
    }
    Ok(records)
}

pub fn format_record(record: &ManifestRecord) -> String {
    let mut out = String::new();
    for (name, value) in &record.fields {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// A single `loadtab` line (§6 "loadtab file"):
/// `<remote-location> <display-name> cache:<path>
/// [fingerprint:<sha256>] [buildable:(yes|no)]`, tab-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadtabEntry {
    pub location: String,
    pub display_name: String,
    pub cache: String,
    pub fingerprint: Option<String>,
    pub buildable: Option<bool>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadtabParseError {
    #[error("line {0}: missing remote location")]
    MissingLocation(usize),
    #[error("line {0}: missing display name")]
    MissingDisplayName(usize),
    #[error("line {0}: missing required 'cache:' option")]
    MissingCache(usize),
    #[error("line {0}: remote location must not be local")]
    LocalLocation(usize),
    #[error("line {0}: invalid 'buildable:' value {1:?}")]
    InvalidBuildable(usize, String),
}

/// Parses the whole `loadtab` file, skipping comments (`#`) and blank
/// lines (§6).
pub fn parse_loadtab(text: &str) -> Result<Vec<LoadtabEntry>, LoadtabParseError> {
    let mut entries = Vec::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').filter(|f| !f.is_empty()).collect();
        let location = *fields
            .first()
            .ok_or(LoadtabParseError::MissingLocation(lineno))?;
        if location.is_empty() {
            return Err(LoadtabParseError::MissingLocation(lineno));
        }
        if is_local_location(location) {
            return Err(LoadtabParseError::LocalLocation(lineno));
        }
        let display_name = *fields
            .get(1)
            .ok_or(LoadtabParseError::MissingDisplayName(lineno))?;
        if display_name.is_empty() {
            return Err(LoadtabParseError::MissingDisplayName(lineno));
        }

        let mut cache = None;
        let mut fingerprint = None;
        let mut buildable = None;
        for opt in &fields[2..] {
            if let Some(v) = opt.strip_prefix("cache:") {
                cache = Some(v.to_string());
            } else if let Some(v) = opt.strip_prefix("fingerprint:") {
                fingerprint = Some(v.to_string());
            } else if let Some(v) = opt.strip_prefix("buildable:") {
                buildable = Some(match v {
                    "yes" => true,
                    "no" => false,
                    other => return Err(LoadtabParseError::InvalidBuildable(lineno, other.to_string())),
                });
            }
        }

        entries.push(LoadtabEntry {
            location: location.to_string(),
            display_name: display_name.to_string(),
            cache: cache.ok_or(LoadtabParseError::MissingCache(lineno))?,
            fingerprint,
            buildable,
        });
    }
    Ok(entries)
}

fn is_local_location(location: &str) -> bool {
    !location.contains("://") && !location.starts_with("http")
}

/// Custom name/value pairs attached to CI submissions and task
/// manifests (§6).
pub type CustomFields = BTreeMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_record() {
        let text = "name: libfoo\nversion: 1.2.2\n";
        let record = parse_record(text).unwrap();
        assert_eq!(record.get("name"), Some("libfoo"));
        assert_eq!(record.get("version"), Some("1.2.2"));
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let text = "# a comment\nname: libfoo\n\nversion: 1.2.2\n";
        let record = parse_record(text).unwrap();
        assert_eq!(record.fields.len(), 2);
    }

    #[test]
    fn malformed_line_is_rejected() {
        let text = "name libfoo\n";
        assert!(matches!(
            parse_record(text),
            Err(ManifestParseError::MalformedLine(1, _))
        ));
    }

    #[test]
    fn parses_loadtab_with_all_options() {
        let text = "https://example.com/stable\tStable\tcache:/var/cache/stable\tfingerprint:AB:CD\tbuildable:yes\n";
        let entries = parse_loadtab(text).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].display_name, "Stable");
        assert_eq!(entries[0].buildable, Some(true));
        assert_eq!(entries[0].fingerprint.as_deref(), Some("AB:CD"));
    }

    #[test]
    fn loadtab_rejects_local_location() {
        let text = "/var/repo\tLocal\tcache:/var/cache/local\n";
        assert_eq!(parse_loadtab(text), Err(LoadtabParseError::LocalLocation(1)));
    }

    #[test]
    fn loadtab_requires_cache_option() {
        let text = "https://example.com/stable\tStable\n";
        assert_eq!(parse_loadtab(text), Err(LoadtabParseError::MissingCache(1)));
    }

    #[test]
    fn loadtab_ignores_comments_and_blanks() {
        let text = "# comment\n\nhttps://example.com/x\tX\tcache:/c\n";
        assert_eq!(parse_loadtab(text).unwrap().len(), 1);
    }
}
