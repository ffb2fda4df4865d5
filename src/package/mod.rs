//! Package list parsing.
//!
//! The package list is plain text with one requirement per line. Blank lines
//! and `#` comments are skipped; extras and environment markers are accepted
//! and dropped because dependency resolution is never performed.
//!
//! # Example
//!
//! ```
//! use wheelfetch_core::package::parse_package_list;
//!
//! let specs = parse_package_list("requests==2.31.0\n# tools\nnumpy>=1.24\n").unwrap();
//! assert_eq!(specs.len(), 2);
//! assert_eq!(specs[0].requirement(), "requests==2.31.0");
//! ```

mod version;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::ConfigError;

pub use version::{InvalidVersion, Operator, PreRelease, Specifier, Version, VersionConstraint};

/// Comment marker recognized anywhere on a line.
pub const COMMENT_MARKER: char = '#';

#[allow(clippy::expect_used)]
static REQUIREMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[(?P<extras>[^\]]*)\])?\s*(?P<rest>.*)$")
        .expect("requirement regex is valid") // Static pattern, safe to panic
});

/// One requirement from the package list.
#[derive(Debug, Clone)]
pub struct PackageSpec {
    name: String,
    normalized: String,
    constraint: VersionConstraint,
}

impl PackageSpec {
    /// Parses a single requirement string (no comment handling).
    ///
    /// # Errors
    ///
    /// Returns a reason string when the line is not a plain named requirement.
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.starts_with('-') {
            return Err("package manager options are not supported in the package list".into());
        }

        let caps = REQUIREMENT_PATTERN
            .captures(text)
            .ok_or_else(|| "missing package name".to_string())?;
        let name = caps.name("name").map_or("", |m| m.as_str());

        let rest = caps.name("rest").map_or("", |m| m.as_str());
        let rest = rest.split_once(';').map_or(rest, |(before, _marker)| before).trim();
        if rest.starts_with('@') {
            return Err("direct URL references are not supported".into());
        }
        let rest = rest
            .strip_prefix('(')
            .and_then(|inner| inner.strip_suffix(')'))
            .unwrap_or(rest);

        let constraint = VersionConstraint::parse(rest).map_err(|e| e.to_string())?;
        Ok(Self {
            name: name.to_string(),
            normalized: normalize_name(name),
            constraint,
        })
    }

    /// Name as written in the package list.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized project name used for index URLs and filename comparison.
    #[must_use]
    pub fn normalized_name(&self) -> &str {
        &self.normalized
    }

    /// Version constraint; empty when the line names no version.
    #[must_use]
    pub fn constraint(&self) -> &VersionConstraint {
        &self.constraint
    }

    /// Requirement string handed to the package manager (`name>=1,<2`).
    #[must_use]
    pub fn requirement(&self) -> String {
        format!("{}{}", self.name, self.constraint)
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.requirement())
    }
}

/// Normalizes a project name: lowercase, runs of `-`, `_`, `.` collapse to `-`.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for ch in name.trim().chars() {
        if matches!(ch, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.push(ch.to_ascii_lowercase());
            in_separator = false;
        }
    }
    out
}

/// Parses package list content into requirements.
///
/// Repeated project names keep their first occurrence.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidRequirement`] for the first bad line.
pub fn parse_package_list(content: &str) -> Result<Vec<PackageSpec>, ConfigError> {
    let mut seen = HashSet::new();
    let mut specs = Vec::new();

    for (index, raw_line) in content.lines().enumerate() {
        let line = raw_line
            .split_once(COMMENT_MARKER)
            .map_or(raw_line, |(before, _)| before)
            .trim();
        if line.is_empty() {
            continue;
        }

        let spec = PackageSpec::parse(line)
            .map_err(|reason| ConfigError::invalid_requirement(index + 1, line, reason))?;

        if !seen.insert(spec.normalized_name().to_string()) {
            warn!(
                line = index + 1,
                package = %spec.name(),
                "duplicate package in list; keeping first occurrence"
            );
            continue;
        }
        specs.push(spec);
    }

    debug!(count = specs.len(), "parsed package list");
    Ok(specs)
}

/// Reads and parses the package list at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::PackageListUnreadable`] when the file cannot be read,
/// [`ConfigError::EmptyPackageList`] when it names no packages, or a parse error.
pub fn load_package_list(path: &Path) -> Result<Vec<PackageSpec>, ConfigError> {
    let content =
        std::fs::read_to_string(path).map_err(|source| ConfigError::PackageListUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
    let specs = parse_package_list(&content)?;
    if specs.is_empty() {
        return Err(ConfigError::EmptyPackageList {
            path: path.to_path_buf(),
        });
    }
    Ok(specs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_blank_lines_and_comments() {
        let specs = parse_package_list("\n# header\nrequests  # http\n\n   \nflask\n").unwrap();
        let names: Vec<_> = specs.iter().map(PackageSpec::name).collect();
        assert_eq!(names, ["requests", "flask"]);
    }

    #[test]
    fn test_parse_pinned_version() {
        let spec = PackageSpec::parse("requests==2.31.0").unwrap();
        assert_eq!(spec.name(), "requests");
        assert_eq!(spec.requirement(), "requests==2.31.0");
        assert!(spec.constraint().allows(&"2.31.0".parse().unwrap()));
        assert!(!spec.constraint().allows(&"2.30.0".parse().unwrap()));
    }

    #[test]
    fn test_parse_drops_extras_and_markers() {
        let spec = PackageSpec::parse("requests[socks] >= 2.0 ; python_version >= \"3.8\"").unwrap();
        assert_eq!(spec.requirement(), "requests>=2.0");
    }

    #[test]
    fn test_parse_parenthesized_constraint() {
        let spec = PackageSpec::parse("six (>=1.10)").unwrap();
        assert_eq!(spec.requirement(), "six>=1.10");
    }

    #[test]
    fn test_parse_rejects_options_and_urls() {
        assert!(PackageSpec::parse("-r other.txt").is_err());
        assert!(PackageSpec::parse("pkg @ https://example.com/pkg.whl").is_err());
        assert!(PackageSpec::parse("==1.0").is_err());
    }

    #[test]
    fn test_parse_error_reports_line_number() {
        let err = parse_package_list("requests\nnumpy =>1.0\n").unwrap_err();
        match err {
            ConfigError::InvalidRequirement { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let specs = parse_package_list("Django==4.2\ndjango\n").unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].requirement(), "Django==4.2");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Zope.Interface"), "zope-interface");
        assert_eq!(normalize_name("typing__extensions"), "typing-extensions");
        assert_eq!(normalize_name("ruamel.yaml.clib"), "ruamel-yaml-clib");
    }

    #[test]
    fn test_load_package_list_empty_file_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("packages.txt");
        std::fs::write(&path, "# nothing here\n\n").unwrap();
        let err = load_package_list(&path).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyPackageList { .. }));
    }

    #[test]
    fn test_load_package_list_missing_file() {
        let err = load_package_list(Path::new("/nonexistent/packages.txt")).unwrap_err();
        assert!(matches!(err, ConfigError::PackageListUnreadable { .. }));
    }
}
