//! Best-match selection over an index file listing.
//!
//! Wheel order: exact platform tag before universal, then version per
//! [`VersionPreference`], then tag preference rank, then listing order.
//! Source distributions: version per preference, then listing order.

use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

use serde::Deserialize;

use crate::artifact::{is_safe_filename, parse_sdist_filename, parse_wheel_filename};
use crate::config::VersionPreference;
use crate::package::{PackageSpec, Version, VersionConstraint};
use crate::target::{DownloadTarget, TagMatch, match_wheel_tags};

/// One file entry of a PEP 691 project page.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexFile {
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub hashes: HashMap<String, String>,
    #[serde(default, rename = "requires-python")]
    pub requires_python: Option<String>,
    #[serde(default)]
    pub yanked: Yanked,
}

impl IndexFile {
    /// Published sha256 digest, lowercase hex.
    #[must_use]
    pub fn sha256(&self) -> Option<String> {
        self.hashes.get("sha256").map(|h| h.to_ascii_lowercase())
    }

    fn is_yanked(&self) -> bool {
        match &self.yanked {
            Yanked::Flag(flag) => *flag,
            Yanked::Reason(_) => true,
        }
    }
}

/// `yanked` is either a boolean or a reason string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Yanked {
    Flag(bool),
    Reason(String),
}

impl Default for Yanked {
    fn default() -> Self {
        Self::Flag(false)
    }
}

/// A PEP 691 project page.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectPage {
    #[serde(default)]
    pub files: Vec<IndexFile>,
}

/// A file chosen from the listing.
#[derive(Debug, Clone)]
pub struct Selected<'a> {
    pub file: &'a IndexFile,
    pub version: Version,
}

struct WheelCandidate<'a> {
    file: &'a IndexFile,
    version: Version,
    tag: TagMatch,
    position: usize,
}

/// Picks the best wheel for `target`, if any file qualifies.
#[must_use]
pub fn select_wheel<'a>(
    files: &'a [IndexFile],
    package: &PackageSpec,
    target: &DownloadTarget,
    preference: VersionPreference,
) -> Option<Selected<'a>> {
    let interpreter: Option<Version> = target.python.to_string().parse().ok();
    let candidates: Vec<WheelCandidate<'a>> = files
        .iter()
        .enumerate()
        .filter(|(_, file)| usable(file))
        .filter(|(_, file)| {
            interpreter
                .as_ref()
                .is_none_or(|python| supports_python(file, python))
        })
        .filter_map(|(position, file)| {
            let wheel = parse_wheel_filename(&file.filename)?;
            if wheel.name != package.normalized_name() || !package.constraint().allows(&wheel.version) {
                return None;
            }
            let tag = match_wheel_tags(&wheel.tag, target)?;
            Some(WheelCandidate {
                file,
                version: wheel.version,
                tag,
                position,
            })
        })
        .collect();

    let first_seen = first_positions(candidates.iter().map(|c| (&c.version, c.position)));
    candidates
        .into_iter()
        .min_by(|a, b| {
            Reverse(a.tag.exact)
                .cmp(&Reverse(b.tag.exact))
                .then_with(|| compare_versions(&a.version, &b.version, preference, &first_seen))
                .then_with(|| a.tag.rank.cmp(&b.tag.rank))
                .then_with(|| a.position.cmp(&b.position))
        })
        .map(|c| Selected {
            file: c.file,
            version: c.version,
        })
}

/// Picks the best source distribution, if any file qualifies.
#[must_use]
pub fn select_sdist<'a>(
    files: &'a [IndexFile],
    package: &PackageSpec,
    preference: VersionPreference,
) -> Option<Selected<'a>> {
    let candidates: Vec<(usize, &'a IndexFile, Version)> = files
        .iter()
        .enumerate()
        .filter(|(_, file)| usable(file))
        .filter_map(|(position, file)| {
            let sdist = parse_sdist_filename(&file.filename)?;
            (sdist.name == package.normalized_name() && package.constraint().allows(&sdist.version))
                .then_some((position, file, sdist.version))
        })
        .collect();

    let first_seen = first_positions(candidates.iter().map(|(pos, _, v)| (v, *pos)));
    candidates
        .into_iter()
        .min_by(|a, b| {
            compare_versions(&a.2, &b.2, preference, &first_seen).then_with(|| a.0.cmp(&b.0))
        })
        .map(|(_, file, version)| Selected { file, version })
}

fn usable(file: &IndexFile) -> bool {
    !file.is_yanked() && is_safe_filename(&file.filename)
}

/// Honors `requires-python`; unparseable metadata does not exclude a file.
fn supports_python(file: &IndexFile, python: &Version) -> bool {
    file.requires_python
        .as_deref()
        .and_then(|spec| VersionConstraint::parse(spec).ok())
        .is_none_or(|constraint| constraint.allows(python))
}

fn first_positions<'v>(items: impl Iterator<Item = (&'v Version, usize)>) -> HashMap<String, usize> {
    let mut seen = HashMap::new();
    for (version, position) in items {
        seen.entry(version.as_str().to_string()).or_insert(position);
    }
    seen
}

/// Smaller means preferred.
fn compare_versions(
    a: &Version,
    b: &Version,
    preference: VersionPreference,
    first_seen: &HashMap<String, usize>,
) -> Ordering {
    match preference {
        VersionPreference::Highest => b.cmp(a),
        VersionPreference::FirstListed => {
            let pos = |v: &Version| first_seen.get(v.as_str()).copied().unwrap_or(usize::MAX);
            pos(a).cmp(&pos(b))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::target::{Platform, PythonVersion};

    fn file(name: &str) -> IndexFile {
        IndexFile {
            filename: name.to_string(),
            url: format!("https://files.example/{name}"),
            hashes: HashMap::new(),
            requires_python: None,
            yanked: Yanked::default(),
        }
    }

    fn spec(text: &str) -> PackageSpec {
        PackageSpec::parse(text).unwrap()
    }

    fn linux311() -> DownloadTarget {
        DownloadTarget::new(Platform::Linux, PythonVersion::new(11))
    }

    #[test]
    fn test_exact_platform_wheel_beats_universal() {
        let files = [
            file("requests-2.31.0-py3-none-any.whl"),
            file("requests-2.31.0-cp311-cp311-manylinux_2_17_x86_64.manylinux2014_x86_64.whl"),
        ];
        let chosen = select_wheel(&files, &spec("requests"), &linux311(), VersionPreference::Highest).unwrap();
        assert!(chosen.file.filename.contains("manylinux"));
    }

    #[test]
    fn test_exact_older_beats_universal_newer() {
        let files = [
            file("pkg-2.0-py3-none-any.whl"),
            file("pkg-1.0-cp311-cp311-manylinux2014_x86_64.whl"),
        ];
        let chosen = select_wheel(&files, &spec("pkg"), &linux311(), VersionPreference::Highest).unwrap();
        assert_eq!(chosen.version.as_str(), "1.0");
    }

    #[test]
    fn test_highest_version_wins_by_default() {
        let files = [
            file("pkg-1.0-py3-none-any.whl"),
            file("pkg-1.2-py3-none-any.whl"),
            file("pkg-1.1-py3-none-any.whl"),
        ];
        let chosen = select_wheel(&files, &spec("pkg"), &linux311(), VersionPreference::Highest).unwrap();
        assert_eq!(chosen.version.as_str(), "1.2");

        let first = select_wheel(&files, &spec("pkg"), &linux311(), VersionPreference::FirstListed).unwrap();
        assert_eq!(first.version.as_str(), "1.0");
    }

    #[test]
    fn test_tag_rank_breaks_version_tie() {
        let files = [
            file("pkg-1.0-cp37-abi3-manylinux2014_x86_64.whl"),
            file("pkg-1.0-cp311-cp311-manylinux2014_x86_64.whl"),
        ];
        let chosen = select_wheel(&files, &spec("pkg"), &linux311(), VersionPreference::Highest).unwrap();
        assert!(chosen.file.filename.contains("cp311-cp311"));
    }

    #[test]
    fn test_constraint_yanked_and_incompatible_are_skipped() {
        let mut yanked = file("pkg-3.0-py3-none-any.whl");
        yanked.yanked = Yanked::Reason("broken".into());
        let files = [
            yanked,
            file("pkg-2.5-cp311-cp311-win_amd64.whl"),
            file("pkg-1.5-py3-none-any.whl"),
            file("pkg-2.1-py3-none-any.whl"),
        ];
        let chosen = select_wheel(&files, &spec("pkg<2.2"), &linux311(), VersionPreference::Highest).unwrap();
        assert_eq!(chosen.version.as_str(), "2.1");
    }

    #[test]
    fn test_requires_python_excludes_file() {
        let mut modern = file("pkg-2.0-py3-none-any.whl");
        modern.requires_python = Some(">=3.12".into());
        let files = [modern, file("pkg-1.0-py3-none-any.whl")];
        let chosen = select_wheel(&files, &spec("pkg"), &linux311(), VersionPreference::Highest).unwrap();
        assert_eq!(chosen.version.as_str(), "1.0");
    }

    #[test]
    fn test_no_compatible_wheel() {
        let files = [file("pkg-1.0.tar.gz"), file("pkg-1.0-cp311-cp311-win_amd64.whl")];
        assert!(select_wheel(&files, &spec("pkg"), &linux311(), VersionPreference::Highest).is_none());
    }

    #[test]
    fn test_select_sdist() {
        let files = [
            file("obscure_pkg-0.1.tar.gz"),
            file("obscure-pkg-0.2.zip"),
            file("obscure-pkg-0.2-py3-none-any.whl"),
        ];
        let chosen = select_sdist(&files, &spec("obscure-pkg"), VersionPreference::Highest).unwrap();
        assert_eq!(chosen.file.filename, "obscure-pkg-0.2.zip");

        let first = select_sdist(&files, &spec("obscure-pkg"), VersionPreference::FirstListed).unwrap();
        assert_eq!(first.file.filename, "obscure_pkg-0.1.tar.gz");
    }

    #[test]
    fn test_project_page_deserializes_pep691() {
        let page: ProjectPage = serde_json::from_str(
            r#"{"meta":{"api-version":"1.1"},"name":"pkg","files":[
                {"filename":"pkg-1.0-py3-none-any.whl","url":"../../files/pkg-1.0-py3-none-any.whl",
                 "hashes":{"sha256":"ABC"},"requires-python":">=3.8","yanked":false},
                {"filename":"pkg-0.9.tar.gz","url":"x","hashes":{},"yanked":"bad release"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(page.files.len(), 2);
        assert_eq!(page.files[0].sha256().as_deref(), Some("abc"));
        assert!(page.files[1].is_yanked());
    }
}
