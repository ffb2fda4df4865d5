//! Release versions and version specifiers.
//!
//! Implements the subset of PEP 440 needed to filter index files by a
//! requirement constraint and to order releases: epochs, release segments,
//! pre/post/dev markers, `==X.*` wildcards and `~=` compatible releases.
//! Local version labels are kept for display and ignored when ordering.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^
        v?
        (?:(?P<epoch>\d+)!)?
        (?P<release>\d+(?:\.\d+)*)
        (?:[-_.]?(?P<pre_l>a|alpha|b|beta|rc|c|pre|preview)[-_.]?(?P<pre_n>\d+)?)?
        (?:-(?P<post_n1>\d+)|[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>\d+)?)?
        (?:[-_.]?(?P<dev_l>dev)[-_.]?(?P<dev_n>\d+)?)?
        (?:\+[a-z0-9]+(?:[-_.][a-z0-9]+)*)?  # local label, ignored
        $",
    )
    .expect("version regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static SPECIFIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<op>~=|===|==|!=|<=|>=|<|>)\s*(?P<version>[^\s,;]+)$")
        .expect("specifier regex is valid") // Static pattern, safe to panic
});

/// Pre-release phase, ordered alpha < beta < release candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreRelease {
    Alpha,
    Beta,
    Candidate,
}

/// A parsed release version.
#[derive(Debug, Clone)]
pub struct Version {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreRelease, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    raw: String,
}

/// Error returned when a version or specifier string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version '{0}'")]
pub struct InvalidVersion(pub String);

impl Version {
    /// Release segments (`[2, 31, 0]` for `2.31.0`).
    #[must_use]
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    /// True for alpha/beta/rc and dev releases.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    /// The string this version was parsed from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn trimmed_release(&self) -> &[u64] {
        let end = self
            .release
            .iter()
            .rposition(|&segment| segment != 0)
            .map_or(0, |index| index + 1);
        &self.release[..end]
    }

    fn suffix_key(&self) -> ((i8, u64), (i8, u64), (i8, u64)) {
        let pre = match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => (-1, 0),
            (None, _, _) => (3, 0),
            (Some((phase, n)), _, _) => (phase as i8, n),
        };
        let post = self.post.map_or((-1, 0), |n| (0, n));
        let dev = self.dev.map_or((1, 0), |n| (0, n));
        (pre, post, dev)
    }
}

impl FromStr for Version {
    type Err = InvalidVersion;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        let caps = VERSION_PATTERN
            .captures(&lowered)
            .ok_or_else(|| InvalidVersion(value.to_string()))?;

        let number = |name: &str| -> Result<Option<u64>, InvalidVersion> {
            caps.name(name)
                .map(|m| m.as_str().parse::<u64>())
                .transpose()
                .map_err(|_| InvalidVersion(value.to_string()))
        };

        let release = caps
            .name("release")
            .map(|m| m.as_str())
            .unwrap_or_default()
            .split('.')
            .map(str::parse::<u64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| InvalidVersion(value.to_string()))?;

        let pre = match caps.name("pre_l").map(|m| m.as_str()) {
            None => None,
            Some(label) => {
                let phase = match label {
                    "a" | "alpha" => PreRelease::Alpha,
                    "b" | "beta" => PreRelease::Beta,
                    _ => PreRelease::Candidate,
                };
                Some((phase, number("pre_n")?.unwrap_or(0)))
            }
        };

        let post = match (number("post_n1")?, caps.name("post_l")) {
            (Some(n), _) => Some(n),
            (None, Some(_)) => Some(number("post_n2")?.unwrap_or(0)),
            (None, None) => None,
        };

        let dev = match caps.name("dev_l") {
            Some(_) => Some(number("dev_n")?.unwrap_or(0)),
            None => None,
        };

        Ok(Self {
            epoch: number("epoch")?.unwrap_or(0),
            release,
            pre,
            post,
            dev,
            raw: value.trim().to_string(),
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.trimmed_release().cmp(other.trimmed_release()))
            .then_with(|| self.suffix_key().cmp(&other.suffix_key()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Comparison operator of a single specifier clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Less,
    Greater,
    Compatible,
    Arbitrary,
}

/// One clause of a constraint, e.g. `>=1.2`.
#[derive(Debug, Clone)]
pub struct Specifier {
    operator: Operator,
    version: Version,
    wildcard: bool,
    raw: String,
}

impl Specifier {
    /// Returns true when `candidate` satisfies this clause.
    #[must_use]
    pub fn contains(&self, candidate: &Version) -> bool {
        match self.operator {
            Operator::Equal if self.wildcard => self.prefix_matches(candidate),
            Operator::NotEqual if self.wildcard => !self.prefix_matches(candidate),
            Operator::Equal => candidate == &self.version,
            Operator::NotEqual => candidate != &self.version,
            Operator::LessEqual => candidate <= &self.version,
            Operator::GreaterEqual => candidate >= &self.version,
            Operator::Less => candidate < &self.version,
            Operator::Greater => candidate > &self.version,
            Operator::Compatible => {
                let prefix_len = self.version.release.len().saturating_sub(1).max(1);
                candidate >= &self.version
                    && candidate.epoch == self.version.epoch
                    && padded(&candidate.release, prefix_len) == self.version.release[..prefix_len]
            }
            Operator::Arbitrary => candidate.raw.eq_ignore_ascii_case(&self.version.raw),
        }
    }

    /// True when the clause itself names a pre-release.
    #[must_use]
    pub fn mentions_prerelease(&self) -> bool {
        self.version.is_prerelease()
    }

    fn prefix_matches(&self, candidate: &Version) -> bool {
        let prefix = &self.version.release;
        candidate.epoch == self.version.epoch
            && padded(&candidate.release, prefix.len()) == prefix.as_slice()
    }
}

fn padded(release: &[u64], len: usize) -> Vec<u64> {
    let mut out: Vec<u64> = release.iter().copied().take(len).collect();
    out.resize(len, 0);
    out
}

impl FromStr for Specifier {
    type Err = InvalidVersion;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let caps = SPECIFIER_PATTERN
            .captures(trimmed)
            .ok_or_else(|| InvalidVersion(trimmed.to_string()))?;
        let op = caps.name("op").map_or("", |m| m.as_str());
        let version_text = caps.name("version").map_or("", |m| m.as_str());

        let operator = match op {
            "==" => Operator::Equal,
            "!=" => Operator::NotEqual,
            "<=" => Operator::LessEqual,
            ">=" => Operator::GreaterEqual,
            "<" => Operator::Less,
            ">" => Operator::Greater,
            "~=" => Operator::Compatible,
            _ => Operator::Arbitrary,
        };

        let (version_text, wildcard) = match version_text.strip_suffix(".*") {
            Some(stem) if matches!(operator, Operator::Equal | Operator::NotEqual) => (stem, true),
            Some(_) => return Err(InvalidVersion(trimmed.to_string())),
            None => (version_text, false),
        };

        let version = if operator == Operator::Arbitrary {
            Version::from_str(version_text).unwrap_or_else(|_| Version {
                epoch: 0,
                release: Vec::new(),
                pre: None,
                post: None,
                dev: None,
                raw: version_text.to_string(),
            })
        } else {
            version_text.parse()?
        };
        if operator == Operator::Compatible && version.release.len() < 2 {
            return Err(InvalidVersion(trimmed.to_string()));
        }

        Ok(Self {
            operator,
            version,
            wildcard,
            raw: trimmed.to_string(),
        })
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A comma-separated set of specifiers; empty means "any version".
#[derive(Debug, Clone, Default)]
pub struct VersionConstraint {
    specifiers: Vec<Specifier>,
}

impl VersionConstraint {
    /// Parses `>=1.0,<2` style text. Empty text yields an unconstrained set.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidVersion`] naming the first clause that fails to parse.
    pub fn parse(text: &str) -> Result<Self, InvalidVersion> {
        let specifiers = text
            .split(',')
            .map(str::trim)
            .filter(|clause| !clause.is_empty())
            .map(Specifier::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { specifiers })
    }

    /// True when no clause restricts the version.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specifiers.is_empty()
    }

    /// Returns true when `version` satisfies every clause.
    ///
    /// Pre-releases are only allowed when a clause names one.
    #[must_use]
    pub fn allows(&self, version: &Version) -> bool {
        if version.is_prerelease() && !self.specifiers.iter().any(Specifier::mentions_prerelease) {
            return false;
        }
        self.specifiers.iter().all(|spec| spec.contains(version))
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .specifiers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}
