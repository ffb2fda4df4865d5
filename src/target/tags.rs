//! Wheel compatibility tags.
//!
//! A wheel filename carries a `python-abi-platform` tag triple, each part
//! possibly compressed (`py2.py3`). A target accepts a wheel when one of the
//! expanded triples appears in the target's ordered list of compatible tags.
//! The position in that list is the match rank (lower is more specific).

use super::{DownloadTarget, Platform};

/// Highest glibc version a Linux target accepts (manylinux2014).
const MAX_GLIBC: (u32, u32) = (2, 17);

/// Highest macOS deployment target a macOS target accepts.
const MAX_MACOS: (u32, u32) = (10, 9);

const MACOS_ARCHES: [&str; 4] = ["x86_64", "intel", "universal", "universal2"];

/// Expanded tag sets of one wheel filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelTag {
    pub python: Vec<String>,
    pub abi: Vec<String>,
    pub platform: Vec<String>,
}

impl WheelTag {
    /// Builds a tag from the three dotted filename components.
    #[must_use]
    pub fn from_parts(python: &str, abi: &str, platform: &str) -> Self {
        let split = |s: &str| s.split('.').map(str::to_ascii_lowercase).collect();
        Self {
            python: split(python),
            abi: split(abi),
            platform: split(platform),
        }
    }

    /// Returns true when the wheel runs on any platform.
    #[must_use]
    pub fn is_universal(&self) -> bool {
        self.platform.iter().any(|p| p == "any")
    }
}

/// How well a wheel matches a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagMatch {
    /// True when the match names a concrete platform rather than `any`.
    pub exact: bool,
    /// Index into the target's preference list.
    pub rank: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlatformSlot {
    Specific,
    Any,
}

#[derive(Debug)]
struct Candidate {
    python: String,
    abi: String,
    slot: PlatformSlot,
}

impl Candidate {
    fn new(python: String, abi: &str, slot: PlatformSlot) -> Self {
        Self {
            python,
            abi: abi.to_string(),
            slot,
        }
    }
}

/// Returns the best match of `tag` for `target`, or `None` if incompatible.
#[must_use]
pub fn match_wheel_tags(tag: &WheelTag, target: &DownloadTarget) -> Option<TagMatch> {
    compatible_candidates(target)
        .iter()
        .enumerate()
        .find(|(_, candidate)| {
            tag.python.contains(&candidate.python)
                && tag.abi.contains(&candidate.abi)
                && match candidate.slot {
                    PlatformSlot::Any => tag.platform.iter().any(|p| p == "any"),
                    PlatformSlot::Specific => tag
                        .platform
                        .iter()
                        .any(|p| target.platform.accepts_platform_tag(p)),
                }
        })
        .map(|(rank, candidate)| TagMatch {
            exact: candidate.slot == PlatformSlot::Specific,
            rank,
        })
}

/// Ordered compatible (python, abi, platform) tags for a CPython 3.N target.
fn compatible_candidates(target: &DownloadTarget) -> Vec<Candidate> {
    use PlatformSlot::{Any, Specific};

    let minor = target.python.minor();
    let cp = |m: u8| format!("cp3{m}");
    let py = |m: u8| format!("py3{m}");
    let mut out = Vec::new();

    out.push(Candidate::new(cp(minor), &cp(minor), Specific));
    if minor >= 2 {
        out.push(Candidate::new(cp(minor), "abi3", Specific));
    }
    out.push(Candidate::new(cp(minor), "none", Specific));
    for older in (2..minor).rev() {
        out.push(Candidate::new(cp(older), "abi3", Specific));
    }
    out.push(Candidate::new(py(minor), "none", Specific));
    out.push(Candidate::new("py3".to_string(), "none", Specific));
    for older in (0..minor).rev() {
        out.push(Candidate::new(py(older), "none", Specific));
    }

    out.push(Candidate::new(cp(minor), "none", Any));
    out.push(Candidate::new(py(minor), "none", Any));
    out.push(Candidate::new("py3".to_string(), "none", Any));
    for older in (0..minor).rev() {
        out.push(Candidate::new(py(older), "none", Any));
    }
    out
}

pub(super) fn platform_accepts(platform: Platform, tag: &str) -> bool {
    let tag = tag.to_ascii_lowercase();
    match platform {
        Platform::Windows => tag == "win_amd64",
        Platform::Linux => linux_glibc(&tag).is_some_and(|glibc| glibc <= MAX_GLIBC),
        Platform::MacOs => macos_version(&tag).is_some_and(|version| version <= MAX_MACOS),
    }
}

/// Returns the glibc version a manylinux x86_64 tag requires.
fn linux_glibc(tag: &str) -> Option<(u32, u32)> {
    let stem = tag.strip_suffix("_x86_64")?;
    match stem {
        "manylinux1" => Some((2, 5)),
        "manylinux2010" => Some((2, 12)),
        "manylinux2014" => Some((2, 17)),
        _ => {
            let (major, minor) = stem.strip_prefix("manylinux_")?.split_once('_')?;
            Some((major.parse().ok()?, minor.parse().ok()?))
        }
    }
}

/// Returns the deployment target of a macOS tag with a compatible architecture.
fn macos_version(tag: &str) -> Option<(u32, u32)> {
    let mut parts = tag.strip_prefix("macosx_")?.splitn(3, '_');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let arch = parts.next()?;
    MACOS_ARCHES.contains(&arch).then_some((major, minor))
}
