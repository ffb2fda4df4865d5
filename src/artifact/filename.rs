//! Wheel and source-distribution filename parsing.
//!
//! Wheel: `{name}-{version}(-{build})?-{python}-{abi}-{platform}.whl`
//! Source: `{name}-{version}.tar.gz` or `{name}-{version}.zip`

use crate::package::{Version, normalize_name};
use crate::target::WheelTag;

/// Extensions recognized as source distributions.
pub const SDIST_EXTENSIONS: [&str; 2] = [".tar.gz", ".zip"];

/// Parsed wheel filename.
#[derive(Debug, Clone)]
pub struct WheelFilename {
    /// Normalized project name.
    pub name: String,
    pub version: Version,
    pub build: Option<String>,
    pub tag: WheelTag,
}

/// Parsed source-distribution filename.
#[derive(Debug, Clone)]
pub struct SdistFilename {
    /// Normalized project name.
    pub name: String,
    pub version: Version,
}

/// Parses a wheel filename; `None` when it does not follow the convention.
#[must_use]
pub fn parse_wheel_filename(filename: &str) -> Option<WheelFilename> {
    let stem = strip_suffix_ignore_case(filename, ".whl")?;
    let parts: Vec<&str> = stem.split('-').collect();
    let (name, version, build, python, abi, platform) = match parts.as_slice() {
        [name, version, python, abi, platform] => (*name, *version, None, *python, *abi, *platform),
        [name, version, build, python, abi, platform] => {
            if !build.starts_with(|c: char| c.is_ascii_digit()) {
                return None;
            }
            (*name, *version, Some((*build).to_string()), *python, *abi, *platform)
        }
        _ => return None,
    };
    if name.is_empty() {
        return None;
    }

    Some(WheelFilename {
        name: normalize_name(name),
        version: version.parse().ok()?,
        build,
        tag: WheelTag::from_parts(python, abi, platform),
    })
}

/// Parses a source-distribution filename; `None` when it is not one.
///
/// The name/version boundary is the first `-` whose remainder parses as a
/// version, so hyphenated project names survive.
#[must_use]
pub fn parse_sdist_filename(filename: &str) -> Option<SdistFilename> {
    let stem = SDIST_EXTENSIONS
        .iter()
        .find_map(|ext| strip_suffix_ignore_case(filename, ext))?;

    stem.match_indices('-').find_map(|(index, _)| {
        let (name, rest) = (&stem[..index], &stem[index + 1..]);
        if name.is_empty() {
            return None;
        }
        let version: Version = rest.parse().ok()?;
        Some(SdistFilename {
            name: normalize_name(name),
            version,
        })
    })
}

/// Returns true when `filename` is a single plain path segment.
#[must_use]
pub fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.starts_with('.')
        && !filename
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
}

fn strip_suffix_ignore_case<'a>(value: &'a str, suffix: &str) -> Option<&'a str> {
    let split = value.len().checked_sub(suffix.len())?;
    if !value.is_char_boundary(split) {
        return None;
    }
    let (stem, tail) = value.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(stem)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_platform_wheel() {
        let wheel =
            parse_wheel_filename("charset_normalizer-3.3.2-cp311-cp311-manylinux_2_17_x86_64.manylinux2014_x86_64.whl")
                .unwrap();
        assert_eq!(wheel.name, "charset-normalizer");
        assert_eq!(wheel.version.as_str(), "3.3.2");
        assert!(wheel.build.is_none());
        assert_eq!(wheel.tag.python, ["cp311"]);
        assert_eq!(wheel.tag.platform.len(), 2);
    }

    #[test]
    fn test_parse_wheel_with_build_tag() {
        let wheel = parse_wheel_filename("pkg-1.0-1-py3-none-any.whl").unwrap();
        assert_eq!(wheel.build.as_deref(), Some("1"));
        assert!(wheel.tag.is_universal());
    }

    #[test]
    fn test_parse_wheel_rejects_malformed() {
        assert!(parse_wheel_filename("pkg-1.0.whl").is_none());
        assert!(parse_wheel_filename("pkg-1.0-py3-none-any.tar.gz").is_none());
        assert!(parse_wheel_filename("pkg-notaversion-py3-none-any.whl").is_none());
        assert!(parse_wheel_filename("pkg-1.0-x-py3-none-any.whl").is_none());
    }

    #[test]
    fn test_parse_sdist_with_hyphenated_name() {
        let sdist = parse_sdist_filename("obscure-pkg-0.4.1.tar.gz").unwrap();
        assert_eq!(sdist.name, "obscure-pkg");
        assert_eq!(sdist.version.as_str(), "0.4.1");

        let zipped = parse_sdist_filename("Legacy_Tool-2.0.zip").unwrap();
        assert_eq!(zipped.name, "legacy-tool");
    }

    #[test]
    fn test_parse_sdist_rejects_other_extensions() {
        assert!(parse_sdist_filename("pkg-1.0.tar.bz2").is_none());
        assert!(parse_sdist_filename("pkg.tar.gz").is_none());
        assert!(parse_sdist_filename("pkg-1.0-py3-none-any.whl").is_none());
    }

    #[test]
    fn test_safe_filename() {
        assert!(is_safe_filename("requests-2.31.0-py3-none-any.whl"));
        assert!(!is_safe_filename("../evil.whl"));
        assert!(!is_safe_filename("dir\\evil.whl"));
        assert!(!is_safe_filename(".wheelfetch-abc.part"));
        assert!(!is_safe_filename(""));
    }
}
