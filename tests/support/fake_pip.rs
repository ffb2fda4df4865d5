#![allow(dead_code)]

//! Shell scripts standing in for `pip` in integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Writes an executable script at `dir/pip` and returns its path.
///
/// `body` runs after the script has parsed `--dest=` into `$dest` and
/// appended one line to `dir/calls.log`.
pub fn write_fake_pip(dir: &Path, body: &str) -> PathBuf {
    let script = dir.join("pip");
    let log = dir.join("calls.log");
    let content = format!(
        "#!/bin/sh\n\
         dest=\n\
         for arg in \"$@\"; do\n\
         case \"$arg\" in\n\
         --dest=*) dest=\"${{arg#--dest=}}\" ;;\n\
         esac\n\
         done\n\
         echo \"$*\" >> '{}'\n\
         {body}\n",
        log.display()
    );
    std::fs::write(&script, content).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

/// Lines logged by the script at `dir/pip`, one per invocation.
pub fn calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("calls.log"))
        .map(|log| log.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Script body that stages `filename` for any wheel request and reports no
/// match for source requests.
pub fn stage_wheel(filename: &str) -> String {
    format!(
        "case \"$*\" in\n\
         *--no-binary*) echo 'ERROR: No matching distribution found' >&2; exit 1 ;;\n\
         esac\n\
         : > \"$dest/{filename}\""
    )
}

/// Script body reporting no matching distribution.
pub const NO_MATCH: &str =
    "echo 'ERROR: Could not find a version that satisfies the requirement' >&2\nexit 1";

/// Script body failing with an unrelated error.
pub const BROKEN: &str = "echo 'ERROR: pip is broken' >&2\nexit 2";
