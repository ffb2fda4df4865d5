//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use wheelfetch_core::config::{Settings, Strategy, VersionPreference};

/// Download Python wheels and source distributions for other platforms.
///
/// wheelfetch reads a package list and fetches one artifact per package for
/// every operating system x Python version combination selected, without
/// needing those environments locally.
#[derive(Parser, Debug)]
#[command(name = "wheelfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Package list file: one requirement per line, `#` starts a comment
    #[arg(short = 'p', long, value_name = "FILE")]
    pub package_list: Option<PathBuf>,

    /// Directory downloaded files are written to
    #[arg(short = 'd', long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Target operating systems (windows, linux, macos)
    #[arg(long = "os", value_name = "OS", num_args = 1.., value_delimiter = ',')]
    pub os: Vec<String>,

    /// Target Python versions (3.N)
    #[arg(long = "python", value_name = "VER", num_args = 1.., value_delimiter = ',')]
    pub python: Vec<String>,

    /// How artifacts are resolved: pip (run the package manager) or index (query the index)
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<Strategy>,

    /// Package manager executable (defaults to pip or pip3 on PATH)
    #[arg(long = "pip", value_name = "PATH")]
    pub pip: Option<PathBuf>,

    /// Fall back to the source distribution when no wheel matches
    #[arg(long)]
    pub include_source: bool,

    /// Simple index base URL used by the index strategy
    #[arg(long, value_name = "URL")]
    pub index_url: Option<String>,

    /// Proxy host name
    #[arg(long, value_name = "HOST")]
    pub proxy_host: Option<String>,

    /// Proxy port
    #[arg(long, value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub proxy_port: Option<u16>,

    /// Proxy user name
    #[arg(long, value_name = "USER")]
    pub proxy_user: Option<String>,

    /// Proxy password (saved only in encrypted form)
    #[arg(long, value_name = "PASSWORD")]
    pub proxy_password: Option<String>,

    /// Ignore any proxy configured in the settings file
    #[arg(long, conflicts_with = "proxy_host")]
    pub no_proxy: bool,

    /// Maximum concurrent downloads (1-16)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub concurrency: Option<u8>,

    /// Version choice when several satisfy the constraint: highest or first-listed
    #[arg(long, value_name = "PREFERENCE")]
    pub prefer: Option<VersionPreference>,

    /// Attempts per artifact download, including the first (1-5)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=5))]
    pub max_fetch_attempts: Option<u32>,

    /// HTTP connect timeout in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// HTTP read timeout in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,

    /// Package manager timeout per invocation in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub subprocess_timeout: Option<u64>,

    /// Settings file (defaults to the user config directory)
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Write the merged settings back to the settings file
    #[arg(long)]
    pub save_settings: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Settings holding only the values given on the command line.
    #[must_use]
    pub fn to_settings(&self) -> Settings {
        let non_empty = |values: &Vec<String>| (!values.is_empty()).then(|| values.clone());
        let proxy_given = self.proxy_host.is_some();

        Settings {
            strategy: self.strategy,
            os_list: non_empty(&self.os),
            python_versions: non_empty(&self.python),
            package_list_file: self.package_list.clone(),
            dest_folder: self.dest.clone(),
            pip_path: self.pip.clone(),
            include_source: self.include_source.then_some(true),
            use_proxy: if self.no_proxy {
                Some(false)
            } else {
                proxy_given.then_some(true)
            },
            proxy_server: self.proxy_host.clone(),
            proxy_port: self.proxy_port,
            proxy_user: self.proxy_user.clone(),
            proxy_password: self.proxy_password.clone(),
            proxy_password_encrypted: None,
            index_url: self.index_url.clone(),
            concurrency: self.concurrency.map(usize::from),
            prefer: self.prefer,
            connect_timeout_secs: self.connect_timeout,
            read_timeout_secs: self.read_timeout,
            subprocess_timeout_secs: self.subprocess_timeout,
            max_fetch_attempts: self.max_fetch_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["wheelfetch"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_no_args_parses_to_empty_settings() {
        let args = parse(&[]);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.to_settings(), Settings::default());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        assert_eq!(parse(&["-v"]).verbose, 1);
        assert_eq!(parse(&["-vv"]).verbose, 2);
        assert_eq!(parse(&["--verbose", "--verbose"]).verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        assert!(parse(&["-q"]).quiet);
        assert!(parse(&["--quiet"]).quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["wheelfetch", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["wheelfetch", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["wheelfetch", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_os_and_python_accept_lists() {
        let args = parse(&["--os", "linux", "windows", "--python", "3.10,3.11"]);
        assert_eq!(args.os, ["linux", "windows"]);
        assert_eq!(args.python, ["3.10", "3.11"]);

        let settings = args.to_settings();
        assert_eq!(settings.os_list.unwrap(), ["linux", "windows"]);
        assert_eq!(settings.python_versions.unwrap(), ["3.10", "3.11"]);
    }

    #[test]
    fn test_cli_strategy_and_preference_parse() {
        let args = parse(&["--strategy", "index", "--prefer", "first-listed"]);
        assert_eq!(args.strategy, Some(Strategy::IndexClient));
        assert_eq!(args.prefer, Some(VersionPreference::FirstListed));

        assert!(Args::try_parse_from(["wheelfetch", "--strategy", "conda"]).is_err());
    }

    #[test]
    fn test_cli_concurrency_range() {
        assert_eq!(parse(&["-c", "16"]).concurrency, Some(16));

        for bad in ["0", "17"] {
            let err = Args::try_parse_from(["wheelfetch", "-c", bad]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn test_cli_proxy_port_zero_rejected() {
        let err = Args::try_parse_from(["wheelfetch", "--proxy-port", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_proxy_host_enables_proxy() {
        let settings = parse(&["--proxy-host", "proxy.corp", "--proxy-port", "3128"]).to_settings();
        assert_eq!(settings.use_proxy, Some(true));
        assert_eq!(settings.proxy_server.as_deref(), Some("proxy.corp"));
        assert_eq!(settings.proxy_port, Some(3128));
    }

    #[test]
    fn test_cli_no_proxy_disables_saved_proxy() {
        let saved = Settings {
            proxy_server: Some("proxy.corp".to_string()),
            proxy_port: Some(3128),
            ..Settings::default()
        };
        let merged = saved.overlay(parse(&["--no-proxy"]).to_settings());
        assert_eq!(merged.proxy().unwrap(), None);
    }

    #[test]
    fn test_cli_include_source_absent_keeps_saved_value() {
        let saved = Settings {
            include_source: Some(true),
            ..Settings::default()
        };
        let merged = saved.overlay(parse(&[]).to_settings());
        assert_eq!(merged.include_source, Some(true));
    }
}
