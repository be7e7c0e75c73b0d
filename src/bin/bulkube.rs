//! bulkube - pin container image digests across Kubernetes manifests.
//!
//! ```text
//! bulkube -l k8s-app=web -image repo/web -sha <digest> manifests/
//! bulkube -image repo/web@sha256:<digest> deploy.yaml
//! bulkube -fmt manifests/
//! ```

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use bulkube::{Config, ImageTarget, Selector, UpdateConfig};

/// Long flags that may also be written with a single dash.
const SINGLE_DASH_FLAGS: &[&str] = &["image", "sha", "fmt", "selector", "verbose"];

#[derive(Debug, Parser)]
#[command(
    name = "bulkube",
    version,
    about = "Pin container images to a digest across Kubernetes manifest files"
)]
struct Cli {
    /// Filter objects by label selector.
    #[arg(short = 'l', long = "selector", default_value = "")]
    selector: String,

    /// Image to modify. Only containers using this repository are changed.
    /// If @sha256: is included, the digest is taken from it.
    #[arg(long, default_value = "")]
    image: String,

    /// Digest to pin the image to.
    #[arg(long, default_value = "")]
    sha: String,

    /// Reformat workloads even if their image does not change.
    #[arg(long)]
    fmt: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Manifest files or directories to update.
    paths: Vec<PathBuf>,
}

/// Rewrites `-image`, `-sha=...` and friends to their double-dash form.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let Some(s) = arg.to_str() else {
                return arg;
            };
            let Some(flag) = s.strip_prefix('-').filter(|rest| !rest.starts_with('-')) else {
                return arg;
            };
            let name = flag.split('=').next().unwrap_or_default();
            if SINGLE_DASH_FLAGS.contains(&name) {
                OsString::from(format!("-{}", s))
            } else {
                arg
            }
        })
        .collect()
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_logging(cli.verbose);

    let target = ImageTarget::from_flags(&cli.image, &cli.sha);
    if cli.paths.is_empty() || (target.is_none() && !cli.fmt) {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    }

    if let Err(e) = run(cli, target) {
        eprintln!("Error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli, target: Option<ImageTarget>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config {
        paths: cli.paths,
        selector: Selector::parse(&cli.selector)?,
        update: UpdateConfig {
            target,
            force: cli.fmt,
        },
    };

    let written = bulkube::run(&config)?;
    tracing::info!(files = written.len(), "done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(normalize_args(args.iter().map(OsString::from))).unwrap()
    }

    #[test]
    fn test_go_style_flags() {
        let cli = parse(&["bulkube", "-l", "app=web", "-image", "repo/x", "-sha=abc", "-fmt", "dir"]);
        assert_eq!(cli.selector, "app=web");
        assert_eq!(cli.image, "repo/x");
        assert_eq!(cli.sha, "abc");
        assert!(cli.fmt);
        assert_eq!(cli.paths, vec![PathBuf::from("dir")]);
    }

    #[test]
    fn test_double_dash_flags_still_work() {
        let cli = parse(&["bulkube", "--image", "repo/x", "--sha", "abc", "-vv", "a.yaml", "b.yaml"]);
        assert_eq!(cli.image, "repo/x");
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.paths.len(), 2);
    }

    #[test]
    fn test_positional_dash_paths_untouched() {
        let args = normalize_args(["bulkube", "-", "-x"].iter().map(OsString::from));
        assert_eq!(args, vec![OsString::from("bulkube"), OsString::from("-"), OsString::from("-x")]);
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }
}
