//! pantry CLI entrypoint.
//!
//! This binary fetches installer artifacts into a local cache, optionally
//! unpacks them, and runs them with silent-install arguments.

use clap::Parser;
use log::LevelFilter;
use pantry_common::EnvironmentContext;
use pantry_installer::cli::{Cli, Command, FetchArgs, InstallArgs};
use pantry_installer::error::{InstallerError, Result};
use pantry_installer::extract::{ArchiveExtractor, DefaultExtractor};
use pantry_installer::output::{install_summary, outcome_message, write_stderr_line};
use pantry_installer::pipeline::install;
use pantry_installer::runner;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Install the logger. `RUST_LOG` takes precedence over the CLI flags.
fn init_logging(cli: &Cli) {
    env_logger::Builder::new()
        .filter_level(level_filter(cli.quiet, cli.verbosity))
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn level_filter(quiet: bool, verbosity: u8) -> LevelFilter {
    if quiet {
        return LevelFilter::Warn;
    }
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Command::Fetch(args) => run_fetch(cli, args, stdout),
        Command::Extract { archive, target } => {
            let files = DefaultExtractor.extract(archive.as_std_path(), target.as_std_path())?;
            if !cli.quiet {
                write_stderr_line(stderr, format!("Extracted {} file(s) to {target}", files.len()));
            }
            Ok(())
        }
        Command::Run { argv } => {
            let outcome = runner::run(argv)?;
            if !cli.quiet {
                write_stderr_line(stderr, outcome_message(outcome));
            }
            Ok(())
        }
        Command::Install(args) => run_install(cli, args, stderr),
    }
}

/// Ensures the artifact is cached and prints its path on stdout.
fn run_fetch(cli: &Cli, args: &FetchArgs, stdout: &mut dyn Write) -> Result<()> {
    let config = cli.pipeline_config();
    let url = EnvironmentContext::from_process().expand(&args.url)?;
    let artifact = config
        .cache()
        .ensure(&config.fetcher(), &url, args.ext.as_deref(), args.force)?;
    writeln!(stdout, "{}", artifact.path.display())
        .map_err(|source| InstallerError::WriteFailed { source })
}

fn run_install(cli: &Cli, args: &InstallArgs, stderr: &mut dyn Write) -> Result<()> {
    let report = install(&args.to_request(), &cli.pipeline_config())?;
    if !cli.quiet {
        for line in install_summary(&report) {
            write_stderr_line(stderr, line);
        }
    }
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantry_installer::runner::RunError;
    use rstest::rstest;

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = InstallerError::from(RunError::NonZeroExit {
            program: "setup.exe".to_owned(),
            code: 1603,
        });

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains("setup.exe exited with code 1603"));
    }

    #[rstest]
    #[case::quiet(true, 0, LevelFilter::Warn)]
    #[case::default(false, 0, LevelFilter::Info)]
    #[case::verbose(false, 1, LevelFilter::Debug)]
    #[case::very_verbose(false, 2, LevelFilter::Trace)]
    #[case::saturates(false, 5, LevelFilter::Trace)]
    fn verbosity_maps_to_level(#[case] quiet: bool, #[case] verbosity: u8, #[case] expected: LevelFilter) {
        assert_eq!(level_filter(quiet, verbosity), expected);
    }

    #[test]
    fn fetch_prints_cached_path_for_existing_entry() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cache_dir = dir.path().to_str().expect("utf-8 temp dir");
        let url = "https://unreachable.invalid/tool/setup.exe";
        let cli = Cli::parse_from(["pantry", "--cache-dir", cache_dir, "-q", "fetch", url]);
        let expected = cli
            .pipeline_config()
            .cache()
            .cache_path(url, None)
            .expect("cache path");
        std::fs::write(&expected, b"cached").expect("seed cache entry");

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        run(&cli, &mut stdout, &mut stderr).expect("fetch from cache");

        let printed = String::from_utf8(stdout).expect("utf-8 stdout");
        assert_eq!(printed.trim_end(), expected.display().to_string());
    }

    #[test]
    fn run_with_missing_program_fails() {
        let cli = Cli::parse_from(["pantry", "-q", "run", "pantry-no-such-program"]);
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let err = run(&cli, &mut stdout, &mut stderr).expect_err("missing program");
        assert!(matches!(err, InstallerError::Run(RunError::Start { .. })));
    }
}
