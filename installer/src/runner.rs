//! Running installer processes and interpreting their exit codes.

use log::info;
use std::io;
use std::process::Command;

/// Exit code Windows installers use to report success pending a reboot.
pub const REBOOT_REQUIRED_EXIT_CODE: i32 = 3010;

/// What an exit code means for the install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClassification {
    /// Exit code zero.
    Success,
    /// Exit code [`REBOOT_REQUIRED_EXIT_CODE`]; counts as success.
    RebootRequired,
    /// Any other code.
    Failure(i32),
}

/// Classify a process exit code.
///
/// # Examples
///
/// ```
/// use pantry_installer::runner::{classify, ExitClassification};
///
/// assert_eq!(classify(0), ExitClassification::Success);
/// assert_eq!(classify(3010), ExitClassification::RebootRequired);
/// assert_eq!(classify(1603), ExitClassification::Failure(1603));
/// ```
#[must_use]
pub fn classify(code: i32) -> ExitClassification {
    match code {
        0 => ExitClassification::Success,
        REBOOT_REQUIRED_EXIT_CODE => ExitClassification::RebootRequired,
        other => ExitClassification::Failure(other),
    }
}

/// Successful result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The argument vector was empty; nothing was started.
    NothingToRun,
    /// The process exited with code zero.
    Success,
    /// The process exited with [`REBOOT_REQUIRED_EXIT_CODE`].
    RebootRequired,
}

/// Errors arising from running a process.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The program could not be started.
    #[error("failed to start {program}: {source}")]
    Start {
        /// The program that failed to start.
        program: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The program exited with a failing code.
    #[error("{program} exited with code {code}")]
    NonZeroExit {
        /// The program that failed.
        program: String,
        /// Its exit code.
        code: i32,
    },

    /// The program ended without an exit code, for example by a signal.
    #[error("{program} was terminated before reporting an exit code")]
    Terminated {
        /// The program that was terminated.
        program: String,
    },
}

/// Trait for starting processes, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Run `program` with `args`, inheriting stdio, and wait for it.
    ///
    /// Returns the exit code, or `None` when the process ended without one.
    ///
    /// # Errors
    ///
    /// Returns an error when the process cannot be started.
    fn execute(&self, program: &str, args: &[String]) -> io::Result<Option<i32>>;
}

/// Executor that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, program: &str, args: &[String]) -> io::Result<Option<i32>> {
        Command::new(program)
            .args(args)
            .status()
            .map(|status| status.code())
    }
}

/// Runs argument vectors through a [`CommandExecutor`].
pub struct ProcessRunner<'a> {
    executor: &'a dyn CommandExecutor,
}

impl<'a> ProcessRunner<'a> {
    /// Create a runner over `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self { executor }
    }

    /// Run `argv`, whose first element is the program.
    ///
    /// The program is started directly, without a shell. An empty vector
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Start`] if the program cannot be started,
    /// [`RunError::Terminated`] if it reports no exit code, and
    /// [`RunError::NonZeroExit`] for any code other than 0 or 3010.
    pub fn run(&self, argv: &[String]) -> Result<RunOutcome, RunError> {
        let Some((program, args)) = argv.split_first() else {
            return Ok(RunOutcome::NothingToRun);
        };

        info!("Running {}", argv.join(" "));
        let code = self
            .executor
            .execute(program, args)
            .map_err(|source| RunError::Start {
                program: program.clone(),
                source,
            })?
            .ok_or_else(|| RunError::Terminated {
                program: program.clone(),
            })?;

        match classify(code) {
            ExitClassification::Success => Ok(RunOutcome::Success),
            ExitClassification::RebootRequired => {
                info!("Exit code {code}, needs reboot to complete install");
                Ok(RunOutcome::RebootRequired)
            }
            ExitClassification::Failure(code) => Err(RunError::NonZeroExit {
                program: program.clone(),
                code,
            }),
        }
    }
}

/// Run `argv` with the system executor.
///
/// # Errors
///
/// See [`ProcessRunner::run`].
pub fn run(argv: &[String]) -> Result<RunOutcome, RunError> {
    ProcessRunner::new(&SystemCommandExecutor).run(argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn empty_argv_runs_nothing() {
        let executor = MockCommandExecutor::new();
        let outcome = ProcessRunner::new(&executor).run(&[]).expect("empty argv");
        assert_eq!(outcome, RunOutcome::NothingToRun);
    }

    #[rstest]
    #[case::success(0, RunOutcome::Success)]
    #[case::reboot(3010, RunOutcome::RebootRequired)]
    fn successful_codes_map_to_outcomes(#[case] code: i32, #[case] expected: RunOutcome) {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute()
            .withf(|program, _| program == "setup.exe")
            .times(1)
            .returning(move |_, _| Ok(Some(code)));
        let outcome = ProcessRunner::new(&executor)
            .run(&argv(&["setup.exe", "/S"]))
            .expect("successful run");
        assert_eq!(outcome, expected);
    }

    #[test]
    fn program_and_args_are_passed_separately() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute()
            .withf(|program, args| {
                program == "msiexec.exe" && args == ["/q", "/i", "C:/cache/ABC.msi"]
            })
            .times(1)
            .returning(|_, _| Ok(Some(0)));
        ProcessRunner::new(&executor)
            .run(&argv(&["msiexec.exe", "/q", "/i", "C:/cache/ABC.msi"]))
            .expect("run");
    }

    #[rstest]
    #[case(1)]
    #[case(1603)]
    #[case(-1)]
    fn failing_codes_are_errors(#[case] code: i32) {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute()
            .returning(move |_, _| Ok(Some(code)));
        let err = ProcessRunner::new(&executor)
            .run(&argv(&["setup.exe"]))
            .expect_err("failing code");
        assert!(
            matches!(err, RunError::NonZeroExit { ref program, code: c } if program == "setup.exe" && c == code)
        );
    }

    #[test]
    fn missing_exit_code_is_terminated() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute().returning(|_, _| Ok(None));
        let err = ProcessRunner::new(&executor)
            .run(&argv(&["setup.exe"]))
            .expect_err("terminated");
        assert!(matches!(err, RunError::Terminated { .. }));
    }

    #[test]
    fn spawn_failure_is_start_error() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute().returning(|_, _| {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        });
        let err = ProcessRunner::new(&executor)
            .run(&argv(&["missing.exe"]))
            .expect_err("start failure");
        assert!(matches!(err, RunError::Start { ref program, .. } if program == "missing.exe"));
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_reports_exit_codes() {
        let executor = SystemCommandExecutor;
        let code = executor
            .execute("sh", &argv(&["-c", "exit 7"]))
            .expect("spawn sh");
        assert_eq!(code, Some(7));
    }

    #[test]
    fn system_executor_fails_to_start_missing_program() {
        let err = run(&argv(&["pantry-definitely-not-a-program"])).expect_err("missing");
        assert!(matches!(err, RunError::Start { .. }));
    }
}
