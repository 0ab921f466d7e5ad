use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use super::{ERROR_PREFIX, TaskExecution};
use crate::enforcement::capability::SafeCommand;

/// Host family, used only to pick the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Windows,
    Unix,
}

impl HostPlatform {
    pub fn current() -> Self {
        Self::from_family(std::env::consts::FAMILY)
    }

    pub fn from_family(family: &str) -> Self {
        if family.eq_ignore_ascii_case("windows") {
            Self::Windows
        } else {
            Self::Unix
        }
    }

    pub fn shell(self) -> Shell {
        match self {
            Self::Windows => Shell::new("cmd.exe", "/c"),
            Self::Unix => Shell::new("sh", "-c"),
        }
    }
}

/// Shell program and the flag that makes it run a single command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    program: String,
    flag: String,
}

impl Shell {
    pub fn new(program: &str, flag: &str) -> Self {
        Self {
            program: program.to_owned(),
            flag: flag.to_owned(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn flag(&self) -> &str {
        &self.flag
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(&self.flag).arg(command);
        // Own process group, so a timeout can take down everything the shell forked.
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

/// How a run ended. Both variants become a normal `TaskExecution`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed {
        output: String,
        exit_code: Option<i32>,
    },
    Failed {
        message: String,
    },
}

impl RunOutcome {
    /// Stored form: the captured output, or `ERROR: <message>`.
    pub fn into_output(self) -> String {
        match self {
            Self::Completed { output, .. } => output,
            Self::Failed { message } => format!("{ERROR_PREFIX}{message}"),
        }
    }
}

/// Runs approved commands through the host shell and records the result.
///
/// There is no deadline unless one is set with [`CommandExecutor::with_timeout`];
/// without it a command that never exits blocks the caller indefinitely.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    shell: Shell,
    timeout: Option<Duration>,
}

impl CommandExecutor {
    pub fn new(platform: HostPlatform) -> Self {
        Self::with_shell(platform.shell())
    }

    pub fn with_shell(shell: Shell) -> Self {
        Self {
            shell,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    /// Run the command and return its execution record. Never fails: spawn,
    /// read and wait errors are folded into the record's output.
    pub async fn run(&self, command: SafeCommand) -> TaskExecution {
        let start = Utc::now();
        let outcome = self.capture(command.as_str()).await;
        let end = Utc::now();

        match &outcome {
            RunOutcome::Completed { exit_code, .. } => {
                tracing::info!(exit_code = ?exit_code, "command completed");
            }
            RunOutcome::Failed { message } => {
                tracing::error!(error = %message, "command failed");
            }
        }

        TaskExecution::new(start, end, outcome.into_output())
    }

    async fn capture(&self, command: &str) -> RunOutcome {
        match self.spawn_and_wait(command).await {
            Ok((output, status)) => RunOutcome::Completed {
                output,
                exit_code: status.code(),
            },
            Err(e) => RunOutcome::Failed {
                message: e.to_string(),
            },
        }
    }

    async fn spawn_and_wait(&self, command: &str) -> io::Result<(String, ExitStatus)> {
        let mut child = self
            .shell
            .command(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let Some(limit) = self.timeout else {
            return drain_and_wait(&mut child).await;
        };

        let waited = tokio::time::timeout(limit, drain_and_wait(&mut child)).await;
        match waited {
            Ok(result) => result,
            Err(_) => {
                kill_process_tree(&mut child).await?;
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("command timed out after {limit:?}"),
                ))
            }
        }
    }
}

/// SIGKILL the shell's whole process group, then reap the shell.
#[cfg(unix)]
async fn kill_process_tree(child: &mut Child) -> io::Result<()> {
    if let Some(pid) = child.id() {
        let pgid = -(pid as libc::pid_t);
        // SAFETY: kill(2) only sends a signal; the group was created at spawn.
        let result = unsafe { libc::kill(pgid, libc::SIGKILL) };
        if result != 0 {
            let os_error = io::Error::last_os_error();
            if os_error.raw_os_error() != Some(libc::ESRCH) {
                return Err(os_error);
            }
        }
    }
    child.wait().await.map(|_| ())
}

#[cfg(not(unix))]
async fn kill_process_tree(child: &mut Child) -> io::Result<()> {
    child.kill().await
}

async fn drain_and_wait(child: &mut Child) -> io::Result<(String, ExitStatus)> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("stdout was not captured"))?;
    // The reader is owned by read_lines and dropped on return, success or not,
    // before the exit status is awaited.
    let output = read_lines(stdout).await?;
    let status = child.wait().await?;
    Ok((output, status))
}

/// Read stdout to EOF, join lines with `\n`, trim. A line ends at `\n`,
/// `\r\n` or a lone `\r`. Invalid UTF-8 is replaced rather than treated as a
/// read failure.
async fn read_lines<R: AsyncRead + Unpin>(stdout: R) -> io::Result<String> {
    let mut reader = BufReader::new(stdout);
    let mut lines = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        lines.extend(
            buf.split(|&b| b == b'\r')
                .map(|line| String::from_utf8_lossy(line).into_owned()),
        );
    }

    Ok(lines.join("\n").trim().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enforcement::policy::CommandPolicy;
    use crate::enforcement::{Decision, evaluate};

    fn approve(command: &str) -> SafeCommand {
        let policy = CommandPolicy::echo_only().unwrap();
        match evaluate(Some(command), &policy) {
            Decision::Allow(command) => command,
            Decision::Reject => panic!("expected {command:?} to be approved"),
        }
    }

    #[test]
    fn windows_uses_cmd() {
        let shell = HostPlatform::Windows.shell();
        assert_eq!(shell.program(), "cmd.exe");
        assert_eq!(shell.flag(), "/c");
    }

    #[test]
    fn unix_uses_sh() {
        let shell = HostPlatform::Unix.shell();
        assert_eq!(shell.program(), "sh");
        assert_eq!(shell.flag(), "-c");
    }

    #[test]
    fn platform_from_family() {
        assert_eq!(HostPlatform::from_family("windows"), HostPlatform::Windows);
        assert_eq!(HostPlatform::from_family("unix"), HostPlatform::Unix);
        assert_eq!(HostPlatform::from_family(""), HostPlatform::Unix);
    }

    #[test]
    fn failed_outcome_uses_error_prefix() {
        let outcome = RunOutcome::Failed {
            message: "boom".to_owned(),
        };
        assert_eq!(outcome.into_output(), "ERROR: boom");

        let outcome = RunOutcome::Completed {
            output: "fine".to_owned(),
            exit_code: Some(1),
        };
        assert_eq!(outcome.into_output(), "fine");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn echo_output_captured() {
        let executor = CommandExecutor::new(HostPlatform::Unix);
        let exec = executor.run(approve("echo hello")).await;
        assert_eq!(exec.output().trim(), "hello");
        assert!(exec.end_time() >= exec.start_time());
        assert!(!exec.is_failure());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn multiple_lines_joined_and_trimmed() {
        let executor = CommandExecutor::new(HostPlatform::Unix);
        let exec = executor.run(approve("echo '  one'; echo 'two  '")).await;
        assert_eq!(exec.output(), "one\ntwo");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_not_a_failure() {
        let executor = CommandExecutor::new(HostPlatform::Unix);
        let exec = executor.run(approve("echo partial; exit 3")).await;
        assert_eq!(exec.output(), "partial");
        assert!(!exec.is_failure());
    }

    #[tokio::test]
    async fn missing_shell_recorded_as_error() {
        let executor =
            CommandExecutor::with_shell(Shell::new("/nonexistent/taskrunner-shell", "-c"));
        let exec = executor.run(approve("echo hello")).await;
        assert!(exec.output().starts_with("ERROR: "), "got {:?}", exec.output());
        assert!(exec.is_failure());
        assert!(exec.end_time() >= exec.start_time());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_command_and_its_children() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late-write");
        let command = format!(
            "echo start; sh -c 'sleep 1; touch {}'; true",
            marker.display()
        );

        let executor = CommandExecutor::new(HostPlatform::Unix)
            .with_timeout(Some(Duration::from_millis(200)));
        let exec = executor.run(approve(&command)).await;
        assert!(exec.output().starts_with("ERROR: command timed out after"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!marker.exists(), "child of the shell outlived the timeout");
    }

    #[tokio::test]
    async fn lone_carriage_return_ends_a_line() {
        let output = read_lines(&b"a\rb\r\nc\n\rd"[..]).await.unwrap();
        assert_eq!(output, "a\nb\nc\n\nd");
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let output = read_lines(&b"ok \xff\n"[..]).await.unwrap();
        assert_eq!(output, "ok \u{fffd}");
    }
}
