/// Unforgeable proof that the policy approved a command string.
///
/// Construction is double-locked:
/// 1. `Seal` is a private type, so struct literal construction from outside this file fails.
/// 2. `new()` is `pub(super)`, so only `enforcement/` submodules can call it.
///
/// No `Clone`, `Default`, or `From`: a `SafeCommand` is consumed by the executor.
///
/// Code outside `enforcement` cannot mint one:
///
/// ```compile_fail
/// use taskrunner::enforcement::capability::SafeCommand;
///
/// let _command = SafeCommand::new("rm -rf /");
/// ```
///
/// ```compile_fail
/// use taskrunner::enforcement::capability::SafeCommand;
///
/// let _command = SafeCommand { command: "rm -rf /".to_owned(), _seal: todo!() };
/// ```
///
/// The only way in is an `Allow` decision:
///
/// ```
/// use taskrunner::enforcement::policy::CommandPolicy;
/// use taskrunner::enforcement::{Decision, evaluate};
///
/// let policy = CommandPolicy::echo_only().unwrap();
/// let Decision::Allow(command) = evaluate(Some("echo hi"), &policy) else {
///     panic!("echo should be allowed");
/// };
/// assert_eq!(command.as_str(), "echo hi");
/// ```
#[derive(Debug)]
pub struct SafeCommand {
    command: String,
    _seal: Seal,
}

#[derive(Debug)]
struct Seal;

impl SafeCommand {
    pub(super) fn new(command: &str) -> Self {
        Self {
            command: command.to_owned(),
            _seal: Seal,
        }
    }

    /// The approved command text, exactly as it was stored.
    pub fn as_str(&self) -> &str {
        &self.command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_command_keeps_original_text() {
        let command = SafeCommand::new("  echo padded ");
        assert_eq!(command.as_str(), "  echo padded ");
    }

    #[test]
    fn safe_command_is_consumed() {
        let command = SafeCommand::new("echo once");
        // If SafeCommand were Clone, callers could run one approval twice.
        let text = consume(command);
        assert_eq!(text, "echo once");
    }

    fn consume(command: SafeCommand) -> String {
        command.command
    }
}
