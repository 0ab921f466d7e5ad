pub mod capability;
pub mod policy;

use capability::SafeCommand;
use policy::CommandPolicy;

/// Result of enforcement evaluation.
#[derive(Debug)]
pub enum Decision {
    Allow(SafeCommand),
    Reject,
}

/// Evaluate a command against the policy.
///
/// `Allow` carries the only kind of value the executor accepts, so a command
/// cannot reach a shell without passing through here first.
pub fn evaluate(command: Option<&str>, policy: &CommandPolicy) -> Decision {
    match command {
        Some(command) if policy.is_safe(Some(command)) => {
            Decision::Allow(SafeCommand::new(command))
        }
        _ => Decision::Reject,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CommandPolicy {
        CommandPolicy::echo_only().unwrap()
    }

    #[test]
    fn echo_allowed() {
        match evaluate(Some("echo hello"), &policy()) {
            Decision::Allow(command) => assert_eq!(command.as_str(), "echo hello"),
            Decision::Reject => panic!("expected Allow"),
        }
    }

    #[test]
    fn destructive_command_rejected() {
        assert!(matches!(
            evaluate(Some("rm -rf /"), &policy()),
            Decision::Reject
        ));
    }

    #[test]
    fn missing_command_rejected() {
        assert!(matches!(evaluate(None, &policy()), Decision::Reject));
    }

    #[test]
    fn empty_command_rejected() {
        assert!(matches!(evaluate(Some(""), &policy()), Decision::Reject));
    }
}
