use regex::{Regex, RegexBuilder};

use crate::error::TaskRunnerError;

/// Longest payload accepted after the `echo` verb, in characters.
pub const MAX_ECHO_PAYLOAD: usize = 900;

// `\s` is spelled out as the ASCII set and `.` excludes every line terminator,
// so multi-line payloads (`echo hi\nrm -rf /`) can never match.
const WS: &str = r"[ \t\n\x0B\x0C\r]";
const NOT_LINE_END: &str = r"[^\n\r\x{85}\x{2028}\x{2029}]";

/// Echo-only allow-list. The only verb a stored command may start with is `echo`.
pub struct CommandPolicy {
    pattern: Regex,
}

impl std::fmt::Debug for CommandPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPolicy")
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

impl CommandPolicy {
    /// Compile the echo allow-list.
    pub fn echo_only() -> Result<Self, TaskRunnerError> {
        let source =
            format!(r"\A\n?{WS}*(?i:echo){WS}+{NOT_LINE_END}{{1,{MAX_ECHO_PAYLOAD}}}\z");
        let pattern = RegexBuilder::new(&source)
            .size_limit(1 << 24)
            .nest_limit(50)
            .build()
            .map_err(|e| TaskRunnerError::PolicyValidation(e.to_string()))?;
        Ok(Self { pattern })
    }

    /// Returns `true` only for a present, non-blank command that matches the
    /// allow-list in full after trimming.
    ///
    /// Trimming strips ASCII control characters and space (`<= U+0020`) only;
    /// other Unicode whitespace stays and fails the match.
    pub fn is_safe(&self, command: Option<&str>) -> bool {
        let Some(command) = command else {
            return false;
        };
        let trimmed = command.trim_matches(|c: char| c <= ' ');
        if trimmed.is_empty() {
            return false;
        }
        self.pattern.is_match(trimmed)
    }
}
