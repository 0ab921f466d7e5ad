use crate::error::TaskRunnerError;
use crate::tasks::Task;

pub const HELP: &str = "\
commands:
  list                  show every task
  get <id>              show one task
  search <name>         tasks whose name contains <name> (case-insensitive)
  put <task-json>       create or replace a task, e.g.
                        put {\"name\":\"greet\",\"owner\":\"me\",\"command\":\"echo hi\"}
  delete <id>           remove a task and its history
  exec <id>             run a task's command and record the result
  help                  show this text
  quit                  exit";

/// One line of REPL input.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    List,
    Get(String),
    Search(String),
    Put(Box<Task>),
    Delete(String),
    Execute(String),
    Help,
    Quit,
}

impl Command {
    /// Parse a REPL line. Blank lines parse to `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, TaskRunnerError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "list" | "ls" => Self::List,
            "get" => Self::Get(required_id(verb, rest)?),
            // An empty fragment is allowed and matches everything.
            "search" => Self::Search(rest.to_owned()),
            "put" => {
                let task: Task = serde_json::from_str(rest)
                    .map_err(|e| TaskRunnerError::InvalidTask(format!("bad task JSON: {e}")))?;
                Self::Put(Box::new(task))
            }
            "delete" | "rm" => Self::Delete(required_id(verb, rest)?),
            "exec" | "run" => Self::Execute(required_id(verb, rest)?),
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => {
                return Err(TaskRunnerError::Usage(format!(
                    "unknown command '{other}', try 'help'"
                )));
            }
        };
        Ok(Some(command))
    }
}

fn required_id(verb: &str, rest: &str) -> Result<String, TaskRunnerError> {
    if rest.is_empty() {
        return Err(TaskRunnerError::Usage(format!("usage: {verb} <id>")));
    }
    Ok(rest.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_is_none() {
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn simple_verbs() {
        assert_eq!(Command::parse("list").unwrap(), Some(Command::List));
        assert_eq!(Command::parse("HELP").unwrap(), Some(Command::Help));
        assert_eq!(Command::parse("quit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn id_arguments() {
        assert_eq!(
            Command::parse("get abc").unwrap(),
            Some(Command::Get("abc".to_owned()))
        );
        assert_eq!(
            Command::parse("exec  abc ").unwrap(),
            Some(Command::Execute("abc".to_owned()))
        );
        assert_eq!(
            Command::parse("delete abc").unwrap(),
            Some(Command::Delete("abc".to_owned()))
        );
    }

    #[test]
    fn missing_id_is_usage_error() {
        assert!(matches!(
            Command::parse("exec"),
            Err(TaskRunnerError::Usage(_))
        ));
        assert!(matches!(
            Command::parse("get   "),
            Err(TaskRunnerError::Usage(_))
        ));
    }

    #[test]
    fn search_keeps_spaces_inside_fragment() {
        assert_eq!(
            Command::parse("search nightly backup").unwrap(),
            Some(Command::Search("nightly backup".to_owned()))
        );
        assert_eq!(
            Command::parse("search").unwrap(),
            Some(Command::Search(String::new()))
        );
    }

    #[test]
    fn put_parses_task_json() {
        let parsed =
            Command::parse(r#"put {"name":"greet","owner":"me","command":"echo hi"}"#).unwrap();
        match parsed {
            Some(Command::Put(task)) => {
                assert_eq!(task.name, "greet");
                assert_eq!(task.command.as_deref(), Some("echo hi"));
                assert!(task.id.is_empty());
            }
            other => panic!("expected Put, got {other:?}"),
        }
    }

    #[test]
    fn put_with_bad_json_fails() {
        assert!(matches!(
            Command::parse("put {not json"),
            Err(TaskRunnerError::InvalidTask(_))
        ));
    }

    #[test]
    fn unknown_verb_fails() {
        assert!(Command::parse("frobnicate").is_err());
    }
}
