use anyhow::Context;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use taskrunner::cli::{Command, HELP};
use taskrunner::config::{Config, StorageBackend};
use taskrunner::enforcement::policy::CommandPolicy;
use taskrunner::error::TaskRunnerError;
use taskrunner::service::TaskService;
use taskrunner::storage::{InMemoryTaskStore, JsonFileTaskStore, TaskStore};
use taskrunner::tasks::executor::{CommandExecutor, HostPlatform};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    let policy = CommandPolicy::echo_only()?;
    let executor =
        CommandExecutor::new(HostPlatform::current()).with_timeout(config.executor.timeout());

    tracing::info!(
        backend = ?config.storage.backend,
        shell = executor.shell().program(),
        timeout = ?config.executor.timeout(),
        "taskrunner starting"
    );

    match config.storage.backend {
        StorageBackend::Memory => {
            repl(TaskService::new(InMemoryTaskStore::new(), policy, executor)).await
        }
        StorageBackend::File => {
            let path = config
                .storage
                .path
                .clone()
                .context("storage.path is required for the file backend")?;
            let store = JsonFileTaskStore::open(path)
                .await
                .context("failed to open task directory")?;
            repl(TaskService::new(store, policy, executor)).await
        }
    }
}

async fn repl<S: TaskStore>(service: TaskService<S>) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new().context("failed to initialise line editor")?;
    println!("taskrunner: type 'help' for commands");

    loop {
        let line = match editor.readline("taskrunner> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        };
        if let Err(e) = editor.add_history_entry(line.as_str()) {
            tracing::debug!(error = %e, "history entry not recorded");
        }

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("error: {e}");
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }
        if let Err(e) = dispatch(&service, command).await {
            if !e.is_client_error() {
                tracing::error!(error = %e, "command failed");
            }
            eprintln!("error: {e}");
        }
    }

    Ok(())
}

async fn dispatch<S: TaskStore>(
    service: &TaskService<S>,
    command: Command,
) -> Result<(), TaskRunnerError> {
    match command {
        Command::List => print_json(&service.list().await?),
        Command::Get(id) => match service.get(&id).await? {
            Some(task) => print_json(&task),
            None => Err(TaskRunnerError::TaskNotFound(id)),
        },
        Command::Search(fragment) => print_json(&service.search_by_name(&fragment).await?),
        Command::Put(task) => print_json(&service.upsert(*task).await?),
        Command::Delete(id) => {
            service.delete(&id).await?;
            println!("deleted {id}");
            Ok(())
        }
        Command::Execute(id) => print_json(&service.execute(&id).await?),
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Quit => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), TaskRunnerError> {
    let json = serde_json::to_string_pretty(value).map_err(TaskRunnerError::Render)?;
    println!("{json}");
    Ok(())
}
