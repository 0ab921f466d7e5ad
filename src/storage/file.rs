use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{StoreResult, TaskStore, name_contains};
use crate::error::TaskRunnerError;
use crate::tasks::{Task, TaskExecution};

const EXTENSION: &str = "json";

/// One JSON document per task in a directory.
///
/// Writes go to a temp file that is renamed over the target, so readers never
/// see a half-written document. Writers are serialized by `write_lock`, which
/// also makes `append_execution` atomic within this process.
#[derive(Debug)]
pub struct JsonFileTaskStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileTaskStore {
    /// Open (and create if needed) the store directory.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_error(&dir, e))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, id: &str) -> StoreResult<PathBuf> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{id}.{EXTENSION}")))
    }

    async fn read_document(&self, path: &Path) -> StoreResult<Option<Task>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| TaskRunnerError::Storage(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(path, e)),
        }
    }

    async fn write_document(&self, task: &Task) -> StoreResult<()> {
        let path = self.document_path(&task.id)?;
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        let bytes = serde_json::to_vec_pretty(task)
            .map_err(|e| TaskRunnerError::Storage(e.to_string()))?;
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| storage_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| storage_error(&path, e))
    }

    async fn load_all(&self) -> StoreResult<Vec<Task>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| storage_error(&self.dir, e))?;
        let mut tasks = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| storage_error(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(task) = self.read_document(&path).await? {
                tasks.push(task);
            }
        }
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tasks)
    }
}

#[async_trait]
impl TaskStore for JsonFileTaskStore {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Task>> {
        let path = self.document_path(id)?;
        self.read_document(&path).await
    }

    async fn save(&self, task: Task) -> StoreResult<Task> {
        tracing::debug!(task_id = %task.id, dir = %self.dir.display(), "saving task");
        let _guard = self.write_lock.lock().await;
        self.write_document(&task).await?;
        Ok(task)
    }

    async fn save_definition(&self, mut task: Task) -> StoreResult<Task> {
        let path = self.document_path(&task.id)?;
        let _guard = self.write_lock.lock().await;
        task.task_executions = self
            .read_document(&path)
            .await?
            .map(|existing| existing.task_executions)
            .unwrap_or_default();
        self.write_document(&task).await?;
        Ok(task)
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<()> {
        let path = self.document_path(id)?;
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(&path, e)),
        }
    }

    async fn find_all(&self) -> StoreResult<Vec<Task>> {
        self.load_all().await
    }

    async fn find_by_name_containing_ignore_case(
        &self,
        fragment: &str,
    ) -> StoreResult<Vec<Task>> {
        let needle = fragment.to_lowercase();
        let mut tasks = self.load_all().await?;
        tasks.retain(|task| name_contains(task, &needle));
        Ok(tasks)
    }

    async fn append_execution(
        &self,
        id: &str,
        execution: TaskExecution,
    ) -> StoreResult<Option<Task>> {
        let path = self.document_path(id)?;
        let _guard = self.write_lock.lock().await;
        let Some(mut task) = self.read_document(&path).await? else {
            return Ok(None);
        };
        task.task_executions.push(execution);
        self.write_document(&task).await?;
        Ok(Some(task))
    }
}

/// Ids become file names, so only a conservative character set is accepted.
fn validate_id(id: &str) -> StoreResult<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(TaskRunnerError::InvalidTask(format!(
            "id {id:?} may only contain letters, digits, '-' and '_'"
        )))
    }
}

fn storage_error(path: &Path, e: std::io::Error) -> TaskRunnerError {
    TaskRunnerError::Storage(format!("{}: {e}", path.display()))
}
