//! Task orchestration: one task per uploaded file, from parse to export.

use anyhow::Result;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use crate::detector::{detect_shape, ColumnMapping, CsvShape};
use crate::dns::MxResolver;
use crate::export::{export_csv, ExportOptions, ExportedCsv};
use crate::finalizer::finalize;
use crate::ingest::parse_csv;
use crate::pipeline::{self, ProcessingError};
use crate::row::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file-processing job.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub filename: String,
    /// Raw file text, kept until the task is processed
    pub content: String,
    pub status: TaskStatus,
    /// 0 to 100
    pub progress: u8,
    pub shape: CsvShape,
    pub mapping: ColumnMapping,
    pub original_headers: Vec<String>,
    pub result: Option<Vec<Row>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Partial change pushed to a [`ProgressSink`].
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    pub result: Option<Vec<Row>>,
    pub error: Option<String>,
}

impl TaskUpdate {
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress.min(100)),
            ..Default::default()
        }
    }

    pub fn started() -> Self {
        Self {
            status: Some(TaskStatus::Processing),
            progress: Some(5),
            ..Default::default()
        }
    }

    pub fn completed(rows: Vec<Row>) -> Self {
        Self {
            status: Some(TaskStatus::Completed),
            progress: Some(100),
            result: Some(rows),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Error),
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Receiver of task progress and status changes.
pub trait ProgressSink {
    fn update(&self, task_id: &str, update: TaskUpdate);
}

impl<T: ProgressSink + ?Sized> ProgressSink for &T {
    fn update(&self, task_id: &str, update: TaskUpdate) {
        (**self).update(task_id, update)
    }
}

impl<A: ProgressSink, B: ProgressSink> ProgressSink for (A, B) {
    fn update(&self, task_id: &str, update: TaskUpdate) {
        self.0.update(task_id, update.clone());
        self.1.update(task_id, update);
    }
}

/// Sink that discards every update.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&self, _task_id: &str, _update: TaskUpdate) {}
}

/// In-memory task table, in insertion order.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Mutex<IndexMap<String, Task>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<String, Task>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, task: Task) {
        self.lock().insert(task.id.clone(), task);
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.lock().get(id).cloned()
    }

    pub fn list(&self) -> Vec<Task> {
        self.lock().values().cloned().collect()
    }

    pub fn set_mapping(&self, id: &str, mapping: ColumnMapping) -> Result<(), ProcessingError> {
        let mut tasks = self.lock();
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| ProcessingError::TaskNotFound(id.to_string()))?;
        task.mapping = mapping;
        Ok(())
    }
}

impl ProgressSink for TaskStore {
    /// Progress never moves backwards within a run.
    fn update(&self, task_id: &str, update: TaskUpdate) {
        let mut tasks = self.lock();
        let Some(task) = tasks.get_mut(task_id) else {
            return;
        };

        if let Some(status) = update.status {
            // A new run starts from scratch
            if status == TaskStatus::Processing && task.status != TaskStatus::Processing {
                task.progress = 0;
                task.error = None;
            }
            task.status = status;
        }
        if let Some(progress) = update.progress {
            task.progress = task.progress.max(progress.min(100));
        }
        if let Some(rows) = update.result {
            task.result = Some(rows);
            task.content.clear();
        }
        if let Some(message) = update.error {
            task.error = Some(message);
        }
    }
}

/// Runs tasks through detection, the row pipeline, finalization and export.
pub struct CsvProcessor {
    store: Arc<TaskStore>,
    resolver: Option<Arc<MxResolver>>,
    export_options: ExportOptions,
    next_id: AtomicU64,
}

impl CsvProcessor {
    /// `resolver` of `None` skips MX lookups entirely.
    pub fn new(store: Arc<TaskStore>, resolver: Option<Arc<MxResolver>>) -> Self {
        Self {
            store,
            resolver,
            export_options: ExportOptions::default(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_export_options(mut self, options: ExportOptions) -> Self {
        self.export_options = options;
        self
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Register a file as a pending task. Fails when the text has no header row.
    pub fn add_task(&self, filename: &str, content: String) -> Result<String, ProcessingError> {
        let parsed = parse_csv(&content)?;
        let shape = detect_shape(&parsed.headers);

        let created_at = Utc::now();
        let id = format!(
            "{}-{}",
            created_at.timestamp_millis(),
            self.next_id.fetch_add(1, Ordering::Relaxed)
        );

        info!("Added task {} for {} ({} columns, {})", id, filename, parsed.headers.len(), shape);

        self.store.insert(Task {
            id: id.clone(),
            filename: filename.to_string(),
            content,
            status: TaskStatus::Pending,
            progress: 0,
            shape,
            mapping: ColumnMapping::default(),
            original_headers: parsed.headers,
            result: None,
            error: None,
            created_at,
        });

        Ok(id)
    }

    /// Process a task with `mapping`, reporting to the store and `observer`.
    ///
    /// Fatal input errors move the task to `error` and are returned.
    pub async fn process(
        &self,
        task_id: &str,
        mapping: ColumnMapping,
        observer: &dyn ProgressSink,
    ) -> Result<(), ProcessingError> {
        let task = self
            .store
            .get(task_id)
            .ok_or_else(|| ProcessingError::TaskNotFound(task_id.to_string()))?;
        self.store.set_mapping(task_id, mapping.clone())?;

        let sink = (&*self.store, observer);
        sink.update(task_id, TaskUpdate::started());

        match self.run(&task, &mapping, &sink).await {
            Ok(rows) => {
                info!("Task {} completed with {} rows", task_id, rows.len());
                sink.update(task_id, TaskUpdate::completed(rows));
                Ok(())
            }
            Err(e) => {
                error!("Task {} failed: {}", task_id, e);
                sink.update(task_id, TaskUpdate::failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        task: &Task,
        mapping: &ColumnMapping,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<Row>, ProcessingError> {
        let parsed = parse_csv(&task.content)?;
        if parsed.rows.is_empty() {
            return Err(ProcessingError::NoData);
        }
        sink.update(&task.id, TaskUpdate::progress(10));

        let rows = pipeline::process(
            task.shape,
            parsed.rows,
            mapping,
            self.resolver.as_deref(),
            &mut |p| sink.update(&task.id, TaskUpdate::progress(p)),
        )
        .await?;

        let finalized = finalize(rows);
        sink.update(&task.id, TaskUpdate::progress(95));
        Ok(finalized)
    }

    /// Serialize a completed task's result.
    pub fn export(&self, task_id: &str) -> Result<ExportedCsv> {
        let task = self
            .store
            .get(task_id)
            .ok_or_else(|| ProcessingError::TaskNotFound(task_id.to_string()))?;
        let rows = task
            .result
            .as_ref()
            .ok_or_else(|| ProcessingError::NoResult(task_id.to_string()))?;
        export_csv(rows, &task.filename, &self.export_options)
    }
}
