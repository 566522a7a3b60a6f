use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

use crate::task::{Task, TaskStatus, TaskUpdate, ProgressSink};

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Summary = 0,   // Warnings, progress bar and final summary (default)
    Detailed = 1,  // Pipeline steps and counts
    Debug = 2,     // Per-row and per-lookup detail
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    /// `tracing` filter directive for this level
    pub fn filter_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Summary => "warn",
            VerbosityLevel::Detailed => "leadcleaner=info,warn",
            VerbosityLevel::Debug => "leadcleaner=debug,info",
        }
    }
}

/// Install the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` wins over the verbosity flag when set.
pub fn init_tracing(verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    // A second init (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Terminal progress bar for a single task.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new(100);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap_or_else(|_| {
                    ProgressStyle::default_bar()
                        .template("{bar:40} {pos}% {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                })
                .progress_chars("##-"),
        );
        bar.set_message(label.to_string());

        Self { bar }
    }

    /// A bar that never draws
    pub fn hidden() -> Self {
        Self { bar: ProgressBar::hidden() }
    }
}

impl ProgressSink for ConsoleProgress {
    fn update(&self, _task_id: &str, update: TaskUpdate) {
        if let Some(progress) = update.progress {
            if u64::from(progress) > self.bar.position() {
                self.bar.set_position(progress.into());
            }
        }

        match update.status {
            Some(TaskStatus::Completed) => self.bar.finish_and_clear(),
            Some(TaskStatus::Error) => {
                let message = update.error.unwrap_or_else(|| "failed".to_string());
                self.bar.abandon_with_message(message);
            }
            _ => {}
        }
    }
}

/// Per-task outcome table printed after all files are processed
pub fn print_task_summary(tasks: &[Task], outputs: &[(String, String)]) {
    print!("\x1b[2K\r");
    let _ = io::stdout().flush();

    println!("\n=== CLEANING SUMMARY ===");
    for task in tasks {
        let rows = task.result.as_ref().map(Vec::len).unwrap_or(0);
        match task.status {
            TaskStatus::Completed => {
                println!("{} [{}] completed: {} rows", task.filename, task.shape, rows);
            }
            TaskStatus::Error => {
                println!(
                    "{} [{}] error: {}",
                    task.filename,
                    task.shape,
                    task.error.as_deref().unwrap_or("unknown error")
                );
            }
            status => println!("{} [{}] {}", task.filename, task.shape, status),
        }
        if let Some((_, path)) = outputs.iter().find(|(id, _)| *id == task.id) {
            println!("  Exported: {}", path);
        }
    }
    println!("========================\n");
}
