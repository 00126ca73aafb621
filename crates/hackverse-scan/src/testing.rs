//! Scripted [`CommandRunner`] for tests.
//!
//! Handlers simulate `git` and `jscpd` by writing the files the real tools
//! would produce, so the fetch/scan/cleanup path runs unchanged.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use walkdir::WalkDir;

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::CommandError;
use crate::scanner::{REPORT_DIR, REPORT_FILE};

/// Behaviour attached to a program name.
pub type Handler = Arc<dyn Fn(&CommandSpec) -> Result<CommandOutput, CommandError> + Send + Sync>;

/// Runner that dispatches on the program name and records every invocation.
///
/// Programs without a handler fail with [`CommandError::NotFound`].
#[derive(Default)]
pub struct ScriptedRunner {
    handlers: HashMap<String, Handler>,
    delays: HashMap<String, Duration>,
    invocations: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    /// Runner with no programs installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` for `program`.
    #[must_use]
    pub fn on(mut self, program: impl Into<String>, handler: Handler) -> Self {
        self.handlers.insert(program.into(), handler);
        self
    }

    /// Make `program` take `delay` before its handler runs.
    ///
    /// A delay longer than the invocation timeout produces [`CommandError::TimedOut`].
    #[must_use]
    pub fn delay(mut self, program: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(program.into(), delay);
        self
    }

    /// Invocations observed so far, in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of invocations of `program`.
    #[must_use]
    pub fn count(&self, program: &str) -> usize {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|spec| spec.program == program)
            .count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(spec.clone());

        if let Some(delay) = self.delays.get(&spec.program).copied() {
            if delay > spec.timeout {
                tokio::time::sleep(spec.timeout).await;
                return Err(CommandError::TimedOut {
                    program: spec.program.clone(),
                    timeout: spec.timeout,
                });
            }
            tokio::time::sleep(delay).await;
        }

        let handler = self
            .handlers
            .get(&spec.program)
            .ok_or_else(|| CommandError::NotFound {
                program: spec.program.clone(),
            })?;
        handler(spec)
    }
}

/// Handler that exits with `code` and writes `stderr`.
#[must_use]
pub fn exit_with(code: i32, stderr: &str) -> Handler {
    let stderr = stderr.to_string();
    Arc::new(move |_| {
        Ok(CommandOutput {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.clone(),
        })
    })
}

/// In-memory set of remote repositories served to `git clone`.
#[derive(Debug, Clone, Default)]
pub struct FakeRemote {
    repos: HashMap<String, Vec<(PathBuf, String)>>,
}

impl FakeRemote {
    /// Remote with no repositories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a repository at `url` containing `files` (path, contents).
    #[must_use]
    pub fn repo(mut self, url: &str, files: &[(&str, &str)]) -> Self {
        self.repos.insert(
            url.to_string(),
            files
                .iter()
                .map(|(path, contents)| (PathBuf::from(path), (*contents).to_string()))
                .collect(),
        );
        self
    }

    /// Handler emulating `git clone ... -- <url> <destination>`.
    ///
    /// Unknown URLs fail like git does for a missing repository.
    #[must_use]
    pub fn handler(self) -> Handler {
        Arc::new(move |spec| {
            let (url, destination) = match spec.args.as_slice() {
                [.., url, destination] => (url.clone(), PathBuf::from(destination)),
                _ => return Ok(failure(129, "usage: git clone")),
            };
            let Some(files) = self.repos.get(&url) else {
                return Ok(failure(
                    128,
                    &format!("remote: Repository not found.\nfatal: repository '{url}' not found"),
                ));
            };
            std::fs::create_dir_all(destination.join(".git")).map_err(|source| spawn(spec, source))?;
            std::fs::write(destination.join(".git/HEAD"), "ref: refs/heads/main\n")
                .map_err(|source| spawn(spec, source))?;
            for (path, contents) in files {
                let target = destination.join(path);
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent).map_err(|source| spawn(spec, source))?;
                }
                std::fs::write(&target, contents).map_err(|source| spawn(spec, source))?;
            }
            Ok(success())
        })
    }
}

/// Handler emulating `jscpd` by writing a report with the given percentage.
#[must_use]
pub fn jscpd_reporting(percentage: Value) -> Handler {
    let report = json!({
        "statistics": { "total": { "percentage": percentage, "sources": 2 } },
        "duplicates": [],
    });
    jscpd_writing(&report.to_string())
}

/// Handler emulating `jscpd` by writing `contents` verbatim as its report.
#[must_use]
pub fn jscpd_writing(contents: &str) -> Handler {
    let contents = contents.to_string();
    Arc::new(move |spec| {
        write_report(spec, &contents)?;
        Ok(success())
    })
}

/// Handler emulating `jscpd` by comparing file contents of the two scanned trees.
///
/// The percentage is the share of files whose exact contents appear in the
/// other tree, so identical trees score `100`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn jscpd_by_content() -> Handler {
    Arc::new(|spec| {
        let cwd = spec.cwd.clone().unwrap_or_default();
        let (dir_a, dir_b) = match spec.args.as_slice() {
            [.., a, b] => (cwd.join(a), cwd.join(b)),
            _ => return Ok(failure(1, "missing directories")),
        };
        let files_a = contents_of(&dir_a);
        let files_b = contents_of(&dir_b);
        let set_a: HashSet<&String> = files_a.iter().collect();
        let set_b: HashSet<&String> = files_b.iter().collect();
        let shared = files_a.iter().filter(|file| set_b.contains(file)).count()
            + files_b.iter().filter(|file| set_a.contains(file)).count();
        let total = files_a.len() + files_b.len();
        let percentage = if total == 0 {
            0.0
        } else {
            (shared as f64) * 100.0 / (total as f64)
        };
        let report = json!({
            "statistics": { "total": { "percentage": percentage, "sources": total } },
            "duplicates": [],
        });
        write_report(spec, &report.to_string())?;
        Ok(success())
    })
}

fn success() -> CommandOutput {
    CommandOutput {
        status: Some(0),
        ..CommandOutput::default()
    }
}

fn failure(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        status: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

fn spawn(spec: &CommandSpec, source: std::io::Error) -> CommandError {
    CommandError::Spawn {
        program: spec.program.clone(),
        source,
    }
}

fn write_report(spec: &CommandSpec, contents: &str) -> Result<(), CommandError> {
    let cwd = spec.cwd.clone().unwrap_or_default();
    let output = spec
        .args
        .iter()
        .position(|arg| arg == "--output")
        .and_then(|index| spec.args.get(index + 1))
        .map_or_else(|| PathBuf::from(REPORT_DIR), PathBuf::from);
    let dir = cwd.join(output);
    std::fs::create_dir_all(&dir).map_err(|source| spawn(spec, source))?;
    std::fs::write(dir.join(REPORT_FILE), contents).map_err(|source| spawn(spec, source))
}

fn contents_of(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git")
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| std::fs::read_to_string(entry.path()).ok())
        .collect()
}
