//! Run facade used by training code
//!
//! A [`Run`] picks its name and file when started but only creates the run
//! file on the first write. [`Run::scope`] ties the run's lifetime to a
//! closure and finalizes it on every exit path.
//!
//! ```no_run
//! use runlog::{Run, RunOutcome, Settings};
//!
//! # async fn demo() -> runlog::Result<()> {
//! let run = Run::builder(Settings::from_env())
//!     .project("vision")
//!     .experiment_name("resnet-sweep")
//!     .start()
//!     .await?;
//!
//! run.log_configs([("lr", 0.001)]).await?;
//! run.log_metrics([("train/loss", 0.42)], 0).await?;
//! run.close(RunOutcome::Finished).await?;
//! # Ok(())
//! # }
//! ```

use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::flatten::{flatten_json, normalize_path};
use crate::models::{meta_keys, RunOutcome};
use crate::naming::{generate_run_name, resolve_run_name};
use crate::settings::{run_file_name, Settings};
use crate::store::RunStore;
use crate::value::{AsMetricValue, AsStep, TypedValue};

/// Builder for [`Run`]
#[derive(Debug, Clone)]
pub struct RunBuilder {
    settings: Settings,
    project: Option<String>,
    run_name: Option<String>,
    experiment_name: Option<String>,
    log_dir: Option<PathBuf>,
}

impl RunBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            project: None,
            run_name: None,
            experiment_name: None,
            log_dir: None,
        }
    }

    /// Project the run belongs to, defaults to the configured project
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Explicit run name. Starting fails if a run with this name exists.
    pub fn run_name(mut self, run_name: impl Into<String>) -> Self {
        self.run_name = Some(run_name.into());
        self
    }

    pub fn experiment_name(mut self, experiment_name: impl Into<String>) -> Self {
        self.experiment_name = Some(experiment_name.into());
        self
    }

    /// Write the run file to `<dir>/<run_name>.sqlite` instead of the
    /// project layout
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Resolve the run name and file path
    pub async fn start(self) -> Result<Run> {
        let project = self
            .project
            .unwrap_or_else(|| self.settings.default_project.clone());
        let generated = self.run_name.is_none();
        let requested = self.run_name.unwrap_or_else(generate_run_name);

        if requested.trim().is_empty() || requested.contains(['/', '\\']) {
            return Err(StoreError::invalid(format!("invalid run name '{}'", requested)));
        }

        let settings = &self.settings;
        let log_dir = self.log_dir.as_deref();
        let (run_name, path) = resolve_run_name(&requested, generated, |name| match log_dir {
            Some(dir) => dir.join(run_file_name(name)),
            None => settings.run_path(&project, name),
        })?;

        info!(run = %run_name, project = %project, path = %path.display(), "Run started");

        Ok(Run {
            project,
            run_name,
            experiment_name: self.experiment_name,
            path,
            store: OnceCell::new(),
            closed: AtomicBool::new(false),
        })
    }
}

/// One training run
#[derive(Debug)]
pub struct Run {
    project: String,
    run_name: String,
    experiment_name: Option<String>,
    path: PathBuf,
    store: OnceCell<RunStore>,
    closed: AtomicBool,
}

impl Run {
    pub fn builder(settings: Settings) -> RunBuilder {
        RunBuilder::new(settings)
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    pub fn experiment_name(&self) -> Option<&str> {
        self.experiment_name.as_deref()
    }

    /// Path of the run file, which may not exist before the first write
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The open store, created on first use
    async fn store(&self) -> Result<&RunStore> {
        if self.is_closed() {
            return Err(StoreError::StoreClosed);
        }
        self.store
            .get_or_try_init(|| async {
                let store = RunStore::open(&self.path).await?;
                store.set_meta(meta_keys::RUN_NAME, &self.run_name).await?;
                store.set_meta(meta_keys::PROJECT, &self.project).await?;
                if let Some(experiment) = &self.experiment_name {
                    store.set_meta(meta_keys::EXPERIMENT_NAME, experiment).await?;
                }
                debug!(run = %self.run_name, "Run file created");
                Ok::<_, StoreError>(store)
            })
            .await
    }

    /// Log flat config entries; leading and trailing `/` are stripped from
    /// each key
    pub async fn log_configs<I, K, V>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<TypedValue>,
    {
        let entries = entries
            .into_iter()
            .map(|(key, value)| Ok((checked_path(key.as_ref())?, value.into())))
            .collect::<Result<Vec<_>>>()?;
        self.store().await?.upsert_configs(entries).await
    }

    /// Flatten a nested JSON object and log every leaf
    pub async fn log_configs_nested(&self, config: &serde_json::Value) -> Result<()> {
        let entries = flatten_json(config)?;
        self.store().await?.upsert_configs(entries).await
    }

    /// Log metric values sharing one step
    pub async fn log_metrics<I, K, V>(&self, values: I, step: impl AsStep) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsMetricValue,
    {
        let values = values
            .into_iter()
            .map(|(path, value)| Ok((checked_path(path.as_ref())?, value)))
            .collect::<Result<Vec<_>>>()?;
        self.store().await?.log_metrics(values, step).await
    }

    /// Finalize the run. Later calls do nothing.
    ///
    /// A run that never wrote anything leaves no file behind.
    pub async fn close(&self, outcome: RunOutcome) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match self.store.get() {
            Some(store) => {
                store.finalize(outcome).await?;
                info!(run = %self.run_name, outcome = ?outcome, "Run closed");
            }
            None => debug!(run = %self.run_name, "Run closed before any write"),
        }
        Ok(())
    }

    /// Run `f` with this run and finalize it afterwards: `Failed` if `f`
    /// returns an error, `Finished` otherwise.
    ///
    /// The error from `f` wins over a finalize error.
    pub async fn scope<T, E, F>(self, f: F) -> std::result::Result<T, E>
    where
        F: for<'a> FnOnce(&'a Run) -> BoxFuture<'a, std::result::Result<T, E>>,
        E: From<StoreError>,
    {
        let result = f(&self).await;
        let outcome = if result.is_ok() {
            RunOutcome::Finished
        } else {
            RunOutcome::Failed
        };

        match (result, self.close(outcome).await) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(run = %self.run_name, error = %close_err, "Finalize failed after run error");
                Err(e)
            }
        }
    }
}

impl Drop for Run {
    fn drop(&mut self) {
        if !self.is_closed() && self.store.initialized() {
            warn!(
                run = %self.run_name,
                path = %self.path.display(),
                "Run dropped without close, file left with status=running"
            );
        }
    }
}

fn checked_path(raw: &str) -> Result<String> {
    let path = normalize_path(raw);
    if path.is_empty() {
        return Err(StoreError::invalid(format!("empty path '{}'", raw)));
    }
    Ok(path)
}
