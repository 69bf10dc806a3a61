//! Model directory artifact: model object + X/y specs + extras.
//!
//! Directory layout written by [`ModelContainer::save`]:
//!
//! <root>/
//!   model            # backend-defined opaque format
//!   X_spec.json      # canonical spec form
//!   y_spec.json      # canonical spec form
//!   extras.json      # {eval_metrics, dt, save_timestamp}

use crate::error::{Result, StoreError};
use crate::model::{BackendRegistry, Estimator};
use crate::spec::DependencySpec;
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MODEL_FILENAME: &str = "model";
pub const X_SPEC_FILENAME: &str = "X_spec.json";
pub const Y_SPEC_FILENAME: &str = "y_spec.json";
pub const EXTRAS_FILENAME: &str = "extras.json";

const DATE_FORMAT: &str = "%Y-%m-%d";

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;

/// Binds one trained model to the specs of the columns it consumes (X) and
/// produces (y), its evaluation metrics, and the elapsed training duration.
pub struct ModelContainer {
    model: Box<dyn Estimator>,
    x_spec: DependencySpec,
    y_spec: DependencySpec,
    dt: Duration,
    eval_metrics: BTreeMap<String, f64>,
    saved_on: Option<NaiveDate>,
}

/// extras.json content.
#[derive(Debug, Serialize, Deserialize)]
struct Extras {
    eval_metrics: BTreeMap<String, f64>,
    dt: DtParts,
    save_timestamp: String,
}

/// Integer duration components; avoids floating-point drift across
/// save/load cycles. Normalized: microseconds in [0, 1e6), seconds in
/// [0, 86400), days carry the sign.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct DtParts {
    days: i64,
    seconds: i64,
    microseconds: i64,
}

impl DtParts {
    fn from_duration(dt: Duration) -> DtParts {
        // num_microseconds overflows i64 past ~292k years; whole seconds
        // are enough at that point.
        let micros = dt
            .num_microseconds()
            .unwrap_or_else(|| dt.num_seconds().saturating_mul(MICROS_PER_SECOND));
        let rem = micros.rem_euclid(MICROS_PER_DAY);
        DtParts {
            days: micros.div_euclid(MICROS_PER_DAY),
            seconds: rem / MICROS_PER_SECOND,
            microseconds: rem % MICROS_PER_SECOND,
        }
    }

    fn to_duration(self) -> Duration {
        Duration::days(self.days)
            + Duration::seconds(self.seconds)
            + Duration::microseconds(self.microseconds)
    }
}

impl std::fmt::Debug for ModelContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelContainer")
            .field("model", &"<dyn Estimator>")
            .field("x_spec", &self.x_spec)
            .field("y_spec", &self.y_spec)
            .field("dt", &self.dt)
            .field("eval_metrics", &self.eval_metrics)
            .field("saved_on", &self.saved_on)
            .finish()
    }
}

impl ModelContainer {
    pub fn new(
        model: Box<dyn Estimator>,
        x_spec: DependencySpec,
        y_spec: DependencySpec,
    ) -> Self {
        Self {
            model,
            x_spec,
            y_spec,
            dt: Duration::zero(),
            eval_metrics: BTreeMap::new(),
            saved_on: None,
        }
    }

    pub fn with_eval_metrics(mut self, eval_metrics: BTreeMap<String, f64>) -> Self {
        self.eval_metrics = eval_metrics;
        self
    }

    pub fn with_training_time(mut self, dt: Duration) -> Self {
        self.dt = dt;
        self
    }

    pub fn model(&self) -> &dyn Estimator {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> &mut dyn Estimator {
        self.model.as_mut()
    }

    pub fn x_spec(&self) -> &DependencySpec {
        &self.x_spec
    }

    pub fn y_spec(&self) -> &DependencySpec {
        &self.y_spec
    }

    pub fn eval_metrics(&self) -> &BTreeMap<String, f64> {
        &self.eval_metrics
    }

    pub fn training_time(&self) -> Duration {
        self.dt
    }

    /// Date the artifact was written, known after a [`load`](Self::load).
    pub fn saved_on(&self) -> Option<NaiveDate> {
        self.saved_on
    }

    fn artifact_paths(root: &Path) -> (PathBuf, PathBuf, PathBuf, PathBuf) {
        (
            root.join(MODEL_FILENAME),
            root.join(X_SPEC_FILENAME),
            root.join(Y_SPEC_FILENAME),
            root.join(EXTRAS_FILENAME),
        )
    }

    /// Write the four artifacts to `path`, creating parent directories as
    /// needed and overwriting existing contents without confirmation.
    ///
    /// Everything is staged in a sibling directory which then replaces the
    /// target in a final rename, so a crash mid-save never leaves a
    /// half-written artifact directory behind.
    pub fn save(&self, registry: &BackendRegistry, path: &Path) -> Result<()> {
        let staging = staging_path(path)?;
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|err| StoreError::io(&staging, err))?;
        }
        fs::create_dir_all(&staging).map_err(|err| StoreError::io(&staging, err))?;

        if let Err(err) = self.write_artifacts(registry, &staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }

        if path.exists() {
            fs::remove_dir_all(path).map_err(|err| StoreError::io(path, err))?;
        }
        fs::rename(&staging, path).map_err(|err| StoreError::io(path, err))?;
        debug!(path = %path.display(), "model directory saved");
        Ok(())
    }

    fn write_artifacts(&self, registry: &BackendRegistry, dir: &Path) -> Result<()> {
        let (model_path, x_path, y_path, extras_path) = Self::artifact_paths(dir);

        let backend = registry.save(self.model.as_ref(), &model_path)?;
        debug!(backend, "model object saved");

        self.x_spec.save(&x_path)?;
        self.y_spec.save(&y_path)?;

        let extras = Extras {
            eval_metrics: self.eval_metrics.clone(),
            dt: DtParts::from_duration(self.dt),
            save_timestamp: Local::now().date_naive().format(DATE_FORMAT).to_string(),
        };
        let text = serde_json::to_string_pretty(&extras)
            .map_err(|err| StoreError::json(&extras_path, err))?;
        fs::write(&extras_path, text + "\n").map_err(|err| StoreError::io(&extras_path, err))
    }

    /// Reconstruct a container from a saved directory. All four files must
    /// exist; the first absent one is reported before any reconstruction is
    /// attempted. The model handle is whatever the registry's load path
    /// returns.
    pub fn load(registry: &BackendRegistry, path: &Path) -> Result<ModelContainer> {
        let (model_path, x_path, y_path, extras_path) = Self::artifact_paths(path);

        for required in [&model_path, &x_path, &y_path, &extras_path] {
            if !required.is_file() {
                return Err(StoreError::MissingFile {
                    path: required.clone(),
                });
            }
        }

        let model = registry.load(&model_path)?;
        let x_spec = DependencySpec::load(&x_path)?;
        let y_spec = DependencySpec::load(&y_path)?;

        let text =
            fs::read_to_string(&extras_path).map_err(|err| StoreError::io(&extras_path, err))?;
        let extras: Extras =
            serde_json::from_str(&text).map_err(|err| StoreError::json(&extras_path, err))?;

        let saved_on = NaiveDate::parse_from_str(&extras.save_timestamp, DATE_FORMAT)
            .map_err(|err| {
                StoreError::Validation(format!(
                    "bad save_timestamp {:?}: {err}",
                    extras.save_timestamp
                ))
            })?;

        Ok(ModelContainer {
            model,
            x_spec,
            y_spec,
            dt: extras.dt.to_duration(),
            eval_metrics: extras.eval_metrics,
            saved_on: Some(saved_on),
        })
    }
}

fn staging_path(path: &Path) -> Result<PathBuf> {
    let Some(name) = path.file_name() else {
        return Err(StoreError::Validation(format!(
            "save path has no directory name: {}",
            path.display()
        )));
    };
    let mut staged = name.to_os_string();
    staged.push(".partial");
    Ok(path.with_file_name(staged))
}
