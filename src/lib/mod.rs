#![recursion_limit = "256"]

/*
 * Market::Trend, an LSTM market trend forecasting core
 * Copyright (C) 2025 Athaariq A. Ramadhani <foss@athaariq.my.id>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use std::{
	collections::HashMap,
	path::PathBuf,
	sync::{Arc, Mutex, MutexGuard},
};
use tracing::{info, warn};

pub mod artifact;
pub mod config;
pub mod error;
pub mod ingest;
pub mod predict;
pub mod scaler;
pub mod train;
pub mod typedef;
pub mod window;

pub use artifact::typedef::ModelArtifact;
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use ingest::typedef::{IngestOutcome, SourceFile};
pub use predict::typedef::{ForecastReport, PredictionRecord, Trend};
pub use train::{
	command::TrainingHandle,
	typedef::{TrainEvent, TrainingSummary},
};
pub use typedef::{Dataset, ErrorInfo};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
	mutex.lock().map_err(|err| Error::Task(err.to_string()))
}

async fn run_blocking<T, F>(work: F) -> Result<T>
where
	T: Send + 'static,
	F: FnOnce() -> Result<T> + Send + 'static,
{
	match tokio::task::spawn_blocking(work).await {
		Ok(ok) => ok,
		Err(err) => Err(Error::Task(err.to_string())),
	}
}

/// One user's pipeline: ingested datasets by file name and the current model.
///
/// Every operation here is what a UI layer calls. Blocking work runs on the
/// tokio blocking pool, so methods that do any must be awaited inside a
/// runtime.
pub struct Session {
	config: PipelineConfig,
	datasets: Mutex<HashMap<String, Dataset>>,
	artifact: Mutex<Option<Arc<ModelArtifact>>>,
}

impl Session {
	pub fn new(config: PipelineConfig) -> Result<Self> {
		config.validate()?;

		Ok(Self {
			config,
			datasets: Mutex::new(HashMap::new()),
			artifact: Mutex::new(None),
		})
	}

	pub fn config(&self) -> &PipelineConfig {
		&self.config
	}

	fn keep_datasets(&self, outcomes: &[IngestOutcome]) -> Result<()> {
		let mut datasets = lock(&self.datasets)?;
		for each in outcomes {
			if let Ok(report) = &each.result {
				datasets.insert(each.file.clone(), report.dataset.clone());
			}
		}

		Ok(())
	}

	/// Ingests files in parallel and keeps every dataset that parsed. Failed
	/// files are reported in the outcomes next to the successful ones.
	pub async fn ingest(&self, files: Vec<SourceFile>) -> Result<Vec<IngestOutcome>> {
		let outcomes = ingest::command::ingest(files).await;
		self.keep_datasets(&outcomes)?;
		Ok(outcomes)
	}

	/// Like `ingest`, for files still on disk. Unreadable paths are reported
	/// per file.
	pub async fn ingest_paths(&self, paths: Vec<PathBuf>) -> Result<Vec<IngestOutcome>> {
		let outcomes = ingest::command::ingest_paths(paths).await;
		self.keep_datasets(&outcomes)?;
		Ok(outcomes)
	}

	pub fn dataset(&self, name: &str) -> Result<Dataset> {
		lock(&self.datasets)?
			.get(name)
			.cloned()
			.ok_or_else(|| Error::DatasetNotFound(name.to_string()))
	}

	pub fn dataset_names(&self) -> Result<Vec<String>> {
		let mut names = lock(&self.datasets)?.keys().cloned().collect::<Vec<_>>();
		names.sort();
		Ok(names)
	}

	/// Starts training on an ingested dataset. Progress comes through
	/// `TrainingHandle::next_event`, pass the handle to `finish_training` to
	/// publish the model.
	pub fn train(&self, name: &str) -> Result<TrainingHandle> {
		let dataset = self.dataset(name)?;
		train::command::train_model(dataset, &self.config.window, &self.config.training)
	}

	/// Waits for the run and publishes its model, replacing the previous
	/// artifact. A failed run leaves the previous artifact untouched, and so
	/// does a run cancelled before its first epoch, in which case no artifact
	/// is returned.
	pub async fn finish_training(
		&self,
		handle: TrainingHandle,
	) -> Result<(TrainingSummary, Option<Arc<ModelArtifact>>)> {
		let source = handle.dataset().to_string();
		let result = handle.join().await?;

		if result.metrics.is_empty() {
			warn!(dataset = source.as_str(), "training stopped before any epoch, nothing to publish");
			return Ok((result.summary, None));
		}

		let destination = self.config.artifact_path.clone();
		let summary = result.summary;
		let artifact = run_blocking(move || {
			let artifact = ModelArtifact::from_training(&result, &source)?;
			artifact::command::save(&artifact, &destination)?;
			Ok(Arc::new(artifact))
		})
		.await?;

		*lock(&self.artifact)? = Some(artifact.clone());
		Ok((summary, Some(artifact)))
	}

	/// The current model, read from disk the first time it is needed.
	pub async fn model(&self) -> Result<Arc<ModelArtifact>> {
		let cached = lock(&self.artifact)?.clone();
		if let Some(found) = cached {
			return Ok(found);
		}

		let path = self.config.artifact_path.clone();
		let artifact = run_blocking(move || artifact::command::load(&path).map(Arc::new)).await?;

		*lock(&self.artifact)? = Some(artifact.clone());
		Ok(artifact)
	}

	/// Forecasts `horizon` steps past the end of the named dataset.
	pub async fn predict(&self, name: &str, horizon: usize) -> Result<Vec<PredictionRecord>> {
		let dataset = self.dataset(name)?;
		let artifact = self.model().await?;

		run_blocking(move || predict::command::predict(&artifact, &dataset, horizon)).await
	}

	pub async fn forecast(&self, name: &str, horizon: usize) -> Result<ForecastReport> {
		let dataset = self.dataset(name)?;
		let artifact = self.model().await?;

		run_blocking(move || predict::command::forecast(&artifact, &dataset, horizon)).await
	}

	/// Scores the model on the last `backtest_steps` observations of the
	/// named dataset.
	pub async fn backtest(&self, name: &str) -> Result<ForecastReport> {
		let dataset = self.dataset(name)?;
		let artifact = self.model().await?;
		let steps = self.config.backtest_steps;

		run_blocking(move || predict::command::backtest(&artifact, &dataset, steps)).await
	}

	/// Deletes the persisted model, returns whether one existed.
	pub fn reset_model(&self) -> Result<bool> {
		*lock(&self.artifact)? = None;
		artifact::command::delete(&self.config.artifact_path)
	}

	/// Forgets every ingested dataset and the cached model. The artifact on
	/// disk is kept.
	pub fn restart(&self) -> Result<()> {
		lock(&self.datasets)?.clear();
		*lock(&self.artifact)? = None;
		info!("session restarted");
		Ok(())
	}
}
