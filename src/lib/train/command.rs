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

use burn::backend::ndarray::NdArrayDevice;
use tokio::{
	sync::mpsc::{unbounded_channel, UnboundedReceiver},
	task::JoinHandle,
};
use tracing::{info, warn};

use super::helper::*;
use super::typedef::*;
use crate::error::{Error, Result, Stage};
use crate::typedef::{Dataset, TrainBackend};
use crate::window::{
	command::prepare,
	typedef::{PreparedData, WindowConfig},
};

/// Fits a fresh network on prepared samples, blocking the calling thread.
///
/// Persisting the result is left to the caller. A non-finite loss aborts the
/// run with `TrainingDiverged` and is never retried here.
pub fn train(
	prepared: &PreparedData,
	config: &TrainingConfig,
	on_epoch: impl FnMut(&EpochMetrics),
	cancel: &CancelToken,
) -> Result<TrainingResult> {
	config.validate()?;

	let split = &prepared.split;
	if split.train.is_empty() || split.validation.is_empty() {
		return Err(Error::InsufficientData {
			stage: Stage::Training,
			available: split.train.len() + split.validation.len(),
			required: 2,
		});
	}

	let device = NdArrayDevice::Cpu;
	let input = send_samples_to_device::<TrainBackend>(split, &device);

	info!(
		train = split.train.len(),
		validation = split.validation.len(),
		epochs = config.epochs,
		batch_size = config.batch_size,
		"starting training"
	);

	let outcome =
		train_new_model(input, config, &device, on_epoch, || cancel.is_cancelled())?;

	info!(
		epochs_run = outcome.summary.epochs_run,
		best_epoch = outcome.summary.best_epoch,
		cancelled = outcome.summary.cancelled,
		"training finished"
	);

	Ok(TrainingResult {
		model: outcome.model,
		model_config: config.model.clone(),
		scaler: prepared.scaler,
		timesteps: prepared.timesteps,
		metrics: outcome.metrics,
		summary: outcome.summary,
	})
}

/// A training run executing on the blocking pool.
pub struct TrainingHandle {
	dataset: String,
	events: UnboundedReceiver<TrainEvent>,
	cancel: CancelToken,
	task: JoinHandle<Result<TrainingResult>>,
}

impl TrainingHandle {
	/// Name of the dataset being trained on
	pub fn dataset(&self) -> &str {
		&self.dataset
	}

	/// Next progress event, `None` once the run is over and the stream drained.
	pub async fn next_event(&mut self) -> Option<TrainEvent> {
		self.events.recv().await
	}

	pub fn cancel_token(&self) -> CancelToken {
		self.cancel.clone()
	}

	/// Asks the trainer to stop at the next epoch boundary.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	pub async fn join(self) -> Result<TrainingResult> {
		match self.task.await {
			Ok(ok) => ok,
			Err(err) => Err(Error::Task(err.to_string())),
		}
	}
}

/// Windows, scales and trains on `dataset` off the calling thread. Must be
/// called from within a tokio runtime.
pub fn train_model(
	dataset: Dataset,
	window: &WindowConfig,
	config: &TrainingConfig,
) -> Result<TrainingHandle> {
	window.validate()?;
	config.validate()?;

	let (tx, events) = unbounded_channel::<TrainEvent>();
	let cancel = CancelToken::new();

	let name = dataset.name().to_string();
	let window = window.clone();
	let config = config.clone();
	let task_cancel = cancel.clone();
	let task = tokio::task::spawn_blocking(move || {
		let result = prepare(&dataset, &window).and_then(|prepared| {
			train(
				&prepared,
				&config,
				|metrics| {
					// The receiver may be gone, training still completes
					let _ = tx.send(TrainEvent::Epoch(*metrics));
				},
				&task_cancel,
			)
		});

		let _ = match &result {
			Ok(found) => tx.send(TrainEvent::Finished(found.summary)),
			Err(err) => {
				warn!(dataset = dataset.name(), "{}", err);
				tx.send(TrainEvent::Failed(err.info()))
			}
		};

		result
	});

	Ok(TrainingHandle {
		dataset: name,
		events,
		cancel,
		task,
	})
}
