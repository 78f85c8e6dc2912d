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

use burn::{
	module::AutodiffModule,
	nn::loss::{MseLoss, Reduction::Mean},
	optim::{GradientsParams, Optimizer},
	tensor::{backend::AutodiffBackend, ElementConversion, Tensor},
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tracing::{debug, info};

use super::model::*;
use super::typedef::*;
use crate::error::{Error, Result};
use crate::window::typedef::{SplitDataset, WindowedSample};

fn sample_to_tensor<B: burn::tensor::backend::Backend>(
	sample: &WindowedSample,
	device: &B::Device,
) -> Tensor<B, 2> {
	let values = sample.input.iter().map(|each| *each as f32).collect::<Vec<_>>();
	let timesteps = values.len();

	Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([timesteps, 1])
}

pub(super) fn send_samples_to_device<B: AutodiffBackend>(
	split: &SplitDataset,
	device: &B::Device,
) -> TrainInput<B> {
	let train_samples = split
		.train
		.iter()
		.map(|each| sample_to_tensor::<B>(each, device))
		.collect::<Vec<_>>();
	let train_targets = split
		.train
		.iter()
		.map(|each| Tensor::<B, 1>::from_floats([each.target as f32], device))
		.collect::<Vec<_>>();

	let valid_samples = split
		.validation
		.iter()
		.map(|each| sample_to_tensor::<B::InnerBackend>(each, device))
		.collect::<Vec<_>>();
	let valid_targets = split
		.validation
		.iter()
		.map(|each| Tensor::<B::InnerBackend, 1>::from_floats([each.target as f32], device))
		.collect::<Vec<_>>();

	TrainInput {
		train_samples,
		train_targets,
		valid_tensor: Tensor::stack(valid_samples, 0),
		valid_target_tensor: Tensor::stack(valid_targets, 0),
	}
}

/// Runs the epoch loop. `on_epoch` sees every epoch's metrics in order and
/// `is_cancelled` is polled before each epoch starts.
pub(super) fn train_new_model<B: AutodiffBackend>(
	input: TrainInput<B>,
	config: &TrainingConfig,
	device: &B::Device,
	mut on_epoch: impl FnMut(&EpochMetrics),
	is_cancelled: impl Fn() -> bool,
) -> Result<FitOutcome<B>> {
	let seed = config.seed.unwrap_or_else(rand::random);
	B::seed(seed);
	let mut rng = StdRng::seed_from_u64(seed);

	let mut model = config.model.init::<B>(device);
	let mut optim = config.optimizer.init::<B, LstmNetwork<B>>();

	let mut order = (0..input.train_samples.len()).collect::<Vec<_>>();
	let mut metrics = Vec::<EpochMetrics>::with_capacity(config.epochs);
	let mut summary = TrainingSummary::default();
	let mut best: Option<(EpochMetrics, LstmNetwork<B::InnerBackend>)> = None;
	let mut epochs_without_improvement = 0usize;

	for epoch in 1..=config.epochs {
		if is_cancelled() {
			info!(epoch, "training cancelled");
			summary.cancelled = true;
			break;
		}

		// Training phase, batches are reshuffled every epoch but only among
		// training samples
		order.shuffle(&mut rng);
		let mut loss_sum = 0f64;
		for batch in order.chunks(config.batch_size) {
			let inputs: Tensor<B, 3> = Tensor::stack(
				batch
					.iter()
					.map(|index| input.train_samples[*index].clone())
					.collect(),
				0,
			);
			let targets: Tensor<B, 2> = Tensor::stack(
				batch
					.iter()
					.map(|index| input.train_targets[*index].clone())
					.collect(),
				0,
			);

			let output = model.forward(&inputs, None).0;
			let loss = MseLoss::new().forward(output, targets, Mean);
			let batch_loss = loss.clone().into_scalar().elem::<f64>();
			if !batch_loss.is_finite() {
				return Err(Error::TrainingDiverged { epoch });
			}

			// Gradients linked to each parameter of the model
			let grads = GradientsParams::from_grads(loss.backward(), &model);
			model = optim.step(config.learning_rate, model, grads);

			loss_sum += batch_loss * batch.len() as f64;
		}

		// Validation phase
		let valid_model = model.valid();
		let output = valid_model.forward(&input.valid_tensor, None).0;
		let validation_loss = MseLoss::new()
			.forward(output, input.valid_target_tensor.clone(), Mean)
			.into_scalar()
			.elem::<f64>();
		if !validation_loss.is_finite() {
			return Err(Error::TrainingDiverged { epoch });
		}

		let epoch_metrics = EpochMetrics {
			epoch,
			loss: loss_sum / order.len() as f64,
			validation_loss,
		};
		info!(
			epoch,
			epochs = config.epochs,
			loss = epoch_metrics.loss,
			validation_loss,
			"epoch finished"
		);
		metrics.push(epoch_metrics);
		summary.epochs_run = epoch;
		on_epoch(&epoch_metrics);

		let improved = best
			.as_ref()
			.is_none_or(|(found, _)| validation_loss < found.validation_loss - config.min_delta);
		if improved {
			best = Some((epoch_metrics, valid_model));
			epochs_without_improvement = 0;
		} else {
			epochs_without_improvement += 1;
			if let Some(patience) = config.early_stopping_patience {
				if epochs_without_improvement >= patience {
					info!(epoch, patience, "early stopping, validation loss stalled");
					summary.stopped_early = true;
					break;
				}
			}
		}
	}

	summary.best_epoch = best.as_ref().map(|(found, _)| found.epoch);
	summary.best_validation_loss = best.as_ref().map(|(found, _)| found.validation_loss);

	// Early stopping and cancellation hand back the best epoch, a full run
	// hands back the last one
	let prefer_best = config.early_stopping_patience.is_some() || summary.cancelled;
	let model = match best {
		Some((found, best_model)) if prefer_best => {
			debug!(epoch = found.epoch, "restoring best epoch parameters");
			best_model
		}
		_ => model.valid(),
	};

	Ok(FitOutcome {
		model,
		metrics,
		summary,
	})
}
