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
	grad_clipping::GradientClippingConfig,
	optim::AdamConfig,
	tensor::{backend::AutodiffBackend, Tensor},
};
use serde::{Deserialize, Serialize};
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};

use super::model::*;
use crate::error::{Error, Result};
use crate::scaler::ScalerState;
use crate::typedef::{ErrorInfo, InferenceBackend};

#[derive(burn::config::Config)]
pub struct TrainingConfig {
	#[config(default = "LstmNetworkConfig::new()")]
	pub model: LstmNetworkConfig,

	// Gradient clipping via optimizer config
	#[config(default = "AdamConfig::new().with_grad_clipping(Some(GradientClippingConfig::Norm(1.0)))")]
	pub optimizer: AdamConfig,

	#[config(default = 50)]
	pub epochs: usize,

	#[config(default = 32)]
	pub batch_size: usize,

	#[config(default = 1e-3)]
	pub learning_rate: f64,

	/// Stop after this many epochs without validation improvement
	pub early_stopping_patience: Option<usize>,

	/// Minimum drop in validation loss that counts as an improvement
	#[config(default = 0.0)]
	pub min_delta: f64,

	/// Fixes parameter init and batch shuffling when set
	pub seed: Option<u64>,
}

impl TrainingConfig {
	pub fn validate(&self) -> Result<()> {
		let problem = if self.epochs == 0 {
			Some(String::from("epochs must be at least 1"))
		} else if self.batch_size == 0 {
			Some(String::from("batch_size must be at least 1"))
		} else if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
			Some(format!("learning_rate must be positive, got {}", self.learning_rate))
		} else if self.early_stopping_patience == Some(0) {
			Some(String::from("early_stopping_patience must be at least 1"))
		} else if self.min_delta < 0.0 {
			Some(String::from("min_delta cannot be negative"))
		} else if self.model.hidden_size == 0 {
			Some(String::from("hidden_size must be at least 1"))
		} else {
			None
		};

		match problem {
			Some(message) => Err(Error::InvalidConfig(message)),
			None => Ok(()),
		}
	}
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EpochMetrics {
	pub epoch: usize,
	pub loss: f64,
	pub validation_loss: f64,
}

#[derive(Default, Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSummary {
	pub epochs_run: usize,
	pub best_epoch: Option<usize>,
	pub best_validation_loss: Option<f64>,
	pub stopped_early: bool,
	pub cancelled: bool,
}

/// Progress stream item. Every `Epoch` arrives in epoch order and the stream
/// ends with exactly one `Finished` or `Failed`.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum TrainEvent {
	Epoch(EpochMetrics),
	Finished(TrainingSummary),
	Failed(ErrorInfo),
}

/// Cooperative cancellation flag, checked by the trainer between epochs.
#[derive(Default, Clone, Debug)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// Trained parameters together with everything needed to reproduce
/// predictions from them.
#[derive(Clone, Debug)]
pub struct TrainingResult {
	pub model: LstmNetwork<InferenceBackend>,
	pub model_config: LstmNetworkConfig,
	pub scaler: ScalerState,
	pub timesteps: usize,
	pub metrics: Vec<EpochMetrics>,
	pub summary: TrainingSummary,
}

pub(super) struct TrainInput<B: AutodiffBackend> {
	pub train_samples: Vec<Tensor<B, 2>>,
	pub train_targets: Vec<Tensor<B, 1>>,
	pub valid_tensor: Tensor<B::InnerBackend, 3>,
	pub valid_target_tensor: Tensor<B::InnerBackend, 2>,
}

pub(super) struct FitOutcome<B: AutodiffBackend> {
	pub model: LstmNetwork<B::InnerBackend>,
	pub metrics: Vec<EpochMetrics>,
	pub summary: TrainingSummary,
}
