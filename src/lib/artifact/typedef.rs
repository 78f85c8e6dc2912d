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
	backend::ndarray::NdArrayDevice,
	module::Module,
	record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scaler::ScalerState;
use crate::train::{
	model::{LstmNetwork, LstmNetworkConfig},
	typedef::{EpochMetrics, TrainingResult},
};
use crate::typedef::InferenceBackend;

/// Trained weights paired with the scaler they were trained against.
/// Immutable once created, retraining produces a new one.
#[derive(Clone, Debug)]
pub struct ModelArtifact {
	/// Opaque serialized network parameters
	pub weights: Vec<u8>,
	pub hidden_size: usize,
	pub scaler: ScalerState,
	pub input_timesteps: usize,
	pub trained_at: DateTime<Utc>,
	/// Name of the dataset the model was trained on
	pub source: String,
	pub metrics: Vec<EpochMetrics>,
}

impl ModelArtifact {
	pub fn from_training(result: &TrainingResult, source: &str) -> Result<Self> {
		let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
		let weights =
			Recorder::<InferenceBackend>::record(&recorder, result.model.clone().into_record(), ())
				.map_err(|err| Error::Weights(err.to_string()))?;

		Ok(Self {
			weights,
			hidden_size: result.model_config.hidden_size,
			scaler: result.scaler,
			input_timesteps: result.timesteps,
			trained_at: Utc::now(),
			source: source.to_string(),
			metrics: result.metrics.clone(),
		})
	}

	pub fn model_config(&self) -> LstmNetworkConfig {
		LstmNetworkConfig::new().with_hidden_size(self.hidden_size)
	}

	/// Rebuilds the network from the stored weights.
	pub fn network(&self) -> Result<LstmNetwork<InferenceBackend>> {
		let device = NdArrayDevice::Cpu;
		let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
		let record = Recorder::<InferenceBackend>::load(&recorder, self.weights.clone(), &device)
			.map_err(|err| Error::Weights(err.to_string()))?;

		Ok(self
			.model_config()
			.init::<InferenceBackend>(&device)
			.load_record(record))
	}
}

pub(super) const FORMAT_VERSION: u32 = 1;

/// On-disk layout: the checksum covers `payload` byte for byte.
#[derive(Serialize, Deserialize)]
pub(super) struct ArtifactEnvelope {
	pub format_version: u32,
	pub checksum: String,
	pub payload: Vec<u8>,
}

/// Either half of the weights/scaler pair may be absent in a damaged file,
/// which makes the whole artifact corrupt.
#[derive(Serialize, Deserialize)]
pub(super) struct ArtifactPayload {
	pub weights: Option<Vec<u8>>,
	pub scaler: Option<ScalerState>,
	pub hidden_size: usize,
	pub input_timesteps: usize,
	pub trained_at: DateTime<Utc>,
	pub source: String,
	pub metrics: Vec<EpochMetrics>,
}
