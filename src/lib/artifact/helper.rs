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

use sha2::{Digest, Sha256};

use super::typedef::*;
use crate::scaler::ScalerState;

pub(super) fn checksum(bytes: &[u8]) -> String {
	format!("{:x}", Sha256::digest(bytes))
}

pub(super) fn encode(artifact: &ModelArtifact) -> Result<Vec<u8>, String> {
	let payload = bincode::serialize(&ArtifactPayload {
		weights: Some(artifact.weights.clone()),
		scaler: Some(artifact.scaler),
		hidden_size: artifact.hidden_size,
		input_timesteps: artifact.input_timesteps,
		trained_at: artifact.trained_at,
		source: artifact.source.clone(),
		metrics: artifact.metrics.clone(),
	})
	.map_err(|err| err.to_string())?;

	bincode::serialize(&ArtifactEnvelope {
		format_version: FORMAT_VERSION,
		checksum: checksum(&payload),
		payload,
	})
	.map_err(|err| err.to_string())
}

/// Decodes and verifies an artifact, any failure is described as the reason
/// it is corrupt.
pub(super) fn decode(bytes: &[u8]) -> Result<ModelArtifact, String> {
	let envelope = bincode::deserialize::<ArtifactEnvelope>(bytes)
		.map_err(|err| format!("unreadable envelope ({})", err))?;

	if envelope.format_version != FORMAT_VERSION {
		return Err(format!(
			"unsupported format version {}",
			envelope.format_version
		));
	}

	if checksum(&envelope.payload) != envelope.checksum {
		return Err(String::from("checksum mismatch"));
	}

	let payload = bincode::deserialize::<ArtifactPayload>(&envelope.payload)
		.map_err(|err| format!("unreadable payload ({})", err))?;

	let (weights, scaler) = match (payload.weights, payload.scaler) {
		(Some(weights), Some(scaler)) => (weights, scaler),
		(Some(_), None) => return Err(String::from("weights are stored without a scaler")),
		(None, Some(_)) => return Err(String::from("scaler is stored without weights")),
		(None, None) => return Err(String::from("neither weights nor scaler are stored")),
	};

	validate_scaler(&scaler)?;
	if payload.input_timesteps == 0 || payload.hidden_size == 0 {
		return Err(String::from("model dimensions are zero"));
	}

	Ok(ModelArtifact {
		weights,
		hidden_size: payload.hidden_size,
		scaler,
		input_timesteps: payload.input_timesteps,
		trained_at: payload.trained_at,
		source: payload.source,
		metrics: payload.metrics,
	})
}

fn validate_scaler(scaler: &ScalerState) -> Result<(), String> {
	if scaler.min.is_finite() && scaler.max.is_finite() && scaler.min < scaler.max {
		Ok(())
	} else {
		Err(format!(
			"scaler range [{}, {}] is unusable",
			scaler.min, scaler.max
		))
	}
}
