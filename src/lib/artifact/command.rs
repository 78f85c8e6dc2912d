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
	fs,
	io::{ErrorKind, Write},
	path::Path,
};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::helper::*;
use super::typedef::*;
use crate::error::{Error, Result};

fn parent_dir(path: &Path) -> &Path {
	path.parent()
		.filter(|found| !found.as_os_str().is_empty())
		.unwrap_or(Path::new("."))
}

/// Writes `bytes` to a temporary file next to `destination` and renames it
/// into place, readers see either the old content or the new one in full.
pub(crate) fn write_atomically(destination: &Path, bytes: &[u8]) -> Result<()> {
	let parent = parent_dir(destination);
	fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;

	let mut staged = NamedTempFile::new_in(parent).map_err(|err| Error::io(parent, err))?;
	staged
		.write_all(bytes)
		.and_then(|_| staged.as_file().sync_all())
		.map_err(|err| Error::io(staged.path(), err))?;

	staged
		.persist(destination)
		.map_err(|err| Error::io(destination, err.error))?;
	Ok(())
}

/// Publishes `artifact` at `destination`, replacing any previous one. A
/// concurrent `load` never observes a partial write.
pub fn save(artifact: &ModelArtifact, destination: &Path) -> Result<()> {
	let bytes = encode(artifact).map_err(Error::Weights)?;
	write_atomically(destination, &bytes)?;

	info!(
		path = %destination.display(),
		bytes = bytes.len(),
		trained_at = %artifact.trained_at,
		"model artifact published"
	);
	Ok(())
}

pub fn load(source: &Path) -> Result<ModelArtifact> {
	let bytes = match fs::read(source) {
		Ok(ok) => ok,
		Err(err) if err.kind() == ErrorKind::NotFound => {
			return Err(Error::ArtifactNotFound {
				path: source.to_path_buf(),
			})
		}
		Err(err) => return Err(Error::io(source, err)),
	};

	let corrupt = |reason: String| Error::ArtifactCorrupt {
		path: source.to_path_buf(),
		reason,
	};

	let artifact = decode(&bytes).map_err(corrupt)?;
	// Weights that do not fit the stored dimensions are as bad as a checksum
	// mismatch
	artifact
		.network()
		.map_err(|err| corrupt(err.to_string()))?;

	debug!(
		path = %source.display(),
		source = artifact.source.as_str(),
		trained_at = %artifact.trained_at,
		"model artifact loaded"
	);
	Ok(artifact)
}

/// Removes the artifact, returns whether there was one.
pub fn delete(path: &Path) -> Result<bool> {
	match fs::remove_file(path) {
		Ok(()) => {
			info!(path = %path.display(), "model artifact deleted");
			Ok(true)
		}
		Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
		Err(err) => Err(Error::io(path, err)),
	}
}

#[cfg(test)]
mod tests {
	use burn::backend::ndarray::NdArrayDevice;
	use std::{sync::Arc, thread};

	use super::*;
	use crate::scaler::ScalerState;
	use crate::train::{
		model::{LstmNetwork, LstmNetworkConfig},
		typedef::{EpochMetrics, TrainingResult, TrainingSummary},
	};
	use crate::typedef::InferenceBackend;

	fn trained(loss: f64) -> ModelArtifact {
		let model_config = LstmNetworkConfig::new().with_hidden_size(4);
		let model: LstmNetwork<InferenceBackend> = model_config.init(&NdArrayDevice::Cpu);
		let metrics = vec![EpochMetrics {
			epoch: 1,
			loss,
			validation_loss: loss,
		}];

		ModelArtifact::from_training(
			&TrainingResult {
				model,
				model_config,
				scaler: ScalerState {
					min: 10.0,
					max: 20.0,
				},
				timesteps: 5,
				metrics,
				summary: TrainingSummary::default(),
			},
			"prices.csv",
		)
		.unwrap()
	}

	#[test]
	fn saved_artifact_loads_back() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("model.artifact");
		let artifact = trained(0.5);

		save(&artifact, &path).unwrap();
		let loaded = load(&path).unwrap();

		assert_eq!(loaded.weights, artifact.weights);
		assert_eq!(loaded.scaler, artifact.scaler);
		assert_eq!(loaded.input_timesteps, 5);
		assert_eq!(loaded.source, "prices.csv");
		assert_eq!(loaded.metrics, artifact.metrics);
		assert!(loaded.network().is_ok());
	}

	#[test]
	fn missing_artifact_is_not_found() {
		let dir = tempfile::tempdir().unwrap();
		assert!(matches!(
			load(&dir.path().join("model.artifact")),
			Err(Error::ArtifactNotFound { .. })
		));
	}

	#[test]
	fn garbage_is_corrupt() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.artifact");
		fs::write(&path, b"half written garbage").unwrap();

		assert!(matches!(load(&path), Err(Error::ArtifactCorrupt { .. })));
	}

	#[test]
	fn delete_is_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.artifact");
		save(&trained(0.5), &path).unwrap();

		assert!(delete(&path).unwrap());
		assert!(!delete(&path).unwrap());
		assert!(matches!(load(&path), Err(Error::ArtifactNotFound { .. })));
	}

	#[test]
	fn retraining_replaces_the_artifact() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.artifact");
		save(&trained(0.5), &path).unwrap();
		save(&trained(0.25), &path).unwrap();

		assert_eq!(load(&path).unwrap().metrics[0].loss, 0.25);
		// No staging files are left behind
		assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
	}

	#[test]
	fn concurrent_load_never_sees_a_partial_save() {
		let dir = tempfile::tempdir().unwrap();
		let path = Arc::new(dir.path().join("model.artifact"));
		let old = trained(1.0);
		let new = trained(2.0);
		save(&old, &path).unwrap();

		let writer = {
			let path = path.clone();
			thread::spawn(move || {
				for round in 0..40 {
					let artifact = if round % 2 == 0 { &new } else { &old };
					save(artifact, &path).unwrap();
				}
			})
		};

		let readers = (0..2)
			.map(|_| {
				let path = path.clone();
				thread::spawn(move || {
					for _ in 0..40 {
						let loaded = load(&path).expect("load must see a complete artifact");
						let loss = loaded.metrics[0].loss;
						assert!(loss == 1.0 || loss == 2.0);
					}
				})
			})
			.collect::<Vec<_>>();

		writer.join().unwrap();
		for reader in readers {
			reader.join().unwrap();
		}
	}
}
