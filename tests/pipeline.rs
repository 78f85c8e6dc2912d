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

use chrono::{Days, NaiveDate};
use market_trend_lib::{
	train::{model::LstmNetworkConfig, typedef::TrainingConfig},
	window::typedef::WindowConfig,
	Error, PipelineConfig, Session, SourceFile, TrainEvent,
};
use std::path::Path;

fn price_csv(days: u64) -> SourceFile {
	let first = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
	let mut text = String::from("Date,Open,High,Low,Close,Volume\n");
	for index in 0..days {
		let close = 120.0 + (index as f64 * 0.25).sin() * 15.0 + index as f64 * 0.1;
		text.push_str(&format!(
			"{},{:.2},{:.2},{:.2},{:.2},1000\n",
			first + Days::new(index),
			close - 1.0,
			close + 2.0,
			close - 2.0,
			close
		));
	}

	SourceFile::new("prices.csv", text.into_bytes())
}

fn tiny_config(artifact_dir: &Path) -> PipelineConfig {
	PipelineConfig::new()
		.with_window(WindowConfig::new().with_timesteps(6))
		.with_training(
			TrainingConfig::new()
				.with_model(LstmNetworkConfig::new().with_hidden_size(4))
				.with_epochs(3)
				.with_batch_size(16)
				.with_learning_rate(1e-2)
				.with_seed(Some(11)),
		)
		.with_artifact_path(artifact_dir.join("model.artifact"))
		.with_backtest_steps(5)
}

#[tokio::test]
async fn ingest_train_predict_and_reset() {
	let dir = tempfile::tempdir().unwrap();
	let session = Session::new(tiny_config(dir.path())).unwrap();

	let outcomes = session
		.ingest(vec![
			price_csv(80),
			SourceFile::new("notes.txt", b"hello".to_vec()),
		])
		.await
		.unwrap();

	assert_eq!(outcomes.len(), 2);
	assert!(outcomes[0].result.is_ok());
	assert!(matches!(outcomes[1].result, Err(Error::Ingest { .. })));
	assert_eq!(session.dataset_names().unwrap(), vec!["prices.csv"]);

	// Nothing trained yet
	assert!(matches!(
		session.predict("prices.csv", 5).await,
		Err(Error::ArtifactNotFound { .. })
	));

	let mut handle = session.train("prices.csv").unwrap();
	let mut epochs = Vec::new();
	while let Some(event) = handle.next_event().await {
		match event {
			TrainEvent::Epoch(metrics) => epochs.push(metrics.epoch),
			TrainEvent::Finished(_) => break,
			TrainEvent::Failed(info) => panic!("{}", info.message),
		}
	}
	assert_eq!(epochs, vec![1, 2, 3]);

	let (summary, artifact) = session.finish_training(handle).await.unwrap();
	assert_eq!(summary.epochs_run, 3);
	let artifact = artifact.unwrap();
	assert_eq!(artifact.input_timesteps, 6);
	assert_eq!(artifact.source, "prices.csv");
	assert!(dir.path().join("model.artifact").exists());

	let records = session.predict("prices.csv", 5).await.unwrap();
	assert_eq!(records.len(), 5);
	let last = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap() + Days::new(79);
	assert_eq!(records[0].date, last + Days::new(1));
	assert!(records.windows(2).all(|pair| pair[0].date < pair[1].date));

	let report = session.backtest("prices.csv").await.unwrap();
	assert_eq!(report.records.len(), 6 + 5);
	assert_eq!(
		report
			.records
			.iter()
			.filter(|each| each.actual.is_some() && each.predicted.is_some())
			.count(),
		5
	);
	assert!(report.diagnostics.is_some());
	assert!(report.trend.is_some());

	// A fresh session picks the published model up from disk
	let reopened = Session::new(tiny_config(dir.path())).unwrap();
	reopened.ingest(vec![price_csv(80)]).await.unwrap();
	assert_eq!(
		reopened.predict("prices.csv", 5).await.unwrap(),
		records
	);

	assert!(session.reset_model().unwrap());
	assert!(!session.reset_model().unwrap());
	assert!(matches!(
		session.predict("prices.csv", 5).await,
		Err(Error::ArtifactNotFound { .. })
	));
}

#[tokio::test]
async fn failed_training_keeps_the_previous_model() {
	let dir = tempfile::tempdir().unwrap();
	let session = Session::new(tiny_config(dir.path())).unwrap();
	session
		.ingest(vec![price_csv(60), SourceFile::new("short.csv", "Date,Close\n2024-01-01,5\n2024-01-02,6\n")])
		.await
		.unwrap();

	let handle = session.train("prices.csv").unwrap();
	let (_, first) = session.finish_training(handle).await.unwrap();
	let first = first.unwrap();

	let handle = session.train("short.csv").unwrap();
	assert!(matches!(
		session.finish_training(handle).await,
		Err(Error::InsufficientData { .. })
	));

	let kept = session.model().await.unwrap();
	assert_eq!(kept.trained_at, first.trained_at);
	assert_eq!(kept.source, "prices.csv");
}

#[tokio::test]
async fn unknown_dataset_is_reported() {
	let dir = tempfile::tempdir().unwrap();
	let session = Session::new(tiny_config(dir.path())).unwrap();

	assert!(matches!(
		session.train("missing.csv"),
		Err(Error::DatasetNotFound(_))
	));
}

#[test]
fn invalid_config_is_rejected_up_front() {
	let config = PipelineConfig::new().with_window(WindowConfig::new().with_timesteps(0));
	assert!(matches!(Session::new(config), Err(Error::InvalidConfig(_))));
}
