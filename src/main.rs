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

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use market_trend_lib::{
	ingest::typedef::IngestReport, predict::command::export_csv, PipelineConfig, Session,
	SourceFile, TrainEvent,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "market-trend", version, about = "Forecast daily closes with an LSTM")]
struct Cli {
	/// JSON pipeline config, defaults apply when the file does not exist
	#[arg(long, global = true, default_value = "market-trend.json")]
	config: PathBuf,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Parse and clean historical data files, then summarize them
	Ingest {
		#[arg(required = true)]
		files: Vec<PathBuf>,
	},
	/// Train on one file and publish the model artifact
	Train { file: PathBuf },
	/// Forecast past the end of a file with the published model
	Predict {
		file: PathBuf,

		#[arg(long, default_value_t = 5)]
		horizon: usize,

		/// Score the model on the file's trailing observations instead
		#[arg(long)]
		backtest: bool,

		/// Also write the report as CSV
		#[arg(long)]
		export: Option<PathBuf>,
	},
	/// Delete the published model artifact
	Reset,
}

/// Ingests a single file and returns the name it is registered under.
async fn ingest_one(session: &Session, path: &Path) -> Result<String> {
	let file = SourceFile::read(path)?;
	let name = file.name.clone();

	for outcome in session.ingest(vec![file]).await? {
		if let Err(err) = outcome.result {
			bail!(err.info().message);
		}
	}

	Ok(name)
}

fn describe(report: &IngestReport) -> String {
	let records = report.dataset.records();
	match (records.first(), records.last()) {
		(Some(first), Some(last)) => format!(
			"{} records from {} to {}, {} dropped, {} duplicate dates collapsed",
			records.len(),
			first.date,
			last.date,
			report.dropped_rows,
			report.collapsed_duplicates
		),
		_ => String::from("no records"),
	}
}

async fn train(session: &Session, path: &Path) -> Result<()> {
	let name = ingest_one(session, path).await?;
	let mut handle = session.train(&name)?;
	let cancel = handle.cancel_token();

	let mut interrupted = false;
	loop {
		tokio::select! {
			event = handle.next_event() => match event {
				Some(TrainEvent::Epoch(metrics)) => println!(
					"epoch {:>4}  loss {:.6}  validation {:.6}",
					metrics.epoch, metrics.loss, metrics.validation_loss
				),
				Some(TrainEvent::Finished(_)) | Some(TrainEvent::Failed(_)) | None => break,
			},
			_ = tokio::signal::ctrl_c(), if !interrupted => {
				info!("interrupt received, stopping after the current epoch");
				interrupted = true;
				cancel.cancel();
			}
		}
	}

	let (summary, artifact) = session.finish_training(handle).await.map_err(|err| {
		anyhow::anyhow!(err.info().message)
	})?;
	println!("{}", serde_json::to_string_pretty(&summary)?);

	match artifact {
		Some(_) => println!(
			"model published at {}",
			session.config().artifact_path.display()
		),
		None => println!("no epoch completed, previous model kept"),
	}
	Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::registry()
		.with(fmt::layer())
		.with(
			EnvFilter::from_default_env()
				.add_directive("market_trend=info".parse()?)
				.add_directive("market_trend_lib=info".parse()?),
		)
		.init();

	let cli = Cli::parse();
	let config = PipelineConfig::load_or_default(&cli.config)
		.with_context(|| format!("cannot load config {}", cli.config.display()))?;
	let session = Session::new(config)?;

	match cli.command {
		Commands::Ingest { files } => {
			for outcome in session.ingest_paths(files).await? {
				match outcome.result {
					Ok(report) => println!("{}: {}", outcome.file, describe(&report)),
					Err(err) => {
						let info = err.info();
						eprintln!("{}: {}: {}", outcome.file, info.title, info.message)
					}
				}
			}
		}
		Commands::Train { file } => train(&session, &file).await?,
		Commands::Predict {
			file,
			horizon,
			backtest,
			export,
		} => {
			let name = ingest_one(&session, &file).await?;
			let report = if backtest {
				session.backtest(&name).await
			} else {
				session.forecast(&name, horizon).await
			}
			.map_err(|err| anyhow::anyhow!(err.info().message))?;

			println!("{}", serde_json::to_string_pretty(&report)?);
			if let Some(destination) = export {
				export_csv(&report, &destination)?;
			}
		}
		Commands::Reset => {
			if session.reset_model()? {
				println!("model deleted");
			} else {
				println!("no model to delete");
			}
		}
	}

	Ok(())
}
