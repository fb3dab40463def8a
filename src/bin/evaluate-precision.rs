/// Executable to score restaurant rankings against the reference search

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use structopt::StructOpt;
use tracing::info;

use restaurant_finder_tools::config::load_settings;
use restaurant_finder_tools::corpus::city_layouts;
use restaurant_finder_tools::eval::PrecisionEvaluator;
use restaurant_finder_tools::logging::init_logging;
use restaurant_finder_tools::reference::YelpClient;
use restaurant_finder_tools::runs::RunFileIndexer;

#[derive(Debug, StructOpt)]
#[structopt(name="evaluate-precision")]
struct EvalCommand {
  /// Path to the settings file.
  #[structopt(short="c", long="config")]
  config: Option<PathBuf>,

  /// Path to the ranking run file.
  #[structopt(short="r", long="runs")]
  runs: PathBuf,

  /// Path to write a CSV report.
  #[structopt(short="o", long="output")]
  output: Option<PathBuf>,
}

fn main() -> Result<()> {
  init_logging();
  let cmd = EvalCommand::from_args();
  let settings = load_settings(cmd.config.as_deref())?;

  let reference = YelpClient::from_env(settings.reference.clone())?;
  let indexer = RunFileIndexer::new(&cmd.runs);
  let evaluator = PrecisionEvaluator::new(settings.search_terms.clone(), settings.search_result_count);

  let layouts = city_layouts(&settings.output_dir, &settings.cities)?;

  let report = evaluator.evaluate(layouts, &indexer, &reference)?;
  info!("mean of {} search terms precision in each city:", settings.search_terms.len());
  for line in report.summary().lines() {
    info!("{}", line);
  }

  if let Some(ref path) = cmd.output {
    let out = File::create(path).with_context(|| format!("cannot create {:?}", path))?;
    report.write_csv(out)?;
    info!("wrote report to {:?}", path);
  }
  Ok(())
}
