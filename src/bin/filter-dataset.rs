/// Executable to build per-city restaurant review corpora

use std::path::PathBuf;
use std::process::exit;

use anyhow::Result;
use structopt::StructOpt;
use tracing::{error, info};

use restaurant_finder_tools::config::load_settings;
use restaurant_finder_tools::corpus::city_layouts;
use restaurant_finder_tools::logging::init_logging;
use restaurant_finder_tools::pipeline::{filter_city, FilterOptions};
use restaurant_finder_tools::records::RecordStore;
use restaurant_finder_tools::reference::YelpClient;

#[derive(Debug, StructOpt)]
#[structopt(name="filter-dataset")]
struct FilterCommand {
  /// Path to the full dataset directory.
  #[structopt(short="p", long="dataset-dirpath", default_value="../../yelp_dataset")]
  dataset_path: PathBuf,

  /// Review limit per restaurant.
  #[structopt(long="review-limit")]
  review_limit: Option<usize>,

  /// Review character length limit.
  #[structopt(long="review-length-limit")]
  review_length_limit: Option<usize>,

  /// Skip cleaning of existing filtered dataset.
  #[structopt(long="skip-clean")]
  skip_clean: bool,

  /// Path to the settings file.
  #[structopt(short="c", long="config")]
  config: Option<PathBuf>,
}

fn main() -> Result<()> {
  init_logging();
  let cmd = FilterCommand::from_args();

  if !cmd.dataset_path.exists() {
    error!("dataset path {:?} does not exist, exiting", cmd.dataset_path);
    exit(1);
  }

  let mut settings = load_settings(cmd.config.as_deref())?;
  if let Some(n) = cmd.review_limit {
    settings.review_limit = n;
  }
  if let Some(n) = cmd.review_length_limit {
    settings.review_length_limit = n;
  }

  let layouts = city_layouts(&settings.output_dir, &settings.cities)?;
  let store = RecordStore::open(&cmd.dataset_path)?;
  let reference = YelpClient::from_env(settings.reference.clone())?;
  let options = FilterOptions {
    review_limit: settings.review_limit,
    corpus: settings.corpus_options(),
    skip_clean: cmd.skip_clean,
  };

  for layout in &layouts {
    let done = filter_city(&store, layout, &reference, &options)?;
    info!("{}: {} restaurants, {} overlapping, {} reviews, {} corpus lines",
          done.city, done.restaurants, done.overlap, done.reviews, done.corpus_lines);
  }
  Ok(())
}
