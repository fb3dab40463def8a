/// Logic for reading ranking runs exported by the search engine.
///
/// The engine indexes each city's corpus and answers the evaluation terms;
/// its answers are written as JSON lines, one record per (city, term).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::corpus::CityLayout;
use crate::eval::{Indexer, RankedBusiness, Ranker};
use crate::io::{make_progress, open_gzin};
use crate::records::JsonLines;

/// Ranked results for one term in one city.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RunRecord {
  pub city: String,
  pub term: String,
  pub results: Vec<RankedBusiness>,
}

impl RunRecord {
  /// Read run records from a JSON-lines file.
  pub fn read_jsonl<P: AsRef<Path>>(path: P) -> Result<Vec<RunRecord>> {
    let path = path.as_ref();
    let pb = make_progress();
    pb.set_prefix("runs");
    read_runs(path, &pb)
  }
}

fn read_runs(path: &Path, pb: &ProgressBar) -> Result<Vec<RunRecord>> {
  let read = open_gzin(path, pb)?;
  let mut runs = Vec::new();
  for record in JsonLines::new(path, read) {
    runs.push(record?);
  }
  pb.finish_and_clear();
  Ok(runs)
}

/// Serves a city's rankings from a run file.
pub struct RunFileRanker {
  city: String,
  by_term: HashMap<String, Vec<RankedBusiness>>,
}

impl RunFileRanker {
  pub fn new<I: IntoIterator<Item = RunRecord>>(city: &str, runs: I) -> RunFileRanker {
    let mut by_term = HashMap::new();
    for run in runs.into_iter().filter(|r| r.city == city) {
      by_term.insert(run.term, run.results);
    }
    RunFileRanker { city: city.to_owned(), by_term }
  }

  pub fn terms(&self) -> usize {
    self.by_term.len()
  }
}

impl Ranker for RunFileRanker {
  fn find_restaurants(&self, term: &str) -> Result<Vec<RankedBusiness>> {
    match self.by_term.get(term) {
      Some(results) => Ok(results.clone()),
      None => bail!("run file has no ranking for {:?} in {}", term, self.city),
    }
  }
}

/// Indexer backed by a run file.  "Indexing" a city checks that its corpus
/// was built and loads the city's runs.
pub struct RunFileIndexer {
  pub path: PathBuf,
}

impl RunFileIndexer {
  pub fn new<P: AsRef<Path>>(path: P) -> RunFileIndexer {
    RunFileIndexer { path: path.as_ref().to_owned() }
  }
}

impl Indexer for RunFileIndexer {
  fn index(&self, layout: &CityLayout) -> Result<Box<dyn Ranker>> {
    if !layout.is_complete() {
      bail!("corpus for {} is incomplete in {:?}", layout.city, layout.path);
    }
    let runs = RunRecord::read_jsonl(&self.path)?;
    let ranker = RunFileRanker::new(&layout.city, runs);
    info!("loaded runs for {} terms in {}", ranker.terms(), layout.city);
    Ok(Box::new(ranker))
  }
}
