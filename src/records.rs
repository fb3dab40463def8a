/// Reading business and review records from a Yelp dataset download.

use std::io::prelude::*;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::fs::read_dir;

use anyhow::{anyhow, Result};
use indicatif::ProgressBar;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PipelineError;
use crate::io::{make_progress, open_gzin};

/// A business from the dataset's business file.
///
/// Fields the pipeline does not interpret are kept in `extra` so the
/// persisted restaurant list carries the full record.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BusinessRecord {
  pub business_id: String,
  pub city: String,
  #[serde(default)]
  pub categories: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl BusinessRecord {
  /// Iterate over the trimmed category tags, original case.
  pub fn category_tags(&self) -> impl Iterator<Item = &str> {
    self.categories.as_deref().unwrap_or("").split(',').map(str::trim)
  }
}

/// A raw review line.  Only the fields the corpus needs are decoded; the
/// rest of the record is ignored by the deserializer.
#[derive(Debug, Deserialize, Clone)]
pub struct RawReview {
  pub business_id: String,
  pub stars: f64,
  pub text: String,
}

/// A review retained for the corpus.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReviewRecord {
  pub business_id: String,
  pub stars: f64,
  pub text: String,
}

impl From<RawReview> for ReviewRecord {
  fn from(raw: RawReview) -> ReviewRecord {
    ReviewRecord {
      business_id: raw.business_id,
      stars: raw.stars,
      text: raw.text,
    }
  }
}

/// Iterator decoding one JSON record per line, in file order.
///
/// A line that does not parse yields a `StreamParse` error; callers are
/// expected to stop at the first error.
pub struct JsonLines<T, R> {
  path: PathBuf,
  lines: std::io::Lines<R>,
  line_no: usize,
  _marker: PhantomData<T>,
}

impl<T: DeserializeOwned, R: BufRead> JsonLines<T, R> {
  pub fn new<P: AsRef<Path>>(path: P, read: R) -> JsonLines<T, R> {
    JsonLines {
      path: path.as_ref().to_owned(),
      lines: read.lines(),
      line_no: 0,
      _marker: PhantomData,
    }
  }
}

impl<T: DeserializeOwned, R: BufRead> Iterator for JsonLines<T, R> {
  type Item = Result<T>;

  fn next(&mut self) -> Option<Result<T>> {
    let line = self.lines.next()?;
    self.line_no += 1;
    let line = match line {
      Ok(l) => l,
      Err(e) => return Some(Err(e.into())),
    };
    Some(serde_json::from_str(&line).map_err(|source| {
      PipelineError::StreamParse {
        path: self.path.clone(),
        line: self.line_no,
        source,
      }.into()
    }))
  }
}

/// The business and review files of a dataset download.
#[derive(Debug, Clone)]
pub struct RecordStore {
  pub path: PathBuf,
  pub business_file: PathBuf,
  pub review_file: PathBuf,
}

impl RecordStore {
  /// Locate the record files in a dataset directory.
  ///
  /// Files are matched by suffix (`business.json`, `review.json`, with an
  /// optional `.gz`), so both `yelp_academic_dataset_business.json` and a
  /// bare `business.json` are found.
  pub fn open<P: AsRef<Path>>(path: P) -> Result<RecordStore> {
    let path = path.as_ref();
    if !path.is_dir() {
      return Err(PipelineError::ConfigurationAbsence {
        what: "dataset directory",
        detail: format!("{:?} does not exist", path),
      }.into());
    }
    let pat = Regex::new(r"^(?:.*_)?(business|review)\.json(?:\.gz)?$")?;
    let mut business = None;
    let mut review = None;
    let mut kids: Vec<PathBuf> = Vec::new();
    for kid in read_dir(path)? {
      kids.push(kid?.path());
    }
    // deterministic pick when several candidates exist
    kids.sort();
    for kid in kids {
      let name = match kid.file_name().and_then(|n| n.to_str()) {
        Some(n) => n.to_owned(),
        None => continue,
      };
      if let Some(caps) = pat.captures(&name) {
        let slot = if &caps[1] == "business" { &mut business } else { &mut review };
        if slot.is_none() {
          *slot = Some(kid);
        }
      }
    }

    let business_file = business.ok_or_else(|| anyhow!(PipelineError::ConfigurationAbsence {
      what: "business file",
      detail: format!("no business.json in {:?}", path),
    }))?;
    let review_file = review.ok_or_else(|| anyhow!(PipelineError::ConfigurationAbsence {
      what: "review file",
      detail: format!("no review.json in {:?}", path),
    }))?;

    Ok(RecordStore {
      path: path.to_owned(),
      business_file,
      review_file,
    })
  }

  /// Stream business records in file order.
  pub fn businesses(&self) -> Result<JsonLines<BusinessRecord, Box<dyn BufRead>>> {
    stream(&self.business_file, "business")
  }

  /// Stream raw review records in file order.
  pub fn reviews(&self) -> Result<JsonLines<RawReview, Box<dyn BufRead>>> {
    stream(&self.review_file, "reviews")
  }
}

fn stream<T: DeserializeOwned>(path: &Path, prefix: &str) -> Result<JsonLines<T, Box<dyn BufRead>>> {
  let pb = progress_for(prefix);
  let read = open_gzin(path, &pb)?;
  Ok(JsonLines::new(path, read))
}

fn progress_for(prefix: &str) -> ProgressBar {
  let pb = make_progress();
  pb.set_prefix(prefix);
  pb
}
