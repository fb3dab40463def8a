// Per-city corpus layout and writing

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::fs::{create_dir_all, remove_file};

use anyhow::{Context, Result};
use glob::glob;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::io::{count_lines, write_bytes, write_lines};
use crate::restaurants::RestaurantSet;
use crate::reviews::PerBusinessReviews;
use crate::transform::{Corpus, CorpusOptions};

/// Corpus format declared to the indexing engine.
pub const LINE_CORPUS: &str = "line-corpus";

/// Descriptor file telling the indexer how to read the corpus.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CorpusDescriptor {
  #[serde(rename = "type")]
  pub kind: String,
}

impl Default for CorpusDescriptor {
  fn default() -> CorpusDescriptor {
    CorpusDescriptor { kind: LINE_CORPUS.to_owned() }
  }
}

/// File layout of one city's filtered dataset.
#[derive(Debug, Clone)]
pub struct CityLayout {
  pub city: String,
  pub path: PathBuf,
}

impl CityLayout {
  /// Layout for `city` under an output directory.
  pub fn for_city<P: AsRef<Path>>(output_dir: P, city: &str) -> Result<CityLayout> {
    Ok(CityLayout {
      city: city.to_owned(),
      path: output_dir.as_ref().join(city_slug(city)?),
    })
  }

  pub fn restaurants_file(&self) -> PathBuf {
    self.path.join("restaurants.json")
  }

  pub fn restaurant_index_file(&self) -> PathBuf {
    self.path.join("restaurant_idx.json")
  }

  pub fn business_ids_file(&self) -> PathBuf {
    self.path.join("review_biz_ids.txt")
  }

  pub fn corpus_dir(&self) -> PathBuf {
    self.path.join("review")
  }

  pub fn corpus_file(&self) -> PathBuf {
    self.corpus_dir().join("review.dat")
  }

  pub fn descriptor_file(&self) -> PathBuf {
    self.corpus_dir().join("line.toml")
  }

  /// Whether all artifacts the indexer needs are present.
  pub fn is_complete(&self) -> bool {
    self.corpus_file().is_file()
      && self.descriptor_file().is_file()
      && self.business_ids_file().is_file()
  }

  /// Files currently present under the city directory.
  pub fn existing_files(&self) -> Result<Vec<PathBuf>> {
    let pat = self.path.join("**").join("*");
    let pat = pat.to_str().with_context(|| format!("non-UTF-8 path {:?}", self.path))?;
    let mut files = Vec::new();
    for entry in glob(pat)? {
      let entry = entry?;
      if entry.is_file() {
        files.push(entry);
      }
    }
    Ok(files)
  }

  /// Prepare the directories, removing earlier output unless `skip_clean`.
  pub fn prepare(&self, skip_clean: bool) -> Result<()> {
    if !skip_clean {
      let files = self.existing_files()?;
      for file in &files {
        debug!("removing {:?}", file);
        remove_file(file)?;
      }
      if !files.is_empty() {
        info!("removed {} files from {:?}", files.len(), self.path);
      }
    }
    create_dir_all(self.corpus_dir())
      .with_context(|| format!("cannot create {:?}", self.corpus_dir()))?;
    Ok(())
  }
}

/// Directory name for a city.
///
/// A readable lower-cased part is followed by a hash of the exact city
/// string, so spellings that differ only in case or punctuation get
/// separate directories, also on case-insensitive file systems.
pub fn city_slug(city: &str) -> Result<String> {
  if city.trim().is_empty() {
    return Err(PipelineError::ConfigurationAbsence {
      what: "city name",
      detail: format!("{:?} is blank", city),
    }.into());
  }
  let pat = Regex::new(r"[^0-9a-z]+")?;
  let lowered = city.to_lowercase();
  let readable = pat.replace_all(&lowered, "_");
  let readable = readable.trim_matches('_');
  let mut hasher = DefaultHasher::new();
  city.hash(&mut hasher);
  let tag = hasher.finish() as u32;
  if readable.is_empty() {
    Ok(format!("{:08x}", tag))
  } else {
    Ok(format!("{}-{:08x}", readable, tag))
  }
}

/// Layouts for several cities under one output directory.  Two cities
/// resolving to the same directory are rejected.
pub fn city_layouts<P: AsRef<Path>>(output_dir: P, cities: &[String]) -> Result<Vec<CityLayout>> {
  let mut seen: HashMap<String, &str> = HashMap::new();
  let mut layouts = Vec::with_capacity(cities.len());
  for city in cities {
    let layout = CityLayout::for_city(output_dir.as_ref(), city)?;
    let key = layout.path.to_string_lossy().to_lowercase();
    if let Some(prev) = seen.insert(key, city.as_str()) {
      return Err(PipelineError::integrity(format!(
        "cities {:?} and {:?} share the output directory {:?}", prev, city, layout.path
      )).into());
    }
    layouts.push(layout);
  }
  Ok(layouts)
}

/// Check that a corpus file has exactly `expected` lines.
pub fn verify_line_count(path: &Path, expected: usize) -> Result<usize> {
  let actual = count_lines(path)?;
  if actual != expected {
    return Err(PipelineError::integrity(format!(
      "corpus {:?} has {} lines, expected {}", path, actual, expected
    )).into());
  }
  Ok(actual)
}

/// Writes a city's restaurants and corpus.
pub struct CorpusWriter<'a> {
  layout: &'a CityLayout,
  options: CorpusOptions,
}

impl<'a> CorpusWriter<'a> {
  pub fn new(layout: &'a CityLayout, options: CorpusOptions) -> CorpusWriter<'a> {
    CorpusWriter { layout, options }
  }

  /// Persist the restaurant list and its index.
  pub fn write_restaurants(&self, set: &RestaurantSet) -> Result<()> {
    if set.len() != set.index.len() {
      return Err(PipelineError::integrity(format!(
        "{} restaurants but {} index entries", set.len(), set.index.len()
      )).into());
    }
    info!("writing {} restaurants to {:?}", set.len(), self.layout.restaurants_file());
    write_bytes(&self.layout.restaurants_file(), &serde_json::to_vec(&set.restaurants)?)?;
    write_bytes(&self.layout.restaurant_index_file(), &serde_json::to_vec(&set.index)?)?;
    Ok(())
  }

  /// Number of corpus lines the kept reviews should produce.
  pub fn expected_lines(&self, reviews: &PerBusinessReviews) -> usize {
    if self.options.combine_reviews_enabled {
      reviews.business_count()
    } else {
      reviews.review_count()
    }
  }

  /// Persist the corpus, its business ids and descriptor, then re-read the
  /// corpus to confirm its line count.  Returns the number of lines.
  pub fn write_corpus(&self, reviews: &PerBusinessReviews, corpus: &Corpus) -> Result<usize> {
    let expected = self.expected_lines(reviews);
    if corpus.lines.len() != corpus.business_ids.len() {
      return Err(PipelineError::integrity(format!(
        "{} corpus lines but {} business ids", corpus.lines.len(), corpus.business_ids.len()
      )).into());
    }
    if corpus.len() != expected {
      return Err(PipelineError::integrity(format!(
        "{} corpus lines but {} expected from reviews", corpus.len(), expected
      )).into());
    }

    info!("writing {} corpus lines to {:?}", corpus.len(), self.layout.corpus_file());
    write_lines(&self.layout.corpus_file(), &corpus.lines)?;
    write_lines(&self.layout.business_ids_file(), &corpus.business_ids)?;

    let n = verify_line_count(&self.layout.corpus_file(), expected)?;

    let desc = toml::to_string(&CorpusDescriptor::default())?;
    write_bytes(&self.layout.descriptor_file(), desc.as_bytes())?;
    Ok(n)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;
  use tempfile::tempdir;

  #[test]
  fn slugs_city_names() {
    assert!(city_slug("Las Vegas").unwrap().starts_with("las_vegas-"));
    assert!(city_slug(" St. Louis ").unwrap().starts_with("st_louis-"));
    assert_eq!(city_slug("Toronto").unwrap(), city_slug("Toronto").unwrap());
    assert!(city_slug("  ").is_err());
  }

  #[test]
  fn city_spellings_get_distinct_directories() {
    let spellings = ["Las Vegas", "las vegas", "Las-Vegas", "LAS VEGAS"];
    let slugs: HashSet<String> = spellings.iter().map(|c| city_slug(c).unwrap().to_lowercase()).collect();
    assert_eq!(slugs.len(), spellings.len());
  }

  #[test]
  fn repeated_city_is_rejected() {
    let dir = tempdir().unwrap();
    let cities = vec!["Toronto".to_string(), "Las Vegas".to_string(), "las vegas".to_string()];
    assert_eq!(city_layouts(dir.path(), &cities).unwrap().len(), 3);
    let cities = vec!["Toronto".to_string(), "Toronto".to_string()];
    let err = city_layouts(dir.path(), &cities).unwrap_err();
    assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Integrity(_))));
  }

  #[test]
  fn descriptor_declares_line_corpus() {
    let text = toml::to_string(&CorpusDescriptor::default()).unwrap();
    assert_eq!(text.trim(), "type = \"line-corpus\"");
  }

  #[test]
  fn line_count_mismatch_is_integrity_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("review.dat");
    write_lines(&path, vec!["a", "b", "c"]).unwrap();
    assert_eq!(verify_line_count(&path, 3).unwrap(), 3);
    let err = verify_line_count(&path, 7).unwrap_err();
    assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Integrity(_))));
  }

  #[test]
  fn prepare_cleans_unless_skipped() {
    let dir = tempdir().unwrap();
    let layout = CityLayout::for_city(dir.path(), "Toronto").unwrap();
    layout.prepare(false).unwrap();
    write_lines(&layout.corpus_file(), vec!["old"]).unwrap();

    layout.prepare(true).unwrap();
    assert!(layout.corpus_file().exists());

    layout.prepare(false).unwrap();
    assert!(!layout.corpus_file().exists());
    assert!(layout.corpus_dir().is_dir());
  }

  #[test]
  fn parallel_length_mismatch_is_rejected() {
    let dir = tempdir().unwrap();
    let layout = CityLayout::for_city(dir.path(), "Toronto").unwrap();
    layout.prepare(false).unwrap();
    let writer = CorpusWriter::new(&layout, CorpusOptions::default());
    let corpus = Corpus {
      lines: vec!["a restaurant".into()],
      business_ids: vec![],
    };
    let err = writer.write_corpus(&PerBusinessReviews::default(), &corpus).unwrap_err();
    assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Integrity(_))));
    assert!(!layout.corpus_file().exists());
  }
}
