/// TOML settings shared by the filtering and evaluation tools.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::reviews::DEFAULT_REVIEW_LIMIT;
use crate::transform::{CorpusOptions, DEFAULT_REVIEW_LENGTH_LIMIT};

/// Settings file read when no explicit path is given.
pub const DEFAULT_SETTINGS_FILE: &str = "restaurant-finder.toml";

/// Reference search service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReferenceSettings {
  pub endpoint: String,
  /// Environment variable holding the bearer token.
  pub api_key_env: String,
  pub page_size: usize,
  /// Pages fetched when listing a city's restaurants.
  pub pages: usize,
  pub timeout_secs: u64,
  /// Attempts per request; 1 disables retry.
  pub max_attempts: u32,
  pub retry_backoff_ms: u64,
}

impl Default for ReferenceSettings {
  fn default() -> ReferenceSettings {
    ReferenceSettings {
      endpoint: "https://api.yelp.com/v3/businesses/search".to_owned(),
      api_key_env: "YELP_API_KEY".to_owned(),
      page_size: 50,
      pages: 20,
      timeout_secs: 30,
      max_attempts: 1,
      retry_backoff_ms: 500,
    }
  }
}

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
  /// Cities processed, each independently.
  pub cities: Vec<String>,
  /// Query terms scored during evaluation.
  pub search_terms: Vec<String>,
  /// K for precision@K, also the reference result limit.
  pub search_result_count: usize,
  /// Root of the per-city output directories.
  pub output_dir: PathBuf,
  pub review_limit: usize,
  pub review_length_limit: usize,
  pub review_expansion_enabled: bool,
  pub combine_reviews_enabled: bool,
  pub reference: ReferenceSettings,
}

impl Default for Settings {
  fn default() -> Settings {
    Settings {
      cities: Vec::new(),
      search_terms: Vec::new(),
      search_result_count: 50,
      output_dir: PathBuf::from("data"),
      review_limit: DEFAULT_REVIEW_LIMIT,
      review_length_limit: DEFAULT_REVIEW_LENGTH_LIMIT,
      review_expansion_enabled: true,
      combine_reviews_enabled: true,
      reference: ReferenceSettings::default(),
    }
  }
}

impl Settings {
  /// Corpus options derived from these settings.
  pub fn corpus_options(&self) -> CorpusOptions {
    CorpusOptions {
      review_expansion_enabled: self.review_expansion_enabled,
      combine_reviews_enabled: self.combine_reviews_enabled,
      review_length_limit: self.review_length_limit,
    }
  }

  /// Parse settings from TOML text.
  pub fn from_toml(text: &str) -> Result<Settings> {
    let settings = toml::from_str(text)?;
    Ok(settings)
  }
}

/// Load settings.  An explicit path must exist; otherwise the default file
/// is used if present, falling back to built-in defaults.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
  let (candidate, explicit_provided) = match explicit {
    Some(path) => (path.to_owned(), true),
    None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
  };

  if candidate.exists() {
    let raw = std::fs::read_to_string(&candidate)
      .with_context(|| format!("failed to read settings from {}", candidate.display()))?;
    Settings::from_toml(&raw)
      .with_context(|| format!("failed to parse settings at {}", candidate.display()))
  } else if explicit_provided {
    bail!("settings file not found at {}", candidate.display());
  } else {
    Ok(Settings::default())
  }
}
