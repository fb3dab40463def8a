/// Client for the reference business-search service (the Yelp Fusion
/// search endpoint).

use std::thread::sleep;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ReferenceSettings;
use crate::error::PipelineError;

/// Category filter applied to every reference search.
pub const RESTAURANTS_CATEGORY: &str = "Restaurants";

/// Source of reference business ids.
pub trait ReferenceSearch {
  /// The ids of the restaurants the service lists for a city.
  fn restaurant_ids(&self, city: &str) -> Result<Vec<String>>;

  /// The top `limit` restaurant ids for a search term in a city.
  fn top_restaurant_ids(&self, city: &str, term: &str, limit: usize) -> Result<Vec<String>>;
}

/// Business entry in a search response.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchBusiness {
  pub id: String,
  #[serde(default)]
  pub name: String,
}

/// Search response body.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchResponse {
  pub businesses: Vec<SearchBusiness>,
}

/// Query of one search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery<'a> {
  pub location: &'a str,
  pub term: Option<&'a str>,
  pub limit: usize,
  pub offset: usize,
}

impl<'a> SearchQuery<'a> {
  /// Request parameters in wire form.
  pub fn params(&self) -> Vec<(&'static str, String)> {
    let mut params = Vec::with_capacity(5);
    if let Some(term) = self.term {
      params.push(("term", term.to_owned()));
    }
    params.push(("location", self.location.to_owned()));
    params.push(("limit", self.limit.to_string()));
    params.push(("category", RESTAURANTS_CATEGORY.to_owned()));
    params.push(("offset", self.offset.to_string()));
    params
  }
}

/// Offsets of the pages that make up a city's id universe.
pub fn page_offsets(page_size: usize, pages: usize) -> impl Iterator<Item = usize> {
  (0..pages).map(move |p| p * page_size)
}

/// Blocking HTTP client for the search endpoint.
pub struct YelpClient {
  client: Client,
  settings: ReferenceSettings,
  api_key: String,
}

impl YelpClient {
  /// Create a client, reading the API key from the configured environment
  /// variable.
  pub fn from_env(settings: ReferenceSettings) -> Result<YelpClient> {
    let api_key = std::env::var(&settings.api_key_env).map_err(|_| {
      PipelineError::ConfigurationAbsence {
        what: "API key",
        detail: format!("environment variable {} is not set", settings.api_key_env),
      }
    })?;
    YelpClient::new(settings, api_key)
  }

  pub fn new(settings: ReferenceSettings, api_key: String) -> Result<YelpClient> {
    let client = Client::builder()
      .timeout(Duration::from_secs(settings.timeout_secs))
      .build()
      .context("cannot build HTTP client")?;
    Ok(YelpClient { client, settings, api_key })
  }

  /// Issue one search, retrying up to the configured attempt count.
  pub fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
    let attempts = self.settings.max_attempts.max(1);
    let mut attempt = 1;
    loop {
      match self.search_once(query) {
        Ok(resp) => return Ok(resp),
        Err(e) if attempt < attempts && is_retryable(&e) => {
          warn!("search attempt {}/{} failed: {:#}", attempt, attempts, e);
          sleep(Duration::from_millis(self.settings.retry_backoff_ms * attempt as u64));
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    }
  }

  fn search_once(&self, query: &SearchQuery) -> Result<SearchResponse> {
    debug!("searching {:?}", query);
    let response = self
      .client
      .get(&self.settings.endpoint)
      .bearer_auth(&self.api_key)
      .query(&query.params())
      .send()
      .with_context(|| format!("request to {} failed", self.settings.endpoint))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().unwrap_or_default();
      return Err(PipelineError::ExternalService { status: status.as_u16(), body }.into());
    }
    let body: SearchResponse = response.json().context("cannot decode search response")?;
    Ok(body)
  }
}

/// Whether a failed search is worth repeating: transport failures, server
/// errors and rate limiting are; client errors and undecodable bodies are not.
fn is_retryable(err: &anyhow::Error) -> bool {
  if let Some(PipelineError::ExternalService { status, .. }) = err.downcast_ref::<PipelineError>() {
    return *status >= 500 || *status == 429;
  }
  match err.downcast_ref::<reqwest::Error>() {
    Some(re) => !re.is_decode(),
    None => false,
  }
}

impl ReferenceSearch for YelpClient {
  fn restaurant_ids(&self, city: &str) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for offset in page_offsets(self.settings.page_size, self.settings.pages) {
      let query = SearchQuery {
        location: city,
        term: None,
        limit: self.settings.page_size,
        offset,
      };
      let resp = self.search(&query)?;
      ids.extend(resp.businesses.into_iter().map(|b| b.id));
      debug!("{} reference ids so far", ids.len());
    }
    info!("fetched {} reference restaurant ids for {}", ids.len(), city);
    Ok(ids)
  }

  fn top_restaurant_ids(&self, city: &str, term: &str, limit: usize) -> Result<Vec<String>> {
    let query = SearchQuery {
      location: city,
      term: Some(term),
      limit,
      offset: 0,
    };
    let resp = self.search(&query)?;
    Ok(resp.businesses.into_iter().map(|b| b.id).collect())
  }
}
