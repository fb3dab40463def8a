/// Selecting the restaurants of a city and reconciling them with the
/// reference id list.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::records::BusinessRecord;

/// Category tag (lower-cased) that marks a business as a restaurant.
pub const RESTAURANT_TAG: &str = "restaurants";

/// Map from business id to its position in a restaurant list.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct RestaurantIndex {
  positions: HashMap<String, usize>,
}

impl RestaurantIndex {
  pub fn new() -> RestaurantIndex {
    RestaurantIndex::default()
  }

  /// Assign the next position to `business_id`.  Re-inserting an id is an
  /// integrity violation.
  pub fn insert(&mut self, business_id: &str) -> Result<usize> {
    if self.positions.contains_key(business_id) {
      return Err(PipelineError::integrity(format!(
        "business id {} already exists in the restaurant index", business_id
      )).into());
    }
    let pos = self.positions.len();
    self.positions.insert(business_id.to_owned(), pos);
    Ok(pos)
  }

  pub fn get(&self, business_id: &str) -> Option<usize> {
    self.positions.get(business_id).copied()
  }

  pub fn len(&self) -> usize {
    self.positions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.positions.is_empty()
  }

  /// The set of indexed business ids.
  pub fn ids(&self) -> HashSet<String> {
    self.positions.keys().cloned().collect()
  }
}

/// An ordered restaurant list with its id index.
#[derive(Debug, Clone, Default)]
pub struct RestaurantSet {
  pub restaurants: Vec<BusinessRecord>,
  pub index: RestaurantIndex,
}

impl RestaurantSet {
  /// Append a restaurant, assigning it the next index position.
  pub fn push(&mut self, biz: BusinessRecord) -> Result<()> {
    self.index.insert(&biz.business_id)?;
    self.restaurants.push(biz);
    Ok(())
  }

  /// Look up a restaurant by business id.
  pub fn get(&self, business_id: &str) -> Option<&BusinessRecord> {
    self.index.get(business_id).map(|i| &self.restaurants[i])
  }

  pub fn len(&self) -> usize {
    self.restaurants.len()
  }

  pub fn is_empty(&self) -> bool {
    self.restaurants.is_empty()
  }

  /// Restrict to restaurants whose ids are in `reference`, keeping this
  /// set's order.  An empty result is valid but logged.
  pub fn overlap(&self, reference: &HashSet<String>) -> RestaurantSet {
    let mut overlap = RestaurantSet::default();
    for biz in self.restaurants.iter().filter(|b| reference.contains(&b.business_id)) {
      // ids are already unique in self, so this cannot fail
      let pos = overlap.restaurants.len();
      overlap.index.positions.insert(biz.business_id.clone(), pos);
      overlap.restaurants.push(biz.clone());
    }
    if overlap.is_empty() {
      warn!("no overlapping restaurants among {} candidates", self.len());
    } else {
      info!("there are {} overlapping restaurants", overlap.len());
    }
    overlap
  }
}

/// Whether a category list contains the restaurant tag.
pub fn is_restaurant(biz: &BusinessRecord) -> bool {
  biz.categories.is_some()
    && biz.category_tags().any(|c| c.to_lowercase() == RESTAURANT_TAG)
}

/// Collect the restaurants located in `city` (exact match), in stream order.
pub fn resolve_restaurants<I>(records: I, city: &str) -> Result<RestaurantSet>
where
  I: IntoIterator<Item = Result<BusinessRecord>>,
{
  let mut set = RestaurantSet::default();
  let mut scanned = 0usize;
  for biz in records {
    let biz = biz?;
    scanned += 1;
    if biz.city != city || !is_restaurant(&biz) {
      continue;
    }
    set.push(biz)?;
  }
  info!("found {} restaurants in {} among {} businesses", set.len(), city, scanned);
  Ok(set)
}
