/// Grouping reviews by business with a per-business cap.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use tracing::info;

use crate::records::{RawReview, ReviewRecord};

/// Default number of reviews kept per business.
pub const DEFAULT_REVIEW_LIMIT: usize = 100;

/// Reviews kept for each business, in the order businesses first
/// contributed a review.
#[derive(Debug, Clone, Default)]
pub struct PerBusinessReviews {
  order: Vec<String>,
  reviews: HashMap<String, Vec<ReviewRecord>>,
  seen: HashMap<String, usize>,
}

impl PerBusinessReviews {
  /// Reviews kept for a business.
  pub fn get(&self, business_id: &str) -> Option<&[ReviewRecord]> {
    self.reviews.get(business_id).map(Vec::as_slice)
  }

  /// Number of matching reviews encountered for a business, including
  /// those dropped by the cap.
  pub fn seen(&self, business_id: &str) -> usize {
    self.seen.get(business_id).copied().unwrap_or(0)
  }

  /// Businesses with at least one kept review, in first-kept order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &[ReviewRecord])> {
    let reviews = &self.reviews;
    self.order.iter().map(move |id| (id.as_str(), reviews[id].as_slice()))
  }

  /// Number of businesses with at least one kept review.
  pub fn business_count(&self) -> usize {
    self.order.len()
  }

  /// Total kept reviews across businesses.
  pub fn review_count(&self) -> usize {
    self.reviews.values().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }
}

/// Collects the first `limit` reviews of each target business.
pub struct ReviewAggregator {
  targets: HashSet<String>,
  limit: usize,
  groups: PerBusinessReviews,
}

impl ReviewAggregator {
  pub fn new(targets: HashSet<String>, limit: usize) -> ReviewAggregator {
    ReviewAggregator {
      targets,
      limit,
      groups: PerBusinessReviews::default(),
    }
  }

  /// Offer one review.  Returns whether it was kept.
  pub fn accept(&mut self, review: RawReview) -> bool {
    if !self.targets.contains(&review.business_id) {
      return false;
    }
    let count = self.groups.seen.entry(review.business_id.clone()).or_insert(0);
    *count += 1;
    if *count > self.limit {
      return false;
    }
    let groups = &mut self.groups;
    if !groups.reviews.contains_key(&review.business_id) {
      groups.order.push(review.business_id.clone());
    }
    groups.reviews
      .entry(review.business_id.clone())
      .or_insert_with(Vec::new)
      .push(review.into());
    true
  }

  /// Consume a review stream, stopping at the first error.
  pub fn consume<I>(mut self, reviews: I) -> Result<PerBusinessReviews>
  where
    I: IntoIterator<Item = Result<RawReview>>,
  {
    let mut scanned = 0usize;
    let mut kept = 0usize;
    for review in reviews {
      scanned += 1;
      if self.accept(review?) {
        kept += 1;
      }
    }
    info!("kept {} reviews for {} businesses out of {} scanned",
          kept, self.groups.business_count(), scanned);
    Ok(self.groups)
  }

  pub fn finish(self) -> PerBusinessReviews {
    self.groups
  }
}
