/// Normalizing review text into corpus lines.
///
/// Each review goes through a fixed sequence of steps: truncate and
/// lower-case, strip line breaks, optionally prepend category words, then
/// move the restaurant terminology to a single trailing token.

use anyhow::Result;

use crate::error::PipelineError;
use crate::restaurants::RestaurantSet;
use crate::reviews::PerBusinessReviews;

/// Default maximum review length, in characters.
pub const DEFAULT_REVIEW_LENGTH_LIMIT: usize = 5000;

/// Token appended to every normalized review.
pub const RESTAURANT_TOKEN: &str = "restaurant";

/// Switches controlling corpus construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorpusOptions {
  /// Prepend business category words to review text.
  pub review_expansion_enabled: bool,
  /// Emit one line per business instead of one per review.
  pub combine_reviews_enabled: bool,
  /// Characters of review text kept before normalization.
  pub review_length_limit: usize,
}

impl Default for CorpusOptions {
  fn default() -> CorpusOptions {
    CorpusOptions {
      review_expansion_enabled: true,
      combine_reviews_enabled: true,
      review_length_limit: DEFAULT_REVIEW_LENGTH_LIMIT,
    }
  }
}

/// Corpus text lines and the business id of each line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
  pub lines: Vec<String>,
  pub business_ids: Vec<String>,
}

impl Corpus {
  pub fn len(&self) -> usize {
    self.lines.len()
  }

  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }

  fn push(&mut self, line: String, business_id: &str) {
    self.lines.push(line);
    self.business_ids.push(business_id.to_owned());
  }
}

/// Applies the normalization pipeline with a fixed set of options.
#[derive(Debug, Clone)]
pub struct ReviewTransformer {
  options: CorpusOptions,
}

impl ReviewTransformer {
  pub fn new(options: CorpusOptions) -> ReviewTransformer {
    ReviewTransformer { options }
  }

  /// Normalize one review of a business with the given categories.
  pub fn normalize(&self, text: &str, categories: Option<&str>) -> String {
    let mut txt: String = text.chars().take(self.options.review_length_limit).collect();
    txt = txt.to_lowercase();
    txt.retain(|c| c != '\r' && c != '\n');
    if self.options.review_expansion_enabled {
      txt = expand_with_categories(&txt, categories);
    }
    append_restaurant_token(&txt)
  }

  /// Build the corpus for the restaurants' kept reviews.
  ///
  /// Businesses appear in the order of `reviews`; each needs a record in
  /// `restaurants` for its categories.
  pub fn build_corpus(&self, reviews: &PerBusinessReviews, restaurants: &RestaurantSet) -> Result<Corpus> {
    let mut corpus = Corpus::default();
    for (biz_id, biz_reviews) in reviews.iter() {
      let biz = restaurants.get(biz_id).ok_or_else(|| {
        PipelineError::integrity(format!("reviews for {} which is not an indexed restaurant", biz_id))
      })?;
      let cats = biz.categories.as_deref();
      let texts = biz_reviews.iter().map(|r| self.normalize(&r.text, cats));
      if self.options.combine_reviews_enabled {
        let merged: Vec<String> = texts.collect();
        corpus.push(merged.join(" "), biz_id);
      } else {
        for txt in texts {
          corpus.push(txt, biz_id);
        }
      }
    }
    Ok(corpus)
  }
}

/// Prepend category words missing from the review text.
///
/// Each word of each comma-separated category is pushed onto the front,
/// so the last word inserted leads the result.  `&`, `and` and words
/// containing `restaurant` are skipped, as is any word that already occurs
/// as a substring of the original `text` (not of the growing result).
pub fn expand_with_categories(text: &str, categories: Option<&str>) -> String {
  let mut expanded = text.to_owned();
  let categories = match categories {
    Some(c) if !c.trim().is_empty() => c,
    _ => return expanded,
  };
  for cat in categories.split(',') {
    let cat = cat.trim().to_lowercase();
    for word in cat.split(' ') {
      let word = word.trim();
      if word == "&" || word == "and" || word.contains(RESTAURANT_TOKEN) {
        continue;
      }
      if !text.contains(word) {
        expanded = format!("{} {}", word, expanded);
      }
    }
  }
  expanded
}

/// Remove all restaurant terminology, then append it once at the end.
pub fn append_restaurant_token(text: &str) -> String {
  let mut txt = text.to_owned();
  // a removal can splice a new occurrence together, so repeat until clean
  while txt.contains(RESTAURANT_TOKEN) {
    txt = txt.replace("restaurants", "").replace(RESTAURANT_TOKEN, "");
  }
  format!("{} {}", txt, RESTAURANT_TOKEN)
}
