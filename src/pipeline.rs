/// Building one city's filtered dataset and review corpus.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::corpus::{CityLayout, CorpusWriter};
use crate::records::RecordStore;
use crate::reference::ReferenceSearch;
use crate::restaurants::resolve_restaurants;
use crate::reviews::ReviewAggregator;
use crate::transform::{CorpusOptions, ReviewTransformer};

/// Parameters of a filtering run.
#[derive(Debug, Clone)]
pub struct FilterOptions {
  pub review_limit: usize,
  pub corpus: CorpusOptions,
  pub skip_clean: bool,
}

/// Summary of what was written for a city.
#[derive(Debug, Clone, PartialEq)]
pub struct CityArtifacts {
  pub city: String,
  pub restaurants: usize,
  pub overlap: usize,
  pub businesses_with_reviews: usize,
  pub reviews: usize,
  pub corpus_lines: usize,
}

/// Run the full pipeline for one city.  Each call builds its own indexes;
/// nothing is shared between cities.
pub fn filter_city(
  store: &RecordStore,
  layout: &CityLayout,
  reference: &dyn ReferenceSearch,
  options: &FilterOptions,
) -> Result<CityArtifacts> {
  let city = layout.city.as_str();
  layout.prepare(options.skip_clean)?;

  info!("getting reference restaurant ids in {}", city);
  let reference_ids: HashSet<String> = reference
    .restaurant_ids(city)
    .with_context(|| format!("cannot list reference restaurants for {}", city))?
    .into_iter()
    .collect();

  info!("getting overlapping restaurants");
  let restaurants = resolve_restaurants(store.businesses()?, city)?;
  let overlap = restaurants.overlap(&reference_ids);

  let writer = CorpusWriter::new(layout, options.corpus);
  writer.write_restaurants(&overlap)?;

  info!("getting reviews of the restaurants, this will take some time");
  let aggregator = ReviewAggregator::new(overlap.index.ids(), options.review_limit);
  let reviews = aggregator.consume(store.reviews()?)?;

  let transformer = ReviewTransformer::new(options.corpus);
  let corpus = transformer.build_corpus(&reviews, &overlap)?;
  let lines = writer.write_corpus(&reviews, &corpus)?;
  if lines == 0 {
    warn!("corpus for {} is empty", city);
  }

  Ok(CityArtifacts {
    city: city.to_owned(),
    restaurants: restaurants.len(),
    overlap: overlap.len(),
    businesses_with_reviews: reviews.business_count(),
    reviews: reviews.review_count(),
    corpus_lines: lines,
  })
}
