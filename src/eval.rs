/// Precision@K of a restaurant ranking against reference search results.

use std::collections::HashSet;
use std::io::Write;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::corpus::CityLayout;
use crate::reference::ReferenceSearch;

/// A ranked result from the restaurant finder.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RankedBusiness {
  pub business_id: String,
  #[serde(default)]
  pub score: f64,
}

/// Query interface of a built ranking index.
pub trait Ranker {
  /// Ranked restaurants for a query term, best first.
  fn find_restaurants(&self, term: &str) -> Result<Vec<RankedBusiness>>;
}

/// Builds or loads a ranking index over a city's corpus.
pub trait Indexer {
  fn index(&self, layout: &CityLayout) -> Result<Box<dyn Ranker>>;
}

/// Fraction of the first `k` ranked ids that occur in `truth`, over `k`.
pub fn precision_at_k<S: AsRef<str>>(ranked: &[S], truth: &HashSet<String>, k: usize) -> f64 {
  if k == 0 {
    return 0.0;
  }
  let hits = ranked.iter()
    .take(k)
    .filter(|id| {
      let id: &str = (*id).as_ref();
      truth.contains(id)
    })
    .count();
  hits as f64 / k as f64
}

/// Precision for one query term.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TermPrecision {
  pub term: String,
  pub precision: f64,
}

/// Scores of one city.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CityScore {
  pub city: String,
  pub terms: Vec<TermPrecision>,
}

impl CityScore {
  /// Arithmetic mean of the term precisions.
  pub fn mean(&self) -> f64 {
    if self.terms.is_empty() {
      0.0
    } else {
      self.terms.iter().map(|t| t.precision).sum::<f64>() / self.terms.len() as f64
    }
  }
}

/// Evaluation progress of one city.
pub enum CityEvaluation {
  Init(CityLayout),
  Indexed(CityLayout, Box<dyn Ranker>),
  Scored(CityScore),
}

impl CityEvaluation {
  pub fn new(layout: CityLayout) -> CityEvaluation {
    CityEvaluation::Init(layout)
  }

  pub fn stage(&self) -> &'static str {
    match self {
      CityEvaluation::Init(_) => "init",
      CityEvaluation::Indexed(..) => "indexed",
      CityEvaluation::Scored(_) => "scored",
    }
  }

  /// INIT -> INDEXED
  pub fn index(self, indexer: &dyn Indexer) -> Result<CityEvaluation> {
    match self {
      CityEvaluation::Init(layout) => {
        let ranker = indexer.index(&layout)?;
        Ok(CityEvaluation::Indexed(layout, ranker))
      }
      other => bail!("cannot index a city in stage {}", other.stage()),
    }
  }

  /// INDEXED -> SCORED
  pub fn score(self, evaluator: &PrecisionEvaluator, reference: &dyn ReferenceSearch) -> Result<CityEvaluation> {
    match self {
      CityEvaluation::Indexed(layout, ranker) => {
        let score = evaluator.score_city(&layout.city, ranker.as_ref(), reference)?;
        Ok(CityEvaluation::Scored(score))
      }
      other => bail!("cannot score a city in stage {}", other.stage()),
    }
  }

  pub fn into_score(self) -> Option<CityScore> {
    match self {
      CityEvaluation::Scored(score) => Some(score),
      _ => None,
    }
  }
}

/// Scores rankings over a fixed term list.
#[derive(Debug, Clone)]
pub struct PrecisionEvaluator {
  pub terms: Vec<String>,
  pub k: usize,
}

impl PrecisionEvaluator {
  pub fn new(terms: Vec<String>, k: usize) -> PrecisionEvaluator {
    PrecisionEvaluator { terms, k }
  }

  /// Precision of one term in one city.
  pub fn score_term(&self, city: &str, term: &str, ranker: &dyn Ranker, reference: &dyn ReferenceSearch) -> Result<f64> {
    let truth = reference.top_restaurant_ids(city, term, self.k)?;
    let truth_set: HashSet<String> = truth.iter().cloned().collect();
    info!("reference has {} results and {} distinct results", truth.len(), truth_set.len());

    let results = ranker.find_restaurants(term)?;
    let ranked: Vec<&str> = results.iter().map(|b| b.business_id.as_str()).collect();
    let distinct: HashSet<&str> = ranked.iter().copied().collect();
    info!("ranking has {} results and {} distinct results", ranked.len(), distinct.len());

    let p = precision_at_k(ranked.as_slice(), &truth_set, self.k);
    info!("precision is {:.2} in {} when searching {}", p, city, term);
    Ok(p)
  }

  /// Score every term for a city.
  pub fn score_city(&self, city: &str, ranker: &dyn Ranker, reference: &dyn ReferenceSearch) -> Result<CityScore> {
    let mut terms = Vec::with_capacity(self.terms.len());
    for term in &self.terms {
      let precision = self.score_term(city, term, ranker, reference)?;
      terms.push(TermPrecision { term: term.clone(), precision });
    }
    Ok(CityScore { city: city.to_owned(), terms })
  }

  /// Index and score each city in turn.
  pub fn evaluate(&self, layouts: Vec<CityLayout>, indexer: &dyn Indexer, reference: &dyn ReferenceSearch) -> Result<PrecisionReport> {
    let mut report = PrecisionReport::default();
    for layout in layouts {
      info!("evaluating {}", layout.city);
      let state = CityEvaluation::new(layout)
        .index(indexer)?
        .score(self, reference)?;
      if let Some(score) = state.into_score() {
        report.cities.push(score);
      }
    }
    Ok(report)
  }
}

/// Per-city scores in evaluation order.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct PrecisionReport {
  pub cities: Vec<CityScore>,
}

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
  city: &'a str,
  term: &'a str,
  precision: f64,
}

impl PrecisionReport {
  pub fn get(&self, city: &str) -> Option<&CityScore> {
    self.cities.iter().find(|c| c.city == city)
  }

  /// Write `city,term,precision` rows, then a `MEAN` row per city.
  pub fn write_csv<W: Write>(&self, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for city in &self.cities {
      for t in &city.terms {
        writer.serialize(ReportRow { city: &city.city, term: &t.term, precision: t.precision })?;
      }
    }
    for city in &self.cities {
      writer.serialize(ReportRow { city: &city.city, term: "MEAN", precision: city.mean() })?;
    }
    writer.flush()?;
    Ok(())
  }

  /// Human-readable summary of city means.
  pub fn summary(&self) -> String {
    let mut s = String::new();
    for city in &self.cities {
      s.push_str(&format!("{:<15}: {:.2}\n", city.city, city.mean()));
    }
    s
  }
}
