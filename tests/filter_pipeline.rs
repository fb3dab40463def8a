use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

use restaurant_finder_tools::corpus::{city_layouts, CityLayout};
use restaurant_finder_tools::eval::PrecisionEvaluator;
use restaurant_finder_tools::pipeline::{filter_city, FilterOptions};
use restaurant_finder_tools::records::RecordStore;
use restaurant_finder_tools::reference::ReferenceSearch;
use restaurant_finder_tools::runs::RunFileIndexer;
use restaurant_finder_tools::transform::CorpusOptions;
use restaurant_finder_tools::PipelineError;

struct StubReference {
  universe: Vec<&'static str>,
  by_term: HashMap<&'static str, Vec<&'static str>>,
}

impl ReferenceSearch for StubReference {
  fn restaurant_ids(&self, _city: &str) -> Result<Vec<String>> {
    Ok(self.universe.iter().map(|s| s.to_string()).collect())
  }

  fn top_restaurant_ids(&self, _city: &str, term: &str, limit: usize) -> Result<Vec<String>> {
    Ok(self.by_term.get(term)
      .map(|ids| ids.iter().take(limit).map(|s| s.to_string()).collect())
      .unwrap_or_default())
  }
}

fn write_jsonl(path: &Path, records: &[Value]) {
  let text: Vec<String> = records.iter().map(|r| r.to_string()).collect();
  fs::write(path, text.join("\n") + "\n").unwrap();
}

fn dataset() -> TempDir {
  let dir = tempdir().unwrap();
  write_jsonl(&dir.path().join("yelp_academic_dataset_business.json"), &[
    json!({"business_id": "b1", "name": "Slice", "city": "Toronto", "categories": "Restaurants, Pizza, Italian"}),
    json!({"business_id": "b2", "name": "Cuts", "city": "Toronto", "categories": "Hair Salons"}),
    json!({"business_id": "b3", "name": "Maki", "city": "Toronto", "categories": "Sushi Bars, Restaurants"}),
    json!({"business_id": "b4", "name": "Taco", "city": "Phoenix", "categories": "Restaurants, Mexican"}),
    json!({"business_id": "b5", "name": "Gone", "city": "Toronto", "categories": null}),
    json!({"business_id": "b6", "name": "Pho", "city": "Toronto", "categories": "Restaurants, Vietnamese"}),
  ]);
  write_jsonl(&dir.path().join("yelp_academic_dataset_review.json"), &[
    json!({"review_id": "r1", "business_id": "b1", "stars": 5, "text": "Great Pizza"}),
    json!({"review_id": "r2", "business_id": "b3", "stars": 4, "text": "Fresh fish.\nBest restaurant!"}),
    json!({"review_id": "r3", "business_id": "b1", "stars": 3, "text": "ok"}),
    json!({"review_id": "r4", "business_id": "b1", "stars": 1, "text": "third"}),
    json!({"review_id": "r5", "business_id": "b4", "stars": 2, "text": "far away"}),
    json!({"review_id": "r6", "business_id": "b2", "stars": 5, "text": "nice cut"}),
  ]);
  dir
}

fn reference() -> StubReference {
  StubReference {
    universe: vec!["b3", "b1", "b4", "b6", "zz"],
    by_term: vec![("pizza", vec!["b1", "x1"]), ("sushi", vec!["x2"])].into_iter().collect(),
  }
}

fn options(combine: bool) -> FilterOptions {
  FilterOptions {
    review_limit: 2,
    corpus: CorpusOptions {
      review_expansion_enabled: true,
      combine_reviews_enabled: combine,
      review_length_limit: 5000,
    },
    skip_clean: false,
  }
}

fn read_lines(path: &Path) -> Vec<String> {
  fs::read_to_string(path).unwrap().lines().map(String::from).collect()
}

#[test]
fn builds_separate_review_corpus() {
  let data = dataset();
  let out = tempdir().unwrap();
  let store = RecordStore::open(data.path()).unwrap();
  let layout = CityLayout::for_city(out.path(), "Toronto").unwrap();

  let done = filter_city(&store, &layout, &reference(), &options(false)).unwrap();
  assert_eq!(done.restaurants, 3);
  assert_eq!(done.overlap, 3);
  assert_eq!(done.businesses_with_reviews, 2);
  assert_eq!(done.reviews, 3);
  assert_eq!(done.corpus_lines, 3);

  let lines = read_lines(&layout.corpus_file());
  assert_eq!(lines, vec![
    "italian great pizza restaurant",
    "italian pizza ok restaurant",
    "bars sushi fresh fish.best ! restaurant",
  ]);
  let ids = read_lines(&layout.business_ids_file());
  assert_eq!(ids, vec!["b1", "b1", "b3"]);

  let restaurants: Vec<Value> = serde_json::from_slice(&fs::read(layout.restaurants_file()).unwrap()).unwrap();
  let names: Vec<&str> = restaurants.iter().map(|r| r["name"].as_str().unwrap()).collect();
  assert_eq!(names, vec!["Slice", "Maki", "Pho"]);

  let index: HashMap<String, usize> = serde_json::from_slice(&fs::read(layout.restaurant_index_file()).unwrap()).unwrap();
  assert_eq!(index.len(), 3);
  assert_eq!(index["b1"], 0);
  assert_eq!(index["b3"], 1);
  assert_eq!(index["b6"], 2);

  let desc = fs::read_to_string(layout.descriptor_file()).unwrap();
  assert_eq!(desc.trim(), "type = \"line-corpus\"");
}

#[test]
fn builds_combined_corpus() {
  let data = dataset();
  let out = tempdir().unwrap();
  let store = RecordStore::open(data.path()).unwrap();
  let layout = CityLayout::for_city(out.path(), "Toronto").unwrap();

  let done = filter_city(&store, &layout, &reference(), &options(true)).unwrap();
  assert_eq!(done.corpus_lines, 2);
  let lines = read_lines(&layout.corpus_file());
  assert_eq!(lines[0], "italian great pizza restaurant italian pizza ok restaurant");
  assert_eq!(read_lines(&layout.business_ids_file()), vec!["b1", "b3"]);
}

#[test]
fn empty_overlap_writes_empty_corpus() {
  let data = dataset();
  let out = tempdir().unwrap();
  let store = RecordStore::open(data.path()).unwrap();
  let layout = CityLayout::for_city(out.path(), "Toronto").unwrap();
  let reference = StubReference { universe: vec!["nothing"], by_term: HashMap::new() };

  let done = filter_city(&store, &layout, &reference, &options(false)).unwrap();
  assert_eq!(done.overlap, 0);
  assert_eq!(done.corpus_lines, 0);
  assert!(read_lines(&layout.corpus_file()).is_empty());
}

#[test]
fn corrupt_review_line_aborts() {
  let data = dataset();
  let review_file = data.path().join("yelp_academic_dataset_review.json");
  let mut text = fs::read_to_string(&review_file).unwrap();
  text.push_str("{\"business_id\": \"b1\", \n");
  fs::write(&review_file, text).unwrap();

  let out = tempdir().unwrap();
  let store = RecordStore::open(data.path()).unwrap();
  let layout = CityLayout::for_city(out.path(), "Toronto").unwrap();
  let err = filter_city(&store, &layout, &reference(), &options(false)).unwrap_err();
  assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::StreamParse { line: 7, .. })));
  assert!(!layout.corpus_file().exists());
}

#[test]
fn duplicate_business_aborts() {
  let data = dataset();
  let biz_file = data.path().join("yelp_academic_dataset_business.json");
  let mut text = fs::read_to_string(&biz_file).unwrap();
  text.push_str(&json!({"business_id": "b1", "city": "Toronto", "categories": "Restaurants"}).to_string());
  text.push('\n');
  fs::write(&biz_file, text).unwrap();

  let out = tempdir().unwrap();
  let store = RecordStore::open(data.path()).unwrap();
  let layout = CityLayout::for_city(out.path(), "Toronto").unwrap();
  let err = filter_city(&store, &layout, &reference(), &options(false)).unwrap_err();
  assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Integrity(_))));
}

#[test]
fn evaluates_runs_against_reference() {
  let data = dataset();
  let out = tempdir().unwrap();
  let store = RecordStore::open(data.path()).unwrap();
  let layout = CityLayout::for_city(out.path(), "Toronto").unwrap();
  filter_city(&store, &layout, &reference(), &options(true)).unwrap();

  let runs = out.path().join("runs.jsonl");
  write_jsonl(&runs, &[
    json!({"city": "Toronto", "term": "pizza", "results": [{"business_id": "b1", "score": 2.0}, {"business_id": "b3", "score": 1.0}]}),
    json!({"city": "Toronto", "term": "sushi", "results": [{"business_id": "b3", "score": 1.5}]}),
  ]);

  let evaluator = PrecisionEvaluator::new(vec!["pizza".into(), "sushi".into()], 2);
  let report = evaluator.evaluate(vec![layout], &RunFileIndexer::new(&runs), &reference()).unwrap();
  let city = report.get("Toronto").unwrap();
  assert_eq!(city.terms[0].precision, 0.5);
  assert_eq!(city.terms[1].precision, 0.0);
  assert_eq!(city.mean(), 0.25);
}

#[test]
fn indexing_requires_built_corpus() {
  let out = tempdir().unwrap();
  let layout = CityLayout::for_city(out.path(), "Nowhere").unwrap();
  let evaluator = PrecisionEvaluator::new(vec!["pizza".into()], 5);
  let result = evaluator.evaluate(vec![layout], &RunFileIndexer::new(out.path().join("runs.jsonl")), &reference());
  assert!(result.is_err());
}

#[test]
fn case_variant_cities_keep_separate_corpora() {
  let data = tempdir().unwrap();
  write_jsonl(&data.path().join("business.json"), &[
    json!({"business_id": "a", "city": "Las Vegas", "categories": "Restaurants"}),
    json!({"business_id": "b", "city": "las vegas", "categories": "Restaurants"}),
  ]);
  write_jsonl(&data.path().join("review.json"), &[
    json!({"business_id": "a", "stars": 5, "text": "alpha"}),
    json!({"business_id": "b", "stars": 4, "text": "beta"}),
  ]);
  let out = tempdir().unwrap();
  let store = RecordStore::open(data.path()).unwrap();
  let reference = StubReference { universe: vec!["a", "b"], by_term: HashMap::new() };
  let cities = vec!["Las Vegas".to_string(), "las vegas".to_string()];
  let layouts = city_layouts(out.path(), &cities).unwrap();
  assert_ne!(layouts[0].path, layouts[1].path);

  for layout in &layouts {
    filter_city(&store, layout, &reference, &options(false)).unwrap();
  }
  assert_eq!(read_lines(&layouts[0].corpus_file()), vec!["alpha restaurant"]);
  assert_eq!(read_lines(&layouts[1].corpus_file()), vec!["beta restaurant"]);
  assert_eq!(read_lines(&layouts[0].business_ids_file()), vec!["a"]);
}

#[test]
fn missing_run_fails_evaluation() {
  let data = dataset();
  let out = tempdir().unwrap();
  let store = RecordStore::open(data.path()).unwrap();
  let layout = CityLayout::for_city(out.path(), "Toronto").unwrap();
  filter_city(&store, &layout, &reference(), &options(true)).unwrap();

  let runs = out.path().join("runs.jsonl");
  write_jsonl(&runs, &[
    json!({"city": "Toronto", "term": "pizza", "results": [{"business_id": "b1"}]}),
  ]);
  let evaluator = PrecisionEvaluator::new(vec!["pizza".into(), "sushi".into()], 2);
  let err = evaluator.evaluate(vec![layout], &RunFileIndexer::new(&runs), &reference()).unwrap_err();
  assert!(format!("{:#}", err).contains("sushi"));
}
