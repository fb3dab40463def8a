//! Tools for building per-city restaurant review corpora from the Yelp
//! dataset and scoring restaurant rankings against the Yelp search API.

pub mod config;
pub mod corpus;
pub mod error;
pub mod eval;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod records;
pub mod reference;
pub mod restaurants;
pub mod reviews;
pub mod runs;
pub mod transform;

pub use error::PipelineError;
