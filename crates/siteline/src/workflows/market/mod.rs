//! Market rent benchmarks consumed by the underwriting pipeline. The engine
//! never fetches data itself; providers hand it already-resolved values.

mod comps;

pub use comps::{RentCompBook, RentCompImportError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Confidence tier derived from how many comps back the average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkConfidence {
    High,
    Medium,
    Low,
}

impl BenchmarkConfidence {
    pub const fn label(self) -> &'static str {
        match self {
            BenchmarkConfidence::High => "high",
            BenchmarkConfidence::Medium => "medium",
            BenchmarkConfidence::Low => "low",
        }
    }
}

/// Average achieved storage rent for a zip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentBenchmark {
    pub avg_price_per_sqft_month: f64,
    pub confidence: BenchmarkConfidence,
    pub sample_size: u32,
    pub as_of: Option<NaiveDate>,
}

/// Read-only rent lookup, resolved by the orchestration layer.
pub trait RentBenchmarkProvider: Send + Sync {
    fn rent_benchmark(&self, zip: &str) -> Result<Option<RentBenchmark>, MarketDataError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MarketDataError {
    #[error("rent benchmark source unavailable: {0}")]
    Unavailable(String),
}
