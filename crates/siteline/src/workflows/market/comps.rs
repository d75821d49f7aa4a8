use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use super::{BenchmarkConfidence, MarketDataError, RentBenchmark, RentBenchmarkProvider};

/// In-memory rent benchmark book hydrated from a comp-survey CSV export.
///
/// Expected columns: `Zip`, `Avg Rent Per Sqft Month`, `Sample Size`,
/// `As Of` (YYYY-MM-DD, optional).
#[derive(Debug, Clone, Default)]
pub struct RentCompBook {
    benchmarks: HashMap<String, RentBenchmark>,
}

#[derive(Debug, thiserror::Error)]
pub enum RentCompImportError {
    #[error("failed to read rent comp export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid rent comp CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("rent comp row for zip {zip} has non-positive rent {rent}")]
    InvalidRent { zip: String, rent: f64 },
}

const HIGH_CONFIDENCE_SAMPLES: u32 = 12;
const MEDIUM_CONFIDENCE_SAMPLES: u32 = 5;

impl RentCompBook {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RentCompImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut benchmarks = HashMap::new();
        for record in csv_reader.deserialize::<RentCompRow>() {
            let row = record?;
            if row.avg_rent_per_sqft_month <= 0.0 {
                return Err(RentCompImportError::InvalidRent {
                    zip: row.zip,
                    rent: row.avg_rent_per_sqft_month,
                });
            }
            let sample_size = row.sample_size.unwrap_or(1);
            benchmarks.insert(
                row.zip.clone(),
                RentBenchmark {
                    avg_price_per_sqft_month: row.avg_rent_per_sqft_month,
                    confidence: confidence_for(sample_size),
                    sample_size,
                    as_of: row.as_of_date(),
                },
            );
        }

        Ok(Self { benchmarks })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RentCompImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn len(&self) -> usize {
        self.benchmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.benchmarks.is_empty()
    }
}

impl RentBenchmarkProvider for RentCompBook {
    fn rent_benchmark(&self, zip: &str) -> Result<Option<RentBenchmark>, MarketDataError> {
        Ok(self.benchmarks.get(zip).cloned())
    }
}

fn confidence_for(sample_size: u32) -> BenchmarkConfidence {
    if sample_size >= HIGH_CONFIDENCE_SAMPLES {
        BenchmarkConfidence::High
    } else if sample_size >= MEDIUM_CONFIDENCE_SAMPLES {
        BenchmarkConfidence::Medium
    } else {
        BenchmarkConfidence::Low
    }
}

#[derive(Debug, Deserialize)]
struct RentCompRow {
    #[serde(rename = "Zip")]
    zip: String,
    #[serde(rename = "Avg Rent Per Sqft Month")]
    avg_rent_per_sqft_month: f64,
    #[serde(rename = "Sample Size", default)]
    sample_size: Option<u32>,
    #[serde(rename = "As Of", default, deserialize_with = "empty_string_as_none")]
    as_of: Option<String>,
}

impl RentCompRow {
    fn as_of_date(&self) -> Option<NaiveDate> {
        self.as_of
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|raw| !raw.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
Zip,Avg Rent Per Sqft Month,Sample Size,As Of
50309,1.45,14,2026-06-01
50266,1.18,6,2026-06-01
52240,0.92,2,
";

    #[test]
    fn parses_rows_and_derives_confidence() {
        let book = RentCompBook::from_reader(Cursor::new(SAMPLE)).expect("book parses");
        assert_eq!(book.len(), 3);

        let downtown = book
            .rent_benchmark("50309")
            .expect("lookup works")
            .expect("zip present");
        assert!((downtown.avg_price_per_sqft_month - 1.45).abs() < 1e-9);
        assert_eq!(downtown.confidence, BenchmarkConfidence::High);
        assert_eq!(
            downtown.as_of,
            NaiveDate::from_ymd_opt(2026, 6, 1)
        );

        let suburb = book
            .rent_benchmark("50266")
            .expect("lookup works")
            .expect("zip present");
        assert_eq!(suburb.confidence, BenchmarkConfidence::Medium);

        let rural = book
            .rent_benchmark("52240")
            .expect("lookup works")
            .expect("zip present");
        assert_eq!(rural.confidence, BenchmarkConfidence::Low);
        assert_eq!(rural.as_of, None);
    }

    #[test]
    fn unknown_zip_is_absent_not_an_error() {
        let book = RentCompBook::from_reader(Cursor::new(SAMPLE)).expect("book parses");
        assert!(book.rent_benchmark("99999").expect("lookup works").is_none());
    }

    #[test]
    fn non_positive_rent_is_rejected() {
        let bad = "Zip,Avg Rent Per Sqft Month,Sample Size,As Of\n50309,0.0,3,\n";
        let result = RentCompBook::from_reader(Cursor::new(bad));
        assert!(matches!(
            result,
            Err(RentCompImportError::InvalidRent { .. })
        ));
    }

    #[test]
    fn malformed_csv_is_a_typed_error() {
        let bad = "Zip,Avg Rent Per Sqft Month\n50309,not-a-number\n";
        let result = RentCompBook::from_reader(Cursor::new(bad));
        assert!(matches!(result, Err(RentCompImportError::Csv(_))));
    }
}
