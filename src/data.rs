//! Price history ingestion.
//!
//! The optimizer itself never touches files; this module feeds it. The
//! expected input is a close-price CSV with a `date` header column and one
//! column per ticker, rows in chronological order:
//!
//! ```text
//! date,BBCA,BBRI,TLKM
//! 2023-01-02,8725.0,4840.0,3760.0
//! 2023-01-03,8750.0,4870.0,3750.0
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("failed to open price file")]
    Io(#[from] std::io::Error),
    #[error("malformed CSV input")]
    Csv(#[from] csv::Error),
    #[error("first CSV column must be `date`, got `{0}`")]
    BadHeader(String),
    #[error("price file has no ticker columns")]
    NoTickers,
    #[error("row {row}: bad date `{value}`")]
    BadDate { row: usize, value: String },
    #[error("row {row}: bad price `{value}` for {ticker}")]
    BadPrice {
        row: usize,
        ticker: String,
        value: String,
    },
    #[error("row {row}: expected {expected} fields, got {got}")]
    ShortRow {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("row {row}: dates must be strictly increasing")]
    OutOfOrder { row: usize },
    #[error("need at least 2 price rows to derive returns, got {0}")]
    TooFewRows(usize),
}

/// Close prices of a fixed ticker universe over a date range.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    tickers: Vec<String>,
    dates: Vec<NaiveDate>,
    /// One row per date, one column per ticker.
    prices: Vec<Vec<f64>>,
}

impl PriceHistory {
    pub fn from_csv_path(path: &Path) -> Result<Self, DataError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DataError> {
        let mut csv_reader = csv::Reader::from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let mut columns = headers.iter();
        match columns.next() {
            Some(first) if first.eq_ignore_ascii_case("date") => {}
            first => return Err(DataError::BadHeader(first.unwrap_or("").to_string())),
        }
        let tickers: Vec<String> = columns.map(str::to_string).collect();
        if tickers.is_empty() {
            return Err(DataError::NoTickers);
        }

        let mut dates = Vec::new();
        let mut prices = Vec::new();
        for (index, record) in csv_reader.records().enumerate() {
            let record = record?;
            let row = index + 2; // 1-based, after the header
            if record.len() != tickers.len() + 1 {
                return Err(DataError::ShortRow {
                    row,
                    expected: tickers.len() + 1,
                    got: record.len(),
                });
            }
            let date = record[0]
                .parse::<NaiveDate>()
                .map_err(|_| DataError::BadDate {
                    row,
                    value: record[0].to_string(),
                })?;
            if let Some(&previous) = dates.last() {
                if date <= previous {
                    return Err(DataError::OutOfOrder { row });
                }
            }
            let mut close_row = Vec::with_capacity(tickers.len());
            for (ticker, field) in tickers.iter().zip(record.iter().skip(1)) {
                let price = field.trim().parse::<f64>().map_err(|_| DataError::BadPrice {
                    row,
                    ticker: ticker.clone(),
                    value: field.to_string(),
                })?;
                close_row.push(price);
            }
            dates.push(date);
            prices.push(close_row);
        }

        if prices.len() < 2 {
            return Err(DataError::TooFewRows(prices.len()));
        }

        Ok(Self {
            tickers,
            dates,
            prices,
        })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn num_rows(&self) -> usize {
        self.prices.len()
    }

    /// Restricts the history to the inclusive `[start, end]` date window.
    /// `None` leaves the corresponding side open.
    pub fn window(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Self, DataError> {
        let keep: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, &date)| {
                start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
            })
            .map(|(i, _)| i)
            .collect();
        if keep.len() < 2 {
            return Err(DataError::TooFewRows(keep.len()));
        }
        Ok(Self {
            tickers: self.tickers.clone(),
            dates: keep.iter().map(|&i| self.dates[i]).collect(),
            prices: keep.iter().map(|&i| self.prices[i].clone()).collect(),
        })
    }

    /// Daily percentage-change returns, one row per consecutive date pair.
    pub fn daily_returns(&self) -> Vec<Vec<f64>> {
        self.prices
            .windows(2)
            .map(|pair| {
                pair[0]
                    .iter()
                    .zip(pair[1].iter())
                    .map(|(&previous, &current)| (current - previous) / previous)
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "\
date,AAA,BBB
2024-01-01,100.0,50.0
2024-01-02,110.0,50.0
2024-01-03,99.0,55.0
2024-01-04,99.0,44.0
";

    #[test]
    fn parses_the_fixture() {
        let history = PriceHistory::from_reader(FIXTURE.as_bytes()).unwrap();
        assert_eq!(history.tickers(), &["AAA".to_string(), "BBB".to_string()]);
        assert_eq!(history.num_rows(), 4);
        assert_eq!(history.dates()[0], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn returns_are_percentage_changes() {
        let history = PriceHistory::from_reader(FIXTURE.as_bytes()).unwrap();
        let returns = history.daily_returns();
        assert_eq!(returns.len(), 3);
        assert!((returns[0][0] - 0.10).abs() < 1e-12);
        assert!((returns[0][1] - 0.0).abs() < 1e-12);
        assert!((returns[1][0] - (-0.1)).abs() < 1e-12);
        assert!((returns[2][1] - (-0.2)).abs() < 1e-12);
    }

    #[test]
    fn window_slices_inclusively() {
        let history = PriceHistory::from_reader(FIXTURE.as_bytes()).unwrap();
        let sliced = history
            .window(
                NaiveDate::from_ymd_opt(2024, 1, 2),
                NaiveDate::from_ymd_opt(2024, 1, 3),
            )
            .unwrap();
        assert_eq!(sliced.num_rows(), 2);
        assert_eq!(sliced.dates()[0], NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());

        let open_ended = history.window(NaiveDate::from_ymd_opt(2024, 1, 3), None).unwrap();
        assert_eq!(open_ended.num_rows(), 2);
    }

    #[test]
    fn rejects_missing_date_header() {
        let err = PriceHistory::from_reader("day,AAA\n2024-01-01,1.0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::BadHeader(_)));
    }

    #[test]
    fn rejects_unparseable_prices() {
        let bad = "date,AAA\n2024-01-01,100.0\n2024-01-02,n/a\n";
        let err = PriceHistory::from_reader(bad.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::BadPrice { row: 3, .. }));
    }

    #[test]
    fn rejects_unsorted_dates() {
        let bad = "date,AAA\n2024-01-02,100.0\n2024-01-01,101.0\n";
        let err = PriceHistory::from_reader(bad.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::OutOfOrder { row: 3 }));
    }

    #[test]
    fn rejects_single_row_files() {
        let err = PriceHistory::from_reader("date,AAA\n2024-01-01,100.0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::TooFewRows(1)));
    }
}
