/// data.rs — End-of-day OHLC prices and log returns
///
/// Input is a daily CSV in the usual vendor layout
/// (`Date,Open,High,Low,Close[,Adj Close,Volume]`).  Column names are
/// matched case-insensitively and extra columns are ignored.
///
/// ALIGNMENT
///   bar index      0    1    2   …   n−1
///   return index        0    1   …   n−2      r_i = ln(close_{i+1} / close_i)
///
/// Everything downstream (conditional variance, realized estimators, future
/// volatility labels, forecasts) is indexed by the return index.
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GarchError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: Option<NaiveDate>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PriceBar {
    pub fn new(date: Option<NaiveDate>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self { date, open, high, low, close }
    }

    fn check(&self, row: usize) -> Result<()> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !(p.is_finite() && *p > 0.0)) {
            return Err(GarchError::Data(format!(
                "row {row}: prices must be positive and finite, got {prices:?}"
            )));
        }
        if self.high < self.low {
            return Err(GarchError::Data(format!(
                "row {row}: high {} below low {}",
                self.high, self.low
            )));
        }
        Ok(())
    }
}

/// One bar seen from its return: the bar's own OHLC plus the previous close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnBar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub prev_close: f64,
}

impl ReturnBar {
    /// ln(close / prev_close)
    #[inline]
    pub fn log_return(&self) -> f64 {
        (self.close / self.prev_close).ln()
    }

    /// ln(high / low)
    #[inline]
    pub fn log_range(&self) -> f64 {
        (self.high / self.low).ln()
    }
}

/// Chronological OHLC series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(bars: Vec<PriceBar>) -> Result<Self> {
        for (row, bar) in bars.iter().enumerate() {
            bar.check(row)?;
        }
        for (row, w) in bars.windows(2).enumerate() {
            if let (Some(a), Some(b)) = (w[0].date, w[1].date) {
                if b <= a {
                    return Err(GarchError::Data(format!(
                        "row {}: date {b} does not follow {a}",
                        row + 1
                    )));
                }
            }
        }
        Ok(Self { bars })
    }

    /// Series from closes only; open/high/low collapse onto the close.
    pub fn from_closes(closes: &[f64]) -> Result<Self> {
        Self::new(
            closes
                .iter()
                .map(|&c| PriceBar::new(None, c, c, c, c))
                .collect(),
        )
    }

    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
            .finish()?;

        let opens = float_column(&df, "open")?;
        let highs = float_column(&df, "high")?;
        let lows = float_column(&df, "low")?;
        let closes = float_column(&df, "close")?;
        let dates = date_column(&df)?;

        let bars = (0..df.height())
            .map(|i| {
                PriceBar::new(
                    dates.as_ref().map(|d| d[i]),
                    opens[i],
                    highs[i],
                    lows[i],
                    closes[i],
                )
            })
            .collect();
        let series = Self::new(bars)?;
        info!("Loaded {} bars from {}", series.len(), path.display());
        Ok(series)
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut df = df!(
            "Date" => self.bars.iter()
                .map(|b| b.date.map(|d| d.format(DATE_FORMAT).to_string()))
                .collect::<Vec<_>>(),
            "Open" => self.bars.iter().map(|b| b.open).collect::<Vec<_>>(),
            "High" => self.bars.iter().map(|b| b.high).collect::<Vec<_>>(),
            "Low" => self.bars.iter().map(|b| b.low).collect::<Vec<_>>(),
            "Close" => self.bars.iter().map(|b| b.close).collect::<Vec<_>>(),
        )?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut file = fs::File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn log_returns(&self) -> Vec<f64> {
        log_returns(&self.closes())
    }

    /// Bars 1..n paired with their previous close, on the return index.
    pub fn return_bars(&self) -> Vec<ReturnBar> {
        self.bars
            .windows(2)
            .map(|w| ReturnBar {
                open: w[1].open,
                high: w[1].high,
                low: w[1].low,
                close: w[1].close,
                prev_close: w[0].close,
            })
            .collect()
    }

    /// Date of each return (the date of the bar it ends on).
    pub fn return_dates(&self) -> Vec<Option<NaiveDate>> {
        self.bars.iter().skip(1).map(|b| b.date).collect()
    }
}

/// ln(c_t / c_{t−1}) for t ≥ 1.
pub fn log_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

fn find_column<'a>(df: &'a DataFrame, name: &str) -> Option<&'a Column> {
    df.get_columns()
        .iter()
        .find(|c| c.name().as_str().eq_ignore_ascii_case(name))
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = find_column(df, name)
        .ok_or_else(|| GarchError::Data(format!("missing required column '{name}'")))?;
    let cast = column.cast(&DataType::Float64)?;
    cast.f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| GarchError::Data(format!("row {row}: missing value in '{name}'")))
        })
        .collect()
}

fn date_column(df: &DataFrame) -> Result<Option<Vec<NaiveDate>>> {
    let Some(column) = find_column(df, "date") else {
        return Ok(None);
    };
    let cast = column.cast(&DataType::String)?;
    let dates = cast
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            let s = v.ok_or_else(|| GarchError::Data(format!("row {row}: missing date")))?;
            NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .map_err(|e| GarchError::Data(format!("row {row}: bad date '{s}': {e}")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(dates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn log_returns_of_closes() {
        let r = log_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 2);
        assert!((r[0] - (1.1f64).ln()).abs() < 1e-15);
        assert!((r[1] - (0.9f64).ln()).abs() < 1e-15);
        assert!(log_returns(&[100.0]).is_empty());
    }

    #[test]
    fn loads_vendor_layout_and_ignores_extra_columns() {
        let file = write_file(
            "Date,Open,High,Low,Close,Adj Close,Volume\n\
             2024-01-02,100,102,99,101,101,1000\n\
             2024-01-03,101,103,100,102,102,1200\n\
             2024-01-04,102,102.5,98,99,99,900\n",
        );
        let series = PriceSeries::from_csv(file.path()).unwrap();
        assert_eq!(series.len(), 3);
        let first = series.bars()[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!((first.open, first.high, first.low, first.close), (100.0, 102.0, 99.0, 101.0));
        assert_eq!(series.closes(), vec![101.0, 102.0, 99.0]);

        let rb = series.return_bars();
        assert_eq!(rb.len(), 2);
        assert_eq!(rb[1].prev_close, 102.0);
        assert_eq!(rb[1].close, 99.0);
        assert!((rb[0].log_return() - series.log_returns()[0]).abs() < 1e-15);
        assert_eq!(series.return_dates()[0], NaiveDate::from_ymd_opt(2024, 1, 3));
    }

    #[test]
    fn lowercase_headers_without_date() {
        let file = write_file("open,high,low,close\n1,2,0.5,1.5\n1.5,2,1,1.8\n");
        let series = PriceSeries::from_csv(file.path()).unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.bars().iter().all(|b| b.date.is_none()));
    }

    #[test]
    fn rejects_missing_column_and_bad_prices() {
        let file = write_file("Date,Open,High,Low\n2024-01-02,1,2,0.5\n");
        let err = PriceSeries::from_csv(file.path()).unwrap_err();
        assert!(err.to_string().contains("close"), "{err}");

        let file = write_file("Open,High,Low,Close\n1,2,0.5,0\n");
        assert!(matches!(PriceSeries::from_csv(file.path()), Err(GarchError::Data(_))));

        assert!(PriceSeries::new(vec![PriceBar::new(None, 1.0, 0.5, 0.9, 1.0)]).is_err());
    }

    #[test]
    fn rejects_out_of_order_dates() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day);
        let bars = vec![
            PriceBar::new(d(5), 1.0, 1.0, 1.0, 1.0),
            PriceBar::new(d(4), 1.0, 1.0, 1.0, 1.0),
        ];
        assert!(matches!(PriceSeries::new(bars), Err(GarchError::Data(_))));
    }

    #[test]
    fn csv_round_trip_preserves_bars() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day);
        let series = PriceSeries::new(vec![
            PriceBar::new(d(4), 10.0, 10.5, 9.5, 10.25),
            PriceBar::new(d(5), 10.25, 11.0, 10.0, 10.75),
        ])
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prices.csv");
        series.write_csv(&path).unwrap();
        assert_eq!(PriceSeries::from_csv(&path).unwrap(), series);
    }
}
