// =============================================================================
// CSV bar loader
// =============================================================================
//
// Reads a daily OHLC file with a header row.  Required columns: Date, Open,
// High, Low, Close (case-insensitive).  Any other column (Volume, Adj Close)
// is ignored.  Rows are sorted by date and a repeated date keeps its last
// occurrence, so merged downloads load cleanly.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::market_data::{Bar, BarSeries};

/// Column positions of the fields we read.
struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .with_context(|| format!("missing column '{name}'"))
        };
        Ok(Self {
            date: find("Date")?,
            open: find("Open")?,
            high: find("High")?,
            low: find("Low")?,
            close: find("Close")?,
        })
    }
}

/// Load the bar file at `path` into a validated series.
pub fn load_csv(path: impl AsRef<Path>) -> Result<BarSeries> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("failed to open bar file {}", path.display()))?;
    let series = read_bars(BufReader::new(file))
        .with_context(|| format!("failed to load bars from {}", path.display()))?;

    info!(
        path = %path.display(),
        bars = series.len(),
        last = ?series.last().map(|b| b.date),
        "bar file loaded"
    );
    Ok(series)
}

/// Parse CSV bars from any reader.
pub fn read_bars<R: Read>(reader: R) -> Result<BarSeries> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers().context("failed to read CSV header")?.clone();
    let cols = Columns::from_headers(&headers)?;

    let mut bars = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("malformed CSV row {}", row + 1))?;
        bars.push(
            parse_bar(&record, &cols).with_context(|| format!("invalid bar on row {}", row + 1))?,
        );
    }

    // Stable sort, then keep the last bar of each date.
    bars.sort_by_key(|b| b.date);
    let before = bars.len();
    let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match deduped.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => deduped.push(bar),
        }
    }
    if deduped.len() != before {
        debug!(dropped = before - deduped.len(), "duplicate dates collapsed");
    }

    Ok(BarSeries::new(deduped)?)
}

fn parse_bar(record: &csv::StringRecord, cols: &Columns) -> Result<Bar> {
    Ok(Bar::new(
        parse_date(field(record, cols.date, "Date")?)?,
        price(record, cols.open, "Open")?,
        price(record, cols.high, "High")?,
        price(record, cols.low, "Low")?,
        price(record, cols.close, "Close")?,
    ))
}

fn field<'a>(record: &'a csv::StringRecord, idx: usize, name: &str) -> Result<&'a str> {
    record
        .get(idx)
        .map(str::trim)
        .with_context(|| format!("missing field {name}"))
}

fn price(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64> {
    let raw = field(record, idx, name)?;
    let value: f64 = raw
        .parse()
        .with_context(|| format!("failed to parse {name} as f64: {raw}"))?;
    if !value.is_finite() {
        bail!("field {name} is not finite: {raw}");
    }
    Ok(value)
}

/// Accept `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(raw: &str) -> Result<NaiveDate> {
    let day = raw.split(|c| c == ' ' || c == 'T').next().unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .with_context(|| format!("failed to parse date: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_ohlc_and_ignores_volume() {
        let csv = "Date,Open,High,Low,Close,Adj Close,Volume\n\
                   2024-01-02,10,11,9,10.5,10.5,1000\n\
                   2024-01-03,10.5,12,10,11.5,11.5,2000\n";
        let series = read_bars(csv.as_bytes()).unwrap();
        assert_eq!(series.len(), 2);
        let b = series.bars()[1];
        assert_eq!(b.date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!((b.open, b.high, b.low, b.close), (10.5, 12.0, 10.0, 11.5));
    }

    #[test]
    fn sorts_and_keeps_last_duplicate() {
        let csv = "date,open,high,low,close\n\
                   2024-01-03,1,1,1,1\n\
                   2024-01-02,2,2,2,2\n\
                   2024-01-03,3,3,3,3\n";
        let series = read_bars(csv.as_bytes()).unwrap();
        let closes = series.closes();
        assert_eq!(closes, vec![2.0, 3.0]);
    }

    #[test]
    fn accepts_timestamps() {
        let csv = "Date,Open,High,Low,Close\n2024-01-02 00:00:00,1,2,0.5,1.5\n";
        let series = read_bars(csv.as_bytes()).unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn missing_column_is_an_error() {
        let csv = "Date,Open,High,Close\n2024-01-02,1,2,1.5\n";
        let err = read_bars(csv.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("missing column 'Low'"));
    }

    #[test]
    fn unparseable_price_is_an_error() {
        let csv = "Date,Open,High,Low,Close\n2024-01-02,1,abc,0.5,1.5\n";
        let err = read_bars(csv.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("High"));
    }

    #[test]
    fn load_csv_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Date,Open,High,Low,Close").unwrap();
        writeln!(file, "2024-01-02,1,2,0.5,1.5").unwrap();
        writeln!(file, "2024-01-03,1.5,2.5,1,2").unwrap();
        let series = load_csv(file.path()).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn load_csv_missing_file() {
        assert!(load_csv("/definitely/not/here.csv").is_err());
    }
}
