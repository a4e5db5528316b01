use crate::models::RtInterval;
use anyhow::{anyhow, bail, Context, Result};
use polars::prelude::*;
use serde::Deserialize;
use std::path::Path;

/// Source file layouts the loader understands, picked from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Parquet,
    Json,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "parquet" => Ok(FileFormat::Parquet),
            "json" => Ok(FileFormat::Json),
            other => bail!("Unsupported price file extension '{}' for {}", other, path.display()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HourlyJson {
    Bare(Vec<f64>),
    Wrapped { prices: Vec<f64> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntervalJson {
    Bare(Vec<RtInterval>),
    Wrapped { intervals: Vec<RtInterval> },
}

/// Loads price series into strongly typed records. Missing columns and null
/// cells are errors; nothing is defaulted. Length and ordering checks are
/// left to the optimizers.
pub struct DataLoader {
    format: Option<FileFormat>,
}

impl DataLoader {
    /// Detect the format from each file's extension.
    pub fn new() -> Self {
        Self { format: None }
    }

    pub fn with_format(format: FileFormat) -> Self {
        Self { format: Some(format) }
    }

    fn format_for(&self, path: &Path) -> Result<FileFormat> {
        match self.format {
            Some(format) => Ok(format),
            None => FileFormat::from_path(path),
        }
    }

    /// Load hourly prices from a `hour,price` table or a JSON array.
    pub fn load_hourly_prices(&self, path: &Path) -> Result<Vec<f64>> {
        let prices = match self.format_for(path)? {
            FileFormat::Json => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                match serde_json::from_str::<HourlyJson>(&text)
                    .with_context(|| format!("Invalid hourly price JSON in {}", path.display()))?
                {
                    HourlyJson::Bare(prices) | HourlyJson::Wrapped { prices } => prices,
                }
            }
            format => {
                let df = read_frame(path, format)?;
                let prices = f64_column(&df, "price")?;
                if df.column("hour").is_ok() {
                    let hours = usize_column(&df, "hour")?;
                    if let Some(row) = hours.iter().enumerate().position(|(row, hour)| row != *hour)
                    {
                        bail!(
                            "Row {} of {} is hour {}, expected {}",
                            row,
                            path.display(),
                            hours[row],
                            row
                        );
                    }
                }
                prices
            }
        };

        log::debug!("Loaded {} hourly prices from {}", prices.len(), path.display());
        Ok(prices)
    }

    /// Load five-minute LMP and AS clearing prices.
    pub fn load_intervals(&self, path: &Path) -> Result<Vec<RtInterval>> {
        let intervals = match self.format_for(path)? {
            FileFormat::Json => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                match serde_json::from_str::<IntervalJson>(&text)
                    .with_context(|| format!("Invalid interval JSON in {}", path.display()))?
                {
                    IntervalJson::Bare(intervals) | IntervalJson::Wrapped { intervals } => {
                        intervals
                    }
                }
            }
            format => intervals_from_frame(&read_frame(path, format)?)
                .with_context(|| format!("Invalid interval table in {}", path.display()))?,
        };

        log::debug!("Loaded {} intervals from {}", intervals.len(), path.display());
        Ok(intervals)
    }
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_frame(path: &Path, format: FileFormat) -> Result<DataFrame> {
    let df = match format {
        FileFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish(),
        FileFormat::Parquet => LazyFrame::scan_parquet(path, Default::default())?.collect(),
        FileFormat::Json => bail!("JSON files are not read as tables"),
    };
    df.with_context(|| format!("Failed to read {}", path.display()))
}

fn intervals_from_frame(df: &DataFrame) -> Result<Vec<RtInterval>> {
    let index = usize_column(df, "interval")?;
    let time = str_column(df, "time")?;
    let hour = usize_column(df, "hour")?;
    let lmp = f64_column(df, "lmp")?;
    let reg_up = f64_column(df, "regUpMCPC")?;
    let reg_down = f64_column(df, "regDownMCPC")?;
    let rrs = f64_column(df, "rrsMCPC")?;
    let ecrs = f64_column(df, "ecrsMCPC")?;
    let non_spin = f64_column(df, "nonSpinMCPC")?;

    Ok((0..df.height())
        .map(|row| RtInterval {
            interval: index[row],
            time: time[row].clone(),
            hour: hour[row],
            lmp: lmp[row],
            reg_up_mcpc: reg_up[row],
            reg_down_mcpc: reg_down[row],
            rrs_mcpc: rrs[row],
            ecrs_mcpc: ecrs[row],
            non_spin_mcpc: non_spin[row],
        })
        .collect())
}

pub(crate) fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df
        .column(name)
        .with_context(|| format!("Missing column '{}'", name))?
        .cast(&DataType::Float64)?;
    series
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| value.ok_or_else(|| anyhow!("Null '{}' at row {}", name, row)))
        .collect()
}

pub(crate) fn usize_column(df: &DataFrame, name: &str) -> Result<Vec<usize>> {
    let series = df
        .column(name)
        .with_context(|| format!("Missing column '{}'", name))?
        .cast(&DataType::Int64)?;
    series
        .i64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(v) if v >= 0 => Ok(v as usize),
            Some(v) => Err(anyhow!("Negative '{}' {} at row {}", name, v, row)),
            None => Err(anyhow!("Null '{}' at row {}", name, row)),
        })
        .collect()
}

pub(crate) fn str_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = df
        .column(name)
        .with_context(|| format!("Missing column '{}'", name))?;
    series
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Null '{}' at row {}", name, row))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AsPrices, INTERVALS_PER_DAY};
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_path(Path::new("day.CSV")).unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("a/b.parquet")).unwrap(), FileFormat::Parquet);
        assert_eq!(FileFormat::from_path(Path::new("x.json")).unwrap(), FileFormat::Json);
        assert!(FileFormat::from_path(Path::new("prices.xlsx")).is_err());
    }

    #[test]
    fn test_hourly_csv_with_integer_prices() {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = String::from("hour,price\n");
        for hour in 0..24 {
            csv.push_str(&format!("{},{}\n", hour, 20 + hour));
        }
        let path = write_file(&dir, "hourly.csv", &csv);

        let prices = DataLoader::new().load_hourly_prices(&path).unwrap();
        assert_eq!(prices.len(), 24);
        assert_eq!(prices[0], 20.0);
        assert_eq!(prices[23], 43.0);
    }

    #[test]
    fn test_hourly_csv_out_of_order_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "hourly.csv", "hour,price\n1,20.5\n0,30.0\n");
        assert!(DataLoader::new().load_hourly_prices(&path).is_err());
    }

    #[test]
    fn test_hourly_json_bare_and_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let bare = write_file(&dir, "bare.json", "[1.5, 2.5, 3.5]");
        let wrapped = write_file(&dir, "wrapped.json", r#"{"prices": [4.0, 5.0]}"#);

        let loader = DataLoader::new();
        assert_eq!(loader.load_hourly_prices(&bare).unwrap(), vec![1.5, 2.5, 3.5]);
        assert_eq!(loader.load_hourly_prices(&wrapped).unwrap(), vec![4.0, 5.0]);
    }

    #[test]
    fn test_interval_csv_round_trips_schema() {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = String::from("interval,time,hour,lmp,regUpMCPC,regDownMCPC,rrsMCPC,ecrsMCPC,nonSpinMCPC\n");
        for i in 0..INTERVALS_PER_DAY {
            csv.push_str(&format!(
                "{},{},{},{},7.5,3,9.25,21,2\n",
                i,
                RtInterval::time_label(i),
                i / 12,
                30.0 + i as f64 * 0.5
            ));
        }
        let path = write_file(&dir, "rt.csv", &csv);

        let intervals = DataLoader::new().load_intervals(&path).unwrap();
        assert_eq!(intervals.len(), INTERVALS_PER_DAY);
        assert_eq!(
            intervals[13],
            RtInterval::new(
                13,
                36.5,
                AsPrices {
                    reg_up: 7.5,
                    reg_down: 3.0,
                    rrs: 9.25,
                    ecrs: 21.0,
                    non_spin: 2.0,
                }
            )
        );
    }

    #[test]
    fn test_interval_csv_missing_column_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "rt.csv", "interval,time,hour,lmp\n0,00:00,0,25.0\n");
        let err = DataLoader::new().load_intervals(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("regUpMCPC"));
    }

    #[test]
    fn test_interval_json_uses_schema_keys() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{"intervals": [{"interval": 0, "time": "00:00", "hour": 0, "lmp": 22.1,
            "regUpMCPC": 1, "regDownMCPC": 2, "rrsMCPC": 3, "ecrsMCPC": 4, "nonSpinMCPC": 5}]}"#;
        let path = write_file(&dir, "rt.json", json);

        let intervals = DataLoader::new().load_intervals(&path).unwrap();
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].ecrs_mcpc, 4.0);
        assert_eq!(intervals[0].lmp, 22.1);
    }

    #[test]
    fn test_interval_json_missing_field_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"[{"interval": 0, "time": "00:00", "hour": 0, "lmp": 22.1}]"#;
        let path = write_file(&dir, "rt.json", json);
        assert!(DataLoader::new().load_intervals(&path).is_err());
    }
}
