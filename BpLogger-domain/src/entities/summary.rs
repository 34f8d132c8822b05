use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::Serialize;

/// Statistics names in column order
pub const STATISTICS: [&str; 4] = ["count", "mean", "min", "max"];

/// Count, mean, min and max of one metric within one week
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnStats {
    pub count: usize,
    /// `None` when `count` is zero
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                count: 0,
                mean: None,
                min: None,
                max: None,
            };
        }

        let sum: f64 = values.iter().sum();
        Self {
            count: values.len(),
            mean: Some(sum / values.len() as f64),
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
        }
    }

    fn get(&self, statistic: &str) -> Option<f64> {
        match statistic {
            "count" => Some(self.count as f64),
            "mean" => self.mean,
            "min" => self.min,
            "max" => self.max,
            _ => None,
        }
    }
}

/// One calendar week of aggregated readings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyRow {
    /// Monday the week starts on
    pub week_start: NaiveDate,
    /// Statistics per metric, in metric order
    pub metrics: IndexMap<String, ColumnStats>,
}

impl WeeklyRow {
    /// Value of a flattened `<metric>_<statistic>` column
    pub fn value(&self, column: &str) -> Option<f64> {
        let (metric, statistic) = column.rsplit_once('_')?;
        self.metrics.get(metric)?.get(statistic)
    }

    /// All `<metric>_<statistic>` columns in order
    pub fn flatten(&self) -> IndexMap<String, Option<f64>> {
        self.metrics
            .iter()
            .flat_map(|(metric, stats)| {
                STATISTICS
                    .iter()
                    .map(move |statistic| (format!("{}_{}", metric, statistic), stats.get(statistic)))
            })
            .collect()
    }
}

/// Weekly aggregate table, oldest week first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklyTable {
    /// Flattened column names, `<metric>_<statistic>`
    pub columns: Vec<String>,
    pub rows: Vec<WeeklyRow>,
}

impl WeeklyTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One reading on the time-series chart with its trailing averages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: NaiveDateTime,
    pub systolic: i32,
    pub diastolic: i32,
    pub systolic_avg: f64,
    pub diastolic_avg: f64,
}

/// One reading on the systolic/diastolic scatter chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScatterPoint {
    pub systolic: i32,
    pub diastolic: i32,
}

/// Data behind both trend charts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trends {
    /// Width of the rolling window in days
    pub window_days: i64,
    pub series: Vec<TrendPoint>,
    pub scatter: Vec<ScatterPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_stats() {
        let stats = ColumnStats::from_values(&[120.0, 130.0, 125.0]);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean, Some(125.0));
        assert_eq!(stats.min, Some(120.0));
        assert_eq!(stats.max, Some(130.0));

        let empty = ColumnStats::from_values(&[]);
        assert_eq!(empty.count, 0);
        assert_eq!(empty.mean, None);
    }

    #[test]
    fn test_flattened_columns() {
        let mut metrics = IndexMap::new();
        metrics.insert("systolic".to_string(), ColumnStats::from_values(&[120.0]));
        metrics.insert("pulse_pressure".to_string(), ColumnStats::from_values(&[40.0]));
        let row = WeeklyRow {
            week_start: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            metrics,
        };

        let flat = row.flatten();
        let names: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(names[..4], ["systolic_count", "systolic_mean", "systolic_min", "systolic_max"]);
        assert_eq!(row.value("pulse_pressure_mean"), Some(40.0));
        assert_eq!(row.value("pulse_pressure_median"), None);
    }
}
