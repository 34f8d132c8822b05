use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use std::collections::BTreeMap;

use bp_logger_data::models::derive;
use bp_logger_data::{Dataset, Reading};
use crate::entities::summary::{ColumnStats, ScatterPoint, TrendPoint, Trends, WeeklyRow, WeeklyTable, STATISTICS};

/// Default width of the trailing average window
pub const ROLLING_WINDOW_DAYS: i64 = 7;

/// Monday of the week containing `timestamp`
pub fn week_start(timestamp: NaiveDateTime) -> NaiveDate {
    let date = timestamp.date();
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Metrics aggregated per week, in column order
fn metric_names(include_pulse: bool) -> Vec<&'static str> {
    let mut names = vec!["systolic", "diastolic"];
    if include_pulse {
        names.push("pulse");
    }
    names.extend(["map", "pulse_pressure"]);
    names
}

fn metric_value(reading: &Reading, metric: &str) -> Option<f64> {
    match metric {
        "systolic" => Some(f64::from(reading.systolic)),
        "diastolic" => Some(f64::from(reading.diastolic)),
        "pulse" => reading.pulse.map(f64::from),
        "map" => Some(derive(reading.systolic, reading.diastolic).map),
        "pulse_pressure" => Some(f64::from(derive(reading.systolic, reading.diastolic).pulse_pressure)),
        _ => None,
    }
}

/// Per-week count, mean, min and max of every numeric column
pub fn weekly_summary(dataset: &Dataset) -> WeeklyTable {
    let metrics = metric_names(dataset.has_pulse());
    let columns = metrics
        .iter()
        .flat_map(|metric| STATISTICS.iter().map(move |stat| format!("{}_{}", metric, stat)))
        .collect();

    let mut weeks: BTreeMap<NaiveDate, Vec<&Reading>> = BTreeMap::new();
    for reading in dataset.iter() {
        weeks.entry(week_start(reading.timestamp)).or_default().push(reading);
    }

    let rows = weeks
        .into_iter()
        .map(|(week_start, readings)| {
            let stats: IndexMap<String, ColumnStats> = metrics
                .iter()
                .map(|metric| {
                    let values: Vec<f64> = readings.iter().filter_map(|r| metric_value(r, metric)).collect();
                    (metric.to_string(), ColumnStats::from_values(&values))
                })
                .collect();
            WeeklyRow {
                week_start,
                metrics: stats,
            }
        })
        .collect();

    WeeklyTable { columns, rows }
}

/// Trailing mean of systolic and diastolic over `(t - window, t]` for each reading.
///
/// Readings sharing a timestamp only see the ones before them in order.
pub fn rolling_averages(dataset: &Dataset, window: Duration) -> Vec<TrendPoint> {
    let mut readings: Vec<&Reading> = dataset.iter().collect();
    readings.sort_by_key(|r| r.timestamp);

    let mut points = Vec::with_capacity(readings.len());
    let mut start = 0;
    let mut systolic_sum = 0.0;
    let mut diastolic_sum = 0.0;

    for (end, reading) in readings.iter().enumerate() {
        systolic_sum += f64::from(reading.systolic);
        diastolic_sum += f64::from(reading.diastolic);

        while readings[start].timestamp <= reading.timestamp - window {
            systolic_sum -= f64::from(readings[start].systolic);
            diastolic_sum -= f64::from(readings[start].diastolic);
            start += 1;
        }

        let count = (end - start + 1) as f64;
        points.push(TrendPoint {
            timestamp: reading.timestamp,
            systolic: reading.systolic,
            diastolic: reading.diastolic,
            systolic_avg: systolic_sum / count,
            diastolic_avg: diastolic_sum / count,
        });
    }

    points
}

/// (systolic, diastolic) pairs in dataset order
pub fn scatter_points(dataset: &Dataset) -> Vec<ScatterPoint> {
    dataset
        .iter()
        .map(|r| ScatterPoint {
            systolic: r.systolic,
            diastolic: r.diastolic,
        })
        .collect()
}

/// Both chart views with the default window
pub fn trends(dataset: &Dataset) -> Trends {
    Trends {
        window_days: ROLLING_WINDOW_DAYS,
        series: rolling_averages(dataset, Duration::days(ROLLING_WINDOW_DAYS)),
        scatter: scatter_points(dataset),
    }
}
