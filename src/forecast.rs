use anyhow::{bail, Result};
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::charts::{daily_sales, format_date};
use crate::data::model::{Column, Dataset};

/// Projection horizon in days beyond the last observed date.
const HORIZON_DAYS: usize = 180;

/// Minimum number of distinct daily observations required to fit.
const MIN_OBSERVATIONS: usize = 6;

// ---------------------------------------------------------------------------
// Forecast artifact
// ---------------------------------------------------------------------------

/// The forecast artifact: predictions, a captured fit error, or nothing
/// (columns missing or too few observations). Serializes as
/// `{dates, predictions}` / `{error}` / `{}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ForecastArtifact {
    Ready {
        dates: Vec<String>,
        predictions: Vec<f64>,
    },
    Failed {
        error: String,
    },
    Empty {},
}

// ---------------------------------------------------------------------------
// Additive model: linear trend + day-of-week seasonality
// ---------------------------------------------------------------------------

/// Least-squares linear trend over day offsets plus additive day-of-week
/// components taken from mean residuals.
#[derive(Debug)]
struct SeasonalTrendModel {
    origin: NaiveDate,
    intercept: f64,
    slope: f64,
    weekday: [f64; 7],
}

impl SeasonalTrendModel {
    fn fit(series: &[(NaiveDate, f64)]) -> Result<Self> {
        if series.iter().any(|(_, y)| !y.is_finite()) {
            bail!("series contains non-finite values");
        }

        let origin = series[0].0;
        let n = series.len() as f64;
        let xs: Vec<f64> = series
            .iter()
            .map(|(d, _)| (*d - origin).num_days() as f64)
            .collect();

        let mean_x = xs.iter().sum::<f64>() / n;
        let mean_y = series.iter().map(|(_, y)| y).sum::<f64>() / n;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (x, (_, y)) in xs.iter().zip(series) {
            sxx += (x - mean_x) * (x - mean_x);
            sxy += (x - mean_x) * (y - mean_y);
        }
        if sxx == 0.0 {
            bail!("series has no spread in time");
        }
        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;

        // Mean residual per weekday; weekdays unseen in the data stay at 0.
        let mut sums = [0.0f64; 7];
        let mut counts = [0usize; 7];
        for (x, (d, y)) in xs.iter().zip(series) {
            let w = d.weekday().num_days_from_monday() as usize;
            sums[w] += y - (intercept + slope * x);
            counts[w] += 1;
        }
        let mut weekday = [0.0f64; 7];
        for w in 0..7 {
            if counts[w] > 0 {
                weekday[w] = sums[w] / counts[w] as f64;
            }
        }

        Ok(SeasonalTrendModel {
            origin,
            intercept,
            slope,
            weekday,
        })
    }

    fn predict(&self, date: NaiveDate) -> f64 {
        let x = (date - self.origin).num_days() as f64;
        let w = date.weekday().num_days_from_monday() as usize;
        self.intercept + self.slope * x + self.weekday[w]
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Fit the daily sales series and project the fixed horizon. Only the
/// projected future days are returned; a fit failure is captured in the
/// artifact and never propagates.
pub fn build_forecast(dataset: &Dataset) -> ForecastArtifact {
    if !dataset.schema.has_all(&[Column::Sales, Column::Date]) {
        return ForecastArtifact::Empty {};
    }

    let series: Vec<(NaiveDate, f64)> = daily_sales(dataset).into_iter().collect();
    if series.len() < MIN_OBSERVATIONS {
        return ForecastArtifact::Empty {};
    }

    let model = match SeasonalTrendModel::fit(&series) {
        Ok(m) => m,
        Err(err) => {
            return ForecastArtifact::Failed {
                error: format!("Forecast failed: {err}"),
            }
        }
    };

    let last = series.last().expect("series is non-empty").0;
    let mut dates = Vec::with_capacity(HORIZON_DAYS);
    let mut predictions = Vec::with_capacity(HORIZON_DAYS);
    for offset in 1..=HORIZON_DAYS {
        let date = last + Duration::days(offset as i64);
        dates.push(format_date(date));
        predictions.push(round2(model.predict(date)));
    }

    ForecastArtifact::Ready { dates, predictions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_csv;

    fn daily_csv(days: usize, value: impl Fn(usize) -> f64) -> Dataset {
        let mut csv = String::from("Date,Sales\n");
        for i in 0..days {
            let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                + Duration::days(i as i64);
            csv.push_str(&format!("{},{}\n", date.format("%Y-%m-%d"), value(i)));
        }
        load_csv(csv.as_bytes()).unwrap()
    }

    #[test]
    fn five_observations_yield_empty_artifact() {
        let ds = daily_csv(5, |i| 10.0 + i as f64);
        assert_eq!(build_forecast(&ds), ForecastArtifact::Empty {});
    }

    #[test]
    fn six_observations_fit_and_project_180_days() {
        let ds = daily_csv(6, |i| 10.0 + i as f64);
        match build_forecast(&ds) {
            ForecastArtifact::Ready { dates, predictions } => {
                assert_eq!(dates.len(), 180);
                assert_eq!(predictions.len(), 180);
                assert_eq!(dates[0], "2024-01-07"); // day after the last observation
                assert_eq!(dates[179], "2024-07-04");
            }
            other => panic!("expected predictions, got {other:?}"),
        }
    }

    #[test]
    fn linear_series_extrapolates_linearly() {
        // y = 10 + i over 14 days; prediction for day 14 is ~24.
        let ds = daily_csv(14, |i| 10.0 + i as f64);
        let ForecastArtifact::Ready { predictions, .. } = build_forecast(&ds) else {
            panic!("expected predictions");
        };
        assert!((predictions[0] - 24.0).abs() < 1e-6);
        assert!((predictions[6] - 30.0).abs() < 1e-6);
    }

    #[test]
    fn weekly_pattern_is_carried_into_the_projection() {
        // Flat level 100 with a +50 spike every Saturday, four full weeks.
        let ds = daily_csv(28, |i| {
            let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                + Duration::days(i as i64);
            if date.weekday() == chrono::Weekday::Sat {
                150.0
            } else {
                100.0
            }
        });
        let ForecastArtifact::Ready { dates, predictions } = build_forecast(&ds) else {
            panic!("expected predictions");
        };
        let sat_idx = dates
            .iter()
            .position(|d| {
                NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap().weekday()
                    == chrono::Weekday::Sat
            })
            .unwrap();
        let non_sat = predictions[(sat_idx + 1) % 7];
        assert!(predictions[sat_idx] > non_sat + 30.0);
    }

    #[test]
    fn non_finite_values_surface_as_error_artifact() {
        let mut ds = daily_csv(7, |i| 10.0 + i as f64);
        ds.records[3].sales = Some(f64::NAN);
        match build_forecast(&ds) {
            ForecastArtifact::Failed { error } => {
                assert!(error.starts_with("Forecast failed:"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn predictions_are_rounded_to_two_decimals() {
        let ds = daily_csv(10, |i| 10.0 + i as f64 * 0.3333);
        let ForecastArtifact::Ready { predictions, .. } = build_forecast(&ds) else {
            panic!("expected predictions");
        };
        for p in predictions {
            assert!((p * 100.0 - (p * 100.0).round()).abs() < 1e-9);
        }
    }
}
