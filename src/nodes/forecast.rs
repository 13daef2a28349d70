use super::{numeric, single_input, stats};
use crate::error::{ConfigError, TransformError};
use crate::registry::config::invalid;
use crate::registry::{Arity, NodeConfig, NodeContext, NodeTransform};
use crate::table::{ColumnSet, Table, Value};
use chrono::{NaiveDateTime, TimeDelta};
use serde::Deserialize;

pub const DATE_COLUMN: &str = "date";
pub const FORECAST_COLUMN: &str = "forecast";
pub const SOURCE_COLUMN: &str = "source";

/// Upper bound for `horizon` and `seasonal_periods`.
pub const MAX_STEPS: usize = 100_000;

fn default_ts_col() -> String {
    DATE_COLUMN.to_string()
}

fn default_horizon() -> usize {
    30
}

fn default_window() -> usize {
    3
}

fn default_alpha() -> f64 {
    0.2
}

fn default_beta() -> f64 {
    0.1
}

fn default_gamma() -> f64 {
    0.1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ForecastConfig {
    target: String,
    #[serde(default = "default_ts_col")]
    ts_col: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default = "default_horizon")]
    horizon: usize,
    #[serde(default = "default_window")]
    window: usize,
    #[serde(default = "default_alpha")]
    alpha: f64,
    #[serde(default = "default_beta")]
    beta: f64,
    #[serde(default = "default_gamma")]
    gamma: f64,
    #[serde(default)]
    seasonal_periods: Option<usize>,
    #[serde(default)]
    freq: Option<String>,
    #[serde(default)]
    combine: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Naive,
    Mean,
    MovingAverage,
    ExpSmoothing,
    LinearTrend,
    Holt,
    HoltWinters,
}

impl Method {
    fn parse(name: &str) -> Result<Self, ConfigError> {
        Ok(match name.trim().to_lowercase().as_str() {
            "naive" => Method::Naive,
            "mean" => Method::Mean,
            "moving_average" => Method::MovingAverage,
            "exp_smoothing" => Method::ExpSmoothing,
            "linear_trend" => Method::LinearTrend,
            "holt" => Method::Holt,
            "holt_winters" | "hw" => Method::HoltWinters,
            other => {
                return Err(invalid(
                    "method",
                    format!("unsupported forecast method '{}'", other),
                ));
            }
        })
    }
}

/// Validated forecast options.
#[derive(Debug, Clone)]
struct Settings {
    target: String,
    ts_col: String,
    method: Method,
    horizon: usize,
    window: usize,
    alpha: f64,
    beta: f64,
    gamma: f64,
    seasonal_periods: Option<usize>,
    step: Option<TimeDelta>,
    combine: bool,
}

fn settings(config: &NodeConfig) -> Result<Settings, ConfigError> {
    let config: ForecastConfig = config.parse()?;
    let method = match config.method.as_deref() {
        Some(name) => Method::parse(name)?,
        None if config.seasonal_periods.is_some() => Method::HoltWinters,
        None => Method::LinearTrend,
    };
    if !(1..=MAX_STEPS).contains(&config.horizon) {
        return Err(invalid(
            "horizon",
            format!("must be between 1 and {}", MAX_STEPS),
        ));
    }
    if config.window == 0 {
        return Err(invalid("window", "must be at least 1"));
    }
    if !(config.alpha > 0.0 && config.alpha <= 1.0) {
        return Err(invalid("alpha", "must be in (0, 1]"));
    }
    for (key, value) in [("beta", config.beta), ("gamma", config.gamma)] {
        if !(0.0..=1.0).contains(&value) {
            return Err(invalid(key, "must be in [0, 1]"));
        }
    }
    if config
        .seasonal_periods
        .is_some_and(|m| !(2..=MAX_STEPS).contains(&m))
    {
        return Err(invalid(
            "seasonal_periods",
            format!("must be between 2 and {}", MAX_STEPS),
        ));
    }
    let step = config.freq.as_deref().map(parse_freq).transpose()?;

    Ok(Settings {
        target: config.target,
        ts_col: config.ts_col,
        method,
        horizon: config.horizon,
        window: config.window,
        alpha: config.alpha,
        beta: config.beta,
        gamma: config.gamma,
        seasonal_periods: config.seasonal_periods,
        step,
        combine: config.combine,
    })
}

/// Parses a fixed frequency such as `D`, `2H`, `15min` or `W`.
fn parse_freq(freq: &str) -> Result<TimeDelta, ConfigError> {
    let freq = freq.trim();
    let split = freq
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(freq.len());
    let (count, unit) = freq.split_at(split);
    let count: i64 = if count.is_empty() {
        1
    } else {
        count
            .parse()
            .map_err(|_| invalid("freq", format!("bad count in '{}'", freq)))?
    };
    let unit = match unit {
        "D" | "d" => TimeDelta::try_days(1),
        "H" | "h" => TimeDelta::try_hours(1),
        "T" | "min" => TimeDelta::try_minutes(1),
        "S" | "s" => TimeDelta::try_seconds(1),
        "W" | "w" => TimeDelta::try_weeks(1),
        _ => None,
    }
    .ok_or_else(|| invalid("freq", format!("unsupported frequency '{}'", freq)))?;
    if count < 1 {
        return Err(invalid("freq", "count must be at least 1"));
    }
    let count = i32::try_from(count)
        .map_err(|_| invalid("freq", format!("frequency '{}' is too large", freq)))?;
    unit.checked_mul(count)
        .ok_or_else(|| invalid("freq", format!("frequency '{}' is too large", freq)))
}

/// Median spacing of sorted timestamps, falling back to one day.
fn infer_step(times: &[NaiveDateTime]) -> TimeDelta {
    let diffs: Vec<f64> = times
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds() as f64)
        .filter(|&ms| ms > 0.0)
        .collect();
    stats::median(&diffs)
        .and_then(|ms| TimeDelta::try_milliseconds(ms.round() as i64))
        .filter(|step| *step > TimeDelta::zero())
        .unwrap_or(TimeDelta::days(1))
}

/// Picks a season length from the autocorrelation peaks of the series.
pub fn detect_seasonal_periods(y: &[f64]) -> usize {
    const MAX_PERIOD: usize = 50;
    let n = y.len();
    if n < 4 {
        return 7;
    }
    let max_period = MAX_PERIOD.min(n / 2);
    let (Some(mu), Some(var)) = (stats::mean(y), stats::variance(y, 0)) else {
        return 7;
    };
    if max_period < 2 || var == 0.0 {
        return 7;
    }

    let autocorr: Vec<f64> = (1..=max_period)
        .map(|lag| {
            let c: f64 = y[..n - lag]
                .iter()
                .zip(&y[lag..])
                .map(|(a, b)| (a - mu) * (b - mu))
                .sum::<f64>()
                / (n - lag) as f64;
            c / var
        })
        .collect();

    let peak = (1..autocorr.len().saturating_sub(1))
        .filter(|&i| {
            autocorr[i] > autocorr[i - 1] && autocorr[i] > autocorr[i + 1] && autocorr[i] > 0.1
        })
        .max_by(|&a, &b| autocorr[a].total_cmp(&autocorr[b]))
        .map(|i| i + 1);
    if let Some(period) = peak.filter(|p| (2..=max_period).contains(p)) {
        return period;
    }

    match n {
        365.. => 365,
        52.. => 52,
        30.. => 30,
        14.. => 14,
        _ => 7,
    }
}

fn holt(y: &[f64], horizon: usize, alpha: f64, beta: f64) -> Vec<f64> {
    let mut level = y[0];
    let mut trend = if y.len() > 1 { y[1] - y[0] } else { 0.0 };
    for &value in &y[1..] {
        let previous = level;
        level = alpha * value + (1.0 - alpha) * (level + trend);
        trend = beta * (level - previous) + (1.0 - beta) * trend;
    }
    (1..=horizon).map(|h| level + h as f64 * trend).collect()
}

/// Additive Holt-Winters with season length `m`; needs at least two seasons.
fn holt_winters(
    y: &[f64],
    horizon: usize,
    m: usize,
    alpha: f64,
    beta: f64,
    gamma: f64,
) -> Vec<f64> {
    let n = y.len();
    let first = stats::mean(&y[..m]).unwrap_or(0.0);
    let second = stats::mean(&y[m..2 * m]).unwrap_or(first);
    let mut level = first;
    let mut trend = (second - first) / m as f64;
    let mut season: Vec<f64> = y[..m].iter().map(|v| v - first).collect();

    for t in m..n {
        let previous = level;
        let seasonal = season[t - m];
        level = alpha * (y[t] - seasonal) + (1.0 - alpha) * (level + trend);
        trend = beta * (level - previous) + (1.0 - beta) * trend;
        season.push(gamma * (y[t] - level) + (1.0 - gamma) * seasonal);
    }

    (1..=horizon)
        .map(|h| level + h as f64 * trend + season[n - m + (h - 1) % m])
        .collect()
}

impl Settings {
    fn predict(&self, y: &[f64]) -> Vec<f64> {
        let h = self.horizon;
        match self.method {
            Method::Naive => vec![y[y.len() - 1]; h],
            Method::Mean => vec![stats::mean(y).unwrap_or(f64::NAN); h],
            Method::MovingAverage => {
                let mut buffer: Vec<f64> = y[y.len().saturating_sub(self.window)..].to_vec();
                (0..h)
                    .map(|_| {
                        let tail = &buffer[buffer.len().saturating_sub(self.window)..];
                        let next = stats::mean(tail).unwrap_or(f64::NAN);
                        buffer.push(next);
                        next
                    })
                    .collect()
            }
            Method::ExpSmoothing => {
                let smoothed = y
                    .iter()
                    .fold(y[0], |s, v| self.alpha * v + (1.0 - self.alpha) * s);
                vec![smoothed; h]
            }
            Method::LinearTrend => {
                let (slope, intercept) = stats::linear_fit(y).unwrap_or((0.0, y[0]));
                (0..h)
                    .map(|k| slope * (y.len() + k) as f64 + intercept)
                    .collect()
            }
            Method::Holt => holt(y, h, self.alpha, self.beta),
            Method::HoltWinters => {
                let mut m = self
                    .seasonal_periods
                    .unwrap_or_else(|| detect_seasonal_periods(y));
                if y.len() < 2 * m {
                    m = (y.len() / 3).max(2);
                }
                if y.len() < 2 * m {
                    holt(y, h, self.alpha, self.beta)
                } else {
                    holt_winters(y, h, m, self.alpha, self.beta, self.gamma)
                }
            }
        }
    }
}

fn output_columns() -> ColumnSet {
    ColumnSet::from_names([DATE_COLUMN, FORECAST_COLUMN, SOURCE_COLUMN]).unwrap_or_default()
}

/// Extends a numeric series with predicted rows; optionally keeps the history.
pub struct Forecast;

impl NodeTransform for Forecast {
    fn node_type(&self) -> &str {
        "forecast"
    }

    fn arity(&self) -> Arity {
        Arity::Exactly(1)
    }

    fn run(
        &self,
        _ctx: &NodeContext,
        inputs: &[&Table],
        config: &NodeConfig,
    ) -> Result<Table, TransformError> {
        let input = single_input(inputs)?;
        let settings = settings(config)?;
        let ts = input.columns().require(&settings.ts_col)?;
        let target = input.columns().require(&settings.target)?;

        let mut series: Vec<(&Value, f64)> = Vec::with_capacity(input.row_count());
        for row in input.rows() {
            if row[ts].is_null() {
                continue;
            }
            if let Some(y) = numeric(&row[target], &settings.target, "forecast")? {
                series.push((&row[ts], y));
            }
        }
        if series.is_empty() {
            return Err(TransformError::Failed(format!(
                "no rows with both '{}' and '{}' to forecast from",
                settings.ts_col, settings.target
            )));
        }

        let times: Option<Vec<NaiveDateTime>> =
            series.iter().map(|(t, _)| t.as_timestamp()).collect();
        let history: Vec<(Value, f64)> = match times {
            Some(times) => {
                let mut points: Vec<(NaiveDateTime, f64)> =
                    times.into_iter().zip(series.iter().map(|(_, y)| *y)).collect();
                points.sort_by_key(|(t, _)| *t);
                points.into_iter().map(|(t, y)| (Value::Timestamp(t), y)).collect()
            }
            None => {
                series.sort_by(|a, b| a.0.total_cmp(b.0));
                series.into_iter().map(|(t, y)| (t.clone(), y)).collect()
            }
        };

        let y: Vec<f64> = history.iter().map(|(_, y)| *y).collect();
        let predictions = settings.predict(&y);

        let future: Vec<Value> = match history.last().map(|(t, _)| t) {
            Some(Value::Timestamp(last)) => {
                let times: Vec<NaiveDateTime> = history
                    .iter()
                    .filter_map(|(t, _)| t.as_timestamp())
                    .collect();
                let step = settings.step.unwrap_or_else(|| infer_step(&times));
                let steps = i32::try_from(settings.horizon)
                    .map_err(|_| invalid("horizon", "too many steps for a date range"))?;
                (1..=steps)
                    .map(|k| {
                        step.checked_mul(k)
                            .and_then(|offset| last.checked_add_signed(offset))
                            .map_or(Value::Null, Value::Timestamp)
                    })
                    .collect()
            }
            _ => (0..settings.horizon)
                .map(|k| Value::Number((history.len() + k) as f64))
                .collect(),
        };

        let mut rows = Vec::with_capacity(settings.horizon + history.len());
        if settings.combine {
            rows.extend(history.into_iter().map(|(t, y)| {
                vec![t, Value::Number(y), Value::from("history")]
            }));
        }
        rows.extend(future.into_iter().zip(predictions).map(|(t, p)| {
            let p = if p.is_finite() { Value::Number(p) } else { Value::Null };
            vec![t, p, Value::from("forecast")]
        }));
        Table::new(output_columns(), rows)
    }

    fn columns(
        &self,
        _ctx: &NodeContext,
        inputs: &[&ColumnSet],
        config: &NodeConfig,
    ) -> Result<ColumnSet, TransformError> {
        single_input(inputs)?;
        settings(config)?;
        Ok(output_columns())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_method(method: Method, horizon: usize) -> Settings {
        Settings {
            target: "y".to_string(),
            ts_col: "date".to_string(),
            method,
            horizon,
            window: 3,
            alpha: 0.5,
            beta: 0.1,
            gamma: 0.1,
            seasonal_periods: None,
            step: None,
            combine: false,
        }
    }

    #[test]
    fn frequencies_parse_with_counts() {
        assert_eq!(parse_freq("D").unwrap(), TimeDelta::days(1));
        assert_eq!(parse_freq("2H").unwrap(), TimeDelta::hours(2));
        assert_eq!(parse_freq("15min").unwrap(), TimeDelta::minutes(15));
        assert!(parse_freq("M").is_err());
        assert!(parse_freq("0D").is_err());
    }

    #[test]
    fn oversized_counts_are_rejected() {
        assert!(matches!(
            parse_freq("4294967297D"),
            Err(ConfigError::Invalid { key, .. }) if key == "freq"
        ));
        assert!(parse_freq("99999999999999999999D").is_err());
    }

    #[test]
    fn simple_methods() {
        let y = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(with_method(Method::Naive, 2).predict(&y), vec![4.0, 4.0]);
        assert_eq!(with_method(Method::Mean, 1).predict(&y), vec![2.5]);
        assert_eq!(
            with_method(Method::MovingAverage, 2).predict(&y),
            vec![3.0, 10.0 / 3.0]
        );
        let trend = with_method(Method::LinearTrend, 2).predict(&y);
        assert!((trend[0] - 5.0).abs() < 1e-9 && (trend[1] - 6.0).abs() < 1e-9);
    }

    #[test]
    fn weekly_pattern_is_detected() {
        let y: Vec<f64> = (0..70).map(|i| if i % 7 == 0 { 10.0 } else { 1.0 }).collect();
        assert_eq!(detect_seasonal_periods(&y) % 7, 0);
    }

    #[test]
    fn short_series_fall_back_to_holt() {
        let y = [1.0, 2.0, 3.0];
        let hw = with_method(Method::HoltWinters, 2).predict(&y);
        assert_eq!(hw, holt(&y, 2, 0.5, 0.1));
    }
}
