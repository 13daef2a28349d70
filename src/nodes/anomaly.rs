use super::{numeric, single_input, stats};
use crate::error::{ConfigError, TransformError};
use crate::registry::config::invalid;
use crate::registry::{Arity, NodeConfig, NodeContext, NodeTransform};
use crate::table::{ColumnSet, Table, Value};
use serde::Deserialize;

pub const SCORE_COLUMN: &str = "anomaly_score";
pub const FLAG_COLUMN: &str = "is_anomaly";

fn default_method() -> String {
    "z_score".to_string()
}

fn default_threshold() -> f64 {
    3.0
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AnomalyConfig {
    field: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default = "default_threshold")]
    threshold: f64,
    #[serde(default)]
    window: Option<usize>,
    #[serde(default)]
    min_periods: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Method {
    ZScore,
    RollingZ { window: usize, min_periods: usize },
    Iqr { window: Option<usize> },
    MedianSpike { window: usize },
}

#[derive(Debug, Clone)]
struct Detector {
    field: String,
    method: Method,
    threshold: f64,
}

fn detector(config: &NodeConfig) -> Result<Detector, ConfigError> {
    let config: AnomalyConfig = config.parse()?;
    if config.window == Some(0) {
        return Err(invalid("window", "must be at least 1"));
    }
    let method = match config.method.trim().to_lowercase().as_str() {
        "z_score" => Method::ZScore,
        "rolling_z" => {
            let window = config.window.unwrap_or(7);
            Method::RollingZ {
                window,
                min_periods: config.min_periods.unwrap_or((window / 3).max(3)),
            }
        }
        "iqr" => Method::Iqr {
            window: config.window,
        },
        "median_spike" => Method::MedianSpike {
            window: config.window.unwrap_or(7),
        },
        other => {
            return Err(invalid(
                "method",
                format!("unknown anomaly method '{}'", other),
            ));
        }
    };
    if !config.threshold.is_finite() {
        return Err(invalid("threshold", "must be a finite number"));
    }
    Ok(Detector {
        field: config.field,
        method,
        threshold: config.threshold,
    })
}

/// The non-null values of a window.
fn present(x: &[Option<f64>]) -> Vec<f64> {
    x.iter().flatten().copied().collect()
}

fn z_scores(x: &[Option<f64>]) -> Vec<Option<f64>> {
    let values = present(x);
    let (Some(mu), Some(sigma)) = (stats::mean(&values), stats::std_dev(&values, 0)) else {
        return vec![None; x.len()];
    };
    if sigma == 0.0 {
        return x.iter().map(|v| v.map(|_| 0.0)).collect();
    }
    x.iter().map(|v| v.map(|v| (v - mu).abs() / sigma)).collect()
}

impl Method {
    /// One score per row; `None` where no score can be computed.
    fn scores(&self, x: &[Option<f64>]) -> Vec<Option<f64>> {
        let n = x.len();
        match *self {
            Method::ZScore => z_scores(x),
            Method::RollingZ {
                window,
                min_periods,
            } => {
                let global = z_scores(x);
                (0..n)
                    .map(|i| {
                        let local = present(&x[stats::centered_window(i, n, window)]);
                        let rolling = (local.len() >= min_periods)
                            .then(|| Some((stats::mean(&local)?, stats::std_dev(&local, 0)?)))
                            .flatten()
                            .and_then(|(mu, sigma)| x[i].map(|v| (v - mu).abs() / sigma))
                            .filter(|s| s.is_finite());
                        rolling.or(global[i])
                    })
                    .collect()
            }
            Method::Iqr { window } => {
                let global = present(x);
                (0..n)
                    .map(|i| {
                        let local = match window {
                            Some(w) if w > 1 => present(&x[stats::centered_window(i, n, w)]),
                            _ => global.clone(),
                        };
                        let q1 = stats::quantile(&local, 0.25)?;
                        let q3 = stats::quantile(&local, 0.75)?;
                        let v = x[i]?;
                        let distance = (q1 - v).max(v - q3).max(0.0);
                        Some(distance / (q3 - q1)).filter(|s| s.is_finite())
                    })
                    .collect()
            }
            Method::MedianSpike { window } => {
                let medians: Vec<Option<f64>> = (0..n)
                    .map(|i| stats::median(&present(&x[stats::centered_window(i, n, window)])))
                    .collect();
                let deviations: Vec<Option<f64>> = x
                    .iter()
                    .zip(&medians)
                    .map(|(v, m)| Some((v.as_ref()? - m.as_ref()?).abs()))
                    .collect();
                (0..n)
                    .map(|i| {
                        let window = stats::centered_window(i, n, window);
                        let mad = stats::median(&present(&deviations[window]))?;
                        Some(deviations[i]? / mad).filter(|s| s.is_finite())
                    })
                    .collect()
            }
        }
    }
}

/// Positions of the score and flag columns, appended unless the input
/// already has columns with those names.
fn plan(input: &ColumnSet) -> Result<(ColumnSet, usize, usize), TransformError> {
    let mut columns = input.clone();
    for name in [SCORE_COLUMN, FLAG_COLUMN] {
        if !columns.contains(name) {
            columns.push(name)?;
        }
    }
    let score = columns.require(SCORE_COLUMN)?;
    let flag = columns.require(FLAG_COLUMN)?;
    Ok((columns, score, flag))
}

/// Scores every row of a numeric column and flags the outliers.
pub struct Anomaly;

impl NodeTransform for Anomaly {
    fn node_type(&self) -> &str {
        "anomaly"
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
        let detector = detector(config)?;
        let field = input.columns().require(&detector.field)?;
        let (columns, score_at, flag_at) = plan(input.columns())?;

        let x = input
            .rows()
            .iter()
            .map(|row| numeric(&row[field], &detector.field, "anomaly"))
            .collect::<Result<Vec<_>, _>>()?;
        let scores = detector.method.scores(&x);

        let rows = input
            .rows()
            .iter()
            .zip(scores)
            .map(|(row, score)| {
                let score = score.unwrap_or(0.0);
                let mut out = row.clone();
                out.resize(columns.len(), Value::Null);
                out[score_at] = Value::Number(score);
                out[flag_at] = Value::Bool(score > detector.threshold);
                out
            })
            .collect();
        Table::new(columns, rows)
    }

    fn columns(
        &self,
        _ctx: &NodeContext,
        inputs: &[&ColumnSet],
        config: &NodeConfig,
    ) -> Result<ColumnSet, TransformError> {
        let input = single_input(inputs)?;
        detector(config)?;
        Ok(plan(input)?.0)
    }
}
