//! Small numeric helpers shared by the group, forecast and anomaly nodes.

use std::ops::Range;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Variance with `ddof` delta degrees of freedom; `None` if there are not
/// more than `ddof` values.
pub fn variance(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let mu = mean(values)?;
    let squares: f64 = values.iter().map(|v| (v - mu).powi(2)).sum();
    Some(squares / (values.len() - ddof) as f64)
}

pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    variance(values, ddof).map(f64::sqrt)
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Row range of a centered window of `width` around `index`, clipped to
/// `0..len`. Even widths reach one further back than forward.
pub fn centered_window(index: usize, len: usize, width: usize) -> Range<usize> {
    let width = width.max(1);
    let back = width / 2;
    let forward = width - back - 1;
    index.saturating_sub(back)..(index + forward + 1).min(len)
}

/// Ordinary least squares fit of `y = slope * x + intercept` over `x = 0..n`.
pub fn linear_fit(values: &[f64]) -> Option<(f64, f64)> {
    let n = values.len();
    match n {
        0 => None,
        1 => Some((0.0, values[0])),
        _ => {
            let x_mean = (n - 1) as f64 / 2.0;
            let y_mean = mean(values)?;
            let (num, den) = values
                .iter()
                .enumerate()
                .fold((0.0, 0.0), |(num, den), (i, y)| {
                    let dx = i as f64 - x_mean;
                    (num + dx * (y - y_mean), den + dx * dx)
                });
            let slope = num / den;
            Some((slope, y_mean - slope * x_mean))
        }
    }
}
