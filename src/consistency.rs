//! Stability score of a wpm series: 100 minus the coefficient of variation
//! as a percentage, floored at 0.

fn mean(series: &[f64]) -> Option<f64> {
    if series.is_empty() {
        return None;
    }
    Some(series.iter().sum::<f64>() / series.len() as f64)
}

/// Population standard deviation around a known mean.
fn std_dev(series: &[f64], mean: f64) -> f64 {
    let variance = series
        .iter()
        .map(|x| (x - mean) * (x - mean))
        .sum::<f64>()
        / series.len() as f64;
    variance.sqrt()
}

pub fn consistency(wpm_history: &[u32]) -> u32 {
    if wpm_history.len() < 2 {
        return 0;
    }
    let series: Vec<f64> = wpm_history.iter().map(|&w| w as f64).collect();
    let Some(avg) = mean(&series) else {
        return 0;
    };
    if avg <= 0.0 {
        return 0;
    }
    let score = (100.0 - std_dev(&series, avg) / avg * 100.0).round();
    score.max(0.0) as u32
}
