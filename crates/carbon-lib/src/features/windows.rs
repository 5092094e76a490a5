//! Per-partition window operations
//!
//! Both operations take the values of a single site partition, already in
//! timestamp order. Positions without enough history are `None`.

/// Value `k` readings back
pub fn lag(values: &[f64], k: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| if i >= k { Some(values[i - k]) } else { None })
        .collect()
}

/// Trailing mean over up to `window` readings, requiring `min_periods` readings
pub fn rolling_mean(values: &[f64], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            if slice.len() < min_periods.max(1) {
                return None;
            }
            Some(slice.iter().sum::<f64>() / slice.len() as f64)
        })
        .collect()
}
