//! Small numeric helpers shared by the view builder and diagnostics.
//!
//! Nothing here divides by zero: empty inputs yield `None`.

use std::cmp::Ordering;

/// Running arithmetic mean that skips undefined values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mean {
    sum: f64,
    count: u64,
}

impl Mean {
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn push_opt(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.push(v);
        }
    }

    pub fn value(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    let mut m = Mean::default();
    values.iter().for_each(|v| m.push(*v));
    m.value()
}

/// Median with the two middle values averaged for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean(&[]), None);
        assert_eq!(Mean::default().value(), None);
    }

    #[test]
    fn test_mean_skips_none() {
        let mut m = Mean::default();
        m.push_opt(Some(1.0));
        m.push_opt(None);
        m.push_opt(Some(3.0));
        assert_eq!(m.value(), Some(2.0));
    }

    #[test]
    fn test_median_odd_even() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[7.0]), Some(7.0));
        assert_eq!(median(&[9.0, 1.0, 5.0]), Some(5.0));
        assert_eq!(median(&[10.0, 1.0, 10.0, 1.0]), Some(5.5));
    }
}
