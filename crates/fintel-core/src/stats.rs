//! Small statistics helpers shared by the detectors and the forecaster
//!
//! Every function returns `None` instead of dividing by zero, so callers can
//! simply skip the output item.

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`, not `n - 1`)
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let mu = mean(values)?;
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Coefficient of variation (σ / μ)
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let mu = mean(values)?;
    if mu.abs() < f64::EPSILON {
        return None;
    }
    Some(population_std_dev(values)? / mu.abs())
}

/// Least-squares line fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination
    pub r_squared: f64,
}

/// Ordinary least squares of `ys` against their index (0, 1, 2, ...)
///
/// Needs at least two points and a non-constant series.
pub fn linear_regression(ys: &[f64]) -> Option<LinearFit> {
    let n = ys.len();
    if n < 2 {
        return None;
    }

    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let x_mean = mean(&xs)?;
    let y_mean = mean(ys)?;

    let ss_xy: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum();
    let ss_xx: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
    let ss_tot: f64 = ys.iter().map(|y| (y - y_mean).powi(2)).sum();

    if ss_xx == 0.0 || ss_tot == 0.0 {
        return None;
    }

    let slope = ss_xy / ss_xx;
    let intercept = y_mean - slope * x_mean;
    let ss_res: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
        .sum();

    Some(LinearFit {
        slope,
        intercept,
        r_squared: 1.0 - ss_res / ss_tot,
    })
}

/// Clamp into `[lo, hi]`, mapping NaN to `lo`
pub fn clamp_score(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std_dev() {
        let values = [10.0, 12.0, 11.0, 9.0, 500.0];
        assert!((mean(&values).unwrap() - 108.4).abs() < 1e-9);
        let sigma = population_std_dev(&values).unwrap();
        assert!((sigma - 38338.64_f64.sqrt()).abs() < 1e-9);
        assert!(mean(&[]).is_none());
        assert!(population_std_dev(&[]).is_none());
    }

    #[test]
    fn test_coefficient_of_variation() {
        assert_eq!(coefficient_of_variation(&[5.0, 5.0, 5.0]), Some(0.0));
        assert!(coefficient_of_variation(&[0.0, 0.0]).is_none());
        let cv = coefficient_of_variation(&[10.0, 20.0]).unwrap();
        assert!((cv - 5.0 / 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_regression_perfect_line() {
        let fit = linear_regression(&[100.0, 120.0, 140.0, 160.0]).unwrap();
        assert!((fit.slope - 20.0).abs() < 1e-9);
        assert!((fit.intercept - 100.0).abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_regression_degenerate() {
        assert!(linear_regression(&[42.0]).is_none());
        assert!(linear_regression(&[7.0, 7.0, 7.0]).is_none());
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(0.3, 0.5, 0.95), 0.5);
        assert_eq!(clamp_score(0.99, 0.5, 0.95), 0.95);
        assert_eq!(clamp_score(f64::NAN, 0.5, 0.95), 0.5);
    }
}
