//! Small numeric helpers shared by the temporal aggregates

/// Population standard deviation; fewer than two values yield 0
pub fn standard_deviation(values: impl IntoIterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.into_iter().collect();
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Least-squares line fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRegression {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearRegression {
    /// Fit a line through `(x, y)` points; needs at least two points
    /// with distinct x values
    pub fn fit(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let points: Vec<(f64, f64)> = points.into_iter().collect();
        if points.len() < 2 {
            return None;
        }
        let n = points.len() as f64;
        let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

        let mut covariance = 0.0;
        let mut variance_x = 0.0;
        for (x, y) in &points {
            covariance += (x - mean_x) * (y - mean_y);
            variance_x += (x - mean_x) * (x - mean_x);
        }
        if variance_x == 0.0 {
            return None;
        }

        let slope = covariance / variance_x;
        Some(Self {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    /// Value of the fitted line at `x`
    pub fn extrapolate(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_deviation() {
        // Values 2, 4, 4, 4, 5, 5, 7, 9 have population sd 2
        let sd = standard_deviation([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((sd - 2.0).abs() < 1e-12);

        assert_eq!(standard_deviation([5.0]), 0.0);
        assert_eq!(standard_deviation([]), 0.0);
    }

    #[test]
    fn test_linear_regression_exact_line() {
        let fit = LinearRegression::fit([(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.extrapolate(3.0) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_linear_regression_degenerate() {
        assert!(LinearRegression::fit([(1.0, 1.0)]).is_none());
        assert!(LinearRegression::fit([(1.0, 1.0), (1.0, 2.0)]).is_none());
    }
}
