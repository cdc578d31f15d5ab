//! Vector utility functions like dot(), l2_norm(), max_abs() and trapezoid quadrature

/// Denominators closer to zero than this are clamped by [`safe_div`].
pub const ZERO_ERROR: f64 = 1e-8;

/// Division that never blows up on tiny denominators.
///
/// If `|b| < ZERO_ERROR`, `b` is replaced by `ZERO_ERROR` with the sign of `b`
/// (an exact zero counts as positive).
pub fn safe_div(a: f64, b: f64) -> f64 {
    if b.abs() < ZERO_ERROR {
        if b.is_sign_negative() && b != 0.0 {
            -a / ZERO_ERROR
        } else {
            a / ZERO_ERROR
        }
    } else {
        a / b
    }
}

/// Trapezoidal integral over the nodes `x` of the integrand `f(i)`,
/// multiplied by `mult`.
pub fn integrate_trapezoid_with<F>(x: &[f64], mult: f64, f: F) -> f64
where
    F: Fn(usize) -> f64,
{
    let mut out = 0.0;
    let mut prev = match x.first() {
        Some(_) => f(0),
        None => return 0.0,
    };
    for i in 1..x.len() {
        let curr = f(i);
        out += 0.5 * (x[i] - x[i - 1]) * (curr + prev);
        prev = curr;
    }
    out * mult
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Largest absolute value, 0 for an empty slice.
pub fn max_abs(vec: &[f64]) -> f64 {
    vec.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_div_regular() {
        assert_eq!(safe_div(6.0, 3.0), 2.0);
        assert_eq!(safe_div(-6.0, 3.0), -2.0);
    }

    #[test]
    fn test_safe_div_clamps_small_denominator() {
        assert!((safe_div(1.0, 1e-12) - 1e8).abs() < 1e-3);
        assert!((safe_div(1.0, -1e-12) + 1e8).abs() < 1e-3);
        assert!((safe_div(2.0, 0.0) - 2e8).abs() < 1e-3);
        assert!(safe_div(1.0, 0.0).is_finite());
    }

    #[test]
    fn test_integrate_trapezoid() {
        // Exact for linear functions
        let x: Vec<f64> = (0..11).map(|i| i as f64 / 10.0).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        assert!((integrate_trapezoid_with(&x, 1.0, |i| y[i]) - 2.0).abs() < 1e-12);
        assert!((integrate_trapezoid_with(&x, 0.5, |i| y[i]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_integrate_trapezoid_empty() {
        assert_eq!(integrate_trapezoid_with(&[], 1.0, |_| 1.0), 0.0);
        assert_eq!(integrate_trapezoid_with(&[1.0], 1.0, |_| 5.0), 0.0);
    }

    #[test]
    fn test_norms() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
        assert_eq!(l2_norm(&[3.0, 4.0]), 5.0);
        assert_eq!(max_abs(&[1.0, -7.0, 3.0]), 7.0);
        assert_eq!(max_abs(&[]), 0.0);
    }
}
