//! Closed-form densities used by the focus scheduler.

use core::f64::consts::PI;

/// Standard normal CDF, Abramowitz & Stegun 26.2.17 (|error| < 7.5e-8).
pub fn standard_normal_cdf(x: f64) -> f64 {
    let x_abs = x.abs();
    let t = 1.0 / (1.0 + 0.2316419 * x_abs);
    let d = 0.3989422804014327; // 1/sqrt(2*pi)
    let p = d * (-x_abs * x_abs / 2.0).exp();
    let poly = t
        * (0.319381530
            + t * (-0.356563782 + t * (1.781477937 + t * (-1.821255978 + t * 1.330274429))));
    if x >= 0.0 {
        1.0 - p * poly
    } else {
        p * poly
    }
}

pub fn standard_normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normal {
    pub loc: f64,
    pub scale: f64,
}

impl Normal {
    pub fn new(loc: f64, scale: f64) -> Self {
        Self { loc, scale }
    }

    pub fn pdf(&self, x: f64) -> f64 {
        standard_normal_pdf((x - self.loc) / self.scale) / self.scale
    }
}

/// Azzalini skew normal: `2/scale * phi(z) * Phi(shape * z)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewNormal {
    pub shape: f64,
    pub loc: f64,
    pub scale: f64,
}

impl SkewNormal {
    pub fn new(shape: f64, loc: f64, scale: f64) -> Self {
        Self { shape, loc, scale }
    }

    pub fn pdf(&self, x: f64) -> f64 {
        let z = (x - self.loc) / self.scale;
        2.0 / self.scale * standard_normal_pdf(z) * standard_normal_cdf(self.shape * z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_peak_and_symmetry() {
        let n = Normal::new(3.0, 1.0);
        assert!((n.pdf(3.0) - 0.398_942_280_4).abs() < 1e-9);
        assert!((n.pdf(2.0) - n.pdf(4.0)).abs() < 1e-12);
    }

    #[test]
    fn cdf_reference_points() {
        assert!((standard_normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((standard_normal_cdf(1.96) - 0.975_002).abs() < 1e-5);
        assert!((standard_normal_cdf(-1.0) - 0.158_655).abs() < 1e-5);
    }

    #[test]
    fn zero_shape_skew_normal_is_normal() {
        let s = SkewNormal::new(0.0, 1.5, 0.7);
        let n = Normal::new(1.5, 0.7);
        for x in [-1.0, 0.0, 1.0, 1.5, 2.5] {
            assert!((s.pdf(x) - n.pdf(x)).abs() < 1e-6);
        }
    }

    #[test]
    fn positive_shape_leans_right() {
        let s = SkewNormal::new(6.0, 0.0, 1.0);
        assert!(s.pdf(0.5) > s.pdf(-0.5));
        assert!(s.pdf(-1.0) < 1e-3);
        // Numerically integrates to one.
        let area: f64 = (-400..800).map(|k| s.pdf(k as f64 * 0.01) * 0.01).sum();
        assert!((area - 1.0).abs() < 1e-3, "area {area}");
    }
}
