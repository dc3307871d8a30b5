use serde::Serialize;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// Immutable double-precision complex value.
///
/// All arithmetic returns a new value. Division by a value of zero
/// magnitude is a caller precondition: the result contains infinities or
/// NaN and is not special-cased.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    /// Additive identity.
    pub const ZERO: Complex = Complex { re: 0.0, im: 0.0 };
    /// Multiplicative identity.
    pub const ONE: Complex = Complex { re: 1.0, im: 0.0 };

    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    pub const fn from_real(re: f64) -> Self {
        Self { re, im: 0.0 }
    }

    /// `cos(theta) + i·sin(theta)` (Euler's formula).
    pub fn exp_i(theta: f64) -> Self {
        Self::new(theta.cos(), theta.sin())
    }

    /// Complex exponential `e^(re + i·im)`.
    pub fn exp(self) -> Self {
        let scale = self.re.exp();
        Self::new(scale * self.im.cos(), scale * self.im.sin())
    }

    pub fn conjugate(self) -> Self {
        Self::new(self.re, -self.im)
    }

    pub fn reciprocal(self) -> Self {
        let scale = self.re * self.re + self.im * self.im;
        Self::new(self.re / scale, -self.im / scale)
    }

    pub fn magnitude(self) -> f64 {
        (self.re * self.re + self.im * self.im).sqrt()
    }
}

impl Add for Complex {
    type Output = Complex;

    fn add(self, rhs: Complex) -> Complex {
        Complex::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl AddAssign for Complex {
    fn add_assign(&mut self, rhs: Complex) {
        *self = *self + rhs;
    }
}

impl Sub for Complex {
    type Output = Complex;

    fn sub(self, rhs: Complex) -> Complex {
        Complex::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Neg for Complex {
    type Output = Complex;

    fn neg(self) -> Complex {
        Complex::new(-self.re, -self.im)
    }
}

impl Mul for Complex {
    type Output = Complex;

    fn mul(self, rhs: Complex) -> Complex {
        Complex::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

impl Mul<f64> for Complex {
    type Output = Complex;

    fn mul(self, rhs: f64) -> Complex {
        Complex::new(self.re * rhs, self.im * rhs)
    }
}

impl Div for Complex {
    type Output = Complex;

    fn div(self, rhs: Complex) -> Complex {
        self * rhs.reciprocal()
    }
}

impl Div<f64> for Complex {
    type Output = Complex;

    fn div(self, rhs: f64) -> Complex {
        self * (1.0 / rhs)
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}i", self.re, self.im)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn close(a: Complex, b: Complex) -> bool {
        (a.re - b.re).abs() < 1e-12 && (a.im - b.im).abs() < 1e-12
    }

    #[test]
    fn arithmetic() {
        let a = Complex::new(3.0, 4.0);
        let b = Complex::new(1.0, 2.0);

        assert_eq!(a + b, Complex::new(4.0, 6.0));
        assert_eq!(a - b, Complex::new(2.0, 2.0));
        assert_eq!(a * b, Complex::new(-5.0, 10.0));
        assert_eq!(a * 2.0, Complex::new(6.0, 8.0));
        assert_eq!(-a, Complex::new(-3.0, -4.0));
        assert!(close(a / 2.0, Complex::new(1.5, 2.0)));
        // (3+4i)/(1+2i) = 2.2 - 0.4i
        assert!(close(a / b, Complex::new(2.2, -0.4)));
    }

    #[test]
    fn magnitude_and_conjugate() {
        let c = Complex::new(3.0, 4.0);
        assert_eq!(c.magnitude(), 5.0);
        assert_eq!(c.conjugate(), Complex::new(3.0, -4.0));
        assert!(close(c * c.reciprocal(), Complex::ONE));
    }

    #[test]
    fn euler() {
        assert!(close(Complex::exp_i(0.0), Complex::ONE));
        assert!(close(Complex::exp_i(PI / 2.0), Complex::new(0.0, 1.0)));
        assert!(close(Complex::new(0.0, PI).exp(), Complex::new(-1.0, 0.0)));
        assert!((Complex::exp_i(1.234).magnitude() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_divisor_is_not_special_cased() {
        let q = Complex::ONE / Complex::ZERO;
        assert!(!q.re.is_finite());
    }

    #[test]
    fn accumulate() {
        let mut total = Complex::ZERO;
        for _ in 0..4 {
            total += Complex::new(0.5, -0.25);
        }
        assert_eq!(total, Complex::new(2.0, -1.0));
    }
}
