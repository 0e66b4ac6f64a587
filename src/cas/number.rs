//! Exact rational numbers with a floating-point escape hatch.
//!
//! Arithmetic stays exact while both operands are rationals and nothing
//! overflows `i128`; otherwise the result degrades to `f64`.

use std::cmp::Ordering;
use std::fmt;

/// A numeric constant inside an expression tree.
///
/// Rationals are always normalised: the denominator is positive and the
/// fraction is fully reduced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Rational(i128, i128),
    Float(f64),
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl Number {
    pub const ZERO: Number = Number::Rational(0, 1);
    pub const ONE: Number = Number::Rational(1, 1);
    pub const MINUS_ONE: Number = Number::Rational(-1, 1);

    pub fn int(n: i128) -> Self {
        Number::Rational(n, 1)
    }

    /// Build a reduced fraction. Returns `None` for a zero denominator.
    pub fn rational(num: i128, den: i128) -> Option<Self> {
        if den == 0 {
            return None;
        }
        let g = gcd(num, den).max(1);
        let (mut n, mut d) = (num / g, den / g);
        if d < 0 {
            n = n.checked_neg()?;
            d = d.checked_neg()?;
        }
        Some(Number::Rational(n, d))
    }

    /// Convert a float into an exact rational when its shortest decimal
    /// representation fits, so that `0.5` becomes `1/2`.
    pub fn from_f64(x: f64) -> Self {
        if !x.is_finite() {
            return Number::Float(x);
        }
        parse_decimal(&format!("{}", x)).unwrap_or(Number::Float(x))
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Number::Rational(n, d) => n as f64 / d as f64,
            Number::Float(x) => x,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Rational(n, _) => n == 0,
            Number::Float(x) => x == 0.0,
        }
    }

    pub fn is_one(self) -> bool {
        match self {
            Number::Rational(n, d) => n == 1 && d == 1,
            Number::Float(x) => x == 1.0,
        }
    }

    pub fn is_negative(self) -> bool {
        match self {
            Number::Rational(n, _) => n < 0,
            Number::Float(x) => x < 0.0,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Number::Rational(_, 1))
    }

    pub fn as_integer(self) -> Option<i128> {
        match self {
            Number::Rational(n, 1) => Some(n),
            _ => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Number::Float(_))
    }

    pub fn neg(self) -> Self {
        match self {
            Number::Rational(n, d) => match n.checked_neg() {
                Some(n) => Number::Rational(n, d),
                None => Number::Float(-(n as f64) / d as f64),
            },
            Number::Float(x) => Number::Float(-x),
        }
    }

    pub fn abs(self) -> Self {
        if self.is_negative() {
            self.neg()
        } else {
            self
        }
    }

    pub fn add(self, other: Number) -> Self {
        if let (Number::Rational(a, b), Number::Rational(c, d)) = (self, other) {
            let exact = a
                .checked_mul(d)
                .zip(c.checked_mul(b))
                .and_then(|(x, y)| x.checked_add(y))
                .zip(b.checked_mul(d))
                .and_then(|(n, d)| Number::rational(n, d));
            if let Some(n) = exact {
                return n;
            }
        }
        Number::Float(self.to_f64() + other.to_f64())
    }

    pub fn sub(self, other: Number) -> Self {
        self.add(other.neg())
    }

    pub fn mul(self, other: Number) -> Self {
        if let (Number::Rational(a, b), Number::Rational(c, d)) = (self, other) {
            let exact = a
                .checked_mul(c)
                .zip(b.checked_mul(d))
                .and_then(|(n, d)| Number::rational(n, d));
            if let Some(n) = exact {
                return n;
            }
        }
        Number::Float(self.to_f64() * other.to_f64())
    }

    /// Division; `None` when dividing by zero.
    pub fn div(self, other: Number) -> Option<Self> {
        if other.is_zero() {
            return None;
        }
        Some(self.mul(other.recip()?))
    }

    pub fn recip(self) -> Option<Self> {
        match self {
            Number::Rational(n, d) => Number::rational(d, n),
            Number::Float(x) if x != 0.0 => Some(Number::Float(1.0 / x)),
            Number::Float(_) => None,
        }
    }

    /// Raise to a power, exactly where possible.
    ///
    /// Returns `None` when the result has no exact finite value worth
    /// folding (irrational roots, `0 ** -n`, even roots of negatives);
    /// the caller keeps such powers symbolic.
    pub fn pow(self, exp: Number) -> Option<Self> {
        match (self, exp) {
            (Number::Rational(_, _), Number::Rational(p, 1)) => self.pow_int(p),
            (Number::Rational(a, b), Number::Rational(p, q)) => {
                let ra = int_root(a, q)?;
                let rb = int_root(b, q)?;
                Number::rational(ra, rb)?.pow_int(p)
            }
            _ => {
                let r = self.to_f64().powf(exp.to_f64());
                r.is_finite().then_some(Number::Float(r))
            }
        }
    }

    fn pow_int(self, p: i128) -> Option<Self> {
        let (base, p) = if p < 0 {
            (self.recip()?, p.checked_neg()?)
        } else {
            (self, p)
        };
        let Number::Rational(a, b) = base else {
            return None;
        };
        let exact = u32::try_from(p)
            .ok()
            .and_then(|p| a.checked_pow(p).zip(b.checked_pow(p)))
            .and_then(|(n, d)| Number::rational(n, d));
        match exact {
            Some(n) => Some(n),
            None => {
                let r = base.to_f64().powf(p as f64);
                r.is_finite().then_some(Number::Float(r))
            }
        }
    }
}

/// Exact integer `q`-th root, if one exists.
fn int_root(value: i128, q: i128) -> Option<i128> {
    let q32 = u32::try_from(q).ok().filter(|q| *q > 0)?;
    if value < 0 && q % 2 == 0 {
        return None;
    }
    let approx = (value.abs() as f64).powf(1.0 / q as f64).round() as i128;
    let sign = if value < 0 { -1 } else { 1 };
    for candidate in [approx - 1, approx, approx + 1] {
        if candidate < 0 {
            continue;
        }
        if candidate.checked_pow(q32) == Some(value.abs()) {
            return Some(sign * candidate);
        }
    }
    None
}

/// Parse a decimal literal such as `42`, `-2.5` or `1.5e-3` into an exact
/// rational. Returns `None` for malformed input or when it does not fit.
pub fn parse_decimal(text: &str) -> Option<Number> {
    let (mantissa, exponent) = match text.find(|c: char| c == 'e' || c == 'E') {
        Some(i) => (&text[..i], text[i + 1..].parse::<i32>().ok()?),
        None => (text, 0),
    };
    let (negative, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, mantissa),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let digits = format!("{}{}", int_part, frac_part);
    let mut num: i128 = digits.parse().ok()?;
    if negative {
        num = -num;
    }
    let scale = exponent - frac_part.len() as i32;
    let factor = 10i128.checked_pow(scale.unsigned_abs())?;
    if scale >= 0 {
        Number::rational(num.checked_mul(factor)?, 1)
    } else {
        Number::rational(num, factor)
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::Rational(a, b), Number::Rational(c, d)) => {
                match a.checked_mul(*d).zip(c.checked_mul(*b)) {
                    Some((x, y)) => Some(x.cmp(&y)),
                    None => self.to_f64().partial_cmp(&other.to_f64()),
                }
            }
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Rational(n, 1) => write!(f, "{}", n),
            Number::Rational(n, d) => write!(f, "{}/{}", n, d),
            Number::Float(x) if x.fract() == 0.0 && x.abs() < 1e16 => write!(f, "{:.1}", x),
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}
