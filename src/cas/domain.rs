//! Where an integrand is defined on a closed real interval.
//!
//! A definite integral goes through the antiderivative only when the
//! integrand has no pole on the interval and never leaves the real domain of
//! `log`, `tan`, fractional powers or the inverse sines. Zeros of polynomial
//! and sine/cosine subexpressions are located analytically. Anything whose
//! zeros cannot be located is refused.

use super::expr::{add, expand, neg, Expr, Func};
use super::CasError;
use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, PI};

const BISECTION_STEPS: usize = 200;
const MAX_POLY_DEGREE: usize = 64;
const RELATIVE_TOLERANCE: f64 = 1e-12;

/// Fail unless `expr` is finite and real everywhere on the interval between
/// `a` and `b` (in either order).
pub(crate) fn check_defined(expr: &Expr, var: &str, a: f64, b: f64) -> Result<(), CasError> {
    let interval = Interval {
        var,
        lo: a.min(b),
        hi: a.max(b),
    };
    interval.check(expr)
}

/// Behaviour of a subexpression on the interval.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sign {
    /// Vanishes somewhere on the closed interval.
    zero: bool,
    /// Is negative somewhere on the interval.
    negative: bool,
}

impl Sign {
    const POSITIVE: Sign = Sign {
        zero: false,
        negative: false,
    };
}

struct Interval<'a> {
    var: &'a str,
    lo: f64,
    hi: f64,
}

impl Interval<'_> {
    fn check(&self, expr: &Expr) -> Result<(), CasError> {
        match expr {
            Expr::Num(_) | Expr::Const(_) | Expr::Sym(_) => Ok(()),
            Expr::Add(items) | Expr::Mul(items) => items.iter().try_for_each(|e| self.check(e)),
            Expr::Pow(base, exp) => {
                self.check(base)?;
                self.check(exp)?;
                self.check_power(base, exp)
            }
            Expr::Call(func, arg) => {
                self.check(arg)?;
                self.check_call(*func, arg)
            }
        }
    }

    fn check_power(&self, base: &Expr, exp: &Expr) -> Result<(), CasError> {
        if base.is_free_of(self.var) {
            if exp.is_free_of(self.var) {
                return Ok(());
            }
            // c**x needs c > 0
            return match base.evaluate(&HashMap::new()) {
                Some(c) if c <= 0.0 => Err(self.outside_domain(base)),
                _ => Ok(()),
            };
        }
        match exp.as_number().map(|n| n.to_f64()) {
            Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(()),
            Some(n) => {
                let sign = self.sign(base)?;
                if n < 0.0 && sign.zero {
                    return Err(self.pole(base));
                }
                if n.fract() != 0.0 && sign.negative {
                    return Err(self.outside_domain(base));
                }
                Ok(())
            }
            None => {
                let sign = self.sign(base)?;
                if sign.zero || sign.negative {
                    return Err(self.outside_domain(base));
                }
                Ok(())
            }
        }
    }

    fn check_call(&self, func: Func, arg: &Expr) -> Result<(), CasError> {
        if arg.is_free_of(self.var) {
            return Ok(());
        }
        match func {
            Func::Log => {
                let sign = self.sign(arg)?;
                if sign.zero {
                    Err(self.pole(arg))
                } else if sign.negative {
                    Err(self.outside_domain(arg))
                } else {
                    Ok(())
                }
            }
            Func::Tan => {
                let cos = Expr::Call(Func::Cos, Box::new(arg.clone()));
                if self.trig_sign(Func::Cos, arg, &cos)?.zero {
                    Err(self.pole(&cos))
                } else {
                    Ok(())
                }
            }
            Func::Asin | Func::Acos => {
                let below = add(vec![Expr::one(), neg(arg.clone())]);
                let above = add(vec![Expr::one(), arg.clone()]);
                if self.sign(&below)?.negative || self.sign(&above)?.negative {
                    Err(self.outside_domain(arg))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    fn sign(&self, e: &Expr) -> Result<Sign, CasError> {
        if e.is_free_of(self.var) {
            return match e.evaluate(&HashMap::new()) {
                Some(v) => Ok(Sign {
                    zero: v == 0.0,
                    negative: v < 0.0,
                }),
                None => Err(self.undecidable(e)),
            };
        }
        if let Some(coeffs) = self.polynomial(e) {
            return Ok(self.polynomial_sign(&coeffs));
        }
        match e {
            Expr::Call(Func::Exp | Func::Cosh, _) => Ok(Sign::POSITIVE),
            Expr::Call(func @ (Func::Sin | Func::Cos), arg) => self.trig_sign(*func, arg, e),
            Expr::Pow(base, _) if base.is_free_of(self.var) => {
                match base.evaluate(&HashMap::new()) {
                    Some(c) if c > 0.0 => Ok(Sign::POSITIVE),
                    _ => Err(self.undecidable(e)),
                }
            }
            Expr::Pow(base, exp) => {
                let inner = self.sign(base)?;
                match exp.as_number().map(|n| n.to_f64()) {
                    Some(n) if n.fract() == 0.0 => Ok(Sign {
                        zero: inner.zero,
                        negative: inner.negative && n % 2.0 != 0.0,
                    }),
                    Some(_) => Ok(Sign {
                        zero: inner.zero,
                        negative: false,
                    }),
                    None if inner == Sign::POSITIVE => Ok(Sign::POSITIVE),
                    None => Err(self.undecidable(e)),
                }
            }
            Expr::Mul(items) => {
                let signs = items
                    .iter()
                    .map(|f| self.sign(f))
                    .collect::<Result<Vec<_>, _>>()?;
                let zero = signs.iter().any(|s| s.zero);
                // Zero-free factors keep one sign across the interval.
                let negative = if zero {
                    signs.iter().any(|s| s.negative)
                } else {
                    signs.iter().filter(|s| s.negative).count() % 2 == 1
                };
                Ok(Sign { zero, negative })
            }
            _ => Err(self.undecidable(e)),
        }
    }

    /// Coefficients (constant term first) when `e` is a polynomial in the
    /// variable with numeric coefficients.
    fn polynomial(&self, e: &Expr) -> Option<Vec<f64>> {
        let expanded = expand(e);
        let terms = match &expanded {
            Expr::Add(items) => items.as_slice(),
            other => std::slice::from_ref(other),
        };
        let mut coeffs: Vec<f64> = Vec::new();
        for term in terms {
            let factors = match term {
                Expr::Mul(items) => items.as_slice(),
                other => std::slice::from_ref(other),
            };
            let mut degree = 0usize;
            let mut coeff = 1.0;
            for factor in factors {
                if let Some(d) = self.monomial_degree(factor) {
                    degree += d;
                } else if factor.is_free_of(self.var) {
                    coeff *= factor.evaluate(&HashMap::new())?;
                } else {
                    return None;
                }
            }
            if degree > MAX_POLY_DEGREE {
                return None;
            }
            if coeffs.len() <= degree {
                coeffs.resize(degree + 1, 0.0);
            }
            coeffs[degree] += coeff;
        }
        while coeffs.last() == Some(&0.0) {
            coeffs.pop();
        }
        Some(coeffs)
    }

    fn monomial_degree(&self, e: &Expr) -> Option<usize> {
        match e {
            Expr::Sym(s) if s == self.var => Some(1),
            Expr::Pow(base, exp) if matches!(base.as_ref(), Expr::Sym(s) if s == self.var) => {
                let n = exp.as_number()?.as_integer()?;
                usize::try_from(n).ok().filter(|n| *n > 0)
            }
            _ => None,
        }
    }

    fn polynomial_sign(&self, coeffs: &[f64]) -> Sign {
        if coeffs.is_empty() {
            return Sign {
                zero: true,
                negative: false,
            };
        }
        let roots = real_roots(coeffs, self.lo, self.hi);
        let mut points = vec![self.lo, self.hi];
        points.extend(&roots);
        points.sort_by(f64::total_cmp);
        points.dedup();
        let negative = if points.len() == 1 {
            horner(coeffs, points[0]) < 0.0
        } else {
            points
                .windows(2)
                .any(|w| horner(coeffs, (w[0] + w[1]) / 2.0) < 0.0)
        };
        Sign {
            zero: !roots.is_empty(),
            negative,
        }
    }

    /// Sign of `sin(arg)` or `cos(arg)` for an argument linear in the
    /// variable.
    fn trig_sign(&self, func: Func, arg: &Expr, whole: &Expr) -> Result<Sign, CasError> {
        let coeffs = self
            .polynomial(arg)
            .filter(|c| c.len() <= 2)
            .ok_or_else(|| self.undecidable(whole))?;
        // sin(t) = cos(t - pi/2)
        let shift = if func == Func::Sin { FRAC_PI_2 } else { 0.0 };
        let (p, q) = (
            horner(&coeffs, self.lo) - shift,
            horner(&coeffs, self.hi) - shift,
        );
        let (a, b) = (p.min(q), p.max(q));
        let slack = RELATIVE_TOLERANCE * (1.0 + a.abs().max(b.abs()));

        // cos vanishes at pi/2 + k*pi and reaches -1 at pi + 2k*pi
        let zero = ((a - FRAC_PI_2 - slack) / PI).ceil() <= ((b - FRAC_PI_2 + slack) / PI).floor();
        let trough = ((a - PI) / (2.0 * PI)).ceil() <= ((b - PI) / (2.0 * PI)).floor();
        let negative = trough || a.cos().min(b.cos()) < -slack;
        Ok(Sign { zero, negative })
    }

    fn pole(&self, e: &Expr) -> CasError {
        CasError::Evaluation(format!(
            "{} vanishes on [{}, {}] where the integrand is unbounded; the integral diverges",
            e, self.lo, self.hi
        ))
    }

    fn outside_domain(&self, e: &Expr) -> CasError {
        CasError::Evaluation(format!(
            "{} leaves the real domain on [{}, {}]",
            e, self.lo, self.hi
        ))
    }

    fn undecidable(&self, e: &Expr) -> CasError {
        CasError::Evaluation(format!(
            "cannot show that the integrand is finite on [{}, {}]: sign of {} is unknown",
            self.lo, self.hi, e
        ))
    }
}

fn horner(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// `p(x)` is zero up to rounding in its own terms.
fn near_zero(coeffs: &[f64], x: f64) -> bool {
    let scale: f64 = coeffs
        .iter()
        .enumerate()
        .map(|(i, c)| (c * x.powi(i as i32)).abs())
        .sum();
    horner(coeffs, x).abs() <= RELATIVE_TOLERANCE * scale.max(f64::MIN_POSITIVE)
}

/// Real roots of the polynomial on `[lo, hi]`, in ascending order.
///
/// Critical points (roots of the derivative) split the interval into
/// monotone pieces; each piece holds at most one root, found by bisection.
/// Roots that only touch zero are caught at the critical points.
fn real_roots(coeffs: &[f64], lo: f64, hi: f64) -> Vec<f64> {
    match coeffs.len() {
        0 | 1 => Vec::new(),
        2 => {
            let root = -coeffs[0] / coeffs[1];
            let slack = RELATIVE_TOLERANCE * (1.0 + lo.abs().max(hi.abs()));
            if root >= lo - slack && root <= hi + slack {
                vec![root]
            } else {
                Vec::new()
            }
        }
        _ => {
            let derivative: Vec<f64> = coeffs
                .iter()
                .enumerate()
                .skip(1)
                .map(|(i, c)| c * i as f64)
                .collect();
            let mut points = vec![lo];
            points.extend(real_roots(&derivative, lo, hi));
            points.push(hi);

            let mut roots = Vec::new();
            for pair in points.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if near_zero(coeffs, a) {
                    roots.push(a);
                } else if !near_zero(coeffs, b)
                    && horner(coeffs, a).signum() != horner(coeffs, b).signum()
                {
                    roots.push(bisect(coeffs, a, b));
                }
            }
            if near_zero(coeffs, hi) {
                roots.push(hi);
            }
            roots
        }
    }
}

fn bisect(coeffs: &[f64], mut a: f64, mut b: f64) -> f64 {
    let left_negative = horner(coeffs, a) < 0.0;
    for _ in 0..BISECTION_STEPS {
        let mid = (a + b) / 2.0;
        if mid <= a || mid >= b {
            break;
        }
        if (horner(coeffs, mid) < 0.0) == left_negative {
            a = mid;
        } else {
            b = mid;
        }
    }
    (a + b) / 2.0
}
