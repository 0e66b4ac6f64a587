//! Symbolic integration.
//!
//! Antiderivatives are built immediately (there is no unevaluated integral
//! form). Strategies, tried in order: constants, linearity, a table of
//! elementary antiderivatives under a linear substitution, expansion of
//! products and powers of sums, and integration by parts.

use super::diff::differentiate;
use super::domain::check_defined;
use super::expr::{add, call, expand, mul, neg, pow, Expr, Func};
use super::number::Number;
use super::CasError;
use std::collections::HashMap;

/// Recursion guard for expansion and integration by parts.
const MAX_DEPTH: usize = 24;

/// Indefinite integral of `expr` with respect to `var` (no constant added).
pub fn integrate(expr: &Expr, var: &str) -> Result<Expr, CasError> {
    integrate_at(expr, var, 0)
}

/// Definite integral over `[lower, upper]` via the fundamental theorem.
pub fn definite_integral(
    expr: &Expr,
    var: &str,
    lower: Number,
    upper: Number,
) -> Result<Expr, CasError> {
    let (lo, hi) = (lower.to_f64(), upper.to_f64());
    if !lo.is_finite() || !hi.is_finite() {
        return Err(CasError::Evaluation(
            "integration limits must be finite numbers".into(),
        ));
    }
    check_defined(expr, var, lo, hi)?;

    let antiderivative = absolute_logs(&integrate(expr, var)?, var, (lo + hi) / 2.0);
    let at = |limit: Number| antiderivative.substitute(var, &Expr::Num(limit));
    let value = add(vec![at(upper), neg(at(lower))]);

    if value.symbols().is_empty() {
        let v = value.evaluate(&HashMap::new()).unwrap_or(f64::NAN);
        if !v.is_finite() {
            return Err(CasError::Evaluation(format!(
                "integral of {} over [{}, {}] is not finite",
                expr, lower, upper
            )));
        }
    }
    Ok(value)
}

/// Rewrites `log(u)` as `log(-u)` wherever `u` is negative at `at`. After
/// the domain check every such `u` keeps one sign over the interval, so this
/// turns `log(u)` into `log|u|` there.
fn absolute_logs(expr: &Expr, var: &str, at: f64) -> Expr {
    match expr {
        Expr::Add(items) => add(items.iter().map(|e| absolute_logs(e, var, at)).collect()),
        Expr::Mul(items) => mul(items.iter().map(|e| absolute_logs(e, var, at)).collect()),
        Expr::Pow(base, exp) => pow(absolute_logs(base, var, at), absolute_logs(exp, var, at)),
        Expr::Call(func, arg) => {
            let arg = absolute_logs(arg, var, at);
            let env = HashMap::from([(var.to_string(), at)]);
            let negative = !arg.is_free_of(var) && arg.evaluate(&env).is_some_and(|v| v < 0.0);
            if *func == Func::Log && negative {
                call(Func::Log, neg(arg))
            } else {
                call(*func, arg)
            }
        }
        Expr::Num(_) | Expr::Const(_) | Expr::Sym(_) => expr.clone(),
    }
}

fn unsupported(expr: &Expr) -> CasError {
    CasError::Unsupported(format!("no closed-form antiderivative found for {}", expr))
}

fn integrate_at(expr: &Expr, var: &str, depth: usize) -> Result<Expr, CasError> {
    if depth > MAX_DEPTH {
        return Err(unsupported(expr));
    }
    if expr.is_free_of(var) {
        return Ok(mul(vec![expr.clone(), Expr::sym(var)]));
    }
    if let Expr::Add(terms) = expr {
        let parts = terms
            .iter()
            .map(|t| integrate_at(t, var, depth))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(add(parts));
    }

    let (constant, dependent) = split_dependent(expr, var);
    let body = integrate_product(&dependent, var, depth)?;
    Ok(mul(vec![constant, body]))
}

/// Separate a product into the part free of `var` and the factors that
/// depend on it.
fn split_dependent(expr: &Expr, var: &str) -> (Expr, Vec<Expr>) {
    match expr {
        Expr::Mul(factors) => {
            let (free, dependent): (Vec<Expr>, Vec<Expr>) =
                factors.iter().cloned().partition(|f| f.is_free_of(var));
            (mul(free), dependent)
        }
        other => (Expr::one(), vec![other.clone()]),
    }
}

fn integrate_product(factors: &[Expr], var: &str, depth: usize) -> Result<Expr, CasError> {
    if let [single] = factors {
        if let Some(result) = integrate_factor(single, var) {
            return Ok(result);
        }
    }

    let product = mul(factors.to_vec());
    let expanded = expand(&product);
    if expanded != product {
        return integrate_at(&expanded, var, depth + 1);
    }

    if let Some(result) = by_parts(factors, var, depth)? {
        return Ok(result);
    }
    Err(unsupported(&product))
}

/// `a` when `u` is `a*var + b` with `a` nonzero and free of `var`.
fn linear_slope(u: &Expr, var: &str) -> Option<Expr> {
    let a = differentiate(u, var);
    if a.is_zero() || !a.is_free_of(var) {
        return None;
    }
    let b = add(vec![u.clone(), neg(mul(vec![a.clone(), Expr::sym(var)]))]);
    b.is_free_of(var).then_some(a)
}

/// Table lookup for a single factor that depends on `var`.
fn integrate_factor(f: &Expr, var: &str) -> Option<Expr> {
    match f {
        Expr::Sym(_) => Some(mul(vec![
            Expr::Num(Number::Rational(1, 2)),
            pow(f.clone(), Expr::int(2)),
        ])),
        Expr::Pow(base, exp) if exp.is_free_of(var) => {
            let a = linear_slope(base, var)?;
            if **exp == Expr::int(-1) {
                return Some(mul(vec![
                    call(Func::Log, (**base).clone()),
                    pow(a, Expr::int(-1)),
                ]));
            }
            let raised = add(vec![(**exp).clone(), Expr::one()]);
            Some(mul(vec![
                pow((**base).clone(), raised.clone()),
                pow(mul(vec![a, raised]), Expr::int(-1)),
            ]))
        }
        Expr::Pow(base, exp) if base.is_free_of(var) => {
            let a = linear_slope(exp, var)?;
            Some(mul(vec![
                f.clone(),
                pow(mul(vec![a, call(Func::Log, (**base).clone())]), Expr::int(-1)),
            ]))
        }
        Expr::Call(func, arg) => {
            let a = linear_slope(arg, var)?;
            let anti = antiderivative_in(*func, (**arg).clone());
            Some(mul(vec![pow(a, Expr::int(-1)), anti]))
        }
        _ => None,
    }
}

/// Antiderivative of `func(u)` with respect to `u`.
fn antiderivative_in(func: Func, u: Expr) -> Expr {
    let sqrt_one_minus_square = |u: &Expr| {
        let radicand = add(vec![Expr::one(), neg(pow(u.clone(), Expr::int(2)))]);
        pow(radicand, Expr::Num(Number::Rational(1, 2)))
    };
    match func {
        Func::Exp => call(Func::Exp, u),
        Func::Sin => neg(call(Func::Cos, u)),
        Func::Cos => call(Func::Sin, u),
        Func::Tan => neg(call(Func::Log, call(Func::Cos, u))),
        Func::Sinh => call(Func::Cosh, u),
        Func::Cosh => call(Func::Sinh, u),
        Func::Tanh => call(Func::Log, call(Func::Cosh, u)),
        Func::Log => add(vec![mul(vec![u.clone(), call(Func::Log, u.clone())]), neg(u)]),
        Func::Atan => add(vec![
            mul(vec![u.clone(), call(Func::Atan, u.clone())]),
            mul(vec![
                Expr::Num(Number::Rational(-1, 2)),
                call(Func::Log, add(vec![pow(u.clone(), Expr::int(2)), Expr::one()])),
            ]),
        ]),
        Func::Asin => add(vec![
            sqrt_one_minus_square(&u),
            mul(vec![u.clone(), call(Func::Asin, u)]),
        ]),
        Func::Acos => add(vec![
            neg(sqrt_one_minus_square(&u)),
            mul(vec![u.clone(), call(Func::Acos, u)]),
        ]),
    }
}

/// Degree `n` when `e` is `var` or `var**n` for a positive integer `n`.
fn monomial_degree(e: &Expr, var: &str) -> Option<i128> {
    match e {
        Expr::Sym(s) if s == var => Some(1),
        Expr::Pow(base, exp) if matches!(base.as_ref(), Expr::Sym(s) if s == var) => {
            exp.as_number()?.as_integer().filter(|n| *n > 0)
        }
        _ => None,
    }
}

/// Integration by parts for `var**n * g` where `g` is a logarithm, or an
/// exponential/trigonometric/hyperbolic function of a linear argument.
fn by_parts(factors: &[Expr], var: &str, depth: usize) -> Result<Option<Expr>, CasError> {
    let [first, second] = factors else {
        return Ok(None);
    };
    for (poly, other) in [(first, second), (second, first)] {
        let Some(n) = monomial_degree(poly, var) else {
            continue;
        };
        match other {
            Expr::Call(Func::Log, _) => {
                // u = log(..), dv = x**n dx
                let v = mul(vec![
                    pow(Expr::sym(var), Expr::int(n + 1)),
                    Expr::Num(Number::Rational(1, n + 1)),
                ]);
                let rest = integrate_at(&mul(vec![v.clone(), differentiate(other, var)]), var, depth + 1)?;
                return Ok(Some(add(vec![mul(vec![other.clone(), v]), neg(rest)])));
            }
            Expr::Call(Func::Exp | Func::Sin | Func::Cos | Func::Sinh | Func::Cosh, _) => {}
            Expr::Pow(base, _) if base.is_free_of(var) => {}
            _ => continue,
        }
        // u = x**n, dv = g dx
        let Some(g) = integrate_factor(other, var) else {
            continue;
        };
        let rest = integrate_at(&mul(vec![differentiate(poly, var), g.clone()]), var, depth + 1)?;
        return Ok(Some(add(vec![mul(vec![poly.clone(), g]), neg(rest)])));
    }
    Ok(None)
}
