//! Symbolic differentiation.

use super::expr::{add, call, mul, neg, pow, Expr, Func};
use super::number::Number;

/// Derivative of `expr` with respect to `var`, in canonical form.
pub fn differentiate(expr: &Expr, var: &str) -> Expr {
    if expr.is_free_of(var) {
        return Expr::zero();
    }
    match expr {
        Expr::Sym(_) => Expr::one(),
        Expr::Add(terms) => add(terms.iter().map(|t| differentiate(t, var)).collect()),
        Expr::Mul(factors) => {
            let mut terms = Vec::with_capacity(factors.len());
            for (i, factor) in factors.iter().enumerate() {
                let d = differentiate(factor, var);
                if d.is_zero() {
                    continue;
                }
                let mut product: Vec<Expr> = factors
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, g)| g.clone())
                    .collect();
                product.push(d);
                terms.push(mul(product));
            }
            add(terms)
        }
        Expr::Pow(base, exp) => {
            let (b, e) = (base.as_ref(), exp.as_ref());
            if e.is_free_of(var) {
                mul(vec![
                    e.clone(),
                    pow(b.clone(), add(vec![e.clone(), Expr::int(-1)])),
                    differentiate(b, var),
                ])
            } else if b.is_free_of(var) {
                mul(vec![
                    expr.clone(),
                    call(Func::Log, b.clone()),
                    differentiate(e, var),
                ])
            } else {
                // b**e * (e' * log(b) + e * b' / b)
                mul(vec![
                    expr.clone(),
                    add(vec![
                        mul(vec![differentiate(e, var), call(Func::Log, b.clone())]),
                        mul(vec![
                            e.clone(),
                            differentiate(b, var),
                            pow(b.clone(), Expr::int(-1)),
                        ]),
                    ]),
                ])
            }
        }
        Expr::Call(func, arg) => mul(vec![outer(*func, arg), differentiate(arg, var)]),
        Expr::Num(_) | Expr::Const(_) => Expr::zero(),
    }
}

/// Derivative of `func` evaluated at `u`.
fn outer(func: Func, u: &Expr) -> Expr {
    let u = u.clone();
    let square = |e: Expr| pow(e, Expr::int(2));
    let inv_sqrt = |e: Expr| pow(e, Expr::Num(Number::Rational(-1, 2)));
    match func {
        Func::Sin => call(Func::Cos, u),
        Func::Cos => neg(call(Func::Sin, u)),
        Func::Tan => add(vec![square(call(Func::Tan, u)), Expr::one()]),
        Func::Asin => inv_sqrt(add(vec![Expr::one(), neg(square(u))])),
        Func::Acos => neg(inv_sqrt(add(vec![Expr::one(), neg(square(u))]))),
        Func::Atan => pow(add(vec![square(u), Expr::one()]), Expr::int(-1)),
        Func::Sinh => call(Func::Cosh, u),
        Func::Cosh => call(Func::Sinh, u),
        Func::Tanh => add(vec![Expr::one(), neg(square(call(Func::Tanh, u)))]),
        Func::Exp => call(Func::Exp, u),
        Func::Log => pow(u, Expr::int(-1)),
    }
}
