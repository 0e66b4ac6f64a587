//! Rendering expressions in the `sympy` str style, e.g. `-x**3 + 5*x**2/2`.

use super::expr::{mul, pow, Expr};
use super::number::Number;
use std::fmt;

const ADD_PREC: u8 = 1;
const MUL_PREC: u8 = 2;
const POW_PREC: u8 = 3;
const ATOM_PREC: u8 = 4;

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self))
    }
}

fn half() -> Number {
    Number::Rational(1, 2)
}

fn precedence(e: &Expr) -> u8 {
    match e {
        Expr::Num(n) if n.is_negative() => ADD_PREC,
        Expr::Num(n) if !n.is_integer() && !n.is_float() => MUL_PREC,
        Expr::Num(_) | Expr::Const(_) | Expr::Sym(_) | Expr::Call(_, _) => ATOM_PREC,
        Expr::Add(_) => ADD_PREC,
        Expr::Mul(_) if is_negative_term(e) => ADD_PREC,
        Expr::Mul(_) => MUL_PREC,
        Expr::Pow(_, exp) => match exp.as_number() {
            Some(n) if n.is_negative() => MUL_PREC,
            Some(n) if n == half() => ATOM_PREC,
            _ => POW_PREC,
        },
    }
}

fn is_negative_term(e: &Expr) -> bool {
    match e {
        Expr::Num(n) => n.is_negative(),
        Expr::Mul(items) => matches!(items.first(), Some(Expr::Num(n)) if n.is_negative()),
        _ => false,
    }
}

fn wrap(e: &Expr, min_prec: u8) -> String {
    if precedence(e) < min_prec {
        format!("({})", render(e))
    } else {
        render(e)
    }
}

fn render(e: &Expr) -> String {
    match e {
        Expr::Num(n) => n.to_string(),
        Expr::Const(c) => c.name().to_string(),
        Expr::Sym(s) => s.clone(),
        Expr::Call(func, arg) => format!("{}({})", func.name(), render(arg)),
        Expr::Add(terms) => {
            let mut out = String::new();
            for (i, term) in terms.iter().enumerate() {
                if i == 0 {
                    out.push_str(&render(term));
                } else if is_negative_term(term) {
                    out.push_str(" - ");
                    out.push_str(&render(&mul(vec![Expr::int(-1), term.clone()])));
                } else {
                    out.push_str(" + ");
                    out.push_str(&render(term));
                }
            }
            out
        }
        Expr::Mul(items) => render_product(items),
        Expr::Pow(base, exp) => match exp.as_number() {
            Some(n) if n.is_negative() => render_product(std::slice::from_ref(e)),
            Some(n) if n == half() => format!("sqrt({})", render(base)),
            _ => format!("{}**{}", wrap(base, ATOM_PREC), wrap(exp, ATOM_PREC)),
        },
    }
}

/// Products are printed as `numerator/denominator`, with factors carrying
/// negative numeric exponents moved below the bar.
fn render_product(items: &[Expr]) -> String {
    let mut coeff = Number::ONE;
    let mut numer: Vec<String> = Vec::new();
    let mut denom: Vec<String> = Vec::new();

    for item in items {
        match item {
            Expr::Num(n) => coeff = coeff.mul(*n),
            Expr::Pow(base, exp) => match exp.as_number() {
                Some(n) if n.is_negative() => {
                    denom.push(wrap(&pow((**base).clone(), Expr::Num(n.neg())), MUL_PREC))
                }
                _ => numer.push(wrap(item, MUL_PREC)),
            },
            other => numer.push(wrap(other, MUL_PREC)),
        }
    }

    let negative = coeff.is_negative();
    match coeff.abs() {
        Number::Rational(p, q) => {
            if p != 1 {
                numer.insert(0, p.to_string());
            }
            if q != 1 {
                denom.insert(0, q.to_string());
            }
        }
        float => {
            if !float.is_one() {
                numer.insert(0, float.to_string());
            }
        }
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if numer.is_empty() {
        out.push('1');
    } else {
        out.push_str(&numer.join("*"));
    }
    match denom.len() {
        0 => {}
        1 => {
            out.push('/');
            out.push_str(&denom[0]);
        }
        _ => {
            out.push_str("/(");
            out.push_str(&denom.join("*"));
            out.push(')');
        }
    }
    out
}
