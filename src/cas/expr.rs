//! Expression tree and its canonicalising constructors.
//!
//! Every `Expr` built through [`add`], [`mul`], [`pow`] and [`call`] is kept
//! in canonical form: sums and products are flat and sorted, numeric
//! constants are folded, like terms and equal bases are collected. Two
//! equal expressions therefore compare equal structurally.

use super::number::Number;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// Largest integer power of a sum that [`expand`] multiplies out.
const MAX_EXPANSION_POWER: i128 = 16;

/// Named mathematical constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    Pi,
    E,
}

impl Constant {
    pub fn name(self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::E => "E",
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
        }
    }
}

/// Elementary functions of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Log,
}

impl Func {
    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Asin => "asin",
            Func::Acos => "acos",
            Func::Atan => "atan",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
            Func::Tanh => "tanh",
            Func::Exp => "exp",
            Func::Log => "log",
        }
    }

    /// Look up a function by the name used in expression strings.
    /// `ln` is accepted as an alias of `log`.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "asin" => Func::Asin,
            "acos" => Func::Acos,
            "atan" => Func::Atan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "exp" => Func::Exp,
            "log" | "ln" => Func::Log,
            _ => return None,
        })
    }

    pub fn apply(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Asin => x.asin(),
            Func::Acos => x.acos(),
            Func::Atan => x.atan(),
            Func::Sinh => x.sinh(),
            Func::Cosh => x.cosh(),
            Func::Tanh => x.tanh(),
            Func::Exp => x.exp(),
            Func::Log => x.ln(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(Number),
    Const(Constant),
    Sym(String),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    pub fn int(n: i128) -> Self {
        Expr::Num(Number::int(n))
    }

    pub fn zero() -> Self {
        Expr::Num(Number::ZERO)
    }

    pub fn one() -> Self {
        Expr::Num(Number::ONE)
    }

    pub fn sym(name: &str) -> Self {
        Expr::Sym(name.to_string())
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Expr::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Num(n) if n.is_zero())
    }

    fn is_integer(&self) -> bool {
        matches!(self, Expr::Num(n) if n.is_integer())
    }

    /// True when `var` does not occur anywhere in the expression.
    pub fn is_free_of(&self, var: &str) -> bool {
        match self {
            Expr::Num(_) | Expr::Const(_) => true,
            Expr::Sym(s) => s != var,
            Expr::Add(items) | Expr::Mul(items) => items.iter().all(|e| e.is_free_of(var)),
            Expr::Pow(b, e) => b.is_free_of(var) && e.is_free_of(var),
            Expr::Call(_, a) => a.is_free_of(var),
        }
    }

    /// All symbol names occurring in the expression.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Num(_) | Expr::Const(_) => {}
            Expr::Sym(s) => {
                out.insert(s.clone());
            }
            Expr::Add(items) | Expr::Mul(items) => {
                items.iter().for_each(|e| e.collect_symbols(out));
            }
            Expr::Pow(b, e) => {
                b.collect_symbols(out);
                e.collect_symbols(out);
            }
            Expr::Call(_, a) => a.collect_symbols(out),
        }
    }

    /// Replace every occurrence of `var` with `value`, re-canonicalising.
    pub fn substitute(&self, var: &str, value: &Expr) -> Expr {
        match self {
            Expr::Sym(s) if s == var => value.clone(),
            Expr::Num(_) | Expr::Const(_) | Expr::Sym(_) => self.clone(),
            Expr::Add(items) => add(items.iter().map(|e| e.substitute(var, value)).collect()),
            Expr::Mul(items) => mul(items.iter().map(|e| e.substitute(var, value)).collect()),
            Expr::Pow(b, e) => pow(b.substitute(var, value), e.substitute(var, value)),
            Expr::Call(f, a) => call(*f, a.substitute(var, value)),
        }
    }

    /// Numeric value under the given symbol bindings. `None` when a symbol
    /// is unbound; the result may be NaN or infinite.
    pub fn evaluate(&self, bindings: &HashMap<String, f64>) -> Option<f64> {
        Some(match self {
            Expr::Num(n) => n.to_f64(),
            Expr::Const(c) => c.value(),
            Expr::Sym(s) => *bindings.get(s)?,
            Expr::Add(items) => {
                let mut sum = 0.0;
                for e in items {
                    sum += e.evaluate(bindings)?;
                }
                sum
            }
            Expr::Mul(items) => {
                let mut product = 1.0;
                for e in items {
                    product *= e.evaluate(bindings)?;
                }
                product
            }
            Expr::Pow(b, e) => b.evaluate(bindings)?.powf(e.evaluate(bindings)?),
            Expr::Call(f, a) => f.apply(a.evaluate(bindings)?),
        })
    }

    /// Polynomial degree used for ordering terms of a sum.
    fn degree(&self) -> f64 {
        match self {
            Expr::Sym(_) => 1.0,
            Expr::Pow(b, e) => match **e {
                Expr::Num(n) => b.degree() * n.to_f64(),
                _ => b.degree(),
            },
            Expr::Mul(items) => items.iter().map(Expr::degree).sum(),
            Expr::Add(items) => items.iter().map(Expr::degree).fold(0.0, f64::max),
            Expr::Num(_) | Expr::Const(_) | Expr::Call(_, _) => 0.0,
        }
    }
}

pub fn neg(e: Expr) -> Expr {
    mul(vec![Expr::int(-1), e])
}

pub fn sub(a: Expr, b: Expr) -> Expr {
    add(vec![a, neg(b)])
}

pub fn div(a: Expr, b: Expr) -> Expr {
    mul(vec![a, pow(b, Expr::int(-1))])
}

/// Canonical sum.
pub fn add(terms: Vec<Expr>) -> Expr {
    let mut constant = Number::ZERO;
    let mut groups: Vec<(Expr, Number)> = Vec::new();

    for term in flatten(terms, |e| matches!(e, Expr::Add(_))) {
        if let Expr::Num(n) = term {
            constant = constant.add(n);
            continue;
        }
        let (coeff, rest) = split_coefficient(term);
        match groups.iter_mut().find(|(r, _)| *r == rest) {
            Some((_, c)) => *c = c.add(coeff),
            None => groups.push((rest, coeff)),
        }
    }

    let mut out: Vec<Expr> = groups
        .into_iter()
        .filter(|(_, c)| !c.is_zero())
        .map(|(rest, c)| {
            if c.is_one() {
                rest
            } else {
                mul(vec![Expr::Num(c), rest])
            }
        })
        .collect();
    if !constant.is_zero() {
        out.push(Expr::Num(constant));
    }

    match out.len() {
        0 => Expr::zero(),
        1 => out.remove(0),
        _ => {
            out.sort_by(term_order);
            Expr::Add(out)
        }
    }
}

/// Canonical product.
pub fn mul(factors: Vec<Expr>) -> Expr {
    let mut coeff = Number::ONE;
    let mut powers: Vec<(Expr, Expr)> = Vec::new();

    for factor in flatten(factors, |e| matches!(e, Expr::Mul(_))) {
        match factor {
            Expr::Num(n) => coeff = coeff.mul(n),
            Expr::Pow(base, exp) => push_power(&mut powers, *base, *exp),
            other => push_power(&mut powers, other, Expr::one()),
        }
    }
    if coeff.is_zero() {
        return Expr::zero();
    }

    let mut rest = Vec::with_capacity(powers.len());
    let mut reflatten = false;
    for (base, exp) in powers {
        match pow(base, exp) {
            Expr::Num(n) => coeff = coeff.mul(n),
            p @ Expr::Mul(_) => {
                reflatten = true;
                rest.push(p);
            }
            p => rest.push(p),
        }
    }
    if reflatten {
        rest.insert(0, Expr::Num(coeff));
        return mul(rest);
    }
    if coeff.is_zero() {
        return Expr::zero();
    }

    rest.sort_by(factor_order);
    match rest.len() {
        0 => Expr::Num(coeff),
        1 if coeff.is_one() => rest.remove(0),
        1 if matches!(rest[0], Expr::Add(_)) => {
            let Some(Expr::Add(terms)) = rest.pop() else {
                unreachable!("checked by the match guard");
            };
            add(terms
                .into_iter()
                .map(|t| mul(vec![Expr::Num(coeff), t]))
                .collect())
        }
        _ => {
            if !coeff.is_one() {
                rest.insert(0, Expr::Num(coeff));
            }
            Expr::Mul(rest)
        }
    }
}

/// Canonical power.
pub fn pow(base: Expr, exp: Expr) -> Expr {
    if let Expr::Num(e) = &exp {
        if e.is_zero() {
            return Expr::one();
        }
        if e.is_one() {
            return base;
        }
    }
    match (&base, &exp) {
        (Expr::Num(b), _) if b.is_one() => return Expr::one(),
        (Expr::Num(b), Expr::Num(e)) => {
            if b.is_zero() && !e.is_negative() {
                return Expr::zero();
            }
            if let Some(n) = b.pow(*e) {
                return Expr::Num(n);
            }
        }
        _ => {}
    }

    let integral_exp = exp.is_integer();
    match base {
        Expr::Const(Constant::E) => call(Func::Exp, exp),
        Expr::Pow(inner, e1) if integral_exp => pow(*inner, mul(vec![*e1, exp])),
        Expr::Mul(items) if integral_exp => {
            mul(items.into_iter().map(|f| pow(f, exp.clone())).collect())
        }
        Expr::Call(Func::Exp, arg) if integral_exp => call(Func::Exp, mul(vec![*arg, exp])),
        base => Expr::Pow(Box::new(base), Box::new(exp)),
    }
}

/// Canonical function application, folding exact special values.
pub fn call(func: Func, arg: Expr) -> Expr {
    if let Some(value) = special_value(func, &arg) {
        return value;
    }
    if let Expr::Num(Number::Float(x)) = &arg {
        let y = func.apply(*x);
        if y.is_finite() {
            return Expr::Num(Number::Float(y));
        }
    }
    match (func, arg) {
        (Func::Exp, Expr::Call(Func::Log, inner)) => *inner,
        (Func::Log, Expr::Call(Func::Exp, inner)) => *inner,
        (func, arg) => Expr::Call(func, Box::new(arg)),
    }
}

fn special_value(func: Func, arg: &Expr) -> Option<Expr> {
    if arg.is_zero() {
        return match func {
            Func::Sin | Func::Tan | Func::Asin | Func::Atan | Func::Sinh | Func::Tanh => {
                Some(Expr::zero())
            }
            Func::Cos | Func::Cosh | Func::Exp => Some(Expr::one()),
            Func::Acos | Func::Log => None,
        };
    }
    if *arg == Expr::one() {
        return matches!(func, Func::Log | Func::Acos).then(Expr::zero);
    }
    if *arg == Expr::Const(Constant::E) && func == Func::Log {
        return Some(Expr::one());
    }

    let halves = pi_multiple(arg)?.mul(Number::int(2)).as_integer()?;
    let quarter = halves.rem_euclid(4);
    match func {
        Func::Sin => Some(match quarter {
            1 => Expr::one(),
            3 => Expr::int(-1),
            _ => Expr::zero(),
        }),
        Func::Cos => Some(match quarter {
            0 => Expr::one(),
            2 => Expr::int(-1),
            _ => Expr::zero(),
        }),
        Func::Tan if halves % 2 == 0 => Some(Expr::zero()),
        _ => None,
    }
}

/// `k` when `e` is `k*pi` for a rational `k`.
fn pi_multiple(e: &Expr) -> Option<Number> {
    match e {
        Expr::Const(Constant::Pi) => Some(Number::ONE),
        Expr::Mul(items) => match items.as_slice() {
            [Expr::Num(k), Expr::Const(Constant::Pi)] if !k.is_float() => Some(*k),
            _ => None,
        },
        _ => None,
    }
}

/// Multiply out products of sums and small positive integer powers of sums.
pub fn expand(expr: &Expr) -> Expr {
    match expr {
        Expr::Add(terms) => add(terms.iter().map(expand).collect()),
        Expr::Mul(factors) => factors
            .iter()
            .map(expand)
            .fold(Expr::one(), |acc, f| distribute(&acc, &f)),
        Expr::Pow(base, exp) => {
            let base = expand(base);
            match exp.as_number().and_then(Number::as_integer) {
                Some(n) if (2..=MAX_EXPANSION_POWER).contains(&n) && matches!(base, Expr::Add(_)) => {
                    (0..n).fold(Expr::one(), |acc, _| distribute(&acc, &base))
                }
                _ => pow(base, (**exp).clone()),
            }
        }
        other => other.clone(),
    }
}

fn distribute(a: &Expr, b: &Expr) -> Expr {
    let left = terms_of(a);
    let right = terms_of(b);
    let mut products = Vec::with_capacity(left.len() * right.len());
    for x in left {
        for y in right {
            products.push(mul(vec![x.clone(), y.clone()]));
        }
    }
    add(products)
}

fn terms_of(e: &Expr) -> &[Expr] {
    match e {
        Expr::Add(terms) => terms,
        other => std::slice::from_ref(other),
    }
}

fn flatten(items: Vec<Expr>, nested: impl Fn(&Expr) -> bool) -> Vec<Expr> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if nested(&item) {
            if let Expr::Add(inner) | Expr::Mul(inner) = item {
                out.extend(inner);
            }
        } else {
            out.push(item);
        }
    }
    out
}

fn push_power(powers: &mut Vec<(Expr, Expr)>, base: Expr, exp: Expr) {
    match powers.iter_mut().find(|(b, _)| *b == base) {
        Some((_, e)) => *e = add(vec![e.clone(), exp]),
        None => powers.push((base, exp)),
    }
}

/// Split a term into its numeric coefficient and the remaining product.
pub(crate) fn split_coefficient(term: Expr) -> (Number, Expr) {
    match term {
        Expr::Mul(mut items) => match items.first() {
            Some(Expr::Num(n)) => {
                let n = *n;
                items.remove(0);
                let rest = if items.len() == 1 {
                    items.remove(0)
                } else {
                    Expr::Mul(items)
                };
                (n, rest)
            }
            _ => (Number::ONE, Expr::Mul(items)),
        },
        other => (Number::ONE, other),
    }
}

fn factor_rank(e: &Expr) -> u8 {
    match e {
        Expr::Num(_) => 0,
        Expr::Const(_) => 1,
        Expr::Sym(_) => 2,
        Expr::Pow(b, _) => match **b {
            Expr::Num(_) | Expr::Const(_) => 1,
            ref inner => factor_rank(inner),
        },
        Expr::Call(_, _) => 4,
        Expr::Add(_) => 5,
        Expr::Mul(_) => 6,
    }
}

fn base_of(e: &Expr) -> &Expr {
    match e {
        Expr::Pow(b, _) => b,
        other => other,
    }
}

fn factor_order(a: &Expr, b: &Expr) -> Ordering {
    factor_rank(a)
        .cmp(&factor_rank(b))
        .then_with(|| base_of(a).to_string().cmp(&base_of(b).to_string()))
        .then_with(|| a.to_string().cmp(&b.to_string()))
}

fn term_order(a: &Expr, b: &Expr) -> Ordering {
    let a_num = matches!(a, Expr::Num(_));
    let b_num = matches!(b, Expr::Num(_));
    a_num
        .cmp(&b_num)
        .then_with(|| b.degree().partial_cmp(&a.degree()).unwrap_or(Ordering::Equal))
        .then_with(|| {
            let (_, ra) = split_coefficient(a.clone());
            let (_, rb) = split_coefficient(b.clone());
            ra.to_string().cmp(&rb.to_string())
        })
        .then_with(|| a.to_string().cmp(&b.to_string()))
}
