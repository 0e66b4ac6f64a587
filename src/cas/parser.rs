//! Recursive-descent parser for `sympify`-style expression strings.
//!
//! Grammar (lowest to highest binding):
//!
//! ```text
//! sum     := product (('+' | '-') product)*
//! product := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := atom (('**' | '^') unary)?
//! atom    := number | name | name '(' sum ')' | '(' sum ')'
//! ```

use super::expr::{add, call, div, mul, neg, pow, Constant, Expr, Func};
use super::number::{parse_decimal, Number};
use super::CasError;

/// Deepest nesting of parentheses, calls, signs and exponents accepted.
const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Number),
    Name(String),
    Plus,
    Minus,
    Star,
    Slash,
    Power,
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Name(s) => format!("name '{}'", s),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::Power => "'**'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Comma => "','".into(),
        }
    }
}

/// Names that cannot be used as free symbols.
pub fn is_reserved(name: &str) -> bool {
    Func::from_name(name).is_some() || matches!(name, "sqrt" | "pi" | "E")
}

/// Parse an expression string into canonical form.
pub fn parse(input: &str) -> Result<Expr, CasError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(CasError::Parse {
            position: 0,
            message: "empty expression".into(),
        });
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };
    let expr = parser.sum()?;
    if let Some((tok, at)) = parser.tokens.get(parser.pos) {
        return Err(CasError::Parse {
            position: *at,
            message: format!("unexpected {}", tok.describe()),
        });
    }
    Ok(expr)
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, CasError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (at, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|(_, d)| d.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                i += 1;
            }
            // Exponent part only when a digit actually follows.
            if i < chars.len() && matches!(chars[i].1, 'e' | 'E') {
                let mut j = i + 1;
                if j < chars.len() && matches!(chars[j].1, '+' | '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].1.is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].1.is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let literal: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            let value = parse_decimal(&literal.replace("e+", "e").replace("E+", "E"))
                .or_else(|| literal.parse::<f64>().ok().map(Number::Float))
                .ok_or_else(|| CasError::Parse {
                    position: at,
                    message: format!("invalid number '{}'", literal),
                })?;
            tokens.push((Token::Number(value), at));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let name: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            tokens.push((Token::Name(name), at));
            continue;
        }

        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' if chars.get(i + 1).map(|(_, c)| *c) == Some('*') => {
                i += 1;
                Token::Power
            }
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Power,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            other => {
                return Err(CasError::Parse {
                    position: at,
                    message: format!("unexpected character '{}'", other),
                })
            }
        };
        tokens.push((token, at));
        i += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, at)| *at).unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        tok
    }

    fn error(&self, message: impl Into<String>) -> CasError {
        CasError::Parse {
            position: self.position(),
            message: message.into(),
        }
    }

    fn expect(&mut self, want: Token) -> Result<(), CasError> {
        match self.peek() {
            Some(t) if *t == want => {
                self.pos += 1;
                Ok(())
            }
            Some(t) => Err(self.error(format!("expected {}, found {}", want.describe(), t.describe()))),
            None => Err(self.error(format!("expected {}, found end of input", want.describe()))),
        }
    }

    fn sum(&mut self) -> Result<Expr, CasError> {
        let mut terms = vec![self.product()?];
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    terms.push(self.product()?);
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    terms.push(neg(self.product()?));
                }
                _ => break,
            }
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            add(terms)
        })
    }

    fn product(&mut self) -> Result<Expr, CasError> {
        let mut acc = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    acc = mul(vec![acc, rhs]);
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    acc = div(acc, rhs);
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    /// Every nested production passes through here.
    fn unary(&mut self) -> Result<Expr, CasError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!(
                "expression nested deeper than {} levels",
                MAX_NESTING
            )));
        }
        self.depth += 1;
        let result = self.signed();
        self.depth -= 1;
        result
    }

    fn signed(&mut self) -> Result<Expr, CasError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(neg(self.unary()?))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, CasError> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::Power) {
            self.pos += 1;
            let exp = self.unary()?;
            return Ok(pow(base, exp));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, CasError> {
        let at = self.position();
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Num(n)),
            Some(Token::LParen) => {
                let inner = self.sum()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Name(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    return self.function_call(&name, at);
                }
                match name.as_str() {
                    "pi" => Ok(Expr::Const(Constant::Pi)),
                    "E" => Ok(Expr::Const(Constant::E)),
                    n if is_reserved(n) => Err(CasError::Parse {
                        position: at,
                        message: format!("function '{}' must be called with an argument", n),
                    }),
                    _ => Ok(Expr::Sym(name)),
                }
            }
            Some(tok) => Err(CasError::Parse {
                position: at,
                message: format!("unexpected {}", tok.describe()),
            }),
            None => Err(CasError::Parse {
                position: at,
                message: "unexpected end of input".into(),
            }),
        }
    }

    /// Parse the argument list after `name(`.
    fn function_call(&mut self, name: &str, at: usize) -> Result<Expr, CasError> {
        let mut args = vec![self.sum()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            args.push(self.sum()?);
        }
        self.expect(Token::RParen)?;

        if args.len() != 1 {
            return Err(CasError::Parse {
                position: at,
                message: format!("'{}' takes exactly one argument, got {}", name, args.len()),
            });
        }
        let arg = args.remove(0);
        if name == "sqrt" {
            return Ok(pow(arg, Expr::Num(Number::Rational(1, 2))));
        }
        match Func::from_name(name) {
            Some(func) => Ok(call(func, arg)),
            None => Err(CasError::Parse {
                position: at,
                message: format!("unknown function '{}'", name),
            }),
        }
    }
}
