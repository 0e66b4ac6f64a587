//! In-process computer algebra.
//!
//! The symbolic tools only see strings in and strings out through
//! [`CasBackend`]; [`SymbolicEngine`] is the default implementation built on
//! the expression tree in [`expr`].

pub mod diff;
pub mod display;
mod domain;
pub mod expr;
pub mod integrate;
pub mod number;
pub mod parser;

use number::Number;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CasError {
    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("'{0}' is not a valid symbol name")]
    InvalidSymbol(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// Computer-algebra backend used by the symbolic tools.
pub trait CasBackend: Send + Sync {
    /// Simplified derivative of `expression` with respect to `variable`.
    fn derivative(&self, expression: &str, variable: &str) -> Result<String, CasError>;

    /// Antiderivative of `expression` (without an integration constant).
    fn indefinite_integral(&self, expression: &str, variable: &str) -> Result<String, CasError>;

    /// Integral of `expression` over `[lower, upper]`.
    fn definite_integral(
        &self,
        expression: &str,
        variable: &str,
        lower: f64,
        upper: f64,
    ) -> Result<String, CasError>;
}

/// The built-in symbolic engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymbolicEngine;

impl SymbolicEngine {
    pub fn new() -> Self {
        Self
    }

    fn symbol(variable: &str) -> Result<&str, CasError> {
        let name = variable.trim();
        let mut chars = name.chars();
        let valid_start = chars.next().is_some_and(|c| c.is_alphabetic() || c == '_');
        if !valid_start
            || !chars.all(|c| c.is_alphanumeric() || c == '_')
            || parser::is_reserved(name)
        {
            return Err(CasError::InvalidSymbol(variable.to_string()));
        }
        Ok(name)
    }
}

impl CasBackend for SymbolicEngine {
    fn derivative(&self, expression: &str, variable: &str) -> Result<String, CasError> {
        let var = Self::symbol(variable)?;
        let expr = parser::parse(expression)?;
        let result = diff::differentiate(&expr, var);
        debug!("d/d{} [{}] = {}", var, expr, result);
        Ok(result.to_string())
    }

    fn indefinite_integral(&self, expression: &str, variable: &str) -> Result<String, CasError> {
        let var = Self::symbol(variable)?;
        let expr = parser::parse(expression)?;
        let result = integrate::integrate(&expr, var)?;
        debug!("integral of {} d{} = {}", expr, var, result);
        Ok(result.to_string())
    }

    fn definite_integral(
        &self,
        expression: &str,
        variable: &str,
        lower: f64,
        upper: f64,
    ) -> Result<String, CasError> {
        let var = Self::symbol(variable)?;
        let expr = parser::parse(expression)?;
        let result = integrate::definite_integral(
            &expr,
            var,
            Number::from_f64(lower),
            Number::from_f64(upper),
        )?;
        debug!("integral of {} d{} over [{}, {}] = {}", expr, var, lower, upper, result);
        Ok(result.to_string())
    }
}
