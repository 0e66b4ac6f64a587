//! Two-operand arithmetic over `f64`.
//!
//! Every operation fails with `NonFiniteResult` rather than returning NaN or
//! an infinity. In particular `exponent` rejects a fractional power of a
//! negative base, `0 ** negative` and overflow.

use crate::error::ToolError;

fn finite(op: &str, a: f64, b: f64, value: f64) -> Result<f64, ToolError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ToolError::NonFiniteResult(format!("{}({}, {})", op, a, b)))
    }
}

pub fn add(a: f64, b: f64) -> Result<f64, ToolError> {
    finite("add", a, b, a + b)
}

pub fn subtract(a: f64, b: f64) -> Result<f64, ToolError> {
    finite("subtract", a, b, a - b)
}

pub fn multiply(a: f64, b: f64) -> Result<f64, ToolError> {
    finite("multiply", a, b, a * b)
}

pub fn divide(a: f64, b: f64) -> Result<f64, ToolError> {
    if b == 0.0 {
        return Err(ToolError::DivisionByZero);
    }
    finite("divide", a, b, a / b)
}

/// `a ** b`; a negative `b` gives the reciprocal power.
pub fn exponent(a: f64, b: f64) -> Result<f64, ToolError> {
    finite("exponent", a, b, a.powf(b))
}
