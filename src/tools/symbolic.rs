//! Symbolic calculus tools, delegating to a [`CasBackend`].

use super::{CalculusArgs, DefiniteIntegralArgs};
use crate::cas::CasBackend;
use crate::error::ToolError;

pub fn derivative(cas: &dyn CasBackend, args: &CalculusArgs) -> Result<String, ToolError> {
    Ok(cas.derivative(&args.expression, &args.variable)?)
}

pub fn integral(cas: &dyn CasBackend, args: &CalculusArgs) -> Result<String, ToolError> {
    Ok(cas.indefinite_integral(&args.expression, &args.variable)?)
}

pub fn definite_integral(
    cas: &dyn CasBackend,
    args: &DefiniteIntegralArgs,
) -> Result<String, ToolError> {
    Ok(cas.definite_integral(
        &args.expression,
        &args.variable,
        args.lower_limit,
        args.upper_limit,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cas::SymbolicEngine;
    use crate::error::ErrorKind;

    fn calc(expression: &str, variable: &str) -> CalculusArgs {
        CalculusArgs {
            expression: expression.into(),
            variable: variable.into(),
        }
    }

    #[test]
    fn calculus_on_the_documented_example() {
        let cas = SymbolicEngine::new();
        assert_eq!(derivative(&cas, &calc("5*x - 3*x**2", "x")).unwrap(), "-6*x + 5");
        assert_eq!(integral(&cas, &calc("5*x - 3*x**2", "x")).unwrap(), "-x**3 + 5*x**2/2");
        let args = DefiniteIntegralArgs {
            expression: "5*x - 3*x**2".into(),
            variable: "x".into(),
            lower_limit: 0.0,
            upper_limit: 1.0,
        };
        assert_eq!(definite_integral(&cas, &args).unwrap(), "3/2");
    }

    #[test]
    fn errors_are_classified() {
        let cas = SymbolicEngine::new();
        let err = derivative(&cas, &calc("5*x -", "x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExpressionParse);
        let err = derivative(&cas, &calc("x**2", "2x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownVariable);
        let err = integral(&cas, &calc("exp(x**2)", "x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CasBackend);
        assert!(!err.is_fatal());
    }
}
