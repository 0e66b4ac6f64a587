//! The tool catalog.
//!
//! The tool set is fixed: [`ToolKind`] enumerates it, each kind declares its
//! [`ToolDefinition`], and validated arguments are decoded into a
//! [`ToolInvocation`] carrying a typed argument struct. The
//! [`ToolRegistry`] dispatches invocations with an exhaustive match.

pub mod arithmetic;
pub mod registry;
pub mod schema;
pub mod symbolic;
pub mod web;

pub use registry::ToolRegistry;
pub use schema::{ParamSpec, ParamType, ReturnType, ToolDefinition};

use crate::error::ToolError;
use crate::search::SearchHit;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

// ---------------------------------------------------------------------------
// Typed arguments
// ---------------------------------------------------------------------------

/// Operands of a two-argument arithmetic tool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryArgs {
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculusArgs {
    pub expression: String,
    pub variable: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefiniteIntegralArgs {
    pub expression: String,
    pub variable: String,
    pub lower_limit: f64,
    pub upper_limit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchArgs {
    pub query: String,
}

/// A fully validated tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    Add(BinaryArgs),
    Subtract(BinaryArgs),
    Multiply(BinaryArgs),
    Divide(BinaryArgs),
    Exponent(BinaryArgs),
    SymbolicDerivative(CalculusArgs),
    SymbolicIntegral(CalculusArgs),
    DefiniteIntegral(DefiniteIntegralArgs),
    WebSearcher(SearchArgs),
}

// ---------------------------------------------------------------------------
// Tool kinds
// ---------------------------------------------------------------------------

/// Every tool this agent knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    Exponent,
    SymbolicDerivative,
    SymbolicIntegral,
    DefiniteIntegral,
    WebSearcher,
}

impl ToolKind {
    pub const ALL: [ToolKind; 9] = [
        ToolKind::Multiply,
        ToolKind::Add,
        ToolKind::Subtract,
        ToolKind::Divide,
        ToolKind::Exponent,
        ToolKind::SymbolicDerivative,
        ToolKind::SymbolicIntegral,
        ToolKind::DefiniteIntegral,
        ToolKind::WebSearcher,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Exponent => "exponent",
            Self::SymbolicDerivative => "symbolic_derivative",
            Self::SymbolicIntegral => "symbolic_integral",
            Self::DefiniteIntegral => "definite_integral",
            Self::WebSearcher => "web_searcher",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Name, description, parameters and return type exposed to the model.
    pub fn definition(self) -> ToolDefinition {
        let number = |name: &str, description: &str| ParamSpec::required(name, ParamType::Number, description);
        let expression = ParamSpec::required(
            "expression",
            ParamType::String,
            "Expression in Python/sympy syntax, e.g. \"5*x - 3*x**2\" or \"sin(2*x)*exp(x)\"",
        );
        let variable = ParamSpec::optional(
            "variable",
            ParamType::String,
            "Variable to differentiate or integrate with respect to",
            json!("x"),
        );

        let (description, parameters, returns) = match self {
            Self::Add => (
                "Adds two numbers and returns the sum a + b.",
                vec![number("a", "The first number to add"), number("b", "The second number to add")],
                ReturnType::Number,
            ),
            Self::Subtract => (
                "Subtracts the second number from the first and returns a - b.",
                vec![number("a", "The number to subtract from"), number("b", "The number to subtract")],
                ReturnType::Number,
            ),
            Self::Multiply => (
                "Multiplies two numbers and returns the product a * b.",
                vec![number("a", "The first factor"), number("b", "The second factor")],
                ReturnType::Number,
            ),
            Self::Divide => (
                "Divides the first number by the second and returns a / b. Fails when b is zero.",
                vec![number("a", "The dividend"), number("b", "The divisor (must not be zero)")],
                ReturnType::Number,
            ),
            Self::Exponent => (
                "Raises a to the power b. A negative b gives the reciprocal power; a fractional \
                 power of a negative base has no real result and fails.",
                vec![number("a", "The base"), number("b", "The exponent")],
                ReturnType::Number,
            ),
            Self::SymbolicDerivative => (
                "Computes the symbolic derivative of an expression with respect to a variable \
                 and returns the simplified result.",
                vec![expression, variable],
                ReturnType::Expression,
            ),
            Self::SymbolicIntegral => (
                "Computes the indefinite integral (antiderivative, without the constant) of an \
                 expression with respect to a variable.",
                vec![expression, variable],
                ReturnType::Expression,
            ),
            Self::DefiniteIntegral => (
                "Computes the definite integral of an expression with respect to a variable \
                 between a lower and an upper limit, returned as an exact value where possible.",
                vec![
                    expression,
                    variable,
                    number("lower_limit", "Lower limit of integration"),
                    number("upper_limit", "Upper limit of integration"),
                ],
                ReturnType::Expression,
            ),
            Self::WebSearcher => (
                "Searches the web for background knowledge, e.g. the definition of a Laplace or \
                 Fourier transform or a formula you need. Use it to look up the method, then \
                 solve the question with the calculation tools rather than quoting the results.",
                vec![ParamSpec::required("query", ParamType::String, "The search query")],
                ReturnType::SearchResults,
            ),
        };

        ToolDefinition {
            name: self.name().to_string(),
            description: description.to_string(),
            parameters,
            returns,
        }
    }

    /// Validate raw arguments and decode them into a typed invocation.
    pub fn parse(self, arguments: &serde_json::Value) -> Result<ToolInvocation, ToolError> {
        let checked = serde_json::Value::Object(self.definition().validate(arguments)?);
        let decode_error = |e: serde_json::Error| ToolError::invalid_args(self.name(), e.to_string());

        macro_rules! decode {
            ($variant:ident) => {
                ToolInvocation::$variant(serde_json::from_value(checked).map_err(decode_error)?)
            };
        }

        Ok(match self {
            Self::Add => decode!(Add),
            Self::Subtract => decode!(Subtract),
            Self::Multiply => decode!(Multiply),
            Self::Divide => decode!(Divide),
            Self::Exponent => decode!(Exponent),
            Self::SymbolicDerivative => decode!(SymbolicDerivative),
            Self::SymbolicIntegral => decode!(SymbolicIntegral),
            Self::DefiniteIntegral => decode!(DefiniteIntegral),
            Self::WebSearcher => decode!(WebSearcher),
        })
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Tool values
// ---------------------------------------------------------------------------

/// Successful output of a tool, matching its declared [`ReturnType`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolValue {
    Number(f64),
    Expression(String),
    SearchResults(Vec<SearchHit>),
}

impl ToolValue {
    pub fn return_type(&self) -> ReturnType {
        match self {
            Self::Number(_) => ReturnType::Number,
            Self::Expression(_) => ReturnType::Expression,
            Self::SearchResults(_) => ReturnType::SearchResults,
        }
    }
}

impl fmt::Display for ToolValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(x) => write!(f, "{:?}", x),
            Self::Expression(e) => f.write_str(e),
            Self::SearchResults(hits) => {
                let json = serde_json::to_string(hits).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
            assert_eq!(kind.definition().name, kind.name());
        }
        assert_eq!(ToolKind::from_name("sqrt"), None);
    }

    #[test]
    fn parses_typed_arguments() {
        let call = ToolKind::Multiply.parse(&json!({"a": 4.5, "b": "2"})).unwrap();
        assert_eq!(call, ToolInvocation::Multiply(BinaryArgs { a: 4.5, b: 2.0 }));

        let call = ToolKind::SymbolicIntegral
            .parse(&json!({"expression": "x**2"}))
            .unwrap();
        assert_eq!(
            call,
            ToolInvocation::SymbolicIntegral(CalculusArgs {
                expression: "x**2".into(),
                variable: "x".into(),
            })
        );

        let call = ToolKind::DefiniteIntegral
            .parse(&json!({"expression": "x", "lower_limit": 0, "upper_limit": 2}))
            .unwrap();
        let ToolInvocation::DefiniteIntegral(args) = call else {
            panic!("wrong variant");
        };
        assert_eq!(args.upper_limit, 2.0);
        assert_eq!(args.variable, "x");
    }

    #[test]
    fn missing_arguments_are_validation_errors() {
        let err = ToolKind::WebSearcher.parse(&json!({})).unwrap_err();
        assert_eq!(
            err,
            ToolError::invalid_args("web_searcher", "missing required parameter 'query'")
        );
    }

    #[test]
    fn values_render_for_the_model() {
        assert_eq!(ToolValue::Number(9.0).to_string(), "9.0");
        assert_eq!(ToolValue::Expression("x**3/3".into()).to_string(), "x**3/3");
        let hits = ToolValue::SearchResults(vec![SearchHit {
            title: "Laplace transform".into(),
            url: "https://example.org/laplace".into(),
            excerpt: "F(s) = ...".into(),
        }]);
        assert!(hits.to_string().starts_with("[{\"title\":\"Laplace transform\""));
        assert_eq!(hits.return_type(), ReturnType::SearchResults);
    }
}
