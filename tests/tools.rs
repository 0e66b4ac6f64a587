//! Integration tests for the tool registry.

mod common;

use common::*;
use math_agent::cas::SymbolicEngine;
use math_agent::error::{ErrorKind, RegistryError, ToolError};
use math_agent::tools::{ReturnType, ToolKind, ToolRegistry, ToolValue};
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_registry_initialization() {
    let registry = registry();
    assert_eq!(
        registry.names(),
        vec![
            "multiply",
            "add",
            "subtract",
            "divide",
            "exponent",
            "symbolic_derivative",
            "symbolic_integral",
            "definite_integral",
            "web_searcher",
        ]
    );
}

#[test]
fn test_tool_definitions_schema() {
    let definitions = registry().schema();
    assert_eq!(definitions.len(), 9);

    for def in &definitions {
        assert!(!def.description.is_empty(), "{} has no description", def.name);
        let params = def.parameters_json();
        assert_eq!(params["type"], "object");
        assert!(params["properties"].is_object());
        assert!(params["required"].is_array());
    }

    let definite = definitions
        .iter()
        .find(|d| d.name == "definite_integral")
        .unwrap();
    assert_eq!(definite.returns, ReturnType::Expression);
    let params = definite.parameters_json();
    assert_eq!(
        params["required"],
        json!(["expression", "lower_limit", "upper_limit"])
    );
    assert_eq!(params["properties"]["variable"]["default"], "x");

    let search = definitions.iter().find(|d| d.name == "web_searcher").unwrap();
    assert_eq!(search.returns, ReturnType::SearchResults);
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let mut registry = ToolRegistry::new(
        Arc::new(SymbolicEngine::new()),
        Arc::new(StubSearch::laplace()),
    );
    registry.register(ToolKind::Add).unwrap();
    let err = registry.register(ToolKind::Add).unwrap_err();
    assert_eq!(err, RegistryError::DuplicateName("add".into()));
    assert_eq!(err.report().kind, ErrorKind::DuplicateName);
    assert_eq!(registry.names(), vec!["add"]);
}

#[tokio::test]
async fn test_arithmetic_execution() {
    let registry = registry();
    let cases = [
        ("add", json!({"a": 10.0, "b": 5.0}), 15.0),
        ("subtract", json!({"a": 10, "b": 5.5}), 4.5),
        ("multiply", json!({"a": "4.5", "b": 2}), 9.0),
        ("divide", json!({"a": 7, "b": 2}), 3.5),
        ("exponent", json!({"a": 2, "b": -2}), 0.25),
    ];
    for (name, args, expected) in cases {
        let value = registry.invoke(name, &args).await.unwrap();
        assert_eq!(value, ToolValue::Number(expected), "{}", name);
    }
}

#[tokio::test]
async fn test_arithmetic_errors() {
    let registry = registry();

    let err = registry
        .invoke("divide", &json!({"a": 1, "b": 0}))
        .await
        .unwrap_err();
    assert_eq!(err, ToolError::DivisionByZero);

    let err = registry
        .invoke("exponent", &json!({"a": -8, "b": 0.5}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NonFiniteResult);

    let err = registry
        .invoke("add", &json!({"a": 1, "b": 2, "c": 3}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArgumentValidation);

    let err = registry
        .invoke("add", &json!({"a": "one", "b": 2}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArgumentValidation);
}

#[tokio::test]
async fn test_arguments_as_json_string() {
    let value = registry()
        .invoke("multiply", &json!("{\"a\": 3, \"b\": 3}"))
        .await
        .unwrap();
    assert_eq!(value.to_string(), "9.0");
}

#[tokio::test]
async fn test_symbolic_execution() {
    let registry = registry();

    let value = registry
        .invoke("symbolic_derivative", &json!({"expression": "5*x - 3*x**2"}))
        .await
        .unwrap();
    assert_eq!(value, ToolValue::Expression("-6*x + 5".into()));

    let value = registry
        .invoke(
            "symbolic_integral",
            &json!({"expression": "5*x - 3*x**2", "variable": "x"}),
        )
        .await
        .unwrap();
    assert_eq!(value.to_string(), "-x**3 + 5*x**2/2");

    let value = registry
        .invoke(
            "definite_integral",
            &json!({"expression": "5*x - 3*x**2", "lower_limit": 0, "upper_limit": 1}),
        )
        .await
        .unwrap();
    assert_eq!(value.to_string(), "3/2");
}

#[tokio::test]
async fn test_symbolic_errors() {
    let registry = registry();

    let err = registry
        .invoke("symbolic_derivative", &json!({"expression": "5*x -"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExpressionParse);

    let err = registry
        .invoke(
            "symbolic_integral",
            &json!({"expression": "x**2", "variable": "2y"}),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownVariable);

    let err = registry
        .invoke("symbolic_integral", &json!({"expression": "exp(x**2)"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CasBackend);

    let err = registry
        .invoke("definite_integral", &json!({"expression": "x**2"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArgumentValidation);
}

#[tokio::test]
async fn test_divergent_definite_integrals_fail() {
    let registry = registry();

    for (expression, lower, upper) in [("1/(x - 0.3)**2", 0, 1), ("a/x**2", -1, 1)] {
        let err = registry
            .invoke(
                "definite_integral",
                &json!({"expression": expression, "lower_limit": lower, "upper_limit": upper}),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CasBackend, "{}", expression);
    }

    let value = registry
        .invoke(
            "definite_integral",
            &json!({"expression": "1/x", "lower_limit": -2, "upper_limit": -1}),
        )
        .await
        .unwrap();
    assert_eq!(value.to_string(), "-log(2)");
}

#[tokio::test]
async fn test_deeply_nested_expression_is_a_parse_error() {
    let registry = registry();
    let expression = format!("{}x{}", "(".repeat(100_000), ")".repeat(100_000));

    let err = registry
        .invoke("symbolic_derivative", &json!({"expression": expression}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExpressionParse);
}

#[tokio::test]
async fn test_web_searcher() {
    let registry = registry();

    let value = registry
        .invoke("web_searcher", &json!({"query": "Laplace transform"}))
        .await
        .unwrap();
    match &value {
        ToolValue::SearchResults(hits) => {
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].title, "Laplace transform");
        }
        other => panic!("expected search results, got {:?}", other),
    }
    assert_eq!(value.return_type(), ReturnType::SearchResults);

    let err = registry
        .invoke("web_searcher", &json!({"query": "   "}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArgumentValidation);
}

#[tokio::test]
async fn test_unknown_tool() {
    let err = registry()
        .invoke("sqrt", &json!({"a": 4}))
        .await
        .unwrap_err();
    assert_eq!(err, ToolError::UnknownTool("sqrt".into()));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_unregistered_tool_is_unknown() {
    let mut registry = ToolRegistry::new(
        Arc::new(SymbolicEngine::new()),
        Arc::new(StubSearch::laplace()),
    );
    registry.register(ToolKind::Add).unwrap();
    let err = registry
        .invoke("multiply", &json!({"a": 1, "b": 2}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownTool);
}
