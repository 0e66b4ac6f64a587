//! Declared shape of a tool: parameters, defaults and return type.

use crate::error::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Type of a single tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Number,
    String,
}

impl ParamType {
    fn json_type(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::String => "string",
        }
    }

    /// Coerce a supplied JSON value into this type.
    ///
    /// Numeric strings are accepted for numbers and numbers for strings;
    /// anything else is rejected with a reason.
    fn coerce(self, value: &Value) -> Result<Value, String> {
        match (self, value) {
            (Self::Number, Value::Number(n)) => match n.as_f64() {
                Some(x) if x.is_finite() => Ok(json!(x)),
                _ => Err(format!("must be a finite number, got {}", n)),
            },
            (Self::Number, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(x) if x.is_finite() => Ok(json!(x)),
                _ => Err(format!("must be a number, got \"{}\"", s)),
            },
            (Self::Number, other) => Err(format!("must be a number, got {}", other)),
            (Self::String, Value::String(s)) => Ok(Value::String(s.clone())),
            (Self::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (Self::String, other) => Err(format!("must be a string, got {}", other)),
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: &str, ty: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            ty,
            description: description.to_string(),
            default: None,
        }
    }

    pub fn optional(name: &str, ty: ParamType, description: &str, default: Value) -> Self {
        Self {
            default: Some(default),
            ..Self::required(name, ty, description)
        }
    }
}

/// Shape of a successful tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    /// A single floating-point number.
    Number,
    /// A simplified expression in `sympy` string syntax.
    Expression,
    /// A JSON array of `{title, url, excerpt}` objects.
    SearchResults,
}

impl ReturnType {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Number => "a number",
            Self::Expression => "an expression string",
            Self::SearchResults => "a JSON array of {title, url, excerpt} objects",
        }
    }
}

/// Definition of a tool exposed to the inference model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
    pub returns: ReturnType,
}

impl ToolDefinition {
    /// JSON Schema for the parameters, as used in function calling.
    pub fn parameters_json(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.parameters {
            let mut prop = json!({
                "type": p.ty.json_type(),
                "description": p.description,
            });
            if let (Some(default), Value::Object(obj)) = (&p.default, &mut prop) {
                obj.insert("default".into(), default.clone());
            }
            properties.insert(p.name.clone(), prop);
        }
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.default.is_none())
            .map(|p| p.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check `arguments` against the declared parameters.
    ///
    /// Returns an object holding every declared parameter, coerced to its
    /// type, with defaults filled in for omitted optional ones.
    pub fn validate(&self, arguments: &Value) -> Result<Map<String, Value>, ToolError> {
        let invalid = |reason: String| ToolError::invalid_args(&self.name, reason);

        let supplied = match arguments {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => map,
                _ => return Err(invalid(format!("arguments must be a JSON object, got {}", raw))),
            },
            other => return Err(invalid(format!("arguments must be a JSON object, got {}", other))),
        };

        if let Some(unknown) = supplied
            .keys()
            .find(|k| !self.parameters.iter().any(|p| &p.name == *k))
        {
            return Err(invalid(format!("unexpected parameter '{}'", unknown)));
        }

        let mut checked = Map::new();
        for p in &self.parameters {
            let value = match supplied.get(&p.name).filter(|v| !v.is_null()) {
                Some(v) => p
                    .ty
                    .coerce(v)
                    .map_err(|reason| invalid(format!("parameter '{}' {}", p.name, reason)))?,
                None => match &p.default {
                    Some(default) => default.clone(),
                    None => return Err(invalid(format!("missing required parameter '{}'", p.name))),
                },
            };
            checked.insert(p.name.clone(), value);
        }
        Ok(checked)
    }
}
