//! Tool registry: the catalog offered to the model and the dispatcher that
//! runs validated calls against it.

use super::{arithmetic, symbolic, web, ToolDefinition, ToolInvocation, ToolKind, ToolValue};
use crate::cas::CasBackend;
use crate::error::{RegistryError, ToolError};
use crate::search::SearchBackend;
use std::sync::Arc;
use tracing::debug;

/// Registered tools plus the backends they delegate to.
pub struct ToolRegistry {
    tools: Vec<ToolKind>,
    cas: Arc<dyn CasBackend>,
    search: Arc<dyn SearchBackend>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new(cas: Arc<dyn CasBackend>, search: Arc<dyn SearchBackend>) -> Self {
        Self {
            tools: Vec::new(),
            cas,
            search,
        }
    }

    /// A registry holding every known tool.
    pub fn with_default_tools(
        cas: Arc<dyn CasBackend>,
        search: Arc<dyn SearchBackend>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new(cas, search);
        for kind in ToolKind::ALL {
            registry.register(kind)?;
        }
        Ok(registry)
    }

    /// Add a tool; names must be unique.
    pub fn register(&mut self, kind: ToolKind) -> Result<(), RegistryError> {
        if self.tools.contains(&kind) {
            return Err(RegistryError::DuplicateName(kind.name().to_string()));
        }
        debug!("Registered tool {}", kind);
        self.tools.push(kind);
        Ok(())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|k| k.name()).collect()
    }

    /// The catalog in registration order.
    pub fn schema(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|k| k.definition()).collect()
    }

    fn lookup(&self, name: &str) -> Result<ToolKind, ToolError> {
        ToolKind::from_name(name)
            .filter(|k| self.tools.contains(k))
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Look up `name`, validate `arguments` and run the tool.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<ToolValue, ToolError> {
        let invocation = self.lookup(name)?.parse(arguments)?;
        debug!("Invoking {:?}", invocation);
        self.execute(invocation).await
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolValue, ToolError> {
        use ToolInvocation::*;

        let cas = self.cas.as_ref();
        match invocation {
            Add(args) => arithmetic::add(args.a, args.b).map(ToolValue::Number),
            Subtract(args) => arithmetic::subtract(args.a, args.b).map(ToolValue::Number),
            Multiply(args) => arithmetic::multiply(args.a, args.b).map(ToolValue::Number),
            Divide(args) => arithmetic::divide(args.a, args.b).map(ToolValue::Number),
            Exponent(args) => arithmetic::exponent(args.a, args.b).map(ToolValue::Number),
            SymbolicDerivative(args) => symbolic::derivative(cas, &args).map(ToolValue::Expression),
            SymbolicIntegral(args) => symbolic::integral(cas, &args).map(ToolValue::Expression),
            DefiniteIntegral(args) => {
                symbolic::definite_integral(cas, &args).map(ToolValue::Expression)
            }
            WebSearcher(args) => web::web_search(self.search.as_ref(), &args.query)
                .await
                .map(ToolValue::SearchResults),
        }
    }
}
