//! Layered system prompt builder.
//!
//! Layers (in order):
//! 1. Base instructions (from config)
//! 2. Tool-use guidance and expression syntax
//! 3. Tool catalog with return shapes

use crate::tools::ToolDefinition;
use tracing::debug;

/// How the model should go about using the tools.
const TOOL_GUIDANCE: &str = r#"
# Working with tools

Use the tools for every calculation instead of computing in your head.
Break multi-step problems into tool calls and feed each result into the next.
If a problem needs background knowledge (for example a Laplace or Fourier
transform definition), call `web_searcher` first, then solve the problem with
the calculation tools. Do not answer with the search results themselves.

When a tool reports an error, read the message, fix the arguments and try
again. Once you have everything you need, answer in plain language and state
the final result clearly.

# Expression syntax

Symbolic tools take expressions in Python/sympy syntax: `*` for
multiplication (write `2*x`, not `2x`), `**` or `^` for powers, and the
functions sin, cos, tan, asin, acos, atan, sinh, cosh, tanh, exp, log (ln),
sqrt. The constants are `pi` and `E`.
"#;

/// Build the complete system prompt for a run.
pub fn build_system_prompt(base: &str, tools: &[ToolDefinition]) -> String {
    let mut prompt = String::with_capacity(2048);

    // Layer 1: base instructions
    prompt.push_str(base.trim());
    prompt.push('\n');

    // Layer 2: guidance
    prompt.push_str(TOOL_GUIDANCE);

    // Layer 3: catalog
    if !tools.is_empty() {
        prompt.push_str("\n# Available tools\n\n");
        for tool in tools {
            prompt.push_str(&format!(
                "- `{}`: returns {}\n",
                tool.name,
                tool.returns.describe()
            ));
        }
    }

    debug!("System prompt: {} chars", prompt.len());
    prompt
}
