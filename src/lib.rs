//! math-agent: a tool-calling LLM agent for arithmetic, symbolic calculus
//! and web lookups.
//!
//! The model picks tools from a fixed catalog (add, subtract, multiply,
//! divide, exponent, symbolic_derivative, symbolic_integral,
//! definite_integral, web_searcher); the agent loop runs them and feeds the
//! results back until the model produces a final answer.

pub mod agent;
pub mod cas;
pub mod config;
pub mod error;
pub mod inference;
pub mod search;
pub mod tools;
pub mod types;
