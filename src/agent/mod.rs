//! The tool-calling agent: prompt, message context and the loop itself.

pub mod context;
pub mod loop_;
pub mod system_prompt;

pub use loop_::{Agent, Completion, LoopOptions};
