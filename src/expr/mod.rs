//! Expression engines for breakpoint conditions and memory navigation.
//!
//! Breakpoint conditions are parsed into a [`condition::ConditionTree`] and
//! flattened for remote evaluation on the debug agent. Memory navigation
//! expressions are parsed into a [`memory::MemoryExpression`] and evaluated
//! locally with [`memory_eval::MemoryEvaluator`].

pub mod condition;
pub mod condition_parser;
pub mod memory;
pub mod memory_eval;
pub mod memory_parser;

pub use condition::{ConditionInstruction, ConditionTree};
pub use condition_parser::parse_condition;
pub use memory::MemoryExpression;
pub use memory_eval::{MemoryEvaluator, MemoryReader};
pub use memory_parser::parse_memory_expression;
