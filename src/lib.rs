//! Question answering over tables by growing a chain of table operations.
//!
//! A run starts from a [`table::Table`] and a question. Each step picks one
//! of five atomic operations ([`ops::OperationKind`]), generates its
//! arguments, validates them against the current table, and applies them.
//! The loop stops when the table can answer the question, when the planner
//! ends the chain, or when the step budget runs out. An LM collaborator
//! ([`lm::TextGenerator`]) is optional; without one, keyword heuristics plan
//! and fill arguments.
pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod lm;
pub mod ops;
pub mod report;
pub mod table;
pub mod util;
pub mod workflow;
