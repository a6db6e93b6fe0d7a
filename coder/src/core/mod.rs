//! Deterministic, pure logic shared by the agent.
//!
//! Core modules are free of I/O side effects. They operate on in-memory
//! data structures (model output text, task lists, transcripts, source code)
//! and return deterministic outputs suitable for tests.

pub mod action;
pub mod budget;
pub mod critic;
pub mod tasks;
pub mod tool_call;
pub mod touched;
pub mod transcript;
pub mod types;
