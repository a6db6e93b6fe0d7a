//! LLM coding agent: a bounded loop that turns a goal into tool calls.
//!
//! Each step prompts a language model for one JSON action, executes it
//! against a small tool set (files, shell, tasks, code critique, delegation),
//! and feeds the result back until the model reports completion or the step
//! budget runs out. The crate keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (action parsing, typed tool calls,
//!   task bookkeeping, transcript windows, the code critic). No I/O.
//! - **[`io`]**: Side effects (config, model gateways, workspace files, shell
//!   processes, prompt rendering, export). Isolated behind small types and
//!   traits so tests can substitute scripted gateways and temp directories.
//!
//! Orchestration modules ([`tools`], [`reflection`], [`improve`],
//! [`delegate`], [`step`], [`looping`]) extend [`agents::Agent`] and tie the
//! two together.

pub mod agents;
pub mod core;
pub mod delegate;
pub mod exit_codes;
pub mod improve;
pub mod io;
pub mod logging;
pub mod looping;
pub mod reflection;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
