//! Integration test suite for conductor.
//!
//! These tests drive the orchestrator end to end against in-memory
//! collaborators: scripted workers, a scripted LLM, a recording tool bridge,
//! the in-memory bus, and the in-memory state store.
//!
//! # Test Categories
//!
//! - `orchestrator_flow`: Full request execution, failure handling, checkpoints
//! - `parallel_groups`: Concurrency and ordering within and across groups
//! - `planner_e2e`: Deterministic and model-assisted planning through the orchestrator
//! - `conversational`: The question-answering branch
//!
//! No test makes a network call or touches the real editor.

mod fixtures;

mod orchestrator_flow;
