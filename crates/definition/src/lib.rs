#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Orrery Definition
//!
//! Immutable process definitions for the Orrery process engine.
//!
//! A process definition is a directed graph of typed nodes joined by
//! (optionally conditional) connections, plus the variables and imports the
//! graph refers to. This crate provides:
//!
//! - [`ProcessDefinition`] with its [`VariableDeclaration`]s and [`ImportTable`]
//! - [`NodeDefinition`] and the [`NodeKind`] variants (start, end, task,
//!   event wait, gateway, sub-process)
//! - [`Connection`] and [`FlowPath`] for edges between nodes
//! - [`ProcessGraph`] (a `petgraph` index) for outgoing/incoming lookups
//! - [`ProcessDefinitionBuilder`] for fluent, validated construction
//! - [`validate_definition`] for multi-error validation
//! - [`HandlingStrategy`] and [`RetryConfig`], the failure policy attached to tasks

pub mod builder;
pub mod connection;
pub mod definition;
pub mod error;
pub mod graph;
pub mod import;
pub mod node;
pub mod strategy;
pub mod validate;
pub mod variable;

pub use builder::ProcessDefinitionBuilder;
pub use connection::{Connection, FlowPath};
pub use definition::ProcessDefinition;
pub use error::DefinitionError;
pub use graph::ProcessGraph;
pub use import::ImportTable;
pub use node::{
    DataMapping, EventNode, EventTrigger, GatewayKind, GatewayNode, NodeDefinition, NodeKind,
    ParameterSource, SubProcessNode, TaskNode, Transformation,
};
pub use strategy::{HandlingStrategy, RetryConfig};
pub use validate::validate_definition;
pub use variable::{VariableDeclaration, VariableType};
