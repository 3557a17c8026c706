#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod action;
pub mod builder;
pub mod catalog;
pub mod context;
mod error;
pub mod graph;
pub mod interpreter;
pub mod strategy;
pub mod timing;
pub mod types;
pub mod value;

#[doc(hidden)]
pub mod prelude;

pub use action::{Action, Direction, Let, Parameter, PortKey};
pub use builder::{AlgorithmBuilder, Arguments, Scope};
pub use catalog::Catalog;
pub use context::Context;
pub use error::{BoxedError, Entity, Error, ErrorKind, Result};
pub use interpreter::{Evaluation, Interpreter, InterpreterConfig};
pub use strategy::{Callable, EngineKey, Returned, Strategy, StrategyTarget};
pub use types::{Rejection, Type};
pub use value::{Value, Values};

/// Tracing target for runtime operations.
pub const TRACING_TARGET: &str = "tessera_runtime";
