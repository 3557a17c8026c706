//! Prelude module for convenient imports.
//!
//! This module re-exports commonly used types for ergonomic imports:
//!
//! ```rust
//! use tessera_runtime::prelude::*;
//! ```

pub use crate::action::{Action, Parameter};
pub use crate::builder::{AlgorithmBuilder, Arguments, Scope, StepHandle, Terminal};
pub use crate::catalog::Catalog;
pub use crate::context::Context;
pub use crate::error::{BoxedError, Error, ErrorKind, Result};
pub use crate::interpreter::{Evaluation, Interpreter, InterpreterConfig};
pub use crate::strategy::{Callable, EngineKey, Returned};
pub use crate::types::{Rejection, Type};
pub use crate::value::{Value, Values};
