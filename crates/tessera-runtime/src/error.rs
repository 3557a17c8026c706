//! Error types for declarations, graph construction and evaluation.

use strum::{AsRefStr, Display, IntoStaticStr};
use thiserror::Error;

use crate::action::Direction;
use crate::strategy::EngineKey;

/// Type alias for boxed dynamic errors that can be sent across threads.
///
/// Strategy bodies and type validators report their own failures with this
/// type; the runtime keeps them as the `source` of a structured [`Error`].
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for runtime operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categories of errors that can occur in runtime operations.
///
/// Every category is terminal: nothing is retried internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, IntoStaticStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Duplicate registration of a code or a (code, engine) pair.
    AlreadyExists,
    /// Lookup of something that was never registered or produced.
    NotExists,
    /// Argument set does not match the declared ports.
    InvalidParams,
    /// A value was rejected by its port's type validator.
    InvalidType,
    /// Structurally malformed declaration or graph.
    InvalidDeclaration,
    /// A type validator failed with something other than a rejection.
    Unexpected,
    /// A strategy body returned its own error.
    ExecutionFailed,
}

/// Kind of registry entry an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Entity {
    /// A declared action.
    Action,
    /// An action defined by a graph of steps.
    Algorithm,
    /// Strategies registered for an action.
    Implementation,
}

/// Errors that can occur while declaring, building or evaluating actions.
#[derive(Debug, Error)]
pub enum Error {
    /// A code is already registered.
    #[error("{entity} with code `{code}` already exists")]
    AlreadyExists {
        /// Registry the code was inserted into.
        entity: Entity,
        /// Duplicate code.
        code: String,
    },

    /// A code is not registered.
    #[error("{entity} with code `{code}` does not exist")]
    NotExists {
        /// Registry that was queried.
        entity: Entity,
        /// Missing code.
        code: String,
    },

    /// A strategy is already registered under this (action, engine) pair.
    #[error("action `{action}` with engine `{engine}` already exists")]
    EngineAlreadyExists {
        /// Action code.
        action: String,
        /// Duplicate engine key.
        engine: EngineKey,
    },

    /// No strategy is registered under this (action, engine) pair.
    #[error("action `{action}` with engine `{engine}` does not exist")]
    EngineNotExists {
        /// Action code.
        action: String,
        /// Missing engine key.
        engine: EngineKey,
    },

    /// Two ports of the same direction share a name.
    #[error("action `{action}` declares {direction}let `{name}` more than once")]
    DuplicatePort {
        /// Action code.
        action: String,
        /// Port direction.
        direction: Direction,
        /// Repeated port name.
        name: String,
    },

    /// Supplied keys differ from the declared port names.
    #[error(
        "action `{action}`: {direction}-params do not match (unexpected: [{}], missing: [{}])",
        .unexpected.join(","),
        .missing.join(",")
    )]
    MismatchedKeys {
        /// Action code.
        action: String,
        /// Port direction that was validated.
        direction: Direction,
        /// Supplied keys that are not declared.
        unexpected: Vec<String>,
        /// Declared keys that were not supplied.
        missing: Vec<String>,
    },

    /// A port was requested by an unknown code or an out-of-range index.
    #[error("{owner} does not have {direction}let with {port}")]
    UnknownPort {
        /// Description of the action or step that was queried.
        owner: String,
        /// Port direction.
        direction: Direction,
        /// Rendered code or index.
        port: String,
    },

    /// The builder produced a different number of results than declared outlets.
    #[error("algorithm `{algorithm}` declares {declared} outlets but the builder produced {received}")]
    OutletCountMismatch {
        /// Algorithm code.
        algorithm: String,
        /// Declared outlet count.
        declared: usize,
        /// Normalized result count.
        received: usize,
    },

    /// An action has no strategy registered at all.
    #[error("strategies for action `{action}` do not exist")]
    NoImplementation {
        /// Action code.
        action: String,
    },

    /// The context asked for an engine the action has no strategy for.
    #[error("action `{action}` has no strategy for engine `{engine}`")]
    UnknownEngine {
        /// Action code.
        action: String,
        /// Requested engine key.
        engine: EngineKey,
    },

    /// A value was rejected by the type validator of its port.
    #[error(
        "action `{action}`: incorrect type of {direction}-parameter `{parameter}` \
         (value: {value}); expected type `{expected}`: {reason}"
    )]
    InvalidType {
        /// Action code.
        action: String,
        /// Port direction.
        direction: Direction,
        /// Parameter name.
        parameter: String,
        /// Rendered offending value.
        value: String,
        /// Expected type code.
        expected: String,
        /// Validator message.
        reason: String,
    },

    /// A type validator failed with an error that is not a rejection.
    #[error("validator of type `{type_code}` failed unexpectedly")]
    Unexpected {
        /// Type code of the failing validator.
        type_code: String,
        /// Underlying error.
        #[source]
        source: BoxedError,
    },

    /// A non-context step inlet has no source in the binding map.
    #[error("in algorithm `{algorithm}` for step {step} (`{action}`) not bound inlet `{inlet}`")]
    UnboundInlet {
        /// Algorithm code.
        algorithm: String,
        /// Step ordinal.
        step: usize,
        /// Action placed at the step.
        action: String,
        /// Inlet name.
        inlet: String,
    },

    /// A step with several outlets was used where a single value is expected.
    #[error("step {step} (`{action}`) has {outlets} outlets and cannot stand in for a single value")]
    AmbiguousStep {
        /// Step ordinal.
        step: usize,
        /// Action placed at the step.
        action: String,
        /// Outlet count of the action.
        outlets: usize,
    },

    /// A strategy returned a different number of results than declared outlets.
    #[error("action `{action}` declares {declared} outlets but its strategy returned {received} results")]
    ResultCountMismatch {
        /// Action code.
        action: String,
        /// Declared outlet count.
        declared: usize,
        /// Returned result count.
        received: usize,
    },

    /// A callable was invoked with keyword arguments it does not accept.
    #[error(
        "seems like callable for action `{action}` (engine `{engine}`) has invalid declaration: \
         accepts ({}), called with ({})",
        .expected.join(", "),
        .received.join(", ")
    )]
    SignatureMismatch {
        /// Action code.
        action: String,
        /// Engine key of the strategy.
        engine: EngineKey,
        /// Parameter names the callable accepts.
        expected: Vec<String>,
        /// Keyword names it was called with.
        received: Vec<String>,
    },

    /// A strategy target is an action and cannot be called directly.
    #[error("strategy for action `{action}` (engine `{engine}`) delegates to `{target}` and needs an interpreter")]
    NotCallable {
        /// Action code.
        action: String,
        /// Engine key of the strategy.
        engine: EngineKey,
        /// Code of the delegated action.
        target: String,
    },

    /// A bind call used a port in a role it cannot play.
    #[error("invalid binding in algorithm `{algorithm}`: {reason}")]
    InvalidBinding {
        /// Algorithm code.
        algorithm: String,
        /// What was wrong with the binding.
        reason: String,
    },

    /// Graph evaluation referenced a value that was never produced.
    #[error("algorithm `{algorithm}`: no value was produced for {port}")]
    MissingValue {
        /// Algorithm code.
        algorithm: String,
        /// Rendered source port.
        port: String,
    },

    /// A strategy body failed.
    #[error("strategy for action `{action}` (engine `{engine}`) failed")]
    ExecutionFailed {
        /// Action code.
        action: String,
        /// Engine key of the strategy.
        engine: EngineKey,
        /// Error returned by the body.
        #[source]
        source: BoxedError,
    },
}

impl Error {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyExists { .. } | Self::EngineAlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::NotExists { .. } | Self::EngineNotExists { .. } | Self::MissingValue { .. } => {
                ErrorKind::NotExists
            }
            Self::MismatchedKeys { .. }
            | Self::UnknownPort { .. }
            | Self::OutletCountMismatch { .. }
            | Self::NoImplementation { .. }
            | Self::UnknownEngine { .. } => ErrorKind::InvalidParams,
            Self::InvalidType { .. } => ErrorKind::InvalidType,
            Self::DuplicatePort { .. }
            | Self::UnboundInlet { .. }
            | Self::AmbiguousStep { .. }
            | Self::ResultCountMismatch { .. }
            | Self::SignatureMismatch { .. }
            | Self::NotCallable { .. }
            | Self::InvalidBinding { .. } => ErrorKind::InvalidDeclaration,
            Self::Unexpected { .. } => ErrorKind::Unexpected,
            Self::ExecutionFailed { .. } => ErrorKind::ExecutionFailed,
        }
    }

    /// Returns the error kind as a string.
    pub fn kind_str(&self) -> &'static str {
        self.kind().into()
    }
}
