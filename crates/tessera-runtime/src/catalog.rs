//! Registries of declared actions, algorithms and their strategies.
//!
//! A [`Catalog`] owns three pools:
//! - [`ActionPool`]: every declared action, algorithms included
//! - [`AlgorithmPool`]: actions defined by a graph of steps
//! - [`ImplementationPool`]: strategies keyed by action code, then engine
//!
//! Pools are insert-once: entries are never replaced or removed. Engines keep
//! their registration order so that the first registered engine can serve as
//! the deterministic default.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::action::{Action, Parameter};
use crate::error::{Entity, Error, Result};
use crate::strategy::{Callable, EngineKey, Strategy, StrategyTarget};
use crate::value::Values;

/// Tracing target for registry operations.
pub const TRACING_TARGET: &str = "tessera_runtime::catalog";

/// Declared actions by code.
#[derive(Debug, Clone, Default)]
pub struct ActionPool {
    actions: IndexMap<String, Arc<Action>>,
}

impl ActionPool {
    /// Registers an action, failing if the code is taken.
    pub fn register(&mut self, action: Arc<Action>) -> Result<()> {
        self.ensure_vacant(action.code())?;
        self.actions.insert(action.code().to_owned(), action);
        Ok(())
    }

    /// Returns the action registered under a code.
    pub fn get(&self, code: &str) -> Result<&Arc<Action>> {
        self.actions.get(code).ok_or_else(|| Error::NotExists {
            entity: Entity::Action,
            code: code.to_owned(),
        })
    }

    /// Returns whether a code is registered.
    pub fn contains(&self, code: &str) -> bool {
        self.actions.contains_key(code)
    }

    /// Returns the actions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Action>> {
        self.actions.values()
    }

    /// Returns the number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn ensure_vacant(&self, code: &str) -> Result<()> {
        if self.contains(code) {
            return Err(Error::AlreadyExists {
                entity: Entity::Action,
                code: code.to_owned(),
            });
        }
        Ok(())
    }
}

/// Algorithms by code.
#[derive(Debug, Clone, Default)]
pub struct AlgorithmPool {
    algorithms: IndexMap<String, Arc<Action>>,
}

impl AlgorithmPool {
    /// Registers an algorithm, failing if the code is taken.
    pub fn register(&mut self, algorithm: Arc<Action>) -> Result<()> {
        self.ensure_vacant(algorithm.code())?;
        self.algorithms.insert(algorithm.code().to_owned(), algorithm);
        Ok(())
    }

    /// Returns the algorithm registered under a code.
    pub fn get(&self, code: &str) -> Result<&Arc<Action>> {
        self.algorithms.get(code).ok_or_else(|| Error::NotExists {
            entity: Entity::Algorithm,
            code: code.to_owned(),
        })
    }

    /// Returns whether a code is registered.
    pub fn contains(&self, code: &str) -> bool {
        self.algorithms.contains_key(code)
    }

    /// Returns the algorithms in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Action>> {
        self.algorithms.values()
    }

    /// Returns the number of registered algorithms.
    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    /// Returns whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }

    fn ensure_vacant(&self, code: &str) -> Result<()> {
        if self.contains(code) {
            return Err(Error::AlreadyExists {
                entity: Entity::Algorithm,
                code: code.to_owned(),
            });
        }
        Ok(())
    }
}

/// Strategies by action code and engine key, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ImplementationPool {
    strategies: IndexMap<String, IndexMap<EngineKey, Strategy>>,
}

impl ImplementationPool {
    /// Registers a strategy, failing if its (action, engine) pair is taken.
    pub fn register(&mut self, strategy: Strategy) -> Result<()> {
        let engines = self
            .strategies
            .entry(strategy.action().code().to_owned())
            .or_default();
        if engines.contains_key(strategy.engine()) {
            return Err(Error::EngineAlreadyExists {
                action: strategy.action().code().to_owned(),
                engine: strategy.engine().clone(),
            });
        }
        engines.insert(strategy.engine().clone(), strategy);
        Ok(())
    }

    /// Returns the strategy for an (action, engine) pair.
    ///
    /// Fails with [`Error::NotExists`] if the action has no strategies and
    /// with [`Error::EngineNotExists`] if it has none for this engine.
    pub fn get(&self, code: &str, engine: &EngineKey) -> Result<&Strategy> {
        self.list(code)?
            .get(engine)
            .ok_or_else(|| Error::EngineNotExists {
                action: code.to_owned(),
                engine: engine.clone(),
            })
    }

    /// Returns all strategies of an action keyed by engine, in registration order.
    pub fn list(&self, code: &str) -> Result<&IndexMap<EngineKey, Strategy>> {
        self.strategies
            .get(code)
            .filter(|engines| !engines.is_empty())
            .ok_or_else(|| Error::NotExists {
                entity: Entity::Implementation,
                code: code.to_owned(),
            })
    }

    /// Returns the engines registered for an action, in registration order.
    pub fn engines(&self, code: &str) -> impl Iterator<Item = &EngineKey> {
        self.strategies
            .get(code)
            .into_iter()
            .flat_map(IndexMap::keys)
    }

    /// Returns the first registered strategy of an action.
    pub fn first(&self, code: &str) -> Option<&Strategy> {
        self.strategies
            .get(code)?
            .first()
            .map(|(_, strategy)| strategy)
    }
}

/// Registries of one workflow library.
///
/// Declarations and strategy registrations happen once, before evaluation;
/// evaluation only reads the catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    actions: ActionPool,
    algorithms: AlgorithmPool,
    implementations: ImplementationPool,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an action with ordered inlets and outlets.
    pub fn declare(
        &mut self,
        code: impl Into<String>,
        in_params: impl IntoIterator<Item = Parameter>,
        out_params: impl IntoIterator<Item = Parameter>,
    ) -> Result<Arc<Action>> {
        let action = Arc::new(Action::new(code, in_params, out_params)?);
        self.ensure_vacant(action.code())?;
        self.actions.register(action.clone())?;

        tracing::debug!(
            target: TRACING_TARGET,
            action = action.code(),
            inlets = action.inlet_count(),
            outlets = action.outlet_count(),
            "Action declared"
        );

        Ok(action)
    }

    /// Registers a host callable as the strategy of `action` under `engine`.
    pub fn implement(
        &mut self,
        action: &Arc<Action>,
        engine: impl Into<EngineKey>,
        callable: Callable,
    ) -> Result<()> {
        self.register_strategy(Strategy::new(
            action.clone(),
            engine,
            StrategyTarget::Callable(callable),
        ))
    }

    /// Registers `target` as the strategy of `action` under `engine`.
    ///
    /// Evaluating `action` with this engine evaluates `target` with the same
    /// inputs and returns its outputs.
    pub fn delegate(
        &mut self,
        action: &Arc<Action>,
        engine: impl Into<EngineKey>,
        target: &Arc<Action>,
    ) -> Result<()> {
        self.register_strategy(Strategy::new(
            action.clone(),
            engine,
            StrategyTarget::SubAction(target.clone()),
        ))
    }

    /// Registers a strategy.
    pub fn register_strategy(&mut self, strategy: Strategy) -> Result<()> {
        self.actions.get(strategy.action().code())?;
        self.implementations.register(strategy.clone())?;

        tracing::debug!(
            target: TRACING_TARGET,
            action = strategy.action().code(),
            engine = %strategy.engine(),
            "Strategy registered"
        );

        Ok(())
    }

    /// Returns the action pool.
    pub fn actions(&self) -> &ActionPool {
        &self.actions
    }

    /// Returns the algorithm pool.
    pub fn algorithms(&self) -> &AlgorithmPool {
        &self.algorithms
    }

    /// Returns the implementation pool.
    pub fn implementations(&self) -> &ImplementationPool {
        &self.implementations
    }

    /// Returns an action (or algorithm) by code.
    pub fn action(&self, code: &str) -> Result<&Arc<Action>> {
        self.actions.get(code)
    }

    /// Returns an algorithm by code.
    pub fn algorithm(&self, code: &str) -> Result<&Arc<Action>> {
        self.algorithms.get(code)
    }

    /// Runs the strategy of `code` under `engine` directly.
    ///
    /// The arguments are passed to the callable as they are, without port
    /// validation. Delegating strategies need an
    /// [`Interpreter`](crate::Interpreter) and fail here.
    pub fn execute(&self, code: &str, engine: &EngineKey, args: &Values) -> Result<Values> {
        let strategy = self.implementations.get(code, engine)?;
        strategy.evaluate(args)?.into_outputs(strategy.action())
    }

    /// Fails if a code is taken by an action or an algorithm.
    pub(crate) fn ensure_vacant(&self, code: &str) -> Result<()> {
        self.actions.ensure_vacant(code)?;
        self.algorithms.ensure_vacant(code)
    }

    /// Registers a finished algorithm in both the action and algorithm pools.
    pub(crate) fn insert_algorithm(&mut self, algorithm: Arc<Action>) -> Result<()> {
        self.ensure_vacant(algorithm.code())?;
        self.actions.register(algorithm.clone())?;
        self.algorithms.register(algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::Type;

    fn declare_sum(catalog: &mut Catalog) -> Arc<Action> {
        catalog
            .declare(
                "Sum",
                [
                    Parameter::new("a", Type::numeric()),
                    Parameter::new("b", Type::numeric()),
                ],
                [Parameter::new("res", Type::numeric())],
            )
            .unwrap()
    }

    fn add() -> Callable {
        Callable::new(["a", "b"], |args: &Values| {
            Ok(args.number("a")? + args.number("b")?)
        })
    }

    #[test]
    fn test_duplicate_action_code_is_rejected() {
        let mut catalog = Catalog::new();
        declare_sum(&mut catalog);

        let error = catalog.declare("Sum", [], []).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AlreadyExists);
        assert_eq!(catalog.actions().len(), 1);
    }

    #[test]
    fn test_unknown_action_is_not_exists() {
        let catalog = Catalog::new();
        assert_eq!(catalog.action("Sum").unwrap_err().kind(), ErrorKind::NotExists);
        assert_eq!(catalog.algorithm("Sum").unwrap_err().kind(), ErrorKind::NotExists);
    }

    #[test]
    fn test_duplicate_engine_is_rejected() {
        let mut catalog = Catalog::new();
        let sum = declare_sum(&mut catalog);
        catalog.implement(&sum, "native", add()).unwrap();

        let error = catalog.implement(&sum, "native", add()).unwrap_err();
        assert!(matches!(error, Error::EngineAlreadyExists { .. }));
        assert_eq!(error.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_strategy_for_undeclared_action_is_rejected() {
        let mut catalog = Catalog::new();
        let orphan = Arc::new(Action::new("Orphan", [], []).unwrap());
        let error = catalog.implement(&orphan, 1, Callable::new(Vec::<String>::new(), |_: &Values| Ok(())));
        assert_eq!(error.unwrap_err().kind(), ErrorKind::NotExists);
    }

    #[test]
    fn test_engines_keep_registration_order() {
        let mut catalog = Catalog::new();
        let sum = declare_sum(&mut catalog);
        for engine in ["zeta", "alpha", "mid"] {
            catalog.implement(&sum, engine, add()).unwrap();
        }

        let engines: Vec<&str> = catalog
            .implementations()
            .engines("Sum")
            .map(EngineKey::as_str)
            .collect();
        assert_eq!(engines, ["zeta", "alpha", "mid"]);
        assert_eq!(
            catalog.implementations().first("Sum").map(|s| s.engine().as_str()),
            Some("zeta")
        );
        assert_eq!(catalog.implementations().list("Sum").unwrap().len(), 3);
    }

    #[test]
    fn test_get_distinguishes_unknown_action_and_engine() {
        let mut catalog = Catalog::new();
        let sum = declare_sum(&mut catalog);
        catalog.implement(&sum, "native", add()).unwrap();

        let pool = catalog.implementations();
        assert!(matches!(
            pool.get("Sum", &EngineKey::new("gpu")),
            Err(Error::EngineNotExists { .. })
        ));
        assert!(matches!(
            pool.get("Product", &EngineKey::new("native")),
            Err(Error::NotExists { entity: Entity::Implementation, .. })
        ));
    }

    #[test]
    fn test_execute_runs_callable_directly() {
        let mut catalog = Catalog::new();
        let sum = declare_sum(&mut catalog);
        catalog.implement(&sum, "native", add()).unwrap();

        let outputs = catalog
            .execute("Sum", &EngineKey::new("native"), &Values::new().with("a", 2).with("b", 3))
            .unwrap();
        assert_eq!(outputs["res"].as_f64(), Some(5.0));
    }

    #[test]
    fn test_execute_refuses_delegating_strategy() {
        let mut catalog = Catalog::new();
        let sum = declare_sum(&mut catalog);
        let plus = catalog
            .declare(
                "Plus",
                [
                    Parameter::new("a", Type::numeric()),
                    Parameter::new("b", Type::numeric()),
                ],
                [Parameter::new("res", Type::numeric())],
            )
            .unwrap();
        catalog.delegate(&plus, "alias", &sum).unwrap();

        let error = catalog
            .execute("Plus", &EngineKey::new("alias"), &Values::new().with("a", 1).with("b", 1))
            .unwrap_err();
        assert!(matches!(error, Error::NotCallable { .. }));
    }
}
