//! Bundled arithmetic library.
//!
//! Every action has a `native` engine. `Increment` and `AddTwo` also have a
//! `composed` engine, under which `AddTwo` delegates to the `IncrementTwice`
//! algorithm.

use tessera_runtime::prelude::*;

/// Engine of the host implementations.
pub const NATIVE: &str = "native";
/// Engine under which `AddTwo` is computed by an algorithm.
pub const COMPOSED: &str = "composed";

fn numeric(name: &str) -> Parameter {
    Parameter::new(name, Type::numeric())
}

fn unary(f: fn(f64) -> f64) -> Callable {
    Callable::new(["a"], move |args: &Values| Ok(f(args.number("a")?)))
}

fn binary(f: fn(f64, f64) -> f64) -> Callable {
    Callable::new(["a", "b"], move |args: &Values| {
        Ok(f(args.number("a")?, args.number("b")?))
    })
}

/// Declares the library into a new catalog.
pub fn catalog() -> Result<Catalog> {
    let mut catalog = Catalog::new();

    let negation = catalog.declare("Negation", [numeric("a")], [numeric("res")])?;
    let sum = catalog.declare("Sum", [numeric("a"), numeric("b")], [numeric("res")])?;
    let multi = catalog.declare("Multi", [numeric("a"), numeric("b")], [numeric("res")])?;
    let division = catalog.declare("Division", [numeric("a"), numeric("b")], [numeric("res")])?;
    let power = catalog.declare("Power", [numeric("a"), numeric("b")], [numeric("res")])?;
    let increment = catalog.declare("Increment", [numeric("a")], [numeric("res")])?;
    let add_two = catalog.declare("AddTwo", [numeric("a")], [numeric("res")])?;

    catalog.implement(&negation, NATIVE, unary(|a| -a))?;
    catalog.implement(&sum, NATIVE, binary(|a, b| a + b))?;
    catalog.implement(&multi, NATIVE, binary(|a, b| a * b))?;
    catalog.implement(
        &division,
        NATIVE,
        Callable::new(["a", "b"], |args: &Values| -> Result<f64, BoxedError> {
            let divisor = args.number("b")?;
            if divisor == 0.0 {
                return Err("division by zero".into());
            }
            Ok(args.number("a")? / divisor)
        }),
    )?;
    catalog.implement(&power, NATIVE, binary(f64::powf))?;
    catalog.implement(&increment, NATIVE, unary(|a| a + 1.0))?;
    catalog.implement(&increment, COMPOSED, unary(|a| a + 1.0))?;
    catalog.implement(&add_two, NATIVE, unary(|a| a + 2.0))?;

    AlgorithmBuilder::build(
        &mut catalog,
        "Subtraction",
        [numeric("a"), numeric("b")],
        [numeric("res")],
        |scope| {
            let neg = scope.register(&negation);
            scope.bind(scope.inlet("b")?, neg.inlet("a")?)?;
            let summa = scope.register(&sum);
            scope.bind(scope.inlet("a")?, summa.inlet("a")?)?;
            scope.bind(neg.outlet("res")?, summa.inlet("b")?)?;
            Ok(summa.outlet("res")?)
        },
    )?;

    AlgorithmBuilder::build(&mut catalog, "Square", [numeric("a")], [numeric("res")], |scope| {
        let a = scope.inlet("a")?;
        scope.invoke(&multi, [a, a])
    })?;

    // c = a + b, d = a * c, res = c^a + d^b
    AlgorithmBuilder::build(
        &mut catalog,
        "Calc",
        [numeric("a"), numeric("b")],
        [numeric("res")],
        |scope| {
            let (a, b) = (scope.inlet("a")?, scope.inlet("b")?);
            let c = scope.invoke(&sum, (a, b))?;
            let d = scope.invoke(&multi, (a, &c))?;
            let left = scope.invoke(&power, (c, a))?;
            let right = scope.invoke(&power, (d, b))?;
            scope.invoke(&sum, (left, right))
        },
    )?;

    let twice = AlgorithmBuilder::build(
        &mut catalog,
        "IncrementTwice",
        [numeric("a")],
        [numeric("res")],
        |scope| {
            let a = scope.inlet("a")?;
            let once = scope.invoke(&increment, [a])?;
            scope.invoke(&increment, [once])
        },
    )?;
    catalog.delegate(&add_two, COMPOSED, &twice)?;

    Ok(catalog)
}
