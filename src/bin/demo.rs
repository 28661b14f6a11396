// Demo suite: passing, failing and erroring tests across three modules.
// Usage: cargo run --bin demo -- [--include-group smoke] [--entrypoint ci] [--json]

use std::cell::RefCell;
use std::process::ExitCode;

use microtest::{check, Callable, Engine, Raise, Suite, TestError};
use tracing::info;

type Rows = RefCell<Vec<String>>;

fn configure(engine: &mut Engine) -> Result<(), TestError> {
    engine.add_resource("store", Rows::default());
    engine.add_utility("greeting", String::from("hello"));
    engine.on_exit(|engine, _| {
        info!(tests = engine.counters().tests, "demo suite finished");
    });
    Ok(())
}

fn main() -> ExitCode {
    let suite = Suite::new("demo")
        .module("tests/test_math.rs", |scope| {
            scope
                .test(Callable::new("adds", |_| {
                    let total = 1 + 1;
                    check!(total == 2 => [total]);
                    Ok(())
                }))?
                .group("smoke");
            scope
                .test(Callable::new("compares", |_| {
                    let found: Option<i32> = Some(3);
                    check!(found.is_some() => [found], "lookup returned nothing");
                    Ok(())
                }))?
                .group("smoke");
            scope
                .test(Callable::new("fails_on_purpose", |_| {
                    let total = 2;
                    check!(total == 1 => [total]);
                    Ok(())
                }))?
                .group("broken");
            scope
                .test(Callable::new("panics_on_purpose", |_| {
                    let words = ["a", "b"];
                    assert_eq!(words.len(), 3);
                    Ok(())
                }))?
                .group("broken");
            scope
                .test(Callable::new("errors_on_purpose", |_| {
                    let _n: i32 = "abc".parse::<i32>().raised()?;
                    Ok(())
                }))?
                .group("broken");
            Ok(())
        })
        .module("tests/test_store.rs", |scope| {
            scope.setup(
                Callable::new("connect", |args| {
                    args.get::<Rows>("store")?.borrow_mut().push("connected".into());
                    Ok(())
                })
                .with_params(["store"]),
            )?;
            scope.reset(
                Callable::new("truncate", |args| {
                    args.get::<Rows>("store")?
                        .borrow_mut()
                        .retain(|row| row == "connected");
                    Ok(())
                })
                .with_params(["store"]),
            )?;
            scope.cleanup(
                Callable::new("disconnect", |args| {
                    args.get::<Rows>("store")?.borrow_mut().clear();
                    Ok(())
                })
                .with_params(["store"]),
            )?;
            scope
                .test(
                    Callable::new("inserts", |args| {
                        let store = args.get::<Rows>("store")?;
                        store.borrow_mut().push("row".into());
                        let rows = store.borrow().len();
                        check!(rows == 2 => [rows]);
                        Ok(())
                    })
                    .with_params(["store"]),
                )?
                .group("smoke");
            scope
                .test(
                    Callable::new("starts_clean", |args| {
                        let rows = args.get::<Rows>("store")?.borrow().len();
                        check!(rows == 1 => [rows], "reset should leave only the connection");
                        Ok(())
                    })
                    .with_params(["store"]),
                )?
                .group("smoke");
            Ok(())
        })
        .module("tests/test_resources.rs", |scope| {
            let greeting = scope.utility::<String>("greeting")?.clone();
            scope.add_resource_with("answer", &[], |_| Ok(42i64))?;
            scope
                .test(
                    Callable::new("uses_answer", move |args| {
                        let answer = *args.get::<i64>("answer")?;
                        check!(answer == 42 => [answer], "{} from the factory", greeting);
                        Ok(())
                    })
                    .with_params(["answer"]),
                )?
                .group("smoke");
            scope
                .test(Callable::new("missing_resource", |_| Ok(())).with_params(["db_conn"]))?
                .group("broken");
            Ok(())
        })
        .entrypoint("main", configure)
        .entrypoint("ci", |engine| {
            configure(engine)?;
            engine.exclude_groups(["broken"]);
            Ok(())
        });

    microtest::cli::main(suite)
}
