use super::*;
use super::utils::SiteOkTester;
use crate::runtime::SiteConfig;

/// A block that takes a while to render before it ends in `tail`.
fn slow(tail: Syntax) -> Syntax {
    let mut items: Vec<Syntax> = (0..5000).map(|_| Syntax::text("")).collect();
    items.push(tail);
    Syntax::block(items)
}

fn workshop() -> DefinitionSpec {
    let numbered = (0..12).map(|i| Syntax::call("item", vec![Syntax::int(i)])).collect();

    DefinitionSpec::site("w")
        .child(
            DefinitionSpec::new("item")
                .params(vec![ParamSpec::new("n")])
                .body(Syntax::block(vec![Syntax::text("#"), Syntax::name("n")])),
        )
        .child(DefinitionSpec::new("login").body(Syntax::string("login page")))
        .child(DefinitionSpec::new("boom").body(Syntax::binary(
            Syntax::string("a"), BinaryOperator::Divide, Syntax::string("b"),
        )))
        .child(DefinitionSpec::new("numbered").body(Syntax::concurrent(numbered)))
        .child(DefinitionSpec::new("interrupted").body(Syntax::concurrent(vec![
            Syntax::text("a"),
            Syntax::redirect("login"),
            Syntax::text("c"),
        ])))
        .child(DefinitionSpec::new("first_signal").body(Syntax::concurrent(vec![
            Syntax::text("a"),
            Syntax::redirect("first"),
            Syntax::redirect("second"),
            Syntax::exit(Some(1)),
        ])))
        .child(DefinitionSpec::new("failing").body(Syntax::concurrent(vec![
            Syntax::text("ok"),
            Syntax::name("boom"),
            Syntax::redirect("login"),
        ])))
        .child(DefinitionSpec::new("claimed").body(Syntax::handler("login", Syntax::name("interrupted"))))
        .child(
            DefinitionSpec::new("pair")
                .params(vec![ParamSpec::new("who")])
                .body(Syntax::concurrent(vec![Syntax::name("who"), Syntax::text("-"), Syntax::name("who")])),
        )
        .child(DefinitionSpec::new("keeper").body(Syntax::concurrent(vec![
            Syntax::name("kept"),
            Syntax::text("+"),
            Syntax::name("kept"),
        ])))
        .child(DefinitionSpec::new("slow_first").body(Syntax::concurrent(vec![
            slow(Syntax::text("A")),
            Syntax::text("B"),
            Syntax::text("C"),
            Syntax::text("D"),
        ])))
        .child(DefinitionSpec::new("late_signal").body(Syntax::concurrent(vec![
            slow(Syntax::redirect("early")),
            Syntax::redirect("late"),
        ])))
        .child(DefinitionSpec::new("x").durability(Durability::Static).body(slow(Syntax::name("y"))))
        .child(DefinitionSpec::new("y").durability(Durability::Static).body(slow(Syntax::name("x"))))
        .child(DefinitionSpec::new("crossed").body(Syntax::concurrent(vec![Syntax::name("x"), Syntax::name("y")])))
}

fn check(tester: SiteOkTester) {
    tester
        .expect_unresolved("kept")
        .for_construct("w.numbered", vec![], |c| { c.assert_text("#0#1#2#3#4#5#6#7#8#9#10#11"); })
        .for_construct("w.interrupted", vec![], |c| {
            c.assert_redirection(Redirection::Redirect { target: "login".to_string() });
        })
        .for_construct("w.first_signal", vec![], |c| {
            c.assert_redirection(Redirection::Redirect { target: "first".to_string() });
        })
        .for_construct("w.failing", vec![], |c| {
            let c = c.assert_error(EvalErrorKind::UnsupportedOperation);
            let frames: Vec<&str> = c.error().frames().iter().map(|f| f.definition.as_str()).collect();
            assert_eq!(frames, vec!["w.failing", "w.boom"]);
        })
        .for_construct("w.claimed", vec![], |c| { c.assert_text("login page"); })
        .for_construct("w.pair", vec![Value::from("ann")], |c| { c.assert_text("ann-ann"); })
        .for_construct("w.slow_first", vec![], |c| { c.assert_text("ABCD"); })
        .for_construct("w.late_signal", vec![], |c| {
            c.assert_redirection(Redirection::Redirect { target: "early".to_string() });
        });
}

#[test]
fn test_crossed_statics_in_concurrent_siblings_fail() {
    for max_workers in vec![1, 2] {
        let tester = Tester::new("crossed_statics")
            .with_definition(workshop())
            .with_config(SiteConfig::default().with_max_workers(max_workers))
            .compile()
            .expect_ok();
        // Both claim orders have to end in the same error, never in a hang
        for _ in 0..10 {
            let err = tester.site().construct("w.crossed", vec![]).unwrap_err();
            assert_eq!(err.kind(), EvalErrorKind::RecursionLimit, "{}", err);
        }
        assert_eq!(tester.site().construct("w.slow_first", vec![]).unwrap().complete().unwrap(), Value::from("ABCD"));
    }
}

#[test]
fn test_concurrent_blocks() {
    check(Tester::new_single_expect_ok("concurrent", workshop()));
}

#[test]
fn test_concurrent_blocks_on_a_single_worker() {
    check(
        Tester::new("single_worker")
            .with_definition(workshop())
            .with_config(SiteConfig::default().with_max_workers(1))
            .compile()
            .expect_ok(),
    );
}

#[test]
fn test_concurrent_siblings_read_the_enclosing_context() {
    let mut ctx = Context::new();
    ctx.put("kept", Value::from("shared"));

    Tester::new_single_expect_ok("enclosing", workshop())
        .for_construct_with(&mut ctx, "w.keeper", vec![], |c| { c.assert_text("shared+shared"); })
        .for_construct("w.keeper", vec![], |c| { c.assert_text("+"); });
}
