use super::*;
use crate::runtime::SiteConfig;

#[test]
fn test_with_and_without() {
    let spec = DefinitionSpec::site("s")
        .child(
            DefinitionSpec::new("greet")
                .params(vec![])
                .params(vec![ParamSpec::new("who")])
                .body(Syntax::if_then(
                    Syntax::with("who"),
                    Syntax::binary(Syntax::string("hello "), BinaryOperator::Add, Syntax::name("who")),
                    Some(Syntax::string("hello")),
                )),
        )
        .child(
            DefinitionSpec::new("shy")
                .params(vec![])
                .params(vec![ParamSpec::new("who")])
                .body(Syntax::if_then(Syntax::without("who"), Syntax::string("nobody"), None)),
        )
        .child(DefinitionSpec::new("shape"))
        .child(DefinitionSpec::new("circle").body(Syntax::string("o")))
        .child(DefinitionSpec::new("probe").body(Syntax::block(vec![
            Syntax::with("shape"),
            Syntax::text("/"),
            Syntax::with("circle"),
            Syntax::text("/"),
            Syntax::without("visitor"),
        ])));

    Tester::new_single_expect_ok("presence", spec)
        .expect_resolved()
        .for_construct("s.greet", vec![], |c| { c.assert_text("hello"); })
        .for_construct("s.greet", vec![Value::from("bob")], |c| { c.assert_text("hello bob"); })
        .for_construct("s.shy", vec![], |c| { c.assert_text("nobody"); })
        .for_construct("s.shy", vec![Value::from("bob")], |c| { c.assert_value(Value::Void); })
        .for_construct("s.probe", vec![], |c| { c.assert_text("false/true/true"); });
}

#[test]
fn test_isa() {
    let spec = DefinitionSpec::site("s")
        .child(DefinitionSpec::new("shape"))
        .child(DefinitionSpec::new("circle").extends(TypeSpec::named("shape")).body(Syntax::string("o")))
        .child(DefinitionSpec::new("counter").typed(TypeSpec::named("int")).body(Syntax::int(3)))
        .child(DefinitionSpec::new("tests").body(Syntax::block(vec![
            Syntax::isa(Syntax::name("circle"), TypeSpec::named("shape")),
            Syntax::text(" "),
            Syntax::isa(Syntax::name("shape"), TypeSpec::named("circle")),
            Syntax::text(" "),
            Syntax::isa(Syntax::int(3), TypeSpec::named("int")),
            Syntax::text(" "),
            Syntax::isa(Syntax::string("3"), TypeSpec::named("int")),
            Syntax::text(" "),
            Syntax::isa(Syntax::long(3), TypeSpec::named("counter")),
            Syntax::text(" "),
            Syntax::isa(Syntax::array(vec![Syntax::int(1)]), TypeSpec::array_of("int", None)),
        ])));

    Tester::new_single_expect_ok("isa", spec)
        .expect_resolved()
        .for_construct("s.tests", vec![], |c| { c.assert_text("true false true false false true"); });
}

#[test]
fn test_redirections_and_handlers() {
    let spec = DefinitionSpec::site("s")
        .child(DefinitionSpec::new("login").body(Syntax::string("please log in")))
        .child(DefinitionSpec::new("guarded").body(Syntax::block(vec![
            Syntax::text("secret"),
            Syntax::redirect("login"),
        ])))
        .child(DefinitionSpec::new("page").body(Syntax::handler("login", Syntax::name("guarded"))))
        .child(DefinitionSpec::new("other").body(Syntax::handler("elsewhere", Syntax::name("guarded"))))
        .child(DefinitionSpec::new("stop").body(Syntax::handler("login", Syntax::exit(Some(3)))))
        .child(DefinitionSpec::new("quit").body(Syntax::exit(None)))
        .child(DefinitionSpec::new("onward").body(Syntax::continue_to("login")))
        .child(DefinitionSpec::new("lost").body(Syntax::handler("nowhere", Syntax::redirect("nowhere"))))
        .child(DefinitionSpec::new("vague").body(Syntax::Redirect(
            RedirectKind::Redirect,
            Some(Box::new(Syntax::string(""))),
        )))
        .child(DefinitionSpec::new("odd_exit").body(Syntax::Redirect(
            RedirectKind::Exit,
            Some(Box::new(Syntax::string("soon"))),
        )));

    Tester::new_single_expect_ok("redirections", spec)
        .for_construct("s.guarded", vec![], |c| {
            c.assert_redirection(Redirection::Redirect { target: "login".to_string() });
        })
        .for_construct("s.page", vec![], |c| { c.assert_text("please log in"); })
        .for_construct("s.other", vec![], |c| {
            c.assert_redirection(Redirection::Redirect { target: "login".to_string() });
        })
        .for_construct("s.stop", vec![], |c| { c.assert_redirection(Redirection::Exit { status: Some(3) }); })
        .for_construct("s.quit", vec![], |c| { c.assert_redirection(Redirection::Exit { status: None }); })
        .for_construct("s.onward", vec![], |c| {
            c.assert_redirection(Redirection::Continue { target: "login".to_string() });
        })
        .for_construct("s.lost", vec![], |c| { c.assert_error(EvalErrorKind::UnknownDefinition); })
        .for_construct("s.vague", vec![], |c| { c.assert_error(EvalErrorKind::InvalidUsage); })
        .for_construct("s.odd_exit", vec![], |c| { c.assert_error(EvalErrorKind::InvalidUsage); });
}

#[test]
fn test_abstract_and_arity_errors() {
    let spec = DefinitionSpec::site("s")
        .child(DefinitionSpec::new("shape"))
        .child(DefinitionSpec::new("uses_shape").body(Syntax::name("shape")))
        .child(DefinitionSpec::new("unary").params(vec![ParamSpec::new("x")]).body(Syntax::name("x")));

    Tester::new_single_expect_ok("abstract", spec)
        .for_construct("s.shape", vec![], |c| { c.assert_error(EvalErrorKind::AbstractConstruction); })
        .for_construct("s.uses_shape", vec![], |c| { c.assert_error(EvalErrorKind::AbstractConstruction); })
        .for_construct("s.unary", vec![Value::Int(1), Value::Int(2)], |c| {
            c.assert_error(EvalErrorKind::UnknownDefinition);
        })
        .for_construct("s.missing", vec![], |c| { c.assert_error(EvalErrorKind::UnknownDefinition); });
}

#[test]
fn test_recursion_limit() {
    let spec = DefinitionSpec::site("s")
        .child(DefinitionSpec::new("forever").body(Syntax::name("forever")))
        .child(
            DefinitionSpec::new("count")
                .params(vec![ParamSpec::new("n")])
                .body(Syntax::if_then(
                    Syntax::binary(Syntax::name("n"), BinaryOperator::GreaterThan, Syntax::int(0)),
                    Syntax::call("count", vec![
                        Syntax::binary(Syntax::name("n"), BinaryOperator::Subtract, Syntax::int(1)),
                    ]),
                    Some(Syntax::string("done")),
                )),
        );

    Tester::new("recursion")
        .with_definition(spec)
        .with_config(SiteConfig::default().with_max_depth(32))
        .compile()
        .expect_ok()
        .expect_resolved()
        .for_construct("s.forever", vec![], |c| {
            let c = c.assert_error(EvalErrorKind::RecursionLimit);
            assert_eq!(c.error().frames().len(), 31);
        })
        .for_construct("s.count", vec![Value::Int(10)], |c| { c.assert_text("done"); })
        .for_construct("s.count", vec![Value::Int(40)], |c| { c.assert_error(EvalErrorKind::RecursionLimit); });
}

#[test]
fn test_error_trace() {
    let spec = DefinitionSpec::site("s")
        .child(
            DefinitionSpec::new("outer")
                .at_line(3)
                .body(Syntax::block(vec![Syntax::text("before "), Syntax::name("inner")])),
        )
        .child(
            DefinitionSpec::new("inner")
                .at_line(7)
                .body(Syntax::binary(Syntax::string("a"), BinaryOperator::Divide, Syntax::string("b"))),
        );

    Tester::new_single_expect_ok("trace", spec).for_construct("s.outer", vec![], |c| {
        let error = c.error();
        assert_eq!(error.kind(), EvalErrorKind::UnsupportedOperation);
        assert_eq!(error.position().map(|p| p.line), Some(7));

        let frames: Vec<(&str, u32)> = error.frames().iter().map(|f| (f.definition.as_str(), f.line)).collect();
        assert_eq!(frames, vec![("s.outer", 3), ("s.inner", 7)]);

        let text = error.to_string();
        assert!(text.contains("Construction stack"), "{}", text);
        assert!(text.contains("s.inner:7"), "{}", text);
    });
}

#[test]
fn test_keeps_and_context_values() {
    let spec = DefinitionSpec::site("s")
        .child(
            DefinitionSpec::new("page")
                .keep("title")
                .body(Syntax::string("body"))
                .child(DefinitionSpec::new("title").body(Syntax::string("T"))),
        )
        .child(DefinitionSpec::new("layout").body(Syntax::block(vec![
            Syntax::name("page"),
            Syntax::text("|"),
            Syntax::name("title"),
        ])))
        .child(DefinitionSpec::new("greeting").body(Syntax::string("hello")))
        .child(DefinitionSpec::new("show").body(Syntax::name("greeting")))
        .child(
            DefinitionSpec::new("welcome")
                .body(Syntax::binary(Syntax::string("hi "), BinaryOperator::Add, Syntax::name("visitor"))),
        );

    let mut kept = Context::new();
    let mut shadowed = Context::new();
    shadowed.put("greeting", Value::from("override"));
    shadowed.put("visitor", Value::from("ann"));

    Tester::new_single_expect_ok("keeps", spec)
        .expect_unresolved("title")
        .expect_unresolved("visitor")
        .for_construct("s.layout", vec![], |c| { c.assert_text("body|T"); })
        .for_construct_with(&mut kept, "s.page", vec![], |c| { c.assert_text("body"); })
        .for_construct("s.show", vec![], |c| { c.assert_text("hello"); })
        .for_construct_with(&mut shadowed, "s.show", vec![], |c| { c.assert_text("override"); })
        .for_construct("s.welcome", vec![], |c| { c.assert_text("hi "); })
        .for_construct_with(&mut shadowed, "s.welcome", vec![], |c| { c.assert_text("hi ann"); });

    assert_eq!(kept.get("title"), Some(Value::from("T")));
    assert_eq!(kept.get("page"), None);
}

#[test]
fn test_nested_definitions_and_loops_in_blocks() {
    let spec = DefinitionSpec::site("s")
        .child(DefinitionSpec::new("greeting").body(Syntax::block(vec![
            Syntax::definition(DefinitionSpec::new("who").body(Syntax::string("world"))),
            Syntax::text("hello "),
            Syntax::name("who"),
        ])))
        .child(DefinitionSpec::new("list").body(Syntax::block(vec![
            Syntax::text("<"),
            Syntax::for_each(
                vec![ParamSpec::new("x")],
                vec![Syntax::array(vec![Syntax::int(1), Syntax::int(2), Syntax::int(3)])],
                Syntax::name("x"),
            ),
            Syntax::text(">"),
        ])))
        .child(DefinitionSpec::new("sums").body(Syntax::for_each(
            vec![ParamSpec::new("a"), ParamSpec::new("b")],
            vec![
                Syntax::array(vec![Syntax::int(1), Syntax::int(2), Syntax::int(3)]),
                Syntax::array(vec![Syntax::int(10), Syntax::int(20)]),
            ],
            Syntax::binary(Syntax::name("a"), BinaryOperator::Add, Syntax::name("b")),
        )))
        .child(DefinitionSpec::new("nothing").body(Syntax::for_each(
            vec![ParamSpec::new("x")],
            vec![Syntax::name("unset")],
            Syntax::name("x"),
        )))
        .child(DefinitionSpec::new("scalar").body(Syntax::for_each(
            vec![ParamSpec::new("x")],
            vec![Syntax::int(4)],
            Syntax::name("x"),
        )));

    Tester::new_single_expect_ok("blocks", spec)
        .expect_unresolved("unset")
        .for_construct("s.greeting", vec![], |c| { c.assert_text("hello world"); })
        .for_construct("s.greeting.who", vec![], |c| { c.assert_text("world"); })
        .for_construct("s.list", vec![], |c| { c.assert_text("<123>"); })
        .for_construct("s.sums", vec![], |c| { c.assert_values(vec![Value::Int(11), Value::Int(22)]); })
        .for_construct("s.nothing", vec![], |c| { c.assert_values(vec![]); })
        .for_construct("s.scalar", vec![], |c| { c.assert_error(EvalErrorKind::InvalidUsage); });
}
