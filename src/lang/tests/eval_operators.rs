use super::*;
use crate::lang::ast::BinaryOperator as BO;

fn expressions(definitions: Vec<(&str, Syntax)>) -> DefinitionSpec {
    let mut site = DefinitionSpec::site("ops");
    for (name, body) in definitions {
        site = site.child(DefinitionSpec::new(name).body(body));
    }
    site
}

fn numbers(values: &[i32]) -> Syntax {
    Syntax::array(values.iter().map(|v| Syntax::int(*v)).collect())
}

#[test]
fn test_promotion_by_runtime_kind() {
    Tester::new_single_expect_ok("promotion", expressions(vec![
        ("mixed", Syntax::binary(Syntax::int(3), BO::Add, Syntax::double(2.5))),
        ("widened", Syntax::binary(Syntax::int(3), BO::Multiply, Syntax::long(1 << 40))),
        ("stringly", Syntax::binary(Syntax::int(3), BO::Add, Syntax::string("x"))),
        ("relational", Syntax::binary(Syntax::int(2), BO::LessThan, Syntax::double(2.5))),
        ("divided", Syntax::binary(Syntax::int(7), BO::Divide, Syntax::int(2))),
    ]))
        .expect_resolved()
        .for_construct("ops.mixed", vec![], |c| { c.assert_value(Value::Double(5.5)); })
        .for_construct("ops.widened", vec![], |c| { c.assert_value(Value::Long(3 << 40)); })
        .for_construct("ops.stringly", vec![], |c| { c.assert_value(Value::from("3x")); })
        .for_construct("ops.relational", vec![], |c| { c.assert_value(Value::Boolean(true)); })
        .for_construct("ops.divided", vec![], |c| { c.assert_value(Value::Int(3)); });
}

#[test]
fn test_string_overloads() {
    Tester::new_single_expect_ok("strings", expressions(vec![
        ("joined", Syntax::binary(Syntax::string("foo"), BO::Multiply, Syntax::string("bar"))),
        ("joined_spaced", Syntax::binary(Syntax::string("foo "), BO::Multiply, Syntax::string("bar"))),
        ("joined_empty", Syntax::binary(Syntax::string("foo"), BO::Multiply, Syntax::string(""))),
        ("removed", Syntax::binary(Syntax::string("hello world"), BO::Subtract, Syntax::string("o"))),
        ("head_dropped", Syntax::binary(Syntax::string("hello"), BO::ShiftLeft, Syntax::int(2))),
        ("tail_dropped", Syntax::binary(Syntax::string("hello"), BO::ShiftRight, Syntax::int(2))),
        ("unsigned", Syntax::binary(Syntax::string("hello"), BO::UnsignedShiftRight, Syntax::int(2))),
        ("divided", Syntax::binary(Syntax::string("hello"), BO::Divide, Syntax::string("l"))),
        ("powered", Syntax::binary(Syntax::string("hello"), BO::Power, Syntax::int(2))),
    ]))
        .for_construct("ops.joined", vec![], |c| { c.assert_value(Value::from("foo bar")); })
        .for_construct("ops.joined_spaced", vec![], |c| { c.assert_value(Value::from("foo bar")); })
        .for_construct("ops.joined_empty", vec![], |c| { c.assert_value(Value::from("foo")); })
        .for_construct("ops.removed", vec![], |c| { c.assert_value(Value::from("hell wrld")); })
        .for_construct("ops.head_dropped", vec![], |c| { c.assert_value(Value::from("llo")); })
        .for_construct("ops.tail_dropped", vec![], |c| { c.assert_value(Value::from("hel")); })
        .for_construct("ops.unsigned", vec![], |c| { c.assert_error(EvalErrorKind::InvalidUsage); })
        .for_construct("ops.divided", vec![], |c| { c.assert_error(EvalErrorKind::UnsupportedOperation); })
        .for_construct("ops.powered", vec![], |c| { c.assert_error(EvalErrorKind::UnsupportedOperation); });
}

#[test]
fn test_case_sensitive_and_insensitive_comparison() {
    Tester::new_single_expect_ok("comparison", expressions(vec![
        ("sensitive", Syntax::binary(Syntax::string("Tea"), BO::Equal, Syntax::string("tea"))),
        ("insensitive", Syntax::binary(Syntax::string("Tea"), BO::EqualIgnoreCase, Syntax::string("tea"))),
        ("ordered", Syntax::binary(Syntax::string("apple"), BO::LessThanIgnoreCase, Syntax::string("Banana"))),
        ("on_collection", Syntax::binary(numbers(&[1]), BO::Equal, numbers(&[1]))),
    ]))
        .for_construct("ops.sensitive", vec![], |c| { c.assert_value(Value::Boolean(false)); })
        .for_construct("ops.insensitive", vec![], |c| { c.assert_value(Value::Boolean(true)); })
        .for_construct("ops.ordered", vec![], |c| { c.assert_value(Value::Boolean(true)); })
        .for_construct("ops.on_collection", vec![], |c| { c.assert_error(EvalErrorKind::InvalidUsage); });
}

#[test]
fn test_bit_flip() {
    Tester::new_single_expect_ok("bit_flip", expressions(vec![
        ("yes", Syntax::boolean(true)),
        ("flags", Syntax::unary(UnaryOperator::BitFlip, Syntax::array(vec![
            Syntax::boolean(true), Syntax::boolean(false),
        ]))),
        ("lazy_flags", Syntax::unary(UnaryOperator::BitFlip, Syntax::array(vec![
            Syntax::name("yes"), Syntax::boolean(true),
        ]))),
        ("nested", Syntax::unary(UnaryOperator::BitFlip, Syntax::array(vec![
            numbers(&[0]), Syntax::int(-1),
        ]))),
        ("byte", Syntax::unary(UnaryOperator::BitFlip, Syntax::Literal(Literal::Byte(0x0f)))),
        ("text", Syntax::unary(UnaryOperator::BitFlip, Syntax::string("x"))),
    ]))
        .for_construct("ops.flags", vec![], |c| {
            c.assert_values(vec![Value::Boolean(false), Value::Boolean(true)]);
        })
        .for_construct("ops.lazy_flags", vec![], |c| {
            c.assert_values(vec![Value::Boolean(false), Value::Boolean(false)]);
        })
        .for_construct("ops.nested", vec![], |c| { c.assert_text("[[-1], 0]"); })
        .for_construct("ops.byte", vec![], |c| { c.assert_value(Value::Byte(0xf0)); })
        .for_construct("ops.text", vec![], |c| { c.assert_error(EvalErrorKind::UnsupportedOperation); });
}

#[test]
fn test_collection_operands() {
    Tester::new_single_expect_ok("collections", expressions(vec![
        ("concatenated", Syntax::binary(numbers(&[1, 2]), BO::Add, numbers(&[3]))),
        ("appended", Syntax::binary(numbers(&[1]), BO::Add, Syntax::int(2))),
        ("prepended", Syntax::binary(Syntax::int(0), BO::Add, numbers(&[1]))),
        ("merged", Syntax::binary(
            Syntax::table(vec![(Syntax::string("a"), Syntax::int(1)), (Syntax::string("b"), Syntax::int(2))]),
            BO::Add,
            Syntax::table(vec![(Syntax::string("b"), Syntax::int(3))]),
        )),
        ("subtracted", Syntax::binary(numbers(&[1]), BO::Subtract, numbers(&[1]))),
        ("divided", Syntax::binary(numbers(&[4]), BO::Divide, Syntax::int(2))),
    ]))
        .for_construct("ops.concatenated", vec![], |c| {
            c.assert_values(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        })
        .for_construct("ops.appended", vec![], |c| { c.assert_values(vec![Value::Int(1), Value::Int(2)]); })
        .for_construct("ops.prepended", vec![], |c| { c.assert_values(vec![Value::Int(0), Value::Int(1)]); })
        .for_construct("ops.merged", vec![], |c| { c.assert_text("{a: 1, b: 3}"); })
        .for_construct("ops.subtracted", vec![], |c| { c.assert_error(EvalErrorKind::UnsupportedOperation); })
        .for_construct("ops.divided", vec![], |c| { c.assert_error(EvalErrorKind::UnsupportedOperation); });
}

#[test]
fn test_chains_fold_left_to_right() {
    let countdown = || Syntax::for_each(
        vec![ParamSpec::new("n")],
        vec![numbers(&[1, 2, 3])],
        Syntax::name("n"),
    );

    Tester::new_single_expect_ok("chains", expressions(vec![
        ("left_assoc", Syntax::chain(Syntax::int(10), vec![(BO::Subtract, Syntax::int(3)), (BO::Subtract, Syntax::int(2))])),
        ("reduced", Syntax::chain(countdown(), vec![(BO::Add, Syntax::int(10))])),
        ("reduced_into", Syntax::chain(Syntax::int(100), vec![(BO::Subtract, countdown())])),
        ("boom", Syntax::binary(Syntax::string("a"), BO::Divide, Syntax::string("b"))),
        ("and_short", Syntax::binary(Syntax::boolean(false), BO::LogicalAnd, Syntax::name("boom"))),
        ("or_short", Syntax::binary(Syntax::boolean(true), BO::LogicalOr, Syntax::name("boom"))),
        ("and_full", Syntax::binary(Syntax::boolean(true), BO::LogicalAnd, Syntax::name("boom"))),
        ("mixed", Syntax::chain(Syntax::boolean(false), vec![
            (BO::LogicalAnd, Syntax::name("boom")),
            (BO::LogicalOr, Syntax::int(1)),
        ])),
    ]))
        .expect_resolved()
        .for_construct("ops.left_assoc", vec![], |c| { c.assert_value(Value::Int(5)); })
        .for_construct("ops.reduced", vec![], |c| { c.assert_value(Value::Int(16)); })
        .for_construct("ops.reduced_into", vec![], |c| { c.assert_value(Value::Int(94)); })
        .for_construct("ops.and_short", vec![], |c| { c.assert_value(Value::Boolean(false)); })
        .for_construct("ops.or_short", vec![], |c| { c.assert_value(Value::Boolean(true)); })
        .for_construct("ops.and_full", vec![], |c| { c.assert_error(EvalErrorKind::UnsupportedOperation); })
        .for_construct("ops.mixed", vec![], |c| { c.assert_value(Value::Boolean(true)); });
}
