//! Equivalence tests between the compiler and the tree-walking interpreter.

use rstest::{fixture, rstest};

use super::Compiler;
use crate::ast::parse;
use crate::eval::Interpreter;
use crate::eval::env::Runtime;
use crate::value::Value;
use crate::version::GrammarVersion;

#[fixture]
fn runtime() -> Runtime {
    let mut runtime = Runtime::new();
    runtime
        .set_variable("x", Value::Float(3.0))
        .set_variable("flag", true)
        .set_variable("name", "steve")
        .set_variable("list", vec![Value::Float(1.0), Value::Float(2.0), Value::Float(3.0)])
        .set_query("life_time", Value::Float(0.25))
        .register_function("query", "echo", 1, |args| Ok(args[0].clone()))
        .register_function("query", "sum", 0, |args| {
            Ok(Value::Float(args.iter().map(Value::as_float).sum()))
        })
        .set_this(Value::Float(7.0));
    runtime
}

#[rstest]
// Literals
#[case::number("42")]
#[case::string("'hello'")]
#[case::boolean("true")]
#[case::this("this")]
// Arithmetic and strings
#[case::precedence("2 + 3 * 4 - 10 / 4")]
#[case::negate("-(v.x * 2)")]
#[case::flip("!v.flag")]
#[case::concat("v.name + '!'")]
#[case::remove("'banana' - 'an'")]
#[case::repeat("'ab' * v.x")]
#[case::comparison("v.x >= 3 && v.x < 4")]
#[case::string_equality("v.name == 'steve'")]
#[case::coalesce("v.missing ?? v.x")]
#[case::or("v.missing || v.flag")]
// Math
#[case::math("math.clamp(v.x * 10, 0, 20) + math.sin(90) + math.pi")]
#[case::math_fold("math.pow(2, 8) + math.sqrt(v.x * v.x)")]
// Variables
#[case::assign("v.y = v.x * 2; return v.y + 1;")]
#[case::compound_assign("v.x += 2; v.x *= 3; return v.x;")]
#[case::increment("t.i = 1; t.i++; t.i++; return t.i;")]
#[case::temp_default("return t.unset ?? 5;")]
#[case::query_read("q.life_time * 4")]
// Control flow
#[case::ternary("v.x > 2 ? 'big' : 'small'")]
#[case::conditional_write("v.flag ? (v.z = 10); return v.z ?? 0;")]
#[case::untaken_write("!v.flag ? (v.z = 10); return v.z ?? 0;")]
#[case::if_else("if (v.x == 3) { return 1; } else { return 2; }")]
#[case::if_return("if (v.flag) return 4; return 1;")]
#[case::nested_scope("t.a = 4; t.b = 2; t.c = { 4; }; return { { t.a * t.b; }; };")]
#[case::loop_("t.n = 0; loop(10, { t.n = t.n + v.x; }); return t.n;")]
#[case::loop_dynamic("t.n = 0; loop(v.x, { t.n = t.n + 1; }); return t.n;")]
#[case::loop_break("t.n = 0; loop(10, { t.n = t.n + 1; t.n > 5 ? break; }); return t.n;")]
#[case::loop_continue("t.n = 0; t.odd = 0; loop(6, { t.n = t.n + 1; math.mod(t.n, 2) == 0 ? continue; t.odd = t.odd + 1; }); return t.odd;")]
#[case::loop_return("loop(10, { return 3; }); return 1;")]
#[case::loop_large("t.n = 0; loop(300, { t.n = t.n + 1; }); return t.n;")]
// Functions
#[case::call("q.echo('hi')")]
#[case::call_args("q.sum(1, 2, v.x)")]
#[case::function_as_value("q.sum + 1")]
// Arrays
#[case::array_literal("[1, v.x, 'a']")]
#[case::array_index("v.list[1]")]
#[case::array_wrap("v.list[4]")]
#[case::array_negative("v.list[-3]")]
#[case::array_nested("[[1, 2], [3, 4]][1][0]")]
fn test_compiler_interpreter_equivalence(runtime: Runtime, #[case] source: &str) {
    let root = parse(source, GrammarVersion::LATEST).unwrap();

    let mut expected_env = runtime.clone();
    let expected = Interpreter::new(&root).evaluate(&mut expected_env);

    for optimize in [true, false] {
        let mut env = runtime.clone();
        let actual = Compiler::new(optimize).compile(&root).run(&mut env);

        assert_eq!(actual, expected, "Code: {source} (optimize: {optimize})");
        assert_eq!(
            env.get("variable", "z"),
            expected_env.get("variable", "z"),
            "Code: {source} - Writes should be identical"
        );
    }
}

#[rstest]
#[case::not_an_array("v.x[0]")]
#[case::empty_array("[][v.x]")]
#[case::unknown_function("q.nope(1)")]
#[case::missing_parameter("q.echo()")]
#[case::read_only("q.life_time = 1")]
fn test_compiler_interpreter_error_equivalence(runtime: Runtime, #[case] source: &str) {
    let root = parse(source, GrammarVersion::LATEST).unwrap();
    let expected = Interpreter::new(&root).evaluate(&mut runtime.clone());
    assert!(expected.is_err(), "Code: {source} - should fail");

    for optimize in [true, false] {
        let actual = Compiler::new(optimize).compile(&root).run(&mut runtime.clone());
        assert_eq!(actual, expected, "Code: {source} (optimize: {optimize})");
    }
}
