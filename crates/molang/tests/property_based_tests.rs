use molang::{CompilerFlags, Engine, GrammarVersion, Interpreter, Runtime, Value};
use proptest::prelude::*;

mod strategies {
    use proptest::prelude::*;

    pub fn literal() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u8..100).prop_map(|n| n.to_string()),
            (0u8..100, 1u8..10).prop_map(|(n, d)| format!("{n}.{d}")),
        ]
    }

    pub fn variable() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("v.a".to_string()),
            Just("variable.b".to_string()),
            Just("q.life_time".to_string()),
            Just("v.missing".to_string()),
        ]
    }

    pub fn operator() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("+"),
            Just("-"),
            Just("*"),
            Just("/"),
            Just("<"),
            Just(">="),
            Just("=="),
            Just("!="),
            Just("&&"),
            Just("||"),
            Just("??"),
        ]
    }

    /// Arithmetic over literals and variables, without ternaries.
    pub fn arithmetic() -> impl Strategy<Value = String> {
        let leaf = prop_oneof![literal(), variable()];
        leaf.prop_recursive(4, 24, 2, |inner| {
            prop_oneof![
                (inner.clone(), operator(), inner.clone()).prop_map(|(l, op, r)| format!("({l} {op} {r})")),
                inner.clone().prop_map(|e| format!("math.abs({e})")),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| format!("math.min({l}, {r})")),
            ]
        })
    }

    /// Programs with assignments, branches, loops and temps.
    pub fn program() -> impl Strategy<Value = String> {
        let statement = prop_oneof![
            arithmetic().prop_map(|e| format!("v.a = {e}")),
            arithmetic().prop_map(|e| format!("t.x = {e}")),
            (arithmetic(), arithmetic()).prop_map(|(c, e)| format!("{c} ? {{ v.b = {e}; }}")),
            (arithmetic(), arithmetic(), arithmetic()).prop_map(|(c, l, r)| format!("v.c = {c} ? {l} : {r}")),
            (0u8..6, arithmetic()).prop_map(|(n, e)| format!("loop({n}, {{ t.x = (t.x ?? 0) + {e}; }})")),
        ];
        (prop::collection::vec(statement, 1..5), arithmetic()).prop_map(|(statements, last)| {
            format!("{}; return {last} + (t.x ?? 0);", statements.join("; "))
        })
    }
}

fn runtime(a: f32, b: f32) -> Runtime {
    let mut runtime = Runtime::new();
    runtime
        .set_variable("a", Value::Float(a))
        .set_variable("b", Value::Float(b))
        .set_query("life_time", Value::Float(0.25));
    runtime
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn test_canonical_form_reparses(source in strategies::arithmetic()) {
        let root = molang::parse(&source, GrammarVersion::LATEST).unwrap();
        let reparsed = molang::parse(&root.to_string(), GrammarVersion::LATEST).unwrap();
        prop_assert_eq!(reparsed.to_string(), root.to_string());
    }

    #[test]
    fn test_compile_is_idempotent(source in strategies::program()) {
        let first = molang::compile(&source, 12).unwrap();
        let second = molang::compile(&source, 12).unwrap();
        let unoptimized = Engine::new(CompilerFlags::NONE).compile(&source).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&first, &unoptimized);
        prop_assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_compiled_matches_interpreter(
        source in strategies::program(),
        a in -10.0f32..10.0,
        b in -10.0f32..10.0,
    ) {
        let root = molang::parse(&source, GrammarVersion::LATEST).unwrap();
        let mut expected_env = runtime(a, b);
        let expected = Interpreter::new(&root).evaluate(&mut expected_env);

        for flags in [CompilerFlags::default(), CompilerFlags::NONE] {
            let expression = Engine::new(flags).compile(&source).unwrap();
            let mut env = runtime(a, b);
            prop_assert_eq!(&expression.evaluate(&mut env), &expected);
            for name in ["a", "b", "c"] {
                prop_assert_eq!(env.get("variable", name), expected_env.get("variable", name));
            }
        }
    }

    #[test]
    fn test_constant_folding_preserves_value(source in strategies::arithmetic()) {
        let source = source.replace("v.a", "1").replace("variable.b", "2").replace("q.life_time", "3").replace("v.missing", "4");
        let folded = molang::compile(&source, 12).unwrap();
        prop_assert!(folded.is_constant());

        let root = molang::parse(&source, GrammarVersion::LATEST).unwrap();
        let expected = Interpreter::new(&root).evaluate(&mut Runtime::new()).unwrap();
        prop_assert_eq!(folded.constant_value(), Some(&expected));
    }

    #[test]
    fn test_array_index_wraps(values in prop::collection::vec(0u8..100, 1..8), index in -20i32..40) {
        let literal = values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
        let source = format!("[{literal}][v.i]");
        let mut env = Runtime::new();
        env.set_variable("i", index);

        let expected = if index < 0 { values[0] } else { values[index as usize % values.len()] };
        prop_assert_eq!(
            molang::compile(&source, 12).unwrap().evaluate(&mut env),
            Ok(Value::Float(expected as f32))
        );
    }
}
