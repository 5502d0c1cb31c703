use super::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_integer_arithmetic_matches_host(a in -1000i64..1000, b in -1000i64..1000) {
        prop_assert_eq!(Value::Int(a + b), run(&format!("{} + {}", a, b)));
        prop_assert_eq!(Value::Int(a - b), run(&format!("{} - {}", a, b)));
        prop_assert_eq!(Value::Int(a * b), run(&format!("{} * {}", a, b)));
    }

    #[test]
    fn test_comparisons_match_host(a in -1000i64..1000, b in -1000i64..1000) {
        prop_assert_eq!(Value::Bool(a < b), run(&format!("{} < {}", a, b)));
        prop_assert_eq!(Value::Bool(a >= b), run(&format!("{} >= {}", a, b)));
        prop_assert_eq!(Value::Bool(a == b), run(&format!("{} == {}", a, b)));
    }

    #[test]
    fn test_compilation_is_deterministic(a in -100i64..100) {
        let source = format!("let x : integer = {}; x * x + payload.n", a);
        let payload = Value::from_pairs(vec![("n", Value::Int(1))]);
        let first = compile(&source).unwrap().run(&payload).unwrap();
        let second = compile(&source).unwrap().run(&payload).unwrap();
        prop_assert_eq!(first, second);
    }
}
