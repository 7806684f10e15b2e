//! Property-based tests for the pipeline, the byte buffer and the symbol map.

use std::collections::HashMap;

use nol::map::{SymbolMap, ABSENT};
use nol::{interpret, ByteBuffer, Error, RuntimeError, Value};
use proptest::prelude::*;

// =============================================================================
// Compile and run
// =============================================================================

fn arb_operator() -> impl Strategy<Value = char> {
    prop::sample::select(vec!['+', '-', '*', '/'])
}

/// Render an int as source; negative values become a unary minus.
fn source_of(n: i32) -> String {
    if n < 0 {
        format!("-{}", n.unsigned_abs())
    } else {
        n.to_string()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn literal_and_negation(n in 0..=i32::MAX) {
        prop_assert_eq!(interpret(&n.to_string()).unwrap(), Value::Int(n));
        prop_assert_eq!(interpret(&format!("-{n}")).unwrap(), Value::Int(-n));
    }

    #[test]
    fn binary_arithmetic(a in -i32::MAX..=i32::MAX, b in -i32::MAX..=i32::MAX, op in arb_operator()) {
        let source = format!("{} {op} ({})", source_of(a), source_of(b));
        let result = interpret(&source);

        let expected = match op {
            '+' => a.wrapping_add(b),
            '-' => a.wrapping_sub(b),
            '*' => a.wrapping_mul(b),
            _ if b == 0 => {
                prop_assert!(matches!(result, Err(Error::Runtime(RuntimeError::DivisionByZero))));
                return Ok(());
            }
            _ => a.wrapping_div(b),
        };
        prop_assert_eq!(result.unwrap(), Value::Int(expected));
    }

    #[test]
    fn division_by_zero(a in -i32::MAX..=i32::MAX) {
        let result = interpret(&format!("{} / 0", source_of(a)));
        prop_assert!(matches!(result, Err(Error::Runtime(RuntimeError::DivisionByZero))));
    }

    #[test]
    fn comparisons_agree_with_rust(a in -1000i32..1000, b in -1000i32..1000) {
        let (a_src, b_src) = (source_of(a), source_of(b));
        let cases = [
            ("<", a < b),
            ("<=", a <= b),
            (">", a > b),
            (">=", a >= b),
            ("==", a == b),
            ("!=", a != b),
        ];
        for (op, expected) in cases {
            let source = format!("{a_src} {op} {b_src}");
            prop_assert_eq!(interpret(&source).unwrap(), Value::Bool(expected), "{}", source);
        }
    }
}

// =============================================================================
// Byte buffer
// =============================================================================

proptest! {
    #[test]
    fn writes_are_never_corrupted(bytes in prop::collection::vec(any::<u8>(), 0..500)) {
        let mut buffer = ByteBuffer::new();
        for (i, &byte) in bytes.iter().enumerate() {
            buffer.write_byte(byte);
            prop_assert_eq!(buffer.len(), i + 1);
            prop_assert!(buffer.len() <= buffer.capacity());
        }

        prop_assert_eq!(buffer.as_slice(), &bytes[..]);
        for (i, &byte) in bytes.iter().enumerate() {
            prop_assert_eq!(buffer.read_byte(i), Some(byte));
        }
    }
}

// =============================================================================
// Symbol map
// =============================================================================

#[derive(Debug, Clone)]
enum MapOp {
    Set(usize, i32),
    Delete(usize),
}

const KEYS: [&str; 12] = [
    "a", "b", "c", "x", "y", "z", "int", "bool", "count", "total", "i1", "i2",
];

fn arb_map_op() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        3 => (0..KEYS.len(), 0..=i32::MAX).prop_map(|(key, value)| MapOp::Set(key, value)),
        1 => (0..KEYS.len()).prop_map(MapOp::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn map_matches_model(ops in prop::collection::vec(arb_map_op(), 0..200)) {
        let mut map = SymbolMap::new();
        let mut model: HashMap<&str, i32> = HashMap::new();

        for op in ops {
            match op {
                MapOp::Set(key, value) => {
                    map.set(KEYS[key], value).unwrap();
                    model.insert(KEYS[key], value);
                    prop_assert!(map.load_factor() <= 0.75);
                }
                MapOp::Delete(key) => {
                    map.delete(KEYS[key]);
                    model.remove(KEYS[key]);
                }
            }
        }

        for key in KEYS {
            let expected = model.get(key).copied().unwrap_or(ABSENT);
            prop_assert_eq!(map.get(key), expected, "key {}", key);
        }
        prop_assert_eq!(map.len(), model.len());
    }
}
