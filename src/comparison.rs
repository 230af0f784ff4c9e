use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use serde_json::{Number, Value};

use crate::filter::CompareOp;

fn datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

fn fold(s: &str, case_exact: bool) -> String {
    if case_exact {
        s.to_string()
    } else {
        s.to_lowercase()
    }
}

fn cmp_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return Some(x.cmp(&y));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

/// Order two strings: as instants when both are RFC 3339 datetimes,
/// lexicographically when neither is, not at all otherwise.
fn cmp_strings(a: &str, b: &str, case_exact: bool) -> Option<Ordering> {
    match (datetime(a), datetime(b)) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        (None, None) => Some(fold(a, case_exact).cmp(&fold(b, case_exact))),
        _ => None,
    }
}

/// SCIM equality between a document value and a filter literal.
pub fn values_equal(actual: &Value, literal: &Value, case_exact: bool) -> bool {
    match (actual, literal) {
        (Value::String(a), Value::String(b)) => {
            if let (Some(x), Some(y)) = (datetime(a), datetime(b)) {
                return x == y;
            }
            if case_exact {
                a == b
            } else {
                a.to_lowercase() == b.to_lowercase()
            }
        }
        (Value::Number(a), Value::Number(b)) => cmp_numbers(a, b) == Some(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Null, Value::Null) => true,
        _ => false,
    }
}

/// Ordering between a document value and a literal; `None` when the two are
/// not in the same type family.
pub fn ordering(actual: &Value, literal: &Value, case_exact: bool) -> Option<Ordering> {
    match (actual, literal) {
        (Value::Number(a), Value::Number(b)) => cmp_numbers(a, b),
        (Value::String(a), Value::String(b)) => cmp_strings(a, b, case_exact),
        _ => None,
    }
}

/// Apply `op` to a single document value. Incompatible types never match.
pub fn compare(op: CompareOp, actual: &Value, literal: &Value, case_exact: bool) -> bool {
    match op {
        CompareOp::Equal => values_equal(actual, literal, case_exact),
        CompareOp::NotEqual => !values_equal(actual, literal, case_exact),
        CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => {
            let (Value::String(a), Value::String(b)) = (actual, literal) else {
                return false;
            };
            let (a, b) = (fold(a, case_exact), fold(b, case_exact));
            match op {
                CompareOp::Contains => a.contains(&b),
                CompareOp::StartsWith => a.starts_with(&b),
                _ => a.ends_with(&b),
            }
        }
        CompareOp::GreaterThan => ordering(actual, literal, case_exact) == Some(Ordering::Greater),
        CompareOp::GreaterOrEqual => matches!(
            ordering(actual, literal, case_exact),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::LessThan => ordering(actual, literal, case_exact) == Some(Ordering::Less),
        CompareOp::LessOrEqual => matches!(
            ordering(actual, literal, case_exact),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_compare_by_value() {
        assert!(values_equal(&json!(1), &json!(1.0), true));
        assert!(compare(CompareOp::GreaterThan, &json!(10), &json!(9.5), true));
        assert!(!compare(CompareOp::GreaterThan, &json!("10"), &json!(9), true));
    }

    #[test]
    fn case_folding_is_opt_in() {
        assert!(!values_equal(&json!("BJensen"), &json!("bjensen"), true));
        assert!(values_equal(&json!("BJensen"), &json!("bjensen"), false));
        assert!(compare(CompareOp::StartsWith, &json!("Barbara"), &json!("bar"), false));
        assert!(!compare(CompareOp::StartsWith, &json!("Barbara"), &json!("bar"), true));
    }

    #[test]
    fn datetimes_compare_as_instants() {
        let earlier = json!("2011-05-13T04:42:34Z");
        let later = json!("2011-05-13T06:42:34+01:00");
        assert!(compare(CompareOp::LessThan, &earlier, &later, true));
        assert!(values_equal(
            &json!("2011-05-13T04:42:34Z"),
            &json!("2011-05-13T05:42:34+01:00"),
            true
        ));
        assert!(!compare(CompareOp::GreaterThan, &json!("zzz"), &earlier, true));
    }

    #[test]
    fn substring_operators_need_strings() {
        assert!(!compare(CompareOp::Contains, &json!(123), &json!("2"), true));
        assert!(!compare(CompareOp::EndsWith, &json!(true), &json!("e"), true));
    }

    #[test]
    fn booleans_do_not_order() {
        assert!(!compare(CompareOp::GreaterThan, &json!(true), &json!(false), true));
        assert!(compare(CompareOp::NotEqual, &json!(true), &json!(false), true));
    }
}
