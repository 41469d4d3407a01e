//! Built-in template functions.
//!
//! Every function returns a JSON value; predicates return booleans which
//! render as `true` / `false`. Variable names are dotted paths resolved with
//! [`find_variable`].

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::TemplateError;
use crate::scenario::REQUEST_COUNT_PARAM;

/// Parameter holding the live response status for response assertions.
pub const STATUS_PARAM: &str = "status";

/// Parameter holding the elapsed response time in milliseconds.
pub const ELAPSED_PARAM: &str = "elapsed";

/// Names of every built-in function.
pub const FUNCTION_NAMES: &[&str] = &[
    "EQ",
    "LT",
    "LE",
    "GT",
    "GE",
    "Nth",
    "NthRequest",
    "LTRequest",
    "GERequest",
    "PropertyEquals",
    "VariableEquals",
    "PropertyContains",
    "PropertyMatches",
    "VariableContains",
    "VariableMatches",
    "NumPropertyEQ",
    "NumPropertyLE",
    "NumPropertyGE",
    "PropertyLenEQ",
    "PropertyLenLE",
    "PropertyLenGE",
    "HasProperty",
    "ResponseStatusMatches",
    "ResponseTimeMillisLE",
];

// ============================================================================
// Dispatch
// ============================================================================

/// Invokes the built-in `name` with already-resolved arguments.
///
/// # Errors
///
/// Returns [`TemplateError::UnknownFunction`] for unknown names and
/// [`TemplateError::Arity`] when the argument count is wrong.
pub fn call_function(
    name: &str,
    args: &[Value],
    params: &Map<String, Value>,
) -> Result<Value, TemplateError> {
    let result = match name {
        "EQ" | "LT" | "LE" | "GT" | "GE" => {
            let [a, b] = exactly::<2>(name, args)?;
            let (a, b) = (to_f64(a), to_f64(b));
            match name {
                "EQ" => (a - b).abs() < f64::EPSILON,
                "LT" => a < b,
                "LE" => a <= b,
                "GT" => a > b,
                _ => a >= b,
            }
        }
        "Nth" => {
            let [a, b] = exactly::<2>(name, args)?;
            let (a, b) = (to_i64(a), to_i64(b));
            b != 0 && a.wrapping_rem(b) == 0
        }
        "NthRequest" | "LTRequest" | "GERequest" => {
            let [n] = exactly::<1>(name, args)?;
            let n = to_i64(n);
            let count = params.get(REQUEST_COUNT_PARAM).map_or(-1, to_i64);
            count >= 0
                && match name {
                    "NthRequest" => n != 0 && count % n == 0,
                    "LTRequest" => count < n,
                    _ => count >= n,
                }
        }
        "PropertyEquals" | "VariableEquals" => {
            let [var, target] = exactly::<2>(name, args)?;
            find_variable(&value_to_text(var), params)
                .is_some_and(|v| value_to_text(&v) == value_to_text(target))
        }
        "PropertyContains" | "PropertyMatches" | "VariableContains" | "VariableMatches" => {
            let (var, targets) = at_least_two(name, args)?;
            find_variable(&value_to_text(var), params)
                .is_some_and(|v| any_regex_match(&value_to_text(&v), targets))
        }
        "NumPropertyEQ" | "NumPropertyLE" | "NumPropertyGE" => {
            let [var, n] = exactly::<2>(name, args)?;
            let actual = find_variable(&value_to_text(var), params).map_or(0.0, |v| to_f64(&v));
            let n = to_f64(n);
            match name {
                "NumPropertyEQ" => (actual - n).abs() < f64::EPSILON,
                "NumPropertyLE" => actual <= n,
                _ => actual >= n,
            }
        }
        "PropertyLenEQ" | "PropertyLenLE" | "PropertyLenGE" => {
            let [var, n] = exactly::<2>(name, args)?;
            let size = variable_size(&value_to_text(var), params);
            let n = to_i64(n);
            match name {
                "PropertyLenEQ" => size == n,
                "PropertyLenLE" => size >= 0 && size <= n,
                _ => size >= n,
            }
        }
        "HasProperty" => {
            let [var] = exactly::<1>(name, args)?;
            find_variable(&value_to_text(var), params).is_some()
        }
        "ResponseStatusMatches" => {
            if args.is_empty() {
                return Err(arity(name, "at least 1", 0));
            }
            params
                .get(STATUS_PARAM)
                .is_some_and(|status| any_regex_match(&value_to_text(status), args))
        }
        "ResponseTimeMillisLE" => {
            let [n] = exactly::<1>(name, args)?;
            params
                .get(ELAPSED_PARAM)
                .is_some_and(|elapsed| to_f64(elapsed) <= to_f64(n))
        }
        _ => return Err(TemplateError::UnknownFunction(name.to_string())),
    };
    Ok(Value::Bool(result))
}

fn arity(function: &str, expected: &'static str, actual: usize) -> TemplateError {
    TemplateError::Arity {
        function: function.to_string(),
        expected,
        actual,
    }
}

fn exactly<'a, const N: usize>(
    function: &str,
    args: &'a [Value],
) -> Result<&'a [Value; N], TemplateError> {
    let expected = match N {
        1 => "1",
        2 => "2",
        _ => "a fixed number of",
    };
    args.try_into()
        .map_err(|_| arity(function, expected, args.len()))
}

fn at_least_two<'a>(
    function: &str,
    args: &'a [Value],
) -> Result<(&'a Value, &'a [Value]), TemplateError> {
    match args.split_first() {
        Some((first, rest)) if !rest.is_empty() => Ok((first, rest)),
        _ => Err(arity(function, "at least 2", args.len())),
    }
}

fn any_regex_match(text: &str, patterns: &[Value]) -> bool {
    patterns.iter().any(|p| {
        let pattern = value_to_text(p);
        match Regex::new(&pattern) {
            Ok(re) => re.is_match(text),
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "invalid regex in template function");
                false
            }
        }
    })
}

// ============================================================================
// Value helpers
// ============================================================================

/// Looks up a dotted path such as `headers.Content-Type` or `items.id`.
///
/// Arrays fan out: looking up `items.id` over an array of objects yields an
/// array of every element's `id`. Null values count as absent.
#[must_use]
pub fn find_variable(path: &str, params: &Map<String, Value>) -> Option<Value> {
    let (head, rest) = split_path(path);
    let value = params.get(head)?;
    descend(value, rest)
}

fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

fn descend(value: &Value, rest: Option<&str>) -> Option<Value> {
    if value.is_null() {
        return None;
    }
    let Some(path) = rest else {
        return Some(value.clone());
    };
    match value {
        Value::Object(map) => find_variable(path, map),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| descend(item, Some(path)))
                .collect(),
        )),
        _ => None,
    }
}

/// Number of entries of an array or object variable, `-1` otherwise.
#[must_use]
pub fn variable_size(path: &str, params: &Map<String, Value>) -> i64 {
    let len = match find_variable(path, params) {
        Some(Value::Array(items)) => items.len(),
        Some(Value::Object(map)) => map.len(),
        _ => return -1,
    };
    i64::try_from(len).unwrap_or(i64::MAX)
}

/// Renders a value the way it appears in template output.
#[must_use]
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .or_else(|_| s.trim().parse::<f64>().map(|f| f as i64))
            .unwrap_or(0),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn call(name: &str, args: &[Value], p: &Value) -> bool {
        call_function(name, args, &params(p.clone()))
            .unwrap()
            .as_bool()
            .unwrap()
    }

    #[test]
    fn test_comparisons() {
        let p = json!({});
        assert!(call("EQ", &[json!(2), json!("2")], &p));
        assert!(call("LT", &[json!(1), json!(2)], &p));
        assert!(call("LE", &[json!(2), json!(2)], &p));
        assert!(call("GT", &[json!(3.5), json!(2)], &p));
        assert!(!call("GE", &[json!(1), json!(2)], &p));
        assert!(call("Nth", &[json!(6), json!(3)], &p));
        assert!(!call("Nth", &[json!(6), json!(0)], &p));
        assert!(call("Nth", &[json!(i64::MIN), json!(-1)], &p));
        assert!(!call("Nth", &[json!(i64::MIN), json!(7)], &p));
    }

    #[test]
    fn test_request_count_functions() {
        let p = json!({ "_RequestCount": 4 });
        assert!(call("NthRequest", &[json!(2)], &p));
        assert!(!call("NthRequest", &[json!(3)], &p));
        assert!(call("GERequest", &[json!(4)], &p));
        assert!(!call("LTRequest", &[json!(4)], &p));
        assert!(!call("NthRequest", &[json!(1)], &json!({})));
    }

    #[test]
    fn test_property_functions() {
        let p = json!({
            "id": 12,
            "name": "Dune",
            "items": [{"sku": "a1"}, {"sku": "b2"}],
            "headers": {"Content-Type": "application/json"}
        });
        assert!(call("PropertyEquals", &[json!("id"), json!("12")], &p));
        assert!(call("VariableEquals", &[json!("name"), json!("Dune")], &p));
        assert!(call(
            "VariableMatches",
            &[json!("headers.Content-Type"), json!("xml"), json!("json")],
            &p
        ));
        assert!(!call("PropertyContains", &[json!("name"), json!("^X")], &p));
        assert!(call("NumPropertyGE", &[json!("id"), json!(10)], &p));
        assert!(call("NumPropertyEQ", &[json!("id"), json!(12)], &p));
        assert!(call("PropertyLenEQ", &[json!("items"), json!(2)], &p));
        assert!(call("PropertyLenEQ", &[json!("items.sku"), json!(2)], &p));
        assert!(!call("PropertyLenLE", &[json!("name"), json!(10)], &p));
        assert!(call("HasProperty", &[json!("items")], &p));
        assert!(!call("HasProperty", &[json!("missing")], &p));
    }

    #[test]
    fn test_response_functions() {
        let p = json!({ "status": 201, "elapsed": 40 });
        assert!(call("ResponseStatusMatches", &[json!("200"), json!("201")], &p));
        assert!(!call("ResponseStatusMatches", &[json!("^5")], &p));
        assert!(call("ResponseTimeMillisLE", &[json!(50)], &p));
        assert!(!call("ResponseTimeMillisLE", &[json!(50)], &json!({})));
    }

    #[test]
    fn test_arity_errors() {
        let p = Map::new();
        assert!(matches!(
            call_function("EQ", &[json!(1)], &p),
            Err(TemplateError::Arity { actual: 1, .. })
        ));
        assert!(matches!(
            call_function("VariableMatches", &[json!("x")], &p),
            Err(TemplateError::Arity { .. })
        ));
        assert!(matches!(
            call_function("ResponseStatusMatches", &[], &p),
            Err(TemplateError::Arity { .. })
        ));
    }

    #[test]
    fn test_find_variable_fan_out() {
        let p = params(json!({"a": {"b": [{"c": 1}, {"c": 2}, {"d": 3}]}, "n": null}));
        assert_eq!(find_variable("a.b.c", &p), Some(json!([1, 2])));
        assert_eq!(find_variable("n", &p), None);
        assert_eq!(find_variable("a.x", &p), None);
        assert_eq!(variable_size("a.b", &p), 3);
        assert_eq!(variable_size("missing", &p), -1);
    }

    #[test]
    fn test_function_names_are_all_callable() {
        let p = Map::new();
        for name in FUNCTION_NAMES {
            let result = call_function(name, &[], &p);
            assert!(!matches!(result, Err(TemplateError::UnknownFunction(_))), "{name}");
        }
    }
}
