//! # Parameter Coercion
//!
//! Converts what the router captured into typed values:
//!
//! - path placeholders are coerced to their declared [`ParamType`]
//!   (`int` → integer, `float` → floating point, `string` → unchanged); a
//!   placeholder that did not participate in the match stays `null`
//! - numeric coercion is lenient: the leading numeric prefix is used and a
//!   value without one becomes `0` / `0.0`, so a match is never rejected
//! - the query string is split into a key/value map with light type inference:
//!   digits-only values become integers, valueless keys become `true`
//!
//! Both halves end up in a request-scoped [`Params`] value. Nothing here is
//! stored on the shared route table.

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::borrow::Cow;

use crate::router::pattern::{ParamType, RoutePattern, RESERVED_QUERY_PARAM};

/// Typed parameters for one matched request.
///
/// Every placeholder declared by the matched pattern is present in
/// [`path`](Self::path), with `null` for optional placeholders that were not
/// matched. The parsed query string lives under the reserved `query` key when
/// serialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    path: Map<String, Value>,
    query: Map<String, Value>,
}

impl Params {
    /// Build from already coerced parts.
    #[must_use]
    pub fn new(path: Map<String, Value>, query: Map<String, Value>) -> Self {
        Self { path, query }
    }

    /// A path parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.path.get(name)
    }

    /// A path parameter as an integer.
    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// A path parameter as a float. Integers widen.
    #[must_use]
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// A path parameter as a string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// All path parameters.
    #[must_use]
    pub fn path(&self) -> &Map<String, Value> {
        &self.path
    }

    /// The parsed query string.
    #[must_use]
    pub fn query(&self) -> &Map<String, Value> {
        &self.query
    }

    /// A single query parameter.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&Value> {
        self.query.get(key)
    }

    /// Everything as one JSON object: path parameters plus `query`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut all = self.path.clone();
        all.insert(
            RESERVED_QUERY_PARAM.to_string(),
            Value::Object(self.query.clone()),
        );
        Value::Object(all)
    }

    /// Deserialize the parameters (including `query`) into a typed struct.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the shape does not fit `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_value())
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Coerce one captured value to its declared type.
///
/// `None` (unmatched optional placeholder) stays `null` and is never coerced.
/// Numbers are read from the leading numeric prefix: `"12abc"` is `12`,
/// `"me"` is `0`, `"3.5kg"` is `3.5`.
///
/// ```rust
/// use serde_json::json;
/// use simpleapi::params::coerce_value;
/// use simpleapi::router::ParamType;
///
/// assert_eq!(coerce_value(Some("12abc"), ParamType::Int), json!(12));
/// assert_eq!(coerce_value(Some("me"), ParamType::Int), json!(0));
/// assert_eq!(coerce_value(None, ParamType::Float), serde_json::Value::Null);
/// ```
#[must_use]
pub fn coerce_value(raw: Option<&str>, ty: ParamType) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    match ty {
        ParamType::Int => Value::from(leading_int(raw)),
        ParamType::Float => Number::from_f64(leading_float(raw))
            .map_or_else(|| Value::from(0.0), Value::Number),
        ParamType::String => Value::String(raw.to_string()),
    }
}

/// Coerce every value captured for `pattern`.
///
/// `captured` is aligned with [`RoutePattern::params`], as returned by
/// [`RoutePattern::capture`]. Captured values are percent-decoded before
/// coercion.
#[must_use]
pub fn coerce_path_params(
    pattern: &RoutePattern,
    captured: &[Option<&str>],
) -> Map<String, Value> {
    pattern
        .params()
        .iter()
        .zip(captured.iter().copied())
        .map(|(spec, raw)| {
            let decoded = raw.map(percent_decode);
            (spec.name.clone(), coerce_value(decoded.as_deref(), spec.ty))
        })
        .collect()
}

/// Byte length of the optionally signed digit run at the start of `s`.
fn signed_digits_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits = bytes[sign..].iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        0
    } else {
        sign + digits
    }
}

/// Integer value of the leading `[+-]?[0-9]+` prefix, saturating on
/// overflow; `0` without one.
fn leading_int(raw: &str) -> i64 {
    let s = raw.trim_start();
    let len = signed_digits_len(s);
    if len == 0 {
        return 0;
    }
    let prefix = &s[..len];
    prefix.parse::<i64>().unwrap_or(if prefix.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// Float value of the leading `[+-]?(digits[.digits]|.digits)([eE][+-]?digits)?`
/// prefix; `0.0` without one or when the prefix is not finite.
fn leading_float(raw: &str) -> f64 {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));

    let int_digits = bytes[end..].iter().take_while(|b| b.is_ascii_digit()).count();
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = bytes[end + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return 0.0;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let exp = signed_digits_len(&s[end + 1..]);
        if exp > 0 {
            end += 1 + exp;
        }
    }

    s[..end]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parse a raw query string.
///
/// - pairs are separated by `&` (an HTML-escaped `&amp;` counts as one)
/// - a pair is split at its first `=`
/// - pairs with an empty key are skipped
/// - a key without `=` maps to `true`
/// - a value made only of ASCII digits becomes an integer; everything else
///   (including an empty value) stays a string
/// - repeated keys: the last one wins
///
/// ```rust
/// use serde_json::json;
/// use simpleapi::params::parse_query_string;
///
/// let q = parse_query_string("a=1&b&c=hello&=skip");
/// assert_eq!(serde_json::Value::Object(q), json!({"a": 1, "b": true, "c": "hello"}));
/// ```
#[must_use]
pub fn parse_query_string(query: &str) -> Map<String, Value> {
    let mut out = Map::new();
    if query.is_empty() {
        return out;
    }

    let query = query.replace("&amp;", "&");
    for pair in query.split('&') {
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (pair, None),
        };
        if key.is_empty() {
            continue;
        }

        let value = match value {
            None => Value::Bool(true),
            Some(v) => infer_query_value(&form_decode(v)),
        };
        out.insert(form_decode(key).into_owned(), value);
    }
    out
}

fn infer_query_value(v: &str) -> Value {
    if !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = v.parse::<i64>() {
            return Value::from(n);
        }
    }
    Value::String(v.to_string())
}

fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string())
}

fn form_decode(raw: &str) -> Cow<'_, str> {
    if !raw.contains(|c: char| c == '%' || c == '+') {
        return Cow::Borrowed(raw);
    }
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => Cow::Owned(decoded.into_owned()),
        Err(_) => Cow::Owned(spaced),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_string_inference() {
        let q = parse_query_string("a=1&b&c=hello&=skip");
        assert_eq!(Value::Object(q), json!({"a": 1, "b": true, "c": "hello"}));
    }

    #[test]
    fn test_query_string_empty() {
        assert!(parse_query_string("").is_empty());
        assert!(parse_query_string("&&").is_empty());
    }

    #[test]
    fn test_query_only_plain_digits_are_numbers() {
        let q = parse_query_string("neg=-1&dec=1.5&empty=&big=99999999999999999999999");
        assert_eq!(q.get("neg"), Some(&json!("-1")));
        assert_eq!(q.get("dec"), Some(&json!("1.5")));
        assert_eq!(q.get("empty"), Some(&json!("")));
        assert_eq!(q.get("big"), Some(&json!("99999999999999999999999")));
    }

    #[test]
    fn test_query_value_keeps_later_equals() {
        let q = parse_query_string("expr=a=b");
        assert_eq!(q.get("expr"), Some(&json!("a=b")));
    }

    #[test]
    fn test_query_last_key_wins() {
        let q = parse_query_string("limit=10&limit=20");
        assert_eq!(q.get("limit"), Some(&json!(20)));
    }

    #[test]
    fn test_query_decoding_and_escaped_separator() {
        let q = parse_query_string("name=Ada+Lovelace&amp;city=K%C3%B6ln");
        assert_eq!(q.get("name"), Some(&json!("Ada Lovelace")));
        assert_eq!(q.get("city"), Some(&json!("Köln")));
    }

    #[test]
    fn test_coerce_value_types() {
        assert_eq!(coerce_value(Some("42"), ParamType::Int), json!(42));
        assert_eq!(coerce_value(Some("42"), ParamType::Float), json!(42.0));
        assert_eq!(coerce_value(Some("42"), ParamType::String), json!("42"));
        assert_eq!(coerce_value(None, ParamType::Int), Value::Null);
    }

    #[test]
    fn test_int_uses_leading_prefix() {
        assert_eq!(coerce_value(Some("12abc"), ParamType::Int), json!(12));
        assert_eq!(coerce_value(Some("-7x"), ParamType::Int), json!(-7));
        assert_eq!(coerce_value(Some(" 5"), ParamType::Int), json!(5));
        assert_eq!(coerce_value(Some("3.9"), ParamType::Int), json!(3));
        assert_eq!(coerce_value(Some("me"), ParamType::Int), json!(0));
        assert_eq!(coerce_value(Some("-"), ParamType::Int), json!(0));
        assert_eq!(
            coerce_value(Some("99999999999999999999"), ParamType::Int),
            json!(i64::MAX)
        );
    }

    #[test]
    fn test_float_uses_leading_prefix() {
        assert_eq!(coerce_value(Some("3.5kg"), ParamType::Float), json!(3.5));
        assert_eq!(coerce_value(Some(".5"), ParamType::Float), json!(0.5));
        assert_eq!(coerce_value(Some("-2."), ParamType::Float), json!(-2.0));
        assert_eq!(coerce_value(Some("1e3x"), ParamType::Float), json!(1000.0));
        assert_eq!(coerce_value(Some("4e"), ParamType::Float), json!(4.0));
        assert_eq!(coerce_value(Some("warm"), ParamType::Float), json!(0.0));
        assert_eq!(coerce_value(Some("NaN"), ParamType::Float), json!(0.0));
        assert_eq!(coerce_value(Some("inf"), ParamType::Float), json!(0.0));
        assert_eq!(coerce_value(Some("1e999"), ParamType::Float), json!(0.0));
    }

    #[test]
    fn test_coerce_path_params_never_rejects() {
        let pattern = RoutePattern::compile("/users/{id::int}").unwrap();
        let map = coerce_path_params(&pattern, &[Some("me")]);
        assert_eq!(map.get("id"), Some(&json!(0)));
    }

    #[test]
    fn test_coerce_path_params_decodes() {
        let pattern = RoutePattern::compile("/files/{name}").unwrap();
        let map = coerce_path_params(&pattern, &[Some("a%20b.txt")]);
        assert_eq!(map.get("name"), Some(&json!("a b.txt")));
    }

    #[test]
    fn test_params_value_shape() {
        let mut path = Map::new();
        path.insert("id".into(), json!(7));
        let mut query = Map::new();
        query.insert("verbose".into(), json!(true));
        let params = Params::new(path, query);

        assert_eq!(params.get_i64("id"), Some(7));
        assert_eq!(params.get_f64("id"), Some(7.0));
        assert_eq!(params.to_value(), json!({"id": 7, "query": {"verbose": true}}));
    }

    #[test]
    fn test_params_deserialize() {
        #[derive(serde::Deserialize)]
        struct Item {
            id: i64,
            query: Map<String, Value>,
        }

        let mut path = Map::new();
        path.insert("id".into(), json!(3));
        let item: Item = Params::new(path, Map::new()).deserialize().unwrap();
        assert_eq!(item.id, 3);
        assert!(item.query.is_empty());
    }
}
