//! JavaScript-flavoured semantics over `serde_json::Value`.

use serde_json::{Number, Value};
use std::borrow::Cow;

/// A runtime value: JSON data, `undefined`, or a number JSON cannot hold.
///
/// Data is borrowed from the data object or a local until something needs
/// to own it.
#[derive(Debug, Clone, PartialEq)]
pub enum JsValue<'v> {
    Undefined,
    /// `NaN`, `Infinity` or `-Infinity`
    NonFinite(f64),
    Json(Cow<'v, Value>),
}

impl<'v> JsValue<'v> {
    pub fn owned(value: Value) -> Self {
        JsValue::Json(Cow::Owned(value))
    }

    pub fn borrowed(value: &'v Value) -> Self {
        JsValue::Json(Cow::Borrowed(value))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            JsValue::Json(value) => Some(value.as_ref()),
            _ => None,
        }
    }

    /// Reborrow without cloning the underlying data
    pub fn view(&self) -> JsValue<'_> {
        match self {
            JsValue::Undefined => JsValue::Undefined,
            JsValue::NonFinite(n) => JsValue::NonFinite(*n),
            JsValue::Json(value) => JsValue::Json(Cow::Borrowed(value.as_ref())),
        }
    }

    pub fn into_owned(self) -> JsValue<'static> {
        match self {
            JsValue::Undefined => JsValue::Undefined,
            JsValue::NonFinite(n) => JsValue::NonFinite(n),
            JsValue::Json(value) => JsValue::Json(Cow::Owned(value.into_owned())),
        }
    }

    /// The value as it is stored in an array or object; `undefined` has none
    /// and non-finite numbers become `null`, as in `JSON.stringify`
    pub fn into_json(self) -> Option<Value> {
        match self {
            JsValue::Undefined => None,
            JsValue::NonFinite(_) => Some(Value::Null),
            JsValue::Json(value) => Some(value.into_owned()),
        }
    }

    /// `undefined` or `null`
    pub fn is_nullish(&self) -> bool {
        matches!(self, JsValue::Undefined) || matches!(self.as_json(), Some(Value::Null))
    }
}

/// JSON form of a finite number, keeping integral values as integers
pub fn number_value(n: f64) -> Option<Value> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        if n >= 0.0 {
            return Some(Value::from(n as u64));
        }
        return Some(Value::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number)
}

pub fn number(n: f64) -> JsValue<'static> {
    match number_value(n) {
        Some(value) => JsValue::owned(value),
        None => JsValue::NonFinite(n),
    }
}

pub fn truthy(value: &JsValue<'_>) -> bool {
    match value {
        JsValue::Undefined => false,
        JsValue::NonFinite(n) => !n.is_nan(),
        JsValue::Json(value) => match value.as_ref() {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        },
    }
}

/// `String(value)`, except that `undefined` and `null` render as nothing
pub fn display(value: &JsValue<'_>) -> String {
    match value {
        JsValue::Undefined => String::new(),
        JsValue::NonFinite(n) => format_non_finite(*n).to_string(),
        JsValue::Json(value) => display_json(value),
    }
}

fn display_json(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(n),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(display_json)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn format_non_finite(n: f64) -> &'static str {
    if n.is_nan() {
        "NaN"
    } else if n > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}

fn format_number(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// `Number(value)` conversion
pub fn to_number(value: &JsValue<'_>) -> f64 {
    match value {
        JsValue::Undefined => f64::NAN,
        JsValue::NonFinite(n) => *n,
        JsValue::Json(value) => json_to_number(value),
    }
}

fn json_to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let s = s.trim();
            match s {
                "" => 0.0,
                "Infinity" | "+Infinity" => f64::INFINITY,
                "-Infinity" => f64::NEG_INFINITY,
                _ => s.parse().unwrap_or(f64::NAN),
            }
        }
        Value::Array(items) if items.is_empty() => 0.0,
        Value::Array(items) if items.len() == 1 => json_to_number(&items[0]),
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

pub fn type_of(value: &JsValue<'_>) -> &'static str {
    match value {
        JsValue::Undefined => "undefined",
        JsValue::NonFinite(_) => "number",
        JsValue::Json(value) => match value.as_ref() {
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
        },
    }
}

/// `===`; `NaN` equals nothing
pub fn strict_equals(left: &JsValue<'_>, right: &JsValue<'_>) -> bool {
    match (left, right) {
        (JsValue::Undefined, JsValue::Undefined) => true,
        (JsValue::NonFinite(a), JsValue::NonFinite(b)) => a == b,
        (JsValue::Json(a), JsValue::Json(b)) => match (a.as_ref(), b.as_ref()) {
            (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
            (a, b) => a == b,
        },
        _ => false,
    }
}

/// `==` for the primitive cases; containers compare structurally
pub fn loose_equals(left: &JsValue<'_>, right: &JsValue<'_>) -> bool {
    if left.is_nullish() || right.is_nullish() {
        return left.is_nullish() && right.is_nullish();
    }
    let primitive = |v: &JsValue<'_>| {
        matches!(v, JsValue::NonFinite(_))
            || matches!(
                v.as_json(),
                Some(Value::Number(_) | Value::String(_) | Value::Bool(_))
            )
    };
    match (left.as_json(), right.as_json()) {
        (Some(Value::String(a)), Some(Value::String(b))) => a == b,
        _ if primitive(left) && primitive(right) => to_number(left) == to_number(right),
        _ => strict_equals(left, right),
    }
}

/// `<`, `<=`, `>`, `>=`: strings compare lexically, everything else numerically
pub fn compare(left: &JsValue<'_>, right: &JsValue<'_>) -> Option<std::cmp::Ordering> {
    match (left.as_json(), right.as_json()) {
        (Some(Value::String(a)), Some(Value::String(b))) => Some(a.cmp(b)),
        _ => to_number(left).partial_cmp(&to_number(right)),
    }
}

/// `+`: concatenation when either side is a string or a container
pub fn add(left: &JsValue<'_>, right: &JsValue<'_>) -> JsValue<'static> {
    let stringish = |v: &JsValue<'_>| {
        matches!(
            v.as_json(),
            Some(Value::String(_) | Value::Array(_) | Value::Object(_))
        )
    };
    if stringish(left) || stringish(right) {
        return JsValue::owned(Value::String(concat_text(left) + &concat_text(right)));
    }
    number(to_number(left) + to_number(right))
}

/// `String(value)` without the empty rendering of `undefined` and `null`
fn concat_text(value: &JsValue<'_>) -> String {
    match value {
        JsValue::Undefined => "undefined".to_string(),
        JsValue::Json(v) if v.is_null() => "null".to_string(),
        other => display(other),
    }
}

/// HTML escaping applied by `<%= %>`
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn js(value: Value) -> JsValue<'static> {
        JsValue::owned(value)
    }

    const NAN: JsValue<'static> = JsValue::NonFinite(f64::NAN);
    const INFINITY: JsValue<'static> = JsValue::NonFinite(f64::INFINITY);

    #[test]
    fn test_display_scalars() {
        assert_eq!(display(&js(json!("Alice"))), "Alice");
        assert_eq!(display(&js(json!(30))), "30");
        assert_eq!(display(&js(json!(2.5))), "2.5");
        assert_eq!(display(&js(json!(3.0))), "3");
        assert_eq!(display(&js(json!(true))), "true");
        assert_eq!(display(&js(json!(null))), "");
        assert_eq!(display(&JsValue::Undefined), "");
        assert_eq!(display(&NAN), "NaN");
        assert_eq!(display(&JsValue::NonFinite(f64::NEG_INFINITY)), "-Infinity");
    }

    #[test]
    fn test_display_containers() {
        assert_eq!(display(&js(json!([1, "two", null]))), "1,two,");
        assert_eq!(display(&js(json!({"key": "value"}))), "[object Object]");
    }

    #[test]
    fn test_truthiness() {
        for falsy in [json!(false), json!(0), json!(""), json!(null)] {
            assert!(!truthy(&js(falsy.clone())), "{} should be falsy", falsy);
        }
        for truthy_value in [json!(true), json!(-1), json!("0"), json!([]), json!({})] {
            assert!(truthy(&js(truthy_value.clone())), "{} should be truthy", truthy_value);
        }
        assert!(!truthy(&JsValue::Undefined));
        assert!(!truthy(&NAN));
        assert!(truthy(&INFINITY));
    }

    #[test]
    fn test_number_keeps_integers() {
        assert_eq!(number(3.0), js(json!(3)));
        assert_eq!(number(-2.0), js(json!(-2)));
        assert_eq!(number(0.5), js(json!(0.5)));
        assert!(matches!(number(f64::NAN), JsValue::NonFinite(n) if n.is_nan()));
        assert_eq!(number(1.0 / 0.0), INFINITY);
        assert_eq!(number_value(f64::INFINITY), None);
    }

    #[test]
    fn test_add() {
        assert_eq!(add(&js(json!(1)), &js(json!(2))), js(json!(3)));
        assert_eq!(add(&js(json!("a")), &js(json!(1))), js(json!("a1")));
        assert_eq!(add(&js(json!("a")), &JsValue::Undefined), js(json!("aundefined")));
    }

    #[test]
    fn test_non_finite_arithmetic() {
        assert_eq!(add(&INFINITY, &js(json!(1))), INFINITY);
        assert!(matches!(add(&NAN, &js(json!(3))), JsValue::NonFinite(n) if n.is_nan()));
        assert_eq!(add(&NAN, &js(json!("x"))), js(json!("NaNx")));
        assert_eq!(type_of(&NAN), "number");
        assert_eq!(to_number(&js(json!("-Infinity"))), f64::NEG_INFINITY);
    }

    #[test]
    fn test_equality() {
        assert!(strict_equals(&js(json!(1)), &js(json!(1.0))));
        assert!(!strict_equals(&js(json!(1)), &js(json!("1"))));
        assert!(loose_equals(&js(json!(1)), &js(json!("1"))));
        assert!(loose_equals(&JsValue::Undefined, &js(json!(null))));
        assert!(!loose_equals(&js(json!(0)), &JsValue::Undefined));
        assert!(!strict_equals(&NAN, &NAN));
        assert!(!loose_equals(&NAN, &NAN));
        assert!(strict_equals(&INFINITY, &INFINITY));
    }

    #[test]
    fn test_compare() {
        use std::cmp::Ordering;
        assert_eq!(compare(&js(json!(2)), &js(json!(10))), Some(Ordering::Less));
        assert_eq!(compare(&js(json!("b")), &js(json!("a"))), Some(Ordering::Greater));
        assert_eq!(compare(&JsValue::Undefined, &js(json!(1))), None);
        assert_eq!(compare(&INFINITY, &js(json!(1e300))), Some(Ordering::Greater));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&#34;x&#34;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_type_of() {
        assert_eq!(type_of(&JsValue::Undefined), "undefined");
        assert_eq!(type_of(&js(json!([]))), "object");
        assert_eq!(type_of(&js(json!("s"))), "string");
    }

    #[test]
    fn test_view_borrows() {
        let data = json!({"big": [1, 2, 3]});
        let value = JsValue::borrowed(&data);
        assert!(matches!(value.view(), JsValue::Json(Cow::Borrowed(_))));
        assert_eq!(JsValue::Undefined.into_json(), None);
        assert_eq!(NAN.into_json(), Some(Value::Null));
    }
}
