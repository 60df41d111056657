//! 字面量类型转换
//!
//! 把规则中的 JSON 字面量（或外部参数值）转换为字段声明类型对应的 `FieldValue`。

use crate::error::{QueryError, Result};
use crate::record::{FieldKind, FieldType};
use crate::value::{FieldValue, parse_decimal};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Number, Value};

/// 转换字面量到目标类型
///
/// - 数值：按目标数值类型做宽化/窄化转换，目标为文本时取其十进制表示
/// - 文本：按目标类型的标准格式解析
/// - 布尔：仅当目标也是布尔时透传
/// - null：仅当目标可取 null
pub fn coerce_literal(value: &Value, target: FieldType, field: &str) -> Result<FieldValue> {
    let coerced = match value {
        Value::Null if target.accepts_null() => Some(FieldValue::Null),
        Value::Number(n) => coerce_number(n, target.kind),
        Value::String(s) => coerce_text(s, target.kind),
        Value::Bool(b) if target.kind == FieldKind::Bool => Some(FieldValue::Bool(*b)),
        _ => None,
    };

    coerced.ok_or_else(|| QueryError::TypeCoercion {
        field: field.to_string(),
        expected: target.to_string(),
        actual: json_type_name(value).to_string(),
    })
}

fn coerce_number(n: &Number, kind: FieldKind) -> Option<FieldValue> {
    match kind {
        FieldKind::Integer => {
            if let Some(i) = n.as_i64() {
                return Some(FieldValue::Integer(i));
            }
            // 小数按最近偶数舍入后截断到 i64 范围内
            let rounded = n.as_f64()?.round_ties_even();
            (rounded.is_finite() && rounded >= i64::MIN as f64 && rounded <= i64::MAX as f64)
                .then(|| FieldValue::Integer(rounded as i64))
        }
        FieldKind::Float => n.as_f64().map(FieldValue::Float),
        FieldKind::Decimal => parse_decimal(&n.to_string()).map(FieldValue::Decimal),
        FieldKind::Text => Some(FieldValue::Text(number_text(n))),
        FieldKind::Bool | FieldKind::Timestamp | FieldKind::Sequence => None,
    }
}

/// 数字的文本形式，整数值的小数不带小数部分（`5.0` → `"5"`）
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 => f.to_string(),
        _ => n.to_string(),
    }
}

fn coerce_text(s: &str, kind: FieldKind) -> Option<FieldValue> {
    match kind {
        FieldKind::Text => Some(FieldValue::Text(s.to_string())),
        FieldKind::Integer => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| parse_decimal(s)?.round_dp(0).to_i64())
            .map(FieldValue::Integer),
        FieldKind::Float => s.trim().parse::<f64>().ok().map(FieldValue::Float),
        FieldKind::Decimal => parse_decimal(s).map(FieldValue::Decimal),
        FieldKind::Bool => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                Some(FieldValue::Bool(true))
            } else if s.eq_ignore_ascii_case("false") {
                Some(FieldValue::Bool(false))
            } else {
                None
            }
        }
        FieldKind::Timestamp => parse_datetime(s).map(FieldValue::Timestamp),
        FieldKind::Sequence => None,
    }
}

/// 解析日期时间：RFC 3339，或纯日期（按 UTC 零点）
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// 获取 JSON 值的类型名称
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn of(kind: FieldKind) -> FieldType {
        FieldType::of(kind)
    }

    #[test]
    fn test_number_to_numeric_kinds() {
        assert_eq!(
            coerce_literal(&json!(42), of(FieldKind::Integer), "Age").unwrap(),
            FieldValue::Integer(42)
        );
        assert_eq!(
            coerce_literal(&json!(2.5), of(FieldKind::Integer), "Age").unwrap(),
            FieldValue::Integer(2)
        );
        assert_eq!(
            coerce_literal(&json!(10.25), of(FieldKind::Decimal), "Salary").unwrap(),
            FieldValue::Decimal(Decimal::new(1025, 2))
        );
        assert_eq!(
            coerce_literal(&json!(3), of(FieldKind::Float), "Score").unwrap(),
            FieldValue::Float(3.0)
        );
    }

    #[test]
    fn test_number_to_text() {
        assert_eq!(
            coerce_literal(&json!(123), of(FieldKind::Text), "Code").unwrap(),
            FieldValue::Text("123".into())
        );
        assert_eq!(
            coerce_literal(&json!(5.0), of(FieldKind::Text), "Code").unwrap(),
            FieldValue::Text("5".into())
        );
        assert_eq!(
            coerce_literal(&json!(2.5), of(FieldKind::Text), "Code").unwrap(),
            FieldValue::Text("2.5".into())
        );
    }

    #[test]
    fn test_text_parsed_by_target() {
        assert_eq!(
            coerce_literal(&json!("17"), of(FieldKind::Integer), "Age").unwrap(),
            FieldValue::Integer(17)
        );
        assert_eq!(
            coerce_literal(&json!("TRUE"), of(FieldKind::Bool), "IsActive").unwrap(),
            FieldValue::Bool(true)
        );
        assert!(matches!(
            coerce_literal(&json!("2024-01-15"), of(FieldKind::Timestamp), "CreatedAt").unwrap(),
            FieldValue::Timestamp(_)
        ));
    }

    #[test]
    fn test_bool_only_to_bool() {
        assert_eq!(
            coerce_literal(&json!(true), of(FieldKind::Bool), "IsActive").unwrap(),
            FieldValue::Bool(true)
        );
        let err = coerce_literal(&json!(true), of(FieldKind::Integer), "Age").unwrap_err();
        assert!(matches!(
            err,
            QueryError::TypeCoercion { ref field, ref actual, .. }
                if field == "Age" && actual == "boolean"
        ));
    }

    #[test]
    fn test_unparseable_text_fails() {
        let err = coerce_literal(&json!("abc"), of(FieldKind::Integer), "Age").unwrap_err();
        assert_eq!(err.code(), "TYPE_COERCION_ERROR");
    }

    #[test]
    fn test_null_literal() {
        assert_eq!(
            coerce_literal(&Value::Null, FieldType::optional(FieldKind::Integer), "ManagerId")
                .unwrap(),
            FieldValue::Null
        );
        assert!(coerce_literal(&Value::Null, of(FieldKind::Integer), "Id").is_err());
    }

    #[test]
    fn test_array_and_object_fail() {
        assert!(coerce_literal(&json!([1]), of(FieldKind::Integer), "Id").is_err());
        assert!(coerce_literal(&json!({"a": 1}), of(FieldKind::Text), "Name").is_err());
    }
}
