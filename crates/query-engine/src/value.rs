//! 字段值
//!
//! 记录字段经访问器读取后统一表示为 `FieldValue`，编译后的谓词和分组键都基于它工作。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// 运行时字段值
#[derive(Debug, Clone)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Timestamp(DateTime<Utc>),
    Sequence(Vec<FieldValue>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// 值类型名称（用于错误信息）
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
            Self::Sequence(_) => "sequence",
        }
    }

    /// 按十进制数解读（数值类型，或可解析为数字的文本）
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Integer(i) => Some(Decimal::from(*i)),
            Self::Float(f) => Decimal::from_f64(*f),
            Self::Decimal(d) => Some(*d),
            Self::Text(s) => parse_decimal(s),
            _ => None,
        }
    }

    fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            other => other.to_decimal()?.to_f64(),
        }
    }

    /// 同域比较
    ///
    /// 数值类型之间可以互相比较；null 与任何值都不可比较。
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => None,
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Decimal(a), Self::Decimal(b)) => Some(a.cmp(b)),
            (Self::Float(_), Self::Integer(_) | Self::Decimal(_))
            | (Self::Integer(_) | Self::Decimal(_), Self::Float(_)) => {
                self.to_f64()?.partial_cmp(&other.to_f64()?)
            }
            (Self::Integer(_), Self::Decimal(_)) | (Self::Decimal(_), Self::Integer(_)) => {
                Some(self.to_decimal()?.cmp(&other.to_decimal()?))
            }
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// 聚合排序使用的全序
    ///
    /// null 最小；两侧都能按十进制数解读时按数值比较（含数字文本）；
    /// 其余同域值按自然顺序；不同域按类型名排序。
    pub fn aggregate_cmp(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            _ => {
                if let (Some(a), Some(b)) = (self.to_decimal(), other.to_decimal()) {
                    return a.cmp(&b);
                }
                self.compare(other)
                    .unwrap_or_else(|| self.type_name().cmp(other.type_name()))
            }
        }
    }
}

/// 解析十进制数，支持科学计数法
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b) == Ordering::Equal,
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Sequence(a), Self::Sequence(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl Hash for FieldValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Integer(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Decimal(d) => d.hash(state),
            Self::Text(s) => s.hash(state),
            Self::Timestamp(t) => t.hash(state),
            Self::Sequence(items) => items.hash(state),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Text(s) => write!(f, "{}", s),
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Decimal(d) => Serialize::serialize(d, serializer),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Timestamp(t) => t.serialize(serializer),
            Self::Sequence(items) => items.serialize(serializer),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Integer(v.into())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Decimal> for FieldValue {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&String> for FieldValue {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl<T: Clone + Into<FieldValue>> From<&[T]> for FieldValue {
    fn from(v: &[T]) -> Self {
        Self::Sequence(v.iter().cloned().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_is_strict_per_kind() {
        assert_eq!(FieldValue::Integer(10), FieldValue::Integer(10));
        assert_ne!(FieldValue::Integer(10), FieldValue::Text("10".into()));
        assert_eq!(FieldValue::Decimal(Decimal::new(10, 1)), FieldValue::Decimal(Decimal::new(100, 2)));
        assert_eq!(FieldValue::Null, FieldValue::Null);
    }

    #[test]
    fn test_hash_consistent_with_eq() {
        let mut set = HashSet::new();
        set.insert(FieldValue::Decimal(Decimal::new(10, 1)));
        set.insert(FieldValue::Decimal(Decimal::new(100, 2)));
        set.insert(FieldValue::Float(2.5));
        set.insert(FieldValue::Float(2.5));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_compare_across_numeric_kinds() {
        assert_eq!(
            FieldValue::Integer(3).compare(&FieldValue::Decimal(Decimal::new(25, 1))),
            Some(Ordering::Greater)
        );
        assert_eq!(
            FieldValue::Float(1.5).compare(&FieldValue::Integer(2)),
            Some(Ordering::Less)
        );
        assert_eq!(FieldValue::Null.compare(&FieldValue::Integer(2)), None);
        assert_eq!(
            FieldValue::Text("a".into()).compare(&FieldValue::Integer(2)),
            None
        );
    }

    #[test]
    fn test_aggregate_cmp_numeric_text() {
        let nine = FieldValue::Text("9".into());
        let ten = FieldValue::Text("10".into());
        assert_eq!(nine.aggregate_cmp(&ten), Ordering::Less);
        assert_eq!(FieldValue::Null.aggregate_cmp(&nine), Ordering::Less);

        let apple = FieldValue::Text("apple".into());
        let banana = FieldValue::Text("banana".into());
        assert_eq!(apple.aggregate_cmp(&banana), Ordering::Less);
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldValue::Null.to_string(), "");
        assert_eq!(FieldValue::Integer(42).to_string(), "42");
        let tags = FieldValue::Sequence(vec!["a".into(), "b".into()]);
        assert_eq!(tags.to_string(), "a,b");
    }

    #[test]
    fn test_from_option() {
        assert_eq!(FieldValue::from(None::<i64>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some(5i64)), FieldValue::Integer(5));
    }

    #[test]
    fn test_serialize() {
        let decimal = FieldValue::Decimal(Decimal::new(1250, 2));
        assert_eq!(serde_json::to_value(&decimal).unwrap(), serde_json::json!("12.50"));
        assert_eq!(serde_json::to_value(FieldValue::Null).unwrap(), serde_json::Value::Null);
        assert_eq!(
            serde_json::to_value(FieldValue::Sequence(vec![1i64.into(), "a".into()])).unwrap(),
            serde_json::json!([1, "a"])
        );
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal(" 12.50 "), Some(Decimal::new(1250, 2)));
        assert_eq!(parse_decimal("1e3"), Some(Decimal::from(1000)));
        assert_eq!(parse_decimal("abc"), None);
    }
}
