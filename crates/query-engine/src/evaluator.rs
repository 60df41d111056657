//! 条件评估器
//!
//! 实现各操作符在字段值上的判定逻辑。字面量在编译期已转换为字段类型，
//! 这里只做纯比较，不会失败：无法比较的值一律视为不匹配。

use crate::operators::Operator;
use crate::value::FieldValue;
use regex::Regex;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 相等比较
    ///
    /// 数值类型按数值比较（`10.0 == 10`），null 只与 null 相等。
    pub fn equals(field: &FieldValue, expected: &FieldValue) -> bool {
        match field.compare(expected) {
            Some(ordering) => ordering == Ordering::Equal,
            None => field == expected,
        }
    }

    /// 列表包含检查 (in)
    pub fn in_list(field: &FieldValue, candidates: &[FieldValue]) -> bool {
        candidates
            .iter()
            .any(|candidate| Self::equals(field, candidate))
    }

    /// 有序比较，null 或不同域的值不匹配
    pub fn ordered(field: &FieldValue, expected: &FieldValue, operator: Operator) -> bool {
        field
            .compare(expected)
            .is_some_and(|ordering| Self::satisfies(operator, ordering))
    }

    /// 数字文本的有序比较：字段值按十进制数解析，解析失败不匹配
    pub fn ordered_as_decimal(field: &FieldValue, expected: Decimal, operator: Operator) -> bool {
        field
            .to_decimal()
            .is_some_and(|value| Self::satisfies(operator, value.cmp(&expected)))
    }

    fn satisfies(operator: Operator, ordering: Ordering) -> bool {
        match operator {
            Operator::GreaterThan => ordering == Ordering::Greater,
            Operator::GreaterThanOrEqual => ordering != Ordering::Less,
            Operator::LessThan => ordering == Ordering::Less,
            Operator::LessThanOrEqual => ordering != Ordering::Greater,
            _ => false,
        }
    }

    /// 字符串子串检查；序列字段按元素的字符串表示判断成员关系
    pub fn contains(field: &FieldValue, needle: &str) -> bool {
        match field {
            FieldValue::Text(s) => s.contains(needle),
            FieldValue::Sequence(items) => items.iter().any(|item| item.to_string() == needle),
            _ => false,
        }
    }

    /// 字符串前缀检查
    pub fn starts_with(field: &FieldValue, prefix: &str) -> bool {
        field.as_str().is_some_and(|s| s.starts_with(prefix))
    }

    /// 字符串后缀检查
    pub fn ends_with(field: &FieldValue, suffix: &str) -> bool {
        field.as_str().is_some_and(|s| s.ends_with(suffix))
    }

    /// 判断值是否为空：null、空字符串或空序列
    pub fn is_empty(value: &FieldValue) -> bool {
        match value {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Sequence(items) => items.is_empty(),
            _ => false,
        }
    }

    /// null 或空字符串
    pub fn is_null_or_empty(value: &FieldValue) -> bool {
        match value {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// 统计正则在值的字符串表示中的匹配次数
    pub fn count_matches(value: &FieldValue, pattern: &Regex) -> usize {
        pattern.find_iter(&value.to_string()).count()
    }

    /// 字符串表示是否包含指定文本（忽略大小写）
    pub fn contains_ignore_case(value: &FieldValue, needle: &str) -> bool {
        value
            .to_string()
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }
}
