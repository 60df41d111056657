//! 规则领域模型
//!
//! 线上格式字段为 camelCase，同时接受 PascalCase 别名。

use crate::operators::LogicalOperator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// 规则定义
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Comment", skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default = "default_version", alias = "Version")]
    pub version: f64,
    #[serde(default = "default_active", alias = "IsActive")]
    pub is_active: bool,
    #[serde(default, alias = "CreatedBy")]
    pub created_by: String,
    #[serde(default = "Utc::now", alias = "CreatedAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "SourceType")]
    pub source_type: String,
    /// 目标记录类型，为空时不校验
    #[serde(default, alias = "TargetType")]
    pub target_type: String,
    #[serde(default, alias = "Integration", skip_serializing_if = "Option::is_none")]
    pub integration: Option<IntegrationBinding>,
    #[serde(default, alias = "Conditions")]
    pub conditions: Option<ConditionGroup>,
    #[serde(default, alias = "GroupBy", deserialize_with = "null_as_empty")]
    pub group_by: Vec<String>,
    #[serde(default, alias = "Aggregation")]
    pub aggregation: Option<AggregationDefinition>,
    /// 规则失败时返回给调用方的提示信息
    #[serde(default, alias = "ErrorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

fn default_version() -> f64 {
    1.0
}

fn default_active() -> bool {
    true
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl RuleDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: None,
            version: default_version(),
            is_active: true,
            created_by: String::new(),
            created_at: Utc::now(),
            source_type: String::new(),
            target_type: String::new(),
            integration: None,
            conditions: None,
            group_by: Vec::new(),
            aggregation: None,
            error_message: None,
        }
    }

    pub fn with_target_type(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = target_type.into();
        self
    }

    pub fn with_conditions(mut self, conditions: ConditionGroup) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn with_group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_aggregation(mut self, aggregation: AggregationDefinition) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    /// 条件树是否为空（没有任何条件和子组）
    pub fn has_conditions(&self) -> bool {
        self.conditions.as_ref().is_some_and(|group| !group.is_empty())
    }
}

/// 外部集成绑定（仅透传）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationBinding {
    #[serde(default, alias = "CompositeId")]
    pub composite_id: Option<String>,
}

/// 条件组
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionGroup {
    #[serde(default, alias = "LogicalOperator")]
    pub logical_operator: LogicalOperator,
    #[serde(default, alias = "Conditions")]
    pub conditions: Vec<Condition>,
    #[serde(default, alias = "Groups")]
    pub groups: Vec<ConditionGroup>,
    #[serde(default, alias = "Negate")]
    pub negate: bool,
}

impl ConditionGroup {
    pub fn new(logical_operator: LogicalOperator, conditions: Vec<Condition>) -> Self {
        Self {
            logical_operator,
            conditions,
            groups: Vec::new(),
            negate: false,
        }
    }

    pub fn and(conditions: Vec<Condition>) -> Self {
        Self::new(LogicalOperator::And, conditions)
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Self::new(LogicalOperator::Or, conditions)
    }

    pub fn with_group(mut self, group: ConditionGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    /// 没有条件也没有子组
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.groups.is_empty()
    }
}

/// 条件叶子节点
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(alias = "Property")]
    pub property: String,
    #[serde(alias = "Operator")]
    pub operator: String,
    #[serde(default, alias = "Value")]
    pub value: ConditionValue,
}

impl Condition {
    pub fn new(
        property: impl Into<String>,
        operator: impl fmt::Display,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            property: property.into(),
            operator: operator.to_string(),
            value: ConditionValue::from(value.into()),
        }
    }
}

/// 条件值
///
/// 形状取决于操作符：标量、数组，或 `if`/正则计数操作符使用的对象参数。
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Scalar(Value),
    Array(Vec<Value>),
    Object(Map<String, Value>),
}

impl ConditionValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Value::Null))
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// 转回 JSON 值（用于标量类型转换和错误信息）
    pub fn to_value(&self) -> Value {
        match self {
            Self::Scalar(v) => v.clone(),
            Self::Array(items) => Value::Array(items.clone()),
            Self::Object(map) => Value::Object(map.clone()),
        }
    }

    /// 按名称获取对象参数的子字段（忽略大小写）
    pub fn field(&self, key: &str) -> Option<&Value> {
        let map = self.as_object()?;
        map.get(key).or_else(|| {
            map.iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(key))
                .map(|(_, value)| value)
        })
    }
}

impl Default for ConditionValue {
    fn default() -> Self {
        Self::Scalar(Value::Null)
    }
}

impl From<Value> for ConditionValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Array(items),
            Value::Object(map) => Self::Object(map),
            other => Self::Scalar(other),
        }
    }
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl Serialize for ConditionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(v) => v.serialize(serializer),
            Self::Array(items) => items.serialize(serializer),
            Self::Object(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ConditionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Value::deserialize(deserializer)?.into())
    }
}

/// 聚合函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Min,
    Max,
    Count,
}

impl AggregateFunction {
    /// Min/Max 需要聚合字段
    pub fn requires_property(&self) -> bool {
        matches!(self, Self::Min | Self::Max)
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Min => write!(f, "Min"),
            Self::Max => write!(f, "Max"),
            Self::Count => write!(f, "Count"),
        }
    }
}

impl Serialize for AggregateFunction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AggregateFunction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // 同时接受名称（忽略大小写）和枚举序号
        match Value::deserialize(deserializer)? {
            Value::String(name) if name.eq_ignore_ascii_case("min") => Ok(Self::Min),
            Value::String(name) if name.eq_ignore_ascii_case("max") => Ok(Self::Max),
            Value::String(name) if name.eq_ignore_ascii_case("count") => Ok(Self::Count),
            Value::Number(n) => match n.as_u64() {
                Some(0) => Ok(Self::Min),
                Some(1) => Ok(Self::Max),
                Some(2) => Ok(Self::Count),
                _ => Err(serde::de::Error::custom(format!("未知的聚合函数序号: {}", n))),
            },
            other => Err(serde::de::Error::custom(format!("未知的聚合函数: {}", other))),
        }
    }
}

/// 聚合定义
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationDefinition {
    #[serde(alias = "AggregateFunction")]
    pub aggregate_function: AggregateFunction,
    #[serde(default, alias = "AggregateProperty")]
    pub aggregate_property: Option<String>,
}

impl AggregationDefinition {
    pub fn min(property: impl Into<String>) -> Self {
        Self {
            aggregate_function: AggregateFunction::Min,
            aggregate_property: Some(property.into()),
        }
    }

    pub fn max(property: impl Into<String>) -> Self {
        Self {
            aggregate_function: AggregateFunction::Max,
            aggregate_property: Some(property.into()),
        }
    }

    pub fn count() -> Self {
        Self {
            aggregate_function: AggregateFunction::Count,
            aggregate_property: None,
        }
    }

    /// 非空的聚合字段名
    pub fn property(&self) -> Option<&str> {
        self.aggregate_property
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}
