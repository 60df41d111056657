//! 规则操作符定义

use crate::error::QueryError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 条件操作符
///
/// 规则中以字符串出现，匹配时忽略大小写。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // 通用比较
    Equal,
    NotEqual,

    // 有序比较（文本字段按十进制数比较）
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,

    // 集合
    In,
    NotIn,

    // 字符串操作
    Contains,
    NotContains,
    StartsWith,
    EndsWith,

    // 空值检查
    Null,
    NotNull,
    Empty,
    NotEmpty,
    NullOrEmpty,
    NotNullOrEmpty,

    // 正则计数
    MustContainIfCountIsGreater,
    ContainIfCountIsGreater,
    ContainIfCountIsLess,

    // 条件蕴含
    If,

    // 外部参数
    DynamicEqual,
    DynamicEmpty,
    DynamicNotEmpty,
    DynamicNullOrEmpty,
    DynamicNotNullOrEmpty,
}

impl Operator {
    pub const ALL: [Operator; 27] = [
        Self::Equal,
        Self::NotEqual,
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::In,
        Self::NotIn,
        Self::Contains,
        Self::NotContains,
        Self::StartsWith,
        Self::EndsWith,
        Self::Null,
        Self::NotNull,
        Self::Empty,
        Self::NotEmpty,
        Self::NullOrEmpty,
        Self::NotNullOrEmpty,
        Self::MustContainIfCountIsGreater,
        Self::ContainIfCountIsGreater,
        Self::ContainIfCountIsLess,
        Self::If,
        Self::DynamicEqual,
        Self::DynamicEmpty,
        Self::DynamicNotEmpty,
        Self::DynamicNullOrEmpty,
        Self::DynamicNotNullOrEmpty,
    ];

    /// 规则中使用的名称（小写）
    pub fn name(&self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "notequal",
            Self::GreaterThan => "greaterthan",
            Self::GreaterThanOrEqual => "greaterthanorequal",
            Self::LessThan => "lessthan",
            Self::LessThanOrEqual => "lessthanorequal",
            Self::In => "in",
            Self::NotIn => "notin",
            Self::Contains => "contains",
            Self::NotContains => "notcontains",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::Null => "null",
            Self::NotNull => "notnull",
            Self::Empty => "empty",
            Self::NotEmpty => "notempty",
            Self::NullOrEmpty => "nullorempty",
            Self::NotNullOrEmpty => "notnullorempty",
            Self::MustContainIfCountIsGreater => "mustcontainifcountisgreater",
            Self::ContainIfCountIsGreater => "containifcountisgreater",
            Self::ContainIfCountIsLess => "containifcountisless",
            Self::If => "if",
            Self::DynamicEqual => "dynamicequal",
            Self::DynamicEmpty => "dynamicempty",
            Self::DynamicNotEmpty => "dynamicnotempty",
            Self::DynamicNullOrEmpty => "dynamicnullorempty",
            Self::DynamicNotNullOrEmpty => "dynamicnotnullorempty",
        }
    }

    /// 有序比较操作符：文本字段会按十进制数解析后比较
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            Self::GreaterThan | Self::GreaterThanOrEqual | Self::LessThan | Self::LessThanOrEqual
        )
    }

    /// 比较值来自外部参数的操作符
    pub fn is_dynamic(&self) -> bool {
        matches!(
            self,
            Self::DynamicEqual
                | Self::DynamicEmpty
                | Self::DynamicNotEmpty
                | Self::DynamicNullOrEmpty
                | Self::DynamicNotNullOrEmpty
        )
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.name() == lowered)
            .ok_or_else(|| QueryError::UnsupportedOperator(s.to_string()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 逻辑操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl FromStr for LogicalOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("and") {
            Ok(Self::And)
        } else if s.trim().eq_ignore_ascii_case("or") {
            Ok(Self::Or)
        } else {
            Err(format!("未知的逻辑操作符: {}", s))
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

impl Serialize for LogicalOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LogicalOperator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
