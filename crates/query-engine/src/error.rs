//! 查询引擎错误类型
//!
//! 所有错误都是同步、不可重试的：它们表示规则本身有误，或规则与记录结构不兼容。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("字段不存在: {field} (记录类型 {record_type})")]
    UnknownField { field: String, record_type: String },

    #[error("规则目标类型不匹配: 期望 {expected}, 实际 {actual}")]
    TargetTypeMismatch { expected: String, actual: String },

    #[error("定义了 GroupBy 时必须提供聚合定义")]
    MissingAggregation,

    #[error("{function} 聚合必须指定聚合字段")]
    MissingAggregateProperty { function: String },

    #[error("不支持的操作符: {0}")]
    UnsupportedOperator(String),

    #[error("操作符 {operator} 不支持字段 {field} 的类型 {field_type}")]
    OperatorTypeMismatch {
        operator: String,
        field: String,
        field_type: String,
    },

    #[error("操作符 {operator} 的参数无效: {reason}")]
    InvalidOperatorPayload { operator: String, reason: String },

    #[error("字段 {field} 类型转换失败: 期望 {expected}, 实际 {actual}")]
    TypeCoercion {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("缺少外部参数: {0}")]
    MissingExternalParameter(String),

    #[error("规则 {0} 输出为计数投影，不能参与合并执行")]
    ProjectionInUnion(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;

impl QueryError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownField { .. } => "UNKNOWN_FIELD",
            Self::TargetTypeMismatch { .. } => "TARGET_TYPE_MISMATCH",
            Self::MissingAggregation => "MISSING_AGGREGATION",
            Self::MissingAggregateProperty { .. } => "MISSING_AGGREGATE_PROPERTY",
            Self::UnsupportedOperator(_) => "UNSUPPORTED_OPERATOR",
            Self::OperatorTypeMismatch { .. } => "OPERATOR_TYPE_MISMATCH",
            Self::InvalidOperatorPayload { .. } => "INVALID_OPERATOR_PAYLOAD",
            Self::TypeCoercion { .. } => "TYPE_COERCION_ERROR",
            Self::MissingExternalParameter(_) => "MISSING_EXTERNAL_PARAMETER",
            Self::ProjectionInUnion(_) => "PROJECTION_IN_UNION",
        }
    }

    pub(crate) fn unknown_field(field: &str, record_type: &str) -> Self {
        Self::UnknownField {
            field: field.to_string(),
            record_type: record_type.to_string(),
        }
    }

    pub(crate) fn invalid_payload(operator: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidOperatorPayload {
            operator: operator.to_string(),
            reason: reason.into(),
        }
    }
}
