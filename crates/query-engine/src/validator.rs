//! 规则结构校验
//!
//! 在编译之前检查规则引用的字段是否存在于目标记录类型上，以及分组与聚合配置是否一致。
//! 纯检查，无副作用。

use crate::error::{QueryError, Result};
use crate::models::{ConditionGroup, RuleDefinition};
use crate::record::{Record, RecordSchema};
use tracing::instrument;

/// 规则校验器
pub struct RuleValidator;

impl RuleValidator {
    /// 校验规则是否适用于记录类型 `R`
    #[instrument(skip_all, fields(rule = %rule.name, record_type = R::schema().type_name()))]
    pub fn validate<R: Record>(rule: &RuleDefinition) -> Result<()> {
        Self::validate_against(rule, R::schema())
    }

    pub fn validate_against<R>(rule: &RuleDefinition, schema: &RecordSchema<R>) -> Result<()> {
        let target_type = rule.target_type.trim();
        if !target_type.is_empty() && !target_type.eq_ignore_ascii_case(schema.type_name()) {
            return Err(QueryError::TargetTypeMismatch {
                expected: rule.target_type.clone(),
                actual: schema.type_name().to_string(),
            });
        }

        if let Some(group) = &rule.conditions {
            Self::validate_group(group, schema)?;
        }

        for field in &rule.group_by {
            Self::require_field(field, schema)?;
        }

        if !rule.group_by.is_empty() && rule.aggregation.is_none() {
            return Err(QueryError::MissingAggregation);
        }

        if let Some(aggregation) = &rule.aggregation {
            match aggregation.property() {
                Some(property) => Self::require_field(property, schema)?,
                None if aggregation.aggregate_function.requires_property() => {
                    return Err(QueryError::MissingAggregateProperty {
                        function: aggregation.aggregate_function.to_string(),
                    });
                }
                None => {}
            }
        }

        Ok(())
    }

    /// 递归校验条件组
    fn validate_group<R>(group: &ConditionGroup, schema: &RecordSchema<R>) -> Result<()> {
        for condition in &group.conditions {
            Self::require_field(&condition.property, schema)?;
        }

        for child in &group.groups {
            Self::validate_group(child, schema)?;
        }

        Ok(())
    }

    fn require_field<R>(field: &str, schema: &RecordSchema<R>) -> Result<()> {
        if schema.contains(field) {
            Ok(())
        } else {
            Err(QueryError::unknown_field(field, schema.type_name()))
        }
    }
}
