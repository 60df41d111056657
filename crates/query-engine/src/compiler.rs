//! 规则编译器
//!
//! 将条件树编译成一棵闭包树：每条规则只编译一次，之后对所有记录反复调用。
//! 字面量的类型转换、正则编译、外部参数解析都在编译期完成，运行期的谓词不会失败。

use crate::aggregation::{AggregationPlan, Aggregator, QueryOutput};
use crate::coercion::coerce_literal;
use crate::error::{QueryError, Result};
use crate::evaluator::ConditionEvaluator;
use crate::models::{Condition, ConditionGroup, ConditionValue, RuleDefinition};
use crate::operators::{LogicalOperator, Operator};
use crate::params::ExternalParams;
use crate::record::{FieldDescriptor, FieldGetter, FieldKind, FieldType, Record, RecordSchema};
use crate::validator::RuleValidator;
use crate::value::FieldValue;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument};

/// 编译后的谓词
pub type Predicate<R> = Box<dyn Fn(&R) -> bool + Send + Sync>;

fn predicate<R, F>(f: F) -> Predicate<R>
where
    F: Fn(&R) -> bool + Send + Sync + 'static,
{
    Box::new(f)
}

/// 谓词编译器
pub struct PredicateCompiler<'a, R: Record> {
    schema: &'static RecordSchema<R>,
    params: &'a ExternalParams,
}

impl<'a, R: Record> PredicateCompiler<'a, R> {
    pub fn new(params: &'a ExternalParams) -> Self {
        Self {
            schema: R::schema(),
            params,
        }
    }

    /// 编译条件组，空条件树编译为恒真谓词
    pub fn compile(&self, group: &ConditionGroup) -> Result<Predicate<R>> {
        Ok(self
            .compile_group(group)?
            .unwrap_or_else(|| predicate(|_: &R| true)))
    }

    /// 编译条件组
    ///
    /// 返回 `None` 表示该组不施加任何约束（没有条件，且子组也都为空）。
    /// 取反在组合之后进行。
    pub fn compile_group(&self, group: &ConditionGroup) -> Result<Option<Predicate<R>>> {
        let mut parts: Vec<Predicate<R>> =
            Vec::with_capacity(group.conditions.len() + group.groups.len());

        for condition in &group.conditions {
            parts.push(self.compile_condition(condition)?);
        }
        for child in &group.groups {
            if let Some(part) = self.compile_group(child)? {
                parts.push(part);
            }
        }

        let combined = match (parts.len(), group.logical_operator) {
            (0, _) => None,
            (1, _) => parts.pop(),
            (_, LogicalOperator::And) => Some(predicate(move |record: &R| {
                parts.iter().all(|part| part(record))
            })),
            (_, LogicalOperator::Or) => Some(predicate(move |record: &R| {
                parts.iter().any(|part| part(record))
            })),
        };

        Ok(match (combined, group.negate) {
            (combined, false) => combined,
            // 空组恒真，取反后恒假
            (None, true) => Some(predicate(|_: &R| false)),
            (Some(inner), true) => Some(predicate(move |record: &R| !inner(record))),
        })
    }

    /// 编译单个条件
    pub fn compile_condition(&self, condition: &Condition) -> Result<Predicate<R>> {
        let operator: Operator = condition.operator.parse()?;
        let field = self.schema.field(&condition.property).ok_or_else(|| {
            QueryError::unknown_field(&condition.property, self.schema.type_name())
        })?;

        debug!(
            field = field.name(),
            operator = %operator,
            dynamic = operator.is_dynamic(),
            value = %condition.value,
            "编译条件"
        );

        self.compile_operator(operator, field, condition)
    }

    fn compile_operator(
        &self,
        operator: Operator,
        field: &FieldDescriptor<R>,
        condition: &Condition,
    ) -> Result<Predicate<R>> {
        let getter = field.getter();
        let field_type = field.field_type();
        let name = field.name();
        let value = &condition.value;

        match operator {
            Operator::Equal | Operator::NotEqual => {
                let expected = coerce_literal(&value.to_value(), field_type, name)?;
                Ok(Self::equality(getter, expected, operator == Operator::NotEqual))
            }

            Operator::GreaterThan
            | Operator::GreaterThanOrEqual
            | Operator::LessThan
            | Operator::LessThanOrEqual => Self::ordered(operator, getter, field_type, name, value),

            Operator::In | Operator::NotIn => {
                let items = value
                    .as_array()
                    .ok_or_else(|| QueryError::invalid_payload(operator, "需要数组值"))?;
                let candidates = items
                    .iter()
                    .map(|item| coerce_literal(item, field_type, name))
                    .collect::<Result<Vec<_>>>()?;
                let negate = operator == Operator::NotIn;
                Ok(predicate(move |record: &R| {
                    ConditionEvaluator::in_list(&getter(record), &candidates) != negate
                }))
            }

            Operator::Contains | Operator::NotContains => {
                Self::require_kind(operator, name, field_type, &[FieldKind::Text, FieldKind::Sequence])?;
                let needle = Self::text_operand(operator, name, value)?;
                let negate = operator == Operator::NotContains;
                Ok(predicate(move |record: &R| {
                    ConditionEvaluator::contains(&getter(record), &needle) != negate
                }))
            }

            Operator::StartsWith => {
                Self::require_kind(operator, name, field_type, &[FieldKind::Text])?;
                let prefix = Self::text_operand(operator, name, value)?;
                Ok(predicate(move |record: &R| {
                    ConditionEvaluator::starts_with(&getter(record), &prefix)
                }))
            }

            Operator::EndsWith => {
                Self::require_kind(operator, name, field_type, &[FieldKind::Text])?;
                let suffix = Self::text_operand(operator, name, value)?;
                Ok(predicate(move |record: &R| {
                    ConditionEvaluator::ends_with(&getter(record), &suffix)
                }))
            }

            Operator::Null => Ok(predicate(move |record: &R| getter(record).is_null())),
            Operator::NotNull => Ok(predicate(move |record: &R| !getter(record).is_null())),

            Operator::Empty | Operator::NotEmpty => {
                let supported = field_type.nullable
                    || matches!(field_type.kind, FieldKind::Text | FieldKind::Sequence);
                if !supported {
                    return Err(Self::type_mismatch(operator, name, field_type));
                }
                let negate = operator == Operator::NotEmpty;
                Ok(predicate(move |record: &R| {
                    ConditionEvaluator::is_empty(&getter(record)) != negate
                }))
            }

            Operator::NullOrEmpty | Operator::NotNullOrEmpty => {
                let negate = operator == Operator::NotNullOrEmpty;
                Ok(predicate(move |record: &R| {
                    ConditionEvaluator::is_null_or_empty(&getter(record)) != negate
                }))
            }

            Operator::MustContainIfCountIsGreater
            | Operator::ContainIfCountIsGreater
            | Operator::ContainIfCountIsLess => Self::regex_count(operator, getter, value),

            Operator::If => self.implication(value),

            Operator::DynamicEqual => {
                let resolved = self.resolve_dynamic(condition)?;
                let expected = coerce_literal(&resolved, field_type, name)?;
                Ok(Self::equality(getter, expected, false))
            }

            Operator::DynamicEmpty
            | Operator::DynamicNotEmpty
            | Operator::DynamicNullOrEmpty
            | Operator::DynamicNotNullOrEmpty => {
                let resolved = self.resolve_dynamic(condition)?;
                let enabled = coerce_literal(&resolved, FieldType::of(FieldKind::Bool), name)?;
                let base = match operator {
                    Operator::DynamicEmpty => Operator::Empty,
                    Operator::DynamicNotEmpty => Operator::NotEmpty,
                    Operator::DynamicNullOrEmpty => Operator::NullOrEmpty,
                    _ => Operator::NotNullOrEmpty,
                };
                let check = self.compile_operator(base, field, condition)?;

                // 参数为 false 时该条件不施加约束
                if enabled == FieldValue::Bool(true) {
                    Ok(check)
                } else {
                    Ok(predicate(|_: &R| true))
                }
            }
        }
    }

    fn equality(getter: FieldGetter<R>, expected: FieldValue, negate: bool) -> Predicate<R> {
        predicate(move |record: &R| ConditionEvaluator::equals(&getter(record), &expected) != negate)
    }

    /// 有序比较；文本字段两侧都按十进制数比较
    fn ordered(
        operator: Operator,
        getter: FieldGetter<R>,
        field_type: FieldType,
        name: &str,
        value: &ConditionValue,
    ) -> Result<Predicate<R>> {
        debug_assert!(operator.is_ordered());
        match field_type.kind {
            FieldKind::Bool | FieldKind::Sequence => {
                Err(Self::type_mismatch(operator, name, field_type))
            }
            FieldKind::Text => {
                let expected = coerce_literal(&value.to_value(), FieldType::of(FieldKind::Decimal), name)?
                    .to_decimal()
                    .ok_or_else(|| QueryError::TypeCoercion {
                        field: name.to_string(),
                        expected: FieldKind::Decimal.to_string(),
                        actual: value.to_string(),
                    })?;
                Ok(predicate(move |record: &R| {
                    ConditionEvaluator::ordered_as_decimal(&getter(record), expected, operator)
                }))
            }
            _ => {
                let expected = coerce_literal(&value.to_value(), field_type, name)?;
                Ok(predicate(move |record: &R| {
                    ConditionEvaluator::ordered(&getter(record), &expected, operator)
                }))
            }
        }
    }

    /// 正则计数类操作符，参数 `{Target, Required?, Threshold}`
    fn regex_count(
        operator: Operator,
        getter: FieldGetter<R>,
        value: &ConditionValue,
    ) -> Result<Predicate<R>> {
        if value.as_object().is_none() {
            return Err(QueryError::invalid_payload(operator, "需要对象参数"));
        }

        let target = value
            .field("target")
            .and_then(Value::as_str)
            .ok_or_else(|| QueryError::invalid_payload(operator, "缺少 Target"))?;
        let pattern = Regex::new(target).map_err(|e| {
            QueryError::invalid_payload(operator, format!("无效的正则表达式 '{}': {}", target, e))
        })?;
        let threshold = value
            .field("threshold")
            .and_then(threshold_value)
            .ok_or_else(|| QueryError::invalid_payload(operator, "缺少数值类型的 Threshold"))?;

        match operator {
            Operator::MustContainIfCountIsGreater => {
                let required = value
                    .field("required")
                    .and_then(Value::as_str)
                    .ok_or_else(|| QueryError::invalid_payload(operator, "缺少 Required"))?
                    .to_string();
                Ok(predicate(move |record: &R| {
                    let field = getter(record);
                    ConditionEvaluator::count_matches(&field, &pattern) as f64 > threshold
                        && ConditionEvaluator::contains_ignore_case(&field, &required)
                }))
            }
            Operator::ContainIfCountIsGreater => Ok(predicate(move |record: &R| {
                ConditionEvaluator::count_matches(&getter(record), &pattern) as f64 > threshold
            })),
            _ => Ok(predicate(move |record: &R| {
                (ConditionEvaluator::count_matches(&getter(record), &pattern) as f64) < threshold
            })),
        }
    }

    /// `if` 操作符：Check 成立时结果取决于 Then，否则恒真
    fn implication(&self, value: &ConditionValue) -> Result<Predicate<R>> {
        if value.as_object().is_none() {
            return Err(QueryError::invalid_payload(Operator::If, "需要对象参数 {Check, Then}"));
        }

        let check = self.compile_condition(&nested_condition(value, "check")?)?;
        let then = self.compile_condition(&nested_condition(value, "then")?)?;

        Ok(predicate(move |record: &R| !check(record) || then(record)))
    }

    /// 解析动态操作符的比较值：字面量优先，否则按字段名查外部参数
    fn resolve_dynamic(&self, condition: &Condition) -> Result<Value> {
        if !condition.value.is_null() {
            return Ok(condition.value.to_value());
        }

        self.params
            .get(&condition.property)
            .cloned()
            .ok_or_else(|| QueryError::MissingExternalParameter(condition.property.clone()))
    }

    fn text_operand(operator: Operator, field: &str, value: &ConditionValue) -> Result<String> {
        match coerce_literal(&value.to_value(), FieldType::of(FieldKind::Text), field)? {
            FieldValue::Text(s) => Ok(s),
            _ => Err(QueryError::invalid_payload(operator, "缺少比较值")),
        }
    }

    fn require_kind(
        operator: Operator,
        field: &str,
        field_type: FieldType,
        allowed: &[FieldKind],
    ) -> Result<()> {
        if allowed.contains(&field_type.kind) {
            Ok(())
        } else {
            Err(Self::type_mismatch(operator, field, field_type))
        }
    }

    fn type_mismatch(operator: Operator, field: &str, field_type: FieldType) -> QueryError {
        QueryError::OperatorTypeMismatch {
            operator: operator.to_string(),
            field: field.to_string(),
            field_type: field_type.to_string(),
        }
    }
}

fn threshold_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 从 `if` 参数中取出嵌套条件，`Property`/`Operator`/`Value` 忽略大小写
fn nested_condition(payload: &ConditionValue, key: &str) -> Result<Condition> {
    let nested = payload
        .field(key)
        .cloned()
        .map(ConditionValue::from)
        .ok_or_else(|| QueryError::invalid_payload(Operator::If, format!("缺少 {}", key)))?;

    let text = |name: &str| {
        nested.field(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                QueryError::invalid_payload(Operator::If, format!("{} 缺少 {}", key, name))
            })
    };

    Ok(Condition {
        property: text("property")?,
        operator: text("operator")?,
        value: nested
            .field("value")
            .cloned()
            .map(ConditionValue::from)
            .unwrap_or_default(),
    })
}

/// 编译后的规则
///
/// 校验、谓词编译、分组键结构解析都在构造时完成，之后可对任意批次的记录反复执行。
pub struct CompiledRule<R: Record> {
    name: String,
    predicate: Option<Predicate<R>>,
    plan: Option<AggregationPlan<R>>,
}

impl<R: Record> CompiledRule<R> {
    #[instrument(skip_all, fields(rule = %rule.name))]
    pub fn compile(rule: &RuleDefinition, params: &ExternalParams) -> Result<Self> {
        RuleValidator::validate::<R>(rule)?;

        let compiler = PredicateCompiler::<R>::new(params);
        let predicate = match &rule.conditions {
            Some(group) => compiler.compile_group(group)?,
            None => None,
        };

        let plan = Aggregator::plan::<R>(&rule.group_by, rule.aggregation.as_ref())?;

        debug!(
            filtered = predicate.is_some(),
            grouped = plan.is_some(),
            "规则编译完成"
        );

        Ok(Self {
            name: rule.name.clone(),
            predicate,
            plan,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 记录是否满足条件树
    pub fn matches(&self, record: &R) -> bool {
        self.predicate
            .as_ref()
            .is_none_or(|predicate| predicate(record))
    }

    /// 输出是否为计数投影（形状与输入记录不同）
    pub fn is_projection(&self) -> bool {
        self.plan.as_ref().is_some_and(AggregationPlan::is_projection)
    }

    /// 过滤并聚合
    pub fn apply<I>(&self, records: I) -> QueryOutput<R>
    where
        I: IntoIterator<Item = R>,
    {
        let filtered = records
            .into_iter()
            .filter(|record| self.matches(record))
            .collect();
        self.finish(filtered)
    }

    /// 不消耗输入，匹配的记录被克隆到输出中
    pub fn apply_to(&self, records: &[R]) -> QueryOutput<R>
    where
        R: Clone,
    {
        let filtered = records
            .iter()
            .filter(|record| self.matches(record))
            .cloned()
            .collect();
        self.finish(filtered)
    }

    fn finish(&self, filtered: Vec<R>) -> QueryOutput<R> {
        match &self.plan {
            Some(plan) => plan.apply(filtered),
            None => QueryOutput::Records(filtered),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::User;
    use serde_json::json;

    fn users() -> Vec<User> {
        vec![
            User::new(1, "Ada", "X")
                .with_salary(10)
                .with_email("ada@example.com")
                .with_employee_code("00042")
                .with_tags(["lead"]),
            User::new(2, "Bob", "X").with_salary(20).with_employee_code("9"),
            User::new(3, "Cyd", "Y")
                .with_salary(30)
                .with_age(41)
                .with_employee_code("100")
                .with_bio("banana bread"),
        ]
    }

    fn compile(condition: Condition) -> Result<Predicate<User>> {
        let params = ExternalParams::new();
        PredicateCompiler::<User>::new(&params).compile(&ConditionGroup::and(vec![condition]))
    }

    fn ids(predicate: &Predicate<User>) -> Vec<i64> {
        users()
            .iter()
            .filter(|&user| predicate(user))
            .map(|user| user.id)
            .collect()
    }

    #[test]
    fn test_equal_and_not_equal() {
        let equal = compile(Condition::new("department", "Equal", "X")).unwrap();
        let not_equal = compile(Condition::new("department", "NOTEQUAL", "X")).unwrap();
        assert_eq!(ids(&equal), vec![1, 2]);
        assert_eq!(ids(&not_equal), vec![3]);
    }

    #[test]
    fn test_numeric_literal_coerced_to_decimal() {
        let predicate = compile(Condition::new("Salary", "greaterthanorequal", "20")).unwrap();
        assert_eq!(ids(&predicate), vec![2, 3]);

        let predicate = compile(Condition::new("Salary", "lessthan", 20.5)).unwrap();
        assert_eq!(ids(&predicate), vec![1, 2]);
    }

    #[test]
    fn test_text_field_compared_numerically() {
        let predicate = compile(Condition::new("EmployeeCode", "greaterthan", 10)).unwrap();
        assert_eq!(ids(&predicate), vec![1, 3]);
    }

    #[test]
    fn test_ordered_on_bool_rejected() {
        let err = compile(Condition::new("IsActive", "greaterthan", true)).err().unwrap();
        assert_eq!(err.code(), "OPERATOR_TYPE_MISMATCH");
    }

    #[test]
    fn test_in_and_not_in() {
        let in_list = compile(Condition::new("Department", "in", json!(["Y", "Z"]))).unwrap();
        let not_in = compile(Condition::new("Department", "notin", json!(["Y", "Z"]))).unwrap();
        assert_eq!(ids(&in_list), vec![3]);
        assert_eq!(ids(&not_in), vec![1, 2]);

        let empty = compile(Condition::new("Department", "in", json!([]))).unwrap();
        assert!(ids(&empty).is_empty());
    }

    #[test]
    fn test_in_requires_array() {
        let err = compile(Condition::new("Department", "in", "X")).err().unwrap();
        assert_eq!(err.code(), "INVALID_OPERATOR_PAYLOAD");
    }

    #[test]
    fn test_string_operators() {
        assert_eq!(ids(&compile(Condition::new("Name", "startswith", "A")).unwrap()), vec![1]);
        assert_eq!(ids(&compile(Condition::new("Name", "endswith", "b")).unwrap()), vec![2]);
        assert_eq!(ids(&compile(Condition::new("Bio", "contains", "bread")).unwrap()), vec![3]);
        assert_eq!(
            ids(&compile(Condition::new("Bio", "notcontains", "bread")).unwrap()),
            vec![1, 2]
        );
        assert_eq!(ids(&compile(Condition::new("Tags", "contains", "lead")).unwrap()), vec![1]);
    }

    #[test]
    fn test_string_operator_on_number_rejected() {
        let err = compile(Condition::new("Salary", "startswith", "1")).err().unwrap();
        assert!(matches!(err, QueryError::OperatorTypeMismatch { ref field, .. } if field == "Salary"));
    }

    #[test]
    fn test_null_and_empty() {
        assert_eq!(ids(&compile(Condition::new("Email", "null", Value::Null)).unwrap()), vec![2, 3]);
        assert_eq!(ids(&compile(Condition::new("Email", "notnull", Value::Null)).unwrap()), vec![1]);
        assert_eq!(ids(&compile(Condition::new("Bio", "empty", Value::Null)).unwrap()), vec![1, 2]);
        assert_eq!(ids(&compile(Condition::new("Tags", "notempty", Value::Null)).unwrap()), vec![1]);
        assert_eq!(ids(&compile(Condition::new("Age", "empty", Value::Null)).unwrap()), vec![1, 2]);
        assert_eq!(
            ids(&compile(Condition::new("Email", "notnullorempty", Value::Null)).unwrap()),
            vec![1]
        );
    }

    #[test]
    fn test_empty_on_plain_scalar_rejected() {
        let err = compile(Condition::new("Salary", "empty", Value::Null)).err().unwrap();
        assert_eq!(err.code(), "OPERATOR_TYPE_MISMATCH");
    }

    #[test]
    fn test_regex_count_operators() {
        let greater = compile(Condition::new(
            "Bio",
            "containifcountisgreater",
            json!({ "Target": "a", "Threshold": 3 }),
        ))
        .unwrap();
        assert_eq!(ids(&greater), vec![3]);

        let less = compile(Condition::new(
            "Bio",
            "containifcountisless",
            json!({ "target": "a", "threshold": "1" }),
        ))
        .unwrap();
        assert_eq!(ids(&less), vec![1, 2]);

        let must = compile(Condition::new(
            "Bio",
            "mustcontainifcountisgreater",
            json!({ "Target": "a", "Required": "BREAD", "Threshold": 1 }),
        ))
        .unwrap();
        assert_eq!(ids(&must), vec![3]);
    }

    #[test]
    fn test_regex_payload_errors() {
        let err = compile(Condition::new(
            "Bio",
            "mustcontainifcountisgreater",
            json!({ "Target": "a", "Threshold": 1 }),
        ))
        .err().unwrap();
        assert_eq!(err.code(), "INVALID_OPERATOR_PAYLOAD");

        let err = compile(Condition::new(
            "Bio",
            "containifcountisgreater",
            json!({ "Target": "(", "Threshold": 1 }),
        ))
        .err().unwrap();
        assert_eq!(err.code(), "INVALID_OPERATOR_PAYLOAD");

        let err = compile(Condition::new("Bio", "containifcountisless", "a")).err().unwrap();
        assert_eq!(err.code(), "INVALID_OPERATOR_PAYLOAD");
    }

    #[test]
    fn test_if_is_implication() {
        // 部门为 X 时工资必须大于 15，其他部门不受约束
        let predicate = compile(Condition::new(
            "Department",
            "if",
            json!({
                "Check": { "Property": "Department", "Operator": "equal", "Value": "X" },
                "Then": { "property": "Salary", "operator": "greaterthan", "value": 15 }
            }),
        ))
        .unwrap();
        assert_eq!(ids(&predicate), vec![2, 3]);
    }

    #[test]
    fn test_if_nested_errors_abort() {
        let err = compile(Condition::new(
            "Department",
            "if",
            json!({
                "Check": { "Property": "Department", "Operator": "like", "Value": "X" },
                "Then": { "Property": "Salary", "Operator": "equal", "Value": 1 }
            }),
        ))
        .err().unwrap();
        assert!(matches!(err, QueryError::UnsupportedOperator(_)));

        let err = compile(Condition::new(
            "Department",
            "if",
            json!({ "Check": { "Property": "Department", "Operator": "equal" } }),
        ))
        .err().unwrap();
        assert_eq!(err.code(), "INVALID_OPERATOR_PAYLOAD");
    }

    #[test]
    fn test_dynamic_equal_uses_external_parameter() {
        let condition = Condition::new("Department", "dynamicequal", Value::Null);
        let group = ConditionGroup::and(vec![condition]);

        let params = ExternalParams::new().with("department", "Y");
        let predicate = PredicateCompiler::<User>::new(&params).compile(&group).unwrap();
        assert_eq!(ids(&predicate), vec![3]);

        let empty = ExternalParams::new();
        let err = PredicateCompiler::<User>::new(&empty)
            .compile(&group)
            .err()
            .unwrap();
        assert!(matches!(err, QueryError::MissingExternalParameter(ref name) if name == "Department"));
    }

    #[test]
    fn test_dynamic_literal_takes_precedence() {
        let predicate = compile(Condition::new("Department", "dynamicequal", "X")).unwrap();
        assert_eq!(ids(&predicate), vec![1, 2]);
    }

    #[test]
    fn test_dynamic_emptiness_switch() {
        let group = ConditionGroup::and(vec![Condition::new("Email", "dynamicnotempty", Value::Null)]);

        let on = ExternalParams::new().with("Email", true);
        let predicate = PredicateCompiler::<User>::new(&on).compile(&group).unwrap();
        assert_eq!(ids(&predicate), vec![1]);

        let off = ExternalParams::new().with("Email", "false");
        let predicate = PredicateCompiler::<User>::new(&off).compile(&group).unwrap();
        assert_eq!(ids(&predicate), vec![1, 2, 3]);
    }

    #[test]
    fn test_dynamic_emptiness_missing_parameter() {
        let group = ConditionGroup::and(vec![Condition::new("Email", "dynamicempty", Value::Null)]);

        let params = ExternalParams::new();
        let err = PredicateCompiler::<User>::new(&params)
            .compile(&group)
            .err()
            .unwrap();
        assert!(matches!(err, QueryError::MissingExternalParameter(ref name) if name == "Email"));
    }

    #[test]
    fn test_dynamic_emptiness_non_boolean_parameter() {
        let group = ConditionGroup::and(vec![Condition::new("Email", "dynamicnotempty", Value::Null)]);

        let params = ExternalParams::new().with("email", "sometimes");
        let err = PredicateCompiler::<User>::new(&params)
            .compile(&group)
            .err()
            .unwrap();
        assert_eq!(err.code(), "TYPE_COERCION_ERROR");

        let params = ExternalParams::new().with("Email", 1);
        let err = PredicateCompiler::<User>::new(&params)
            .compile(&group)
            .err()
            .unwrap();
        assert!(matches!(err, QueryError::TypeCoercion { ref field, .. } if field == "Email"));
    }

    #[test]
    fn test_unsupported_operator() {
        let err = compile(Condition::new("Name", "like", "A%")).err().unwrap();
        assert!(matches!(err, QueryError::UnsupportedOperator(ref op) if op == "like"));
    }

    #[test]
    fn test_groups_and_negation() {
        let params = ExternalParams::new();
        let compiler = PredicateCompiler::<User>::new(&params);

        let group = ConditionGroup::or(vec![
            Condition::new("Name", "equal", "Ada"),
            Condition::new("Salary", "greaterthan", 25),
        ]);
        let predicate = compiler.compile(&group).unwrap();
        assert_eq!(ids(&predicate), vec![1, 3]);

        let predicate = compiler.compile(&group.clone().negated()).unwrap();
        assert_eq!(ids(&predicate), vec![2]);
    }

    #[test]
    fn test_empty_groups_are_no_ops() {
        let params = ExternalParams::new();
        let compiler = PredicateCompiler::<User>::new(&params);

        // 空子组既不会让 OR 恒真，也不会让 AND 恒假
        let group = ConditionGroup::or(vec![Condition::new("Name", "equal", "Ada")])
            .with_group(ConditionGroup::and(vec![]));
        assert_eq!(ids(&compiler.compile(&group).unwrap()), vec![1]);

        let group = ConditionGroup::and(vec![]).with_group(ConditionGroup::or(vec![]));
        assert!(compiler.compile_group(&group).unwrap().is_none());
        assert_eq!(ids(&compiler.compile(&group).unwrap()), vec![1, 2, 3]);

        let negated = ConditionGroup::and(vec![]).negated();
        assert!(ids(&compiler.compile(&negated).unwrap()).is_empty());
    }

    #[test]
    fn test_compiled_rule_without_conditions_matches_all() {
        let rule = RuleDefinition::new("all");
        let compiled = CompiledRule::<User>::compile(&rule, &ExternalParams::new()).unwrap();
        assert_eq!(compiled.name(), "all");
        assert_eq!(compiled.apply(users()).len(), 3);
        assert!(!compiled.is_projection());
    }
}
