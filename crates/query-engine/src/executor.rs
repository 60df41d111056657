//! 规则执行器
//!
//! 单条规则：校验 → 编译 → 过滤 →（分组聚合）→ 物化。
//! 多条规则：各自独立执行后合并，按值去重。

use crate::aggregation::QueryOutput;
use crate::compiler::CompiledRule;
use crate::error::{QueryError, Result};
use crate::models::RuleDefinition;
use crate::params::ExternalParams;
use crate::record::Record;
use std::collections::HashSet;
use std::hash::Hash;
use std::time::Instant;
use tracing::{debug, instrument};

/// 规则执行器
///
/// 无状态，可在多个线程间共享。
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleExecutor;

impl RuleExecutor {
    pub fn new() -> Self {
        Self
    }

    /// 编译规则，供同一规则多次执行时复用
    pub fn compile<R: Record>(
        &self,
        rule: &RuleDefinition,
        params: &ExternalParams,
    ) -> Result<CompiledRule<R>> {
        CompiledRule::compile(rule, params)
    }

    /// 执行单条规则
    #[instrument(
        skip_all,
        fields(rule = %rule.name, record_type = R::schema().type_name(), input = records.len())
    )]
    pub fn execute<R: Record + Clone>(
        &self,
        records: &[R],
        rule: &RuleDefinition,
        params: &ExternalParams,
    ) -> Result<QueryOutput<R>> {
        let start = Instant::now();

        let result = self
            .compile::<R>(rule, params)
            .map(|compiled| compiled.apply_to(records));

        record_execution("execute", &result, start);

        if let Ok(output) = &result {
            debug!(output = output.len(), "规则执行完成");
        }
        result
    }

    /// 执行多条规则并合并结果
    ///
    /// 每条规则独立作用于同一输入，合并后按值去重，保留首次出现的顺序。
    /// 所有规则先全部编译，任何一条出错则整体失败，不返回部分结果。
    #[instrument(
        skip_all,
        fields(rules = rules.len(), record_type = R::schema().type_name(), input = records.len())
    )]
    pub fn execute_all<R>(
        &self,
        records: &[R],
        rules: &[RuleDefinition],
        params: &ExternalParams,
    ) -> Result<Vec<R>>
    where
        R: Record + Clone + Eq + Hash,
    {
        let start = Instant::now();
        let result = self.union(records, rules, params);
        record_execution("execute_all", &result, start);

        if let Ok(merged) = &result {
            debug!(output = merged.len(), "合并执行完成");
        }
        result
    }

    fn union<R>(
        &self,
        records: &[R],
        rules: &[RuleDefinition],
        params: &ExternalParams,
    ) -> Result<Vec<R>>
    where
        R: Record + Clone + Eq + Hash,
    {
        let compiled = rules
            .iter()
            .map(|rule| {
                let compiled = self.compile::<R>(rule, params)?;
                if compiled.is_projection() {
                    return Err(QueryError::ProjectionInUnion(rule.name.clone()));
                }
                Ok(compiled)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut seen: HashSet<R> = HashSet::new();
        let mut merged: Vec<R> = Vec::new();

        for rule in &compiled {
            let matched = rule
                .apply_to(records)
                .into_records()
                .ok_or_else(|| QueryError::ProjectionInUnion(rule.name().to_string()))?;

            for record in matched {
                if seen.insert(record.clone()) {
                    merged.push(record);
                }
            }
        }

        Ok(merged)
    }
}

fn record_execution<T>(operation: &'static str, result: &Result<T>, start: Instant) {
    let status = match result {
        Ok(_) => "success",
        Err(e) => e.code(),
    };

    metrics::counter!(
        "rule_executions_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);

    metrics::histogram!(
        "rule_execution_duration_seconds",
        "operation" => operation
    )
    .record(start.elapsed().as_secs_f64());
}
