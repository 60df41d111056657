//! 分组聚合
//!
//! 对过滤后的记录按分组键分区，每组取 Min/Max 代表记录，或投影为 (分组键, 数量)。
//! 分组按首次出现的顺序输出。

use crate::error::{QueryError, Result};
use crate::grouping::{GroupKey, GroupKeySynthesizer, KeyShape};
use crate::models::{AggregateFunction, AggregationDefinition};
use crate::record::{FieldGetter, Record};
use crate::value::FieldValue;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// 规则执行结果
///
/// 序列化为 `{ "kind": "records" | "counts", "items": [...] }`，边界层据此区分两种形状。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum QueryOutput<R> {
    /// 与输入同形状的记录（过滤结果或 Min/Max 代表记录）
    Records(Vec<R>),
    /// Count 投影
    Counts(Vec<GroupCount>),
}

impl<R> QueryOutput<R> {
    pub fn len(&self) -> usize {
        match self {
            Self::Records(records) => records.len(),
            Self::Counts(counts) => counts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Option<&[R]> {
        match self {
            Self::Records(records) => Some(records),
            Self::Counts(_) => None,
        }
    }

    pub fn counts(&self) -> Option<&[GroupCount]> {
        match self {
            Self::Counts(counts) => Some(counts),
            Self::Records(_) => None,
        }
    }

    pub fn into_records(self) -> Option<Vec<R>> {
        match self {
            Self::Records(records) => Some(records),
            Self::Counts(_) => None,
        }
    }
}

/// 分组计数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCount {
    pub group_key: GroupKey,
    pub count: usize,
}

enum Reduction<R> {
    Count,
    Min(FieldGetter<R>),
    Max(FieldGetter<R>),
}

/// 聚合计划：键结构与聚合字段在构建时解析完毕
pub struct AggregationPlan<R> {
    shape: Arc<KeyShape>,
    reduction: Reduction<R>,
}

impl<R: Record> AggregationPlan<R> {
    pub fn build(group_by: &[String], aggregation: &AggregationDefinition) -> Result<Self> {
        let shape = GroupKeySynthesizer::shape_for::<R>(group_by)?;

        let reduction = match aggregation.aggregate_function {
            AggregateFunction::Count => Reduction::Count,
            function => {
                let property = aggregation.property().ok_or_else(|| {
                    QueryError::MissingAggregateProperty {
                        function: function.to_string(),
                    }
                })?;
                let schema = R::schema();
                let getter = schema
                    .field(property)
                    .ok_or_else(|| QueryError::unknown_field(property, schema.type_name()))?
                    .getter();

                if function == AggregateFunction::Min {
                    Reduction::Min(getter)
                } else {
                    Reduction::Max(getter)
                }
            }
        };

        Ok(Self { shape, reduction })
    }

    /// 输出是否为计数投影
    pub fn is_projection(&self) -> bool {
        matches!(self.reduction, Reduction::Count)
    }

    pub fn apply(&self, records: Vec<R>) -> QueryOutput<R> {
        match self.reduction {
            Reduction::Count => QueryOutput::Counts(self.count(&records)),
            Reduction::Min(getter) => QueryOutput::Records(self.select(records, getter, Ordering::Less)),
            Reduction::Max(getter) => {
                QueryOutput::Records(self.select(records, getter, Ordering::Greater))
            }
        }
    }

    fn count(&self, records: &[R]) -> Vec<GroupCount> {
        let mut slots: HashMap<GroupKey, usize> = HashMap::new();
        let mut counts: Vec<GroupCount> = Vec::new();

        for record in records {
            let key = self.shape.key_for(record);
            match slots.get(&key) {
                Some(&slot) => counts[slot].count += 1,
                None => {
                    slots.insert(key.clone(), counts.len());
                    counts.push(GroupCount {
                        group_key: key,
                        count: 1,
                    });
                }
            }
        }

        counts
    }

    /// 每组选出聚合字段最优的记录
    ///
    /// 只有严格更优才替换当前候选，平局时保留输入顺序中最先出现的记录。
    fn select(&self, records: Vec<R>, getter: FieldGetter<R>, preferred: Ordering) -> Vec<R> {
        let mut slots: HashMap<GroupKey, usize> = HashMap::new();
        let mut winners: Vec<(usize, FieldValue)> = Vec::new();

        for (position, record) in records.iter().enumerate() {
            let key = self.shape.key_for(record);
            let value = getter(record);
            match slots.get(&key) {
                Some(&slot) => {
                    let (best, best_value) = &mut winners[slot];
                    if value.aggregate_cmp(best_value) == preferred {
                        *best = position;
                        *best_value = value;
                    }
                }
                None => {
                    slots.insert(key, winners.len());
                    winners.push((position, value));
                }
            }
        }

        let mut records: Vec<Option<R>> = records.into_iter().map(Some).collect();
        winners
            .into_iter()
            .filter_map(|(position, _)| records[position].take())
            .collect()
    }
}

/// 分组聚合器
pub struct Aggregator;

impl Aggregator {
    /// 解析规则的聚合计划
    ///
    /// 没有分组字段或没有聚合定义时返回 `None`，过滤结果原样输出。
    pub fn plan<R: Record>(
        group_by: &[String],
        aggregation: Option<&AggregationDefinition>,
    ) -> Result<Option<AggregationPlan<R>>> {
        match aggregation {
            Some(aggregation) if !group_by.is_empty() => {
                AggregationPlan::build(group_by, aggregation).map(Some)
            }
            Some(aggregation) => {
                warn!(
                    function = %aggregation.aggregate_function,
                    "未配置 GroupBy，忽略聚合定义"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
