//! 动态规则查询引擎
//!
//! 将声明式规则（条件树 + 可选的分组聚合）编译为对内存记录集合的类型化查询：
//! - JSON 规则定义和结构校验
//! - 条件树编译为闭包谓词，编译期解析字段与操作数
//! - 单字段/复合键分组，Min/Max/Count 聚合
//! - 单规则执行与多规则合并去重
//! - HTTP 评估接口

pub mod aggregation;
pub mod coercion;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod grouping;
pub mod http;
pub mod models;
pub mod operators;
pub mod params;
pub mod record;
pub mod records;
pub mod validator;
pub mod value;

pub use aggregation::{Aggregator, GroupCount, QueryOutput};
pub use compiler::{CompiledRule, Predicate, PredicateCompiler};
pub use error::{QueryError, Result};
pub use executor::RuleExecutor;
pub use grouping::{GroupKey, GroupKeySynthesizer};
pub use models::{
    AggregateFunction, AggregationDefinition, Condition, ConditionGroup, ConditionValue,
    RuleDefinition,
};
pub use operators::{LogicalOperator, Operator};
pub use params::ExternalParams;
pub use record::{FieldKind, FieldType, Record, RecordSchema};
pub use records::User;
pub use validator::RuleValidator;
pub use value::FieldValue;
