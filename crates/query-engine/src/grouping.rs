//! 分组键合成
//!
//! 单字段分组直接使用字段值作为键；多字段分组使用按字段顺序排列的 (名称, 值) 复合键。
//! 字段名列表到键结构（字段下标）的解析结果在进程内全局缓存，同一组字段只解析一次。

use crate::error::{QueryError, Result};
use crate::record::Record;
use crate::value::FieldValue;
use dashmap::DashMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// 全局键结构缓存：记录类型 + 规范化字段名列表 → 键结构
static SHAPE_CACHE: LazyLock<DashMap<ShapeCacheKey, Arc<KeyShape>>> = LazyLock::new(DashMap::new);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ShapeCacheKey {
    record_type: TypeId,
    /// 小写、去空白，保持原顺序
    fields: Vec<String>,
}

impl ShapeCacheKey {
    fn new<R: Record>(fields: &[String]) -> Self {
        Self {
            record_type: TypeId::of::<R>(),
            fields: fields
                .iter()
                .map(|field| field.trim().to_lowercase())
                .collect(),
        }
    }
}

/// 复合键的一个分量
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPart {
    pub name: &'static str,
    pub value: FieldValue,
}

/// 分组键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Single(FieldValue),
    Composite(Vec<KeyPart>),
}

impl GroupKey {
    /// 按字段名取键分量（忽略大小写）；单字段键直接返回其值
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        match self {
            Self::Single(value) => Some(value),
            Self::Composite(parts) => parts
                .iter()
                .find(|part| part.name.eq_ignore_ascii_case(name))
                .map(|part| &part.value),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(value) => write!(f, "{}", value),
            Self::Composite(parts) => {
                write!(f, "{{")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", part.name, part.value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// 单字段键序列化为值本身，复合键序列化为有序对象
impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Single(value) => value.serialize(serializer),
            Self::Composite(parts) => {
                let mut map = serializer.serialize_map(Some(parts.len()))?;
                for part in parts {
                    map.serialize_entry(part.name, &part.value)?;
                }
                map.end()
            }
        }
    }
}

/// 键结构：已解析的分组字段（声明名 + 字段下标）
#[derive(Debug)]
pub struct KeyShape {
    record_type: &'static str,
    fields: Vec<(&'static str, usize)>,
}

impl KeyShape {
    fn build<R: Record>(fields: &[String]) -> Result<Self> {
        let schema = R::schema();
        let resolved = fields
            .iter()
            .map(|name| {
                schema
                    .position(name)
                    .map(|index| (schema.fields()[index].name(), index))
                    .ok_or_else(|| QueryError::unknown_field(name, schema.type_name()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            record_type: schema.type_name(),
            fields: resolved,
        })
    }

    pub fn record_type(&self) -> &'static str {
        self.record_type
    }

    /// 分组字段的声明名，按分组顺序
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(name, _)| *name)
    }

    pub fn is_composite(&self) -> bool {
        self.fields.len() > 1
    }

    /// 计算记录的分组键
    ///
    /// 键结构只应用于构建它的记录类型。
    pub fn key_for<R: Record>(&self, record: &R) -> GroupKey {
        let schema = R::schema();
        debug_assert_eq!(schema.type_name(), self.record_type);

        let value_at = |index: usize| schema.fields()[index].get(record);

        match self.fields.as_slice() {
            [(_, index)] => GroupKey::Single(value_at(*index)),
            fields => GroupKey::Composite(
                fields
                    .iter()
                    .map(|&(name, index)| KeyPart {
                        name,
                        value: value_at(index),
                    })
                    .collect(),
            ),
        }
    }
}

/// 分组键合成器
pub struct GroupKeySynthesizer;

impl GroupKeySynthesizer {
    /// 获取（必要时构建并缓存）字段列表对应的键结构
    ///
    /// 并发首次写入同一个键时以先写入者为准，所有调用方最终看到同一个结构。
    pub fn shape_for<R: Record>(fields: &[String]) -> Result<Arc<KeyShape>> {
        let cache_key = ShapeCacheKey::new::<R>(fields);
        if let Some(shape) = SHAPE_CACHE.get(&cache_key) {
            return Ok(Arc::clone(shape.value()));
        }

        let shape = Arc::new(KeyShape::build::<R>(fields)?);
        let entry = SHAPE_CACHE.entry(cache_key).or_insert_with(|| {
            debug!(
                record_type = shape.record_type(),
                fields = ?fields,
                "缓存分组键结构"
            );
            metrics::counter!(
                "group_key_shapes_total",
                "record_type" => shape.record_type()
            )
            .increment(1);
            shape
        });

        Ok(Arc::clone(entry.value()))
    }

    /// 计算记录在给定字段列表下的分组键
    pub fn key_for<R: Record>(record: &R, fields: &[String]) -> Result<GroupKey> {
        Ok(Self::shape_for::<R>(fields)?.key_for(record))
    }

    /// 已缓存的键结构数量
    pub fn cached_shapes() -> usize {
        SHAPE_CACHE.len()
    }
}
