//! 记录能力抽象
//!
//! 每种记录类型提供一张一次构建、反复使用的字段访问表（名称 → 类型 + 取值函数），
//! 编译器和分组逻辑只通过这张表访问记录。

use crate::value::FieldValue;
use std::fmt;

/// 字段的底层类型（已去除可空包装）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    Integer,
    Float,
    Decimal,
    Text,
    Timestamp,
    Sequence,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
            Self::Sequence => "sequence",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 字段声明类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldType {
    pub kind: FieldKind,
    /// 可空包装（如 `Option<i64>`）
    pub nullable: bool,
}

impl FieldType {
    pub const fn of(kind: FieldKind) -> Self {
        Self {
            kind,
            nullable: false,
        }
    }

    pub const fn optional(kind: FieldKind) -> Self {
        Self {
            kind,
            nullable: true,
        }
    }

    /// 是否能取到 null：显式可空，或文本/序列这类引用类型
    pub fn accepts_null(&self) -> bool {
        self.nullable || matches!(self.kind, FieldKind::Text | FieldKind::Sequence)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "{}?", self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

/// 字段取值函数
pub type FieldGetter<R> = fn(&R) -> FieldValue;

/// 字段描述
pub struct FieldDescriptor<R> {
    name: &'static str,
    field_type: FieldType,
    getter: FieldGetter<R>,
}

impl<R> FieldDescriptor<R> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn getter(&self) -> FieldGetter<R> {
        self.getter
    }

    pub fn get(&self, record: &R) -> FieldValue {
        (self.getter)(record)
    }
}

impl<R> fmt::Debug for FieldDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .finish()
    }
}

/// 记录类型结构
#[derive(Debug)]
pub struct RecordSchema<R> {
    type_name: &'static str,
    fields: Vec<FieldDescriptor<R>>,
}

impl<R> RecordSchema<R> {
    pub fn builder(type_name: &'static str) -> RecordSchemaBuilder<R> {
        RecordSchemaBuilder {
            type_name,
            fields: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[FieldDescriptor<R>] {
        &self.fields
    }

    /// 按名称查找字段下标（忽略大小写）
    pub fn position(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.fields
            .iter()
            .position(|field| field.name.eq_ignore_ascii_case(name))
    }

    /// 按名称查找字段（忽略大小写）
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor<R>> {
        self.position(name).map(|index| &self.fields[index])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }
}

pub struct RecordSchemaBuilder<R> {
    type_name: &'static str,
    fields: Vec<FieldDescriptor<R>>,
}

impl<R> RecordSchemaBuilder<R> {
    pub fn field(mut self, name: &'static str, field_type: FieldType, getter: FieldGetter<R>) -> Self {
        self.fields.push(FieldDescriptor {
            name,
            field_type,
            getter,
        });
        self
    }

    pub fn build(self) -> RecordSchema<R> {
        RecordSchema {
            type_name: self.type_name,
            fields: self.fields,
        }
    }
}

/// 可被规则查询的记录类型
///
/// 实现方通常用 `OnceLock` 保存结构表：
///
/// ```ignore
/// impl Record for User {
///     fn schema() -> &'static RecordSchema<Self> {
///         static SCHEMA: OnceLock<RecordSchema<User>> = OnceLock::new();
///         SCHEMA.get_or_init(|| RecordSchema::builder("User")
///             .field("Name", FieldType::of(FieldKind::Text), |u: &User| u.name.as_str().into())
///             .build())
///     }
/// }
/// ```
pub trait Record: Sized + Send + Sync + 'static {
    fn schema() -> &'static RecordSchema<Self>;
}
