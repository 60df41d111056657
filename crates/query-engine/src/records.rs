//! 服务端评估接口使用的记录类型

use crate::record::{FieldKind, FieldType, Record, RecordSchema};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// 用户记录
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub salary: Decimal,
    #[serde(default)]
    pub age: Option<i32>,
    /// 工号，数字形式的文本（如 "00042"）
    #[serde(default)]
    pub employee_code: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub manager_id: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn new(id: i64, name: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: None,
            department: department.into(),
            salary: Decimal::ZERO,
            age: None,
            employee_code: String::new(),
            bio: String::new(),
            is_active: true,
            manager_id: None,
            tags: Vec::new(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn with_salary(mut self, salary: i64) -> Self {
        self.salary = Decimal::from(salary);
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_age(mut self, age: i32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_employee_code(mut self, code: impl Into<String>) -> Self {
        self.employee_code = code.into();
        self
    }

    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = bio.into();
        self
    }

    pub fn with_manager(mut self, manager_id: i64) -> Self {
        self.manager_id = Some(manager_id);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

impl Record for User {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: OnceLock<RecordSchema<User>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            RecordSchema::builder("User")
                .field("Id", FieldType::of(FieldKind::Integer), |u: &User| u.id.into())
                .field("Name", FieldType::of(FieldKind::Text), |u: &User| {
                    u.name.as_str().into()
                })
                .field("Email", FieldType::optional(FieldKind::Text), |u: &User| {
                    u.email.as_deref().into()
                })
                .field("Department", FieldType::of(FieldKind::Text), |u: &User| {
                    u.department.as_str().into()
                })
                .field("Salary", FieldType::of(FieldKind::Decimal), |u: &User| {
                    u.salary.into()
                })
                .field("Age", FieldType::optional(FieldKind::Integer), |u: &User| {
                    u.age.into()
                })
                .field("EmployeeCode", FieldType::of(FieldKind::Text), |u: &User| {
                    u.employee_code.as_str().into()
                })
                .field("Bio", FieldType::of(FieldKind::Text), |u: &User| u.bio.as_str().into())
                .field("IsActive", FieldType::of(FieldKind::Bool), |u: &User| {
                    u.is_active.into()
                })
                .field("ManagerId", FieldType::optional(FieldKind::Integer), |u: &User| {
                    u.manager_id.into()
                })
                .field("Tags", FieldType::of(FieldKind::Sequence), |u: &User| {
                    u.tags.as_slice().into()
                })
                .field("CreatedAt", FieldType::of(FieldKind::Timestamp), |u: &User| {
                    u.created_at.into()
                })
                .build()
        })
    }
}
