//! HTTP 接口
//!
//! 接收规则与记录集合，返回执行结果。只做请求/响应转换，语义全部由执行器完成。

use crate::aggregation::QueryOutput;
use crate::error::QueryError;
use crate::executor::RuleExecutor;
use crate::models::RuleDefinition;
use crate::params::ExternalParams;
use crate::records::User;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

/// 接口层错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 规则校验或编译失败；`message` 为规则自带的提示信息
    #[error("{}", query_message(.source, .message))]
    Query {
        source: QueryError,
        message: Option<String>,
    },

    #[error("记录数量超出限制: {actual} > {limit}")]
    RecordLimitExceeded { limit: usize, actual: usize },

    #[error("规则数量超出限制: {actual} > {limit}")]
    RuleLimitExceeded { limit: usize, actual: usize },

    #[error("请求体无效: {0}")]
    InvalidRequest(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

fn query_message(source: &QueryError, message: &Option<String>) -> String {
    message.clone().unwrap_or_else(|| source.to_string())
}

impl ApiError {
    fn from_rule(source: QueryError, rule: &RuleDefinition) -> Self {
        Self::Query {
            source,
            message: rule.error_message.clone(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Query { .. } | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::RecordLimitExceeded { .. } | Self::RuleLimitExceeded { .. } => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Query { source, .. } => source.code(),
            Self::RecordLimitExceeded { .. } => "RECORD_LIMIT_EXCEEDED",
            Self::RuleLimitExceeded { .. } => "RULE_LIMIT_EXCEEDED",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            Self::Internal(e) => {
                error!(error = %e, "请求处理失败");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}

/// 接口共享状态
#[derive(Debug, Clone)]
pub struct AppState {
    pub executor: RuleExecutor,
    pub max_records: usize,
    pub max_rules: usize,
}

impl AppState {
    pub fn new(max_records: usize, max_rules: usize) -> Self {
        Self {
            executor: RuleExecutor::new(),
            max_records,
            max_rules,
        }
    }

    fn check_records(&self, actual: usize) -> Result<(), ApiError> {
        if actual > self.max_records {
            return Err(ApiError::RecordLimitExceeded {
                limit: self.max_records,
                actual,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    #[serde(alias = "Rule")]
    pub rule: RuleDefinition,
    #[serde(default, alias = "users", alias = "Records", alias = "Users")]
    pub records: Vec<User>,
    #[serde(default, alias = "Parameters")]
    pub parameters: ExternalParams,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateAllRequest {
    #[serde(alias = "Rules")]
    pub rules: Vec<RuleDefinition>,
    #[serde(default, alias = "users", alias = "Records", alias = "Users")]
    pub records: Vec<User>,
    #[serde(default, alias = "Parameters")]
    pub parameters: ExternalParams,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rules/evaluate", post(evaluate))
        .route("/rules/evaluate-all", post(evaluate_all))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// POST /rules/evaluate
async fn evaluate(
    State(state): State<AppState>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> Result<Json<QueryOutput<User>>, ApiError> {
    let Json(request) = payload?;
    state.check_records(request.records.len())?;

    info!(
        rule = %request.rule.name,
        records = request.records.len(),
        "评估规则"
    );

    let executor = state.executor;
    let output = tokio::task::spawn_blocking(move || {
        executor
            .execute(&request.records, &request.rule, &request.parameters)
            .map_err(|e| ApiError::from_rule(e, &request.rule))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(output))
}

/// POST /rules/evaluate-all
async fn evaluate_all(
    State(state): State<AppState>,
    payload: Result<Json<EvaluateAllRequest>, JsonRejection>,
) -> Result<Json<QueryOutput<User>>, ApiError> {
    let Json(request) = payload?;
    state.check_records(request.records.len())?;
    if request.rules.len() > state.max_rules {
        return Err(ApiError::RuleLimitExceeded {
            limit: state.max_rules,
            actual: request.rules.len(),
        });
    }

    info!(
        rules = request.rules.len(),
        records = request.records.len(),
        "合并评估规则"
    );

    let executor = state.executor;
    let merged = tokio::task::spawn_blocking(move || {
        executor
            .execute_all(&request.records, &request.rules, &request.parameters)
            .map_err(|e| match failing_rule(&e, &request.rules) {
                Some(rule) => ApiError::from_rule(e, rule),
                None => ApiError::Query {
                    source: e,
                    message: None,
                },
            })
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(QueryOutput::Records(merged)))
}

/// 合并执行出错时，能定位到的出错规则（用于取其提示信息）
fn failing_rule<'a>(error: &QueryError, rules: &'a [RuleDefinition]) -> Option<&'a RuleDefinition> {
    match error {
        QueryError::ProjectionInUnion(name) => rules.iter().find(|rule| &rule.name == name),
        _ if rules.len() == 1 => rules.first(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState::new(3, 2))
    }

    async fn post_json(uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn users() -> Value {
        json!([
            { "id": 1, "name": "Ada", "department": "X", "salary": 10 },
            { "id": 2, "name": "Bob", "department": "X", "salary": 20 },
            { "id": 3, "name": "Cyd", "department": "Y", "salary": 30 }
        ])
    }

    fn ids(items: &Value) -> Vec<i64> {
        items
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_evaluate_filters_records() {
        let (status, body) = post_json(
            "/rules/evaluate",
            json!({
                "rule": {
                    "name": "rich",
                    "conditions": {
                        "logicalOperator": "and",
                        "conditions": [{ "property": "Salary", "operator": "greaterthan", "value": 15 }]
                    }
                },
                "users": users()
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "records");
        assert_eq!(ids(&body["items"]), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_evaluate_count_projection() {
        let (status, body) = post_json(
            "/rules/evaluate",
            json!({
                "rule": {
                    "Name": "by_dept",
                    "GroupBy": ["Department"],
                    "Aggregation": { "AggregateFunction": "Count" }
                },
                "records": users()
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "kind": "counts",
                "items": [
                    { "groupKey": "X", "count": 2 },
                    { "groupKey": "Y", "count": 1 }
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_evaluate_with_parameters() {
        let (status, body) = post_json(
            "/rules/evaluate",
            json!({
                "rule": {
                    "name": "same_dept",
                    "conditions": {
                        "conditions": [{ "property": "Department", "operator": "dynamicequal" }]
                    }
                },
                "records": users(),
                "parameters": { "department": "Y" }
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body["items"]), vec![3]);
    }

    #[tokio::test]
    async fn test_validation_error_uses_rule_message() {
        let (status, body) = post_json(
            "/rules/evaluate",
            json!({
                "rule": {
                    "name": "broken",
                    "errorMessage": "规则配置有误",
                    "conditions": {
                        "conditions": [{ "property": "Nickname", "operator": "equal", "value": "x" }]
                    }
                },
                "records": users()
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "UNKNOWN_FIELD");
        assert_eq!(body["error"], "规则配置有误");
    }

    #[tokio::test]
    async fn test_record_limit() {
        let mut records = users();
        records
            .as_array_mut()
            .unwrap()
            .push(json!({ "id": 4, "name": "Dee" }));

        let (status, body) = post_json(
            "/rules/evaluate",
            json!({ "rule": { "name": "all" }, "records": records }),
        )
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], "RECORD_LIMIT_EXCEEDED");
    }

    #[tokio::test]
    async fn test_invalid_body() {
        let (status, body) = post_json("/rules/evaluate", json!({ "records": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_evaluate_all_union() {
        let (status, body) = post_json(
            "/rules/evaluate-all",
            json!({
                "rules": [
                    { "name": "x", "conditions": { "conditions": [{ "property": "Department", "operator": "equal", "value": "X" }] } },
                    { "name": "rich", "conditions": { "conditions": [{ "property": "Salary", "operator": "greaterthanorequal", "value": 20 }] } }
                ],
                "records": users()
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "records");
        assert_eq!(ids(&body["items"]), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_evaluate_all_rejects_count_rule() {
        let (status, body) = post_json(
            "/rules/evaluate-all",
            json!({
                "rules": [
                    { "name": "counts", "errorMessage": "计数规则不能合并", "groupBy": ["Department"], "aggregation": { "aggregateFunction": "count" } }
                ],
                "records": users()
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "PROJECTION_IN_UNION");
        assert_eq!(body["error"], "计数规则不能合并");
    }

    #[tokio::test]
    async fn test_rule_limit() {
        let rule = json!({ "name": "all" });
        let (status, body) = post_json(
            "/rules/evaluate-all",
            json!({ "rules": [rule.clone(), rule.clone(), rule], "records": [] }),
        )
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], "RULE_LIMIT_EXCEEDED");
    }
}
