//! Request and response bodies of the HTTP API.

use actiongate_core::{
    ActionDefinition, ActionId, ActionKind, ExecutionId, ExecutionRecord, ExecutionStatus,
    NewAction, Parameters,
};
use actiongate_session::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::error::ApiError;

/// Login form.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Create and update form for an action.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub endpoint_path: String,
    pub action_type: String,
    pub action_content: String,
    /// JSON object describing the declared parameters.
    #[serde(default = "empty_object")]
    pub parameters: String,
    #[serde(default = "default_true", deserialize_with = "form_bool")]
    pub enable_logging: bool,
}

fn empty_object() -> String {
    "{}".to_string()
}

const fn default_true() -> bool {
    true
}

/// Accept the spellings HTML forms and scripts use for booleans.
fn form_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Ok(true),
        "false" | "off" | "0" | "no" | "" => Ok(false),
        other => Err(de::Error::custom(format!("invalid boolean: {other}"))),
    }
}

impl ActionForm {
    /// Validate the form into registry input.
    ///
    /// # Errors
    /// Returns `BadRequest` for an unknown kind or a `parameters` value that
    /// is not a JSON object.
    pub fn into_new_action(self) -> Result<NewAction, ApiError> {
        let kind: ActionKind = self
            .action_type
            .parse()
            .map_err(|e: actiongate_core::UnknownKind| ApiError::bad_request(e.to_string()))?;
        let parameters = parse_declared_parameters(&self.parameters)?;

        Ok(NewAction {
            name: self.name,
            description: self.description,
            endpoint_path: self.endpoint_path,
            kind,
            content: self.action_content,
            parameters,
            logging_enabled: self.enable_logging,
        })
    }
}

fn parse_declared_parameters(raw: &str) -> Result<Parameters, ApiError> {
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ApiError::bad_request(format!("parameters must be valid JSON: {e}")))?;
    let serde_json::Value::Object(map) = value else {
        return Err(ApiError::bad_request("parameters must be a JSON object"));
    };

    Ok(map
        .into_iter()
        .map(|(name, value)| {
            let text = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (name, text)
        })
        .collect())
}

/// Row of the definitions list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSummary {
    pub id: ActionId,
    pub name: String,
    pub description: String,
    pub api_key: String,
    pub endpoint_path: String,
    pub action_type: ActionKind,
    pub is_active: bool,
    pub enable_logging: bool,
    pub execution_count: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&ActionDefinition> for ActionSummary {
    fn from(action: &ActionDefinition) -> Self {
        Self {
            id: action.id,
            name: action.name.clone(),
            description: action.description.clone(),
            api_key: action.public_key.clone(),
            endpoint_path: action.endpoint_path.clone(),
            action_type: action.kind,
            is_active: action.is_active,
            enable_logging: action.logging_enabled,
            execution_count: action.execution_count,
            created_at: action.created_at,
        }
    }
}

/// A single definition with its content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDetail {
    #[serde(flatten)]
    pub summary: ActionSummary,
    pub action_content: String,
    pub parameters: Parameters,
    pub updated_at: DateTime<Utc>,
}

impl From<&ActionDefinition> for ActionDetail {
    fn from(action: &ActionDefinition) -> Self {
        Self {
            summary: ActionSummary::from(action),
            action_content: action.content.clone(),
            parameters: action.parameters.clone(),
            updated_at: action.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedAction {
    pub success: bool,
    pub message: String,
    pub api_key: String,
    pub id: ActionId,
}

/// One execution log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionView {
    pub id: ExecutionId,
    pub api_key: String,
    pub parameters: Parameters,
    pub result: String,
    pub status: ExecutionStatus,
    pub execution_time: DateTime<Utc>,
    pub duration_ms: Option<u64>,
    pub error_message: String,
    pub request_ip: String,
}

impl From<ExecutionRecord> for ExecutionView {
    fn from(record: ExecutionRecord) -> Self {
        Self {
            id: record.id,
            api_key: record.public_key,
            parameters: record.parameters,
            result: record.result,
            status: record.status,
            execution_time: record.started_at,
            duration_ms: record.duration_ms,
            error_message: record.error_message,
            request_ip: record.request_ip,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiInfo {
    pub id: ActionId,
    pub name: String,
    pub description: String,
    pub endpoint_path: String,
}

/// Recent executions of one action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLogs {
    pub api_info: ApiInfo,
    pub logs: Vec<ExecutionView>,
}

/// Query of the execution list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub username: String,
    pub login_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub ip_address: String,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            username: session.username.clone(),
            login_time: session.created_at,
            last_activity: session.last_activity_at,
            ip_address: session.client_ip.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub total_apis: usize,
    pub active_apis: usize,
    pub total_executions: u64,
    pub successful_executions: u64,
    /// Percent, two decimals.
    pub success_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(action_type: &str, parameters: &str) -> ActionForm {
        ActionForm {
            name: "n".into(),
            description: String::new(),
            endpoint_path: "/n".into(),
            action_type: action_type.into(),
            action_content: "echo".into(),
            parameters: parameters.into(),
            enable_logging: true,
        }
    }

    #[test]
    fn test_form_validation() {
        let action = form("python", r#"{"who": "name", "count": 3}"#)
            .into_new_action()
            .unwrap();
        assert_eq!(action.kind, ActionKind::Script);
        assert_eq!(action.parameters.get("who").map(String::as_str), Some("name"));
        assert_eq!(action.parameters.get("count").map(String::as_str), Some("3"));

        assert!(form("shell", "").into_new_action().unwrap().parameters.is_empty());
        assert!(matches!(
            form("ftp", "{}").into_new_action(),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            form("shell", "[1, 2]").into_new_action(),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            form("shell", "{oops").into_new_action(),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_form_booleans() {
        #[derive(Deserialize)]
        struct Flag {
            #[serde(deserialize_with = "form_bool")]
            flag: bool,
        }
        let parse = |raw: &str| serde_json::from_value::<Flag>(serde_json::json!({ "flag": raw }));
        assert!(parse("on").unwrap().flag);
        assert!(parse("True").unwrap().flag);
        assert!(!parse("0").unwrap().flag);
        assert!(parse("maybe").is_err());
    }
}
