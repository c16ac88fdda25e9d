use serde::Serialize;
use serde_json::Value;

use reflex_core::{ReflexError, Result};

/// Plain result record for callers that branch on a flag instead of a `Result`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl OperationReport {
    pub fn from_result<T: Serialize>(result: Result<T>) -> Self {
        match result.and_then(|value| Ok(serde_json::to_value(value)?)) {
            Ok(data) => Self {
                success: true,
                reason: None,
                error_kind: None,
                data: Some(data),
            },
            Err(e) => Self::failure(&e),
        }
    }

    pub fn failure(error: &ReflexError) -> Self {
        Self {
            success: false,
            reason: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_carries_data() {
        let report = OperationReport::from_result(Ok(vec!["tool::Read"]));
        assert!(report.success);
        assert_eq!(report.data, Some(serde_json::json!(["tool::Read"])));
    }

    #[test]
    fn failure_carries_reason_and_kind() {
        let report = OperationReport::from_result::<()>(Err(ReflexError::NotFound("x::y".into())));
        assert!(!report.success);
        assert_eq!(report.error_kind.as_deref(), Some("not_found"));
        assert!(report.reason.unwrap().contains("x::y"));
        let json = serde_json::to_value(OperationReport::failure(&ReflexError::MissingKey)).unwrap();
        assert_eq!(json["errorKind"], "missing_key");
        assert!(json.get("data").is_none());
    }
}
