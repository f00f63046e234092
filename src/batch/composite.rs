//! Composite (`$batch`) request and response envelopes.

use crate::error::SubmitError;
use crate::types::UnitOutcome;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One request inside a composite request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStep {
    /// Position of the record within its group, as a string.
    pub id: String,
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

/// Wire payload encoding a whole group of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeRequest {
    pub requests: Vec<BatchStep>,
}

impl CompositeRequest {
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStepResponse {
    pub id: String,
    pub status: u16,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

/// Reply to a [`CompositeRequest`]; responses may arrive in any order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeResponse {
    #[serde(default)]
    pub responses: Vec<BatchStepResponse>,
}

impl CompositeResponse {
    /// Map step responses back onto positions `0..expected`.
    ///
    /// A status of 400 or above fails that position; a position with no
    /// response at all fails with [`SubmitError::MissingResponse`].
    pub fn into_outcome(self, expected: usize) -> UnitOutcome {
        let mut by_position: Vec<Option<BatchStepResponse>> = vec![None; expected];
        for response in self.responses {
            if let Ok(position) = response.id.parse::<usize>() {
                if let Some(slot) = by_position.get_mut(position) {
                    slot.get_or_insert(response);
                }
            }
        }

        let mut outcome = UnitOutcome::success();
        for (position, slot) in by_position.into_iter().enumerate() {
            match slot {
                None => outcome.push_failure(position, SubmitError::MissingResponse(position)),
                Some(r) if r.status >= 400 => {
                    let message = error_message(r.body.as_ref())
                        .unwrap_or_else(|| format!("step {} failed", position));
                    outcome.push_failure(position, SubmitError::rejected(r.status, message));
                }
                Some(_) => {}
            }
        }
        outcome
    }
}

/// Pull `error.message` out of a service error body.
pub(crate) fn error_message(body: Option<&serde_json::Value>) -> Option<String> {
    body?
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_out_of_order_responses_map_to_positions() {
        let response: CompositeResponse = serde_json::from_value(json!({
            "responses": [
                {"id": "2", "status": 201, "body": {"id": "c"}},
                {"id": "0", "status": 201, "body": {"id": "a"}},
                {"id": "1", "status": 400, "body": {"error": {"code": "Request_BadRequest", "message": "Another object with the same value for property userPrincipalName already exists."}}}
            ]
        }))
        .unwrap();

        let outcome = response.into_outcome(4);
        let failures = outcome.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].0, 1);
        assert!(matches!(
            &failures[0].1,
            SubmitError::Rejected { status: 400, message } if message.contains("already exists")
        ));
        assert_eq!(failures[1], (3, SubmitError::MissingResponse(3)));
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let response = CompositeResponse {
            responses: vec![
                BatchStepResponse {
                    id: "0".into(),
                    status: 204,
                    body: None,
                },
                BatchStepResponse {
                    id: "abc".into(),
                    status: 500,
                    body: None,
                },
            ],
        };
        assert!(response.into_outcome(1).is_success());
    }

    #[test]
    fn test_request_serialization_skips_empty_fields() {
        let request = CompositeRequest {
            requests: vec![BatchStep {
                id: "0".into(),
                method: "DELETE".into(),
                url: "/users/1".into(),
                headers: BTreeMap::new(),
                body: None,
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            json!({"requests": [{"id": "0", "method": "DELETE", "url": "/users/1"}]})
        );
    }
}
