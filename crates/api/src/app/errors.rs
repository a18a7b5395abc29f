use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use figura_infra::error::{SourceError, StoreError};
use figura_infra::services::{PrerequisiteError, SuggestionError};

pub fn prerequisite_error_to_response(err: PrerequisiteError) -> axum::response::Response {
    match err {
        PrerequisiteError::CycleDetected(cycle) => {
            let message = cycle.to_string();
            json_error_with(StatusCode::CONFLICT, "cycle_detected", message, json!({ "cycle": cycle }))
        }
        PrerequisiteError::DuplicateEdge { .. } => json_error(StatusCode::CONFLICT, "duplicate_edge", err.to_string()),
        PrerequisiteError::SkillNotFound(_) => json_error(StatusCode::NOT_FOUND, "skill_not_found", err.to_string()),
        PrerequisiteError::EdgeNotFound { .. } => json_error(StatusCode::NOT_FOUND, "edge_not_found", err.to_string()),
        PrerequisiteError::InvalidEdge(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_edge", msg),
        PrerequisiteError::Store(e) => store_error_to_response(e),
        PrerequisiteError::Source(e) => source_error_to_response(e),
    }
}

pub fn suggestion_error_to_response(err: SuggestionError) -> axum::response::Response {
    match err {
        SuggestionError::SkillNotFound(_) => json_error(StatusCode::NOT_FOUND, "skill_not_found", err.to_string()),
        SuggestionError::SubjectNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "subject_not_found", err.to_string())
        }
        SuggestionError::InvalidTransition(e) => json_error(StatusCode::CONFLICT, "invalid_transition", e.to_string()),
        SuggestionError::NotApplicable(e) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "not_applicable", e.to_string())
        }
        SuggestionError::Store(e) => store_error_to_response(e),
        SuggestionError::Source(e) => source_error_to_response(e),
    }
}

fn store_error_to_response(err: StoreError) -> axum::response::Response {
    error!(error = %err, "store failure");
    match err {
        StoreError::Unavailable(msg) => json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", msg),
        StoreError::Backend(msg) | StoreError::Corrupt(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

fn source_error_to_response(err: SourceError) -> axum::response::Response {
    error!(error = %err, "upstream source failure");
    json_error(StatusCode::BAD_GATEWAY, "source_unavailable", err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// [`json_error`] with an extra `details` object.
pub fn json_error_with(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: serde_json::Value,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "details": details,
        })),
    )
        .into_response()
}

/// Parse a path segment into a typed id, or a 400 naming the segment.
pub fn parse_id<T: FromStr>(raw: &str, what: &'static str) -> Result<T, axum::response::Response> {
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figura_core::SkillId;

    #[test]
    fn bad_ids_are_rejected_with_400() {
        let res = parse_id::<SkillId>("not-a-uuid", "skill").unwrap_err();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(parse_id::<SkillId>(&SkillId::new().to_string(), "skill").is_ok());
    }

    #[test]
    fn invalid_transition_is_a_conflict() {
        let err = SuggestionError::InvalidTransition(figura_suggestions::TransitionError::InvalidTransition {
            from: figura_suggestions::SuggestionStatus::Dismissed,
            to: figura_suggestions::SuggestionStatus::Accepted,
        });
        assert_eq!(suggestion_error_to_response(err).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn unscorable_skill_is_unprocessable_not_a_server_error() {
        let err = SuggestionError::NotApplicable(figura_suggestions::NotApplicable::NoRequiredPrerequisites);
        assert_eq!(suggestion_error_to_response(err).status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
