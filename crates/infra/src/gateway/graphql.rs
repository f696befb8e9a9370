//! GraphQL response envelope and error classification

use carelink_domain::{CareLinkError, Result};
use serde::Deserialize;
use serde_json::Value;

/// Error codes that mean the upstream no longer accepts the bearer token.
const SESSION_ERROR_CODES: &[&str] = &["UNAUTHENTICATED", "INVALID_API_KEY", "FORBIDDEN"];

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<Value>,
}

impl GraphQLError {
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref()?.get("code")?.as_str()
    }
}

impl<T> GraphQLResponse<T> {
    /// The `data` object, or the classified `errors`.
    pub fn into_data(self) -> Result<T> {
        if let Some(errors) = self.errors.filter(|errors| !errors.is_empty()) {
            return Err(classify_errors(&errors));
        }

        self.data
            .ok_or_else(|| CareLinkError::FetchFailed("GraphQL response missing data field".into()))
    }
}

/// Structured codes first: a session code on any error makes the whole
/// response `SessionExpired`. Everything else is `FetchFailed`.
pub fn classify_errors(errors: &[GraphQLError]) -> CareLinkError {
    let message =
        errors.iter().map(|error| error.message.as_str()).collect::<Vec<_>>().join(", ");

    let session_rejected = errors
        .iter()
        .filter_map(GraphQLError::code)
        .any(|code| SESSION_ERROR_CODES.iter().any(|known| code.eq_ignore_ascii_case(known)));

    if session_rejected {
        CareLinkError::SessionExpired(message)
    } else {
        CareLinkError::FetchFailed(message)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(body: Value) -> GraphQLResponse<Value> {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn data_is_returned_when_no_errors() {
        let data = parse(json!({ "data": { "appointments": [] } })).into_data().unwrap();
        assert_eq!(data, json!({ "appointments": [] }));
    }

    #[test]
    fn empty_error_list_is_not_a_failure() {
        assert!(parse(json!({ "data": {}, "errors": [] })).into_data().is_ok());
    }

    #[test]
    fn session_codes_become_session_expired() {
        let err = parse(json!({
            "errors": [{ "message": "Not authorized", "extensions": { "code": "UNAUTHENTICATED" } }]
        }))
        .into_data()
        .unwrap_err();
        assert_eq!(err, CareLinkError::SessionExpired("Not authorized".into()));
    }

    #[test]
    fn uncoded_errors_are_fetch_failures_with_joined_messages() {
        let err = parse(json!({
            "errors": [{ "message": "first" }, { "message": "second", "extensions": {} }]
        }))
        .into_data()
        .unwrap_err();
        assert_eq!(err, CareLinkError::FetchFailed("first, second".into()));
    }

    #[test]
    fn missing_data_is_fetch_failure() {
        assert!(matches!(
            parse(json!({})).into_data(),
            Err(CareLinkError::FetchFailed(_))
        ));
    }
}
