use crate::signup::{types::SignupRequest, types::SignupResponse, Signup, SignupError};
use axum::{
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use base64ct::{Base64Unpadded, Encoding};
use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

/// Fully qualified name of the `InvalidFields` error detail message.
pub const INVALID_FIELDS_TYPE: &str = "ycrpc.v1.InvalidFields";

/// Connect protocol error body.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ConnectError {
    pub code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub type_name: String,
    /// Base64 (unpadded) protobuf encoding of the detail message.
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub debug: Option<serde_json::Value>,
}

#[utoipa::path(
    post,
    path = "/ycrpc.v1.YCRPCService/Signup",
    request_body = SignupRequest,
    responses (
        (status = 200, description = "Account created", body = SignupResponse),
        (status = 400, description = "Invalid request", body = ConnectError),
        (status = 409, description = "Email address already registered", body = ConnectError),
        (status = 500, description = "Internal error", body = ConnectError),
    ),
    tag = "ycrpc"
)]
// axum handler for signup
pub async fn signup(signup: Extension<Arc<Signup>>, body: Bytes) -> Response {
    let request: SignupRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            debug!("Failed to parse signup request: {}", err);
            return error_response(&SignupError::InvalidArgument { fields: Vec::new() });
        }
    };

    match signup.signup(&request).await {
        Ok(handle) => (StatusCode::OK, Json(SignupResponse { handle })).into_response(),
        Err(err) => error_response(&err),
    }
}

/// Map a signup failure to its HTTP status and Connect error body.
#[must_use]
pub fn error_response(err: &SignupError) -> Response {
    let (status, details) = match err {
        SignupError::InvalidArgument { fields } => {
            let details = if fields.is_empty() {
                Vec::new()
            } else {
                vec![ErrorDetail {
                    type_name: INVALID_FIELDS_TYPE.to_string(),
                    value: Base64Unpadded::encode_string(
                        &InvalidFields {
                            fields: fields.clone(),
                        }
                        .encode_to_vec(),
                    ),
                    debug: Some(json!({ "fields": fields })),
                }]
            };
            (StatusCode::BAD_REQUEST, details)
        }
        SignupError::AlreadyExists => (StatusCode::CONFLICT, Vec::new()),
        SignupError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, Vec::new()),
    };

    let body = ConnectError {
        code: err.code().to_string(),
        message: err.to_string(),
        details,
    };

    (status, Json(body)).into_response()
}

/// `ycrpc.v1.InvalidFields`: names of the request fields that failed validation.
#[derive(Clone, PartialEq, Message)]
pub struct InvalidFields {
    #[prost(string, repeated, tag = "1")]
    pub fields: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> Result<serde_json::Value> {
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    #[test]
    fn invalid_fields_wire_format() {
        let detail = InvalidFields {
            fields: vec!["email".to_string(), "region".to_string()],
        };
        assert_eq!(detail.encode_to_vec(), b"\x0a\x05email\x0a\x06region".to_vec());
        assert!(InvalidFields::default().encode_to_vec().is_empty());
    }

    #[tokio::test]
    async fn invalid_argument_carries_fields() -> Result<()> {
        let err = SignupError::InvalidArgument {
            fields: vec!["email".to_string()],
        };
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await?;
        assert_eq!(body["code"], "invalid_argument");
        assert_eq!(body["message"], "invalid request");
        assert_eq!(body["details"][0]["type"], INVALID_FIELDS_TYPE);
        assert_eq!(body["details"][0]["debug"]["fields"][0], "email");

        let value = body["details"][0]["value"].as_str().unwrap_or_default();
        let decoded = Base64Unpadded::decode_vec(value).map_err(|e| anyhow::anyhow!("{e}"))?;
        let detail = InvalidFields::decode(decoded.as_slice())?;
        assert_eq!(detail.fields, vec!["email".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn already_exists_and_internal() -> Result<()> {
        let response = error_response(&SignupError::AlreadyExists);
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await?;
        assert_eq!(body["code"], "already_exists");
        assert_eq!(body["message"], "user with this email address already exists");

        let response = error_response(&SignupError::Internal);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await?;
        assert_eq!(body, json!({ "code": "internal" }));
        Ok(())
    }
}
