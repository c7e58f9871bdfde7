//! Request/response types for signup.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use super::region::Region;

/// Field names as reported in `InvalidFields`.
pub const FIELD_FULL_NAME: &str = "full_name";
pub const FIELD_EMAIL: &str = "email";
pub const FIELD_PASSWORD: &str = "password";
pub const FIELD_REGION: &str = "region";

/// Accepts both the JSON (`fullName`) and the original (`full_name`) field names.
/// Missing fields default to empty, as in proto3.
#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct SignupRequest {
    #[serde(default, rename = "fullName", alias = "full_name")]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "secret_string")]
    #[schema(value_type = String, format = Password)]
    pub password: SecretString,
    #[serde(default)]
    #[schema(value_type = String, example = "REGION_EUR")]
    pub region: Region,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignupResponse {
    pub handle: String,
}

fn secret_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}
