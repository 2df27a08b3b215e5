//! Request bodies sent to rig, with the field names the service expects.
//!
//! Response records are not modeled here: stream and account payloads are
//! passed through to callers as `serde_json::Value`.

use serde::Serialize;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub email: &'a str,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest<'a> {
    pub old_password: &'a str,
    pub new_password: &'a str,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddDestinationRequest<'a> {
    /// Destination service name, e.g. `YouTube` or `Twitch`.
    pub service: &'a str,
    pub stream_key: &'a str,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AddDestinationRequest, ChangePasswordRequest};

    #[test]
    fn change_password_uses_camel_case_fields() {
        let value = serde_json::to_value(ChangePasswordRequest {
            old_password: "old",
            new_password: "new",
        })
        .expect("serialize request");
        assert_eq!(value, json!({"oldPassword": "old", "newPassword": "new"}));
    }

    #[test]
    fn add_destination_uses_stream_key_field() {
        let value = serde_json::to_value(AddDestinationRequest {
            service: "Twitch",
            stream_key: "live_123",
        })
        .expect("serialize request");
        assert_eq!(value, json!({"service": "Twitch", "streamKey": "live_123"}));
        assert!(value.get("stream_key").is_none());
    }
}
