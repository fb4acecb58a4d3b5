use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

pub const STATUS_PATH: &str = "/";
pub const USERS_PATH: &str = "/users";
pub const REGISTER_PATH: &str = "/register";
pub const LOGIN_PATH: &str = "/login";
pub const UPLOAD_PROFILE_PIC_PATH: &str = "/upload-profile-pic";
pub const PROFILE_PIC_PATH: &str = "/profile-pic";
pub const CHANGE_PASSWORD_PATH: &str = "/change-password";

pub const CACHE_BUSTER_PARAM: &str = "t";

// Only consulted when a login response carries no explicit `success` flag.
pub const LOGIN_SUCCESS_PREFIX: &str = "Welcome";

pub mod text {
    pub const STATUS_LOADING: &str = "Loading...";
    pub const STATUS_UNREACHABLE: &str = "Could not connect to backend";
    pub const REGISTER_PENDING: &str = "Registering...";
    pub const REGISTER_FAILED: &str = "Registration failed";
    pub const LOGIN_PENDING: &str = "Logging in...";
    pub const LOGIN_FAILED: &str = "Login failed";
    pub const LOGGED_OUT: &str = "Logged out.";
    pub const CHANGE_PASSWORD_PENDING: &str = "Updating password...";
    pub const CHANGE_PASSWORD_FAILED: &str = "Password update failed";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordForm {
    pub username: String,
    pub old_password: String,
    pub new_password: String,
}

// Error bodies carry `detail` instead of `message`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_string"
    )]
    pub detail: Option<String>,
}

impl MessageResponse {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            detail: None,
        }
    }

    pub fn display_text(&self) -> Option<&str> {
        self.message.as_deref().or(self.detail.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_string"
    )]
    pub detail: Option<String>,
    // Older backends omit this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

impl LoginResponse {
    pub fn is_success(&self) -> bool {
        match self.success {
            Some(success) => success,
            None => self
                .message
                .as_deref()
                .is_some_and(|message| message.starts_with(LOGIN_SUCCESS_PREFIX)),
        }
    }

    pub fn display_text(&self) -> Option<&str> {
        self.message.as_deref().or(self.detail.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersResponse {
    #[serde(default)]
    pub users: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProfilePicResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

// Validation errors from the backend put a list of objects in `detail`; only
// plain strings are worth showing.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => Some(text),
        _ => None,
    })
}
