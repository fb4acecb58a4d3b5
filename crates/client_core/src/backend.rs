use std::path::Path;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::Username,
    protocol::{
        ChangePasswordForm, CredentialsForm, LoginResponse, MessageResponse,
        UploadProfilePicResponse, UsersResponse, CHANGE_PASSWORD_PATH, LOGIN_PATH, REGISTER_PATH,
        STATUS_PATH, UPLOAD_PROFILE_PIC_PATH, USERS_PATH,
    },
};
use tracing::debug;
use url::Url;

use crate::{config::ClientConfig, error::ClientError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_guess::from_path(&file_name)
            .first()
            .map(|mime| mime.essence_str().to_string());
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ClientError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

#[async_trait]
pub trait AccountBackend: Send + Sync {
    async fn status(&self) -> Result<MessageResponse, ClientError>;
    async fn list_users(&self) -> Result<UsersResponse, ClientError>;
    async fn register(&self, form: &CredentialsForm) -> Result<MessageResponse, ClientError>;
    async fn login(&self, form: &CredentialsForm) -> Result<LoginResponse, ClientError>;
    async fn upload_profile_picture(
        &self,
        username: &Username,
        file: &UploadFile,
    ) -> Result<UploadProfilePicResponse, ClientError>;
    async fn change_password(
        &self,
        form: &ChangePasswordForm,
    ) -> Result<MessageResponse, ClientError>;
    /// `Ok(None)` when the backend has no picture for the user.
    async fn fetch_profile_picture(&self, url: &Url) -> Result<Option<Vec<u8>>, ClientError>;
}

pub struct HttpBackend {
    http: Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let res = self.http.get(self.config.endpoint(path)).send().await?;
        decode_json(res).await
    }

    async fn post_form<F, T>(&self, path: &str, form: &F) -> Result<T, ClientError>
    where
        F: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let res = self
            .http
            .post(self.config.endpoint(path))
            .form(form)
            .send()
            .await?;
        decode_json(res).await
    }
}

// The backend reports application failures inside ordinary JSON bodies, and
// its error statuses carry JSON too, so the status code is not consulted.
async fn decode_json<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
    let status = res.status();
    let body = res.bytes().await?;
    if !status.is_success() {
        debug!(%status, "backend answered with non-success status");
    }
    Ok(serde_json::from_slice(&body)?)
}

#[async_trait]
impl AccountBackend for HttpBackend {
    async fn status(&self) -> Result<MessageResponse, ClientError> {
        self.get_json(STATUS_PATH).await
    }

    async fn list_users(&self) -> Result<UsersResponse, ClientError> {
        self.get_json(USERS_PATH).await
    }

    async fn register(&self, form: &CredentialsForm) -> Result<MessageResponse, ClientError> {
        self.post_form(REGISTER_PATH, form).await
    }

    async fn login(&self, form: &CredentialsForm) -> Result<LoginResponse, ClientError> {
        self.post_form(LOGIN_PATH, form).await
    }

    async fn upload_profile_picture(
        &self,
        username: &Username,
        file: &UploadFile,
    ) -> Result<UploadProfilePicResponse, ClientError> {
        let mut part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
        if let Some(mime_type) = &file.mime_type {
            part = part.mime_str(mime_type)?;
        }
        let form = Form::new()
            .text("username", username.as_str().to_string())
            .part("file", part);
        let res = self
            .http
            .post(self.config.endpoint(UPLOAD_PROFILE_PIC_PATH))
            .multipart(form)
            .send()
            .await?;
        decode_json(res).await
    }

    async fn change_password(
        &self,
        form: &ChangePasswordForm,
    ) -> Result<MessageResponse, ClientError> {
        self.post_form(CHANGE_PASSWORD_PATH, form).await
    }

    async fn fetch_profile_picture(&self, url: &Url) -> Result<Option<Vec<u8>>, ClientError> {
        let res = self.http.get(url.clone()).send().await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = res.error_for_status()?.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
