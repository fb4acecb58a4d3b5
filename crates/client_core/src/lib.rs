use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use shared::{
    domain::{MessageSlot, SessionStatus, Username},
    protocol::{text, ChangePasswordForm, CredentialsForm},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use url::Url;

pub mod backend;
pub mod config;
pub mod error;

pub use backend::{AccountBackend, HttpBackend, UploadFile};
pub use config::ClientConfig;
pub use error::ClientError;

const EVENT_CHANNEL_CAPACITY: usize = 256;

const SESSION_SCOPED_REQUESTS: [RequestSlot; 3] = [
    RequestSlot::Login,
    RequestSlot::Upload,
    RequestSlot::ChangePassword,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RequestSlot {
    Status,
    Users,
    Register,
    Login,
    Upload,
    ChangePassword,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    pub register_username: String,
    pub register_password: String,
    pub login_username: String,
    pub login_password: String,
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingMessages {
    pub register: String,
    pub login: String,
    pub change_password: String,
    pub upload: String,
}

impl PendingMessages {
    pub fn get(&self, slot: MessageSlot) -> &str {
        match slot {
            MessageSlot::Register => &self.register,
            MessageSlot::Login => &self.login,
            MessageSlot::ChangePassword => &self.change_password,
            MessageSlot::Upload => &self.upload,
        }
    }

    fn set(&mut self, slot: MessageSlot, message: impl Into<String>) {
        let target = match slot {
            MessageSlot::Register => &mut self.register,
            MessageSlot::Login => &mut self.login,
            MessageSlot::ChangePassword => &mut self.change_password,
            MessageSlot::Upload => &mut self.upload,
        };
        *target = message.into();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status_message: String,
    pub session: SessionStatus,
    pub profile_visible: bool,
    pub profile_image: Option<Url>,
    pub users: Vec<String>,
    pub messages: PendingMessages,
    pub forms: FormFields,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            status_message: text::STATUS_LOADING.to_string(),
            session: SessionStatus::Anonymous,
            profile_visible: false,
            profile_image: None,
            users: Vec::new(),
            messages: PendingMessages::default(),
            forms: FormFields::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    StatusChanged,
    UsersChanged,
    SessionChanged(SessionStatus),
    ProfileChanged,
    MessageChanged(MessageSlot),
    FormsChanged,
}

#[derive(Default)]
struct ControllerState {
    view: SessionSnapshot,
    request_tokens: HashMap<RequestSlot, u64>,
    last_cache_buster: i64,
}

impl ControllerState {
    fn begin_request(&mut self, slot: RequestSlot) -> u64 {
        let token = self.request_tokens.entry(slot).or_default();
        *token += 1;
        *token
    }

    fn is_current(&self, slot: RequestSlot, token: u64) -> bool {
        self.request_tokens.get(&slot).copied() == Some(token)
    }

    // Strictly increasing even when two refreshes land in the same millisecond.
    fn next_cache_buster(&mut self) -> i64 {
        let next = Utc::now()
            .timestamp_millis()
            .max(self.last_cache_buster + 1);
        self.last_cache_buster = next;
        next
    }

    fn refresh_profile_image(&mut self, config: &ClientConfig, username: &Username) {
        let cache_buster = self.next_cache_buster();
        self.view.profile_image = Some(config.profile_picture_url(username, cache_buster));
    }
}

// The state lock is never held across a backend await. A response whose
// request token has been superseded is dropped instead of applied.
pub struct SessionController {
    config: ClientConfig,
    backend: Arc<dyn AccountBackend>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl SessionController {
    pub fn new(config: ClientConfig) -> Result<Arc<Self>, ClientError> {
        let backend = HttpBackend::new(config.clone())?;
        Ok(Self::new_with_backend(config, Arc::new(backend)))
    }

    pub fn new_with_backend(config: ClientConfig, backend: Arc<dyn AccountBackend>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            config,
            backend,
            inner: Mutex::new(ControllerState::default()),
            events,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.view.clone()
    }

    fn emit(&self, events: impl IntoIterator<Item = ControllerEvent>) {
        for event in events {
            // No subscribers is fine; the snapshot stays authoritative.
            let _ = self.events.send(event);
        }
    }

    pub async fn startup(&self) {
        futures::join!(self.fetch_status(), self.fetch_users());
    }

    pub async fn fetch_status(&self) {
        let token = {
            let mut guard = self.inner.lock().await;
            guard.view.status_message = text::STATUS_LOADING.to_string();
            guard.begin_request(RequestSlot::Status)
        };
        self.emit([ControllerEvent::StatusChanged]);

        let message = match self.backend.status().await {
            Ok(response) => response.message,
            Err(err) => {
                warn!(error = %err, "status request failed");
                None
            }
        };

        {
            let mut guard = self.inner.lock().await;
            if !guard.is_current(RequestSlot::Status, token) {
                debug!(token, "discarding superseded status response");
                return;
            }
            guard.view.status_message =
                message.unwrap_or_else(|| text::STATUS_UNREACHABLE.to_string());
        }
        self.emit([ControllerEvent::StatusChanged]);
    }

    pub async fn fetch_users(&self) {
        let token = self.inner.lock().await.begin_request(RequestSlot::Users);

        let users = match self.backend.list_users().await {
            Ok(response) => response.users.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "user directory request failed");
                Vec::new()
            }
        };

        {
            let mut guard = self.inner.lock().await;
            if !guard.is_current(RequestSlot::Users, token) {
                debug!(token, "discarding superseded user directory");
                return;
            }
            guard.view.users = users;
        }
        self.emit([ControllerEvent::UsersChanged]);
    }

    pub async fn register(&self, username: &str, password: &str) {
        let token = {
            let mut guard = self.inner.lock().await;
            guard.view.forms.register_username = username.to_string();
            guard.view.forms.register_password = password.to_string();
            guard
                .view
                .messages
                .set(MessageSlot::Register, text::REGISTER_PENDING);
            guard.begin_request(RequestSlot::Register)
        };
        self.emit([
            ControllerEvent::FormsChanged,
            ControllerEvent::MessageChanged(MessageSlot::Register),
        ]);

        let form = CredentialsForm {
            username: username.to_string(),
            password: password.to_string(),
        };
        let message = match self.backend.register(&form).await {
            Ok(response) => response
                .display_text()
                .unwrap_or(text::REGISTER_FAILED)
                .to_string(),
            Err(err) => {
                warn!(error = %err, username, "registration request failed");
                text::REGISTER_FAILED.to_string()
            }
        };

        let applied = {
            let mut guard = self.inner.lock().await;
            let current = guard.is_current(RequestSlot::Register, token);
            if current {
                guard.view.messages.set(MessageSlot::Register, message);
            } else {
                debug!(token, "discarding superseded registration response");
            }
            current
        };
        if applied {
            self.emit([ControllerEvent::MessageChanged(MessageSlot::Register)]);
        }

        self.fetch_users().await;
    }

    /// Returns whether the session became authenticated.
    pub async fn login(&self, username: &str, password: &str) -> bool {
        let token = {
            let mut guard = self.inner.lock().await;
            guard.view.forms.login_username = username.to_string();
            guard.view.forms.login_password = password.to_string();
            guard
                .view
                .messages
                .set(MessageSlot::Login, text::LOGIN_PENDING);
            guard.begin_request(RequestSlot::Login)
        };
        self.emit([
            ControllerEvent::FormsChanged,
            ControllerEvent::MessageChanged(MessageSlot::Login),
        ]);

        let form = CredentialsForm {
            username: username.to_string(),
            password: password.to_string(),
        };
        let (message, authenticated) = match self.backend.login(&form).await {
            Ok(response) => (
                response
                    .display_text()
                    .unwrap_or(text::LOGIN_FAILED)
                    .to_string(),
                response.is_success(),
            ),
            Err(err) => {
                warn!(error = %err, username, "login request failed");
                (text::LOGIN_FAILED.to_string(), false)
            }
        };

        let session = {
            let mut guard = self.inner.lock().await;
            if !guard.is_current(RequestSlot::Login, token) {
                debug!(token, username, "discarding superseded login response");
                return false;
            }
            guard.view.messages.set(MessageSlot::Login, message);
            if !authenticated {
                None
            } else {
                let user = Username::new(username);
                guard.view.session = SessionStatus::Authenticated(user.clone());
                guard.view.profile_visible = false;
                guard.refresh_profile_image(&self.config, &user);
                guard.view.messages.set(MessageSlot::Upload, "");
                // Uploads and password changes started by a previous user
                // must not land on this one.
                guard.begin_request(RequestSlot::Upload);
                guard.begin_request(RequestSlot::ChangePassword);
                Some(guard.view.session.clone())
            }
        };

        self.emit([ControllerEvent::MessageChanged(MessageSlot::Login)]);
        match session {
            Some(session) => {
                info!(username, "logged in");
                self.emit([
                    ControllerEvent::SessionChanged(session),
                    ControllerEvent::ProfileChanged,
                    ControllerEvent::MessageChanged(MessageSlot::Upload),
                ]);
                true
            }
            None => false,
        }
    }

    pub async fn logout(&self) {
        {
            let mut guard = self.inner.lock().await;
            guard.view.session = SessionStatus::Anonymous;
            guard.view.forms.login_username.clear();
            guard.view.forms.login_password.clear();
            guard.view.profile_visible = false;
            guard.view.profile_image = None;
            guard
                .view
                .messages
                .set(MessageSlot::Login, text::LOGGED_OUT);
            guard.view.messages.set(MessageSlot::Upload, "");
            guard.view.messages.set(MessageSlot::ChangePassword, "");
            for slot in SESSION_SCOPED_REQUESTS {
                guard.begin_request(slot);
            }
        }
        info!("logged out");
        self.emit([
            ControllerEvent::SessionChanged(SessionStatus::Anonymous),
            ControllerEvent::FormsChanged,
            ControllerEvent::ProfileChanged,
            ControllerEvent::MessageChanged(MessageSlot::Login),
            ControllerEvent::MessageChanged(MessageSlot::Upload),
            ControllerEvent::MessageChanged(MessageSlot::ChangePassword),
        ]);
    }

    pub async fn show_profile(&self) -> Result<(), ClientError> {
        {
            let mut guard = self.inner.lock().await;
            if !guard.view.session.is_authenticated() {
                return Err(ClientError::NotAuthenticated);
            }
            guard.view.profile_visible = true;
        }
        self.emit([ControllerEvent::ProfileChanged]);
        Ok(())
    }

    pub async fn hide_profile(&self) {
        self.inner.lock().await.view.profile_visible = false;
        self.emit([ControllerEvent::ProfileChanged]);
    }

    // Returns whether the picture reference was refreshed.
    pub async fn upload_profile_picture(
        &self,
        file: Option<UploadFile>,
    ) -> Result<bool, ClientError> {
        let Some(file) = file else {
            debug!("no file selected for upload");
            return Ok(false);
        };

        let (username, token) = {
            let mut guard = self.inner.lock().await;
            let username = guard
                .view
                .session
                .username()
                .cloned()
                .ok_or(ClientError::NotAuthenticated)?;
            guard.view.messages.set(MessageSlot::Upload, "");
            (username, guard.begin_request(RequestSlot::Upload))
        };
        self.emit([ControllerEvent::MessageChanged(MessageSlot::Upload)]);

        let response = match self
            .backend
            .upload_profile_picture(&username, &file)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, username = %username, "profile picture upload failed");
                return Ok(false);
            }
        };
        if response.filename.as_deref().map_or(true, str::is_empty) {
            warn!(
                username = %username,
                message = response.message.as_deref().unwrap_or_default(),
                "upload response carried no usable filename"
            );
            return Ok(false);
        }

        {
            let mut guard = self.inner.lock().await;
            if !guard.is_current(RequestSlot::Upload, token) {
                debug!(token, "discarding superseded upload response");
                return Ok(false);
            }
            guard.refresh_profile_image(&self.config, &username);
            if let Some(message) = response.message {
                guard.view.messages.set(MessageSlot::Upload, message);
            }
        }
        info!(username = %username, file = %file.file_name, "profile picture uploaded");
        self.emit([
            ControllerEvent::ProfileChanged,
            ControllerEvent::MessageChanged(MessageSlot::Upload),
        ]);
        Ok(true)
    }

    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ClientError> {
        let (username, token) = {
            let mut guard = self.inner.lock().await;
            let username = guard
                .view
                .session
                .username()
                .cloned()
                .ok_or(ClientError::NotAuthenticated)?;
            guard.view.forms.old_password = old_password.to_string();
            guard.view.forms.new_password = new_password.to_string();
            guard
                .view
                .messages
                .set(MessageSlot::ChangePassword, text::CHANGE_PASSWORD_PENDING);
            (username, guard.begin_request(RequestSlot::ChangePassword))
        };
        self.emit([
            ControllerEvent::FormsChanged,
            ControllerEvent::MessageChanged(MessageSlot::ChangePassword),
        ]);

        let form = ChangePasswordForm {
            username: username.as_str().to_string(),
            old_password: old_password.to_string(),
            new_password: new_password.to_string(),
        };
        let message = match self.backend.change_password(&form).await {
            Ok(response) => response
                .display_text()
                .unwrap_or(text::CHANGE_PASSWORD_FAILED)
                .to_string(),
            Err(err) => {
                warn!(error = %err, username = %username, "password change request failed");
                text::CHANGE_PASSWORD_FAILED.to_string()
            }
        };

        let applied = {
            let mut guard = self.inner.lock().await;
            guard.view.forms.old_password.clear();
            guard.view.forms.new_password.clear();
            let current = guard.is_current(RequestSlot::ChangePassword, token);
            if current {
                guard.view.messages.set(MessageSlot::ChangePassword, message);
            } else {
                debug!(token, "discarding superseded password change response");
            }
            current
        };
        self.emit([ControllerEvent::FormsChanged]);
        if applied {
            self.emit([ControllerEvent::MessageChanged(MessageSlot::ChangePassword)]);
        }
        Ok(())
    }

    pub async fn fetch_profile_picture(&self) -> Result<Option<Vec<u8>>, ClientError> {
        let Some(url) = self.inner.lock().await.view.profile_image.clone() else {
            return Ok(None);
        };
        self.backend.fetch_profile_picture(&url).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
