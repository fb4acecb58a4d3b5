use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use client_core::{ClientError, SessionController, UploadFile};
use shared::domain::MessageSlot;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::render::{render_snapshot, render_users};

pub const HELP: &str = "\
commands:
  status                  refresh the backend status line
  users                   refresh and list registered users
  register <user> <pass>  create an account
  login <user> <pass>     log in
  logout                  log out
  profile | hide          open or close the profile panel
  upload [path]           upload a profile picture (no path: nothing selected)
  passwd <old> <new>      change password
  picture <out-path>      save the current profile picture
  show                    print the whole screen
  help                    this text
  quit                    exit";

const UPLOAD_NEEDS_LOGIN: &str = "Log in before uploading a picture.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Status,
    Users,
    Register { username: String, password: String },
    Login { username: String, password: String },
    Logout,
    ShowProfile,
    HideProfile,
    Upload { path: Option<PathBuf> },
    ChangePassword { old_password: String, new_password: String },
    SavePicture { path: PathBuf },
    Show,
    Help,
    Quit,
}

impl ShellCommand {
    // Arguments may hold passwords.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Users => "users",
            Self::Register { .. } => "register",
            Self::Login { .. } => "login",
            Self::Logout => "logout",
            Self::ShowProfile => "profile",
            Self::HideProfile => "hide",
            Self::Upload { .. } => "upload",
            Self::ChangePassword { .. } => "passwd",
            Self::SavePicture { .. } => "picture",
            Self::Show => "show",
            Self::Help => "help",
            Self::Quit => "quit",
        }
    }
}

pub fn parse_command(line: &str) -> Result<Option<ShellCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("status", []) => ShellCommand::Status,
        ("users", []) => ShellCommand::Users,
        ("register", [username, password]) => ShellCommand::Register {
            username: username.to_string(),
            password: password.to_string(),
        },
        ("login", [username, password]) => ShellCommand::Login {
            username: username.to_string(),
            password: password.to_string(),
        },
        ("logout", []) => ShellCommand::Logout,
        ("profile", []) => ShellCommand::ShowProfile,
        ("hide", []) => ShellCommand::HideProfile,
        ("upload", []) => ShellCommand::Upload { path: None },
        ("upload", [path]) => ShellCommand::Upload {
            path: Some(PathBuf::from(path)),
        },
        ("passwd", [old_password, new_password]) => ShellCommand::ChangePassword {
            old_password: old_password.to_string(),
            new_password: new_password.to_string(),
        },
        ("picture", [path]) => ShellCommand::SavePicture {
            path: PathBuf::from(path),
        },
        ("show", []) => ShellCommand::Show,
        ("help" | "?", []) => ShellCommand::Help,
        ("quit" | "exit", []) => ShellCommand::Quit,
        (
            "status" | "users" | "register" | "login" | "logout" | "profile" | "hide" | "upload"
            | "passwd" | "picture" | "show" | "help" | "quit",
            _,
        ) => return Err(format!("wrong arguments for '{verb}' (type `help`)")),
        _ => return Err(format!("unknown command '{verb}' (type `help`)")),
    };
    Ok(Some(command))
}

pub enum Flow {
    Continue(String),
    Quit,
}

pub async fn execute(controller: &SessionController, command: ShellCommand) -> Result<Flow> {
    let output = match command {
        ShellCommand::Status => {
            controller.fetch_status().await;
            format!(
                "Backend says: {}",
                controller.snapshot().await.status_message
            )
        }
        ShellCommand::Users => {
            controller.fetch_users().await;
            render_users(&controller.snapshot().await.users)
        }
        ShellCommand::Register { username, password } => {
            controller.register(&username, &password).await;
            let snapshot = controller.snapshot().await;
            format!(
                "{}\n{}",
                snapshot.messages.get(MessageSlot::Register),
                render_users(&snapshot.users)
            )
        }
        ShellCommand::Login { username, password } => {
            controller.login(&username, &password).await;
            slot_message(controller, MessageSlot::Login).await
        }
        ShellCommand::Logout => {
            controller.logout().await;
            slot_message(controller, MessageSlot::Login).await
        }
        ShellCommand::ShowProfile => match controller.show_profile().await {
            Ok(()) => render_snapshot(&controller.snapshot().await),
            Err(ClientError::NotAuthenticated) => "Log in to see your profile.".to_string(),
            Err(err) => return Err(err.into()),
        },
        ShellCommand::HideProfile => {
            controller.hide_profile().await;
            "Profile closed.".to_string()
        }
        ShellCommand::Upload { path } => {
            let file = match path {
                Some(_) if !controller.snapshot().await.session.is_authenticated() => {
                    return Ok(Flow::Continue(UPLOAD_NEEDS_LOGIN.to_string()));
                }
                Some(path) => Some(UploadFile::from_path(&path).await?),
                None => None,
            };
            match controller.upload_profile_picture(file).await {
                Ok(true) => slot_message(controller, MessageSlot::Upload).await,
                Ok(false) => String::new(),
                Err(ClientError::NotAuthenticated) => UPLOAD_NEEDS_LOGIN.to_string(),
                Err(err) => return Err(err.into()),
            }
        }
        ShellCommand::ChangePassword {
            old_password,
            new_password,
        } => match controller
            .change_password(&old_password, &new_password)
            .await
        {
            Ok(()) => slot_message(controller, MessageSlot::ChangePassword).await,
            Err(ClientError::NotAuthenticated) => {
                "Log in before changing your password.".to_string()
            }
            Err(err) => return Err(err.into()),
        },
        ShellCommand::SavePicture { path } => match controller.fetch_profile_picture().await? {
            Some(bytes) => {
                tokio::fs::write(&path, &bytes)
                    .await
                    .with_context(|| format!("failed to write '{}'", path.display()))?;
                format!("Saved {} bytes to {}", bytes.len(), path.display())
            }
            None => "No profile picture available.".to_string(),
        },
        ShellCommand::Show => render_snapshot(&controller.snapshot().await),
        ShellCommand::Help => HELP.to_string(),
        ShellCommand::Quit => return Ok(Flow::Quit),
    };
    Ok(Flow::Continue(output))
}

async fn slot_message(controller: &SessionController, slot: MessageSlot) -> String {
    controller.snapshot().await.messages.get(slot).to_string()
}

// Command failures are reported and the loop keeps going.
pub async fn run<R, W>(controller: Arc<SessionController>, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    output.write_all(b"> ").await?;
    output.flush().await?;
    while let Some(line) = lines.next_line().await? {
        let text = match parse_command(&line) {
            Ok(None) => String::new(),
            Ok(Some(command)) => {
                debug!(command = command.name(), "executing shell command");
                match execute(&controller, command).await {
                    Ok(Flow::Continue(text)) => text,
                    Ok(Flow::Quit) => break,
                    Err(err) => format!("error: {err:#}"),
                }
            }
            Err(message) => message,
        };
        if !text.is_empty() {
            output.write_all(text.trim_end().as_bytes()).await?;
            output.write_all(b"\n").await?;
        }
        output.write_all(b"> ").await?;
        output.flush().await?;
    }
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/shell_tests.rs"]
mod tests;
