use std::fmt::Write as _;

use client_core::SessionSnapshot;
use shared::domain::SessionStatus;

pub fn render_snapshot(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "DoorQuest");
    let _ = writeln!(out, "Backend says: {}", snapshot.status_message);
    out.push_str(&rule());

    match &snapshot.session {
        SessionStatus::Authenticated(username) => {
            let _ = writeln!(out, "Welcome, {username}!");
            if snapshot.profile_visible {
                out.push_str(&render_profile(snapshot, username.as_str()));
            } else {
                let _ = writeln!(out, "(type `profile` to open your profile)");
            }
        }
        SessionStatus::Anonymous => {
            let _ = writeln!(out, "Login");
            push_message(&mut out, &snapshot.messages.login);
        }
    }

    out.push_str(&rule());
    let _ = writeln!(out, "Register");
    push_message(&mut out, &snapshot.messages.register);
    out.push_str(&rule());
    out.push_str(&render_users(&snapshot.users));
    out
}

fn render_profile(snapshot: &SessionSnapshot, username: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "User Profile");
    let _ = writeln!(out, "  Username: {username}");
    if let Some(image) = &snapshot.profile_image {
        let _ = writeln!(out, "  Picture:  {image}");
    }
    push_message(&mut out, &snapshot.messages.upload);
    let _ = writeln!(out, "Change Password");
    push_message(&mut out, &snapshot.messages.change_password);
    out
}

pub fn render_users(users: &[String]) -> String {
    let mut out = String::from("Registered Users\n");
    if users.is_empty() {
        out.push_str("  (none)\n");
    }
    for user in users {
        let _ = writeln!(out, "  - {user}");
    }
    out
}

fn push_message(out: &mut String, message: &str) {
    if !message.is_empty() {
        let _ = writeln!(out, "  {message}");
    }
}

fn rule() -> String {
    format!("{}\n", "-".repeat(32))
}
