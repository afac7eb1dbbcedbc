//! Best-effort outbound sending through the Messages AppleScript interface.
//!
//! The script text is fixed per target kind. Recipients, text and file paths
//! travel as `argv`, so no user data is ever spliced into script source.
//! Files are copied into a staging directory first because Messages cannot
//! read from most sandboxed locations.

use std::fs;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{ArchiveError, Result};

/// argv: handle, service, text, file
const SEND_TO_HANDLE: &str = r#"on run argv
    set targetHandle to item 1 of argv
    set serviceName to item 2 of argv
    set messageText to item 3 of argv
    set filePath to item 4 of argv
    tell application "Messages"
        if serviceName is "SMS" then
            set targetService to 1st account whose service type = SMS
        else
            set targetService to 1st account whose service type = iMessage
        end if
        set targetBuddy to participant targetHandle of targetService
        if filePath is not "" then send (POSIX file filePath) to targetBuddy
        if messageText is not "" then send messageText to targetBuddy
    end tell
end run"#;

/// argv: chat guid, text, file
const SEND_TO_CHAT: &str = r#"on run argv
    set chatId to item 1 of argv
    set messageText to item 2 of argv
    set filePath to item 3 of argv
    tell application "Messages"
        set targetChat to chat id chatId
        if filePath is not "" then send (POSIX file filePath) to targetChat
        if messageText is not "" then send messageText to targetChat
    end tell
end run"#;

/// Transport used when addressing a handle directly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Apple's messaging service
    IMessage,
    /// Carrier text messaging via a paired phone
    Sms,
}

impl Service {
    /// Parse a configured service name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "iMessage" => Ok(Self::IMessage),
            "SMS" => Ok(Self::Sms),
            other => Err(ArchiveError::InvalidConfig(format!("unknown send service: {other}"))),
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::IMessage => "iMessage",
            Self::Sms => "SMS",
        }
    }
}

/// Who receives the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendTarget {
    /// A phone number or email address
    Handle(String),
    /// An existing chat, by guid (e.g. `iMessage;-;+15551234567`)
    Chat(String),
}

/// One outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    /// Recipient
    pub target: SendTarget,
    /// Text body
    pub text: Option<String>,
    /// File to attach
    pub file: Option<PathBuf>,
}

/// A script plus the arguments it runs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// AppleScript source
    pub script: &'static str,
    /// Values bound to `argv`
    pub args: Vec<String>,
}

/// Pick the script for `request` and lay out its arguments.
#[must_use]
pub fn build_invocation(request: &SendRequest, service: Service, staged_file: Option<&Path>) -> Invocation {
    let text = request.text.clone().unwrap_or_default();
    let file = staged_file.map(|p| p.display().to_string()).unwrap_or_default();

    match &request.target {
        SendTarget::Handle(handle) => Invocation {
            script: SEND_TO_HANDLE,
            args: vec![handle.clone(), service.as_str().to_string(), text, file],
        },
        SendTarget::Chat(guid) => Invocation {
            script: SEND_TO_CHAT,
            args: vec![guid.clone(), text, file],
        },
    }
}

/// Copy `source` into a fresh directory under `staging_dir`, keeping its name.
pub fn stage_attachment(source: &Path, staging_dir: &Path) -> Result<PathBuf> {
    let name = source
        .file_name()
        .ok_or_else(|| ArchiveError::InvalidInput(format!("not a file: {}", source.display())))?;

    let dir = staging_dir.join(uuid::Uuid::new_v4().to_string());
    fs::create_dir_all(&dir)?;
    let staged = dir.join(name);
    fs::copy(source, &staged)?;

    debug!(from = %source.display(), to = %staged.display(), "Staged attachment");
    Ok(staged)
}

/// Sends messages by driving `osascript`
#[derive(Debug, Clone)]
pub struct Sender {
    osascript: PathBuf,
    staging_dir: PathBuf,
    service: Service,
}

impl Sender {
    /// Create a sender with explicit settings
    #[must_use]
    pub const fn new(osascript: PathBuf, staging_dir: PathBuf, service: Service) -> Self {
        Self {
            osascript,
            staging_dir,
            service,
        }
    }

    /// Create a sender from the application configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            PathBuf::from(&config.send.osascript_path),
            config.staging_dir(),
            Service::from_name(&config.send.service)?,
        ))
    }

    /// Send one message. Delivery is not confirmed; success means Messages accepted the command.
    pub async fn send(&self, request: &SendRequest) -> Result<()> {
        if request.text.as_deref().is_none_or(str::is_empty) && request.file.is_none() {
            return Err(ArchiveError::InvalidInput("nothing to send: give text or a file".to_string()));
        }

        let staged = match &request.file {
            Some(file) => Some(stage_attachment(file, &self.staging_dir)?),
            None => None,
        };
        let invocation = build_invocation(request, self.service, staged.as_deref());

        let output = Command::new(&self.osascript)
            .arg("-e")
            .arg(invocation.script)
            .args(&invocation.args)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(status = ?output.status, stderr = %stderr, "osascript failed");
            return Err(ArchiveError::Send(if stderr.is_empty() {
                format!("osascript exited with {}", output.status)
            } else {
                stderr
            }));
        }

        info!(recipient = ?request.target, attachment = staged.is_some(), "Message handed to Messages");
        Ok(())
    }
}
