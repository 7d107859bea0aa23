//! The `mail` action: send the results as a plain-text mail.
//!
//! The message is built with `lettre`, which takes care of header encoding,
//! and delivered over one of two transports:
//!
//! * `smtp` (default): to `host`/`port`, in plain text, over implicit TLS
//!   (`ssl`) or upgraded with `starttls`, optionally authenticated.
//! * `sendmail`: handed to a local sendmail-compatible command on stdin. The
//!   command line is split with `shell-words` and executed directly, never
//!   through a shell.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{Action, ActionData, ActionError, ActionResult};
use crate::config::{ConfigError, ConfigResult, OneOrMany};

/// Configuration `type` of this action.
pub const KIND: &str = "mail";

pub const DEFAULT_SUBJECT: &str = "unusual system events";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_SENDMAIL: &str = "/usr/sbin/sendmail -t -oi";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TransportKind {
    #[default]
    Smtp,
    Sendmail,
}

#[derive(Debug, Deserialize)]
struct MailSettings {
    to: Option<OneOrMany<String>>,
    from: Option<String>,
    subject: Option<String>,
    #[serde(default)]
    group: bool,
    #[serde(default)]
    transport: TransportKind,
    host: Option<String>,
    port: Option<u16>,
    #[serde(default)]
    ssl: bool,
    #[serde(default)]
    starttls: bool,
    username: Option<String>,
    password: Option<String>,
    sendmail: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    Plain,
    /// TLS from the first byte.
    Tls,
    StartTls,
}

#[derive(Clone)]
pub struct SmtpServer {
    pub host: String,
    /// `None` picks the default port of the security mode.
    pub port: Option<u16>,
    pub security: Security,
    credentials: Option<(String, String)>,
}

impl SmtpServer {
    pub fn username(&self) -> Option<&str> {
        self.credentials.as_ref().map(|(user, _)| user.as_str())
    }
}

impl fmt::Debug for SmtpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpServer")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum Transport {
    Smtp(SmtpServer),
    Sendmail(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct MailAction {
    sender: Mailbox,
    recipients: Vec<Mailbox>,
    subject: String,
    group_by_source: bool,
    transport: Transport,
    timeout: Duration,
}

impl MailAction {
    pub fn from_settings(settings: &toml::Table) -> ConfigResult<Self> {
        let settings: MailSettings = toml::Value::Table(settings.clone())
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Invalid(e.message().to_string()))?;

        let mut recipients = settings.to.map(OneOrMany::into_vec).unwrap_or_default();
        recipients.retain(|r| !r.is_empty());
        recipients.sort();
        recipients.dedup();
        if recipients.is_empty() {
            return Err(ConfigError::Invalid("email recipient (to) missing".into()));
        }
        let recipients = recipients
            .iter()
            .map(|r| parse_mailbox(r))
            .collect::<ConfigResult<Vec<_>>>()?;

        let sender = match settings.from.filter(|f| !f.is_empty()) {
            Some(from) => parse_mailbox(&from)?,
            None => default_sender()?,
        };

        let subject = settings.subject.unwrap_or_else(|| DEFAULT_SUBJECT.into());
        if subject.contains(['\r', '\n']) {
            return Err(ConfigError::Invalid("subject must be a single line".into()));
        }

        let transport = match settings.transport {
            TransportKind::Smtp => {
                if settings.ssl && settings.starttls {
                    return Err(ConfigError::Invalid(
                        "ssl and starttls are mutually exclusive".into(),
                    ));
                }
                let credentials = match (settings.username, settings.password) {
                    (Some(user), Some(pass)) => Some((user, pass)),
                    (None, None) => None,
                    _ => {
                        return Err(ConfigError::Invalid(
                            "username and password must both be set or unset".into(),
                        ));
                    }
                };
                Transport::Smtp(SmtpServer {
                    host: settings
                        .host
                        .filter(|h| !h.is_empty())
                        .unwrap_or_else(|| DEFAULT_HOST.into()),
                    port: settings.port.filter(|p| *p != 0),
                    security: match (settings.ssl, settings.starttls) {
                        (true, _) => Security::Tls,
                        (_, true) => Security::StartTls,
                        _ => Security::Plain,
                    },
                    credentials,
                })
            }
            TransportKind::Sendmail => {
                let command = settings.sendmail.as_deref().unwrap_or(DEFAULT_SENDMAIL);
                let argv = shell_words::split(command)
                    .map_err(|e| ConfigError::Invalid(format!("invalid sendmail command: {e}")))?;
                if argv.is_empty() {
                    return Err(ConfigError::Invalid("sendmail command is empty".into()));
                }
                Transport::Sendmail(argv)
            }
        };

        Ok(Self {
            sender,
            recipients,
            subject,
            group_by_source: settings.group,
            transport,
            timeout: Duration::from_secs(settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }

    pub fn sender(&self) -> &Mailbox {
        &self.sender
    }

    pub fn recipients(&self) -> &[Mailbox] {
        &self.recipients
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Plain-text body: one underlined section per log, in log name order.
    pub fn build_body(&self, data: &ActionData) -> String {
        let mut msg: Vec<String> = Vec::new();
        for (log, results) in data {
            if results.is_empty() {
                continue;
            }
            let mut lines: Vec<_> = results.lines.iter().collect();
            if self.group_by_source {
                lines.sort_by_cached_key(|l| l.parsed.source.to_lowercase());
            }
            if !msg.is_empty() {
                msg.extend(std::iter::repeat_n(String::new(), 3));
            }
            msg.extend(underlined(&format!("Results for '{log}'"), "=-"));
            msg.push(String::new());
            if !results.unparsable.is_empty() {
                msg.extend(underlined("Unparsable lines", "~"));
                msg.extend(results.unparsable.iter().cloned());
            }
            if !results.unparsable.is_empty() && !lines.is_empty() {
                msg.push(String::new());
            }
            if !lines.is_empty() {
                msg.extend(underlined("Unusual lines", "-"));
                msg.extend(lines.iter().map(|l| l.raw.clone()));
            }
        }
        msg.join("\n")
    }

    /// The complete message, headers encoded as needed.
    pub fn compose(&self, data: &ActionData) -> ActionResult<Message> {
        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(self.subject.as_str())
            .date_now();
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }
        let message = builder
            .header(ContentType::TEXT_PLAIN)
            .body(format!("{}\n", self.build_body(data)))?;
        Ok(message)
    }

    async fn send_smtp(&self, server: &SmtpServer, message: Message) -> ActionResult<()> {
        let smtp_err = |source| ActionError::Smtp {
            host: server.host.clone(),
            source,
        };
        let mut builder = match server.security {
            Security::Plain => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&server.host),
            Security::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&server.host).map_err(smtp_err)?,
            Security::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&server.host).map_err(smtp_err)?
            }
        };
        if let Some(port) = server.port {
            builder = builder.port(port);
        }
        if let Some((user, pass)) = &server.credentials {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        let transport = builder.timeout(Some(self.timeout)).build();
        transport.send(message).await.map_err(smtp_err)?;
        Ok(())
    }

    async fn send_sendmail(&self, argv: &[String], message: &[u8]) -> ActionResult<()> {
        let program = argv[0].clone();
        let mut child = Command::new(&program)
            .args(&argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ActionError::Spawn {
                program: program.clone(),
                source,
            })?;

        let result = tokio::time::timeout(self.timeout, async move {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(message).await?;
                stdin.shutdown().await?;
            }
            child.wait_with_output().await
        })
        .await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(ActionError::Io { program, source }),
            Err(_) => {
                return Err(ActionError::Timeout {
                    program,
                    secs: self.timeout.as_secs(),
                });
            }
        };
        if !output.status.success() {
            return Err(ActionError::Exit {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Action for MailAction {
    fn kind(&self) -> &str {
        KIND
    }

    async fn run(&self, data: &ActionData, dry_run: bool) -> ActionResult<()> {
        let message = self.compose(data)?;
        let recipients: Vec<String> = self.recipients.iter().map(ToString::to_string).collect();
        if dry_run {
            debug!(?recipients, "not sending mail due to dry-run");
            return Ok(());
        }
        match &self.transport {
            Transport::Smtp(server) => {
                debug!(host = %server.host, port = ?server.port, ?recipients, "sending mail via smtp");
                self.send_smtp(server, message).await
            }
            Transport::Sendmail(argv) => {
                debug!(command = ?argv, ?recipients, "sending mail via sendmail");
                self.send_sendmail(argv, &message.formatted()).await
            }
        }
    }
}

/// `text` followed by a line of `chars`, repeated to the length of `text`.
pub fn underlined(text: &str, chars: &str) -> [String; 2] {
    let underline = chars.chars().cycle().take(text.chars().count()).collect();
    [text.to_string(), underline]
}

fn parse_mailbox(raw: &str) -> ConfigResult<Mailbox> {
    raw.parse()
        .map_err(|e| ConfigError::Invalid(format!("invalid email address {raw:?}: {e}")))
}

/// `$USER@hostname`, falling back to `localhost` for hostnames that are not
/// valid mail domains.
fn default_sender() -> ConfigResult<Mailbox> {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "root".into());
    let host = gethostname::gethostname().to_string_lossy().into_owned();
    format!("{user}@{host}")
        .parse()
        .or_else(|_| parse_mailbox(&format!("{user}@localhost")))
}
