//! Outbound notification mail.
//!
//! # Responsibility
//! - Define the mail sender seam consumed by the engines.
//! - Compose out-of-date notices for package maintainers.
//!
//! # Invariants
//! - Mail is sent only after the triggering transaction committed.
//! - A send failure never undoes the committed change; callers log and move on.

use crate::config::CoreConfig;
use crate::model::{PackageId, UserId};
use std::error::Error;
use std::fmt::{Display, Formatter};

const BODY_WRAP_COLUMNS: usize = 70;

/// One plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub from: String,
    pub reply_to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailError {
    pub message: String,
}

impl MailError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for MailError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "mail delivery failed: {}", self.message)
    }
}

impl Error for MailError {}

/// Best-effort mail transport.
pub trait MailSender {
    fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Sender that drops every message. Used when no transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMailSender;

impl MailSender for NoopMailSender {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        log::debug!(
            "event=mail_send module=mail status=skipped subject_len={}",
            message.subject.len()
        );
        Ok(())
    }
}

impl<M: MailSender + ?Sized> MailSender for &M {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        (**self).send(message)
    }
}

/// Builds the notice sent to a maintainer whose package got flagged.
pub fn out_of_date_notice(
    config: &CoreConfig,
    to: &str,
    package_id: PackageId,
    package_name: &str,
    flagger_name: &str,
    flagger_id: UserId,
) -> MailMessage {
    let site = config.site_url.trim_end_matches('/');
    let body = format!(
        "Your package {package_name} has been flagged out of date by {flagger_name} [1]. \
         You may view your package at:\n{site}/packages/{package_id}\n\n\
         [1] - {site}/account/{flagger_id}"
    );

    MailMessage {
        to: to.to_string(),
        from: config.mail.from.clone(),
        reply_to: config.mail.reply_to.clone(),
        subject: format!("Out-of-date Notification for {package_name}"),
        body: wrap_text(&body, BODY_WRAP_COLUMNS),
    }
}

/// Greedy word wrap. Words longer than `width` stay on their own line.
pub fn wrap_text(text: &str, width: usize) -> String {
    text.split('\n')
        .map(|line| wrap_line(line, width))
        .collect::<Vec<_>>()
        .join("\n")
}

fn wrap_line(line: &str, width: usize) -> String {
    let mut wrapped = String::with_capacity(line.len());
    let mut current = 0usize;
    for word in line.split_whitespace() {
        let len = word.chars().count();
        if current > 0 && current + 1 + len > width {
            wrapped.push('\n');
            current = 0;
        } else if current > 0 {
            wrapped.push(' ');
            current += 1;
        }
        wrapped.push_str(word);
        current += len;
    }
    wrapped
}
