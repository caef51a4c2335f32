//! User-facing commands for handing out temporary attributes.
//!
//! Two commands are supported:
//!
//! - [`temp_role`]: give an existing attribute to a subject for a while.
//! - [`assign_new`]: create a fresh attribute, give it to a subject, and
//!   delete it again once the grant ends and nobody holds it.
//!
//! Input problems (bad or overlong duration, unknown subject, no such role)
//! come back as a [`CommandReply`] rather than an error. Validation happens
//! before any directory call, so a rejected command changes nothing. Errors
//! are reserved for directory failures.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use timegrant_core::{parse_duration, AttributeId, CoreError, GrantRecord, ScopeId, SubjectId};
use timegrant_directory::{Attribute, AttributeColor, Directory};
use timegrant_store::SnapshotStore;

use crate::error::Result;
use crate::manager::GrantManager;

/// How a command went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Success,
    /// The input was rejected; nothing changed.
    Warning,
    /// Something the command needed could not be found.
    Failure,
}

impl ReplyStatus {
    /// Reaction emoji for chat front ends.
    pub fn emoji(self) -> &'static str {
        match self {
            ReplyStatus::Success => "\u{2705}",
            ReplyStatus::Warning => "\u{26a0}\u{fe0f}",
            ReplyStatus::Failure => "\u{274c}",
        }
    }
}

/// Answer to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub status: ReplyStatus,
    pub message: String,
    /// Set on success.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CommandReply {
    fn success(expires_at: DateTime<Utc>) -> Self {
        Self {
            status: ReplyStatus::Success,
            message: format!(
                "Role added to user until {}!",
                expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            expires_at: Some(expires_at),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Warning,
            message: message.into(),
            expires_at: None,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Failure,
            message: message.into(),
            expires_at: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }
}

impl fmt::Display for CommandReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.emoji(), self.message)
    }
}

/// How a command names an existing role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleQuery {
    Id(AttributeId),
    Name(String),
}

impl FromStr for RoleQuery {
    type Err = std::convert::Infallible;

    /// Numeric ids, also as `<@&id>` mentions, are ids; anything else is a name.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("<@&")
            .and_then(|rest| rest.strip_suffix('>'))
            .unwrap_or(trimmed);
        Ok(match digits.parse::<u64>() {
            Ok(id) => RoleQuery::Id(AttributeId::new(id)),
            Err(_) => RoleQuery::Name(trimmed.to_string()),
        })
    }
}

impl fmt::Display for RoleQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleQuery::Id(id) => write!(f, "{id}"),
            RoleQuery::Name(name) => f.write_str(name),
        }
    }
}

/// Pick the attribute a role query refers to.
///
/// Names match case-insensitively: an exact match beats a prefix match,
/// which beats a substring match. Ties go to the shorter name, then the
/// lower id.
pub fn find_role<'a>(attributes: &'a [Attribute], query: &RoleQuery) -> Option<&'a Attribute> {
    match query {
        RoleQuery::Id(id) => attributes.iter().find(|a| a.id == *id),
        RoleQuery::Name(name) => {
            let wanted = name.to_lowercase();
            if wanted.is_empty() {
                return None;
            }
            attributes
                .iter()
                .filter_map(|a| {
                    let candidate = a.name.to_lowercase();
                    let rank = if candidate == wanted {
                        0
                    } else if candidate.starts_with(&wanted) {
                        1
                    } else if candidate.contains(&wanted) {
                        2
                    } else {
                        return None;
                    };
                    Some((rank, a.name.len(), a.id, a))
                })
                .min_by_key(|(rank, len, id, _)| (*rank, *len, *id))
                .map(|(_, _, _, a)| a)
        }
    }
}

/// Parse `duration` and turn it into an expiry instant from now.
fn expiry(duration: &str) -> std::result::Result<DateTime<Utc>, CommandReply> {
    parse_duration(duration)
        .map_err(CoreError::from)
        .and_then(|seconds| GrantRecord::expiry_after(Utc::now(), seconds))
        .map_err(|e| match e {
            CoreError::Parse(e) => CommandReply::warning(e.to_string()),
            e => CommandReply::warning(format!("Duration is too long: {e}")),
        })
}

/// Give an existing role to `subject` for `duration`.
pub async fn temp_role<D, S>(
    manager: &GrantManager<D, S>,
    scope: ScopeId,
    subject: SubjectId,
    role: &RoleQuery,
    duration: &str,
) -> Result<CommandReply>
where
    D: Directory + 'static,
    S: SnapshotStore,
{
    let expires_at = match expiry(duration) {
        Ok(expires_at) => expires_at,
        Err(reply) => return Ok(reply),
    };

    let directory = manager.directory();
    let Some(member) = directory.resolve_subject(subject).await? else {
        return Ok(CommandReply::failure(format!("Could not find user {subject}")));
    };

    let attributes = directory.list_attributes(scope).await?;
    let Some(attribute) = find_role(&attributes, role) else {
        return Ok(CommandReply::failure(format!(
            "Could not determine role from input: `{role}`"
        )));
    };

    directory.add_attribute(scope, &member, attribute.id).await?;
    manager
        .grant_until(scope, subject, attribute.id, expires_at, false)
        .await;

    info!(%scope, subject = %member.name, role = %attribute.name, %expires_at, "granted temporary role");
    Ok(CommandReply::success(expires_at))
}

/// Create a role called `name`, give it to `subject` for `duration`, and
/// delete it once nobody holds it any more.
///
/// `color` is up to six hex digits, e.g. `ff8800`.
pub async fn assign_new<D, S>(
    manager: &GrantManager<D, S>,
    scope: ScopeId,
    subject: SubjectId,
    name: &str,
    duration: &str,
    color: Option<&str>,
) -> Result<CommandReply>
where
    D: Directory + 'static,
    S: SnapshotStore,
{
    let expires_at = match expiry(duration) {
        Ok(expires_at) => expires_at,
        Err(reply) => return Ok(reply),
    };

    let color = match color.map(AttributeColor::from_hex).transpose() {
        Ok(color) => color,
        Err(e) => return Ok(CommandReply::warning(e.to_string())),
    };

    let name = name.trim();
    if name.is_empty() {
        return Ok(CommandReply::warning("Role name must not be empty"));
    }

    let directory = manager.directory();
    let Some(member) = directory.resolve_subject(subject).await? else {
        return Ok(CommandReply::failure(format!("Could not find user {subject}")));
    };

    let attribute = directory.create_attribute(scope, name, color).await?;
    directory.add_attribute(scope, &member, attribute).await?;
    manager
        .grant_until(scope, subject, attribute, expires_at, true)
        .await;

    info!(%scope, subject = %member.name, role = name, %attribute, %expires_at, "created temporary role");
    Ok(CommandReply::success(expires_at))
}
