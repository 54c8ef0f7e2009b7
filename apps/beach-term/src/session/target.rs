use bytes::Bytes;

use super::SessionError;
use super::events::{self, HostRequest, ShareRoomRequest, TokenRequest, name};
use super::secret::SessionSecret;
use crate::terminal::TerminalSize;

/// What a session asks the proxy for. Exactly one kind per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTarget {
    /// New shell against a host as a given system user.
    Host {
        host_id: String,
        system_user_id: String,
        /// Connection type reported to the proxy (`ssh`, `telnet`, ...).
        protocol: String,
    },
    /// Read-along view of someone else's room.
    ShareRoom { share_room_id: String },
    /// Resume a session from an opaque token.
    Token { token: String },
}

impl SessionTarget {
    pub fn host(
        host_id: impl Into<String>,
        system_user_id: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        SessionTarget::Host {
            host_id: host_id.into(),
            system_user_id: system_user_id.into(),
            protocol: protocol.into(),
        }
    }

    pub fn share_room(share_room_id: impl Into<String>) -> Self {
        SessionTarget::ShareRoom {
            share_room_id: share_room_id.into(),
        }
    }

    pub fn token(token: impl Into<String>) -> Self {
        SessionTarget::Token {
            token: token.into(),
        }
    }

    /// Builds a target from the loose inputs a view is mounted with.
    pub fn from_inputs(
        host_id: Option<&str>,
        system_user_id: Option<&str>,
        share_room_id: Option<&str>,
        token: Option<&str>,
        protocol: &str,
    ) -> Result<Self, SessionError> {
        let present = [host_id, share_room_id, token]
            .iter()
            .filter(|field| field.is_some())
            .count();
        if present == 0 {
            return Err(SessionError::MissingTarget);
        }
        if present > 1 {
            return Err(SessionError::AmbiguousTarget);
        }

        if let Some(host_id) = host_id {
            let host_id = non_blank(host_id, "host id")?;
            let system_user_id = system_user_id
                .ok_or_else(|| SessionError::InvalidTarget("host requires a system user".into()))
                .and_then(|user| non_blank(user, "system user id"))?;
            let protocol = non_blank(protocol, "connection type")?;
            return Ok(SessionTarget::host(host_id, system_user_id, protocol));
        }
        if let Some(share_room_id) = share_room_id {
            return Ok(SessionTarget::share_room(non_blank(
                share_room_id,
                "share room id",
            )?));
        }
        match token {
            Some(token) => Ok(SessionTarget::token(non_blank(token, "token")?)),
            None => Err(SessionError::MissingTarget),
        }
    }

    /// Observers watch a room they do not own.
    pub fn is_observer(&self) -> bool {
        matches!(self, SessionTarget::ShareRoom { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionTarget::Host { .. } => "host",
            SessionTarget::ShareRoom { .. } => "share_room",
            SessionTarget::Token { .. } => "token",
        }
    }

    /// Event name and encoded payload that open this session.
    pub fn initiation(
        &self,
        secret: &SessionSecret,
        size: TerminalSize,
    ) -> Result<(&'static str, Bytes), SessionError> {
        let size = size.as_pair();
        let secret = secret.clone();
        let initiation = match self {
            SessionTarget::Host {
                host_id,
                system_user_id,
                protocol,
            } => (
                name::HOST,
                events::encode(&HostRequest {
                    uuid: host_id.clone(),
                    userid: system_user_id.clone(),
                    secret,
                    size,
                    protocol: protocol.clone(),
                })?,
            ),
            SessionTarget::ShareRoom { share_room_id } => (
                name::SHARE_ROOM,
                events::encode(&ShareRoomRequest {
                    share_room_id: share_room_id.clone(),
                    secret,
                    size,
                })?,
            ),
            SessionTarget::Token { token } => (
                name::TOKEN,
                events::encode(&TokenRequest {
                    token: token.clone(),
                    secret,
                    size,
                })?,
            ),
        };
        Ok(initiation)
    }
}

fn non_blank(value: &str, field: &str) -> Result<String, SessionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SessionError::InvalidTarget(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn host_inputs_build_host_target() {
        let target =
            SessionTarget::from_inputs(Some("h1"), Some("u1"), None, None, "ssh").unwrap();
        assert_eq!(target, SessionTarget::host("h1", "u1", "ssh"));
        assert!(!target.is_observer());
    }

    #[test]
    fn share_room_is_observer() {
        let target = SessionTarget::from_inputs(None, None, Some("room-9"), None, "ssh").unwrap();
        assert!(target.is_observer());
        assert_eq!(target.label(), "share_room");
    }

    #[test]
    fn rejects_missing_and_ambiguous_inputs() {
        assert!(matches!(
            SessionTarget::from_inputs(None, None, None, None, "ssh"),
            Err(SessionError::MissingTarget)
        ));
        assert!(matches!(
            SessionTarget::from_inputs(Some("h1"), Some("u1"), None, Some("t"), "ssh"),
            Err(SessionError::AmbiguousTarget)
        ));
    }

    #[test]
    fn rejects_host_without_user_and_blank_ids() {
        assert!(matches!(
            SessionTarget::from_inputs(Some("h1"), None, None, None, "ssh"),
            Err(SessionError::InvalidTarget(_))
        ));
        assert!(matches!(
            SessionTarget::from_inputs(None, None, None, Some("  "), "ssh"),
            Err(SessionError::InvalidTarget(_))
        ));
    }

    #[test]
    fn token_initiation_payload() {
        let target = SessionTarget::token("tok");
        let (event, payload) = target
            .initiation(&SessionSecret::new("s1"), TerminalSize::new(80, 24))
            .unwrap();
        assert_eq!(event, "token");
        let value: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value, json!({"token": "tok", "secret": "s1", "size": [80, 24]}));
    }
}
