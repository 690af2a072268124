use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

/// Whether a session serves one user or a pair
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Single,
    Collaborative,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Completed,
    Cancelled,
}

impl Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionKind::Single => write!(f, "single"),
            SessionKind::Collaborative => write!(f, "collaborative"),
        }
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Active => write!(f, "active"),
            SessionState::Completed => write!(f, "completed"),
            SessionState::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl SessionKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "single" => Some(SessionKind::Single),
            "collaborative" => Some(SessionKind::Collaborative),
            _ => None,
        }
    }

    /// Number of participants a session of this kind must have
    pub fn participants(&self) -> usize {
        match self {
            SessionKind::Single => 1,
            SessionKind::Collaborative => 2,
        }
    }
}

impl SessionState {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(SessionState::Active),
            "completed" => Some(SessionState::Completed),
            "cancelled" => Some(SessionState::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// A viewing session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub kind: SessionKind,
    /// Participants in join order; index 0 is "user 1"
    pub users: Vec<User>,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn single(user_name: impl Into<String>) -> Self {
        Self::with_users(SessionKind::Single, vec![User::new(user_name)])
    }

    pub fn collaborative(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self::with_users(
            SessionKind::Collaborative,
            vec![User::new(first), User::new(second)],
        )
    }

    fn with_users(kind: SessionKind, users: Vec<User>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            users,
            state: SessionState::Active,
            created_at: Utc::now(),
        }
    }

    pub fn has_user(&self, user_id: Uuid) -> bool {
        self.users.iter().any(|u| u.id == user_id)
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_session() {
        let session = Session::single("Anna");
        assert_eq!(session.kind, SessionKind::Single);
        assert_eq!(session.users.len(), 1);
        assert_eq!(session.users[0].name, "Anna");
        assert!(session.is_active());
    }

    #[test]
    fn test_collaborative_session_has_distinct_users() {
        let session = Session::collaborative("Anna", "Boris");
        assert_eq!(session.users.len(), session.kind.participants());
        assert_ne!(session.users[0].id, session.users[1].id);
        assert!(session.has_user(session.users[1].id));
        assert!(!session.has_user(Uuid::new_v4()));
    }

    #[test]
    fn test_kind_and_state_round_trip_through_text() {
        for kind in [SessionKind::Single, SessionKind::Collaborative] {
            assert_eq!(SessionKind::parse(&kind.to_string()), Some(kind));
        }
        for state in [
            SessionState::Active,
            SessionState::Completed,
            SessionState::Cancelled,
        ] {
            assert_eq!(SessionState::parse(&state.to_string()), Some(state));
        }
        assert_eq!(SessionKind::parse("group"), None);
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&SessionKind::Collaborative).unwrap();
        assert_eq!(json, "\"collaborative\"");
    }
}
