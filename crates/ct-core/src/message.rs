use serde::{Deserialize, Serialize};

/// Role of a chat message sent to a model backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Speaker of a recorded case turn. Case histories only ever hold these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TurnRole {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            other => Err(crate::Error::serialization(format!(
                "Unknown turn role: {}",
                other
            ))),
        }
    }
}

impl From<TurnRole> for Role {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => Role::User,
            TurnRole::Assistant => Role::Assistant,
        }
    }
}

/// One recorded message in a case history.
///
/// `created_at` is seconds since the Unix epoch; histories are ordered by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub created_at: f64,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>, created_at: f64) -> Self {
        Self {
            role,
            content: content.into(),
            created_at,
        }
    }

    pub fn user(content: impl Into<String>, created_at: f64) -> Self {
        Self::new(TurnRole::User, content, created_at)
    }

    pub fn assistant(content: impl Into<String>, created_at: f64) -> Self {
        Self::new(TurnRole::Assistant, content, created_at)
    }
}

/// Optional per-case details that steer guideline lookup and the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
}

impl CaseMeta {
    /// The domain, if it holds more than whitespace.
    pub fn domain(&self) -> Option<&str> {
        non_blank(self.domain.as_deref())
    }

    pub fn user_name(&self) -> Option<&str> {
        non_blank(self.user_name.as_deref())
    }

    pub fn goal(&self) -> Option<&str> {
        non_blank(self.goal.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.user_name().is_none() && self.domain().is_none() && self.goal().is_none()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// A message in a completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Average BP 152/94");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Average BP 152/94");
    }

    #[test]
    fn test_turn_role_parse() {
        assert_eq!("user".parse::<TurnRole>().unwrap(), TurnRole::User);
        assert_eq!("assistant".parse::<TurnRole>().unwrap(), TurnRole::Assistant);
        assert!("system".parse::<TurnRole>().is_err());
    }

    #[test]
    fn test_turn_role_serialization() {
        let turn = Turn::assistant("Sure.", 2.0);
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(Role::from(turn.role), Role::Assistant);
    }

    #[test]
    fn test_case_meta_blank_fields() {
        let meta = CaseMeta {
            user_name: Some("  ".to_string()),
            domain: Some("cardiology".to_string()),
            goal: None,
        };
        assert_eq!(meta.user_name(), None);
        assert_eq!(meta.domain(), Some("cardiology"));
        assert!(!meta.is_empty());
        assert!(CaseMeta::default().is_empty());
    }

    #[test]
    fn test_case_meta_roundtrip_skips_missing() {
        let meta = CaseMeta {
            domain: Some("housing advice".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"domain":"housing advice"}"#);
    }
}
