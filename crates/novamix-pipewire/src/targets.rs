//! The two controlled sink targets.

use serde::{Deserialize, Serialize};

/// Which of the two controlled streams a sink carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkRole {
    /// The game audio sink
    Game,
    /// The chat audio sink
    Chat,
}

impl SinkRole {
    /// Both roles, in apply order.
    pub const ALL: [Self; 2] = [Self::Game, Self::Chat];

    /// Short label for logs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::Chat => "chat",
        }
    }
}

/// PipeWire `node.name`s of the game and chat sinks.
///
/// Fixed at startup from configuration; the daemon resolves them against
/// the live registry on every change, since the sinks are created and
/// destroyed outside its control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkTargets {
    /// Node name of the game sink
    pub game: String,
    /// Node name of the chat sink
    pub chat: String,
}

impl SinkTargets {
    /// Node name for a role.
    #[must_use]
    pub fn name(&self, role: SinkRole) -> &str {
        match role {
            SinkRole::Game => &self.game,
            SinkRole::Chat => &self.chat,
        }
    }

    /// Which role a node name belongs to, if any.
    #[must_use]
    pub fn role_of(&self, node_name: &str) -> Option<SinkRole> {
        if node_name == self.game {
            Some(SinkRole::Game)
        } else if node_name == self.chat {
            Some(SinkRole::Chat)
        } else {
            None
        }
    }
}

impl Default for SinkTargets {
    fn default() -> Self {
        Self { game: "NovaGame".to_string(), chat: "NovaChat".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_targets() {
        let targets = SinkTargets::default();
        assert_eq!(targets.name(SinkRole::Game), "NovaGame");
        assert_eq!(targets.name(SinkRole::Chat), "NovaChat");
    }

    #[test]
    fn test_role_of() {
        let targets = SinkTargets::default();
        assert_eq!(targets.role_of("NovaGame"), Some(SinkRole::Game));
        assert_eq!(targets.role_of("NovaChat"), Some(SinkRole::Chat));
        assert_eq!(targets.role_of("alsa_output.usb"), None);
    }
}
