use crate::error::{ConvertError, ConvertResult};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub name: String,
    pub online_uuid: String,
    pub offline_uuid: String,
}

impl PlayerIdentity {
    pub fn new(name: &str, online_uuid: &str, offline_uuid: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            online_uuid: canonical_uuid(online_uuid),
            offline_uuid: canonical_uuid(offline_uuid),
        }
    }

    pub fn source(&self, direction: Direction) -> &str {
        match direction {
            Direction::OnlineToOffline => &self.online_uuid,
            Direction::OfflineToOnline => &self.offline_uuid,
        }
    }

    pub fn target(&self, direction: Direction) -> &str {
        match direction {
            Direction::OnlineToOffline => &self.offline_uuid,
            Direction::OfflineToOnline => &self.online_uuid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    OnlineToOffline,
    OfflineToOnline,
}

impl Direction {
    pub fn from_online_mode(online: bool) -> Self {
        if online {
            Direction::OnlineToOffline
        } else {
            Direction::OfflineToOnline
        }
    }

    /// `online-mode` value the server should run with once converted.
    pub fn next_online_mode(self) -> bool {
        matches!(self, Direction::OfflineToOnline)
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::OnlineToOffline => "Online -> Offline",
            Direction::OfflineToOnline => "Offline -> Online",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdentityTable {
    players: Vec<PlayerIdentity>,
}

impl IdentityTable {
    pub fn new(players: Vec<PlayerIdentity>) -> ConvertResult<Self> {
        let mut names: HashMap<&str, usize> = HashMap::new();
        // Keyed by compact form so hyphenated and bare spellings collide too.
        let mut owners: HashMap<String, usize> = HashMap::new();

        for (index, player) in players.iter().enumerate() {
            if player.name.is_empty() {
                return Err(ConvertError::invalid(
                    "player table",
                    format!("player #{} has an empty name", index + 1),
                ));
            }
            if names.insert(player.name.as_str(), index).is_some() {
                return Err(ConvertError::invalid(
                    "player table",
                    format!("duplicate player name {}", player.name),
                ));
            }
            for uuid in [&player.online_uuid, &player.offline_uuid] {
                if uuid.is_empty() {
                    return Err(ConvertError::invalid(
                        "player table",
                        format!("player {} has an empty UUID", player.name),
                    ));
                }
                if let Some(owner) = owners.insert(compact(uuid), index) {
                    if owner != index {
                        return Err(ConvertError::invalid(
                            "player table",
                            format!(
                                "UUID {uuid} is shared by {} and {}",
                                players[owner].name, player.name
                            ),
                        ));
                    }
                }
            }
        }

        Ok(Self { players })
    }

    pub fn players(&self) -> &[PlayerIdentity] {
        &self.players
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn by_name(&self, name: &str) -> Option<&PlayerIdentity> {
        self.players.iter().find(|player| player.name == name)
    }

    pub fn by_source(&self, uuid: &str, direction: Direction) -> Option<&PlayerIdentity> {
        self.players
            .iter()
            .find(|player| player.source(direction) == uuid)
    }

    pub fn by_target(&self, uuid: &str, direction: Direction) -> Option<&PlayerIdentity> {
        self.players
            .iter()
            .find(|player| player.target(direction) == uuid)
    }
}

pub fn canonical_uuid(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

pub fn compact(uuid: &str) -> String {
    uuid.replace('-', "")
}
