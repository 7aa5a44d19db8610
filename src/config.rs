use crate::{
    error::{ConvertError, ConvertResult},
    identity::{IdentityTable, PlayerIdentity},
    renamer::DirectoryTarget,
};
use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub const DEFAULT_CONFIG_FILE: &str = "Info.json";

const DEFAULT_FOLDERS: [&str; 3] = ["world/advancements", "world/playerdata", "world/stats"];

#[derive(Debug, Clone, Deserialize)]
pub struct ConverterConfig {
    pub root_dir: PathBuf,
    #[serde(rename = "player", default)]
    pub players: Vec<PlayerEntry>,
    #[serde(rename = "changeUUID_folder_name", default = "default_folders")]
    pub folders: Vec<FolderEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerEntry {
    pub name: String,
    #[serde(rename = "Online_UUID")]
    pub online_uuid: String,
    #[serde(rename = "Offline_UUID")]
    pub offline_uuid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FolderEntry {
    pub name: PathBuf,
    #[serde(default)]
    pub change_content: bool,
}

impl ConverterConfig {
    pub fn load(path: &Path) -> ConvertResult<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ConvertError::missing(format!(
                    "configuration file {}",
                    path.display()
                )));
            }
            Err(err) => {
                return Err(ConvertError::invalid(
                    format!("configuration file {}", path.display()),
                    err.to_string(),
                ));
            }
        };
        Self::parse(&raw).map_err(|err| match err {
            ConvertError::ConfigInvalid { reason, .. } => ConvertError::invalid(
                format!("configuration file {}", path.display()),
                reason,
            ),
            other => other,
        })
    }

    pub fn parse(raw: &str) -> ConvertResult<Self> {
        let config: ConverterConfig = serde_json::from_str(raw)
            .map_err(|err| ConvertError::invalid("configuration", err.to_string()))?;
        if config.root_dir.as_os_str().is_empty() {
            return Err(ConvertError::missing("root_dir in configuration"));
        }
        Ok(config)
    }

    pub fn identity_table(&self) -> ConvertResult<IdentityTable> {
        IdentityTable::new(
            self.players
                .iter()
                .map(|player| {
                    PlayerIdentity::new(&player.name, &player.online_uuid, &player.offline_uuid)
                })
                .collect(),
        )
    }

    pub fn directory_targets(&self) -> Vec<DirectoryTarget> {
        self.folders
            .iter()
            .map(|folder| DirectoryTarget {
                path: self.root_dir.join(&folder.name),
                rewrite_content: folder.change_content,
            })
            .collect()
    }
}

fn default_folders() -> Vec<FolderEntry> {
    DEFAULT_FOLDERS
        .iter()
        .map(|name| FolderEntry {
            name: PathBuf::from(name),
            change_content: false,
        })
        .collect()
}
