use std::{
    fmt, io,
    path::{Path, PathBuf},
};

pub type ConvertResult<T> = std::result::Result<T, ConvertError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    DetectMode,
    Preflight,
    MappingFiles,
    Rename,
    ContentRewrite,
    PersistMode,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::DetectMode => "detect mode",
            Stage::Preflight => "preflight",
            Stage::MappingFiles => "mapping files",
            Stage::Rename => "rename",
            Stage::ContentRewrite => "content rewrite",
            Stage::PersistMode => "persist mode",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("missing {what}")]
    ConfigMissing { what: String },
    #[error("invalid {what}: {reason}")]
    ConfigInvalid { what: String, reason: String },
    #[error("rename collision: {} -> {} (destination already exists)", .from.display(), .to.display())]
    RenameCollision { from: PathBuf, to: PathBuf },
    #[error("{stage} failed on {}: {source}", .path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConvertError {
    pub fn missing(what: impl Into<String>) -> Self {
        ConvertError::ConfigMissing { what: what.into() }
    }

    pub fn invalid(what: impl Into<String>, reason: impl Into<String>) -> Self {
        ConvertError::ConfigInvalid {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn io(stage: Stage, path: &Path, source: io::Error) -> Self {
        ConvertError::Io {
            stage,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn io_stage(&self) -> Option<Stage> {
        match self {
            ConvertError::Io { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
