use crate::{
    error::{ConvertError, ConvertResult, Stage},
    fsio,
    identity::{Direction, IdentityTable},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingFile {
    UserCache,
    Operators,
    UsernameCache,
}

impl MappingFile {
    pub const ALL: [MappingFile; 3] = [
        MappingFile::UserCache,
        MappingFile::Operators,
        MappingFile::UsernameCache,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            MappingFile::UserCache => "usercache.json",
            MappingFile::Operators => "ops.json",
            MappingFile::UsernameCache => "usernamecache.json",
        }
    }

    pub fn path(self, root: &Path) -> PathBuf {
        root.join(self.file_name())
    }
}

#[derive(Debug, Clone)]
pub struct PreparedMapping {
    pub file: MappingFile,
    pub path: PathBuf,
    pub changed: usize,
    value: Value,
}

impl PreparedMapping {
    pub fn commit(&self) -> ConvertResult<()> {
        if self.changed == 0 {
            return Ok(());
        }
        let bytes = to_pretty_json(&self.value)
            .map_err(|err| ConvertError::io(Stage::MappingFiles, &self.path, err))?;
        fsio::write_atomic(&self.path, &bytes)
            .map_err(|err| ConvertError::io(Stage::MappingFiles, &self.path, err))
    }
}

// Nothing is written here; `Ok(None)` means the file does not exist.
pub fn prepare_mapping_file(
    root: &Path,
    file: MappingFile,
    table: &IdentityTable,
    direction: Direction,
) -> ConvertResult<Option<PreparedMapping>> {
    let path = file.path(root);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(ConvertError::io(Stage::MappingFiles, &path, err)),
    };
    let mut value: Value = serde_json::from_str(&raw)
        .map_err(|err| ConvertError::invalid(path.display().to_string(), err.to_string()))?;

    let changed = match file {
        MappingFile::UserCache | MappingFile::Operators => {
            update_record_list(&mut value, table, direction)
        }
        MappingFile::UsernameCache => update_username_cache(&mut value, table, direction),
    }
    .map_err(|reason| ConvertError::invalid(path.display().to_string(), reason))?;

    Ok(Some(PreparedMapping {
        file,
        path,
        changed,
        value,
    }))
}

pub fn update_record_list(
    value: &mut Value,
    table: &IdentityTable,
    direction: Direction,
) -> Result<usize, String> {
    let Value::Array(records) = value else {
        return Err("expected a JSON array of player records".to_string());
    };

    let mut changed = 0;
    for record in records.iter_mut() {
        let Value::Object(fields) = record else {
            continue;
        };
        let Some(player) = fields
            .get("name")
            .and_then(Value::as_str)
            .and_then(|name| table.by_name(name))
        else {
            continue;
        };
        let target = player.target(direction);
        if fields.get("uuid").and_then(Value::as_str) != Some(target) {
            fields.insert("uuid".to_string(), Value::String(target.to_string()));
            changed += 1;
        }
    }
    Ok(changed)
}

// Fails rather than overwrite when a moved key lands on an entry that names
// someone else; the file is left untouched in that case.
pub fn update_username_cache(
    value: &mut Value,
    table: &IdentityTable,
    direction: Direction,
) -> Result<usize, String> {
    let Value::Object(entries) = value else {
        return Err("expected a JSON object mapping UUIDs to names".to_string());
    };

    let mut changed = 0;
    let mut rebuilt = Map::with_capacity(entries.len());
    for (uuid, name) in entries.iter() {
        let uuid = uuid.as_str();
        let key = name
            .as_str()
            .and_then(|name| table.by_name(name))
            .map(|player| player.target(direction))
            .unwrap_or(uuid);
        if key != uuid {
            changed += 1;
        }
        match rebuilt.get(key) {
            Some(existing) if existing != name => {
                return Err(format!(
                    "UUID {key} would belong to both {existing} and {name}"
                ));
            }
            Some(_) => {}
            None => {
                rebuilt.insert(key.to_string(), name.clone());
            }
        }
    }
    *entries = rebuilt;
    Ok(changed)
}

fn to_pretty_json(value: &Value) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer).map_err(io::Error::from)?;
    Ok(out)
}
