use crate::{
    error::{ConvertError, ConvertResult, Stage},
    fsio,
    identity::Direction,
};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub const ONLINE_MODE_KEY: &str = "online-mode";

pub fn server_properties_path(root: &Path) -> PathBuf {
    root.join("server.properties")
}

pub fn detect(text: &str) -> ConvertResult<Direction> {
    let Some(value) = text.lines().find_map(online_mode_value) else {
        return Err(ConvertError::missing(format!(
            "{ONLINE_MODE_KEY} setting in server.properties"
        )));
    };
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(Direction::from_online_mode(true)),
        "false" => Ok(Direction::from_online_mode(false)),
        other => Err(ConvertError::invalid(
            format!("{ONLINE_MODE_KEY} value"),
            format!("expected true or false, found {other:?}"),
        )),
    }
}

pub fn set_online_mode(text: &str, online: bool) -> ConvertResult<String> {
    let mut out = String::with_capacity(text.len() + 8);
    let mut replaced = false;
    for line in text.split_inclusive('\n') {
        if !replaced && online_mode_value(line).is_some() {
            let ending = if line.ends_with("\r\n") {
                "\r\n"
            } else if line.ends_with('\n') {
                "\n"
            } else {
                ""
            };
            out.push_str(&format!("{ONLINE_MODE_KEY}={online}{ending}"));
            replaced = true;
        } else {
            out.push_str(line);
        }
    }
    if !replaced {
        return Err(ConvertError::missing(format!(
            "{ONLINE_MODE_KEY} setting in server.properties"
        )));
    }
    Ok(out)
}

pub fn read_direction(root: &Path) -> ConvertResult<Direction> {
    let path = server_properties_path(root);
    let raw = read_properties(&path)?;
    detect(&raw)
}

pub fn persist_direction(root: &Path, direction: Direction) -> ConvertResult<bool> {
    let path = server_properties_path(root);
    let raw = read_properties(&path)?;
    let online = direction.next_online_mode();
    let updated = set_online_mode(&raw, online)?;
    fsio::write_atomic(&path, updated.as_bytes())
        .map_err(|err| ConvertError::io(Stage::PersistMode, &path, err))?;
    Ok(online)
}

fn read_properties(path: &Path) -> ConvertResult<String> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(raw),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(ConvertError::missing(format!(
            "server.properties ({})",
            path.display()
        ))),
        Err(err) => Err(ConvertError::io(Stage::DetectMode, path, err)),
    }
}

fn online_mode_value(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.starts_with('#') || line.starts_with('!') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    if key.trim() != ONLINE_MODE_KEY {
        return None;
    }
    Some(value.trim())
}
