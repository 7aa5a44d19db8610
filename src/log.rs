use anyhow::{Context, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

#[cfg(test)]
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

pub trait ProgressSink {
    fn record(&mut self, level: LogLevel, message: String);

    fn info(&mut self, message: String) {
        self.record(LogLevel::Info, message);
    }

    fn warn(&mut self, message: String) {
        self.record(LogLevel::Warn, message);
    }

    fn error(&mut self, message: String) {
        self.record(LogLevel::Error, message);
    }
}

pub struct RunLog {
    log_path: PathBuf,
    quiet: bool,
}

impl RunLog {
    pub fn create(log_path: &Path) -> Result<Self> {
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("create log dir")?;
        }
        let header = format!(
            "Minecraft online/offline UUID converter log\n\
             ============================\n\
             Log file location: {}\n\
             Run time: {}\n\n",
            log_path.display(),
            run_timestamp()
        );
        fs::write(log_path, header).context("write log header")?;
        Ok(Self {
            log_path: log_path.to_path_buf(),
            quiet: false,
        })
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }
}

impl ProgressSink for RunLog {
    fn record(&mut self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => {
                if !self.quiet {
                    println!("{message}");
                }
            }
            LogLevel::Warn => eprintln!("Warning: {message}"),
            LogLevel::Error => eprintln!("Error: {message}"),
        }
        let _ = append_log_file(&self.log_path, level, &message);
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryLog {
    pub entries: Vec<LogEntry>,
}

#[cfg(test)]
impl MemoryLog {
    pub fn messages(&self, level: LogLevel) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.level == level)
            .map(|entry| entry.message.as_str())
            .collect()
    }
}

#[cfg(test)]
impl ProgressSink for MemoryLog {
    fn record(&mut self, level: LogLevel, message: String) {
        self.entries.push(LogEntry { level, message });
    }
}

pub fn log_level_label(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "INFO",
        LogLevel::Warn => "WARN",
        LogLevel::Error => "ERROR",
    }
}

fn append_log_file(path: &Path, level: LogLevel, message: &str) -> std::io::Result<()> {
    let label = log_level_label(level);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "[{label}] {message}")
}

fn run_timestamp() -> String {
    let now = time::OffsetDateTime::now_utc();
    let format = time::macros::format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second] UTC"
    );
    now.format(format)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn run_log_writes_header_and_labelled_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("log.txt");
        let mut log = RunLog::create(&path).unwrap().quiet();
        log.info("Current mode: online".to_string());
        log.warn("usercache.json does not exist".to_string());

        let raw = fs::read_to_string(log.path()).unwrap();
        assert!(raw.contains("Run time: "));
        assert!(raw.contains("[INFO] Current mode: online\n"));
        assert!(raw.contains("[WARN] usercache.json does not exist\n"));
    }

    #[test]
    fn memory_log_filters_by_level() {
        let mut log = MemoryLog::default();
        log.info("a".to_string());
        log.error("b".to_string());
        assert_eq!(log.messages(LogLevel::Error), vec!["b"]);
        assert_eq!(log.entries.len(), 2);
    }
}
