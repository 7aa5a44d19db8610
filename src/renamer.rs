use crate::{
    error::{ConvertError, ConvertResult, Stage},
    identity::{Direction, IdentityTable},
    log::ProgressSink,
    rewrite::{Encoding, Rewriter},
};
use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuffixPattern {
    pub suffix: &'static str,
    pub encoding: Encoding,
}

// Checked in order, first match wins: `_cyclic.dat` must precede `.dat`.
pub const SUFFIX_PATTERNS: [SuffixPattern; 5] = [
    SuffixPattern {
        suffix: "_cyclic.dat",
        encoding: Encoding::Binary,
    },
    SuffixPattern {
        suffix: ".json",
        encoding: Encoding::TextPlain,
    },
    SuffixPattern {
        suffix: ".dat_old",
        encoding: Encoding::Binary,
    },
    SuffixPattern {
        suffix: ".dat",
        encoding: Encoding::Binary,
    },
    SuffixPattern {
        suffix: ".snbt",
        encoding: Encoding::TextQuoted,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagedName<'a> {
    pub stem: &'a str,
    pub pattern: SuffixPattern,
}

pub fn match_managed_name(file_name: &str) -> Option<ManagedName<'_>> {
    SUFFIX_PATTERNS.iter().find_map(|pattern| {
        file_name
            .strip_suffix(pattern.suffix)
            .filter(|stem| !stem.is_empty())
            .map(|stem| ManagedName {
                stem,
                pattern: *pattern,
            })
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTarget {
    pub path: PathBuf,
    pub rewrite_content: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAction {
    Rename { to: PathBuf },
    AlreadyConverted,
    Unmanaged,
}

#[derive(Debug, Clone)]
pub struct PlannedFile {
    pub path: PathBuf,
    pub player: Option<String>,
    pub encoding: Encoding,
    pub action: FileAction,
}

#[derive(Debug, Clone)]
pub struct DirectoryPlan {
    pub target: DirectoryTarget,
    pub exists: bool,
    pub files: Vec<PlannedFile>,
}

impl DirectoryPlan {
    pub fn renames(&self) -> impl Iterator<Item = (&Path, &Path)> + '_ {
        self.files.iter().filter_map(|file| match &file.action {
            FileAction::Rename { to } => Some((file.path.as_path(), to.as_path())),
            _ => None,
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectoryReport {
    pub renamed: usize,
    pub already_converted: usize,
    pub unmanaged: usize,
    pub content_updated: usize,
    pub warnings: Vec<String>,
}

pub fn plan_directory(
    target: &DirectoryTarget,
    table: &IdentityTable,
    direction: Direction,
) -> ConvertResult<DirectoryPlan> {
    let mut plan = DirectoryPlan {
        target: target.clone(),
        exists: target.path.is_dir(),
        files: Vec::new(),
    };
    if !plan.exists {
        return Ok(plan);
    }

    for path in list_files(&target.path)? {
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(managed) = match_managed_name(file_name) else {
            continue;
        };
        let encoding = managed.pattern.encoding;

        let (player, action) = if let Some(player) = table.by_source(managed.stem, direction) {
            let target_uuid = player.target(direction);
            let action = if target_uuid == managed.stem {
                FileAction::AlreadyConverted
            } else {
                FileAction::Rename {
                    to: path.with_file_name(format!("{target_uuid}{}", managed.pattern.suffix)),
                }
            };
            (Some(player.name.clone()), action)
        } else if let Some(player) = table.by_target(managed.stem, direction) {
            (Some(player.name.clone()), FileAction::AlreadyConverted)
        } else {
            (None, FileAction::Unmanaged)
        };

        plan.files.push(PlannedFile {
            path,
            player,
            encoding,
            action,
        });
    }
    Ok(plan)
}

pub fn check_collisions(plans: &[DirectoryPlan]) -> ConvertResult<()> {
    let mut claimed: HashSet<&Path> = HashSet::new();
    for (from, to) in plans.iter().flat_map(DirectoryPlan::renames) {
        if !claimed.insert(to) || destination_occupied(from, to) {
            return Err(ConvertError::RenameCollision {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            });
        }
    }
    Ok(())
}

// Rename failures abort; content-rewrite failures become per-file warnings.
pub fn execute_plan(
    plan: &DirectoryPlan,
    rewriter: &Rewriter,
    dry_run: bool,
    sink: &mut dyn ProgressSink,
) -> ConvertResult<DirectoryReport> {
    let mut report = DirectoryReport::default();
    if !plan.exists {
        report.warnings.push(format!(
            "Directory {} does not exist, skipped",
            plan.target.path.display()
        ));
        sink.warn(report.warnings[0].clone());
        return Ok(report);
    }

    for file in &plan.files {
        let name = display_name(&file.path);
        match &file.action {
            FileAction::Unmanaged => {
                let warning = format!("{name}: UUID not in player table, skipped");
                sink.warn(warning.clone());
                report.warnings.push(warning);
                report.unmanaged += 1;
            }
            FileAction::AlreadyConverted => {
                sink.info(format!("No rename needed: {name} (already converted)"));
                report.already_converted += 1;
            }
            FileAction::Rename { to } => {
                let new_name = display_name(to);
                if dry_run {
                    sink.info(format!("Would rename: {name} -> {new_name}"));
                    report.renamed += 1;
                    continue;
                }
                if destination_occupied(&file.path, to) {
                    return Err(ConvertError::RenameCollision {
                        from: file.path.clone(),
                        to: to.clone(),
                    });
                }
                fs::rename(&file.path, to)
                    .map_err(|err| ConvertError::io(Stage::Rename, &file.path, err))?;
                sink.info(format!("Renamed: {name} -> {new_name}"));
                report.renamed += 1;

                if plan.target.rewrite_content {
                    match rewriter.rewrite_file(to, file.encoding) {
                        Ok(true) => {
                            sink.info(format!(
                                "Updated {} file content: {new_name}",
                                file.encoding.label()
                            ));
                            report.content_updated += 1;
                        }
                        Ok(false) => {}
                        Err(err) => {
                            let warning = format!(
                                "Error updating {} file content {} ({}): {}",
                                file.encoding.label(),
                                to.display(),
                                file.player.as_deref().unwrap_or("unknown player"),
                                ConvertError::io(Stage::ContentRewrite, to, err)
                            );
                            sink.warn(warning.clone());
                            report.warnings.push(warning);
                        }
                    }
                }
            }
        }
    }
    Ok(report)
}

fn list_files(dir: &Path) -> ConvertResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry =
            entry.map_err(|err| ConvertError::io(Stage::Preflight, dir, io::Error::from(err)))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn destination_occupied(from: &Path, to: &Path) -> bool {
    to != from && fs::symlink_metadata(to).is_ok()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        identity::PlayerIdentity,
        log::{LogLevel, MemoryLog},
    };
    use tempfile::tempdir;

    const ALICE_ON: &str = "11111111-1111-1111-1111-111111111111";
    const ALICE_OFF: &str = "22222222-2222-2222-2222-222222222222";
    const BOB_ON: &str = "33333333-3333-3333-3333-333333333333";
    const BOB_OFF: &str = "44444444-4444-4444-4444-444444444444";

    fn table() -> IdentityTable {
        IdentityTable::new(vec![
            PlayerIdentity::new("Alice", ALICE_ON, ALICE_OFF),
            PlayerIdentity::new("Bob", BOB_ON, BOB_OFF),
        ])
        .unwrap()
    }

    fn target(path: &Path, rewrite_content: bool) -> DirectoryTarget {
        DirectoryTarget {
            path: path.to_path_buf(),
            rewrite_content,
        }
    }

    #[test]
    fn cyclic_suffix_wins_over_dat() {
        let name = format!("{ALICE_ON}_cyclic.dat");
        let managed = match_managed_name(&name).unwrap();
        assert_eq!(managed.stem, ALICE_ON);
        assert_eq!(managed.pattern.suffix, "_cyclic.dat");

        let name = format!("{ALICE_ON}.dat_old");
        assert_eq!(match_managed_name(&name).unwrap().pattern.suffix, ".dat_old");
        assert_eq!(match_managed_name(".dat"), None);
        assert_eq!(match_managed_name("level.txt"), None);
    }

    #[test]
    fn plan_classifies_files_with_their_encoding() {
        let dir = tempdir().unwrap();
        for name in [
            format!("{ALICE_ON}_cyclic.dat"),
            format!("{ALICE_ON}.snbt"),
            format!("{BOB_OFF}.json"),
            "99999999-9999-9999-9999-999999999999.dat".to_string(),
        ] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let plan = plan_directory(&target(dir.path(), true), &table(), Direction::OnlineToOffline)
            .unwrap();
        let summary: Vec<(String, Encoding, FileAction, Option<&str>)> = plan
            .files
            .iter()
            .map(|file| {
                (
                    display_name(&file.path),
                    file.encoding,
                    file.action.clone(),
                    file.player.as_deref(),
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                (
                    format!("{ALICE_ON}.snbt"),
                    Encoding::TextQuoted,
                    FileAction::Rename {
                        to: dir.path().join(format!("{ALICE_OFF}.snbt")),
                    },
                    Some("Alice"),
                ),
                (
                    format!("{ALICE_ON}_cyclic.dat"),
                    Encoding::Binary,
                    FileAction::Rename {
                        to: dir.path().join(format!("{ALICE_OFF}_cyclic.dat")),
                    },
                    Some("Alice"),
                ),
                (
                    format!("{BOB_OFF}.json"),
                    Encoding::TextPlain,
                    FileAction::AlreadyConverted,
                    Some("Bob"),
                ),
                (
                    "99999999-9999-9999-9999-999999999999.dat".to_string(),
                    Encoding::Binary,
                    FileAction::Unmanaged,
                    None,
                ),
            ]
        );
    }

    #[test]
    fn renames_dat_old_and_second_run_is_noop() {
        let dir = tempdir().unwrap();
        let source = dir.path().join(format!("{ALICE_ON}.dat_old"));
        fs::write(&source, b"data").unwrap();
        let table = table();
        let rewriter = Rewriter::new(&table, Direction::OnlineToOffline).unwrap();
        let mut log = MemoryLog::default();

        let plan = plan_directory(&target(dir.path(), false), &table, Direction::OnlineToOffline)
            .unwrap();
        check_collisions(std::slice::from_ref(&plan)).unwrap();
        let report = execute_plan(&plan, &rewriter, false, &mut log).unwrap();
        assert_eq!(report.renamed, 1);
        assert!(!source.exists());
        assert!(dir.path().join(format!("{ALICE_OFF}.dat_old")).exists());

        let plan = plan_directory(&target(dir.path(), false), &table, Direction::OnlineToOffline)
            .unwrap();
        assert_eq!(plan.files[0].action, FileAction::AlreadyConverted);
        let report = execute_plan(&plan, &rewriter, false, &mut log).unwrap();
        assert_eq!(report.renamed, 0);
        assert_eq!(report.already_converted, 1);
    }

    #[test]
    fn occupied_destination_aborts_before_any_rename() {
        let dir = tempdir().unwrap();
        let alice = dir.path().join(format!("{ALICE_ON}.json"));
        let bob = dir.path().join(format!("{BOB_ON}.json"));
        let occupied = dir.path().join(format!("{BOB_OFF}.json"));
        fs::write(&alice, "{}").unwrap();
        fs::write(&bob, "{}").unwrap();
        fs::write(&occupied, "{}").unwrap();

        let plan = plan_directory(&target(dir.path(), true), &table(), Direction::OnlineToOffline)
            .unwrap();
        let err = check_collisions(&[plan]).unwrap_err();
        assert!(matches!(err, ConvertError::RenameCollision { ref to, .. } if *to == occupied));
        assert!(alice.exists());
        assert!(bob.exists());
    }

    #[test]
    fn shared_destination_across_plans_collides() {
        let dir = tempdir().unwrap();
        let from_a = dir.path().join("a.dat");
        let from_b = dir.path().join("b.dat");
        let to = dir.path().join("c.dat");
        let planned = |from: &Path| PlannedFile {
            path: from.to_path_buf(),
            player: None,
            encoding: Encoding::Binary,
            action: FileAction::Rename { to: to.clone() },
        };
        let plan = DirectoryPlan {
            target: target(dir.path(), false),
            exists: true,
            files: vec![planned(&from_a), planned(&from_b)],
        };
        let err = check_collisions(&[plan]).unwrap_err();
        assert!(matches!(err, ConvertError::RenameCollision { ref from, .. } if *from == from_b));
    }

    #[test]
    fn rewrites_content_after_rename() {
        let dir = tempdir().unwrap();
        let source = dir.path().join(format!("{BOB_OFF}.json"));
        fs::write(&source, format!("{{\"owner\":\"{}\"}}", BOB_OFF.replace('-', ""))).unwrap();
        let table = table();
        let rewriter = Rewriter::new(&table, Direction::OfflineToOnline).unwrap();
        let mut log = MemoryLog::default();

        let plan = plan_directory(&target(dir.path(), true), &table, Direction::OfflineToOnline)
            .unwrap();
        let report = execute_plan(&plan, &rewriter, false, &mut log).unwrap();
        assert_eq!(report.content_updated, 1);

        let renamed = dir.path().join(format!("{BOB_ON}.json"));
        let raw = fs::read_to_string(renamed).unwrap();
        assert_eq!(raw, format!("{{\"owner\":\"{}\"}}", BOB_ON.replace('-', "")));
    }

    #[test]
    fn unreadable_content_is_a_warning() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(format!("{ALICE_ON}.snbt")), [0xff, 0xfe, 0xfd]).unwrap();
        let table = table();
        let rewriter = Rewriter::new(&table, Direction::OnlineToOffline).unwrap();
        let mut log = MemoryLog::default();

        let plan = plan_directory(&target(dir.path(), true), &table, Direction::OnlineToOffline)
            .unwrap();
        let report = execute_plan(&plan, &rewriter, false, &mut log).unwrap();
        assert_eq!(report.renamed, 1);
        assert_eq!(report.content_updated, 0);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("Alice"));
        assert!(dir.path().join(format!("{ALICE_OFF}.snbt")).exists());
    }

    #[test]
    fn unmanaged_files_and_subdirectories_are_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("99999999-9999-9999-9999-999999999999.dat"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let nested = dir.path().join("backup");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join(format!("{ALICE_ON}.dat")), b"x").unwrap();
        let table = table();
        let rewriter = Rewriter::new(&table, Direction::OnlineToOffline).unwrap();
        let mut log = MemoryLog::default();

        let plan = plan_directory(&target(dir.path(), false), &table, Direction::OnlineToOffline)
            .unwrap();
        assert_eq!(plan.files.len(), 1);
        let report = execute_plan(&plan, &rewriter, false, &mut log).unwrap();
        assert_eq!(report.unmanaged, 1);
        assert_eq!(log.messages(LogLevel::Warn).len(), 1);
        assert!(nested.join(format!("{ALICE_ON}.dat")).exists());
    }

    #[test]
    fn missing_directory_is_a_warning() {
        let dir = tempdir().unwrap();
        let table = table();
        let rewriter = Rewriter::new(&table, Direction::OnlineToOffline).unwrap();
        let mut log = MemoryLog::default();

        let plan = plan_directory(
            &target(&dir.path().join("stats"), false),
            &table,
            Direction::OnlineToOffline,
        )
        .unwrap();
        assert!(!plan.exists);
        let report = execute_plan(&plan, &rewriter, false, &mut log).unwrap();
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn dry_run_does_not_touch_files() {
        let dir = tempdir().unwrap();
        let source = dir.path().join(format!("{ALICE_ON}.dat"));
        fs::write(&source, b"x").unwrap();
        let table = table();
        let rewriter = Rewriter::new(&table, Direction::OnlineToOffline).unwrap();
        let mut log = MemoryLog::default();

        let plan = plan_directory(&target(dir.path(), true), &table, Direction::OnlineToOffline)
            .unwrap();
        let report = execute_plan(&plan, &rewriter, true, &mut log).unwrap();
        assert_eq!(report.renamed, 1);
        assert!(source.exists());
        assert!(log.messages(LogLevel::Info)[0].starts_with("Would rename"));
    }
}
