use crate::{
    config::ConverterConfig,
    error::{ConvertError, ConvertResult, Stage},
    identity::{Direction, IdentityTable},
    log::ProgressSink,
    mapping::{self, MappingFile},
    mode,
    renamer::{self, DirectoryPlan, DirectoryTarget},
    rewrite::Rewriter,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct RunContext {
    pub root: PathBuf,
    pub table: IdentityTable,
    pub direction: Direction,
    pub targets: Vec<DirectoryTarget>,
}

impl RunContext {
    pub fn from_config(config: &ConverterConfig) -> Result<Self, StageError> {
        let table = config.identity_table().at(Stage::Config)?;
        let direction = mode::read_direction(&config.root_dir).at(Stage::DetectMode)?;
        Ok(Self {
            root: config.root_dir.clone(),
            table,
            direction,
            targets: config.directory_targets(),
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConvertOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub direction: Direction,
    pub dry_run: bool,
    pub mapping_entries_updated: usize,
    pub renamed: usize,
    pub already_converted: usize,
    pub unmanaged: usize,
    pub content_updated: usize,
    pub warnings: Vec<String>,
    /// `online-mode` value after the run; unchanged on a dry run.
    pub online_mode: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: ConvertError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageError>;
}

impl<T> AtStage<T> for ConvertResult<T> {
    fn at(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|source| StageError { stage, source })
    }
}

pub fn convert_from_config(
    config: &ConverterConfig,
    options: ConvertOptions,
    sink: &mut dyn ProgressSink,
) -> Result<ConversionReport, StageError> {
    let ctx = RunContext::from_config(config)?;
    convert(&ctx, options, sink)
}

/// Runs one conversion pass. `online-mode` is written only after every
/// mapping file and player file was handled.
pub fn convert(
    ctx: &RunContext,
    options: ConvertOptions,
    sink: &mut dyn ProgressSink,
) -> Result<ConversionReport, StageError> {
    let direction = ctx.direction;
    sink.info(format!(
        "Current mode: {} (online-mode={})",
        if direction == Direction::OnlineToOffline {
            "Online"
        } else {
            "Offline"
        },
        !direction.next_online_mode()
    ));
    sink.info(format!("Mode change: {}", direction.label()));
    if options.dry_run {
        sink.info("Dry run: no files will be modified".to_string());
    }
    if ctx.table.is_empty() {
        sink.warn("No players configured, only online-mode will change".to_string());
    }

    let mut report = ConversionReport {
        direction,
        dry_run: options.dry_run,
        mapping_entries_updated: 0,
        renamed: 0,
        already_converted: 0,
        unmanaged: 0,
        content_updated: 0,
        warnings: Vec::new(),
        online_mode: !direction.next_online_mode(),
    };

    let rewriter = Rewriter::new(&ctx.table, direction).at(Stage::Config)?;
    let plans = ctx
        .targets
        .iter()
        .map(|target| renamer::plan_directory(target, &ctx.table, direction))
        .collect::<ConvertResult<Vec<DirectoryPlan>>>()
        .at(Stage::Preflight)?;
    renamer::check_collisions(&plans).at(Stage::Preflight)?;

    let mut prepared = Vec::new();
    for file in MappingFile::ALL {
        match mapping::prepare_mapping_file(&ctx.root, file, &ctx.table, direction)
            .at(Stage::MappingFiles)?
        {
            Some(mapping) => prepared.push(mapping),
            None => {
                let warning = format!("File {} does not exist", file.path(&ctx.root).display());
                sink.warn(warning.clone());
                report.warnings.push(warning);
            }
        }
    }
    for mapping in prepared.iter().filter(|mapping| mapping.changed > 0) {
        let entries = format!(
            "{} entr{}",
            mapping.changed,
            if mapping.changed == 1 { "y" } else { "ies" }
        );
        if options.dry_run {
            sink.info(format!("Would update {}: {entries}", mapping.file.file_name()));
        } else {
            mapping.commit().at(Stage::MappingFiles)?;
            sink.info(format!("Updated {}: {entries}", mapping.file.file_name()));
        }
        report.mapping_entries_updated += mapping.changed;
    }

    for plan in &plans {
        sink.info(format!(
            "Processing directory: {} (update content: {})",
            plan.target.path.display(),
            plan.target.rewrite_content
        ));
        let dir_report = renamer::execute_plan(plan, &rewriter, options.dry_run, sink)
            .map_err(|source| StageError {
                stage: source.io_stage().unwrap_or(Stage::Rename),
                source,
            })?;
        report.renamed += dir_report.renamed;
        report.already_converted += dir_report.already_converted;
        report.unmanaged += dir_report.unmanaged;
        report.content_updated += dir_report.content_updated;
        report.warnings.extend(dir_report.warnings);
    }

    if options.dry_run {
        sink.info(format!(
            "Dry run complete, online-mode would change to {}",
            direction.next_online_mode()
        ));
        return Ok(report);
    }

    let online = mode::persist_direction(&ctx.root, direction).at(Stage::PersistMode)?;
    sink.info(format!("Changed online-mode to: {online}"));
    report.online_mode = online;
    sink.info("Conversion completed!".to_string());
    Ok(report)
}
