mod config;
mod render;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use config::ConfigMerger;
use machfile_codec::Codec;
use machfile_matlib::resolve_dir;
use machfile_migrate::read_version;
use machfile_store::{backup, json_files, load, read_document, save};
use machfile_types::{
    Comparator, Instance, NodePath, PersistError, PersistResult, SchemaError, SchemaRegistry,
    SchemaVersion, VERSION_TAG,
};
use serde::Serialize;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "machfile",
    version,
    about = "Check, migrate, compare and resolve materials of electric machine documents."
)]
struct Cli {
    /// Config file (default: machfile.toml in the current directory, if present).
    #[arg(long, global = true, env = "MACHFILE_CONFIG")]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load documents and report their type and saved schema version.
    Check(CheckArgs),
    /// Rewrite a document in the current schema version.
    Migrate(MigrateArgs),
    /// Structurally compare two documents (exit code 2 when they differ).
    Diff(DiffArgs),
    /// Reconcile a machine's materials with a material library.
    Matlib(MatlibArgs),
    /// Describe the registered types and their fields.
    Schema(SchemaArgs),
}

#[derive(Debug, Parser)]
struct CheckArgs {
    /// Document, or directory of `*.json` documents.
    path: Utf8PathBuf,

    /// Require the root to be this type or one of its subtypes.
    #[arg(long = "type", value_name = "TYPE")]
    expected: Option<String>,

    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Parser)]
struct MigrateArgs {
    /// Document to migrate.
    file: Utf8PathBuf,

    /// Write the migrated document here instead of printing it.
    #[arg(long, conflicts_with = "in_place")]
    out: Option<Utf8PathBuf>,

    /// Overwrite the document, keeping a backup unless disabled.
    #[arg(long, default_value_t = false)]
    in_place: bool,

    /// Do not back up the document before an in-place rewrite.
    #[arg(long, default_value_t = false, requires = "in_place")]
    no_backup: bool,
}

#[derive(Debug, Parser)]
struct DiffArgs {
    /// Left document.
    left: Utf8PathBuf,

    /// Right document.
    right: Utf8PathBuf,

    /// Absolute float tolerance.
    #[arg(long)]
    abs_tol: Option<f64>,

    /// Relative float tolerance.
    #[arg(long)]
    rel_tol: Option<f64>,

    /// Field name to skip at every depth (repeatable).
    #[arg(long)]
    ignore: Vec<String>,

    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Parser)]
struct MatlibArgs {
    /// Machine document.
    machine: Utf8PathBuf,

    /// Material library directory (default: config, then the machine's directory).
    #[arg(long)]
    library: Option<Utf8PathBuf>,

    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Save the resolved machine here.
    #[arg(long)]
    write: Option<Utf8PathBuf>,
}

#[derive(Debug, Parser)]
struct SchemaArgs {
    /// Type to describe; lists every type when omitted.
    type_name: Option<String>,

    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match real_main() {
        Ok(code) => code,
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Exit code of the first [`PersistError`] in the chain, 1 for anything else.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PersistError>())
        .map_or(1, PersistError::exit_code)
}

fn real_main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let file_config = config::load_or_default(Utf8Path::new("."), cli.config.as_deref())
        .context("load machfile.toml config")?;
    let merger = ConfigMerger::new(file_config);

    match cli.cmd {
        Command::Check(args) => cmd_check(args),
        Command::Migrate(args) => cmd_migrate(args, merger),
        Command::Diff(args) => cmd_diff(args, merger),
        Command::Matlib(args) => cmd_matlib(args, merger),
        Command::Schema(args) => cmd_schema(args),
    }
}

#[derive(Debug, Serialize)]
struct CheckReport {
    path: Utf8PathBuf,
    #[serde(rename = "type")]
    type_name: String,
    saved_version: SchemaVersion,
    nodes: usize,
}

/// Loads `path`, returning the root and the version it was saved with.
fn load_versioned(path: &Utf8Path, expected: Option<&str>) -> PersistResult<(Instance, SchemaVersion)> {
    let document = read_document(path)?;
    let saved = read_version(document.get(VERSION_TAG))?;
    let instance = Codec::default().from_document(&document, expected)?;
    Ok((instance, saved))
}

fn count_nodes(root: &Instance) -> usize {
    let mut count = 0;
    root.visit(&mut |_, _| count += 1);
    count
}

fn cmd_check(args: CheckArgs) -> anyhow::Result<ExitCode> {
    let expected = args.expected.as_deref();
    let paths = if args.path.is_dir() {
        json_files(&args.path).with_context(|| format!("list {}", args.path))?
    } else {
        vec![args.path.clone()]
    };

    let mut reports = Vec::new();
    let mut worst: u8 = 0;
    for path in paths {
        match load_versioned(&path, expected) {
            Ok((instance, saved)) => reports.push(CheckReport {
                type_name: instance.type_name().to_string(),
                saved_version: saved,
                nodes: count_nodes(&instance),
                path,
            }),
            Err(err) => {
                warn!(path = %path, kind = ?err.kind(), "{err}");
                if matches!(args.format, OutputFormat::Text) {
                    println!("{path}: error: {err}");
                }
                worst = worst.max(err.exit_code());
            }
        }
    }

    match args.format {
        OutputFormat::Text => {
            for report in &reports {
                let migration = if report.saved_version.is_current() {
                    String::new()
                } else {
                    format!(", migrates {} -> {}", report.saved_version, SchemaVersion::CURRENT)
                };
                println!(
                    "{}: ok ({}, {} nodes{migration})",
                    report.path, report.type_name, report.nodes
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }
    Ok(ExitCode::from(worst))
}

fn cmd_migrate(args: MigrateArgs, merger: ConfigMerger) -> anyhow::Result<ExitCode> {
    let merged = merger.merge_migrate_args(args.no_backup);
    let (instance, saved) = load_versioned(&args.file, None)?;
    debug!(file = %args.file, saved = %saved, "loaded document");

    let target = match (args.out, args.in_place) {
        (Some(out), _) => out,
        (None, true) => {
            if merged.backups.enabled {
                let copy = backup(&args.file, &merged.backups.suffix)
                    .with_context(|| format!("back up {}", args.file))?;
                info!(backup = %copy, "backed up original");
            }
            args.file.clone()
        }
        (None, false) => {
            print!("{}", Codec::default().to_string_pretty(&instance)?);
            return Ok(ExitCode::SUCCESS);
        }
    };

    save(&instance, &target).with_context(|| format!("write {}", target))?;
    let current = SchemaVersion::CURRENT;
    info!(from = %saved, to = %current, "wrote {}", target);
    Ok(ExitCode::SUCCESS)
}

fn cmd_diff(args: DiffArgs, merger: ConfigMerger) -> anyhow::Result<ExitCode> {
    let merged = merger.merge_diff_args(args.abs_tol, args.rel_tol, &args.ignore);
    let tolerance = merged.tolerance;
    anyhow::ensure!(
        tolerance.abs >= 0.0 && tolerance.rel >= 0.0,
        "tolerances must be non-negative (abs {}, rel {})",
        tolerance.abs,
        tolerance.rel
    );
    debug!(?tolerance, ignore = ?merged.ignore, "comparing");

    let left = load(&args.left).with_context(|| format!("load {}", args.left))?;
    let right = load(&args.right).with_context(|| format!("load {}", args.right))?;

    let comparator = merged
        .ignore
        .iter()
        .fold(Comparator::builtin().with_tolerance(tolerance), |c, field| {
            c.ignore_field(field.as_str())
        });
    let differences = comparator.compare(&left, &right, &NodePath::root());

    match args.format {
        OutputFormat::Text => print!("{}", render::differences_text(&differences)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&render::differences_json(&differences))?
        ),
    }
    Ok(if differences.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn cmd_matlib(args: MatlibArgs, merger: ConfigMerger) -> anyhow::Result<ExitCode> {
    let merged = merger.merge_matlib_args(args.library);
    let library_dir = merged.library_dir.unwrap_or_else(|| {
        match args.machine.parent() {
            Some(dir) if !dir.as_str().is_empty() => dir.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        }
    });

    let mut machine = load(&args.machine).with_context(|| format!("load {}", args.machine))?;
    let registry = resolve_dir(&mut machine, &library_dir)
        .with_context(|| format!("resolve materials against {}", library_dir))?;

    let violations = registry.check(&machine);
    if let Some(first) = violations.first() {
        anyhow::bail!("{} material violation(s), first: {first}", violations.len());
    }

    let summary = registry.summary();
    match args.format {
        OutputFormat::Text => print!("{}", render::materials_text(&summary)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }

    if let Some(out) = args.write {
        save(&machine, &out).with_context(|| format!("write {}", out))?;
        info!(machine = %out, materials = summary.len(), "wrote resolved machine");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_schema(args: SchemaArgs) -> anyhow::Result<ExitCode> {
    let schemas = SchemaRegistry::builtin();
    let Some(name) = args.type_name else {
        match args.format {
            OutputFormat::Text => print!("{}", render::type_list_text(schemas)),
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&render::type_list_json(schemas))?
            ),
        }
        return Ok(ExitCode::SUCCESS);
    };

    let node = schemas.get(&name).ok_or_else(|| {
        PersistError::Schema(SchemaError::UnknownType {
            path: NodePath::root(),
            type_name: name.clone(),
        })
    })?;
    match args.format {
        OutputFormat::Text => print!("{}", render::type_text(schemas, node)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&render::type_json(schemas, node))?
        ),
    }
    Ok(ExitCode::SUCCESS)
}
