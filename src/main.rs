extern crate dtoc_lib as lib;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use lib::snapshot::{self, Target};
use lib::{source, EmbedMode, Layer, Options};

#[derive(Parser)]
#[command(name = "dtoc", version, about = "Generates API DTO and patch types from Go structs")]
struct Cli {
    /// Log filter, overridden by RUST_LOG
    #[arg(short, long, global = true, default_value = "info")]
    level: String,
    /// YAML configuration file, later files win over earlier ones
    #[arg(long = "config", global = true, value_name = "FILE")]
    configs: Vec<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the DTO file
    Init(ParserArgs),
    /// Generate into a versioned snapshot, and inspect the recorded ones
    Snapshot(SnapshotArgs),
}

#[derive(Args, Clone, Debug, Default)]
struct ParserArgs {
    /// Directory scanned for Go files
    #[arg(short = 'i', long = "input-directory")]
    input_directory: Option<PathBuf>,
    /// Directory the file is generated into, its name is the package name
    #[arg(short = 'o', long = "output-directory")]
    output_directory: Option<PathBuf>,
    #[arg(short = 'f', long = "output-file")]
    output_file: Option<String>,
    /// Appended to every generated type name
    #[arg(short = 's', long)]
    suffix: Option<String>,
    #[arg(long = "patch-suffix")]
    patch_suffix: Option<String>,
    /// Keep gorm and db tags
    #[arg(short = 'k', long = "keep-orm-tags")]
    keep_orm_tags: bool,
    /// Replace embedded fields by the fields of their type
    #[arg(short = 'F', long = "flatten-embedded")]
    flatten_embedded: bool,
    /// Keep embedded fields, and add the fields of their type
    #[arg(short = 'E', long = "include-embedded")]
    include_embedded: bool,
    #[arg(short = 'd', long = "exclude-deprecated")]
    exclude_deprecated: bool,
    /// Type names which are never generated
    #[arg(short = 't', long = "exclude-types", value_delimiter = ',')]
    exclude_types: Vec<String>,
    /// Drops fields whose tag matches, as `key:value`
    #[arg(short = 'T', long = "exclude-tags", value_name = "KEY:VALUE")]
    exclude_tags: Vec<String>,
}

impl ParserArgs {
    fn layer(&self) -> Result<Layer> {
        let embed = match (self.flatten_embedded, self.include_embedded) {
            (false, false) => None,
            (flatten, include) => Some(EmbedMode::from_flags(flatten, include)?),
        };
        Ok(Layer {
            in_dir: self.input_directory.clone(),
            out_dir: self.output_directory.clone(),
            out_file: self.output_file.clone(),
            suffix: self.suffix.clone(),
            patch_suffix: self.patch_suffix.clone(),
            keep_orm_tags: self.keep_orm_tags.then_some(true),
            embed,
            exclude_deprecated: self.exclude_deprecated.then_some(true),
            exclude_types: Some(self.exclude_types.clone()).filter(|t| !t.is_empty()),
            exclude_by_tags: Some(self.exclude_tags.clone()).filter(|t| !t.is_empty()),
            ..Layer::default()
        })
    }
}

#[derive(Args)]
struct SnapshotArgs {
    #[command(flatten)]
    parser: ParserArgs,
    #[arg(long, default_value = snapshot::DEFAULT_MANIFEST)]
    manifest: PathBuf,
    #[arg(long = "snapshot-dir", default_value = snapshot::DEFAULT_DIR)]
    snapshot_dir: PathBuf,
    #[arg(long = "snapshot-name", default_value = snapshot::DEFAULT_NAME)]
    snapshot_name: String,
    /// Defaults to the current UTC time
    #[arg(long = "snapshot-version")]
    snapshot_version: Option<String>,
    #[command(subcommand)]
    action: Option<SnapshotAction>,
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// List the recorded snapshots
    List,
    /// Diff the current snapshot against the previous one
    Diff,
}

fn init_tracing_fmt_only(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    if tracing_subscriber::registry().with(fmt_layer).try_init().is_err() {
        eprintln!("Warning: tracing subscriber already initialized");
    }
}

/// Stacks the configuration files, then the flags on top of them.
fn options(configs: &[PathBuf], parser: &ParserArgs) -> Result<Options> {
    let mut layer = Layer::default();
    for path in configs {
        layer = layer.merge(Layer::load(path)?);
    }
    layer = layer.merge(parser.layer()?);
    Ok(Options::from_layer(layer)?)
}

fn run_snapshot(configs: &[PathBuf], args: SnapshotArgs) -> Result<()> {
    match args.action {
        Some(SnapshotAction::List) => {
            let manifest = snapshot::list(&args.manifest)?;
            for s in manifest.snapshots.iter() {
                let marker = if s.version == manifest.current_version {
                    "*"
                } else if s.version == manifest.previous_version {
                    "-"
                } else {
                    " "
                };
                println!("{} {}/{}\t{}", marker, s.name, s.version, s.file);
            }
        }
        Some(SnapshotAction::Diff) => {
            let diff = snapshot::diff_current_with_previous(&args.manifest)?;
            if diff.is_empty() {
                info!("no changes between the previous and the current snapshot");
            } else {
                print!("{}", diff);
            }
        }
        None => {
            let opts = options(configs, &args.parser)?;
            let target = Target {
                manifest: args.manifest,
                version: args
                    .snapshot_version
                    .unwrap_or_else(|| chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string()),
                dir: args.snapshot_dir,
                name: args.snapshot_name,
            };
            let mut source = source::Fs::new(opts.in_dir.clone())
                .skipping(&opts.out_dir)
                .skipping(&target.dir);
            let path = snapshot::generate(&opts, &mut source, &target)?;
            println!("Snapshot {} written to {}", target.version, path.display());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing_fmt_only(&cli.level);

    match cli.command {
        Commands::Init(parser) => {
            let opts = options(&cli.configs, &parser)?;
            let path = lib::run(&opts)?;
            println!("Writing to {}", path.display());
        }
        Commands::Snapshot(args) => run_snapshot(&cli.configs, args)?,
    }

    Ok(())
}
