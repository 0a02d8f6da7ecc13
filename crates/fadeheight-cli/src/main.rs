//! fadeheight CLI - run the fade height plugin on files
//!
//! Augments machine definition files and annotates exported plate sets the
//! same way the plugin does inside the host application.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use fadeheight::{EventOutcome, FadeHeightPlugin, HostEvent, PluginConfig};
use fadeheight_gcode::{AnnotateOutcome, FixedSettings, GcodePlateSet, MemoryScene, PlateStatus};
use fadeheight_settings::{
    AugmentOutcome, DefinitionTree, MemoryRegistry, ABL_ENABLED_KEY, FADE_HEIGHT_KEY,
    MACHINE_START_GCODE_KEY, PLUGIN_SETTINGS,
};

#[derive(Parser)]
#[command(name = "fadeheight")]
#[command(about = "Fade height and bed leveling settings for sliced G-code", long_about = None)]
struct Cli {
    /// Plugin configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the setting definitions added by the plugin
    Schema,
    /// Add the plugin settings to a machine definition file
    Augment {
        /// Input definition file (.def.json)
        input: PathBuf,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Inject the M420 command into a plate set
    Annotate {
        /// Input plate set (JSON object of plate id to G-code blocks)
        input: PathBuf,
        /// Fade height in mm
        #[arg(long, default_value_t = 0.0)]
        fade_height: f64,
        /// Enable auto bed leveling correction (off by default)
        #[arg(long)]
        abl_enabled: bool,
        /// Machine start G-code template
        #[arg(long)]
        start_gcode: Option<PathBuf>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PluginConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PluginConfig::default(),
    };
    init_logging(&config, cli.verbose);
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Schema => {
            print_schema()?;
        }
        Commands::Augment { input, output } => {
            augment_file(&config, &input, output.as_deref())?;
        }
        Commands::Annotate {
            input,
            fade_height,
            abl_enabled,
            start_gcode,
            output,
        } => {
            let start_gcode = match start_gcode {
                Some(path) => fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => String::new(),
            };
            let resolver = FixedSettings::machine()
                .with_used_extruder(0)
                .with_global(ABL_ENABLED_KEY, abl_enabled)
                .with_global(FADE_HEIGHT_KEY, fade_height)
                .with_global(MACHINE_START_GCODE_KEY, start_gcode);
            annotate_file(&config, resolver, &input, output.as_deref())?;
        }
    }

    Ok(())
}

fn init_logging(config: &PluginConfig, verbose: bool) {
    let default_filter = if verbose { "debug" } else { config.log.filter.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_schema() -> Result<()> {
    let mut schema = serde_json::Map::new();
    for spec in &PLUGIN_SETTINGS {
        schema.insert(
            spec.key.to_string(),
            serde_json::Value::Object(spec.to_definition_json()),
        );
    }
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn augment_file(config: &PluginConfig, input: &Path, output: Option<&Path>) -> Result<()> {
    let json = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let id = container_id(input);
    let tree = DefinitionTree::from_json(id.clone(), &json)?;

    let mut registry = MemoryRegistry::new();
    registry.insert_loaded(tree);
    let mut plugin =
        FadeHeightPlugin::new(registry, FixedSettings::new(), MemoryScene::new(), config);

    match plugin.handle_event(&HostEvent::container_loaded(id.clone()))? {
        EventOutcome::Definition(AugmentOutcome::Augmented(ids)) => {
            eprintln!("Added {} settings to {}", ids.len(), id);
        }
        EventOutcome::Definition(AugmentOutcome::Skipped(reason)) => {
            eprintln!("Left {} unchanged: {}", id, reason);
        }
        other => anyhow::bail!("unexpected outcome for load event: {:?}", other),
    }

    let (mut registry, _, _) = plugin.into_parts();
    let tree = registry
        .take_definition(&id)
        .context("definition vanished from registry")?;
    write_output(output, &serde_json::to_string_pretty(&tree.to_json())?)
}

fn annotate_file(
    config: &PluginConfig,
    resolver: FixedSettings,
    input: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let json = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let plates = GcodePlateSet::from_json(&json)?;

    let scene = MemoryScene::with_gcode(plates);
    let mut plugin = FadeHeightPlugin::new(MemoryRegistry::new(), resolver, scene, config);
    match plugin.handle_event(&HostEvent::write_started("file"))? {
        EventOutcome::Export(AnnotateOutcome::Processed { command, report, .. }) => {
            eprintln!(
                "{} annotated, {} already processed, {} without layers: {}",
                report.count(PlateStatus::Annotated),
                report.count(PlateStatus::AlreadyProcessed),
                report.count(PlateStatus::NoLayers),
                command.to_string().trim_end()
            );
        }
        EventOutcome::Export(AnnotateOutcome::Skipped(reason)) => {
            eprintln!("Left plates unchanged: {}", reason);
        }
        other => anyhow::bail!("unexpected outcome for export event: {:?}", other),
    }

    let (_, _, scene) = plugin.into_parts();
    let plates = scene.into_plates().unwrap_or_default();
    write_output(output, &plates.to_json()?)
}

/// Container id from a definition file name: `creality_ender3.def.json` -> `creality_ender3`.
fn container_id(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("definition");
    name.strip_suffix(".def.json")
        .or_else(|| name.strip_suffix(".json"))
        .unwrap_or(name)
        .to_string()
}

fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
