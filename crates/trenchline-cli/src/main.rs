//! trenchline CLI - pipeline profile drawings from project files
//!
//! Loads a TOML project, builds the profile scene and writes it out as DXF,
//! draw commands, or an analysis table.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use trenchline::{AnalysisTable, ProjectFile, Scene};

#[derive(Parser)]
#[command(name = "trenchline")]
#[command(about = "Pipeline profile drawings for excavation surveying", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the profile as DXF
    Dxf {
        /// Project file (.toml)
        project: PathBuf,
        /// Output DXF file
        output: PathBuf,
    },
    /// Dump draw commands as JSON
    Render {
        /// Project file (.toml)
        project: PathBuf,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the per-station analysis table
    Table {
        /// Project file (.toml)
        project: PathBuf,
        /// Print JSON instead of a text table
        #[arg(long)]
        json: bool,
    },
    /// Display information about a project
    Info {
        /// Project file (.toml)
        project: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Dxf { project, output } => export_dxf(&project, &output)?,
        Commands::Render { project, output } => render(&project, output.as_deref())?,
        Commands::Table { project, json } => table(&project, json)?,
        Commands::Info { project } => show_info(&project)?,
    }

    Ok(())
}

fn load(path: &Path) -> Result<(ProjectFile, Scene)> {
    let project = ProjectFile::load(path)
        .with_context(|| format!("failed to load project {}", path.display()))?;
    let scene = project
        .build_scene()
        .with_context(|| format!("invalid profile in {}", path.display()))?;
    for warning in &scene.warnings {
        log::warn!("{:?}", warning);
    }
    Ok((project, scene))
}

fn export_dxf(path: &Path, output: &Path) -> Result<()> {
    let ext = output.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !ext.eq_ignore_ascii_case("dxf") {
        anyhow::bail!("Unknown output format: {}", ext);
    }

    let (project, scene) = load(path)?;
    project.exporter().export_to_file(&scene, output)?;
    println!("Exported DXF to {}", output.display());
    Ok(())
}

fn render(path: &Path, output: Option<&Path>) -> Result<()> {
    let (project, scene) = load(path)?;
    let commands = project.renderer().render(&scene, project.render.device)?;
    let json = serde_json::to_string_pretty(&commands)?;

    match output {
        Some(out) => {
            fs::write(out, json)?;
            println!("Wrote {} draw commands to {}", commands.len(), out.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn table(path: &Path, json: bool) -> Result<()> {
    let (_, scene) = load(path)?;
    let table = AnalysisTable::from_scene(&scene);
    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
    } else {
        print!("{}", table);
    }
    Ok(())
}

fn show_info(path: &Path) -> Result<()> {
    let (project, scene) = load(path)?;
    let params = project.effective_parameters(&project.structure_set()?)?;

    println!("trenchline project: {}", path.display());
    if !params.section_name.is_empty() {
        println!("  Section: {}", params.section_name);
    }
    println!("  Length: {}m", params.total_length);
    println!("  Pipe: Ø{}mm", params.pipe_diameter);
    println!("  Slope: {:.3}%", params.slope());
    println!(
        "  Invert: {:.3}m -> {:.3}m",
        params.start_invert, params.end_invert
    );
    println!("  Samples: {}", scene.samples.len());

    println!("\nStructures:");
    for glyph in &scene.glyphs {
        println!(
            "  {} {} at {}m (GL {:.3}, IL {:.3}, EL {:.3})",
            glyph.kind.tag(),
            glyph.label,
            glyph.station,
            glyph.cover_level,
            glyph.invert_level,
            glyph.excavation_level
        );
    }

    if !scene.warnings.is_empty() {
        println!("\nWarnings:");
        for w in &scene.warnings {
            println!("  {:?} (off by {:.3}m)", w, w.divergence());
        }
    }

    Ok(())
}
