use std::{path::PathBuf, process};

use anyhow::bail;
use clap::{Parser, Subcommand, ValueHint};

use vrm_codec::encode::NodeSelection;
use vrm_codec::logging::{LogLevel, init_logging};
use vrm_codec::settings::load_settings;
use vrm_codec::{
    Codec, CodecSettings, ExportOptions, Severity, SpecGeneration, ValidationIssue, VrmError,
};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Increase log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Codec settings file (JSON)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a file and print every issue
    Validate {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Print issues as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Print a summary of a file
    Inspect {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Validate, optionally convert, and write a new file
    Convert {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(value_hint = ValueHint::FilePath)]
        output: PathBuf,
        /// Target generation: 0 (0.x) or 1 (1.0)
        #[arg(long, value_parser = parse_generation)]
        to: Option<SpecGeneration>,
        /// Export only the subtrees rooted at these nodes
        #[arg(long = "node", value_name = "N")]
        nodes: Vec<usize>,
    },
}

fn parse_generation(value: &str) -> Result<SpecGeneration, String> {
    match value {
        "0" | "0.x" => Ok(SpecGeneration::Vrm0),
        "1" | "1.0" => Ok(SpecGeneration::Vrm1),
        other => Err(format!("unknown VRM generation '{other}' (expected 0 or 1)")),
    }
}

fn print_issues(issues: &[ValidationIssue]) {
    for issue in issues {
        println!("{issue}");
    }
}

fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|issue| issue.severity == Severity::Error)
}

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("{err:#}");
            process::exit(1);
        }
    }
}

/// Returns `false` when the input had error-level issues.
fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse();
    init_logging(LogLevel::from_verbosity(cli.verbose));

    let settings = match &cli.settings {
        Some(path) => load_settings(path)?,
        None => CodecSettings::default(),
    };
    let codec = Codec::new(settings);

    match cli.command {
        Command::Validate { file, json } => {
            let report = codec.analyze_path(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report.issues)?);
            } else {
                print_issues(&report.issues);
                println!(
                    "{}: {} error(s), {} warning(s)",
                    file.display(),
                    report.error_count(),
                    report.issues.len() - report.error_count()
                );
            }
            Ok(!has_errors(&report.issues))
        }
        Command::Inspect { file, json } => {
            let report = codec.analyze_path(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(!has_errors(&report.issues));
            }
            println!(
                "Generation: {}",
                report.generation.map_or("glTF (no VRM)", SpecGeneration::as_str)
            );
            println!("Model: {}", report.model_name);
            if !report.authors.is_empty() {
                println!("Authors: {}", report.authors.join(", "));
            }
            println!(
                "Nodes: {}, Meshes: {}, Materials: {}, Textures: {}",
                report.node_count, report.mesh_count, report.material_count, report.texture_count
            );
            println!(
                "Vertices: {}, Polygons: {}",
                report.total_vertices, report.total_polygons
            );
            if let Some(height) = report.estimated_height_cm {
                println!("Height: {height:.2}cm");
            }
            println!("Expressions: {}", report.expression_count);
            println!("Mapped bones: {}", report.mapped_bones.len());
            if !report.missing_required_bones.is_empty() {
                println!(
                    "Missing required bones: {}",
                    report.missing_required_bones.join(", ")
                );
            }
            print_issues(&report.issues);
            Ok(!has_errors(&report.issues))
        }
        Command::Convert {
            input,
            output,
            to,
            nodes,
        } => {
            if input == output {
                bail!("refusing to overwrite the input file: {}", input.display());
            }
            let validated = match codec.import_path(&input) {
                Ok(validated) => validated,
                Err(err) => {
                    if let Some(VrmError::Validation(issues)) = err.downcast_ref::<VrmError>() {
                        print_issues(issues);
                    }
                    return Err(err);
                }
            };
            let selection = if nodes.is_empty() {
                NodeSelection::All
            } else {
                NodeSelection::Subtrees(nodes)
            };
            let exported = codec.export_path(
                &validated,
                &output,
                &ExportOptions {
                    generation: to,
                    selection,
                },
            )?;
            print_issues(&exported.warnings);
            println!(
                "Wrote {} ({}, {} bytes)",
                output.display(),
                exported.generation.map_or("glTF", SpecGeneration::as_str),
                exported.bytes.len()
            );
            Ok(true)
        }
    }
}
