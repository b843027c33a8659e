//! gridbook CLI - evaluate and format gridbook documents

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gridbook::prelude::*;
use gridbook::DocumentReader;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Extension of documents looked up by `--pages`
const PAGE_EXTENSION: &str = "gridbook";

#[derive(Parser)]
#[command(name = "gridbook")]
#[command(author, version, about = "Evaluate and format gridbook documents")]
struct Cli {
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a document and print its values
    Eval {
        /// Input document (persisted text or JSON grid)
        input: PathBuf,

        /// Directory holding the pages that external references point to
        #[arg(short, long)]
        pages: Option<PathBuf>,

        /// Id of the input page, so references back to it resolve locally
        #[arg(long)]
        page_id: Option<String>,

        /// Reject ranges larger than this many cells
        #[arg(long)]
        max_range_cells: Option<u64>,
    },

    /// Rewrite a document in canonical form
    Fmt {
        /// Input document
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long, conflicts_with = "in_place")]
        output: Option<PathBuf>,

        /// Overwrite the input file
        #[arg(short, long)]
        in_place: bool,
    },

    /// List the external references used by a document's formulas
    Refs {
        /// Input document
        input: PathBuf,
    },

    /// Set cells and write the document back
    Set {
        /// Input document
        input: PathBuf,

        /// Assignments such as `A1=5` or `B1==A1*2`
        #[arg(required = true)]
        assignments: Vec<String>,

        /// Output file (default: overwrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write an empty document
    New {
        /// Output file
        output: PathBuf,

        #[arg(long, default_value_t = gridbook::DEFAULT_ROW_COUNT)]
        rows: u32,

        #[arg(long, default_value_t = gridbook::DEFAULT_COLUMN_COUNT)]
        columns: u32,

        /// Page id written into the document
        #[arg(long)]
        page_id: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Eval {
            input,
            pages,
            page_id,
            max_range_cells,
        } => {
            let limits = EvaluationLimits {
                max_range_cells,
                max_depth: None,
            };
            let report = eval(&input, pages.as_deref(), page_id, limits)?;
            io::stdout()
                .write_all(report.as_bytes())
                .context("Failed to write to stdout")
        }
        Commands::Fmt {
            input,
            output,
            in_place,
        } => {
            let target = if in_place { Some(input.clone()) } else { output };
            fmt(&input, target.as_deref())
        }
        Commands::Refs { input } => {
            for reference in refs(&input)? {
                println!("{}", reference);
            }
            Ok(())
        }
        Commands::Set {
            input,
            assignments,
            output,
        } => {
            let target = output.unwrap_or_else(|| input.clone());
            set(&input, &assignments, &target)
        }
        Commands::New {
            output,
            rows,
            columns,
            page_id,
        } => new_document(&output, rows, columns, page_id),
    }
}

/// Install the stderr subscriber; `GRIDBOOK_LOG` wins over `RUST_LOG`
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("GRIDBOOK_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load(path: &Path) -> Result<Grid> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    Ok(parse_grid_content(text))
}

fn write_document(grid: &Grid, page_id: Option<String>, path: &Path) -> Result<()> {
    let options = SerializeOptions {
        page_id,
        sheet_name: None,
    };
    let text = serialize_grid_content(grid, &options).context("Failed to serialize document")?;
    fs::write(path, text).with_context(|| format!("Failed to write '{}'", path.display()))
}

/// Page id recorded in a persisted document, if any
fn document_page_id(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    DocumentReader::read_str(&text).ok()?.page_id
}

/// Resolves external references to `<id>.gridbook` (or `<label>.gridbook`)
/// files in one directory
struct DirectoryResolver {
    root: PathBuf,
}

impl ExternalResolver for DirectoryResolver {
    fn resolve(&mut self, reference: &ExternalReference) -> std::result::Result<ResolvedPage, String> {
        let stem = page_stem(reference)?;
        let path = self.root.join(format!("{}.{}", stem, PAGE_EXTENSION));
        debug!(reference = %reference.raw, path = %path.display(), "resolving page");

        let text = fs::read_to_string(&path)
            .map_err(|e| format!("Cannot open page '{}': {}", reference.label, e))?;
        Ok(ResolvedPage {
            page_id: stem,
            page_title: reference.label.clone(),
            grid: parse_grid_content(text),
        })
    }
}

/// File stem for a referenced page; it must name a file directly inside the
/// pages directory
fn page_stem(reference: &ExternalReference) -> std::result::Result<String, String> {
    let stem = reference
        .identifier
        .clone()
        .unwrap_or_else(|| reference.normalized_label());
    let trimmed = stem.trim();
    if trimmed.is_empty()
        || trimmed.contains("..")
        || trimmed.contains(['/', '\\'])
        || Path::new(trimmed).is_absolute()
    {
        return Err(format!(
            "Invalid page name '{}' for reference '{}'",
            stem, reference.label
        ));
    }
    Ok(trimmed.to_string())
}

/// Display grid as tab-separated rows up to the last non-empty row, then the
/// errors, one per line
fn eval(
    input: &Path,
    pages: Option<&Path>,
    page_id: Option<String>,
    limits: EvaluationLimits,
) -> Result<String> {
    let grid = load(input)?;
    let mut resolver = pages.map(|root| DirectoryResolver {
        root: root.to_path_buf(),
    });

    let options = EvaluationOptions {
        page_id: page_id.or_else(|| document_page_id(input)),
        page_title: None,
        resolver: resolver
            .as_mut()
            .map(|r| r as &mut dyn ExternalResolver),
        limits,
    };
    let evaluation = evaluate_sheet(&grid, options);

    let used_rows = evaluation
        .display
        .iter()
        .rposition(|row| row.iter().any(|cell| !cell.is_empty()))
        .map_or(0, |last| last + 1);

    let mut out = String::new();
    for row in &evaluation.display[..used_rows] {
        out.push_str(row.join("\t").trim_end_matches('\t'));
        out.push('\n');
    }
    for (address, cell) in &evaluation.cells {
        if let Some(error) = &cell.error {
            out.push_str(&format!("{}: {} {}\n", address, cell.display, error.message));
        }
    }
    Ok(out)
}

fn fmt(input: &Path, output: Option<&Path>) -> Result<()> {
    let grid = load(input)?;
    let page_id = document_page_id(input);
    match output {
        Some(path) => write_document(&grid, page_id, path),
        None => {
            let options = SerializeOptions {
                page_id,
                sheet_name: None,
            };
            let text =
                serialize_grid_content(&grid, &options).context("Failed to serialize document")?;
            io::stdout()
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")
        }
    }
}

fn refs(input: &Path) -> Result<Vec<String>> {
    let grid = load(input)?;
    Ok(collect_external_references(&grid)
        .into_iter()
        .map(|r| r.raw)
        .collect())
}

/// Parse `ADDR=value`; the value may itself start with `=`
fn parse_assignment(assignment: &str) -> Result<CellUpdate> {
    let Some((address, value)) = assignment.split_once('=') else {
        bail!("Expected ADDR=value, got '{}'", assignment);
    };
    if !is_valid_address(address) {
        bail!("Invalid cell address: {}", address.trim());
    }
    Ok(CellUpdate::new(address.trim(), value))
}

fn set(input: &Path, assignments: &[String], output: &Path) -> Result<()> {
    let grid = load(input)?;
    let updates = assignments
        .iter()
        .map(|a| parse_assignment(a))
        .collect::<Result<Vec<_>>>()?;
    let grid = update_cells(grid, &updates).context("Failed to apply updates")?;
    write_document(&grid, document_page_id(input), output)
}

fn new_document(output: &Path, rows: u32, columns: u32, page_id: Option<String>) -> Result<()> {
    if output.exists() {
        bail!("'{}' already exists", output.display());
    }
    write_document(&create_empty_grid(rows, columns), page_id, output)
}
