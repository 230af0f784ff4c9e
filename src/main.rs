use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use scim2_sdk::{
    parse_filter, parse_path, DocumentEngine, FilterEvaluator, ParserOptions, PatchOptions, PatchRequest,
};
use serde_json::Value;
use tracing::Level;

/// Inspect SCIM paths and filters, and apply PATCH requests to documents.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
    /// Extra characters to accept in attribute names
    #[arg(long, global = true, default_value = "")]
    allow_chars: String,
    /// Maximum filter nesting and path length
    #[arg(long, global = true)]
    max_depth: Option<usize>,
    /// JSON file with patch and parser options (camelCase keys)
    #[arg(long, global = true)]
    options: Option<std::path::PathBuf>,
    /// Log verbosity; repeat for more
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a path and print its canonical form and elements
    Path { path: String },
    /// Parse a filter; with --document, print whether it matches
    Filter {
        filter: String,
        #[arg(long)]
        document: Option<String>,
    },
    /// Apply a PATCH request to a document and print the result
    Patch {
        document: String,
        patch: String,
        /// Keep going when a remove or replace matches nothing
        #[arg(long)]
        ignore_no_target: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(out) => {
            println!("{out}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<String, Box<dyn std::error::Error>> {
    let patch_opts = patch_options(&args)?;
    let opts = patch_opts.parser.clone();
    match args.command {
        Command::Path { path } => {
            let path = parse_path(&path, &opts)?;
            let out = serde_json::json!({
                "path": path.to_string(),
                "schema": path.schema_urn(),
                "elements": path
                    .elements()
                    .iter()
                    .map(|e| serde_json::json!({
                        "name": e.name(),
                        "filter": e.value_filter().map(|f| f.to_string()),
                    }))
                    .collect::<Vec<_>>(),
            });
            Ok(serde_json::to_string_pretty(&out)?)
        }
        Command::Filter { filter, document } => {
            let filter = parse_filter(&filter, &opts)?;
            match document {
                None => Ok(filter.to_string()),
                Some(doc) => {
                    let doc: Value = serde_json::from_str(&doc)?;
                    Ok(FilterEvaluator::new().matches(&filter, &doc).to_string())
                }
            }
        }
        Command::Patch {
            document,
            patch,
            ignore_no_target,
        } => {
            let mut doc: Value = serde_json::from_str(&document)?;
            let request = PatchRequest::parse(&patch, &opts)?;
            let patch_opts = PatchOptions {
                ignore_no_target: ignore_no_target || patch_opts.ignore_no_target,
                ..patch_opts
            };
            request.apply_atomically(&mut doc, &DocumentEngine::new(), &patch_opts)?;
            Ok(serde_json::to_string_pretty(&doc)?)
        }
    }
}

fn patch_options(args: &Args) -> Result<PatchOptions, Box<dyn std::error::Error>> {
    let mut opts: PatchOptions = match &args.options {
        Some(file) => serde_json::from_str(&std::fs::read_to_string(file)?)?,
        None => PatchOptions::default(),
    };
    let mut parser: ParserOptions = opts.parser.allow_chars(args.allow_chars.chars());
    if let Some(depth) = args.max_depth {
        parser = parser.with_max_depth(depth);
    }
    opts.parser = parser;
    Ok(opts)
}
