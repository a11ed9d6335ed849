use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use core_ltx::artifacts::{ArtifactPage, render_full, render_index};
use core_ltx::content::normalize;
use core_ltx::diff::{DEFAULT_SIMILARITY_THRESHOLD, PreviousContent, evaluate, fingerprint};

#[derive(Parser)]
#[command(name = "core-ltx")]
#[command(about = "Change detection + artifact rendering toolkit", long_about = None)]
struct CoreCli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the fingerprint of a page after normalization.
    Fingerprint {
        #[arg(short, long, value_parser = validate_input_file)]
        file: PathBuf,
    },

    /// Compare two versions of a page and print the change verdict.
    Diff {
        /// The previous version of the page.
        #[arg(long, value_parser = validate_input_file)]
        old: PathBuf,
        /// The current version of the page.
        #[arg(long, value_parser = validate_input_file)]
        new: PathBuf,
        /// Pages at or above this similarity are unchanged.
        #[arg(short, long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
        threshold: f64,
    },

    /// Render artifacts from a JSON array of pages ({url, title, description, summary, content}).
    Render {
        #[arg(short, long, value_parser = validate_input_file)]
        input: PathBuf,
        /// Site name used as the document title.
        #[arg(short, long, default_value = "example.com")]
        site: String,
        #[arg(short, long, value_enum, default_value_t = Kind::Index)]
        kind: Kind,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Index,
    Full,
}

fn validate_input_file(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);

    if !path.exists() {
        return Err(format!("Input path does not exist: {}", path.display()));
    }

    if !path.is_file() {
        return Err(format!("Input path is not a file: {}", path.display()));
    }

    Ok(path)
}

fn read(path: &PathBuf) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("Cannot read file ({:?}) due to: {}", path, e))
}

fn run(cli: CoreCli) -> Result<(), String> {
    match cli.command {
        Commands::Fingerprint { file } => {
            let content = normalize(&read(&file)?);
            println!("{}", fingerprint(&content));
        }

        Commands::Diff { old, new, threshold } => {
            let old = normalize(&read(&old)?);
            let new = normalize(&read(&new)?);
            let previous = PreviousContent {
                fingerprint: fingerprint(&old),
                content: Some(old),
            };
            let verdict = evaluate(&new, Some(&previous), threshold);
            println!("similarity:     {:.4}", verdict.similarity);
            println!("changed_enough: {}", verdict.changed_enough);
            println!("reason:         {}", verdict.reason);
        }

        Commands::Render { input, site, kind } => {
            let pages: Vec<ArtifactPage> =
                serde_json::from_str(&read(&input)?).map_err(|e| format!("Invalid pages JSON: {}", e))?;
            let output = match kind {
                Kind::Index => render_index(&site, &pages),
                Kind::Full => render_full(&site, &pages),
            };
            print!("{}", output);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = CoreCli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
