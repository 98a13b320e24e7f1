use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use docx_fidelity::audit::{build_coverage_report, build_structure_report};
use docx_fidelity::{ApplyOptions, Dom, UnmeasuredOracle, apply_render_model, extract, html, parse_path};

#[derive(Parser)]
#[command(version, about = "Inspect DOCX style baselines and HTML snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the style baseline as JSON
    Profile { input: PathBuf },
    /// Write an HTML snapshot of the document
    Snapshot {
        input: PathBuf,
        /// Output file; defaults to the input with an .html extension
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Run the render-model applier over the snapshot before writing
        #[arg(long)]
        apply: bool,
        /// Show paragraph and line-break marks
        #[arg(long)]
        marks: bool,
    },
    /// Print structure and coverage reports of the snapshot against the baseline
    Report { input: PathBuf },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Profile { input } => {
            let profile = extract(&parse_path(&input)?);
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::Snapshot {
            input,
            output,
            apply,
            marks,
        } => {
            let model = parse_path(&input)?;
            let mut markup = html::render_snapshot(&model);
            if apply {
                let profile = extract(&model);
                let mut dom = Dom::parse(&markup);
                let options = ApplyOptions {
                    show_formatting_marks: marks,
                    ..ApplyOptions::default()
                };
                let report =
                    apply_render_model(&mut dom, Some(&profile), &mut UnmeasuredOracle, &options);
                for diagnostic in &report.diagnostics {
                    eprintln!("warning: {diagnostic}");
                }
                markup = dom.to_html();
            }
            let output = output.unwrap_or_else(|| input.with_extension("html"));
            std::fs::write(&output, markup)?;
            println!("Wrote {}", output.display());
        }
        Command::Report { input } => {
            let model = parse_path(&input)?;
            let profile = extract(&model);
            let dom = Dom::parse(&html::render_snapshot(&model));
            let structure = build_structure_report(&dom, Some(&profile));
            let coverage = build_coverage_report(Some(&profile));
            println!("{}", serde_json::to_string_pretty(&structure)?);
            println!("{}", serde_json::to_string_pretty(&coverage)?);
        }
    }
    Ok(())
}
