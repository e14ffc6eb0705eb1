//! tddgen - fill the blank `.tdd` template
//!
//! Usage:
//!   tddgen --facility "Riverside Clinic" --case "123 Main St" ... --re "John Smith"
//!   tddgen                      Prompt for every field
//!
//! Writes `<output_folder>/<re>.tdd`, or `<fallback-name>.tdd` when `re` is
//! blank and `--fallback-name` is given. Exit status is 0 on success, 2 when the
//! inputs can never succeed (bad encoding, unusable name, missing config key)
//! and 1 for anything else.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tddgen_core::{
    default_config_path, exit_code, fill_template, load_config, ConfigError, FieldSpec,
    FieldValues, InjectError, TDD_SCHEMA,
};

#[derive(Parser, Debug)]
#[command(name = "tddgen")]
#[command(about = "Fill the blank .tdd template; omitted fields are prompted for")]
#[command(version)]
struct Args {
    #[arg(long)]
    facility: Option<String>,

    #[arg(long)]
    case: Option<String>,

    /// Work order number
    #[arg(long)]
    wo: Option<String>,

    /// File number
    #[arg(long)]
    file: Option<String>,

    #[arg(long)]
    claim: Option<String>,

    #[arg(long)]
    attn: Option<String>,

    /// Subject name; also names the output file
    #[arg(long)]
    re: Option<String>,

    /// Date of birth
    #[arg(long)]
    dob: Option<String>,

    /// Config file (key=value lines)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Template path, overrides `template` from the config
    #[arg(long)]
    template: Option<PathBuf>,

    /// Output directory, overrides `output_folder` from the config
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Output file name to use when --re is blank
    #[arg(long, value_name = "NAME")]
    fallback_name: Option<String>,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn value(&self, name: &str) -> Option<&str> {
        match name {
            "facility" => self.facility.as_deref(),
            "case" => self.case.as_deref(),
            "wo" => self.wo.as_deref(),
            "file" => self.file.as_deref(),
            "claim" => self.claim.as_deref(),
            "attn" => self.attn.as_deref(),
            "re" => self.re.as_deref(),
            "dob" => self.dob.as_deref(),
            _ => None,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.quiet);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            ExitCode::from(classify(&err) as u8)
        }
    }
}

fn init_logging(quiet: bool) {
    let level = if quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

fn run(args: &Args) -> Result<()> {
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = load_config(&config_path)?;

    let output_dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => config.output_folder()?.to_path_buf(),
    };
    let template = args
        .template
        .clone()
        .unwrap_or_else(|| config.template_path());

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let values = collect_values(args, &TDD_SCHEMA, |spec| prompt(&mut input, spec))?;

    let (path, injection) = fill_template(
        &template,
        &TDD_SCHEMA,
        &values,
        &output_dir,
        args.fallback_name.as_deref(),
    )
    .with_context(|| format!("Failed to fill template {}", template.display()))?;

    tracing::info!("{}", injection.summary());
    println!("{} {}", "Saved".green().bold(), path.display());
    Ok(())
}

/// Take each field from the arguments, prompting for the ones not given.
///
/// Values are trimmed, so the injected text and the output name agree.
fn collect_values<F>(args: &Args, schema: &[FieldSpec], mut ask: F) -> Result<FieldValues>
where
    F: FnMut(&FieldSpec) -> Result<String>,
{
    let mut values = FieldValues::new();
    for spec in schema {
        let value = match args.value(spec.name) {
            Some(value) => value.to_string(),
            None => ask(spec)?,
        };
        values.insert(spec.name, value.trim());
    }
    Ok(values)
}

fn prompt<R: BufRead>(input: &mut R, spec: &FieldSpec) -> Result<String> {
    print!("Enter the {}: ", spec.label);
    io::stdout().flush().ok();

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .with_context(|| format!("Failed to read {}", spec.label))?;
    if read == 0 {
        // stdin closed: nobody is there to answer
        return Err(InjectError::MissingValue(spec.name.to_string()).into());
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Exit status for an error chain.
fn classify(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(inject) = cause.downcast_ref::<InjectError>() {
            return inject.exit_code();
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return exit_code::PERMANENT;
        }
    }
    exit_code::FAILURE
}
