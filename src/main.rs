use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use xapi_profiles::{ProfileConfig, Registry, XapiError};

#[derive(Parser)]
#[command(name = "xapi-profiles")]
#[command(about = "Inspect xAPI profiles and check statements against them", long_about = None)]
struct Cli {
    /// Profile directory (repeatable)
    #[arg(short, long = "profiles", global = true)]
    profiles: Vec<PathBuf>,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered profiles, templates and patterns
    List,
    /// Walk a pattern through a sequence of templates
    Sequence {
        /// Pattern name or IRI
        #[arg(short, long)]
        pattern: String,
        /// Template names or IRIs, in order
        #[arg(required = true)]
        templates: Vec<String>,
    },
    /// Check a statement file against a template
    Validate {
        /// Template name or IRI
        #[arg(short, long)]
        template: String,
        /// Statement JSON file
        statement: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    xapi_profiles::init_tracing(if cli.debug { "debug" } else { "warn" });

    let mut config = match &cli.config {
        Some(path) => ProfileConfig::from_yaml_file(path)?,
        None => ProfileConfig::new(),
    };
    config.profile_dirs.extend(cli.profiles.iter().cloned());
    if config.profile_dirs.is_empty() {
        bail!("no profile directories given; use --profiles or --config");
    }

    let registry = Registry::load(&config)?;

    match cli.command {
        Command::List => list(&registry),
        Command::Sequence { pattern, templates } => sequence(&registry, &pattern, &templates)?,
        Command::Validate { template, statement } => validate(&registry, &config, &template, &statement)?,
    }
    Ok(())
}

fn list(registry: &Registry) {
    let language = registry.options().language.as_str();
    for profile in registry.profiles() {
        println!("profile  {}  {}", profile.id, profile.label(language));
    }
    for template in registry.templates() {
        println!("template {}  {}", template.id, template.label(language));
    }
    for pattern in registry.patterns() {
        let marker = if pattern.primary { " (primary)" } else { "" };
        println!("pattern  {}{}", pattern.id, marker);
    }

    let metadata = registry.metadata();
    eprintln!(
        "{} profiles, {} templates, {} patterns, {} files skipped",
        metadata.profiles, metadata.templates, metadata.patterns, metadata.failed_files
    );
}

fn sequence(registry: &Registry, pattern: &str, templates: &[String]) -> anyhow::Result<()> {
    let mut occurrence = registry.occurrence(pattern)?;
    println!("pattern {} as registration {}", occurrence.pattern_id(), occurrence.registration());

    for name in templates {
        let template = registry.template(name)?;
        match occurrence.append(&template.id) {
            Ok(()) => println!("  accepted {}", template.id),
            Err(e @ XapiError::SequenceViolation { .. }) => {
                println!("  rejected {}", template.id);
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        }
    }

    let status = if occurrence.is_complete() { "complete" } else { "incomplete" };
    println!("pattern is {}", status);
    Ok(())
}

fn validate(
    registry: &Registry,
    config: &ProfileConfig,
    template: &str,
    path: &Path,
) -> anyhow::Result<()> {
    let template = registry.template(template)?;
    let contents = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let statement: serde_json::Value =
        serde_json::from_slice(&contents).with_context(|| format!("parsing {}", path.display()))?;

    template.validate_with(&statement, config.validation)?;
    println!("statement matches {}", template.id);
    Ok(())
}
