use crate::document::{AsyncApiDocument, Info};
use crate::extractor::attributes::AttributeExtractor;
use crate::generator::generate_with;
use crate::options::{GeneratorOptions, MarkerType};
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::PathBuf;

/// AsyncAPI Generator - Generate AsyncAPI documents from annotated Rust messaging code
#[derive(Parser, Debug)]
#[command(name = "asyncapi-from-source")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the Rust project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Module to scan, with all of its sub-modules (repeatable)
    #[arg(short = 'm', long = "module", value_name = "MODULE", default_value = "crate")]
    pub modules: Vec<String>,

    /// Title written into the document's info section
    #[arg(long = "title", default_value = "Generated API")]
    pub title: String,

    /// Version written into the document's info section
    #[arg(long = "api-version", default_value = "1.0.0")]
    pub api_version: String,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!(
            "Project path does not exist: {}",
            args.project_path.display()
        );
    }

    if !args.project_path.is_dir() {
        anyhow::bail!(
            "Project path is not a directory: {}",
            args.project_path.display()
        );
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    match &args.output_path {
        Some(output) => info!("Output file: {}", output.display()),
        None => info!("Output: stdout"),
    }
    info!("Modules: {}", args.modules.join(", "));

    Ok(args)
}

/// Options for one run over the parsed arguments
pub fn options_from_args(args: &CliArgs) -> GeneratorOptions {
    let base = AsyncApiDocument::new(Info::new(&args.title, &args.api_version));
    args.modules
        .iter()
        .fold(GeneratorOptions::builder(), |builder, module| {
            builder.marker(MarkerType::module(module.as_str()))
        })
        .base_document(base)
        .build()
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting AsyncAPI document generation...");

    // Step 1: Scan and parse the project
    let extractor = AttributeExtractor::from_project(&args.project_path)?;

    // Step 2: Generate
    let options = options_from_args(&args);
    let generated =
        generate_with(&extractor, &options).context("Failed to generate AsyncAPI document")?;
    for warning in &generated.warnings {
        warn!("{}", warning);
    }

    // Step 3: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&generated.document)?,
        OutputFormat::Json => serialize_json(&generated.document)?,
    };

    // Step 4: Output to file or stdout
    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
        info!("Successfully wrote AsyncAPI document to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Channels: {}", generated.document.channels.len());
    info!("  - Schemas: {}", generated.document.components.schemas.len());
    info!("  - Warnings: {}", generated.warnings.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(path: PathBuf, extra: &[&str]) -> CliArgs {
        let mut argv = vec!["asyncapi-from-source".to_string(), path.display().to_string()];
        argv.extend(extra.iter().map(|s| s.to_string()));
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let args = args(temp_dir.path().to_path_buf(), &[]);

        assert_eq!(args.output_format, OutputFormat::Yaml);
        assert_eq!(args.modules, vec!["crate".to_string()]);
        assert_eq!(args.title, "Generated API");
        assert!(!args.verbose);
    }

    #[test]
    fn test_repeatable_modules() {
        let temp_dir = TempDir::new().unwrap();
        let args = args(
            temp_dir.path().to_path_buf(),
            &["-m", "crate::orders", "--module", "crate::billing", "-f", "json"],
        );

        assert_eq!(args.modules, vec!["crate::orders", "crate::billing"]);
        assert_eq!(args.output_format, OutputFormat::Json);

        let options = options_from_args(&args);
        assert_eq!(options.markers().len(), 2);
    }

    #[test]
    fn test_rejects_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        assert!(parse_args_from_parsed(args(missing, &[])).is_err());

        let file = temp_dir.path().join("file.rs");
        fs::write(&file, "").unwrap();
        assert!(parse_args_from_parsed(args(file, &[])).is_err());
    }

    #[test]
    fn test_run_writes_document() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(
            src.join("lib.rs"),
            r#"
                pub struct OrderPlaced { pub id: String, pub total: f64 }

                #[publish("orders", message = OrderPlaced)]
                pub struct OrderService;
            "#,
        )
        .unwrap();
        let output = temp_dir.path().join("out").join("asyncapi.json");

        let args = args(
            temp_dir.path().to_path_buf(),
            &["-f", "json", "-o", output.to_str().unwrap(), "--title", "Shop"],
        );
        run(args).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["info"]["title"], "Shop");
        assert_eq!(
            written["channels"]["orders"]["publish"]["message"]["payload"]["$ref"],
            "#/components/schemas/OrderPlaced"
        );
    }
}
