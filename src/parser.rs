use crate::files::module_path_for;
use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// AST (Abstract Syntax Tree) parser for Rust source files.
///
/// The `AstParser` uses the `syn` crate to parse Rust source code into an abstract syntax tree,
/// which the attribute extractor and type resolver then walk for declarations and type
/// definitions.
///
/// # Example
///
/// ```no_run
/// use asyncapi_from_source::parser::AstParser;
/// use std::path::Path;
///
/// let parsed = AstParser::parse_file(Path::new("src/main.rs")).unwrap();
/// println!("Parsed {} items in {}", parsed.syntax_tree.items.len(), parsed.module_path);
/// ```
pub struct AstParser;

/// A successfully parsed Rust file with its abstract syntax tree.
#[derive(Debug)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// Module the file defines, e.g. `crate::orders::events`
    pub module_path: String,
    /// The parsed abstract syntax tree
    pub syntax_tree: syn::File,
}

impl ParsedFile {
    /// Build a `ParsedFile` from source text already in memory
    pub fn from_source(module_path: &str, source: &str) -> Result<Self> {
        let syntax_tree = syn::parse_file(source)
            .with_context(|| format!("Failed to parse Rust syntax for module {}", module_path))?;
        Ok(Self {
            path: PathBuf::from(format!("{}.rs", module_path.replace("::", "/"))),
            module_path: module_path.to_string(),
            syntax_tree,
        })
    }
}

impl AstParser {
    /// Parses a single Rust source file as the crate root module.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file contains invalid Rust syntax
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        Self::parse_module(path, "crate")
    }

    /// Parses a Rust source file that defines `module_path`.
    pub fn parse_module(path: &Path, module_path: &str) -> Result<ParsedFile> {
        debug!("Parsing file: {} ({})", path.display(), module_path);

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let syntax_tree = syn::parse_file(&content)
            .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))?;

        Ok(ParsedFile {
            path: path.to_path_buf(),
            module_path: module_path.to_string(),
            syntax_tree,
        })
    }

    /// Parses every file under `root`, continuing even if some fail.
    ///
    /// Each file's module path is derived from its location relative to `root`. Files that
    /// fail to parse are logged and returned as `Err`, so callers can still document the
    /// rest of the project.
    pub fn parse_files(root: &Path, paths: &[PathBuf]) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} files", paths.len());

        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| {
                let module_path = module_path_for(root, path);
                Self::parse_module(path, &module_path).inspect_err(|e| {
                    warn!("Failed to parse {}: {}", path.display(), e);
                })
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// Helper function to create a temporary file with content
    fn create_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let file_path = dir.path().join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = fs::File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path
    }

    #[test]
    fn test_parse_valid_rust_file() {
        let temp_dir = TempDir::new().unwrap();
        let valid_code = r#"
            #[channel("orders")]
            #[publish(message = OrderPlaced)]
            pub struct OrderService;

            pub struct OrderPlaced {
                pub id: String,
            }
        "#;

        let file_path = create_temp_file(&temp_dir, "valid.rs", valid_code);
        let parsed = AstParser::parse_file(&file_path).unwrap();

        assert_eq!(parsed.path, file_path);
        assert_eq!(parsed.module_path, "crate");
        assert_eq!(parsed.syntax_tree.items.len(), 2);
    }

    #[test]
    fn test_parse_invalid_rust_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = create_temp_file(&temp_dir, "invalid.rs", "pub struct Broken {");

        let err_msg = AstParser::parse_file(&file_path).unwrap_err().to_string();
        assert!(err_msg.contains("Failed to parse Rust syntax"));
    }

    #[test]
    fn test_parse_nonexistent_file() {
        let err_msg = AstParser::parse_file(Path::new("/nonexistent/file.rs"))
            .unwrap_err()
            .to_string();
        assert!(err_msg.contains("Failed to read file"));
    }

    #[test]
    fn test_parse_files_derives_module_paths() {
        let temp_dir = TempDir::new().unwrap();
        let lib = create_temp_file(&temp_dir, "src/lib.rs", "pub mod orders;");
        let orders = create_temp_file(&temp_dir, "src/orders/mod.rs", "pub mod events;");
        let events = create_temp_file(&temp_dir, "src/orders/events.rs", "pub struct E;");
        let broken = create_temp_file(&temp_dir, "src/broken.rs", "fn broken( {");

        let results = AstParser::parse_files(temp_dir.path(), &[lib, orders, events, broken]);

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap().module_path, "crate");
        assert_eq!(results[1].as_ref().unwrap().module_path, "crate::orders");
        assert_eq!(results[2].as_ref().unwrap().module_path, "crate::orders::events");
        assert!(results[3].is_err());
    }

    #[test]
    fn test_from_source() {
        let parsed = ParsedFile::from_source("crate::shop", "pub struct Cart;").unwrap();
        assert_eq!(parsed.module_path, "crate::shop");
        assert_eq!(parsed.syntax_tree.items.len(), 1);
        assert!(ParsedFile::from_source("crate", "struct {").is_err());
    }
}
