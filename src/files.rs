use anyhow::{bail, Result};
use log::{debug, warn};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Source tree of a Rust project.
///
/// Walks a project directory for `.rs` files, skipping `target` and hidden directories,
/// and maps every file to the module path it defines.
///
/// # Example
///
/// ```no_run
/// use asyncapi_from_source::files::SourceTree;
/// use std::path::PathBuf;
///
/// let tree = SourceTree::new(PathBuf::from("./my-service"));
/// let listing = tree.walk().unwrap();
/// println!("Found {} Rust files", listing.rust_files.len());
/// ```
#[derive(Debug)]
pub struct SourceTree {
    root_path: PathBuf,
}

/// Files found by [`SourceTree::walk`].
#[derive(Debug)]
pub struct SourceListing {
    /// Every `.rs` file, sorted by path so later stages see a stable order
    pub rust_files: Vec<PathBuf>,
    /// Paths that could not be read
    pub warnings: Vec<String>,
}

impl SourceTree {
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Collects every `.rs` file below the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a directory.
    pub fn walk(&self) -> Result<SourceListing> {
        if !self.root_path.is_dir() {
            bail!("Project path is not a directory: {}", self.root_path.display());
        }

        let mut rust_files = Vec::new();
        let mut warnings = Vec::new();

        let entries = WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.path() == self.root_path {
                    return true;
                }
                let file_name = e.file_name().to_string_lossy();
                !file_name.starts_with('.') && file_name != "target"
            });

        for entry in entries {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("rs") {
                        rust_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        rust_files.sort();
        debug!(
            "Found {} Rust files under {}",
            rust_files.len(),
            self.root_path.display()
        );

        Ok(SourceListing {
            rust_files,
            warnings,
        })
    }
}

/// Module path defined by `file`, relative to the project `root`.
///
/// Everything up to and including the last `src` directory is dropped; `lib.rs`,
/// `main.rs` and `mod.rs` name their parent module.
///
/// - `src/lib.rs` → `crate`
/// - `src/orders/mod.rs` → `crate::orders`
/// - `src/orders/events.rs` → `crate::orders::events`
pub fn module_path_for(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);

    let mut segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if let Some(pos) = segments.iter().rposition(|s| s == "src") {
        segments.drain(..=pos);
    }

    if let Some(last) = segments.pop() {
        let stem = last.strip_suffix(".rs").unwrap_or(&last).to_string();
        if !matches!(stem.as_str(), "lib" | "main" | "mod") {
            segments.push(stem);
        }
    }

    let mut module_path = String::from("crate");
    for segment in segments {
        module_path.push_str("::");
        module_path.push_str(&segment.replace('-', "_"));
    }
    module_path
}
