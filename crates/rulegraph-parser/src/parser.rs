use crate::file_collect::collect_source_files;
use crate::language::make_parser;
use rulegraph_core::{Result, RuleGraphError};
use std::path::Path;
use tracing::{debug, warn};
use tree_sitter::Tree;

/// Default directory names excluded from collection wherever they appear as
/// a path segment.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] =
    &["node_modules", "dist", "build", ".next", ".git", "coverage"];

#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub excluded_dirs: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A parsed source file: root-relative path, owned source text and its
/// syntax tree. Immutable once created; the tree lives as long as the
/// owning [`ParsedProject`].
#[derive(Debug)]
pub struct ParsedFile {
    pub path: String,
    pub source: String,
    pub tree: Tree,
}

/// All parsed files of one pipeline invocation, in stable path order, plus
/// the paths that failed to parse and were skipped.
#[derive(Debug)]
pub struct ParsedProject {
    pub files: Vec<ParsedFile>,
    pub skipped: Vec<String>,
}

pub struct SourceParser {
    config: ParserConfig,
}

impl SourceParser {
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse every source file under `root`. A missing or unreadable root is
    /// fatal; an individual file that cannot be read or parsed is recorded
    /// on `skipped` and otherwise ignored.
    pub fn parse_project(&self, root: &Path) -> Result<ParsedProject> {
        if !root.is_dir() {
            return Err(RuleGraphError::ProjectRoot(root.display().to_string()));
        }

        let paths = collect_source_files(root, &self.config.excluded_dirs)?;
        let mut parser = make_parser()?;

        let mut files = Vec::with_capacity(paths.len());
        let mut skipped = Vec::new();

        for path in paths {
            let relative = relative_path(&path, root);
            let source = match std::fs::read_to_string(&path) {
                Ok(s) => s,
                Err(e) => {
                    warn!("skipping unreadable file {}: {}", relative, e);
                    skipped.push(relative);
                    continue;
                }
            };
            match parser.parse(&source, None) {
                Some(tree) if !tree.root_node().has_error() => {
                    files.push(ParsedFile {
                        path: relative,
                        source,
                        tree,
                    });
                }
                _ => {
                    warn!("skipping unparseable file {}", relative);
                    skipped.push(relative);
                }
            }
        }

        debug!("parsed {} files, skipped {}", files.len(), skipped.len());
        Ok(ParsedProject { files, skipped })
    }
}

impl Default for SourceParser {
    fn default() -> Self {
        Self::new()
    }
}

fn relative_path(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
