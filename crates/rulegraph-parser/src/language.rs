use rulegraph_core::{Result, RuleGraphError};
use std::path::Path;
use tree_sitter::Parser;

/// Extensions of the analyzed language.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx"];

/// The grammar of the analyzed language.
pub fn grammar() -> tree_sitter::Language {
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}

/// Construct a parser configured for the analyzed language.
pub fn make_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&grammar())
        .map_err(|e| RuleGraphError::Parse(format!("grammar version mismatch: {}", e)))?;
    Ok(parser)
}

/// True for `.ts`/`.tsx` source files. Declaration files (`.d.ts`) carry no
/// executable statements and are excluded.
pub fn is_source_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    if !SOURCE_EXTENSIONS.contains(&ext) {
        return false;
    }
    !path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".d.ts"))
}
