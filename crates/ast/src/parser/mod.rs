//! Tree-sitter C++ front end producing a resolved [`Ast`]

mod body;
mod decls;
mod lower;
mod sources;
mod symbols;
mod syntax;

pub use sources::SourceLoader;

use crate::error::{AstError, Result};
use crate::paths::{normalize_path, to_slash};
use crate::tree::Ast;
use lower::Lowerer;
use serde::{Deserialize, Serialize};
use sources::SourceSet;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tree_sitter::Parser;

/// Options for parsing a translation unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Directories searched for quoted includes after the includer's own directory
    pub include_dirs: Vec<PathBuf>,
}

impl ParseOptions {
    pub fn with_include_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.include_dirs.extend(dirs);
        self
    }
}

/// C++ parser that lowers tree-sitter syntax into the cursor model
pub struct CppParser {
    parser: Parser,
}

impl CppParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_cpp::LANGUAGE.into())
            .map_err(|e| AstError::tree_sitter(format!("failed to load C++ grammar: {e}")))?;
        Ok(Self { parser })
    }

    /// Parse a translation unit from disk, following quoted includes
    pub fn parse_file(&mut self, path: impl AsRef<Path>, options: &ParseOptions) -> Result<Ast> {
        let main = to_slash(&normalize_path(path.as_ref()));
        self.parse_with(&main, options, &|p: &Path| std::fs::read_to_string(p))
    }

    /// Parse a translation unit held in memory. `headers` maps include
    /// paths (as resolved relative to the including file) to contents.
    pub fn parse_source(&mut self, main_path: &str, source: &str, headers: &[(&str, &str)]) -> Result<Ast> {
        let main = to_slash(&normalize_path(Path::new(main_path)));
        let mut files: HashMap<String, String> = headers
            .iter()
            .map(|(path, text)| (to_slash(&normalize_path(Path::new(path))), (*text).to_string()))
            .collect();
        files.insert(main.clone(), source.to_string());
        let loader = move |path: &Path| {
            files
                .get(&to_slash(path))
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
        };
        self.parse_with(&main, &ParseOptions::default(), &loader)
    }

    /// Parse with a caller-provided file loader
    pub fn parse_with(&mut self, main: &str, options: &ParseOptions, loader: &SourceLoader<'_>) -> Result<Ast> {
        let sources = SourceSet::load(&mut self.parser, main, &options.include_dirs, loader)?;
        let ast = Lowerer::new(&sources).run();
        ast.validate()?;
        log::debug!("{main}: lowered {} node(s) from {} file(s)", ast.len(), sources.files.len());
        Ok(ast)
    }
}
