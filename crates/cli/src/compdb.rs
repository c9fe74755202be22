//! Compilation databases (`compile_commands.json`).

use anyhow::{Context, Result};
use cxxgraph_ast::paths::absolutize;
use ignore::WalkBuilder;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const DATABASE_FILE: &str = "compile_commands.json";

/// One entry of a compilation database
#[derive(Debug, Clone, Deserialize)]
pub struct CompileCommand {
    pub directory: PathBuf,
    pub file: PathBuf,
    #[serde(default)]
    pub arguments: Option<Vec<String>>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl CompileCommand {
    /// Compiler arguments, from `arguments` or split from `command`
    pub fn args(&self) -> Vec<String> {
        match (&self.arguments, &self.command) {
            (Some(arguments), _) => arguments.clone(),
            (None, Some(command)) => split_command(command),
            (None, None) => Vec::new(),
        }
    }
}

/// A translation unit ready to be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileUnit {
    /// Absolute, normalized path of the main source file
    pub source: PathBuf,
    pub directory: PathBuf,
    pub include_dirs: Vec<PathBuf>,
}

/// Every `compile_commands.json` below `root` (.gitignore aware)
pub fn find_databases(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true);

    for result in builder.build() {
        match result {
            Ok(entry) => {
                if entry.file_type().is_some_and(|t| t.is_file()) && entry.file_name() == DATABASE_FILE {
                    found.push(entry.path().to_path_buf());
                }
            }
            Err(e) => log::warn!("Failed to read entry: {e}"),
        }
    }
    found.sort();
    log::info!("Found {} compilation database(s) under {}", found.len(), root.display());
    found
}

/// Translation units of one database. Relative directories are taken
/// relative to the database's own directory.
pub fn load_database(path: &Path) -> Result<Vec<CompileUnit>> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let commands: Vec<CompileCommand> =
        serde_json::from_str(&text).with_context(|| format!("Invalid compilation database {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    Ok(commands
        .into_iter()
        .map(|command| {
            let directory = absolutize(&command.directory, base);
            let args = command.args();
            CompileUnit {
                source: absolutize(&command.file, &directory),
                include_dirs: include_dirs(&args, &directory),
                directory,
            }
        })
        .collect())
}

/// Units of all databases, first occurrence of each source file wins
pub fn load_all(databases: &[PathBuf]) -> Vec<CompileUnit> {
    let mut seen = HashSet::new();
    let mut units = Vec::new();
    for database in databases {
        match load_database(database) {
            Ok(loaded) => units.extend(loaded.into_iter().filter(|unit| seen.insert(unit.source.clone()))),
            Err(e) => log::warn!("Skipping {}: {e:#}", database.display()),
        }
    }
    units
}

/// `-I dir`, `-Idir`, `-iquote dir` and `-iquotedir`, resolved against `directory`
pub fn include_dirs(args: &[String], directory: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let value = match arg.as_str() {
            "-I" | "-iquote" => iter.next().cloned(),
            other => other
                .strip_prefix("-iquote")
                .or_else(|| other.strip_prefix("-I"))
                .filter(|rest| !rest.is_empty())
                .map(str::to_string),
        };
        if let Some(dir) = value {
            dirs.push(absolutize(Path::new(&dir), directory));
        }
    }
    dirs
}

/// Split a shell command line on whitespace, honouring quotes and
/// backslash escapes
pub fn split_command(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') | (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_quoted_commands() {
        assert_eq!(
            split_command(r#"g++ -I "my dir" -DNAME=\"x\" 'a b.cpp'  -c"#),
            vec!["g++", "-I", "my dir", "-DNAME=\"x\"", "a b.cpp", "-c"]
        );
        assert_eq!(split_command("  "), Vec::<String>::new());
        assert_eq!(split_command("cc \"\""), vec!["cc", ""]);
    }

    #[test]
    fn extracts_include_dirs() {
        let args: Vec<String> = ["g++", "-Iinclude", "-I", "/abs", "-iquote", "q", "-Wall", "-I"]
            .map(String::from)
            .to_vec();
        assert_eq!(
            include_dirs(&args, Path::new("/build")),
            vec![
                PathBuf::from("/build/include"),
                PathBuf::from("/abs"),
                PathBuf::from("/build/q"),
            ]
        );
    }

    #[test]
    fn loads_both_entry_styles() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join(DATABASE_FILE);
        std::fs::write(
            &db,
            r#"[
                {"directory": "build", "file": "../src/a.cpp", "arguments": ["c++", "-I../include", "-c", "../src/a.cpp"]},
                {"directory": "/abs/build", "file": "/abs/src/b.cpp", "command": "c++ -I /abs/inc -c /abs/src/b.cpp"}
            ]"#,
        )
        .unwrap();

        let units = load_database(&db).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].source, dir.path().join("src/a.cpp"));
        assert_eq!(units[0].include_dirs, vec![dir.path().join("include")]);
        assert_eq!(units[1].source, PathBuf::from("/abs/src/b.cpp"));
        assert_eq!(units[1].include_dirs, vec![PathBuf::from("/abs/inc")]);
    }

    #[test]
    fn finds_nested_databases_and_dedupes_units() {
        let dir = tempfile::tempdir().unwrap();
        let entry = format!(
            r#"[{{"directory": "{}", "file": "main.cpp", "command": "c++ main.cpp"}}]"#,
            dir.path().display()
        );
        for sub in ["one", "two/deeper"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
            std::fs::write(dir.path().join(sub).join(DATABASE_FILE), &entry).unwrap();
        }

        let databases = find_databases(dir.path());
        assert_eq!(databases.len(), 2);
        assert_eq!(load_all(&databases).len(), 1);
    }
}
