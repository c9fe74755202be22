//! Loading a translation unit and the project headers it includes

use super::syntax::{named_children, text};
use crate::error::{AstError, Result};
use crate::paths::{normalize_path, to_slash};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser, Tree};

/// Reads a file's contents by path
pub type SourceLoader<'a> = dyn Fn(&Path) -> io::Result<String> + 'a;

pub(super) struct SourceFile {
    pub path: String,
    pub text: String,
    pub tree: Tree,
}

/// Parsed files of one translation unit, main file first
pub(super) struct SourceSet {
    pub files: Vec<SourceFile>,
    /// `(file, byte offset of the #include)` -> included file
    pub includes: HashMap<(usize, usize), usize>,
}

impl SourceSet {
    pub fn load(
        parser: &mut Parser,
        main: &str,
        include_dirs: &[PathBuf],
        loader: &SourceLoader<'_>,
    ) -> Result<Self> {
        let text = loader(Path::new(main))?;
        let mut set = Self {
            files: Vec::new(),
            includes: HashMap::new(),
        };
        let mut index = HashMap::new();
        let mut queue = VecDeque::new();

        let directives = set.push(parser, main.to_string(), text)?;
        index.insert(main.to_string(), 0);
        queue.push_back((0, directives));

        while let Some((file, directives)) = queue.pop_front() {
            for (offset, name) in directives {
                let candidates = include_candidates(&set.files[file].path, &name, include_dirs);
                let mut resolved = None;
                for candidate in candidates {
                    if let Some(&known) = index.get(&candidate) {
                        resolved = Some(known);
                        break;
                    }
                    match loader(Path::new(&candidate)) {
                        Ok(text) => {
                            let directives = set.push(parser, candidate.clone(), text)?;
                            let id = set.files.len() - 1;
                            index.insert(candidate, id);
                            queue.push_back((id, directives));
                            resolved = Some(id);
                            break;
                        }
                        Err(err) => {
                            log::trace!("include candidate {candidate} not readable: {err}");
                        }
                    }
                }
                match resolved {
                    Some(target) => {
                        set.includes.insert((file, offset), target);
                    }
                    None => log::debug!(
                        "{}: include \"{name}\" not found, skipping",
                        set.files[file].path
                    ),
                }
            }
        }
        log::debug!("{main}: loaded {} file(s)", set.files.len());
        Ok(set)
    }

    /// Parse `text` and return its quoted `#include` directives
    fn push(&mut self, parser: &mut Parser, path: String, text: String) -> Result<Vec<(usize, String)>> {
        let tree = parser
            .parse(&text, None)
            .ok_or_else(|| AstError::parse(format!("tree-sitter produced no tree for {path}")))?;
        let mut directives = Vec::new();
        collect_includes(tree.root_node(), &text, &mut directives);
        self.files.push(SourceFile { path, text, tree });
        Ok(directives)
    }
}

/// Quoted includes resolve next to the including file first, then in the
/// include directories. Angle-bracket includes are system headers and are
/// not followed.
fn include_candidates(includer: &str, name: &str, include_dirs: &[PathBuf]) -> Vec<String> {
    let parent = Path::new(includer).parent().unwrap_or_else(|| Path::new(""));
    std::iter::once(parent.to_path_buf())
        .chain(include_dirs.iter().cloned())
        .map(|dir| to_slash(&normalize_path(&dir.join(name))))
        .collect()
}

fn collect_includes(node: Node<'_>, src: &str, out: &mut Vec<(usize, String)>) {
    for child in named_children(node) {
        if child.kind() == "preproc_include" {
            if let Some(path) = child.child_by_field_name("path") {
                if path.kind() == "string_literal" {
                    let name = text(path, src).trim_matches('"').to_string();
                    if !name.is_empty() {
                        out.push((child.start_byte(), name));
                    }
                }
            }
        } else {
            collect_includes(child, src, out);
        }
    }
}
