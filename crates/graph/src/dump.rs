use crate::error::Result;
use crate::scope::ScopeFilter;
use cxxgraph_ast::{Ast, Cursor};
use std::io::Write;

/// Write one indented line per AST node: kind, spelling, resolved
/// reference, scope verdict and location.
pub fn write_ast_dump(ast: &Ast, filter: &ScopeFilter, mut w: impl Write) -> Result<()> {
    let mut stack = vec![(ast.root(), 0usize)];
    while let Some((node, depth)) = stack.pop() {
        writeln!(w, "{}", describe(node, depth, filter))?;
        let children: Vec<_> = node.children().collect();
        stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
    }
    Ok(())
}

fn describe(node: Cursor<'_>, depth: usize, filter: &ScopeFilter) -> String {
    let mut line = format!("{}{} '{}'", "  ".repeat(depth), node.kind(), node.spelling());
    if let Some(ty) = node.type_spelling() {
        line.push_str(&format!(" : {ty}"));
    }
    if let Some(target) = node.referenced() {
        line.push_str(&format!(" -> {} {}{}", target.kind(), target.spelling(), at(target)));
    }
    line.push_str(if filter.is_in_scope(node) { " [in]" } else { " [out]" });
    line.push_str(&at(node));
    line
}

fn at(node: Cursor<'_>) -> String {
    match node.location() {
        Some(loc) => format!(
            " @{}:{}:{}",
            loc.file.as_deref().unwrap_or("?"),
            loc.line,
            loc.column
        ),
        None => String::new(),
    }
}
