//! Lowering of tree-sitter syntax trees into the cursor model.
//!
//! Runs in two passes so that bodies can reference declarations that
//! appear later in the translation unit:
//!
//! 1. declarations (namespaces, records, functions, fields, aliases) of
//!    every reachable file, recording a qualified-name symbol table
//! 2. function bodies, resolving calls, member references and
//!    constructions against that table

use super::body::PendingBody;
use super::sources::SourceSet;
use super::symbols::{lookup_context, SymbolTable};
use super::syntax::{bare_type, column, line, named_children, strip_template_args, text};
use crate::kind::CursorKind;
use crate::tree::{Ast, NodeData, NodeId};
use std::collections::HashSet;
use tree_sitter::Node;

/// Lexical scope while lowering declarations
#[derive(Debug, Clone)]
pub(super) struct DeclScope {
    pub path: Vec<String>,
    pub node: NodeId,
    /// Qualified name of the class whose body is being lowered
    pub record: Option<String>,
}

impl DeclScope {
    pub fn qualify(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}::{name}", self.path.join("::"))
        }
    }

    pub fn context(&self) -> Vec<String> {
        lookup_context(&self.path)
    }

    pub fn enter(&self, name: Option<&str>, node: NodeId, record: Option<String>) -> Self {
        let mut path = self.path.clone();
        if let Some(name) = name {
            path.push(name.to_string());
        }
        Self { path, node, record }
    }
}

struct PendingTypeRef {
    node: NodeId,
    name: String,
    context: Vec<String>,
}

pub(super) struct Lowerer<'t> {
    pub(super) sources: &'t SourceSet,
    pub(super) ast: Ast,
    pub(super) symbols: SymbolTable,
    pub(super) bodies: Vec<PendingBody<'t>>,
    lowered: HashSet<usize>,
    pending_types: Vec<PendingTypeRef>,
    declarations_done: bool,
}

impl<'t> Lowerer<'t> {
    pub fn new(sources: &'t SourceSet) -> Self {
        let main = sources.files.first().map(|f| f.path.clone()).unwrap_or_default();
        Self {
            sources,
            ast: Ast::for_translation_unit(main),
            symbols: SymbolTable::default(),
            bodies: Vec::new(),
            lowered: HashSet::new(),
            pending_types: Vec::new(),
            declarations_done: false,
        }
    }

    pub fn run(mut self) -> Ast {
        let root = self.ast.root_id();
        let scope = DeclScope {
            path: Vec::new(),
            node: root,
            record: None,
        };
        self.lower_file(0, root, &scope);
        self.finish_declarations();
        self.lower_bodies();
        self.ast
    }

    pub(super) fn src(&self, file: usize) -> &'t str {
        &self.sources.files[file].text
    }

    pub(super) fn path(&self, file: usize) -> &'t str {
        &self.sources.files[file].path
    }

    pub(super) fn lower_file(&mut self, file: usize, parent: NodeId, scope: &DeclScope) {
        if !self.lowered.insert(file) {
            return;
        }
        let root = self.sources.files[file].tree.root_node();
        self.lower_items(file, root, parent, scope);
    }

    pub(super) fn included_file(&self, file: usize, directive: Node<'_>) -> Option<usize> {
        self.sources.includes.get(&(file, directive.start_byte())).copied()
    }

    /// Emit TYPE_REF children for every user-visible type name in `type_node`
    pub(super) fn add_type_refs(&mut self, file: usize, type_node: Node<'t>, parent: NodeId, context: &[String]) {
        let src = self.src(file);
        let path = self.path(file);
        let mut names = Vec::new();
        collect_type_names(type_node, src, &mut names);
        for (name, at) in names {
            let id = self.ast.add_child(
                parent,
                NodeData::new(CursorKind::TypeRef, name.clone()).at(path, line(at), column(at)),
            );
            self.add_type_ref_target(id, name, context.to_vec());
        }
    }

    /// Resolve a TYPE_REF now, or once all declarations are known
    pub(super) fn add_type_ref_target(&mut self, node: NodeId, name: String, context: Vec<String>) {
        if self.declarations_done {
            self.resolve_type_ref(node, &name, &context);
        } else {
            self.pending_types.push(PendingTypeRef { node, name, context });
        }
    }

    fn resolve_type_ref(&mut self, node: NodeId, name: &str, context: &[String]) {
        let Some((qualified, entry)) = self.symbols.find_type(name, context) else {
            return;
        };
        let spelling = entry.spelling(&qualified);
        let target = entry.reference_node();
        if let Some(data) = self.ast.node_mut(node) {
            data.spelling = spelling;
        }
        if let Some(target) = target {
            self.ast.set_referenced(node, target);
        }
    }

    /// Resolve deferred type references and link declarations to definitions
    fn finish_declarations(&mut self) {
        self.declarations_done = true;
        for pending in std::mem::take(&mut self.pending_types) {
            self.resolve_type_ref(pending.node, &pending.name, &pending.context);
        }

        let mut links = Vec::new();
        for entry in self.symbols.types.values() {
            if let Some(def) = entry.definition {
                links.extend(entry.decls.iter().map(|&decl| (decl, def)));
            }
        }
        for overloads in self.symbols.functions.values() {
            for entry in overloads {
                if entry.has_body {
                    links.push((entry.node, entry.node));
                    continue;
                }
                let definitions: Vec<_> = overloads.iter().filter(|e| e.has_body).collect();
                let exact = definitions.iter().find(|def| def.params == entry.params);
                let by_arity = || {
                    let same: Vec<_> = definitions
                        .iter()
                        .filter(|def| def.params.len() == entry.params.len())
                        .collect();
                    (same.len() == 1).then(|| same[0])
                };
                if let Some(def) = exact.or_else(by_arity) {
                    links.push((entry.node, def.node));
                }
            }
        }
        for (decl, def) in links {
            self.ast.set_definition(decl, def);
        }
    }

    fn lower_bodies(&mut self) {
        for body in std::mem::take(&mut self.bodies) {
            self.lower_body(body);
        }
    }
}

/// Names of the user types a type expression mentions, outermost first
pub(super) fn collect_type_names<'t>(node: Node<'t>, src: &str, out: &mut Vec<(String, Node<'t>)>) {
    match node.kind() {
        "type_identifier" => out.push((text(node, src).to_string(), node)),
        "qualified_identifier" | "template_type" => {
            let name = strip_template_args(&bare_type(text(node, src)));
            if !name.is_empty() {
                out.push((name, node));
            }
            collect_template_arguments(node, src, out);
        }
        "primitive_type" | "sized_type_specifier" | "placeholder_type_specifier" | "auto"
        | "type_qualifier" | "decltype" => {}
        "class_specifier" | "struct_specifier" | "enum_specifier" | "union_specifier" => {
            if node.child_by_field_name("body").is_none() {
                if let Some(name) = node.child_by_field_name("name") {
                    collect_type_names(name, src, out);
                }
            }
        }
        _ => {
            for child in named_children(node) {
                collect_type_names(child, src, out);
            }
        }
    }
}

fn collect_template_arguments<'t>(node: Node<'t>, src: &str, out: &mut Vec<(String, Node<'t>)>) {
    for child in named_children(node) {
        if child.kind() == "template_argument_list" {
            for argument in named_children(child) {
                collect_type_names(argument, src, out);
            }
        } else {
            collect_template_arguments(child, src, out);
        }
    }
}
