//! Identity keys for graph nodes.
//!
//! A key is `<declaration file>#<qualified path>`, where the qualified path
//! is `Ns::Class::member(type name, ...)` for callables and `Ns::Class` for
//! types. Call sites resolve to their target first, so every call of one
//! function lands on the same key.

use crate::classify::{constructed_variable, receiver_class, Category};
use crate::config::GraphConfig;
use crate::types::{GraphNode, NodeKind};
use cxxgraph_ast::paths::{absolutize, normalize_path, to_slash};
use cxxgraph_ast::{Cursor, CursorKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Declaration file recorded for nodes without a location
pub const LOCATION_NOT_FOUND: &str = "location not found";

/// Transient record built for one admitted AST node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub identity_key: String,
    pub declaration_file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub column: u32,
    pub namespace_position: String,
    pub kind: NodeKind,
}

impl From<Entity> for GraphNode {
    fn from(entity: Entity) -> Self {
        GraphNode {
            label: entity.identity_key.clone(),
            key: entity.identity_key,
            declaration_file: entity.declaration_file,
            start_line: entity.start_line,
            end_line: entity.end_line,
            column: entity.column,
            namespace_position: entity.namespace_position,
            kind: entity.kind,
        }
    }
}

/// Builds [`Entity`] records from AST nodes
#[derive(Debug, Clone)]
pub struct IdentityBuilder {
    base_dir: PathBuf,
    project_root: Option<PathBuf>,
}

impl IdentityBuilder {
    pub fn new(config: &GraphConfig) -> Self {
        Self {
            base_dir: config.base_dir.clone(),
            project_root: config
                .project_root
                .as_deref()
                .map(|root| absolutize(root, &config.base_dir)),
        }
    }

    /// Entity for the translation-unit root
    pub fn file_entity(&self, root: Cursor<'_>) -> Entity {
        let declaration_file = match root.file() {
            Some(file) => self.declaration_file(file),
            None => self.declaration_file(root.spelling()),
        };
        let extent = root.extent();
        Entity {
            identity_key: declaration_file.clone(),
            namespace_position: declaration_file.clone(),
            declaration_file,
            start_line: extent.start_line,
            end_line: extent.end_line,
            column: root.location().map_or(0, |loc| loc.column),
            kind: NodeKind::File,
        }
    }

    /// Entity for an admitted, classified node
    pub fn build_identity(&self, node: Cursor<'_>, category: Category) -> Entity {
        let kind = category.node_kind();
        match category {
            Category::Namespace
            | Category::Class
            | Category::Struct
            | Category::Function
            | Category::Generic => self.entity_for(node, kind),
            Category::StandaloneCall | Category::TypeUse => match node.referenced() {
                Some(target) => self.entity_for(prefer_definition(target), kind),
                None => self.degraded(node, kind),
            },
            Category::ClassMethodCall => match node.referenced() {
                Some(target) => self.entity_for(prefer_definition(target), kind),
                None => self.method_of_receiver(node, kind),
            },
            Category::UnexposedMethodCall => {
                let target = node
                    .children()
                    .filter(|child| child.kind() == CursorKind::MemberRefExpr)
                    .filter_map(|member| member.referenced())
                    .last();
                match target {
                    Some(target) => self.entity_for(prefer_definition(target), kind),
                    None => self.degraded(node, kind),
                }
            }
            Category::ConstructorCall => match constructor_target(node) {
                Some(target) => self.entity_for(prefer_definition(target), kind),
                None => self.degraded(node, kind),
            },
        }
    }

    /// Project-relative, `/`-separated rendering of a declaration file.
    /// Files outside the project root keep the path they were given.
    pub fn declaration_file(&self, file: &str) -> String {
        let given = Path::new(file);
        if let Some(root) = &self.project_root {
            let absolute = absolutize(given, &self.base_dir);
            if let Ok(relative) = absolute.strip_prefix(root) {
                if !relative.as_os_str().is_empty() {
                    return to_slash(relative);
                }
            }
        }
        to_slash(&normalize_path(given))
    }

    fn entity_for(&self, subject: Cursor<'_>, kind: NodeKind) -> Entity {
        let namespace_position = qualified_name(subject);
        self.located(subject, namespace_position, kind)
    }

    fn located(&self, subject: Cursor<'_>, namespace_position: String, kind: NodeKind) -> Entity {
        let declaration_file = subject
            .file()
            .map_or_else(|| LOCATION_NOT_FOUND.to_string(), |file| self.declaration_file(file));
        let line = subject.location().map_or(0, |loc| loc.line);
        let extent = subject.extent();
        let start_line = if extent.start_line > 0 { extent.start_line } else { line };
        Entity {
            identity_key: format!("{declaration_file}#{namespace_position}"),
            declaration_file,
            start_line,
            end_line: extent.end_line.max(start_line),
            column: subject.location().map_or(0, |loc| loc.column),
            namespace_position,
            kind,
        }
    }

    fn degraded(&self, node: Cursor<'_>, kind: NodeKind) -> Entity {
        log::warn!(
            "unresolved {} '{}' at {}; keeping the reference itself",
            node.kind(),
            node.spelling(),
            describe_location(node)
        );
        self.entity_for(node, kind)
    }

    /// Unresolved method call: key it under the class of its receiver
    fn method_of_receiver(&self, call: Cursor<'_>, kind: NodeKind) -> Entity {
        match receiver_class(call) {
            Some(class) => {
                log::debug!(
                    "method '{}' resolved through its receiver's class '{}'",
                    call.spelling(),
                    class.spelling()
                );
                let position = format!("{}::{}", qualified_name(class), call.spelling());
                self.located(class, position, kind)
            }
            None => self.degraded(call, kind),
        }
    }
}

/// Definition of `target` when the tree has one, else `target` itself
fn prefer_definition(target: Cursor<'_>) -> Cursor<'_> {
    target.definition().unwrap_or(target)
}

/// `Outer::Inner::name`, with callables rendered by signature
pub fn qualified_name(node: Cursor<'_>) -> String {
    let own = if node.kind().is_callable() {
        signature(node)
    } else {
        strip_elaborated(node.spelling()).to_string()
    };
    let mut parts = scope_path(node);
    parts.push(own);
    parts.join("::")
}

/// Spellings of the enclosing namespaces and records, outermost first
pub fn scope_path(node: Cursor<'_>) -> Vec<String> {
    let mut parts = Vec::new();
    let mut seen = HashSet::from([node.id()]);
    let mut parent = node.semantic_parent();
    while let Some(scope) = parent {
        if scope.kind() == CursorKind::TranslationUnit || !seen.insert(scope.id()) {
            break;
        }
        if scope.kind().is_scope() {
            let name = match scope.spelling() {
                "" if scope.kind() == CursorKind::Namespace => "(anonymous)",
                name => strip_elaborated(name),
            };
            parts.push(name.to_string());
        }
        parent = scope.semantic_parent();
    }
    parts.reverse();
    parts
}

/// `name(type name, type, ...)` for callables, the plain spelling otherwise
pub fn signature(node: Cursor<'_>) -> String {
    if !node.kind().is_callable() {
        return node.spelling().to_string();
    }
    let params: Vec<String> = node
        .arguments()
        .map(|param| {
            let ty = param.type_spelling().unwrap_or_default();
            match (ty.is_empty(), param.spelling().is_empty()) {
                (false, false) => format!("{ty} {}", param.spelling()),
                (false, true) => ty.to_string(),
                (true, _) => param.spelling().to_string(),
            }
        })
        .collect();
    format!("{}({})", node.spelling(), params.join(", "))
}

fn strip_elaborated(spelling: &str) -> &str {
    ["class ", "struct ", "union ", "enum "]
        .iter()
        .find_map(|prefix| spelling.strip_prefix(prefix))
        .unwrap_or(spelling)
}

/// Constructor invoked by a construction site
fn constructor_target(node: Cursor<'_>) -> Option<Cursor<'_>> {
    if node.kind() == CursorKind::CallExpr {
        return node.referenced();
    }

    let (_, class) = constructed_variable(node)?;
    let class = prefer_definition(class);

    let explicit = node
        .walk_preorder()
        .into_iter()
        .filter(|child| child.kind() == CursorKind::CallExpr)
        .filter_map(|call| call.referenced())
        .filter(|target| {
            target.kind() == CursorKind::Constructor
                && target
                    .semantic_parent()
                    .is_some_and(|owner| prefer_definition(owner) == class)
        })
        .last();
    if explicit.is_some() {
        return explicit;
    }

    let declared = class
        .children()
        .find(|member| member.kind() == CursorKind::Constructor);
    if declared.is_none() {
        log::debug!("class '{}' declares no constructor; using the class itself", class.spelling());
    }
    Some(declared.unwrap_or(class))
}

fn describe_location(node: Cursor<'_>) -> String {
    match node.location() {
        Some(loc) => format!("{}:{}", loc.file.as_deref().unwrap_or("?"), loc.line),
        None => LOCATION_NOT_FOUND.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxxgraph_ast::{Ast, NodeData, NodeId};
    use pretty_assertions::assert_eq;

    fn builder(root: Option<&str>) -> IdentityBuilder {
        let mut config = GraphConfig::default().with_base_dir("/work");
        config.project_root = root.map(PathBuf::from);
        IdentityBuilder::new(&config)
    }

    /// namespace Entities { class Person { Person(const Str & name, int age); getName(); }; }
    fn person() -> (Ast, NodeId, NodeId, NodeId) {
        let mut ast = Ast::for_translation_unit("src/main.cpp");
        let root = ast.root_id();
        let ns = ast.add_child(root, NodeData::new(CursorKind::Namespace, "Entities").at("src/Entities.h", 3, 11));
        let class = ast.add_child(ns, NodeData::new(CursorKind::ClassDecl, "Person").at("src/Entities.h", 5, 11));
        ast.set_semantic_parent(class, ns);
        let ctor = ast.add_child(
            class,
            NodeData::new(CursorKind::Constructor, "Person").at("src/Entities.h", 9, 9).spanning(9, 9),
        );
        ast.set_semantic_parent(ctor, class);
        ast.add_child(ctor, NodeData::new(CursorKind::ParmDecl, "name").typed("const Str &"));
        ast.add_child(ctor, NodeData::new(CursorKind::ParmDecl, "").typed("int"));
        let method = ast.add_child(class, NodeData::new(CursorKind::CxxMethod, "getName").at("src/Entities.h", 10, 13));
        ast.set_semantic_parent(method, class);
        (ast, class, ctor, method)
    }

    #[test]
    fn declaration_files_are_project_relative() {
        let rooted = builder(Some("src"));
        assert_eq!(rooted.declaration_file("src/a/b.h"), "a/b.h");
        assert_eq!(rooted.declaration_file("/work/src/./c.cpp"), "c.cpp");
        assert_eq!(rooted.declaration_file("/usr/include/vector"), "/usr/include/vector");
        assert_eq!(rooted.declaration_file("lib/x.h"), "lib/x.h");
        assert_eq!(builder(None).declaration_file("./src/x.h"), "src/x.h");
    }

    #[test]
    fn callables_are_keyed_by_signature() {
        let (ast, _, ctor, method) = person();
        let builder = builder(Some("src"));
        let ctor = builder.build_identity(ast.cursor(ctor).unwrap(), Category::Function);
        assert_eq!(ctor.identity_key, "Entities.h#Entities::Person::Person(const Str & name, int)");
        assert_eq!(ctor.namespace_position, "Entities::Person::Person(const Str & name, int)");
        assert_eq!((ctor.start_line, ctor.end_line, ctor.column), (9, 9, 9));
        assert_eq!(ctor.kind, NodeKind::Decl);

        let method = builder.build_identity(ast.cursor(method).unwrap(), Category::Function);
        assert_eq!(method.identity_key, "Entities.h#Entities::Person::getName()");
    }

    #[test]
    fn calls_take_the_identity_of_their_target() {
        let (mut ast, _, _, method) = person();
        let call = ast.add_child(ast.root_id(), NodeData::new(CursorKind::CallExpr, "getName").at("src/main.cpp", 4, 3));
        ast.set_referenced(call, method);

        let builder = builder(Some("src"));
        let entity = builder.build_identity(ast.cursor(call).unwrap(), Category::ClassMethodCall);
        assert_eq!(entity.identity_key, "Entities.h#Entities::Person::getName()");
        assert_eq!(entity.kind, NodeKind::Call);
    }

    #[test]
    fn definitions_win_over_declarations() {
        let (mut ast, class, _, method) = person();
        let def = ast.add_child(ast.root_id(), NodeData::new(CursorKind::CxxMethod, "getName").at("src/Entities.cpp", 7, 1));
        ast.set_semantic_parent(def, class);
        ast.set_definition(method, def);
        let call = ast.add_child(ast.root_id(), NodeData::new(CursorKind::CallExpr, "getName").at("src/main.cpp", 4, 3));
        ast.set_referenced(call, method);

        let entity = builder(Some("src")).build_identity(ast.cursor(call).unwrap(), Category::ClassMethodCall);
        assert_eq!(entity.identity_key, "Entities.cpp#Entities::Person::getName()");
    }

    #[test]
    fn local_constructions_resolve_to_the_constructor() {
        let (mut ast, class, _, _) = person();
        let stmt = ast.add_child(ast.root_id(), NodeData::new(CursorKind::DeclStmt, "").at("src/main.cpp", 6, 3));
        let var = ast.add_child(stmt, NodeData::new(CursorKind::VarDecl, "p").typed("Entities::Person"));
        let type_ref = ast.add_child(var, NodeData::new(CursorKind::TypeRef, "class Entities::Person"));
        ast.set_referenced(type_ref, class);

        let entity = builder(Some("src")).build_identity(ast.cursor(stmt).unwrap(), Category::ConstructorCall);
        assert_eq!(entity.identity_key, "Entities.h#Entities::Person::Person(const Str & name, int)");
    }

    #[test]
    fn unresolved_method_calls_fall_back_to_the_receiver_class() {
        let (mut ast, class, _, _) = person();
        let var = ast.add_child(ast.root_id(), NodeData::new(CursorKind::VarDecl, "p").at("src/main.cpp", 2, 3));
        let type_ref = ast.add_child(var, NodeData::new(CursorKind::TypeRef, "class Entities::Person"));
        ast.set_referenced(type_ref, class);
        let call = ast.add_child(ast.root_id(), NodeData::new(CursorKind::CallExpr, "mystery").at("src/main.cpp", 3, 3));
        let member = ast.add_child(call, NodeData::new(CursorKind::MemberRefExpr, "mystery"));
        let receiver = ast.add_child(member, NodeData::new(CursorKind::DeclRefExpr, "p"));
        ast.set_referenced(receiver, var);

        let entity = builder(Some("src")).build_identity(ast.cursor(call).unwrap(), Category::ClassMethodCall);
        assert_eq!(entity.identity_key, "Entities.h#Entities::Person::mystery");
    }

    #[test]
    fn anonymous_namespaces_and_missing_locations() {
        let mut ast = Ast::for_translation_unit("main.cpp");
        let ns = ast.add_child(ast.root_id(), NodeData::new(CursorKind::Namespace, ""));
        let f = ast.add_child(ns, NodeData::new(CursorKind::FunctionDecl, "helper"));
        ast.set_semantic_parent(f, ns);

        let entity = builder(None).build_identity(ast.cursor(f).unwrap(), Category::Function);
        assert_eq!(entity.identity_key, "location not found#(anonymous)::helper()");
    }

    #[test]
    fn file_entity_uses_the_root_spelling() {
        let ast = Ast::for_translation_unit("/work/src/./main.cpp");
        let entity = builder(Some("src")).file_entity(ast.root());
        assert_eq!(entity.identity_key, "main.cpp");
        assert_eq!(entity.kind, NodeKind::File);
    }

    #[test]
    fn semantic_parent_cycles_terminate() {
        let mut ast = Ast::for_translation_unit("main.cpp");
        let a = ast.add_child(ast.root_id(), NodeData::new(CursorKind::Namespace, "a"));
        let b = ast.add_child(a, NodeData::new(CursorKind::Namespace, "b"));
        ast.set_semantic_parent(a, b);
        ast.set_semantic_parent(b, a);
        assert_eq!(qualified_name(ast.cursor(b).unwrap()), "a::b");
    }
}
