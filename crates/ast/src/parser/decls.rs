//! First lowering pass: declarations

use super::body::{PendingBody, PendingParam};
use super::lower::{collect_type_names, DeclScope, Lowerer};
use super::symbols::{lookup_context, FunctionEntry, TypeEntry, TypeTarget, TypedSymbol};
use super::syntax::{
    column, declarator_name, declarator_suffix, declared_type, end_line, field_children,
    first_child_of_kind, function_declarator, line, named_children, simple_name, split_qualified,
    squash, strip_template_args, text, type_prefix,
};
use crate::kind::CursorKind;
use crate::tree::{NodeData, NodeId};
use tree_sitter::Node;

/// Where a function declaration lives
enum Owner {
    Record(String),
    Namespace(String),
}

/// Syntax pieces of a function declaration or definition
struct Callable<'t> {
    item: Node<'t>,
    declarator: Node<'t>,
    type_node: Option<Node<'t>>,
    body: Option<Node<'t>>,
    initializers: Option<Node<'t>>,
}

impl<'t> Lowerer<'t> {
    /// Add a declaration node and record its semantic parent
    pub(super) fn declare(&mut self, parent: NodeId, semantic_parent: NodeId, data: NodeData) -> NodeId {
        let id = self.ast.add_child(parent, data);
        self.ast.set_semantic_parent(id, semantic_parent);
        id
    }

    pub(super) fn lower_items(&mut self, file: usize, node: Node<'t>, parent: NodeId, scope: &DeclScope) {
        for item in named_children(node) {
            self.lower_item(file, item, parent, scope);
        }
    }

    fn lower_item(&mut self, file: usize, item: Node<'t>, parent: NodeId, scope: &DeclScope) {
        match item.kind() {
            "preproc_include" => {
                if let Some(target) = self.included_file(file, item) {
                    self.lower_file(target, parent, scope);
                }
            }
            "preproc_ifdef" | "preproc_if" | "preproc_else" | "preproc_elif" | "preproc_elifdef"
            | "linkage_specification" | "declaration_list" | "field_declaration_list"
            | "template_declaration" | "ERROR" => self.lower_items(file, item, parent, scope),
            "namespace_definition" => self.lower_namespace(file, item, parent, scope),
            "class_specifier" | "struct_specifier" => {
                self.lower_record(file, item, parent, scope);
            }
            "enum_specifier" => self.lower_enum(file, item, parent, scope),
            "function_definition" => self.lower_function_definition(file, item, parent, scope),
            "declaration" | "field_declaration" => self.lower_declaration(file, item, parent, scope),
            "type_definition" => self.lower_typedef(file, item, parent, scope),
            "alias_declaration" => self.lower_alias(file, item, parent, scope),
            "using_declaration" => self.lower_using(file, item, scope),
            _ => {}
        }
    }

    fn lower_namespace(&mut self, file: usize, item: Node<'t>, parent: NodeId, scope: &DeclScope) {
        let src = self.src(file);
        let path = self.path(file);
        let name_node = item.child_by_field_name("name");
        let names = name_node
            .map(|n| split_qualified(&squash(text(n, src))))
            .unwrap_or_default();
        let at = name_node.unwrap_or(item);
        let data = |name: &str| {
            NodeData::new(CursorKind::Namespace, name)
                .at(path, line(at), column(at))
                .spanning(line(item), end_line(item))
        };

        let mut scope = scope.clone();
        let mut parent = parent;
        if names.is_empty() {
            // Members of an unnamed namespace are visible from the enclosing scope
            let id = self.declare(parent, scope.node, data(""));
            scope = scope.enter(None, id, None);
            parent = id;
        }
        for name in &names {
            let id = self.declare(parent, scope.node, data(name));
            self.symbols.namespaces.entry(scope.qualify(name)).or_insert(id);
            scope = scope.enter(Some(name), id, None);
            parent = id;
        }
        if let Some(body) = item.child_by_field_name("body") {
            self.lower_items(file, body, parent, &scope);
        }
    }

    fn lower_record(&mut self, file: usize, spec: Node<'t>, parent: NodeId, scope: &DeclScope) -> Option<NodeId> {
        let src = self.src(file);
        let path = self.path(file);
        let name_node = spec.child_by_field_name("name")?;
        let mut parts = split_qualified(&strip_template_args(&squash(text(name_node, src))));
        let simple = parts.pop()?;
        let body = spec.child_by_field_name("body");
        let (kind, keyword) = if spec.kind() == "struct_specifier" {
            (CursorKind::StructDecl, "struct")
        } else {
            (CursorKind::ClassDecl, "class")
        };

        let context = scope.context();
        let (owner, semantic_parent) = if parts.is_empty() {
            (scope.path.join("::"), scope.node)
        } else {
            // `class Outer::Inner { ... }` completes a nested declaration
            let qualifier = parts.join("::");
            if let Some((owner, entry)) = self.symbols.find_type(&qualifier, &context) {
                let node = entry.owner_node().unwrap_or(scope.node);
                (owner, node)
            } else {
                let owner = self
                    .symbols
                    .find_namespace(&qualifier, &context)
                    .unwrap_or_else(|| scope.qualify(&qualifier));
                let node = self.symbols.namespaces.get(&owner).copied().unwrap_or(scope.node);
                (owner, node)
            }
        };
        let qualified = if owner.is_empty() {
            simple.clone()
        } else {
            format!("{owner}::{simple}")
        };

        let id = self.declare(
            parent,
            semantic_parent,
            NodeData::new(kind, simple.as_str())
                .at(path, line(name_node), column(name_node))
                .spanning(line(spec), end_line(spec)),
        );

        let bases: Vec<Node<'t>> = first_child_of_kind(spec, "base_class_clause")
            .map(|clause| {
                named_children(clause)
                    .into_iter()
                    .filter(|c| c.kind() != "access_specifier")
                    .collect()
            })
            .unwrap_or_default();
        let mut base_names = Vec::new();
        for base in &bases {
            let mut names = Vec::new();
            collect_type_names(*base, src, &mut names);
            if let Some((name, _)) = names.into_iter().next() {
                base_names.push((name, context.clone()));
            }
        }

        let entry = self
            .symbols
            .types
            .entry(qualified.clone())
            .or_insert_with(|| TypeEntry::new(TypeTarget::Record { keyword }));
        entry.decls.push(id);
        if body.is_some() {
            entry.definition = Some(id);
            entry.bases.extend(base_names);
        }

        for base in bases {
            self.add_type_refs(file, base, id, &context);
        }
        if let Some(body) = body {
            let inner = DeclScope {
                path: split_qualified(&qualified),
                node: id,
                record: Some(qualified),
            };
            self.lower_items(file, body, id, &inner);
        }
        Some(id)
    }

    fn lower_enum(&mut self, file: usize, spec: Node<'t>, parent: NodeId, scope: &DeclScope) {
        let src = self.src(file);
        let path = self.path(file);
        let Some(name_node) = spec.child_by_field_name("name") else {
            return;
        };
        let name = squash(text(name_node, src));
        let id = self.declare(
            parent,
            scope.node,
            NodeData::new(CursorKind::EnumDecl, name.as_str())
                .at(path, line(name_node), column(name_node))
                .spanning(line(spec), end_line(spec)),
        );
        let entry = self
            .symbols
            .types
            .entry(scope.qualify(&name))
            .or_insert_with(|| TypeEntry::new(TypeTarget::Enum));
        entry.decls.push(id);
        if spec.child_by_field_name("body").is_some() {
            entry.definition = Some(id);
        }
    }

    fn lower_typedef(&mut self, file: usize, item: Node<'t>, parent: NodeId, scope: &DeclScope) {
        let src = self.src(file);
        let Some(type_node) = item.child_by_field_name("type") else {
            return;
        };
        let target = match type_node.kind() {
            "class_specifier" | "struct_specifier" | "enum_specifier" => {
                if type_node.child_by_field_name("body").is_some() {
                    self.lower_item(file, type_node, parent, scope);
                }
                type_node
                    .child_by_field_name("name")
                    .map(|n| squash(text(n, src)))
                    .unwrap_or_default()
            }
            _ => squash(text(type_node, src)),
        };
        for declarator in field_children(item, "declarator") {
            let Some(name_node) = declarator_name(declarator) else {
                continue;
            };
            let spelled = format!("{target}{}", declarator_suffix(Some(declarator), src));
            self.declare_alias(file, CursorKind::TypedefDecl, item, name_node, type_node, spelled, parent, scope);
        }
    }

    fn lower_alias(&mut self, file: usize, item: Node<'t>, parent: NodeId, scope: &DeclScope) {
        let src = self.src(file);
        let (Some(name_node), Some(type_node)) =
            (item.child_by_field_name("name"), item.child_by_field_name("type"))
        else {
            return;
        };
        let target = squash(text(type_node, src));
        self.declare_alias(file, CursorKind::TypeAliasDecl, item, name_node, type_node, target, parent, scope);
    }

    #[allow(clippy::too_many_arguments)]
    fn declare_alias(
        &mut self,
        file: usize,
        kind: CursorKind,
        item: Node<'t>,
        name_node: Node<'t>,
        type_node: Node<'t>,
        target: String,
        parent: NodeId,
        scope: &DeclScope,
    ) {
        let name = squash(text(name_node, self.src(file)));
        let path = self.path(file);
        let context = scope.context();
        let id = self.declare(
            parent,
            scope.node,
            NodeData::new(kind, name.as_str())
                .at(path, line(name_node), column(name_node))
                .spanning(line(item), end_line(item))
                .typed(target.clone()),
        );
        self.add_type_refs(file, type_node, id, &context);
        let entry = self
            .symbols
            .types
            .entry(scope.qualify(&name))
            .or_insert_with(|| TypeEntry::new(TypeTarget::Alias { target, context }));
        entry.decls.push(id);
        entry.definition.get_or_insert(id);
    }

    fn lower_using(&mut self, file: usize, item: Node<'t>, scope: &DeclScope) {
        let src = self.src(file);
        if !squash(text(item, src)).starts_with("using namespace") {
            return;
        }
        let Some(name_node) = named_children(item).into_iter().last() else {
            return;
        };
        let name = squash(text(name_node, src));
        let namespace = self
            .symbols
            .find_namespace(&name, &scope.context())
            .unwrap_or(name);
        self.symbols.add_using(namespace);
    }

    fn lower_declaration(&mut self, file: usize, item: Node<'t>, parent: NodeId, scope: &DeclScope) {
        let type_node = item.child_by_field_name("type");
        if let Some(spec) = type_node {
            let defines = spec.child_by_field_name("body").is_some();
            if defines && matches!(spec.kind(), "class_specifier" | "struct_specifier" | "enum_specifier") {
                self.lower_item(file, spec, parent, scope);
            }
        }

        let declarators = field_children(item, "declarator");
        let base = type_prefix(item, declarators.first().copied(), self.src(file));
        for declarator in declarators {
            if let Some(function) = function_declarator(declarator) {
                let callable = Callable {
                    item,
                    declarator: function,
                    type_node,
                    body: None,
                    initializers: None,
                };
                self.lower_callable(file, callable, parent, scope);
            } else {
                self.lower_variable(file, item, declarator, type_node, &base, parent, scope);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_variable(
        &mut self,
        file: usize,
        item: Node<'t>,
        declarator: Node<'t>,
        type_node: Option<Node<'t>>,
        base: &str,
        parent: NodeId,
        scope: &DeclScope,
    ) {
        let src = self.src(file);
        let path = self.path(file);
        let Some(name_node) = declarator_name(declarator) else {
            return;
        };
        let name = squash(text(name_node, src));
        let spelled = format!("{base}{}", declarator_suffix(Some(declarator), src));
        let kind = if scope.record.is_some() {
            CursorKind::FieldDecl
        } else {
            CursorKind::VarDecl
        };
        let id = self.declare(
            parent,
            scope.node,
            NodeData::new(kind, name.as_str())
                .at(path, line(name_node), column(name_node))
                .spanning(line(item), end_line(item))
                .typed(spelled.clone()),
        );
        let context = scope.context();
        if let Some(type_node) = type_node {
            self.add_type_refs(file, type_node, id, &context);
        }
        let symbol = TypedSymbol {
            node: id,
            type_text: spelled,
            context,
        };
        match &scope.record {
            Some(record) => {
                self.symbols.fields.insert(format!("{record}::{name}"), symbol);
            }
            None => {
                self.symbols.globals.insert(scope.qualify(&name), symbol);
            }
        }
    }

    fn lower_function_definition(&mut self, file: usize, item: Node<'t>, parent: NodeId, scope: &DeclScope) {
        let Some(function) = item
            .child_by_field_name("declarator")
            .and_then(function_declarator)
        else {
            return;
        };
        let body = item
            .child_by_field_name("body")
            .filter(|body| body.kind() == "compound_statement");
        let callable = Callable {
            item,
            declarator: function,
            type_node: item.child_by_field_name("type"),
            body,
            initializers: first_child_of_kind(item, "field_initializer_list"),
        };
        self.lower_callable(file, callable, parent, scope);
    }

    fn callable_owner(&self, qualifier: &[String], scope: &DeclScope) -> Owner {
        if qualifier.is_empty() {
            return match &scope.record {
                Some(record) => Owner::Record(record.clone()),
                None => Owner::Namespace(scope.path.join("::")),
            };
        }
        let joined = qualifier.join("::");
        let context = scope.context();
        if let Some((qualified, entry)) = self.symbols.find_type(&joined, &context) {
            if matches!(entry.target, TypeTarget::Record { .. }) {
                return Owner::Record(qualified);
            }
        }
        Owner::Namespace(
            self.symbols
                .find_namespace(&joined, &context)
                .unwrap_or_else(|| scope.qualify(&joined)),
        )
    }

    fn lower_callable(&mut self, file: usize, callable: Callable<'t>, parent: NodeId, scope: &DeclScope) {
        let src = self.src(file);
        let path = self.path(file);
        let Some(name_node) = callable.declarator.child_by_field_name("declarator") else {
            return;
        };
        let mut parts = split_qualified(&squash(text(name_node, src)));
        let Some(last) = parts.pop() else {
            return;
        };
        let simple = if last.starts_with("operator") {
            last
        } else {
            strip_template_args(&last)
        };

        let owner = self.callable_owner(&parts, scope);
        let out_of_line = !parts.is_empty();
        let (kind, qualified, owner_path, semantic_parent) = match &owner {
            Owner::Record(record) => {
                let kind = if simple.starts_with('~') {
                    CursorKind::Destructor
                } else if simple == simple_name(record) {
                    CursorKind::Constructor
                } else {
                    CursorKind::CxxMethod
                };
                let node = if out_of_line {
                    self.symbols
                        .types
                        .get(record)
                        .and_then(TypeEntry::owner_node)
                        .unwrap_or(scope.node)
                } else {
                    scope.node
                };
                (kind, format!("{record}::{simple}"), split_qualified(record), node)
            }
            Owner::Namespace(namespace) => {
                let node = if out_of_line {
                    self.symbols
                        .namespaces
                        .get(namespace)
                        .copied()
                        .unwrap_or(scope.node)
                } else {
                    scope.node
                };
                let qualified = if namespace.is_empty() {
                    simple.clone()
                } else {
                    format!("{namespace}::{simple}")
                };
                (CursorKind::FunctionDecl, qualified, split_qualified(namespace), node)
            }
        };

        let mut at = name_node;
        while at.kind() == "qualified_identifier" {
            match at.child_by_field_name("name") {
                Some(name) => at = name,
                None => break,
            }
        }
        let id = self.declare(
            parent,
            semantic_parent,
            NodeData::new(kind, simple.as_str())
                .at(path, line(at), column(at))
                .spanning(line(callable.item), end_line(callable.item)),
        );

        let context = lookup_context(&owner_path);
        if let Some(type_node) = callable.type_node {
            self.add_type_refs(file, type_node, id, &context);
            self.symbols
                .returns
                .insert(id, (squash(text(type_node, src)), context.clone()));
        }
        if let (Owner::Record(record), true) = (&owner, out_of_line) {
            let qualifier = self.ast.add_child(
                id,
                NodeData::new(CursorKind::TypeRef, record.as_str()).at(path, line(name_node), column(name_node)),
            );
            self.add_type_ref_target(qualifier, record.clone(), vec![String::new()]);
        }

        let mut params = Vec::new();
        let mut param_types = Vec::new();
        if let Some(list) = callable.declarator.child_by_field_name("parameters") {
            for param in named_children(list) {
                if !matches!(
                    param.kind(),
                    "parameter_declaration" | "optional_parameter_declaration" | "variadic_parameter_declaration"
                ) {
                    continue;
                }
                let declarator = param.child_by_field_name("declarator");
                let spelled = declared_type(param, declarator, src);
                if declarator.is_none() && spelled == "void" {
                    continue;
                }
                let name_node = declarator.and_then(declarator_name);
                let name = name_node.map(|n| text(n, src).to_string()).unwrap_or_default();
                let at = name_node.unwrap_or(param);
                let param_id = self.declare(
                    id,
                    id,
                    NodeData::new(CursorKind::ParmDecl, name.as_str())
                        .at(path, line(at), column(at))
                        .typed(spelled.clone()),
                );
                if let Some(type_node) = param.child_by_field_name("type") {
                    self.add_type_refs(file, type_node, param_id, &context);
                }
                params.push(PendingParam {
                    name,
                    node: param_id,
                    type_text: spelled.clone(),
                });
                param_types.push(spelled);
            }
        }

        self.symbols
            .functions
            .entry(qualified)
            .or_default()
            .push(FunctionEntry {
                node: id,
                params: param_types,
                has_body: callable.body.is_some(),
            });

        if let Some(body) = callable.body {
            self.bodies.push(PendingBody {
                function: id,
                file,
                body,
                initializers: callable.initializers,
                context,
                record: match owner {
                    Owner::Record(record) => Some(record),
                    Owner::Namespace(_) => None,
                },
                params,
            });
        }
    }
}
