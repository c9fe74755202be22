//! Second lowering pass: function bodies

use super::lower::Lowerer;
use super::syntax::{
    column, declarator_name, declarator_suffix, end_line, field_children, first_template_arg, line,
    named_children, simple_name, squash, strip_template_args, text, type_prefix,
};
use crate::kind::CursorKind;
use crate::tree::{NodeData, NodeId};
use tree_sitter::Node;

const CASTS: [&str; 4] = ["static_cast", "dynamic_cast", "const_cast", "reinterpret_cast"];

pub(super) struct PendingParam {
    pub name: String,
    pub node: NodeId,
    pub type_text: String,
}

/// A function body waiting for the symbol table to be complete
pub(super) struct PendingBody<'t> {
    pub function: NodeId,
    pub file: usize,
    pub body: Node<'t>,
    pub initializers: Option<Node<'t>>,
    pub context: Vec<String>,
    pub record: Option<String>,
    pub params: Vec<PendingParam>,
}

struct Local {
    name: String,
    node: NodeId,
    /// Class the variable holds, points or refers to
    record: Option<String>,
}

struct BodyScope {
    file: usize,
    function: NodeId,
    context: Vec<String>,
    record: Option<String>,
    frames: Vec<Vec<Local>>,
}

impl BodyScope {
    fn local(&self, name: &str) -> Option<(NodeId, Option<String>)> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|local| local.name == name)
            .map(|local| (local.node, local.record.clone()))
    }

    fn bind(&mut self, local: Local) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(local);
        }
    }
}

fn is_statement(kind: &str) -> bool {
    kind.ends_with("_statement")
        || matches!(
            kind,
            "declaration" | "for_range_loop" | "condition_clause" | "else_clause" | "catch_clause"
        )
}

impl<'t> Lowerer<'t> {
    pub(super) fn lower_body(&mut self, pending: PendingBody<'t>) {
        let params = pending
            .params
            .into_iter()
            .map(|param| Local {
                record: self.symbols.resolve_record(&param.type_text, &pending.context),
                name: param.name,
                node: param.node,
            })
            .collect();
        let mut scope = BodyScope {
            file: pending.file,
            function: pending.function,
            context: pending.context,
            record: pending.record,
            frames: vec![params],
        };
        if let Some(initializers) = pending.initializers {
            for initializer in named_children(initializers) {
                self.lower_initializer(initializer, pending.function, &mut scope);
            }
        }
        self.lower_stmt(pending.body, pending.function, &mut scope);
    }

    fn add_expr(&mut self, parent: NodeId, kind: CursorKind, spelling: &str, at: Node<'_>, file: usize) -> NodeId {
        let path = self.path(file);
        self.ast.add_child(
            parent,
            NodeData::new(kind, spelling)
                .at(path, line(at), column(at))
                .spanning(line(at), end_line(at)),
        )
    }

    fn add_call(&mut self, parent: NodeId, spelling: &str, call: Node<'_>, name_at: Node<'_>, file: usize) -> NodeId {
        let path = self.path(file);
        self.ast.add_child(
            parent,
            NodeData::new(CursorKind::CallExpr, spelling)
                .at(path, line(name_at), column(name_at))
                .spanning(line(call), end_line(call)),
        )
    }

    /// `member(args)` or `Base(args)` in a constructor's initializer list
    fn lower_initializer(&mut self, initializer: Node<'t>, parent: NodeId, scope: &mut BodyScope) {
        let src = self.src(scope.file);
        let children = named_children(initializer);
        let Some((&target, rest)) = children.split_first() else {
            return;
        };
        let args: Vec<Node<'t>> = rest.iter().flat_map(|list| named_children(*list)).collect();
        let name = squash(text(target, src));

        if let Some(record) = scope.record.clone() {
            if let Some(field) = self.symbols.find_field(&record, &name).cloned() {
                let member = self.add_expr(parent, CursorKind::MemberRefExpr, &name, target, scope.file);
                self.ast.set_referenced(member, field.node);
                let by_value = !field.type_text.contains(['&', '*']);
                let field_record = self.symbols.resolve_record(&field.type_text, &field.context);
                match field_record {
                    Some(field_record) if by_value => {
                        let call = self.construct(&field_record, initializer, target, parent, args.len(), scope.file);
                        self.lower_arguments(&args, call, scope);
                    }
                    _ => self.lower_arguments(&args, parent, scope),
                }
                return;
            }
            if let Some(base) = self.symbols.resolve_record(&name, &scope.context) {
                let call = self.construct(&base, initializer, target, parent, args.len(), scope.file);
                self.lower_arguments(&args, call, scope);
                return;
            }
        }
        self.lower_arguments(&args, parent, scope);
    }

    fn lower_any(&mut self, node: Node<'t>, parent: NodeId, scope: &mut BodyScope) {
        if is_statement(node.kind()) {
            self.lower_stmt(node, parent, scope);
        } else {
            self.lower_expr(node, parent, scope);
        }
    }

    fn lower_arguments(&mut self, args: &[Node<'t>], parent: NodeId, scope: &mut BodyScope) {
        for &arg in args {
            self.lower_any(arg, parent, scope);
        }
    }

    /// Lower the children of `node` under `id` inside a fresh local frame
    fn lower_block(&mut self, node: Node<'t>, id: NodeId, scope: &mut BodyScope) {
        scope.frames.push(Vec::new());
        for child in named_children(node) {
            self.lower_any(child, id, scope);
        }
        scope.frames.pop();
    }

    fn lower_stmt(&mut self, node: Node<'t>, parent: NodeId, scope: &mut BodyScope) {
        let file = scope.file;
        match node.kind() {
            "compound_statement" => {
                let id = self.add_expr(parent, CursorKind::CompoundStmt, "", node, file);
                self.lower_block(node, id, scope);
            }
            "declaration" => self.lower_local_declaration(node, parent, scope),
            "expression_statement" => {
                for child in named_children(node) {
                    self.lower_expr(child, parent, scope);
                }
            }
            "return_statement" => {
                let id = self.add_expr(parent, CursorKind::ReturnStmt, "", node, file);
                for child in named_children(node) {
                    self.lower_any(child, id, scope);
                }
            }
            "if_statement" => {
                let id = self.add_expr(parent, CursorKind::IfStmt, "", node, file);
                self.lower_block(node, id, scope);
            }
            "for_statement" => {
                let id = self.add_expr(parent, CursorKind::ForStmt, "", node, file);
                self.lower_block(node, id, scope);
            }
            "for_range_loop" => self.lower_range_for(node, parent, scope),
            "while_statement" | "do_statement" => {
                let id = self.add_expr(parent, CursorKind::WhileStmt, "", node, file);
                self.lower_block(node, id, scope);
            }
            _ => {
                for child in named_children(node) {
                    self.lower_any(child, parent, scope);
                }
            }
        }
    }

    fn lower_range_for(&mut self, node: Node<'t>, parent: NodeId, scope: &mut BodyScope) {
        let src = self.src(scope.file);
        let path = self.path(scope.file);
        let id = self.add_expr(parent, CursorKind::ForStmt, "", node, scope.file);
        scope.frames.push(Vec::new());
        if let Some(range) = node.child_by_field_name("right") {
            self.lower_expr(range, id, scope);
        }
        let type_node = node.child_by_field_name("type");
        let declarator = node.child_by_field_name("declarator");
        if let (Some(type_node), Some(name_node)) = (type_node, declarator.and_then(declarator_name)) {
            let base = squash(text(type_node, src));
            let var = self.ast.add_child(
                id,
                NodeData::new(CursorKind::VarDecl, text(name_node, src))
                    .at(path, line(name_node), column(name_node))
                    .typed(format!("{base}{}", declarator_suffix(declarator, src))),
            );
            self.ast.set_semantic_parent(var, scope.function);
            self.add_type_refs(scope.file, type_node, var, &scope.context);
            let record = self.symbols.resolve_record(&base, &scope.context);
            scope.bind(Local {
                name: text(name_node, src).to_string(),
                node: var,
                record,
            });
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.lower_stmt(body, id, scope);
        }
        scope.frames.pop();
    }

    fn lower_local_declaration(&mut self, node: Node<'t>, parent: NodeId, scope: &mut BodyScope) {
        let src = self.src(scope.file);
        let stmt = self.add_expr(parent, CursorKind::DeclStmt, "", node, scope.file);

        let type_node = node.child_by_field_name("type");
        let declarators = field_children(node, "declarator");
        let base = type_prefix(node, declarators.first().copied(), src);
        let is_auto = type_node.map_or(true, |t| {
            t.kind() == "placeholder_type_specifier" || text(t, src) == "auto"
        });
        let record = if is_auto {
            None
        } else {
            self.symbols.resolve_record(&base, &scope.context)
        };

        for declarator in declarators {
            let (target, value) = if declarator.kind() == "init_declarator" {
                (
                    declarator.child_by_field_name("declarator"),
                    declarator.child_by_field_name("value"),
                )
            } else {
                (Some(declarator), None)
            };
            let Some(target) = target else {
                continue;
            };

            // `Person p(name, age);` reads as a function declarator
            if target.kind() == "function_declarator" {
                if let Some(record) = &record {
                    self.lower_parenthesized_construction(target, declarator, &base, record, type_node, stmt, scope);
                }
                continue;
            }

            let Some(name_node) = declarator_name(target) else {
                continue;
            };
            let suffix = declarator_suffix(Some(target), src);
            let var = self.declare_local(stmt, name_node, declarator, format!("{base}{suffix}"), type_node, scope);
            let by_value = suffix.is_empty();
            let mut held = record.clone();
            match (value, &record) {
                (Some(value), Some(record))
                    if by_value && matches!(value.kind(), "argument_list" | "initializer_list") =>
                {
                    let args = named_children(value);
                    let call = self.construct(record, declarator, name_node, var, args.len(), scope.file);
                    self.lower_arguments(&args, call, scope);
                }
                (Some(value), _) => {
                    let produced = self.lower_expr(value, var, scope);
                    if is_auto {
                        held = produced;
                    }
                }
                (None, Some(record)) if by_value => {
                    self.construct(record, declarator, name_node, var, 0, scope.file);
                }
                _ => {}
            }
            scope.bind(Local {
                name: text(name_node, src).to_string(),
                node: var,
                record: held,
            });
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_parenthesized_construction(
        &mut self,
        target: Node<'t>,
        declarator: Node<'t>,
        base: &str,
        record: &str,
        type_node: Option<Node<'t>>,
        stmt: NodeId,
        scope: &mut BodyScope,
    ) {
        let src = self.src(scope.file);
        let Some(name_node) = target
            .child_by_field_name("declarator")
            .filter(|n| n.kind() == "identifier")
        else {
            return;
        };
        let var = self.declare_local(stmt, name_node, declarator, base.to_string(), type_node, scope);
        let args = target
            .child_by_field_name("parameters")
            .map(named_children)
            .unwrap_or_default();
        let call = self.construct(record, declarator, name_node, var, args.len(), scope.file);
        for arg in args {
            if let Some(name) = arg.child_by_field_name("type") {
                self.lower_name(name, call, scope);
            }
        }
        scope.bind(Local {
            name: text(name_node, src).to_string(),
            node: var,
            record: Some(record.to_string()),
        });
    }

    fn declare_local(
        &mut self,
        stmt: NodeId,
        name_node: Node<'t>,
        declarator: Node<'t>,
        spelled: String,
        type_node: Option<Node<'t>>,
        scope: &BodyScope,
    ) -> NodeId {
        let src = self.src(scope.file);
        let path = self.path(scope.file);
        let var = self.ast.add_child(
            stmt,
            NodeData::new(CursorKind::VarDecl, text(name_node, src))
                .at(path, line(name_node), column(name_node))
                .spanning(line(declarator), end_line(declarator))
                .typed(spelled),
        );
        self.ast.set_semantic_parent(var, scope.function);
        if let Some(type_node) = type_node {
            self.add_type_refs(scope.file, type_node, var, &scope.context);
        }
        var
    }

    /// CALL_EXPR to the constructor of `record` taking `arity` arguments
    fn construct(&mut self, record: &str, call: Node<'_>, at: Node<'_>, parent: NodeId, arity: usize, file: usize) -> NodeId {
        let id = self.add_call(parent, &simple_name(record), call, at, file);
        if let Some(constructor) = self.symbols.find_constructor(record, arity) {
            self.ast.set_referenced(id, constructor);
        }
        id
    }

    /// Lower an expression and return the class its value has, when known
    fn lower_expr(&mut self, node: Node<'t>, parent: NodeId, scope: &mut BodyScope) -> Option<String> {
        match node.kind() {
            "call_expression" => self.lower_call(node, parent, scope),
            "field_expression" => self.lower_member_access(node, parent, scope),
            "identifier" | "qualified_identifier" => self.lower_name(node, parent, scope),
            "this" => scope.record.clone(),
            "new_expression" => self.lower_new(node, parent, scope),
            "parenthesized_expression" | "pointer_expression" => {
                let mut held = None;
                for child in named_children(node) {
                    held = self.lower_expr(child, parent, scope);
                }
                held
            }
            "lambda_expression" => {
                if let Some(body) = node.child_by_field_name("body") {
                    self.lower_stmt(body, parent, scope);
                }
                None
            }
            "string_literal" | "raw_string_literal" | "concatenated_string" | "char_literal"
            | "number_literal" | "true" | "false" | "null" | "nullptr" | "type_identifier"
            | "field_identifier" | "primitive_type" | "template_argument_list" => None,
            "type_descriptor" => {
                self.add_type_refs(scope.file, node, parent, &scope.context);
                None
            }
            _ => {
                for child in named_children(node) {
                    self.lower_any(child, parent, scope);
                }
                None
            }
        }
    }

    fn lower_name(&mut self, node: Node<'t>, parent: NodeId, scope: &mut BodyScope) -> Option<String> {
        let src = self.src(scope.file);
        let name = squash(text(node, src));
        let file = scope.file;

        if !name.contains("::") {
            if let Some((local, record)) = scope.local(&name) {
                let id = self.add_expr(parent, CursorKind::DeclRefExpr, &name, node, file);
                self.ast.set_referenced(id, local);
                return record;
            }
            if let Some(owner) = &scope.record {
                if let Some(field) = self.symbols.find_field(owner, &name).cloned() {
                    let id = self.add_expr(parent, CursorKind::MemberRefExpr, &name, node, file);
                    self.ast.set_referenced(id, field.node);
                    return self.symbols.resolve_record(&field.type_text, &field.context);
                }
            }
        }

        let id = self.add_expr(parent, CursorKind::DeclRefExpr, &simple_name(&name), node, file);
        if let Some(global) = self.symbols.find_global(&name, &scope.context).cloned() {
            self.ast.set_referenced(id, global.node);
            return self.symbols.resolve_record(&global.type_text, &global.context);
        }
        if let Some(function) = self.symbols.find_function(&name, &scope.context, 0) {
            self.ast.set_referenced(id, function);
        }
        None
    }

    /// `object.field` outside of a call
    fn lower_member_access(&mut self, node: Node<'t>, parent: NodeId, scope: &mut BodyScope) -> Option<String> {
        let src = self.src(scope.file);
        let field_node = node.child_by_field_name("field");
        let name = field_node.map(|f| squash(text(f, src))).unwrap_or_default();
        let id = self.add_expr(parent, CursorKind::MemberRefExpr, &name, field_node.unwrap_or(node), scope.file);
        let receiver = node
            .child_by_field_name("argument")
            .and_then(|argument| self.lower_expr(argument, id, scope));
        let field = self.symbols.find_field(&receiver?, &name).cloned()?;
        self.ast.set_referenced(id, field.node);
        self.symbols.resolve_record(&field.type_text, &field.context)
    }

    fn lower_new(&mut self, node: Node<'t>, parent: NodeId, scope: &mut BodyScope) -> Option<String> {
        let src = self.src(scope.file);
        let id = self.add_expr(parent, CursorKind::CxxNewExpr, "", node, scope.file);
        let type_node = node.child_by_field_name("type");
        let record = type_node.and_then(|t| {
            self.add_type_refs(scope.file, t, id, &scope.context);
            self.symbols.resolve_record(text(t, src), &scope.context)
        });
        let args = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default();
        match &record {
            Some(record) => {
                let at = type_node.unwrap_or(node);
                let call = self.construct(record, node, at, id, args.len(), scope.file);
                self.lower_arguments(&args, call, scope);
            }
            None => self.lower_arguments(&args, id, scope),
        }
        record
    }

    fn lower_call(&mut self, node: Node<'t>, parent: NodeId, scope: &mut BodyScope) -> Option<String> {
        let args = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default();
        let Some(function) = node.child_by_field_name("function") else {
            self.lower_arguments(&args, parent, scope);
            return None;
        };
        match function.kind() {
            "field_expression" => self.lower_method_call(node, function, &args, parent, scope),
            "identifier" | "qualified_identifier" | "template_function" => {
                self.lower_named_call(node, function, &args, parent, scope)
            }
            _ => {
                let call = self.add_call(parent, "", node, function, scope.file);
                self.lower_expr(function, call, scope);
                self.lower_arguments(&args, call, scope);
                None
            }
        }
    }

    /// `receiver.method(args)` / `receiver->method(args)`
    fn lower_method_call(
        &mut self,
        node: Node<'t>,
        function: Node<'t>,
        args: &[Node<'t>],
        parent: NodeId,
        scope: &mut BodyScope,
    ) -> Option<String> {
        let src = self.src(scope.file);
        let field = function.child_by_field_name("field");
        let name = field
            .map(|f| strip_template_args(&squash(text(f, src))))
            .unwrap_or_default();
        let at = field.unwrap_or(function);
        let call = self.add_call(parent, &name, node, at, scope.file);
        let member = self.add_expr(call, CursorKind::MemberRefExpr, &name, at, scope.file);
        let receiver = function
            .child_by_field_name("argument")
            .and_then(|argument| self.lower_expr(argument, member, scope));
        let target = receiver.and_then(|record| self.symbols.find_member_function(&record, &name, args.len()));
        if let Some(target) = target {
            self.ast.set_referenced(call, target);
            self.ast.set_referenced(member, target);
        }
        self.lower_arguments(args, call, scope);
        target.and_then(|t| self.symbols.return_record(t))
    }

    /// `name(args)`: implicit member call, free function, or temporary construction
    fn lower_named_call(
        &mut self,
        node: Node<'t>,
        function: Node<'t>,
        args: &[Node<'t>],
        parent: NodeId,
        scope: &mut BodyScope,
    ) -> Option<String> {
        let src = self.src(scope.file);
        let file = scope.file;
        let raw = squash(text(function, src));
        let name = strip_template_args(&raw);
        let simple = simple_name(&name);
        let arity = args.len();

        if CASTS.contains(&name.as_str()) {
            self.lower_arguments(args, parent, scope);
            return first_template_arg(&raw).and_then(|t| self.symbols.resolve_record(t, &scope.context));
        }

        if !name.contains("::") {
            let implicit = scope
                .record
                .as_deref()
                .and_then(|owner| self.symbols.find_member_function(owner, &name, arity));
            if let Some(target) = implicit {
                let call = self.add_call(parent, &simple, node, function, file);
                self.ast.set_referenced(call, target);
                let member = self.add_expr(call, CursorKind::MemberRefExpr, &simple, function, file);
                self.ast.set_referenced(member, target);
                self.lower_arguments(args, call, scope);
                return self.symbols.return_record(target);
            }
            if scope.local(&name).is_some() {
                let call = self.add_call(parent, &simple, node, function, file);
                self.lower_name(function, call, scope);
                self.lower_arguments(args, call, scope);
                return None;
            }
        }

        if let Some(target) = self.symbols.find_function(&name, &scope.context, arity) {
            let call = self.add_call(parent, &simple, node, function, file);
            self.ast.set_referenced(call, target);
            let callee = self.add_expr(call, CursorKind::UnexposedExpr, &simple, function, file);
            let reference = self.add_expr(callee, CursorKind::DeclRefExpr, &simple, function, file);
            self.ast.set_referenced(reference, target);
            self.lower_arguments(args, call, scope);
            return self.symbols.return_record(target);
        }

        if let Some(record) = self.symbols.resolve_record(&name, &scope.context) {
            let call = self.construct(&record, node, function, parent, arity, file);
            let type_ref = self.add_expr(call, CursorKind::TypeRef, &record, function, file);
            self.add_type_ref_target(type_ref, record.clone(), vec![String::new()]);
            self.lower_arguments(args, call, scope);
            return Some(record);
        }

        let call = self.add_call(parent, &simple, node, function, file);
        self.add_expr(call, CursorKind::DeclRefExpr, &simple, function, file);
        self.lower_arguments(args, call, scope);
        None
    }
}
