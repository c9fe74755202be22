use crate::types::{NodeKind, Relation};
use cxxgraph_ast::{Cursor, CursorKind};

/// What an admitted AST node means for the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Namespace,
    Class,
    Struct,
    /// Free function, method, constructor or destructor declaration
    Function,
    /// Type alias, typedef or enum
    Generic,
    /// Call whose target is a free function
    StandaloneCall,
    /// Call whose target is a method
    ClassMethodCall,
    /// Call or wrapper expression hiding its callee behind a member reference
    UnexposedMethodCall,
    /// Construction of a class-typed local or an explicit temporary
    ConstructorCall,
    /// Reference to a declared type
    TypeUse,
}

impl Category {
    pub const fn relation(self) -> Relation {
        match self {
            Self::Namespace => Relation::ContainsNamespace,
            Self::Class => Relation::ContainsClass,
            Self::Struct => Relation::ContainsStruct,
            Self::Function => Relation::ContainsFunction,
            Self::Generic => Relation::ContainsEntity,
            Self::StandaloneCall => Relation::CallsFunction,
            Self::ClassMethodCall | Self::UnexposedMethodCall => Relation::CallsClassFunction,
            Self::ConstructorCall => Relation::CallsClassConstructor,
            Self::TypeUse => Relation::UsesCustomType,
        }
    }

    pub const fn node_kind(self) -> NodeKind {
        match self {
            Self::Namespace | Self::Class | Self::Struct | Self::Function => NodeKind::Decl,
            Self::Generic => NodeKind::Generic,
            _ => NodeKind::Call,
        }
    }

    pub const fn is_declaration(self) -> bool {
        matches!(
            self,
            Self::Namespace | Self::Class | Self::Struct | Self::Function | Self::Generic
        )
    }

    /// Calls attach their nested calls to the enclosing scope, so that in
    /// `a().b()` both calls hang off the same owner.
    pub const fn chains(self) -> bool {
        matches!(
            self,
            Self::StandaloneCall
                | Self::ClassMethodCall
                | Self::UnexposedMethodCall
                | Self::ConstructorCall
        )
    }
}

/// Classify one node. `None` means the node is transparent: its children
/// are still visited with the enclosing scope.
pub fn classify(node: Cursor<'_>) -> Option<Category> {
    let kind = node.kind();
    match kind {
        CursorKind::Namespace => return Some(Category::Namespace),
        CursorKind::ClassDecl | CursorKind::ClassTemplate => return Some(Category::Class),
        CursorKind::StructDecl => return Some(Category::Struct),
        k if k.is_callable() => return Some(Category::Function),
        CursorKind::TypedefDecl | CursorKind::TypeAliasDecl | CursorKind::EnumDecl => {
            return Some(Category::Generic)
        }
        _ => {}
    }

    // reference categories overlap on node kind; order matters
    if kind == CursorKind::CallExpr {
        match node.referenced().map(|target| target.kind()) {
            Some(CursorKind::FunctionDecl | CursorKind::FunctionTemplate) => {
                return Some(Category::StandaloneCall)
            }
            Some(target) if target.is_method() => return Some(Category::ClassMethodCall),
            None if receiver_class(node).is_some() => return Some(Category::ClassMethodCall),
            _ => {}
        }
    }
    if is_unexposed_method_call(node) {
        return Some(Category::UnexposedMethodCall);
    }
    if is_constructor_call(node) {
        return Some(Category::ConstructorCall);
    }
    if kind == CursorKind::TypeRef && node.referenced().is_some() {
        return Some(Category::TypeUse);
    }
    None
}

fn is_unexposed_method_call(node: Cursor<'_>) -> bool {
    if !matches!(node.kind(), CursorKind::CallExpr | CursorKind::UnexposedExpr) {
        return false;
    }
    if node.referenced().is_some_and(|target| target.kind().is_callable()) {
        return false;
    }
    node.children().any(|child| {
        child.kind() == CursorKind::MemberRefExpr
            && child.referenced().is_some_and(|target| target.kind().is_callable())
    })
}

fn is_constructor_call(node: Cursor<'_>) -> bool {
    match node.kind() {
        CursorKind::CallExpr => node
            .referenced()
            .is_some_and(|target| target.kind() == CursorKind::Constructor),
        CursorKind::DeclStmt => constructed_variable(node).is_some(),
        _ => false,
    }
}

/// First local of a declaration statement whose type is a class held by
/// value, with the type reference naming that class
pub(crate) fn constructed_variable<'a>(stmt: Cursor<'a>) -> Option<(Cursor<'a>, Cursor<'a>)> {
    stmt.children()
        .filter(|child| child.kind() == CursorKind::VarDecl)
        .filter(|var| {
            let spelled = var.type_spelling().unwrap_or_default().trim_end();
            !spelled.ends_with('*') && !spelled.ends_with('&')
        })
        .find_map(|var| {
            var.children()
                .filter(|child| child.kind() == CursorKind::TypeRef)
                .find_map(|type_ref| {
                    let class = type_ref.referenced()?;
                    class.kind().is_record().then_some((var, class))
                })
        })
}

/// Class of the receiver of a member call whose member reference did not
/// resolve, e.g. `p.mystery()` with `p` declared as a known class
pub(crate) fn receiver_class(call: Cursor<'_>) -> Option<Cursor<'_>> {
    call.children()
        .filter(|child| child.kind() == CursorKind::MemberRefExpr && child.referenced().is_none())
        .flat_map(|member| member.children())
        .filter(|receiver| receiver.kind() == CursorKind::DeclRefExpr)
        .filter_map(|receiver| receiver.referenced())
        .flat_map(|variable| variable.children())
        .filter(|child| child.kind() == CursorKind::TypeRef)
        .filter_map(|type_ref| type_ref.referenced())
        .find(|class| class.kind().is_record())
        .map(|class| class.definition().unwrap_or(class))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxxgraph_ast::{Ast, NodeData, NodeId};

    struct Fixture {
        ast: Ast,
        class: NodeId,
        method: NodeId,
        ctor: NodeId,
        free: NodeId,
    }

    fn fixture() -> Fixture {
        let mut ast = Ast::for_translation_unit("a.cpp");
        let root = ast.root_id();
        let class = ast.add_child(root, NodeData::new(CursorKind::ClassDecl, "Person").at("a.h", 1, 7));
        let method = ast.add_child(class, NodeData::new(CursorKind::CxxMethod, "getName").at("a.h", 2, 5));
        let ctor = ast.add_child(class, NodeData::new(CursorKind::Constructor, "Person").at("a.h", 3, 5));
        let free = ast.add_child(root, NodeData::new(CursorKind::FunctionDecl, "run").at("a.cpp", 5, 6));
        Fixture { ast, class, method, ctor, free }
    }

    fn category(ast: &Ast, id: NodeId) -> Option<Category> {
        classify(ast.cursor(id).unwrap())
    }

    #[test]
    fn declarations() {
        let f = fixture();
        assert_eq!(category(&f.ast, f.class), Some(Category::Class));
        assert_eq!(category(&f.ast, f.method), Some(Category::Function));
        assert_eq!(category(&f.ast, f.ctor), Some(Category::Function));
        assert_eq!(category(&f.ast, f.ast.root_id()), None);
    }

    #[test]
    fn calls_are_split_by_target() {
        let mut f = fixture();
        let free_call = f.ast.add_child(f.free, NodeData::new(CursorKind::CallExpr, "run"));
        f.ast.set_referenced(free_call, f.free);
        let method_call = f.ast.add_child(f.free, NodeData::new(CursorKind::CallExpr, "getName"));
        f.ast.set_referenced(method_call, f.method);
        let temporary = f.ast.add_child(f.free, NodeData::new(CursorKind::CallExpr, "Person"));
        f.ast.set_referenced(temporary, f.ctor);
        let unresolved = f.ast.add_child(f.free, NodeData::new(CursorKind::CallExpr, "mystery"));

        assert_eq!(category(&f.ast, free_call), Some(Category::StandaloneCall));
        assert_eq!(category(&f.ast, method_call), Some(Category::ClassMethodCall));
        assert_eq!(category(&f.ast, temporary), Some(Category::ConstructorCall));
        assert_eq!(category(&f.ast, unresolved), None);
    }

    #[test]
    fn unresolved_member_calls_on_known_classes() {
        let mut f = fixture();
        let var = f.ast.add_child(f.free, NodeData::new(CursorKind::VarDecl, "p").typed("Person"));
        let type_ref = f.ast.add_child(var, NodeData::new(CursorKind::TypeRef, "class Person"));
        f.ast.set_referenced(type_ref, f.class);

        let call = f.ast.add_child(f.free, NodeData::new(CursorKind::CallExpr, "mystery"));
        let member = f.ast.add_child(call, NodeData::new(CursorKind::MemberRefExpr, "mystery"));
        let receiver = f.ast.add_child(member, NodeData::new(CursorKind::DeclRefExpr, "p"));
        f.ast.set_referenced(receiver, var);
        assert_eq!(category(&f.ast, call), Some(Category::ClassMethodCall));

        // receiver of unknown type: nothing to key the call under
        let other = f.ast.add_child(f.free, NodeData::new(CursorKind::VarDecl, "s").typed("std::string"));
        let call = f.ast.add_child(f.free, NodeData::new(CursorKind::CallExpr, "size"));
        let member = f.ast.add_child(call, NodeData::new(CursorKind::MemberRefExpr, "size"));
        let receiver = f.ast.add_child(member, NodeData::new(CursorKind::DeclRefExpr, "s"));
        f.ast.set_referenced(receiver, other);
        assert_eq!(category(&f.ast, call), None);
    }

    #[test]
    fn member_references_expose_hidden_calls() {
        let mut f = fixture();
        let wrapper = f.ast.add_child(f.free, NodeData::new(CursorKind::UnexposedExpr, ""));
        let member = f.ast.add_child(wrapper, NodeData::new(CursorKind::MemberRefExpr, "getName"));
        f.ast.set_referenced(member, f.method);
        assert_eq!(category(&f.ast, wrapper), Some(Category::UnexposedMethodCall));

        // a field access is not a call
        let field = f.ast.add_child(f.class, NodeData::new(CursorKind::FieldDecl, "name"));
        let access = f.ast.add_child(f.free, NodeData::new(CursorKind::UnexposedExpr, ""));
        let member = f.ast.add_child(access, NodeData::new(CursorKind::MemberRefExpr, "name"));
        f.ast.set_referenced(member, field);
        assert_eq!(category(&f.ast, access), None);
    }

    #[test]
    fn by_value_locals_are_constructions() {
        let mut f = fixture();
        for (type_spelling, expected) in [
            ("Person", Some(Category::ConstructorCall)),
            ("Person *", None),
            ("const Person &", None),
        ] {
            let stmt = f.ast.add_child(f.free, NodeData::new(CursorKind::DeclStmt, ""));
            let var = f.ast.add_child(stmt, NodeData::new(CursorKind::VarDecl, "p").typed(type_spelling));
            let type_ref = f.ast.add_child(var, NodeData::new(CursorKind::TypeRef, "class Person"));
            f.ast.set_referenced(type_ref, f.class);
            assert_eq!(category(&f.ast, stmt), expected, "{type_spelling}");
            assert_eq!(category(&f.ast, type_ref), Some(Category::TypeUse));
        }
    }

    #[test]
    fn dangling_type_refs_are_ignored() {
        let mut f = fixture();
        let type_ref = f.ast.add_child(f.free, NodeData::new(CursorKind::TypeRef, "std::string"));
        assert_eq!(category(&f.ast, type_ref), None);
    }

    #[test]
    fn chaining_covers_every_call_category() {
        assert!(Category::StandaloneCall.chains());
        assert!(Category::ConstructorCall.chains());
        assert!(!Category::TypeUse.chains());
        assert!(!Category::Function.chains());
        assert_eq!(Category::UnexposedMethodCall.relation(), Relation::CallsClassFunction);
        assert_eq!(Category::TypeUse.node_kind(), NodeKind::Call);
    }
}
