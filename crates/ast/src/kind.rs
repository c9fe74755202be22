use serde::{Deserialize, Serialize};

/// Syntactic kind of a cursor.
///
/// Mirrors the subset of libclang cursor kinds the graph engine looks at.
/// Everything else collapses into [`CursorKind::Unexposed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CursorKind {
    TranslationUnit,
    Namespace,
    ClassDecl,
    StructDecl,
    ClassTemplate,
    FunctionDecl,
    CxxMethod,
    Constructor,
    Destructor,
    FunctionTemplate,
    ParmDecl,
    FieldDecl,
    VarDecl,
    TypedefDecl,
    TypeAliasDecl,
    EnumDecl,
    DeclStmt,
    CompoundStmt,
    ReturnStmt,
    IfStmt,
    ForStmt,
    WhileStmt,
    CallExpr,
    MemberRefExpr,
    DeclRefExpr,
    UnexposedExpr,
    CxxNewExpr,
    TypeRef,
    NamespaceRef,
    #[serde(other)]
    Unexposed,
}

impl CursorKind {
    /// Callable declarations: free functions, methods, constructors, destructors
    pub const fn is_callable(self) -> bool {
        matches!(
            self,
            Self::FunctionDecl
                | Self::CxxMethod
                | Self::Constructor
                | Self::Destructor
                | Self::FunctionTemplate
        )
    }

    /// Member functions of a class (constructors excluded)
    pub const fn is_method(self) -> bool {
        matches!(self, Self::CxxMethod | Self::Destructor)
    }

    /// Class-like declarations
    pub const fn is_record(self) -> bool {
        matches!(self, Self::ClassDecl | Self::StructDecl | Self::ClassTemplate)
    }

    /// Kinds that contribute a component to a qualified path
    pub const fn is_scope(self) -> bool {
        matches!(self, Self::Namespace) || self.is_record()
    }

    /// Declarations that name a type
    pub const fn is_type_declaration(self) -> bool {
        self.is_record() || matches!(self, Self::TypedefDecl | Self::TypeAliasDecl | Self::EnumDecl)
    }

    /// Upper snake case name, as libclang spells it
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TranslationUnit => "TRANSLATION_UNIT",
            Self::Namespace => "NAMESPACE",
            Self::ClassDecl => "CLASS_DECL",
            Self::StructDecl => "STRUCT_DECL",
            Self::ClassTemplate => "CLASS_TEMPLATE",
            Self::FunctionDecl => "FUNCTION_DECL",
            Self::CxxMethod => "CXX_METHOD",
            Self::Constructor => "CONSTRUCTOR",
            Self::Destructor => "DESTRUCTOR",
            Self::FunctionTemplate => "FUNCTION_TEMPLATE",
            Self::ParmDecl => "PARM_DECL",
            Self::FieldDecl => "FIELD_DECL",
            Self::VarDecl => "VAR_DECL",
            Self::TypedefDecl => "TYPEDEF_DECL",
            Self::TypeAliasDecl => "TYPE_ALIAS_DECL",
            Self::EnumDecl => "ENUM_DECL",
            Self::DeclStmt => "DECL_STMT",
            Self::CompoundStmt => "COMPOUND_STMT",
            Self::ReturnStmt => "RETURN_STMT",
            Self::IfStmt => "IF_STMT",
            Self::ForStmt => "FOR_STMT",
            Self::WhileStmt => "WHILE_STMT",
            Self::CallExpr => "CALL_EXPR",
            Self::MemberRefExpr => "MEMBER_REF_EXPR",
            Self::DeclRefExpr => "DECL_REF_EXPR",
            Self::UnexposedExpr => "UNEXPOSED_EXPR",
            Self::CxxNewExpr => "CXX_NEW_EXPR",
            Self::TypeRef => "TYPE_REF",
            Self::NamespaceRef => "NAMESPACE_REF",
            Self::Unexposed => "UNEXPOSED",
        }
    }
}

impl std::fmt::Display for CursorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_libclang_spelling() {
        let json = serde_json::to_string(&CursorKind::CxxMethod).unwrap();
        assert_eq!(json, "\"CXX_METHOD\"");

        let kind: CursorKind = serde_json::from_str("\"MEMBER_REF_EXPR\"").unwrap();
        assert_eq!(kind, CursorKind::MemberRefExpr);
    }

    #[test]
    fn unknown_kinds_fall_back_to_unexposed() {
        let kind: CursorKind = serde_json::from_str("\"CXX_ACCESS_SPEC_DECL\"").unwrap();
        assert_eq!(kind, CursorKind::Unexposed);
    }

    #[test]
    fn display_matches_serde_name() {
        for kind in [
            CursorKind::TranslationUnit,
            CursorKind::DeclStmt,
            CursorKind::TypeRef,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json.trim_matches('"'), kind.to_string());
        }
    }
}
