//! Qualified-name symbol table built while lowering declarations

use super::syntax::{bare_type, first_template_arg, simple_name, strip_template_args};
use crate::tree::NodeId;
use std::collections::HashMap;

const MAX_ALIAS_DEPTH: usize = 8;
const SMART_POINTERS: [&str; 4] = ["unique_ptr", "shared_ptr", "weak_ptr", "auto_ptr"];

#[derive(Debug, Clone)]
pub(super) enum TypeTarget {
    Record { keyword: &'static str },
    Alias { target: String, context: Vec<String> },
    Enum,
}

#[derive(Debug, Clone)]
pub(super) struct TypeEntry {
    pub decls: Vec<NodeId>,
    pub definition: Option<NodeId>,
    pub target: TypeTarget,
    pub bases: Vec<(String, Vec<String>)>,
}

impl TypeEntry {
    pub fn new(target: TypeTarget) -> Self {
        Self {
            decls: Vec::new(),
            definition: None,
            target,
            bases: Vec::new(),
        }
    }

    /// Node a reference to this type should point at
    pub fn reference_node(&self) -> Option<NodeId> {
        self.decls.first().copied().or(self.definition)
    }

    /// Node that owns the members of this type
    pub fn owner_node(&self) -> Option<NodeId> {
        self.definition.or_else(|| self.decls.first().copied())
    }

    pub fn spelling(&self, qualified: &str) -> String {
        match self.target {
            TypeTarget::Record { keyword } => format!("{keyword} {qualified}"),
            TypeTarget::Enum => format!("enum {qualified}"),
            TypeTarget::Alias { .. } => qualified.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct FunctionEntry {
    pub node: NodeId,
    pub params: Vec<String>,
    pub has_body: bool,
}

/// Variable or field with its declared type text and lookup context
#[derive(Debug, Clone)]
pub(super) struct TypedSymbol {
    pub node: NodeId,
    pub type_text: String,
    pub context: Vec<String>,
}

#[derive(Debug, Default)]
pub(super) struct SymbolTable {
    pub namespaces: HashMap<String, NodeId>,
    pub types: HashMap<String, TypeEntry>,
    pub functions: HashMap<String, Vec<FunctionEntry>>,
    pub fields: HashMap<String, TypedSymbol>,
    pub globals: HashMap<String, TypedSymbol>,
    pub returns: HashMap<NodeId, (String, Vec<String>)>,
    pub usings: Vec<String>,
}

/// Enclosing scopes of `path`, innermost first, ending with the global scope
pub(super) fn lookup_context(path: &[String]) -> Vec<String> {
    (0..=path.len()).rev().map(|len| path[..len].join("::")).collect()
}

impl SymbolTable {
    /// Fully qualified spellings `name` may refer to from `context`
    fn candidates(&self, name: &str, context: &[String]) -> Vec<String> {
        if let Some(absolute) = name.strip_prefix("::") {
            return vec![absolute.to_string()];
        }
        let mut out: Vec<String> = context
            .iter()
            .map(|scope| {
                if scope.is_empty() {
                    name.to_string()
                } else {
                    format!("{scope}::{name}")
                }
            })
            .collect();
        out.extend(self.usings.iter().map(|ns| format!("{ns}::{name}")));
        out
    }

    pub fn find_type(&self, name: &str, context: &[String]) -> Option<(String, &TypeEntry)> {
        let name = strip_template_args(name);
        self.candidates(&name, context)
            .into_iter()
            .find_map(|candidate| self.types.get(&candidate).map(|entry| (candidate, entry)))
    }

    pub fn find_namespace(&self, name: &str, context: &[String]) -> Option<String> {
        self.candidates(name, context)
            .into_iter()
            .find(|candidate| self.namespaces.contains_key(candidate))
    }

    /// Qualified name of the class or struct a type spelling denotes,
    /// looking through typedefs and smart pointers
    pub fn resolve_record(&self, type_text: &str, context: &[String]) -> Option<String> {
        self.resolve_record_at(type_text, context, 0)
    }

    fn resolve_record_at(&self, type_text: &str, context: &[String], depth: usize) -> Option<String> {
        if depth > MAX_ALIAS_DEPTH {
            return None;
        }
        let bare = bare_type(type_text);
        let base = strip_template_args(&bare);
        if SMART_POINTERS.contains(&simple_name(&base).as_str()) {
            let inner = first_template_arg(&bare)?;
            return self.resolve_record_at(inner, context, depth + 1);
        }
        let (qualified, entry) = self.find_type(&base, context)?;
        match &entry.target {
            TypeTarget::Record { .. } => Some(qualified),
            TypeTarget::Alias { target, context } => self.resolve_record_at(target, context, depth + 1),
            TypeTarget::Enum => None,
        }
    }

    /// Free function (or static member named with its class) callable with `arity` arguments
    pub fn find_function(&self, name: &str, context: &[String], arity: usize) -> Option<NodeId> {
        self.candidates(name, context)
            .into_iter()
            .find_map(|candidate| self.functions.get(&candidate))
            .and_then(|entries| choose_overload(entries, arity))
    }

    /// Member function of `record` or one of its bases
    pub fn find_member_function(&self, record: &str, name: &str, arity: usize) -> Option<NodeId> {
        self.find_member_at(record, name, arity, 0)
    }

    fn find_member_at(&self, record: &str, name: &str, arity: usize, depth: usize) -> Option<NodeId> {
        if depth > MAX_ALIAS_DEPTH {
            return None;
        }
        if let Some(found) = self
            .functions
            .get(&format!("{record}::{name}"))
            .and_then(|entries| choose_overload(entries, arity))
        {
            return Some(found);
        }
        self.bases_of(record)
            .into_iter()
            .find_map(|base| self.find_member_at(&base, name, arity, depth + 1))
    }

    /// Constructor of `record` callable with `arity` arguments
    pub fn find_constructor(&self, record: &str, arity: usize) -> Option<NodeId> {
        let simple = simple_name(record);
        self.functions
            .get(&format!("{record}::{simple}"))
            .and_then(|entries| choose_overload(entries, arity))
    }

    pub fn find_field(&self, record: &str, name: &str) -> Option<&TypedSymbol> {
        self.find_field_at(record, name, 0)
    }

    fn find_field_at(&self, record: &str, name: &str, depth: usize) -> Option<&TypedSymbol> {
        if depth > MAX_ALIAS_DEPTH {
            return None;
        }
        if let Some(field) = self.fields.get(&format!("{record}::{name}")) {
            return Some(field);
        }
        self.bases_of(record)
            .into_iter()
            .find_map(|base| self.find_field_at(&base, name, depth + 1))
    }

    pub fn find_global(&self, name: &str, context: &[String]) -> Option<&TypedSymbol> {
        self.candidates(name, context)
            .into_iter()
            .find_map(|candidate| self.globals.get(&candidate))
    }

    fn bases_of(&self, record: &str) -> Vec<String> {
        self.types
            .get(record)
            .map(|entry| {
                entry
                    .bases
                    .iter()
                    .filter_map(|(name, context)| self.resolve_record(name, context))
                    .filter(|base| base != record)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Record type returned by a function, when it returns one by value, pointer or reference
    pub fn return_record(&self, function: NodeId) -> Option<String> {
        let (type_text, context) = self.returns.get(&function)?;
        self.resolve_record(type_text, context)
    }

    pub fn add_using(&mut self, namespace: String) {
        if !self.usings.contains(&namespace) {
            self.usings.push(namespace);
        }
    }
}

/// Prefer an overload with matching arity, then any overload
fn choose_overload(entries: &[FunctionEntry], arity: usize) -> Option<NodeId> {
    entries
        .iter()
        .find(|entry| entry.params.len() == arity)
        .or_else(|| entries.first())
        .map(|entry| entry.node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SymbolTable {
        let mut symbols = SymbolTable::default();
        let mut person = TypeEntry::new(TypeTarget::Record { keyword: "class" });
        person.decls.push(NodeId(1));
        symbols.types.insert("Entities::Person".into(), person);

        symbols.types.insert(
            "CustomTypes::PersonRef".into(),
            TypeEntry::new(TypeTarget::Alias {
                target: "Entities::Person".into(),
                context: vec![String::new()],
            }),
        );

        symbols.functions.insert(
            "Entities::Person::getName".into(),
            vec![FunctionEntry {
                node: NodeId(2),
                params: vec![],
                has_body: false,
            }],
        );
        symbols.functions.insert(
            "Entities::Person::Person".into(),
            vec![
                FunctionEntry {
                    node: NodeId(3),
                    params: vec![],
                    has_body: false,
                },
                FunctionEntry {
                    node: NodeId(4),
                    params: vec!["int".into(), "int".into()],
                    has_body: false,
                },
            ],
        );
        symbols
    }

    #[test]
    fn context_runs_from_innermost_scope() {
        let path = vec!["A".to_string(), "B".to_string()];
        assert_eq!(lookup_context(&path), vec!["A::B", "A", ""]);
    }

    #[test]
    fn resolves_records_through_aliases_and_smart_pointers() {
        let symbols = table();
        let ctx = lookup_context(&["Entities".to_string()]);
        assert_eq!(symbols.resolve_record("const Person &", &ctx).as_deref(), Some("Entities::Person"));
        assert_eq!(
            symbols.resolve_record("CustomTypes::PersonRef", &[String::new()]).as_deref(),
            Some("Entities::Person")
        );
        assert_eq!(
            symbols.resolve_record("std::shared_ptr<Entities::Person>", &[String::new()]).as_deref(),
            Some("Entities::Person")
        );
        assert_eq!(symbols.resolve_record("int", &ctx), None);
    }

    #[test]
    fn overloads_prefer_matching_arity() {
        let symbols = table();
        assert_eq!(symbols.find_constructor("Entities::Person", 2), Some(NodeId(4)));
        assert_eq!(symbols.find_constructor("Entities::Person", 0), Some(NodeId(3)));
        assert_eq!(symbols.find_constructor("Entities::Person", 5), Some(NodeId(3)));
        assert_eq!(
            symbols.find_member_function("Entities::Person", "getName", 0),
            Some(NodeId(2))
        );
    }

    #[test]
    fn using_directives_extend_lookup() {
        let mut symbols = table();
        assert!(symbols.find_type("Person", &[String::new()]).is_none());
        symbols.add_using("Entities".into());
        symbols.add_using("Entities".into());
        assert_eq!(symbols.usings.len(), 1);
        assert!(symbols.find_type("Person", &[String::new()]).is_some());
    }
}
