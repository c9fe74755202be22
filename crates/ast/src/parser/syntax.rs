//! Small helpers over tree-sitter nodes

use tree_sitter::Node;

pub(super) fn text<'s>(node: Node<'_>, src: &'s str) -> &'s str {
    node.utf8_text(src.as_bytes()).unwrap_or_default()
}

/// Collapse runs of whitespace into single spaces
pub(super) fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(super) fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let children: Vec<_> = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    children
}

pub(super) fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let children: Vec<_> = node.children_by_field_name(field, &mut cursor).collect();
    children
}

pub(super) fn first_child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    named_children(node).into_iter().find(|child| child.kind() == kind)
}

pub(super) fn line(node: Node<'_>) -> u32 {
    u32::try_from(node.start_position().row + 1).unwrap_or(u32::MAX)
}

pub(super) fn end_line(node: Node<'_>) -> u32 {
    u32::try_from(node.end_position().row + 1).unwrap_or(u32::MAX)
}

pub(super) fn column(node: Node<'_>) -> u32 {
    u32::try_from(node.start_position().column + 1).unwrap_or(u32::MAX)
}

/// Split `A::B<int>::c` at top-level `::` separators
pub(super) fn split_qualified(name: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    let mut chars = name.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '<' => {
                depth += 1;
                current.push(ch);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ':' if depth == 0 && chars.peek() == Some(&':') => {
                chars.next();
                let part = current.trim().to_string();
                if !part.is_empty() {
                    parts.push(part);
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    let part = current.trim().to_string();
    if !part.is_empty() {
        parts.push(part);
    }
    parts
}

/// Drop template argument lists: `std::vector<int>::iterator` -> `std::vector::iterator`
pub(super) fn strip_template_args(name: &str) -> String {
    if name.starts_with("operator") {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len());
    let mut depth = 0usize;
    for ch in name.chars() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Last component of a qualified name
pub(super) fn simple_name(qualified: &str) -> String {
    split_qualified(qualified).pop().unwrap_or_default()
}

/// Innermost name of a declarator chain (`&name`, `*const name`, `name[4]`, `name = 3`)
pub(super) fn declarator_name(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node;
    loop {
        match current.kind() {
            "identifier" | "field_identifier" | "type_identifier" | "qualified_identifier"
            | "destructor_name" | "operator_name" => return Some(current),
            "reference_declarator" => {
                // reference_declarator has no `declarator` field
                current = named_children(current).into_iter().last()?;
            }
            _ => current = current.child_by_field_name("declarator")?,
        }
    }
}

/// Pointer/reference suffix a declarator adds to its base type (` &`, ` *`, ` * const`)
pub(super) fn declarator_suffix(node: Option<Node<'_>>, src: &str) -> String {
    let mut suffix = String::new();
    let mut current = node;
    while let Some(decl) = current {
        match decl.kind() {
            "reference_declarator" | "abstract_reference_declarator" => {
                let token = decl
                    .child(0)
                    .map(|t| text(t, src))
                    .unwrap_or("&");
                suffix.push(' ');
                suffix.push_str(token);
                current = named_children(decl).into_iter().last();
            }
            "pointer_declarator" | "abstract_pointer_declarator" => {
                suffix.push_str(" *");
                for qualifier in named_children(decl)
                    .into_iter()
                    .filter(|c| c.kind() == "type_qualifier")
                {
                    suffix.push(' ');
                    suffix.push_str(text(qualifier, src));
                }
                current = decl.child_by_field_name("declarator");
            }
            "array_declarator" | "abstract_array_declarator" => {
                suffix.push_str(" []");
                current = decl.child_by_field_name("declarator");
            }
            "init_declarator" => current = decl.child_by_field_name("declarator"),
            _ => break,
        }
    }
    suffix
}

/// Locate the `function_declarator` a declarator wraps, if it declares a function
pub(super) fn function_declarator(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node;
    loop {
        match current.kind() {
            "function_declarator" => return Some(current),
            "pointer_declarator" => current = current.child_by_field_name("declarator")?,
            "reference_declarator" => current = named_children(current).into_iter().last()?,
            _ => return None,
        }
    }
}

/// Text of a declaration before its (first) declarator: `const Entities::Person`
pub(super) fn type_prefix(decl: Node<'_>, declarator: Option<Node<'_>>, src: &str) -> String {
    let end = declarator.map_or(decl.end_byte(), |d| d.start_byte());
    squash(src.get(decl.start_byte()..end).unwrap_or_default())
}

/// Spelling of a declaration's type: text before the declarator plus its suffix
pub(super) fn declared_type(decl: Node<'_>, declarator: Option<Node<'_>>, src: &str) -> String {
    let mut spelled = type_prefix(decl, declarator, src);
    spelled.push_str(&declarator_suffix(declarator, src));
    spelled
}

/// Strip cv-qualifiers, elaborated keywords, pointers and references
pub(super) fn bare_type(type_text: &str) -> String {
    let spaced = type_text.replace(['&', '*'], " ");
    spaced
        .split_whitespace()
        .filter(|word| {
            !matches!(
                *word,
                "const" | "volatile" | "class" | "struct" | "union" | "enum" | "typename" | "mutable" | "static"
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
        .trim_start_matches("::")
        .to_string()
}

/// First template argument of `name<...>`
pub(super) fn first_template_arg(type_text: &str) -> Option<&str> {
    let open = type_text.find('<')?;
    let close = type_text.rfind('>')?;
    let inner = type_text.get(open + 1..close)?;
    let mut depth = 0usize;
    for (idx, ch) in inner.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some(inner[..idx].trim()),
            _ => {}
        }
    }
    Some(inner.trim())
}
