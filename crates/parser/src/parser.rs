use crate::error::{ParserError, Result};
use crate::language::{Language, LanguageTable};
use argus_core::{Edge, EdgeKind, FilePath, LineRange, Symbol, SymbolKind};
use std::collections::BTreeSet;
use tree_sitter::{Node, Parser};

/// Structured result of parsing one source file.
///
/// Edge targets are bare names or raw import strings at this stage; the
/// indexing service resolves them against the whole map at graph-link time.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    pub language: Language,
    pub symbols: Vec<Symbol>,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub edges: Vec<Edge>,
}

/// Parses source files into symbols and local edges using tree-sitter.
#[derive(Debug, Clone, Default)]
pub struct SourceParser {
    table: LanguageTable,
}

impl SourceParser {
    pub fn new(table: LanguageTable) -> Self {
        SourceParser { table }
    }

    pub fn language_table(&self) -> &LanguageTable {
        &self.table
    }

    /// Parse one file. Fails only on unsupported language, grammar load
    /// problems, or tree-sitter refusing to produce a tree; callers degrade
    /// a failed file to an empty entry rather than aborting the build.
    pub fn parse(&self, path: &FilePath, bytes: &[u8]) -> Result<ParsedSource> {
        let language = self.table.language_for(path)?;
        let grammar = language.tree_sitter_language();

        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| ParserError::Grammar {
                language: language.as_str(),
                reason: e.to_string(),
            })?;

        let tree = parser.parse(bytes, None).ok_or_else(|| ParserError::Parse {
            path: path.to_string(),
            reason: "tree-sitter produced no tree".to_string(),
        })?;

        let mut out = Extraction {
            path,
            src: bytes,
            symbols: Vec::new(),
            imports: Vec::new(),
            edges: Vec::new(),
        };
        out.walk(tree.root_node(), &ScopeStack::default());

        let exports = out
            .symbols
            .iter()
            .filter(|s| !s.name.contains('.'))
            .map(|s| s.name.clone())
            .collect();

        Ok(ParsedSource {
            language,
            symbols: out.symbols,
            imports: out.imports,
            exports,
            edges: out.edges,
        })
    }
}

/// Nesting context while walking: enclosing type names, if any.
#[derive(Debug, Clone, Default)]
struct ScopeStack(Vec<String>);

impl ScopeStack {
    fn push(&self, name: &str) -> ScopeStack {
        let mut next = self.0.clone();
        next.push(name.to_string());
        ScopeStack(next)
    }

    fn in_type(&self) -> bool {
        !self.0.is_empty()
    }

    fn scoped_name(&self, name: &str) -> String {
        if self.0.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.0.join("."), name)
        }
    }
}

struct Extraction<'a> {
    path: &'a FilePath,
    src: &'a [u8],
    symbols: Vec<Symbol>,
    imports: Vec<String>,
    edges: Vec<Edge>,
}

impl<'a> Extraction<'a> {
    fn walk(&mut self, node: Node<'a>, scope: &ScopeStack) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            let kind = child.kind();

            if let Some(symbol_kind) = type_symbol_kind(kind) {
                if let Some(name) = node_name(child, self.src) {
                    self.record_symbol(&name, symbol_kind, child, scope);
                    self.heritage_edges(child, &scope.scoped_name(&name));
                    self.walk(child, &scope.push(&name));
                    continue;
                }
            } else if is_function_node(kind) {
                if let Some(name) = node_name(child, self.src) {
                    let symbol_kind = if scope.in_type() || is_method_node(kind) {
                        SymbolKind::Method
                    } else {
                        SymbolKind::Function
                    };
                    let qualified = self.record_symbol(&name, symbol_kind, child, scope);
                    self.call_edges(child, &name, &qualified);
                    continue;
                }
            } else if is_constant_node(kind) {
                self.record_constants(child, scope);
            } else if is_import_node(kind) {
                if let Some(import) = import_path(child, self.src) {
                    self.edges.push(Edge::new(
                        self.path.as_str(),
                        EdgeKind::Imports,
                        import.clone(),
                    ));
                    self.imports.push(import);
                }
                continue;
            }

            self.walk(child, scope);
        }
    }

    fn record_symbol(
        &mut self,
        name: &str,
        kind: SymbolKind,
        node: Node<'a>,
        scope: &ScopeStack,
    ) -> String {
        let scoped = scope.scoped_name(name);
        let qualified = Symbol::qualify(self.path, &scoped);
        self.symbols.push(Symbol {
            name: scoped,
            kind,
            line_range: line_range_of(node),
            qualified_name: qualified.clone(),
        });
        qualified
    }

    fn record_constants(&mut self, node: Node<'a>, scope: &ScopeStack) {
        // Rust const_item carries its own name; Go const_declaration nests
        // one or more const_spec children.
        if node.kind() == "const_item" {
            if let Some(name) = node_name(node, self.src) {
                self.record_symbol(&name, SymbolKind::Constant, node, scope);
            }
            return;
        }
        let mut cursor = node.walk();
        for spec in node.named_children(&mut cursor) {
            if spec.kind() == "const_spec" {
                if let Some(name) = node_name(spec, self.src) {
                    self.record_symbol(&name, SymbolKind::Constant, node, scope);
                }
            }
        }
    }

    /// Collect call references inside a function body as unresolved edges.
    fn call_edges(&mut self, node: Node<'a>, own_name: &str, qualified: &str) {
        let mut callees: BTreeSet<String> = BTreeSet::new();
        collect_callees(node, self.src, &mut callees);
        for callee in callees {
            if callee == own_name {
                continue;
            }
            self.edges
                .push(Edge::new(qualified, EdgeKind::Calls, callee));
        }
    }

    /// Extends/implements edges from superclass and interface clauses.
    fn heritage_edges(&mut self, node: Node<'a>, qualified_owner: &str) {
        let source = Symbol::qualify(self.path, qualified_owner);
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            let edge_kind = match child.kind() {
                "superclass" | "argument_list" | "class_heritage" | "extends_clause"
                | "base_class_clause" | "base_list" => EdgeKind::Extends,
                "implements_clause" | "super_interfaces" => EdgeKind::Implements,
                _ => continue,
            };
            let mut names: BTreeSet<String> = BTreeSet::new();
            collect_type_names(child, self.src, &mut names);
            for name in names {
                self.edges.push(Edge::new(source.clone(), edge_kind, name));
            }
        }
    }
}

fn line_range_of(node: Node<'_>) -> LineRange {
    LineRange {
        start: node.start_position().row as u32 + 1,
        end: node.end_position().row as u32 + 1,
    }
}

fn is_function_node(kind: &str) -> bool {
    matches!(
        kind,
        "function_item"
            | "function_definition"
            | "function_declaration"
            | "method_definition"
            | "method_declaration"
            | "constructor_declaration"
            | "method"
            | "singleton_method"
    )
}

fn is_method_node(kind: &str) -> bool {
    matches!(
        kind,
        "method_definition" | "method_declaration" | "constructor_declaration" | "method"
    )
}

fn type_symbol_kind(kind: &str) -> Option<SymbolKind> {
    match kind {
        "class_definition" | "class_declaration" | "class_specifier" | "class" | "module"
        | "impl_item" => Some(SymbolKind::Class),
        "interface_declaration" | "trait_item" | "trait_declaration" => Some(SymbolKind::Interface),
        "struct_item" | "struct_specifier" => Some(SymbolKind::Struct),
        "enum_item" | "enum_specifier" | "enum_declaration" => Some(SymbolKind::Enum),
        "type_item" | "type_alias_declaration" | "type_declaration" => Some(SymbolKind::Type),
        _ => None,
    }
}

fn is_constant_node(kind: &str) -> bool {
    matches!(kind, "const_item" | "const_declaration")
}

fn is_import_node(kind: &str) -> bool {
    matches!(
        kind,
        "import_statement"
            | "import_from_statement"
            | "import_declaration"
            | "use_declaration"
            | "preproc_include"
            | "using_directive"
            | "namespace_use_declaration"
    )
}

fn is_call_node(kind: &str) -> bool {
    matches!(
        kind,
        "call"
            | "call_expression"
            | "method_invocation"
            | "invocation_expression"
            | "function_call_expression"
            | "member_call_expression"
            | "scoped_call_expression"
    )
}

fn node_text<'a>(node: Node<'a>, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or_default()
}

/// Name of a definition node: the `name` field, else the first identifier.
fn node_name(node: Node<'_>, src: &[u8]) -> Option<String> {
    if let Some(name_node) = node.child_by_field_name("name") {
        let text = node_text(name_node, src);
        if !text.is_empty() {
            return Some(text.to_string());
        }
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if is_identifier_kind(child.kind()) {
            let text = node_text(child, src);
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

fn is_identifier_kind(kind: &str) -> bool {
    matches!(
        kind,
        "identifier" | "type_identifier" | "field_identifier" | "property_identifier" | "constant"
    )
}

/// The import path of an import-like node: a string literal child when the
/// language quotes module paths, otherwise the dotted/scoped name.
fn import_path(node: Node<'_>, src: &[u8]) -> Option<String> {
    if node.kind() == "import_from_statement" {
        if let Some(module) = node.child_by_field_name("module_name") {
            return Some(node_text(module, src).to_string());
        }
    }
    find_import_literal(node, src)
}

fn find_import_literal(node: Node<'_>, src: &[u8]) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "string" | "string_literal" | "interpreted_string_literal" | "raw_string_literal" => {
                let text = node_text(child, src).trim_matches(['"', '\'', '`']).to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
            "system_lib_string" => {
                let text = node_text(child, src).trim_matches(['<', '>']).to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
            "dotted_name" | "scoped_identifier" | "qualified_name" | "identifier"
            | "scoped_use_list" | "use_wildcard" | "import_spec" | "import_spec_list"
            | "aliased_import" => {
                if let Some(found) = find_import_literal(child, src) {
                    return Some(found);
                }
                let text = node_text(child, src).to_string();
                if !text.is_empty() && !text.contains('\n') {
                    return Some(text);
                }
            }
            _ => {}
        }
    }
    None
}

fn collect_callees(node: Node<'_>, src: &[u8], out: &mut BTreeSet<String>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if is_call_node(child.kind()) {
            let callee = child
                .child_by_field_name("function")
                .or_else(|| child.child_by_field_name("name"))
                .or_else(|| child.named_child(0));
            if let Some(callee) = callee {
                if let Some(name) = trailing_identifier(callee, src) {
                    out.insert(name);
                }
            }
        }
        collect_callees(child, src, out);
    }
}

/// The final identifier of a possibly-dotted callee expression:
/// `a.b.c()` yields `c`, `foo()` yields `foo`.
fn trailing_identifier(node: Node<'_>, src: &[u8]) -> Option<String> {
    if is_identifier_kind(node.kind()) {
        let text = node_text(node, src);
        return (!text.is_empty()).then(|| text.to_string());
    }
    let field = match node.kind() {
        "attribute" => node.child_by_field_name("attribute"),
        "member_expression" => node.child_by_field_name("property"),
        "field_expression" => node.child_by_field_name("field"),
        "selector_expression" => node.child_by_field_name("field"),
        "scoped_identifier" => node.child_by_field_name("name"),
        _ => None,
    };
    if let Some(inner) = field {
        return trailing_identifier(inner, src);
    }
    // Fall back to the last named child that yields an identifier.
    let count = node.named_child_count();
    for i in (0..count).rev() {
        if let Some(child) = node.named_child(i) {
            if let Some(name) = trailing_identifier(child, src) {
                return Some(name);
            }
        }
    }
    None
}

fn collect_type_names(node: Node<'_>, src: &[u8], out: &mut BTreeSet<String>) {
    if is_identifier_kind(node.kind()) {
        let text = node_text(node, src);
        if !text.is_empty() {
            out.insert(text.to_string());
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_type_names(child, src, out);
    }
}
