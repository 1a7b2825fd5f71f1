use crate::ast::types::TypeRef;
use indexmap::IndexMap;
use serde::Serialize;

/// Kind of a named entity in the scope tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Var,
    Func,
    Class,
}

/// A resolved symbol plus the memory metadata added by the annotator after
/// TAC generation. Front-end fields are filled by the semantic analyzer.
#[derive(Debug, Clone, Serialize)]
pub struct Symbol {
    pub name: String,
    pub type_ref: Option<TypeRef>,
    pub is_const: bool,
    pub kind: SymbolKind,
    pub size_bytes: u32,
    pub memory_address: Option<String>,
    pub memory_offset: Option<i32>,
    pub is_parameter: bool,
    pub parameter_index: Option<usize>,
    pub frame_size: Option<u32>,
    pub tac_label: Option<String>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, type_ref: Option<TypeRef>, kind: SymbolKind) -> Self {
        Symbol {
            name: name.into(),
            type_ref,
            is_const: false,
            kind,
            size_bytes: 4,
            memory_address: None,
            memory_offset: None,
            is_parameter: false,
            parameter_index: None,
            frame_size: None,
            tac_label: None,
        }
    }

    pub fn var(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Symbol::new(name, Some(type_ref), SymbolKind::Var)
    }

    pub fn func(name: impl Into<String>, return_type: Option<TypeRef>) -> Self {
        Symbol::new(name, return_type, SymbolKind::Func)
    }
}

pub type ScopeId = usize;

/// One lexical scope: a name→symbol map plus tree links. Function scopes
/// carry the function name so the annotator can find the matching
/// activation frame.
#[derive(Debug, Clone, Serialize)]
pub struct Scope {
    #[serde(skip)]
    pub parent: Option<ScopeId>,
    #[serde(skip)]
    pub children: Vec<ScopeId>,
    pub symbols: IndexMap<String, Symbol>,
    pub function_name: Option<String>,
    pub stack_frame_size: Option<u32>,
}

impl Scope {
    fn new(parent: Option<ScopeId>) -> Self {
        Scope {
            parent,
            children: Vec::new(),
            symbols: IndexMap::new(),
            function_name: None,
            stack_frame_size: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("identifier '{0}' is already declared in this scope")]
pub struct DuplicateSymbolError(pub String);

/// Arena-backed scope tree shared by name resolution, type checking and
/// memory annotation. Scope 0 is the global scope.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        ScopeTree::new()
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        ScopeTree {
            scopes: vec![Scope::new(None)],
        }
    }

    pub const GLOBAL: ScopeId = 0;

    pub fn push_scope(&mut self, parent: ScopeId) -> ScopeId {
        let id = self.scopes.len();
        self.scopes.push(Scope::new(Some(parent)));
        self.scopes[parent].children.push(id);
        id
    }

    /// Create a scope that belongs to a function body.
    pub fn push_function_scope(&mut self, parent: ScopeId, function_name: &str) -> ScopeId {
        let id = self.push_scope(parent);
        self.scopes[id].function_name = Some(function_name.to_string());
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn scope_ids(&self) -> impl Iterator<Item = ScopeId> {
        0..self.scopes.len()
    }

    pub fn define(&mut self, scope: ScopeId, symbol: Symbol) -> Result<(), DuplicateSymbolError> {
        let table = &mut self.scopes[scope].symbols;
        if table.contains_key(&symbol.name) {
            return Err(DuplicateSymbolError(symbol.name));
        }
        table.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Look a name up, walking parent scopes.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(symbol) = self.scopes[id].symbols.get(name) {
                return Some(symbol);
            }
            current = self.scopes[id].parent;
        }
        None
    }

    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.scopes[scope].symbols.get(name)
    }

    /// The function a scope belongs to, walking parents.
    pub fn enclosing_function(&self, scope: ScopeId) -> Option<&str> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(name) = &self.scopes[id].function_name {
                return Some(name);
            }
            current = self.scopes[id].parent;
        }
        None
    }

    /// Serialize the annotated tree for the `scopes.json` surface.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
