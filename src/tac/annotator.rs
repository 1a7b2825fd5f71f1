//! Pure back-annotation of the scope tree with the memory layout computed
//! during TAC generation. Emits no code.

use crate::symbols::{ScopeTree, Symbol, SymbolKind};
use crate::tac::address::AddressManager;

pub struct SymbolAnnotator<'a> {
    addresses: &'a AddressManager,
}

impl<'a> SymbolAnnotator<'a> {
    pub fn new(addresses: &'a AddressManager) -> Self {
        SymbolAnnotator { addresses }
    }

    pub fn annotate_scope_tree(&self, tree: &mut ScopeTree) {
        for id in tree.scope_ids().collect::<Vec<_>>() {
            if id == ScopeTree::GLOBAL {
                self.annotate_global_scope(tree);
            } else {
                self.annotate_function_scope(tree, id);
            }
        }
    }

    fn annotate_global_scope(&self, tree: &mut ScopeTree) {
        let scope = tree.scope_mut(ScopeTree::GLOBAL);
        for symbol in scope.symbols.values_mut() {
            match symbol.kind {
                SymbolKind::Var => {
                    symbol.size_bytes = size_of(symbol);
                    symbol.memory_address = Some(format!("global_{}", symbol.name));
                    symbol.memory_offset = Some(0);
                }
                SymbolKind::Func => {
                    // The function's entry label is its own name.
                    symbol.tac_label = Some(symbol.name.clone());
                    let frame_size = self.addresses.frame_size(Some(&symbol.name));
                    if frame_size > 0 {
                        symbol.frame_size = Some(frame_size);
                    }
                }
                SymbolKind::Class => {}
            }
        }
    }

    fn annotate_function_scope(&self, tree: &mut ScopeTree, id: usize) {
        let Some(function_name) = tree.enclosing_function(id).map(str::to_string) else {
            return;
        };
        let Some(frame) = self.addresses.completed_frame(&function_name) else {
            return;
        };

        let scope = tree.scope_mut(id);
        if scope.function_name.as_deref() == Some(&function_name) {
            scope.stack_frame_size = Some(frame.total_size);
        }

        for symbol in scope.symbols.values_mut() {
            if symbol.kind != SymbolKind::Var {
                continue;
            }
            symbol.size_bytes = size_of(symbol);
            symbol.frame_size = Some(frame.total_size);

            if let Some(index) = frame.parameters.iter().position(|p| p == &symbol.name) {
                symbol.is_parameter = true;
                symbol.parameter_index = Some(index);
            }
            if let Some(offset) = frame.offset_of(&symbol.name) {
                symbol.memory_offset = Some(offset);
                symbol.memory_address = Some(if offset < 0 {
                    format!("fp{offset}")
                } else {
                    format!("fp+{offset}")
                });
            }
        }
    }
}

/// 4 bytes across the board; arrays and strings are pointers.
fn size_of(symbol: &Symbol) -> u32 {
    symbol.type_ref.as_ref().map(|t| t.size_bytes()).unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::TypeRef;

    #[test]
    fn parameters_and_locals_get_frame_offsets() {
        let mut addresses = AddressManager::new();
        addresses.enter_function("f", vec!["a".into()]);
        addresses.allocate_local("x", 4);
        addresses.exit_function();

        let mut tree = ScopeTree::new();
        let scope = tree.push_function_scope(ScopeTree::GLOBAL, "f");
        tree.define(scope, Symbol::var("a", TypeRef::integer())).unwrap();
        tree.define(scope, Symbol::var("x", TypeRef::integer())).unwrap();

        SymbolAnnotator::new(&addresses).annotate_scope_tree(&mut tree);

        let a = tree.lookup(scope, "a").unwrap();
        assert!(a.is_parameter);
        assert_eq!(a.parameter_index, Some(0));
        assert_eq!(a.memory_address.as_deref(), Some("fp+8"));

        let x = tree.lookup(scope, "x").unwrap();
        assert!(!x.is_parameter);
        assert_eq!(x.memory_offset, Some(-4));
        assert_eq!(x.memory_address.as_deref(), Some("fp-4"));
    }

    #[test]
    fn globals_get_labels() {
        let addresses = AddressManager::new();
        let mut tree = ScopeTree::new();
        tree.define(ScopeTree::GLOBAL, Symbol::var("g", TypeRef::string()))
            .unwrap();
        SymbolAnnotator::new(&addresses).annotate_scope_tree(&mut tree);
        let g = tree.lookup(ScopeTree::GLOBAL, "g").unwrap();
        assert_eq!(g.memory_address.as_deref(), Some("global_g"));
        assert_eq!(g.size_bytes, 4);
    }
}
