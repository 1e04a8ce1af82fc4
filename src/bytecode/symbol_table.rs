use std::collections::HashMap;

/// Storage classification of a resolved name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
    Free,
}

/// A resolved name. The meaning of `index` depends on the scope:
/// an absolute slot for globals and locals, a builtin-table index, or a
/// position in the enclosing closure's free vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One lexical scope's name bindings, chained to the enclosing scope.
///
/// Tables form a child-to-parent chain; the compiler owns the innermost
/// table and pushes/pops the chain as it enters and leaves function
/// bodies. The outermost table persists across REPL lines.
#[derive(Debug, Default)]
pub struct SymbolTable {
    store: HashMap<String, Symbol>,
    pub num_definitions: usize,

    /// The outer-scope symbols captured by this scope, in the order their
    /// values must be pushed before the closure instruction.
    pub free_symbols: Vec<Symbol>,

    pub outer: Option<Box<SymbolTable>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn new_enclosed(outer: SymbolTable) -> Self {
        SymbolTable {
            outer: Some(Box::new(outer)),
            ..SymbolTable::default()
        }
    }

    /// Allocates a fresh slot for `name` in this table. The scope is Local
    /// when the table has an outer scope, Global otherwise. Re-defining a
    /// name overwrites the old binding but never reuses its slot.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_some() {
            SymbolScope::Local
        } else {
            SymbolScope::Global
        };

        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };
        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;

        symbol
    }

    /// Registers a builtin under its table index. Builtins do not consume
    /// global or local slots.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Looks up `name`, walking the outer chain on a miss.
    ///
    /// Globals and builtins resolve unchanged from any depth. A Local or
    /// Free symbol of an enclosing scope is promoted on the way back down:
    /// the original symbol is appended to this table's `free_symbols` and
    /// the caller receives a Free-scope symbol pointing at that position.
    /// This is what tells the compiler which values to push at
    /// closure-construction time, and in which order.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }

        let outer = self.outer.as_mut()?;
        let symbol = outer.resolve(name)?;

        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(symbol),
            SymbolScope::Local | SymbolScope::Free => Some(self.define_free(symbol)),
        }
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        self.free_symbols.push(original.clone());

        let symbol = Symbol {
            name: original.name,
            scope: SymbolScope::Free,
            index: self.free_symbols.len() - 1,
        };
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(name: &str, scope: SymbolScope, index: usize) -> Symbol {
        Symbol {
            name: name.to_string(),
            scope,
            index,
        }
    }

    #[test]
    fn test_define_global() {
        let mut global = SymbolTable::new();

        assert_eq!(global.define("a"), symbol("a", SymbolScope::Global, 0));
        assert_eq!(global.define("b"), symbol("b", SymbolScope::Global, 1));
        assert_eq!(global.num_definitions, 2);
    }

    #[test]
    fn test_redefine_assigns_fresh_slot() {
        let mut global = SymbolTable::new();

        global.define("a");
        let second = global.define("a");

        // last-writer-wins, but the old slot is not reused
        assert_eq!(second.index, 1);
        assert_eq!(global.resolve("a"), Some(second));
        assert_eq!(global.num_definitions, 2);
    }

    #[test]
    fn test_resolve_global() {
        let mut global = SymbolTable::new();
        global.define("a");
        global.define("b");

        assert_eq!(
            global.resolve("a"),
            Some(symbol("a", SymbolScope::Global, 0))
        );
        assert_eq!(
            global.resolve("b"),
            Some(symbol("b", SymbolScope::Global, 1))
        );
        assert_eq!(global.resolve("missing"), None);
    }

    #[test]
    fn test_define_and_resolve_local() {
        let mut global = SymbolTable::new();
        global.define("a");

        let mut local = SymbolTable::new_enclosed(global);
        local.define("b");

        assert_eq!(local.resolve("a"), Some(symbol("a", SymbolScope::Global, 0)));
        assert_eq!(local.resolve("b"), Some(symbol("b", SymbolScope::Local, 0)));
    }

    #[test]
    fn test_define_builtin() {
        let mut global = SymbolTable::new();
        global.define_builtin(0, "len");
        global.define("a");

        // builtins consume no global slots
        assert_eq!(global.resolve("a"), Some(symbol("a", SymbolScope::Global, 0)));
        assert_eq!(
            global.resolve("len"),
            Some(symbol("len", SymbolScope::Builtin, 0))
        );

        // and resolve unchanged from nested scopes
        let mut local = SymbolTable::new_enclosed(global);
        assert_eq!(
            local.resolve("len"),
            Some(symbol("len", SymbolScope::Builtin, 0))
        );
        assert!(local.free_symbols.is_empty());
    }

    #[test]
    fn test_resolve_free() {
        let mut global = SymbolTable::new();
        global.define("a");

        let mut outer_fn = SymbolTable::new_enclosed(global);
        outer_fn.define("b");

        let mut inner_fn = SymbolTable::new_enclosed(outer_fn);
        inner_fn.define("c");

        // 'a' is global all the way down
        assert_eq!(
            inner_fn.resolve("a"),
            Some(symbol("a", SymbolScope::Global, 0))
        );

        // 'b' is local to the enclosing function: promoted to free here
        assert_eq!(inner_fn.resolve("b"), Some(symbol("b", SymbolScope::Free, 0)));
        assert_eq!(
            inner_fn.free_symbols,
            vec![symbol("b", SymbolScope::Local, 0)]
        );

        // resolving again does not grow the free list
        inner_fn.resolve("b");
        assert_eq!(inner_fn.free_symbols.len(), 1);
    }

    #[test]
    fn test_resolve_nested_free_promotion() {
        // a chain of three function scopes: the innermost use of the
        // outermost local must promote through every level
        let mut global = SymbolTable::new();
        global.define("g");

        let mut first = SymbolTable::new_enclosed(global);
        first.define("a");

        let mut second = SymbolTable::new_enclosed(first);
        second.define("b");

        let mut third = SymbolTable::new_enclosed(second);
        third.define("c");

        assert_eq!(third.resolve("a"), Some(symbol("a", SymbolScope::Free, 0)));
        assert_eq!(third.resolve("b"), Some(symbol("b", SymbolScope::Free, 1)));

        // the middle table captured 'a' from its outer as a free symbol
        let second = third.outer.as_ref().expect("outer table");
        assert_eq!(
            second.free_symbols,
            vec![symbol("a", SymbolScope::Local, 0)]
        );

        // this table records the originals in capture order
        assert_eq!(
            third.free_symbols,
            vec![
                symbol("a", SymbolScope::Free, 0),
                symbol("b", SymbolScope::Local, 0),
            ]
        );
    }
}
