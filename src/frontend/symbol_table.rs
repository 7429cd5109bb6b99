use std::collections::HashMap;

use crate::ast::FuncType;
use crate::error::CompileError;

/// What a name resolves to.
///
/// Constants carry their folded value directly; variables carry the name
/// of their storage cell in the IR (`@x_1_2` for locals, `@x` for
/// globals). Functions carry what call sites need: the return type and
/// the parameter names (arity is checked against them).
#[derive(Debug, Clone)]
pub enum SymbolInfo {
    Const(i32),
    Var { ir_name: String, is_global: bool },
    Func { ret_type: FuncType, params: Vec<String> },
}

struct Scope {
    symbols: HashMap<String, SymbolInfo>,
    scope_id: u32,
}

/// Lexically nested symbol table: a stack of scopes, innermost last.
/// `lookup` walks the stack outwards, so inner bindings shadow outer
/// ones. The table also mints unique IR cell names for local variables;
/// the counter is monotonic within a function and reset at function
/// entry, which keeps every minted name unique per function even across
/// sibling scopes.
pub struct SymbolTable {
    scopes: Vec<Scope>,
    var_cnt: u32,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope {
                symbols: HashMap::new(),
                scope_id: 0,
            }],
            var_cnt: 0,
        }
    }

    pub fn enter_scope(&mut self) {
        let scope_id = self.current().scope_id + 1;
        self.scopes.push(Scope {
            symbols: HashMap::new(),
            scope_id,
        });
    }

    pub fn exit_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot exit the global scope");
        self.scopes.pop();
    }

    pub fn is_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Binds `name` in the current scope. Fails on a duplicate in the
    /// same scope; shadowing an outer binding is fine.
    pub fn add(&mut self, name: &str, info: SymbolInfo) -> Result<(), CompileError> {
        let scope = self.scopes.last_mut().unwrap();
        if scope.symbols.contains_key(name) {
            return Err(CompileError::DuplicateDefinition(name.to_string()));
        }
        scope.symbols.insert(name.to_string(), info);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&SymbolInfo> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.get(name))
    }

    /// Mints a fresh IR cell name `@<base>_<scope_id>_<n>`.
    pub fn unique_name(&mut self, base: &str) -> String {
        self.var_cnt += 1;
        format!("@{}_{}_{}", base, self.current().scope_id, self.var_cnt)
    }

    /// Restarts local cell numbering; called at every function entry.
    pub fn reset_var_cnt(&mut self) {
        self.var_cnt = 0;
    }

    fn current(&self) -> &Scope {
        self.scopes.last().unwrap()
    }
}

/// The names of the SysY runtime library, visible in every program.
pub const LIBRARY_FUNCS: [(&str, FuncType, &[&str]); 8] = [
    ("getint", FuncType::Int, &[]),
    ("getch", FuncType::Int, &[]),
    ("getarray", FuncType::Int, &["arr"]),
    ("putint", FuncType::Void, &["x"]),
    ("putch", FuncType::Void, &["x"]),
    ("putarray", FuncType::Void, &["n", "arr"]),
    ("starttime", FuncType::Void, &[]),
    ("stoptime", FuncType::Void, &[]),
];

/// Registers the runtime library in the (global) scope of `symtab`.
pub fn register_library(symtab: &mut SymbolTable) {
    for (name, ret_type, params) in LIBRARY_FUNCS {
        let info = SymbolInfo::Func {
            ret_type,
            params: params.iter().map(|p| p.to_string()).collect(),
        };
        // The global scope is empty at this point, so `add` cannot fail.
        symtab.add(name, info).unwrap();
    }
}
