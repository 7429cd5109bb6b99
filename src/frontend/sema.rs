use crate::ast::*;
use crate::error::CompileError;

use super::eval::const_eval;
use super::symbol_table::{register_library, SymbolInfo, SymbolTable};

type Result<T> = std::result::Result<T, CompileError>;

/// Checks a compilation unit before any IR is emitted: name resolution,
/// duplicate definitions, constant contexts, assignment targets, call
/// arity, and break/continue placement. Emission runs afterwards against
/// a fresh symbol table, so any error it reports past this point is an
/// internal inconsistency.
pub fn check(unit: &CompUnit) -> Result<()> {
    let mut checker = Checker::new();
    for item in &unit.items {
        match item {
            GlobalItem::Decl(decl) => checker.check_decl(decl)?,
            GlobalItem::FuncDef(func) => checker.check_func(func)?,
        }
    }
    Ok(())
}

struct Checker {
    symbols: SymbolTable,
    loop_depth: u32,
}

impl Checker {
    fn new() -> Self {
        let mut symbols = SymbolTable::new();
        register_library(&mut symbols);
        Checker {
            symbols,
            loop_depth: 0,
        }
    }

    fn check_decl(&mut self, decl: &Decl) -> Result<()> {
        match decl {
            Decl::Const(decl) => {
                for def in &decl.defs {
                    let value = const_eval(&def.init, &self.symbols)?;
                    self.symbols.add(&def.name, SymbolInfo::Const(value))?;
                }
            }
            Decl::Var(decl) => {
                let is_global = self.symbols.is_global_scope();
                for def in &decl.defs {
                    if let Some(init) = &def.init {
                        if is_global {
                            // Global initialisers must fold at compile time.
                            const_eval(init, &self.symbols)?;
                        } else {
                            self.check_expr(init)?;
                        }
                    }
                    let ir_name = if is_global {
                        format!("@{}", def.name)
                    } else {
                        self.symbols.unique_name(&def.name)
                    };
                    self.symbols.add(
                        &def.name,
                        SymbolInfo::Var { ir_name, is_global },
                    )?;
                }
            }
        }
        Ok(())
    }

    fn check_func(&mut self, func: &FuncDef) -> Result<()> {
        self.symbols.add(
            &func.func_name,
            SymbolInfo::Func {
                ret_type: func.func_type,
                params: func
                    .params
                    .iter()
                    .map(|p| p.param_name.clone())
                    .collect(),
            },
        )?;

        self.symbols.reset_var_cnt();
        self.symbols.enter_scope();
        for param in &func.params {
            let ir_name = format!("%{}", param.param_name);
            self.symbols.add(
                &param.param_name,
                SymbolInfo::Var {
                    ir_name,
                    is_global: false,
                },
            )?;
        }
        self.check_block(&func.block)?;
        self.symbols.exit_scope();
        Ok(())
    }

    fn check_block(&mut self, block: &Block) -> Result<()> {
        self.symbols.enter_scope();
        for item in &block.items {
            match item {
                BlockItem::Decl(decl) => self.check_decl(decl)?,
                BlockItem::Stmt(stmt) => self.check_stmt(stmt)?,
            }
        }
        self.symbols.exit_scope();
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Assign { lval, expr } => {
                match self.symbols.lookup(lval) {
                    None => return Err(CompileError::UndefinedIdentifier(lval.clone())),
                    Some(SymbolInfo::Var { .. }) => {}
                    Some(_) => return Err(CompileError::AssignToConstant(lval.clone())),
                }
                self.check_expr(expr)
            }
            Stmt::Return { expr } => match expr {
                Some(expr) => self.check_expr(expr),
                None => Ok(()),
            },
            Stmt::Expression { expr } => match expr {
                Some(expr) => self.check_expr(expr),
                None => Ok(()),
            },
            Stmt::Block { block } => self.check_block(block),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.check_expr(cond)?;
                self.check_stmt(then_body)?;
                if let Some(else_body) = else_body {
                    self.check_stmt(else_body)?;
                }
                Ok(())
            }
            Stmt::While { cond, body } => {
                self.check_expr(cond)?;
                self.loop_depth += 1;
                let result = self.check_stmt(body);
                self.loop_depth -= 1;
                result
            }
            Stmt::Break => {
                if self.loop_depth == 0 {
                    return Err(CompileError::BreakOutsideLoop);
                }
                Ok(())
            }
            Stmt::Continue => {
                if self.loop_depth == 0 {
                    return Err(CompileError::ContinueOutsideLoop);
                }
                Ok(())
            }
        }
    }

    fn check_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Number(_) => Ok(()),
            Expr::LVal(name) => match self.symbols.lookup(name) {
                Some(SymbolInfo::Func { .. }) | None => {
                    Err(CompileError::UndefinedIdentifier(name.clone()))
                }
                Some(_) => Ok(()),
            },
            Expr::Unary { expr, .. } => self.check_expr(expr),
            Expr::Binary { lhs, rhs, .. } => {
                self.check_expr(lhs)?;
                self.check_expr(rhs)
            }
            Expr::Call { func_name, args } => {
                let expected = match self.symbols.lookup(func_name) {
                    Some(SymbolInfo::Func { params, .. }) => params.len(),
                    _ => {
                        return Err(CompileError::UndefinedIdentifier(func_name.clone()))
                    }
                };
                if args.len() != expected {
                    return Err(CompileError::ArityMismatch {
                        name: func_name.clone(),
                        expected,
                        found: args.len(),
                    });
                }
                for arg in args {
                    self.check_expr(arg)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_src(src: &str) -> Result<()> {
        check(&crate::parse(src).unwrap())
    }

    #[test]
    fn accepts_well_formed_programs() {
        check_src("int main() { int a = 1; return a + 2; }").unwrap();
        check_src("const int N = 3; int main() { return N; }").unwrap();
        check_src("int f(int x) { return x; } int main() { return f(1); }").unwrap();
    }

    #[test]
    fn rejects_undefined_identifiers() {
        assert!(matches!(
            check_src("int main() { return x; }"),
            Err(CompileError::UndefinedIdentifier(_))
        ));
        assert!(matches!(
            check_src("int main() { return f(); }"),
            Err(CompileError::UndefinedIdentifier(_))
        ));
    }

    #[test]
    fn rejects_duplicate_definitions() {
        assert!(matches!(
            check_src("int main() { int a = 1; int a = 2; return a; }"),
            Err(CompileError::DuplicateDefinition(_))
        ));
        // Shadowing in a nested scope is fine.
        check_src("int main() { int a = 1; { int a = 2; } return a; }").unwrap();
    }

    #[test]
    fn rejects_assignment_to_constants() {
        assert!(matches!(
            check_src("int main() { const int N = 1; N = 2; return N; }"),
            Err(CompileError::AssignToConstant(_))
        ));
    }

    #[test]
    fn rejects_non_const_initialisers_in_const_context() {
        assert!(matches!(
            check_src("int main() { int a = 1; const int N = a; return N; }"),
            Err(CompileError::NonConstInConstContext(_))
        ));
        assert!(matches!(
            check_src("int f() { return 1; } int g = f(); int main() { return g; }"),
            Err(CompileError::NonConstInConstContext(_))
        ));
    }

    #[test]
    fn rejects_arity_mismatches() {
        assert!(matches!(
            check_src("int f(int x) { return x; } int main() { return f(1, 2); }"),
            Err(CompileError::ArityMismatch { .. })
        ));
        assert!(matches!(
            check_src("int main() { putint(); return 0; }"),
            Err(CompileError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn rejects_break_and_continue_outside_loops() {
        assert!(matches!(
            check_src("int main() { break; return 0; }"),
            Err(CompileError::BreakOutsideLoop)
        ));
        assert!(matches!(
            check_src("int main() { if (1) continue; return 0; }"),
            Err(CompileError::ContinueOutsideLoop)
        ));
        check_src("int main() { while (1) { break; } return 0; }").unwrap();
    }
}
