use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::CompileError;

use super::symbol_table::{SymbolInfo, SymbolTable};

/// Folds a constant expression to its i32 value.
///
/// Arithmetic is two's-complement wrapping, `&&`/`||`/`!` follow the C
/// boolean convention (0/1). Fails on anything that is not compile-time
/// constant: calls, variables, or a division by a zero constant.
pub fn const_eval(expr: &Expr, symtab: &SymbolTable) -> Result<i32, CompileError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::LVal(name) => match symtab.lookup(name) {
            Some(SymbolInfo::Const(v)) => Ok(*v),
            Some(_) => Err(CompileError::NonConstInConstContext(name.clone())),
            None => Err(CompileError::UndefinedIdentifier(name.clone())),
        },
        Expr::Unary { op, expr } => {
            let v = const_eval(expr, symtab)?;
            Ok(match op {
                UnaryOp::Pos => v,
                UnaryOp::Neg => v.wrapping_neg(),
                UnaryOp::Not => (v == 0) as i32,
            })
        }
        Expr::Binary { op, lhs, rhs } => {
            let l = const_eval(lhs, symtab)?;
            let r = const_eval(rhs, symtab)?;
            Ok(match op {
                BinaryOp::Add => l.wrapping_add(r),
                BinaryOp::Sub => l.wrapping_sub(r),
                BinaryOp::Mul => l.wrapping_mul(r),
                BinaryOp::Div => {
                    if r == 0 {
                        return Err(CompileError::NonConstInConstContext(
                            "division by zero".into(),
                        ));
                    }
                    l.wrapping_div(r)
                }
                BinaryOp::Mod => {
                    if r == 0 {
                        return Err(CompileError::NonConstInConstContext(
                            "modulo by zero".into(),
                        ));
                    }
                    l.wrapping_rem(r)
                }
                BinaryOp::Eq => (l == r) as i32,
                BinaryOp::Neq => (l != r) as i32,
                BinaryOp::Lt => (l < r) as i32,
                BinaryOp::Gt => (l > r) as i32,
                BinaryOp::Leq => (l <= r) as i32,
                BinaryOp::Geq => (l >= r) as i32,
                BinaryOp::And => (l != 0 && r != 0) as i32,
                BinaryOp::Or => (l != 0 || r != 0) as i32,
            })
        }
        Expr::Call { func_name, .. } => {
            Err(CompileError::NonConstInConstContext(func_name.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_src(expr: &str) -> Result<i32, CompileError> {
        // Wrap the expression so the full parser can be reused.
        let unit = crate::parse(&format!("int main() {{ return {}; }}", expr)).unwrap();
        let crate::ast::GlobalItem::FuncDef(func) = &unit.items[0] else {
            unreachable!();
        };
        let crate::ast::BlockItem::Stmt(crate::ast::Stmt::Return { expr: Some(e) }) =
            &func.block.items[0]
        else {
            unreachable!();
        };
        const_eval(e, &SymbolTable::new())
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval_src("1 + 2 * 3").unwrap(), 7);
        assert_eq!(eval_src("(1 + 2) * 3").unwrap(), 9);
        assert_eq!(eval_src("7 / 2").unwrap(), 3);
        assert_eq!(eval_src("-7 % 3").unwrap(), -1);
    }

    #[test]
    fn logic_returns_zero_or_one() {
        assert_eq!(eval_src("2 && 3").unwrap(), 1);
        assert_eq!(eval_src("0 || 0").unwrap(), 0);
        assert_eq!(eval_src("!5").unwrap(), 0);
        assert_eq!(eval_src("!0").unwrap(), 1);
        assert_eq!(eval_src("3 < 1 || 2 >= 2").unwrap(), 1);
    }

    #[test]
    fn named_constants_fold() {
        let mut tab = SymbolTable::new();
        tab.add("N", SymbolInfo::Const(5)).unwrap();
        let expr = Expr::Binary {
            op: BinaryOp::Mul,
            lhs: Box::new(Expr::LVal("N".into())),
            rhs: Box::new(Expr::Number(3)),
        };
        assert_eq!(const_eval(&expr, &tab).unwrap(), 15);
    }

    #[test]
    fn non_constants_are_rejected() {
        let mut tab = SymbolTable::new();
        tab.add(
            "x",
            SymbolInfo::Var {
                ir_name: "@x_1_1".into(),
                is_global: false,
            },
        )
        .unwrap();
        let expr = Expr::LVal("x".into());
        assert!(matches!(
            const_eval(&expr, &tab),
            Err(CompileError::NonConstInConstContext(_))
        ));
        assert!(matches!(
            eval_src("1 / 0"),
            Err(CompileError::NonConstInConstContext(_))
        ));
    }
}
