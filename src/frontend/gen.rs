use crate::ast::*;
use crate::error::CompileError;

use super::context::IrContext;
use super::dce;
use super::eval::const_eval;
use super::symbol_table::SymbolInfo;

pub type Result<T> = std::result::Result<T, CompileError>;

/// Trait for lowering AST nodes to Koopa IR text.
///
/// Expression nodes return the operand that names their value: an
/// integer literal or an SSA temporary `%<n>`.
pub trait GenerateIr {
    type Out;
    fn generate(&self, ctx: &mut IrContext) -> Result<Self::Out>;
}

impl GenerateIr for CompUnit {
    type Out = ();
    fn generate(&self, ctx: &mut IrContext) -> Result<Self::Out> {
        for item in &self.items {
            match item {
                GlobalItem::Decl(decl) => decl.generate(ctx)?,
                GlobalItem::FuncDef(func) => func.generate(ctx)?,
            }
        }
        Ok(())
    }
}

impl GenerateIr for FuncDef {
    type Out = ();
    fn generate(&self, ctx: &mut IrContext) -> Result<Self::Out> {
        let param_names: Vec<String> =
            self.params.iter().map(|p| p.param_name.clone()).collect();
        ctx.symbols.add(
            &self.func_name,
            SymbolInfo::Func {
                ret_type: self.func_type,
                params: param_names.clone(),
            },
        )?;

        ctx.begin_function();
        ctx.push_label("%entry");

        // Home every parameter into a stack cell so the body can treat
        // it like any other local variable.
        ctx.symbols.enter_scope();
        for name in &param_names {
            let cell = format!("%{}", name);
            ctx.push(format!("{} = alloc i32", cell));
            ctx.push(format!("store @{}, {}", name, cell));
            ctx.symbols.add(
                name,
                SymbolInfo::Var {
                    ir_name: cell,
                    is_global: false,
                },
            )?;
        }

        self.block.generate(ctx)?;
        ctx.symbols.exit_scope();

        // Every block must end in a terminator; a function body that
        // falls off the end gets one here. The block is removed again by
        // the dead-block pass whenever it is unreachable.
        if !ctx.is_terminated() {
            match self.func_type {
                FuncType::Void => ctx.push_terminator("ret".to_string()),
                FuncType::Int => ctx.push_terminator("ret 0".to_string()),
            }
        }

        let lines = ctx.take_function_lines();
        let body = dce::eliminate(&lines);

        let params_text = param_names
            .iter()
            .map(|name| format!("@{}: i32", name))
            .collect::<Vec<_>>()
            .join(", ");
        let ret_text = match self.func_type {
            FuncType::Int => ": i32",
            FuncType::Void => "",
        };
        ctx.add_func(format!(
            "fun @{}({}){} {{\n{}}}\n",
            self.func_name, params_text, ret_text, body
        ));
        Ok(())
    }
}

impl GenerateIr for Block {
    type Out = ();
    fn generate(&self, ctx: &mut IrContext) -> Result<Self::Out> {
        ctx.symbols.enter_scope();
        for item in &self.items {
            match item {
                BlockItem::Decl(decl) => decl.generate(ctx)?,
                BlockItem::Stmt(stmt) => stmt.generate(ctx)?,
            }
            // return/break/continue close the block; anything after them
            // in the source is unreachable and gets no IR.
            if ctx.is_terminated() {
                break;
            }
        }
        ctx.symbols.exit_scope();
        Ok(())
    }
}

impl GenerateIr for Decl {
    type Out = ();
    fn generate(&self, ctx: &mut IrContext) -> Result<Self::Out> {
        match self {
            Decl::Const(decl) => decl.generate(ctx),
            Decl::Var(decl) => decl.generate(ctx),
        }
    }
}

impl GenerateIr for ConstDecl {
    type Out = ();
    fn generate(&self, ctx: &mut IrContext) -> Result<Self::Out> {
        for def in &self.defs {
            let value = const_eval(&def.init, &ctx.symbols)?;
            ctx.symbols.add(&def.name, SymbolInfo::Const(value))?;
        }
        Ok(())
    }
}

impl GenerateIr for VarDecl {
    type Out = ();
    fn generate(&self, ctx: &mut IrContext) -> Result<Self::Out> {
        if ctx.symbols.is_global_scope() {
            for def in &self.defs {
                let ir_name = format!("@{}", def.name);
                let init = match &def.init {
                    Some(expr) => const_eval(expr, &ctx.symbols)?.to_string(),
                    None => "zeroinit".to_string(),
                };
                ctx.add_global(format!("global {} = alloc i32, {}", ir_name, init));
                ctx.symbols.add(
                    &def.name,
                    SymbolInfo::Var {
                        ir_name,
                        is_global: true,
                    },
                )?;
            }
        } else {
            for def in &self.defs {
                let ir_name = ctx.symbols.unique_name(&def.name);
                ctx.push(format!("{} = alloc i32", ir_name));
                ctx.symbols.add(
                    &def.name,
                    SymbolInfo::Var {
                        ir_name: ir_name.clone(),
                        is_global: false,
                    },
                )?;
                if let Some(expr) = &def.init {
                    let value = expr.generate(ctx)?;
                    ctx.push(format!("store {}, {}", value, ir_name));
                }
            }
        }
        Ok(())
    }
}

impl GenerateIr for Stmt {
    type Out = ();
    fn generate(&self, ctx: &mut IrContext) -> Result<Self::Out> {
        match self {
            Stmt::Assign { lval, expr } => {
                let cell = match ctx.symbols.lookup(lval) {
                    None => return Err(CompileError::UndefinedIdentifier(lval.clone())),
                    Some(SymbolInfo::Var { ir_name, .. }) => ir_name.clone(),
                    Some(_) => return Err(CompileError::AssignToConstant(lval.clone())),
                };
                let value = expr.generate(ctx)?;
                ctx.push(format!("store {}, {}", value, cell));
            }
            Stmt::Return { expr } => match expr {
                Some(expr) => {
                    // Constant returns skip the whole expression lowering.
                    if let Ok(value) = const_eval(expr, &ctx.symbols) {
                        ctx.push_terminator(format!("ret {}", value));
                    } else {
                        let value = expr.generate(ctx)?;
                        ctx.push_terminator(format!("ret {}", value));
                    }
                }
                None => ctx.push_terminator("ret".to_string()),
            },
            Stmt::Expression { expr } => {
                if let Some(expr) = expr {
                    expr.generate(ctx)?;
                }
            }
            Stmt::Block { block } => block.generate(ctx)?,
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let then_bb = ctx.new_label("then");
                let else_bb = else_body.as_ref().map(|_| ctx.new_label("else"));
                let end_bb = ctx.new_label("end");

                let cond_val = cond.generate(ctx)?;
                let false_target = else_bb.as_deref().unwrap_or(end_bb.as_str());
                ctx.push_terminator(format!(
                    "br {}, {}, {}",
                    cond_val, then_bb, false_target
                ));

                ctx.push_label(&then_bb);
                then_body.generate(ctx)?;
                if !ctx.is_terminated() {
                    ctx.push_terminator(format!("jump {}", end_bb));
                }

                if let (Some(else_bb), Some(else_body)) = (&else_bb, else_body) {
                    ctx.push_label(else_bb);
                    else_body.generate(ctx)?;
                    if !ctx.is_terminated() {
                        ctx.push_terminator(format!("jump {}", end_bb));
                    }
                }

                ctx.push_label(&end_bb);
            }
            Stmt::While { cond, body } => {
                let cond_bb = ctx.new_label("while_cond");
                let body_bb = ctx.new_label("while_body");
                let end_bb = ctx.new_label("while_end");
                ctx.enter_loop(end_bb.clone(), cond_bb.clone());

                ctx.push_terminator(format!("jump {}", cond_bb));
                ctx.push_label(&cond_bb);
                let cond_val = cond.generate(ctx)?;
                ctx.push_terminator(format!("br {}, {}, {}", cond_val, body_bb, end_bb));

                ctx.push_label(&body_bb);
                body.generate(ctx)?;
                if !ctx.is_terminated() {
                    ctx.push_terminator(format!("jump {}", cond_bb));
                }

                ctx.push_label(&end_bb);
                ctx.exit_loop();
            }
            Stmt::Break => {
                let target = ctx
                    .break_target()
                    .ok_or(CompileError::BreakOutsideLoop)?
                    .clone();
                ctx.push_terminator(format!("jump {}", target));
            }
            Stmt::Continue => {
                let target = ctx
                    .continue_target()
                    .ok_or(CompileError::ContinueOutsideLoop)?
                    .clone();
                ctx.push_terminator(format!("jump {}", target));
            }
        }
        Ok(())
    }
}

impl GenerateIr for Expr {
    type Out = String;
    fn generate(&self, ctx: &mut IrContext) -> Result<Self::Out> {
        match self {
            Expr::Number(n) => Ok(n.to_string()),
            Expr::LVal(name) => {
                let info = ctx
                    .symbols
                    .lookup(name)
                    .cloned()
                    .ok_or_else(|| CompileError::UndefinedIdentifier(name.clone()))?;
                match info {
                    SymbolInfo::Const(v) => Ok(v.to_string()),
                    SymbolInfo::Var { ir_name, .. } => {
                        let tmp = ctx.new_temp();
                        ctx.push(format!("{} = load {}", tmp, ir_name));
                        Ok(tmp)
                    }
                    SymbolInfo::Func { .. } => {
                        Err(CompileError::UndefinedIdentifier(name.clone()))
                    }
                }
            }
            Expr::Unary { op, expr } => {
                let value = expr.generate(ctx)?;
                match op {
                    UnaryOp::Pos => Ok(value),
                    UnaryOp::Neg => {
                        let tmp = ctx.new_temp();
                        ctx.push(format!("{} = sub 0, {}", tmp, value));
                        Ok(tmp)
                    }
                    UnaryOp::Not => {
                        let tmp = ctx.new_temp();
                        ctx.push(format!("{} = eq {}, 0", tmp, value));
                        Ok(tmp)
                    }
                }
            }
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => generate_short_circuit(ctx, lhs, rhs, true),
                BinaryOp::Or => generate_short_circuit(ctx, lhs, rhs, false),
                _ => {
                    let l = lhs.generate(ctx)?;
                    let r = rhs.generate(ctx)?;
                    let tmp = ctx.new_temp();
                    ctx.push(format!("{} = {} {}, {}", tmp, binary_op_name(*op), l, r));
                    Ok(tmp)
                }
            },
            Expr::Call { func_name, args } => {
                let (ret_type, expected) = match ctx.symbols.lookup(func_name) {
                    Some(SymbolInfo::Func { ret_type, params }) => (*ret_type, params.len()),
                    _ => return Err(CompileError::UndefinedIdentifier(func_name.clone())),
                };
                if args.len() != expected {
                    return Err(CompileError::ArityMismatch {
                        name: func_name.clone(),
                        expected,
                        found: args.len(),
                    });
                }

                let mut arg_vals = Vec::with_capacity(args.len());
                for arg in args {
                    arg_vals.push(arg.generate(ctx)?);
                }
                let arg_text = arg_vals.join(", ");
                match ret_type {
                    FuncType::Void => {
                        ctx.push(format!("call @{}({})", func_name, arg_text));
                        Ok(String::new())
                    }
                    FuncType::Int => {
                        let tmp = ctx.new_temp();
                        ctx.push(format!("{} = call @{}({})", tmp, func_name, arg_text));
                        Ok(tmp)
                    }
                }
            }
        }
    }
}

/// Lowers `a && b` (`is_and`) or `a || b` with short-circuit control
/// flow. The result lands in a scratch cell that both arms store to and
/// the join block loads from; only the arm that is actually taken
/// evaluates `b`.
fn generate_short_circuit(
    ctx: &mut IrContext,
    lhs: &Expr,
    rhs: &Expr,
    is_and: bool,
) -> Result<String> {
    let result_cell = ctx.symbols.unique_name("logic_tmp");
    ctx.push(format!("{} = alloc i32", result_cell));

    let lhs_val = lhs.generate(ctx)?;
    let lhs_cond = ctx.new_temp();
    ctx.push(format!("{} = ne {}, 0", lhs_cond, lhs_val));

    let true_bb = ctx.new_label("logic_true");
    let false_bb = ctx.new_label("logic_false");
    let end_bb = ctx.new_label("logic_end");
    ctx.push_terminator(format!("br {}, {}, {}", lhs_cond, true_bb, false_bb));

    // The arm whose outcome is already decided stores the constant; the
    // other one evaluates the right operand.
    let (decided_bb, decided_val, eval_bb) = if is_and {
        (&false_bb, 0, &true_bb)
    } else {
        (&true_bb, 1, &false_bb)
    };

    ctx.push_label(decided_bb);
    ctx.push(format!("store {}, {}", decided_val, result_cell));
    ctx.push_terminator(format!("jump {}", end_bb));

    ctx.push_label(eval_bb);
    let rhs_val = rhs.generate(ctx)?;
    let rhs_cond = ctx.new_temp();
    ctx.push(format!("{} = ne {}, 0", rhs_cond, rhs_val));
    ctx.push(format!("store {}, {}", rhs_cond, result_cell));
    ctx.push_terminator(format!("jump {}", end_bb));

    ctx.push_label(&end_bb);
    let result = ctx.new_temp();
    ctx.push(format!("{} = load {}", result, result_cell));
    Ok(result)
}

fn binary_op_name(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::Div => "div",
        BinaryOp::Mod => "mod",
        BinaryOp::Lt => "lt",
        BinaryOp::Gt => "gt",
        BinaryOp::Leq => "le",
        BinaryOp::Geq => "ge",
        BinaryOp::Eq => "eq",
        BinaryOp::Neq => "ne",
        // Short-circuit operators never reach the plain binary path.
        BinaryOp::And | BinaryOp::Or => unreachable!(),
    }
}
