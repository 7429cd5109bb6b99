use koopa::ir::entities::ValueData;
use koopa::ir::values::BinaryOp;
use koopa::ir::{FunctionData, Program, Value, ValueKind};

use crate::error::CompileError;

use super::riscv_context::RiscvContext;
use super::stack_frame::WORD_SIZE;

pub type Result<T> = std::result::Result<T, CompileError>;

/// Trait for translating Koopa IR entities to RISC-V text.
pub trait GenerateRiscv {
    fn generate<'a>(&'a self, ctx: &mut RiscvContext<'a>) -> Result<()>;
}

impl GenerateRiscv for Program {
    fn generate<'a>(&'a self, ctx: &mut RiscvContext<'a>) -> Result<()> {
        // Globals first, in one .data section.
        ctx.write_inst(format_args!(".data"));
        for &global in self.inst_layout() {
            let data = self.borrow_value(global);
            let name = data
                .name()
                .as_ref()
                .ok_or_else(|| CompileError::IrParse("unnamed global value".to_string()))?
                .trim_start_matches('@')
                .to_string();
            ctx.write_inst(format_args!(".globl {}", name));
            ctx.write_line(&format!("{}:", name));
            let ValueKind::GlobalAlloc(alloc) = data.kind() else {
                return Err(CompileError::IrParse(format!(
                    "global `{}` is not an allocation",
                    name
                )));
            };
            match self.borrow_value(alloc.init()).kind() {
                ValueKind::Integer(int) => {
                    ctx.write_inst(format_args!(".word {}", int.value()));
                }
                ValueKind::ZeroInit(_) => {
                    ctx.write_inst(format_args!(".zero {}", WORD_SIZE));
                }
                _ => {
                    return Err(CompileError::IrParse(format!(
                        "unsupported initialiser for global `{}`",
                        name
                    )));
                }
            }
        }

        for &func in self.func_layout() {
            let func_data = self.func(func);
            // Declarations (the runtime library) have no entry block.
            if func_data.layout().entry_bb().is_none() {
                continue;
            }
            ctx.set_func(func);
            func_data.generate(ctx)?;
        }
        Ok(())
    }
}

impl GenerateRiscv for FunctionData {
    fn generate<'a>(&'a self, ctx: &mut RiscvContext<'a>) -> Result<()> {
        let name = self.name().trim_start_matches('@');
        ctx.write_inst(format_args!(".text"));
        ctx.write_inst(format_args!(".globl {}", name));
        ctx.write_line(&format!("{}:", name));
        ctx.emit_prologue();

        let entry = ctx.entry_bb();
        for (&bb, node) in self.layout().bbs() {
            // The function label doubles as the entry label.
            if Some(bb) != entry {
                let label = ctx.bb_label(bb).to_string();
                ctx.write_line(&format!("{}:", label));
            }
            for &inst in node.insts().keys() {
                generate_inst(ctx, inst, self.dfg().value(inst))?;
            }
        }
        Ok(())
    }
}

/// Emits one instruction. Every operand is rematerialised from its
/// stack slot (or as an immediate) into a rotating temporary; every
/// produced value is spilled back to its slot straight away.
fn generate_inst<'a>(
    ctx: &mut RiscvContext<'a>,
    inst: Value,
    data: &'a ValueData,
) -> Result<()> {
    match data.kind() {
        // Integers appear inline as operands; the frame already covers
        // allocs.
        ValueKind::Integer(_) | ValueKind::Alloc(_) => {}

        ValueKind::Load(load) => {
            let src = load.src();
            let reg = ctx.next_reg();
            if src.is_global() {
                let name = global_name(ctx, src)?;
                ctx.write_inst(format_args!("la {}, {}", reg, name));
                ctx.write_inst(format_args!("lw {}, 0({})", reg, reg));
            } else {
                ctx.load_value_to_reg(src, reg)?;
            }
            ctx.save_to_slot(inst, reg)?;
        }

        ValueKind::Store(store) => {
            let reg = ctx.load_operand(store.value())?;
            let dest = store.dest();
            if dest.is_global() {
                let name = global_name(ctx, dest)?;
                let addr = ctx.next_reg();
                ctx.write_inst(format_args!("la {}, {}", addr, name));
                ctx.write_inst(format_args!("sw {}, 0({})", reg, addr));
            } else {
                ctx.save_to_slot(dest, reg)?;
            }
        }

        ValueKind::Binary(bin) => {
            let lhs = ctx.load_operand(bin.lhs())?;
            let rhs = ctx.load_operand(bin.rhs())?;
            let rd = ctx.next_reg();
            match bin.op() {
                BinaryOp::Eq => {
                    ctx.write_inst(format_args!("xor {}, {}, {}", rd, lhs, rhs));
                    ctx.write_inst(format_args!("seqz {}, {}", rd, rd));
                }
                BinaryOp::NotEq => {
                    ctx.write_inst(format_args!("xor {}, {}, {}", rd, lhs, rhs));
                    ctx.write_inst(format_args!("snez {}, {}", rd, rd));
                }
                BinaryOp::Le => {
                    ctx.write_inst(format_args!("sgt {}, {}, {}", rd, lhs, rhs));
                    ctx.write_inst(format_args!("xori {}, {}, 1", rd, rd));
                }
                BinaryOp::Ge => {
                    ctx.write_inst(format_args!("slt {}, {}, {}", rd, lhs, rhs));
                    ctx.write_inst(format_args!("xori {}, {}, 1", rd, rd));
                }
                op => {
                    let name = binary_inst_name(op);
                    ctx.write_inst(format_args!("{} {}, {}, {}", name, rd, lhs, rhs));
                }
            }
            ctx.save_to_slot(inst, rd)?;
        }

        ValueKind::Branch(branch) => {
            let cond = ctx.load_operand(branch.cond())?;
            let true_label = ctx.bb_label(branch.true_bb()).to_string();
            let false_label = ctx.bb_label(branch.false_bb()).to_string();
            ctx.write_inst(format_args!("bnez {}, {}", cond, true_label));
            ctx.write_inst(format_args!("j {}", false_label));
        }

        ValueKind::Jump(jump) => {
            let label = ctx.bb_label(jump.target()).to_string();
            ctx.write_inst(format_args!("j {}", label));
        }

        ValueKind::Call(call) => {
            // First eight arguments in a0..a7, the rest in the overflow
            // zone at the bottom of our frame.
            for (i, &arg) in call.args().iter().enumerate() {
                if i < 8 {
                    let reg = format!("a{}", i);
                    ctx.load_value_to_reg(arg, &reg)?;
                } else {
                    let reg = ctx.load_operand(arg)?;
                    ctx.store_word(reg, (i as i32 - 8) * WORD_SIZE);
                }
            }
            let callee = ctx
                .program
                .func(call.callee())
                .name()
                .trim_start_matches('@')
                .to_string();
            ctx.write_inst(format_args!("call {}", callee));
            if !data.ty().is_unit() {
                ctx.save_to_slot(inst, "a0")?;
            }
        }

        ValueKind::Return(ret) => {
            if let Some(value) = ret.value() {
                ctx.load_value_to_reg(value, "a0")?;
            }
            ctx.emit_epilogue();
            ctx.write_inst(format_args!("ret"));
        }

        _ => {
            return Err(CompileError::UnsupportedOperator(
                "instruction kind not supported by the rv32 backend".to_string(),
            ));
        }
    }
    Ok(())
}

/// Assembly-level name of a global, without the `@` prefix.
fn global_name(ctx: &RiscvContext, value: Value) -> Result<String> {
    ctx.program
        .borrow_value(value)
        .name()
        .as_ref()
        .map(|name| name.trim_start_matches('@').to_string())
        .ok_or_else(|| CompileError::IrParse("unnamed global value".to_string()))
}

fn binary_inst_name(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::Div => "div",
        BinaryOp::Mod => "rem",
        BinaryOp::Lt => "slt",
        BinaryOp::Gt => "sgt",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        BinaryOp::Xor => "xor",
        BinaryOp::Shl => "sll",
        BinaryOp::Shr => "srl",
        BinaryOp::Sar => "sra",
        // Handled with their two-instruction sequences above.
        BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Le | BinaryOp::Ge => {
            unreachable!("comparison ops are expanded separately")
        }
    }
}
