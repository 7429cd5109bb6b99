use std::collections::HashMap;
use std::fmt;

use koopa::ir::entities::ValueData;
use koopa::ir::{BasicBlock, Function, FunctionData, Program, Value, ValueKind};

use crate::error::CompileError;

use super::stack_frame::{StackFrame, WORD_SIZE};

const MAX_IMM_12: i32 = 2047; // largest positive 12-bit signed immediate

/// The rotating temporary pool. Correctness does not depend on which
/// register comes up: every live value is spilled to its stack slot
/// right after the instruction that produces it.
const TEMP_REGS: [&str; 7] = ["t0", "t1", "t2", "t3", "t4", "t5", "t6"];

/// Context for RISC-V code generation: output buffer, current function
/// frame, basic block labels and the temp register rotation.
pub struct RiscvContext<'a> {
    out: String,
    pub program: &'a Program,
    current_func: Option<Function>,
    frame: StackFrame,
    reg_cnt: usize,
    bb_labels: HashMap<BasicBlock, String>,
}

impl<'a> RiscvContext<'a> {
    pub fn new(program: &'a Program) -> Self {
        RiscvContext {
            out: String::new(),
            program,
            current_func: None,
            frame: StackFrame::default(),
            reg_cnt: 0,
            bb_labels: HashMap::new(),
        }
    }

    pub fn into_output(self) -> String {
        self.out
    }

    pub fn write_line(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push('\n');
    }

    /// Writes an instruction or directive line with indentation.
    pub fn write_inst(&mut self, args: fmt::Arguments) {
        self.out.push_str("  ");
        self.out.push_str(&args.to_string());
        self.out.push('\n');
    }

    /// Enters a function: resets the register rotation, computes the
    /// stack frame and names every basic block. Labels are prefixed with
    /// the function name so that two functions reusing the same IR label
    /// cannot collide in the assembly file; the entry block maps to the
    /// function label itself.
    pub fn set_func(&mut self, func: Function) {
        self.current_func = Some(func);
        self.reg_cnt = 0;
        let data = self.program.func(func);
        self.frame = StackFrame::analyze(data);

        let func_name = data.name().trim_start_matches('@').to_string();
        self.bb_labels.clear();
        let mut index = 0;
        for (&bb, _) in data.layout().bbs() {
            let label = match data.dfg().bb(bb).name() {
                Some(name) if name.as_str() == "%entry" => func_name.clone(),
                Some(name) => {
                    format!("{}_{}", func_name, name.trim_start_matches('%'))
                }
                None => format!("{}_bb{}", func_name, index),
            };
            self.bb_labels.insert(bb, label);
            index += 1;
        }
    }

    pub fn func_data(&self) -> &'a FunctionData {
        let func = self
            .current_func
            .expect("current function is not set in RiscvContext");
        self.program.func(func)
    }

    pub fn value_data(&self, value: Value) -> &'a ValueData {
        self.func_data().dfg().value(value)
    }

    pub fn entry_bb(&self) -> Option<BasicBlock> {
        self.func_data().layout().entry_bb()
    }

    pub fn bb_label(&self, bb: BasicBlock) -> &str {
        self.bb_labels
            .get(&bb)
            .expect("basic block has no label in RiscvContext")
    }

    /// Picks the next register from the rotating pool.
    pub fn next_reg(&mut self) -> &'static str {
        let reg = TEMP_REGS[self.reg_cnt % TEMP_REGS.len()];
        self.reg_cnt += 1;
        reg
    }

    /// `lw reg, offset(sp)`, detouring through a scratch register when
    /// the offset exceeds the 12-bit immediate range.
    pub fn load_word(&mut self, reg: &str, offset: i32) {
        if offset > MAX_IMM_12 {
            let scratch = self.next_reg();
            self.write_inst(format_args!("li {}, {}", scratch, offset));
            self.write_inst(format_args!("add {}, sp, {}", scratch, scratch));
            self.write_inst(format_args!("lw {}, 0({})", reg, scratch));
        } else {
            self.write_inst(format_args!("lw {}, {}(sp)", reg, offset));
        }
    }

    /// `sw reg, offset(sp)`, with the same large-offset detour.
    pub fn store_word(&mut self, reg: &str, offset: i32) {
        if offset > MAX_IMM_12 {
            let scratch = self.next_reg();
            self.write_inst(format_args!("li {}, {}", scratch, offset));
            self.write_inst(format_args!("add {}, sp, {}", scratch, scratch));
            self.write_inst(format_args!("sw {}, 0({})", reg, scratch));
        } else {
            self.write_inst(format_args!("sw {}, {}(sp)", reg, offset));
        }
    }

    /// Materialises `value` into `reg`: integers with `li`, incoming
    /// arguments from `a0..a7` or the caller's frame, everything else
    /// from its own stack slot.
    pub fn load_value_to_reg(&mut self, value: Value, reg: &str) -> Result<(), CompileError> {
        match self.value_data(value).kind() {
            ValueKind::Integer(int) => {
                let v = int.value();
                self.write_inst(format_args!("li {}, {}", reg, v));
            }
            ValueKind::FuncArgRef(arg) => {
                let index = arg.index() as i32;
                if index < 8 {
                    self.write_inst(format_args!("mv {}, a{}", reg, index));
                } else {
                    // Beyond the eighth argument: the caller left it in
                    // its own overflow zone, just above our frame.
                    let offset = self.frame.size() + (index - 8) * WORD_SIZE;
                    self.load_word(reg, offset);
                }
            }
            _ => {
                let offset = self.slot_of(value)?;
                self.load_word(reg, offset);
            }
        }
        Ok(())
    }

    /// Materialises `value` into a register from the rotating pool.
    pub fn load_operand(&mut self, value: Value) -> Result<&'static str, CompileError> {
        let reg = self.next_reg();
        self.load_value_to_reg(value, reg)?;
        Ok(reg)
    }

    /// Spills the result of `value` from `reg` back to its stack slot.
    pub fn save_to_slot(&mut self, value: Value, reg: &str) -> Result<(), CompileError> {
        let offset = self.slot_of(value)?;
        self.store_word(reg, offset);
        Ok(())
    }

    fn slot_of(&self, value: Value) -> Result<i32, CompileError> {
        self.frame.offset_of(value).ok_or_else(|| {
            CompileError::IrParse("instruction result has no stack slot".to_string())
        })
    }

    /// Reserves the frame and saves `ra` when the function makes calls.
    pub fn emit_prologue(&mut self) {
        let size = self.frame.size();
        if size == 0 {
            return;
        }
        if size > MAX_IMM_12 {
            self.write_inst(format_args!("li t0, {}", -size));
            self.write_inst(format_args!("add sp, sp, t0"));
        } else {
            self.write_inst(format_args!("addi sp, sp, -{}", size));
        }
        if let Some(ra_offset) = self.frame.ra_offset() {
            self.store_word("ra", ra_offset);
        }
    }

    /// Restores `ra` and the stack pointer; emitted before every `ret`.
    pub fn emit_epilogue(&mut self) {
        let size = self.frame.size();
        if size == 0 {
            return;
        }
        if let Some(ra_offset) = self.frame.ra_offset() {
            self.load_word("ra", ra_offset);
        }
        if size > MAX_IMM_12 {
            self.write_inst(format_args!("li t0, {}", size));
            self.write_inst(format_args!("add sp, sp, t0"));
        } else {
            self.write_inst(format_args!("addi sp, sp, {}", size));
        }
    }
}
