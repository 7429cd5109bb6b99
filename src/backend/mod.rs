//! Backend of the compiler: parses Koopa IR text and emits RV32
//! assembly with a stack-resident calling convention.

mod riscv_context;
mod riscv_generator;
mod stack_frame;

use koopa::front::Driver;
use koopa::ir::Type;

use crate::error::CompileError;
use riscv_context::RiscvContext;
use riscv_generator::GenerateRiscv;

/// Translates a Koopa IR module (text form) to RV32 assembly text.
///
/// The IR may come from this crate's frontend or from any other
/// producer; parse failures surface as [`CompileError::IrParse`].
pub fn generate_asm(ir: &str) -> Result<String, CompileError> {
    // Pointers are 4 bytes on rv32.
    Type::set_ptr_size(4);
    let program = Driver::from(ir.to_string())
        .generate_program()
        .map_err(|e| CompileError::IrParse(format!("{:?}", e)))?;

    let mut ctx = RiscvContext::new(&program);
    program.generate(&mut ctx)?;
    Ok(ctx.into_output())
}
