pub mod ast;
pub mod backend;
pub mod error;
pub mod frontend;

use lalrpop_util::lalrpop_mod;

lalrpop_mod! {
    #[allow(clippy::all)]
    pub sysy
}

use error::CompileError;

/// Parses SysY source text into an AST.
pub fn parse(input: &str) -> Result<ast::CompUnit, CompileError> {
    sysy::CompUnitParser::new()
        .parse(input)
        .map_err(|e| CompileError::Syntax(e.to_string()))
}

/// Compiles SysY source text down to Koopa IR text.
///
/// Runs the semantic checker before emission, so emission itself only
/// fails on internal inconsistencies.
pub fn compile_to_ir(input: &str) -> Result<String, CompileError> {
    let unit = parse(input)?;
    frontend::sema::check(&unit)?;
    frontend::generate_ir(&unit)
}

/// Compiles SysY source text all the way to RV32 assembly text.
pub fn compile_to_riscv(input: &str) -> Result<String, CompileError> {
    let ir = compile_to_ir(input)?;
    backend::generate_asm(&ir)
}
