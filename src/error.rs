use thiserror::Error;

/// Everything that can abort a compilation. All variants are fatal; the
/// driver reports the first one and exits nonzero.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("undefined identifier `{0}`")]
    UndefinedIdentifier(String),
    #[error("`{0}` is defined multiple times in the same scope")]
    DuplicateDefinition(String),
    #[error("constant expression required, but `{0}` is not constant")]
    NonConstInConstContext(String),
    #[error("cannot assign to `{0}`: not a mutable variable")]
    AssignToConstant(String),
    #[error("operator `{0}` is not supported here")]
    UnsupportedOperator(String),
    #[error("call to `{name}` expects {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("`break` outside of a loop")]
    BreakOutsideLoop,
    #[error("`continue` outside of a loop")]
    ContinueOutsideLoop,
    #[error("failed to parse Koopa IR: {0}")]
    IrParse(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
