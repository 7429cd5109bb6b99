use super::symbol_table::SymbolTable;

/// Mutable state threaded through IR emission.
///
/// Holds the per-function instruction buffer and SSA counter, the
/// break/continue target stacks, and the module-level accumulators for
/// globals and finished functions. Everything per-function is reset by
/// `begin_function`.
pub struct IrContext {
    pub symbols: SymbolTable,
    lines: Vec<String>,
    temp_id: u32,
    break_stack: Vec<String>,
    continue_stack: Vec<String>,
    terminated: bool,
    globals: Vec<String>,
    funcs: Vec<String>,
}

impl IrContext {
    pub fn new() -> Self {
        IrContext {
            symbols: SymbolTable::new(),
            lines: Vec::new(),
            temp_id: 0,
            break_stack: Vec::new(),
            continue_stack: Vec::new(),
            terminated: false,
            globals: Vec::new(),
            funcs: Vec::new(),
        }
    }

    /// Resets the per-function state: instruction buffer, SSA counter,
    /// termination flag and local cell numbering.
    pub fn begin_function(&mut self) {
        self.lines.clear();
        self.temp_id = 0;
        self.terminated = false;
        self.symbols.reset_var_cnt();
    }

    /// Appends an ordinary (non-terminating) instruction.
    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    /// Appends `ret`, `jump` or `br` and marks the current block closed.
    pub fn push_terminator(&mut self, line: String) {
        self.lines.push(line);
        self.terminated = true;
    }

    /// Starts a new basic block; `label` includes the leading `%`.
    pub fn push_label(&mut self, label: &str) {
        self.lines.push(format!("{}:", label));
        self.terminated = false;
    }

    /// Whether the block being emitted already ends in a terminator.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Mints a fresh SSA temporary `%<n>`.
    pub fn new_temp(&mut self) -> String {
        let id = self.temp_id;
        self.temp_id += 1;
        format!("%{}", id)
    }

    /// Mints a fresh block label `%<base>_<n>`; labels share the SSA
    /// counter, so every name stays unique within the function.
    pub fn new_label(&mut self, base: &str) -> String {
        let id = self.temp_id;
        self.temp_id += 1;
        format!("%{}_{}", base, id)
    }

    pub fn enter_loop(&mut self, break_to: String, continue_to: String) {
        self.break_stack.push(break_to);
        self.continue_stack.push(continue_to);
    }

    pub fn exit_loop(&mut self) {
        self.break_stack.pop();
        self.continue_stack.pop();
    }

    pub fn break_target(&self) -> Option<&String> {
        self.break_stack.last()
    }

    pub fn continue_target(&self) -> Option<&String> {
        self.continue_stack.last()
    }

    /// Hands out the accumulated body of the current function.
    pub fn take_function_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    pub fn add_global(&mut self, line: String) {
        self.globals.push(line);
    }

    pub fn add_func(&mut self, text: String) {
        self.funcs.push(text);
    }

    pub fn globals(&self) -> &[String] {
        &self.globals
    }

    pub fn funcs(&self) -> &[String] {
        &self.funcs
    }
}
