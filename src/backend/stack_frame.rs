use std::cmp::max;
use std::collections::HashMap;

use koopa::ir::entities::ValueKind;
use koopa::ir::{FunctionData, Value};

pub const WORD_SIZE: i32 = 4;

/// Per-function stack frame layout, lowest address first:
///
/// ```text
/// sp ->  argument overflow zone   (outgoing args 8, 9, ...)
///        local/SSA slot zone      (one word per value-producing inst)
///        saved ra                 (present iff the function calls)
/// ```
///
/// The total is rounded up to 16 bytes.
pub struct StackFrame {
    value_offset: HashMap<Value, i32>,
    frame_size: i32,
    ra_offset: Option<i32>,
}

impl StackFrame {
    /// Scans `func` and assigns a slot to every value-producing
    /// instruction (allocs included) in program order.
    pub fn analyze(func: &FunctionData) -> Self {
        let mut has_call = false;
        let mut max_args = 0;
        for (_, node) in func.layout().bbs() {
            for &inst in node.insts().keys() {
                if let ValueKind::Call(call) = func.dfg().value(inst).kind() {
                    has_call = true;
                    max_args = max(max_args, call.args().len());
                }
            }
        }
        let arg_bytes = max(0, max_args as i32 - 8) * WORD_SIZE;

        let mut value_offset = HashMap::new();
        let mut offset = arg_bytes;
        for (_, node) in func.layout().bbs() {
            for &inst in node.insts().keys() {
                if func.dfg().value(inst).ty().is_unit() {
                    continue;
                }
                value_offset.insert(inst, offset);
                offset += WORD_SIZE;
            }
        }

        let ra_bytes = if has_call { WORD_SIZE } else { 0 };
        let frame_size = (offset + ra_bytes + 15) & !15;
        StackFrame {
            value_offset,
            frame_size,
            ra_offset: has_call.then(|| frame_size - WORD_SIZE),
        }
    }

    /// Stack offset of an instruction's slot, relative to `sp`.
    pub fn offset_of(&self, value: Value) -> Option<i32> {
        self.value_offset.get(&value).copied()
    }

    pub fn size(&self) -> i32 {
        self.frame_size
    }

    /// Offset of the saved return address, if any call forces one.
    pub fn ra_offset(&self) -> Option<i32> {
        self.ra_offset
    }
}

impl Default for StackFrame {
    fn default() -> Self {
        StackFrame {
            value_offset: HashMap::new(),
            frame_size: 0,
            ra_offset: None,
        }
    }
}
