use std::collections::{HashMap, VecDeque};

/// A basic block recovered from the linear instruction list.
struct Block {
    label: String,
    insts: Vec<String>,
    succs: Vec<String>,
    reachable: bool,
}

/// Removes basic blocks that cannot be reached from `%entry` and prints
/// the survivors with two-space indentation.
///
/// The emitter routinely leaves behind empty tail blocks (an `if` whose
/// branches both return, a `while` whose body never falls through), and
/// external producers of IR may do the same; this pass cleans both up.
/// Within a block, printing stops after the first `ret` so leaked
/// post-terminator instructions are dropped as well. The pass is
/// idempotent.
pub fn eliminate(lines: &[String]) -> String {
    let mut blocks = build_cfg(lines);
    mark_reachable(&mut blocks);

    let mut out = String::new();
    for block in &blocks {
        if !block.reachable {
            continue;
        }
        out.push_str(&block.label);
        out.push_str(":\n");
        for inst in &block.insts {
            out.push_str("  ");
            out.push_str(inst);
            out.push('\n');
            if inst == "ret" || inst.starts_with("ret ") {
                break;
            }
        }
    }
    out
}

/// Groups lines into labelled blocks and records successor edges from
/// `jump` and `br`; `ret` has no successors.
fn build_cfg(lines: &[String]) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for raw in lines {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('%') && line.ends_with(':') {
            blocks.push(Block {
                label: line[..line.len() - 1].to_string(),
                insts: Vec::new(),
                succs: Vec::new(),
                reachable: false,
            });
            continue;
        }
        let Some(block) = blocks.last_mut() else {
            // Instructions before the first label would be unreachable
            // anyway; the emitter always opens with `%entry:`.
            continue;
        };
        block.insts.push(line.to_string());
        if let Some(target) = line.strip_prefix("jump ") {
            block.succs.push(target.trim().to_string());
        } else if line.starts_with("br ") {
            // br cond, %then, %else
            let mut parts = line.splitn(3, ',');
            parts.next();
            for target in parts {
                block.succs.push(target.trim().to_string());
            }
        }
    }
    blocks
}

/// Breadth-first reachability from `%entry`.
fn mark_reachable(blocks: &mut [Block]) {
    let index: HashMap<String, usize> = blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.label.clone(), i))
        .collect();
    let Some(&entry) = index.get("%entry") else {
        return;
    };

    let mut queue = VecDeque::new();
    blocks[entry].reachable = true;
    queue.push_back(entry);
    while let Some(i) = queue.pop_front() {
        let succs = blocks[i].succs.clone();
        for succ in succs {
            if let Some(&j) = index.get(&succ) {
                if !blocks[j].reachable {
                    blocks[j].reachable = true;
                    queue.push_back(j);
                }
            }
        }
    }
}
