//! Properties of the emitted Koopa IR: block termination, SSA naming,
//! reachability, constant folding and the short-circuit scaffolding.

use sysyc::compile_to_ir;

/// The end-to-end scenarios the compiler must accept.
const SCENARIOS: [&str; 8] = [
    "int main() { return 1 + 2 * 3; }",
    "int main() { int a = 10; a = a - 3; return a; }",
    "int main() { const int N = 5; int s = 0; int i = 1; \
     while (i <= N) { s = s + i; i = i + 1; } return s; }",
    "int main() { int x = 0; if (1 && 0) x = 1; else x = 2; return x; }",
    "int main() { int x = 3; if (x > 0) return x; else return -x; }",
    "int g = 42; int main() { return g; }",
    "int f(int n) { if (n <= 1) return n; return f(n - 1) + f(n - 2); } \
     int main() { return f(10); }",
    "int main() { int i = 0; while (1) { if (i == 3) break; i = i + 1; } return i; }",
];

fn ir(src: &str) -> String {
    compile_to_ir(src).expect("program should compile")
}

/// Splits the module text into per-function instruction line lists.
fn functions(ir: &str) -> Vec<Vec<String>> {
    let mut funcs = Vec::new();
    let mut current: Option<Vec<String>> = None;
    for line in ir.lines() {
        if line.starts_with("fun ") {
            current = Some(Vec::new());
        } else if line.starts_with('}') {
            if let Some(body) = current.take() {
                funcs.push(body);
            }
        } else if let Some(body) = current.as_mut() {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                body.push(trimmed.to_string());
            }
        }
    }
    funcs
}

/// Splits a function body into (label, instructions) blocks.
fn blocks(body: &[String]) -> Vec<(String, Vec<String>)> {
    let mut out: Vec<(String, Vec<String>)> = Vec::new();
    for line in body {
        if line.starts_with('%') && line.ends_with(':') {
            out.push((line[..line.len() - 1].to_string(), Vec::new()));
        } else if let Some((_, insts)) = out.last_mut() {
            insts.push(line.clone());
        }
    }
    out
}

fn is_terminator(inst: &str) -> bool {
    inst == "ret"
        || inst.starts_with("ret ")
        || inst.starts_with("jump ")
        || inst.starts_with("br ")
}

#[test]
fn every_block_ends_in_exactly_one_terminator() {
    for src in SCENARIOS {
        let text = ir(src);
        for body in functions(&text) {
            for (label, insts) in blocks(&body) {
                let terminators = insts.iter().filter(|i| is_terminator(i)).count();
                assert_eq!(terminators, 1, "block {} in {}", label, text);
                assert!(
                    is_terminator(insts.last().unwrap()),
                    "block {} does not end in a terminator:\n{}",
                    label,
                    text
                );
            }
        }
    }
}

#[test]
fn ssa_names_are_assigned_at_most_once_per_function() {
    for src in SCENARIOS {
        let text = ir(src);
        for body in functions(&text) {
            let mut seen = std::collections::HashSet::new();
            for inst in &body {
                if let Some((lhs, _)) = inst.split_once(" = ") {
                    assert!(
                        seen.insert(lhs.to_string()),
                        "`{}` defined twice:\n{}",
                        lhs,
                        text
                    );
                }
            }
        }
    }
}

#[test]
fn every_emitted_block_is_reachable_from_entry() {
    for src in SCENARIOS {
        let text = ir(src);
        for body in functions(&text) {
            let all = blocks(&body);
            let terminators: Vec<&String> = all
                .iter()
                .flat_map(|(_, insts)| insts.iter().filter(|i| is_terminator(i)))
                .collect();
            for (label, _) in &all {
                if label == "%entry" {
                    continue;
                }
                assert!(
                    terminators.iter().any(|t| t.contains(label.as_str())),
                    "block {} has no incoming edge:\n{}",
                    label,
                    text
                );
            }
        }
    }
}

#[test]
fn constant_returns_fold_to_literals() {
    assert!(ir("int main() { return 1 + 2 * 3; }").contains("ret 7"));
    assert!(ir("int main() { const int N = 5; return N * N; }").contains("ret 25"));
    assert!(ir("int main() { return !42; }").contains("ret 0"));
}

#[test]
fn logical_operators_short_circuit() {
    // The right operand must be evaluated in its own branch arm, not in
    // the block that computes the left operand.
    let text = ir(
        "int side(int x) { return x; } \
         int main() { int r = side(1) && side(2); return r; }",
    );
    let body = functions(&text).pop().unwrap();
    let all = blocks(&body);
    let entry = &all[0];
    assert_eq!(entry.0, "%entry");
    let entry_calls = entry.1.iter().filter(|i| i.contains("call @side")).count();
    assert_eq!(entry_calls, 1, "lhs call only:\n{}", text);
    let arm_calls: usize = all[1..]
        .iter()
        .map(|(_, insts)| insts.iter().filter(|i| i.contains("call @side")).count())
        .sum();
    assert_eq!(arm_calls, 1, "rhs call in an arm:\n{}", text);
}

#[test]
fn dead_tail_blocks_are_removed() {
    // Both branches return, so the merge block is unreachable and must
    // not survive.
    let text = ir("int main() { int x = 3; if (x > 0) return x; else return -x; }");
    for body in functions(&text) {
        for (label, _) in blocks(&body) {
            assert!(
                !label.starts_with("%end"),
                "unreachable merge block survived:\n{}",
                text
            );
        }
    }
}

#[test]
fn library_declarations_head_the_module() {
    let text = ir("int main() { putint(getint()); return 0; }");
    assert!(text.starts_with("decl @getint(): i32\n"));
    assert!(text.contains("decl @putarray(i32, *i32)"));
    assert!(text.contains("decl @stoptime()"));
}

#[test]
fn globals_are_emitted_with_their_initialisers() {
    let text = ir("int g = 42; int z; int main() { g = z; return g; }");
    assert!(text.contains("global @g = alloc i32, 42"));
    assert!(text.contains("global @z = alloc i32, zeroinit"));
    // Globals precede function definitions.
    assert!(text.find("global @g").unwrap() < text.find("fun @main").unwrap());
}

#[test]
fn parameters_are_homed_into_local_cells() {
    let text = ir("int f(int a, int b) { return a + b; } int main() { return f(1, 2); }");
    assert!(text.contains("fun @f(@a: i32, @b: i32): i32"));
    assert!(text.contains("%a = alloc i32"));
    assert!(text.contains("store @a, %a"));
    assert!(text.contains("store @b, %b"));
}

#[test]
fn statements_after_a_terminator_emit_no_ir() {
    let text = ir("int main() { return 1; putint(0); return 2; }");
    assert!(!text.contains("call @putint"));
    assert!(!text.contains("ret 2"));
}

#[test]
fn void_functions_get_an_implicit_return() {
    let text = ir("void f() { putint(1); } int main() { f(); return 0; }");
    let body = &functions(&text)[0];
    assert_eq!(body.last().unwrap(), "ret");
}
