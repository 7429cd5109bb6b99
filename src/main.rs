use std::env::args;
use std::fs;
use std::process::exit;

use sysyc::error::CompileError;

enum Mode {
    Koopa,
    Riscv,
}

// cmdline: sysyc <mode> <input> -o <output>
fn parse_cmdline() -> Option<(Mode, String, String)> {
    let mut args = args();
    args.next();
    let mode = match args.next()?.as_str() {
        "-koopa" => Mode::Koopa,
        "-riscv" => Mode::Riscv,
        _ => return None,
    };
    let input = args.next()?;
    if args.next()?.as_str() != "-o" {
        return None;
    }
    let output = args.next()?;
    Some((mode, input, output))
}

fn compile() -> Result<(), CompileError> {
    let Some((mode, input, output)) = parse_cmdline() else {
        eprintln!("usage: sysyc <-koopa|-riscv> <input> -o <output>");
        exit(1);
    };

    let source = fs::read_to_string(input)?;
    // Generate into memory first so a compile error leaves no partial
    // output file behind.
    let text = match mode {
        Mode::Koopa => sysyc::compile_to_ir(&source)?,
        Mode::Riscv => sysyc::compile_to_riscv(&source)?,
    };
    fs::write(output, text)?;
    Ok(())
}

fn main() {
    if let Err(e) = compile() {
        eprintln!("error: {}", e);
        exit(1);
    }
}
