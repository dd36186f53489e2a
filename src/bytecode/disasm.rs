use crate::bytecode::ir::Program;
use crate::bytecode::op::Op;

/// Decodes the instruction stream into `(offset, opcode)` pairs, stepping
/// over operand bytes.
pub fn decode(program: &Program) -> Result<Vec<(usize, Op)>, String> {
    let mut ops = Vec::new();
    let mut at = 0;
    while at < program.code.len() {
        let byte = program.code[at];
        let op = Op::from_byte(byte).ok_or_else(|| format!("invalid opcode {} at {}", byte, at))?;
        if at + 1 + op.operand_len() > program.code.len() {
            return Err(format!("truncated {} operand at {}", op.mnemonic(), at));
        }
        ops.push((at, op));
        at += 1 + op.operand_len();
    }
    Ok(ops)
}

/// Renders a listing of the whole program, labelling rule entry points.
pub fn disassemble(program: &Program) -> Result<String, String> {
    let mut out = String::new();
    for (at, op) in decode(program)? {
        if let Some(name) = program.rule_at(at) {
            out.push_str(&format!("{}:\n", name));
        }
        out.push_str(&format!("{:04}   {:<8}", at, op.mnemonic()));
        match op {
            Op::Push | Op::Done => {
                out.push_str(&format!(" {}", program.code[at + 1]));
            }
            Op::Expect => {
                let lit = program.code[at + 1];
                out.push_str(&format!(" \"{}\"", program.literal(lit).unwrap_or("?")));
            }
            Op::If => {
                let lit = program.code[at + 1];
                let addr = program.read_addr(at + 2).unwrap_or(0);
                out.push_str(&format!(
                    " \"{}\" -> {:04}",
                    program.literal(lit).unwrap_or("?"),
                    addr
                ));
            }
            Op::Call | Op::Jz | Op::Jmp => {
                let addr = program.read_addr(at + 1).unwrap_or(0);
                match program.rule_at(addr as usize) {
                    Some(name) => out.push_str(&format!(" {} ({:04})", name, addr)),
                    None => out.push_str(&format!(" {:04}", addr)),
                }
            }
            _ => {}
        }
        out.push('\n');
    }
    Ok(out)
}

/// Prints the listing for `--bc`.
pub fn print_program(program: &Program) {
    println!("=== BYTECODE PROGRAM ===");
    println!("{} code bytes, {} literals", program.code.len(), program.literals.len());
    match disassemble(program) {
        Ok(listing) => print!("{}", listing),
        Err(e) => eprintln!("disassembly failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::Compiler;
    use crate::frontend::parser::parse_grammar;

    fn compile(source: &str) -> Program {
        let grammar = parse_grammar(source).unwrap();
        Compiler::new().compile(&grammar).unwrap()
    }

    #[test]
    fn test_decode_steps_over_operands() {
        let p = compile("a = \"x\" ;");
        let ops: Vec<Op> = decode(&p).unwrap().into_iter().map(|(_, op)| op).collect();
        assert_eq!(ops, vec![Op::Call, Op::Done, Op::Expect, Op::Return]);
    }

    #[test]
    fn test_decode_rejects_invalid_opcode() {
        let mut p = Program::new();
        p.emit_byte(200).unwrap();
        let err = decode(&p).unwrap_err();
        assert!(err.contains("invalid opcode"), "was: {}", err);
    }

    #[test]
    fn test_decode_rejects_truncated_operand() {
        let mut p = Program::new();
        p.emit_op(Op::Jmp).unwrap();
        p.emit_byte(0).unwrap(); // only half the address
        let err = decode(&p).unwrap_err();
        assert!(err.contains("truncated"), "was: {}", err);
    }

    #[test]
    fn test_listing_labels_rules_and_resolves_calls() {
        let p = compile("a = b ;\nb = \"x\" ;");
        let listing = disassemble(&p).unwrap();
        assert!(listing.contains("a:\n"), "listing was:\n{}", listing);
        assert!(listing.contains("b:\n"), "listing was:\n{}", listing);
        assert!(
            listing.contains(&format!("CALL     b ({:04})", p.entries["b"])),
            "listing was:\n{}",
            listing
        );
        assert!(listing.contains("EXPECT   \"x\""), "listing was:\n{}", listing);
    }
}
