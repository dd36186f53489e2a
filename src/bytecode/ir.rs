use crate::bytecode::compile_error::CompileError;
use crate::bytecode::op::Op;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Code size cap; addresses are two bytes.
pub const CODE_MAX: usize = 0x1_0000;

/// Literal pool cap; literal operands are one byte.
pub const LITERALS_MAX: usize = 256;

/// A compiled parsing program.
///
/// `code` starts with a prologue (`CALL <start rule>; DONE 0`) followed by
/// one callable block per rule. `entries` is the patch table's final form:
/// rule name to entry offset. The program is immutable once compiled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub code: Vec<u8>,
    /// Terminal texts referenced by `IF`/`EXPECT` literal operands.
    pub literals: Vec<String>,
    pub entries: BTreeMap<String, u16>,
    /// Entry offset of the start rule (the grammar's first rule).
    pub start: u16,
}

impl Program {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            literals: Vec::new(),
            entries: BTreeMap::new(),
            start: 0,
        }
    }

    /// Current emission offset.
    pub fn here(&self) -> usize {
        self.code.len()
    }

    pub fn emit_byte(&mut self, byte: u8) -> Result<(), CompileError> {
        if self.code.len() >= CODE_MAX {
            return Err(CompileError::ProgramTooLarge { limit: CODE_MAX });
        }
        self.code.push(byte);
        Ok(())
    }

    pub fn emit_op(&mut self, op: Op) -> Result<(), CompileError> {
        self.emit_byte(op as u8)
    }

    pub fn emit_addr(&mut self, addr: u16) -> Result<(), CompileError> {
        let [hi, lo] = addr.to_be_bytes();
        self.emit_byte(hi)?;
        self.emit_byte(lo)
    }

    /// Emits a placeholder address and returns its offset for later
    /// patching.
    pub fn emit_addr_placeholder(&mut self) -> Result<usize, CompileError> {
        let at = self.here();
        self.emit_addr(0xFFFF)?;
        Ok(at)
    }

    pub fn patch_addr(&mut self, at: usize, addr: u16) {
        let [hi, lo] = addr.to_be_bytes();
        self.code[at] = hi;
        self.code[at + 1] = lo;
    }

    /// Big-endian address operand at `at`, if both bytes are in range.
    pub fn read_addr(&self, at: usize) -> Option<u16> {
        let hi = *self.code.get(at)?;
        let lo = *self.code.get(at + 1)?;
        Some(u16::from_be_bytes([hi, lo]))
    }

    /// Returns the pool index for `text`, interning it on first use.
    pub fn intern_literal(&mut self, text: &str) -> Result<u8, CompileError> {
        if let Some(idx) = self.literals.iter().position(|l| l == text) {
            return Ok(idx as u8);
        }
        if self.literals.len() >= LITERALS_MAX {
            return Err(CompileError::TooManyLiterals {
                limit: LITERALS_MAX,
            });
        }
        self.literals.push(text.to_string());
        Ok((self.literals.len() - 1) as u8)
    }

    pub fn literal(&self, idx: u8) -> Option<&str> {
        self.literals.get(idx as usize).map(String::as_str)
    }

    /// Rule name whose entry is exactly `offset`, for disassembly labels.
    pub fn rule_at(&self, offset: usize) -> Option<&str> {
        self.entries
            .iter()
            .find(|&(_, &entry)| entry as usize == offset)
            .map(|(name, _)| name.as_str())
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_and_patch() {
        let mut p = Program::new();
        p.emit_op(Op::Call).unwrap();
        let at = p.emit_addr_placeholder().unwrap();
        p.emit_op(Op::Done).unwrap();
        p.emit_byte(0).unwrap();
        p.patch_addr(at, 0x1234);
        assert_eq!(p.read_addr(at), Some(0x1234));
        assert_eq!(p.code[0], Op::Call as u8);
    }

    #[test]
    fn test_intern_literal_dedups() {
        let mut p = Program::new();
        let a = p.intern_literal("x").unwrap();
        let b = p.intern_literal("y").unwrap();
        let c = p.intern_literal("x").unwrap();
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(p.literal(a), Some("x"));
    }

    #[test]
    fn test_literal_pool_cap() {
        let mut p = Program::new();
        for i in 0..LITERALS_MAX {
            p.intern_literal(&format!("t{}", i)).unwrap();
        }
        assert!(matches!(
            p.intern_literal("overflow"),
            Err(CompileError::TooManyLiterals { .. })
        ));
    }

    #[test]
    fn test_rule_at_reverse_lookup() {
        let mut p = Program::new();
        p.entries.insert("a".to_string(), 5);
        p.entries.insert("b".to_string(), 9);
        assert_eq!(p.rule_at(5), Some("a"));
        assert_eq!(p.rule_at(9), Some("b"));
        assert_eq!(p.rule_at(0), None);
    }

    #[test]
    fn test_postcard_round_trip() {
        let mut p = Program::new();
        p.emit_op(Op::Done).unwrap();
        p.emit_byte(7).unwrap();
        p.intern_literal("x").unwrap();
        p.entries.insert("a".to_string(), 0);

        let bytes = postcard::to_allocvec(&p).unwrap();
        let back: Program = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back.code, p.code);
        assert_eq!(back.literals, p.literals);
        assert_eq!(back.entries, p.entries);
    }
}
