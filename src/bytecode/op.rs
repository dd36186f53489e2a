// =============================================================================
// OP - VM instruction set
// =============================================================================

/// One instruction of the parsing VM.
///
/// Programs are flat byte sequences: an opcode byte followed by its operand
/// bytes. Addresses are two-byte big-endian absolute offsets into the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    /// No operation.
    Nop = 0,
    /// Push the one-byte operand onto the stack.
    Push = 1,
    /// Discard the top of the stack.
    Pop = 2,
    /// Operands: literal index, address. Jump if the lookahead symbol
    /// matches the literal; fall through otherwise.
    If = 3,
    /// Consume the lookahead symbol unconditionally.
    Accept = 4,
    /// Operand: literal index. Consume the lookahead if it matches the
    /// literal; otherwise the run fails as a parse rejection.
    Expect = 5,
    /// Operand: address. Push the resume pc and jump.
    Call = 6,
    /// Pop the pc.
    Return = 7,
    /// Move the most recently consumed symbol into the one-slot pushback
    /// buffer.
    Untoken = 8,
    /// Halt; the following byte is the result code.
    Done = 9,
    /// Operand: address. Pop; jump if the popped value is zero.
    Jz = 10,
    /// Operand: address. Unconditional jump.
    Jmp = 11,
}

impl Op {
    pub fn from_byte(byte: u8) -> Option<Op> {
        match byte {
            0 => Some(Op::Nop),
            1 => Some(Op::Push),
            2 => Some(Op::Pop),
            3 => Some(Op::If),
            4 => Some(Op::Accept),
            5 => Some(Op::Expect),
            6 => Some(Op::Call),
            7 => Some(Op::Return),
            8 => Some(Op::Untoken),
            9 => Some(Op::Done),
            10 => Some(Op::Jz),
            11 => Some(Op::Jmp),
            _ => None,
        }
    }

    /// Number of operand bytes that follow the opcode.
    pub fn operand_len(self) -> usize {
        match self {
            Op::Nop | Op::Pop | Op::Accept | Op::Return | Op::Untoken => 0,
            Op::Push | Op::Expect | Op::Done => 1,
            Op::Call | Op::Jz | Op::Jmp => 2,
            Op::If => 3, // literal byte + address
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Op::Nop => "NOP",
            Op::Push => "PUSH",
            Op::Pop => "POP",
            Op::If => "IF",
            Op::Accept => "ACCEPT",
            Op::Expect => "EXPECT",
            Op::Call => "CALL",
            Op::Return => "RETURN",
            Op::Untoken => "UNTOKEN",
            Op::Done => "DONE",
            Op::Jz => "JZ",
            Op::Jmp => "JMP",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_round_trip() {
        for byte in 0..=11u8 {
            let op = Op::from_byte(byte).unwrap();
            assert_eq!(op as u8, byte);
        }
        assert_eq!(Op::from_byte(12), None);
        assert_eq!(Op::from_byte(255), None);
    }
}
