use crate::bytecode::ir::Program;
use crate::bytecode::op::Op;
use crate::runtime::runtime_error::RuntimeError;

/// Fixed depth of the combined operand/return-address stack.
pub const STACK_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Maximum instruction executions per run; 0 means run until `DONE`
    /// or an error.
    pub max_cycles: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig { max_cycles: 0 }
    }
}

/// Bytecode interpreter that parses an input symbol stream.
///
/// One stack of depth [`STACK_DEPTH`] holds both `PUSH` operands and
/// `CALL` return addresses, as in the original machine. All runtime state
/// is reset at the top of `run`, so a `Vm` value can execute any number of
/// programs in sequence.
pub struct Vm {
    config: VmConfig,
    stack: Vec<u16>,
    pc: usize,
    cycles: usize,
    input: Vec<String>,
    ipos: usize,
    /// One-slot pushback buffer, mirroring the lexer's.
    pushback: Option<String>,
    /// Most recently consumed symbol, the only thing `UNTOKEN` can return.
    last: Option<String>,
}

/// Splits input text into one symbol per non-whitespace character, the
/// machine's get-char view of its input.
pub fn symbols(text: &str) -> Vec<String> {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_string())
        .collect()
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        Vm {
            config,
            stack: Vec::new(),
            pc: 0,
            cycles: 0,
            input: Vec::new(),
            ipos: 0,
            pushback: None,
            last: None,
        }
    }

    /// True once every input symbol has been consumed.
    pub fn at_end(&self) -> bool {
        self.pushback.is_none() && self.ipos >= self.input.len()
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }

    fn reset(&mut self, input: &[&str]) {
        self.stack.clear();
        self.pc = 0;
        self.cycles = 0;
        self.input = input.iter().map(|s| s.to_string()).collect();
        self.ipos = 0;
        self.pushback = None;
        self.last = None;
    }

    fn push(&mut self, value: u16) -> Result<(), RuntimeError> {
        if self.stack.len() >= STACK_DEPTH {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<u16, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    fn fetch_byte(&mut self, program: &Program) -> Result<u8, RuntimeError> {
        let byte = *program
            .code
            .get(self.pc)
            .ok_or(RuntimeError::TruncatedOperand { pc: self.pc })?;
        self.pc += 1;
        Ok(byte)
    }

    fn fetch_addr(&mut self, program: &Program) -> Result<u16, RuntimeError> {
        let hi = self.fetch_byte(program)?;
        let lo = self.fetch_byte(program)?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    fn jump(&mut self, target: u16, program: &Program) -> Result<(), RuntimeError> {
        let target = target as usize;
        if target >= program.code.len() {
            return Err(RuntimeError::JumpOutOfRange {
                target,
                pc: self.pc,
            });
        }
        self.pc = target;
        Ok(())
    }

    /// Current lookahead: the pushback slot first, then the stream.
    fn lookahead(&self) -> Option<&str> {
        match &self.pushback {
            Some(symbol) => Some(symbol),
            None => self.input.get(self.ipos).map(String::as_str),
        }
    }

    fn consume(&mut self) -> Option<&str> {
        let symbol = match self.pushback.take() {
            Some(symbol) => symbol,
            None => {
                let symbol = self.input.get(self.ipos)?.clone();
                self.ipos += 1;
                symbol
            }
        };
        self.last = Some(symbol);
        self.last.as_deref()
    }

    fn fetch_literal<'p>(&mut self, program: &'p Program) -> Result<&'p str, RuntimeError> {
        let at = self.pc;
        let index = self.fetch_byte(program)?;
        program
            .literal(index)
            .ok_or(RuntimeError::InvalidLiteral { index, pc: at })
    }

    /// Executes `program` against `input` until `DONE` or an error.
    ///
    /// Returns `DONE`'s result code on a halt; a `ParseFailure` error is
    /// the program rejecting its input, anything else is a fault.
    pub fn run(&mut self, program: &Program, input: &[&str]) -> Result<u8, RuntimeError> {
        self.reset(input);

        loop {
            if self.config.max_cycles > 0 && self.cycles >= self.config.max_cycles {
                return Err(RuntimeError::CycleLimitExceeded {
                    limit: self.config.max_cycles,
                });
            }
            self.cycles += 1;

            let at = self.pc;
            let byte = *program
                .code
                .get(at)
                .ok_or(RuntimeError::PcOutOfRange { pc: at })?;
            let op = Op::from_byte(byte).ok_or(RuntimeError::InvalidOp { op: byte, pc: at })?;
            self.pc += 1;

            match op {
                Op::Nop => {}
                Op::Push => {
                    let value = self.fetch_byte(program)?;
                    self.push(value as u16)?;
                }
                Op::Pop => {
                    self.pop()?;
                }
                Op::If => {
                    let text = self.fetch_literal(program)?;
                    let matches = self.lookahead() == Some(text);
                    let addr = self.fetch_addr(program)?;
                    if matches {
                        self.jump(addr, program)?;
                    }
                }
                Op::Accept => {
                    if self.consume().is_none() {
                        return Err(RuntimeError::ParseFailure {
                            expected: "any symbol".to_string(),
                            found: None,
                        });
                    }
                }
                Op::Expect => {
                    let text = self.fetch_literal(program)?.to_string();
                    if self.lookahead() == Some(text.as_str()) {
                        self.consume();
                    } else {
                        return Err(RuntimeError::ParseFailure {
                            expected: text,
                            found: self.lookahead().map(str::to_string),
                        });
                    }
                }
                Op::Call => {
                    let addr = self.fetch_addr(program)?;
                    self.push(self.pc as u16)?;
                    self.jump(addr, program)?;
                }
                Op::Return => {
                    let addr = self.pop()?;
                    self.jump(addr, program)?;
                }
                Op::Untoken => {
                    if self.pushback.is_some() {
                        return Err(RuntimeError::TokenAlreadyPushedBack);
                    }
                    match self.last.take() {
                        Some(symbol) => self.pushback = Some(symbol),
                        None => return Err(RuntimeError::NoTokenToPushBack),
                    }
                }
                Op::Done => {
                    let code = *program
                        .code
                        .get(self.pc)
                        .ok_or(RuntimeError::PcOutOfRange { pc: self.pc })?;
                    return Ok(code);
                }
                Op::Jz => {
                    let addr = self.fetch_addr(program)?;
                    if self.pop()? == 0 {
                        self.jump(addr, program)?;
                    }
                }
                Op::Jmp => {
                    let addr = self.fetch_addr(program)?;
                    self.jump(addr, program)?;
                }
            }
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
