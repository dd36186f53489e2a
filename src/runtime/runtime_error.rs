/// Errors surfaced by a VM run.
///
/// `ParseFailure` is the one non-fatal case: the program executed fine and
/// rejected its input. Everything else means the program itself (or its
/// execution budget) is broken. None of these abort the host process; the
/// caller decides.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    InvalidOp { op: u8, pc: usize },
    PcOutOfRange { pc: usize },
    TruncatedOperand { pc: usize },
    InvalidLiteral { index: u8, pc: usize },
    JumpOutOfRange { target: usize, pc: usize },
    StackOverflow,
    StackUnderflow,
    CycleLimitExceeded { limit: usize },
    TokenAlreadyPushedBack,
    NoTokenToPushBack,
    /// The input did not conform to the grammar.
    ParseFailure {
        expected: String,
        found: Option<String>,
    },
}

impl RuntimeError {
    /// True when the run cleanly rejected its input rather than faulting.
    pub fn is_rejection(&self) -> bool {
        matches!(self, RuntimeError::ParseFailure { .. })
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeError::InvalidOp { op, pc } => {
                write!(f, "invalid op {} at {}", op, pc)
            }
            RuntimeError::PcOutOfRange { pc } => {
                write!(f, "pc out of range: {}", pc)
            }
            RuntimeError::TruncatedOperand { pc } => {
                write!(f, "missing operand at {}", pc)
            }
            RuntimeError::InvalidLiteral { index, pc } => {
                write!(f, "literal index {} out of range at {}", index, pc)
            }
            RuntimeError::JumpOutOfRange { target, pc } => {
                write!(f, "jump target {} out of range at {}", target, pc)
            }
            RuntimeError::StackOverflow => write!(f, "stack overflow"),
            RuntimeError::StackUnderflow => write!(f, "stack underflow"),
            RuntimeError::CycleLimitExceeded { limit } => {
                write!(f, "cycle limit exceeded ({})", limit)
            }
            RuntimeError::TokenAlreadyPushedBack => {
                write!(f, "token already pushed back")
            }
            RuntimeError::NoTokenToPushBack => {
                write!(f, "no token to push back")
            }
            RuntimeError::ParseFailure { expected, found } => match found {
                Some(found) => {
                    write!(f, "parse failure: expected \"{}\", found \"{}\"", expected, found)
                }
                None => {
                    write!(f, "parse failure: expected \"{}\", found end of input", expected)
                }
            },
        }
    }
}
