/// Errors raised while translating a grammar AST into bytecode.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// An identifier references a rule the grammar never defines.
    UndefinedRule { name: String },
    /// The same lhs appears on two rules.
    DuplicateRule { name: String },
    /// A grammar with no rules has nothing to compile.
    EmptyGrammar,
    /// The code buffer hit its fixed capacity.
    ProgramTooLarge { limit: usize },
    /// The literal pool hit its one-byte index range.
    TooManyLiterals { limit: usize },
    /// A node appeared where the grammar AST cannot put it (internal).
    MalformedAst(String),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::UndefinedRule { name } => {
                write!(f, "undefined rule '{}'", name)
            }
            CompileError::DuplicateRule { name } => {
                write!(f, "duplicate rule '{}'", name)
            }
            CompileError::EmptyGrammar => write!(f, "grammar has no rules"),
            CompileError::ProgramTooLarge { limit } => {
                write!(f, "program exceeds {} code bytes", limit)
            }
            CompileError::TooManyLiterals { limit } => {
                write!(f, "more than {} distinct terminals", limit)
            }
            CompileError::MalformedAst(what) => {
                write!(f, "malformed grammar tree: {}", what)
            }
        }
    }
}
