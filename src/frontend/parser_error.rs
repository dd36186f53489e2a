/// A syntax error with source location.
///
/// `line` is the lexer's 1-based line counter at the point of failure. When
/// the offending token was replayed from the pushback slot the message says
/// so, since the reported line can then trail the token's true position.
#[derive(Debug)]
pub struct ParserError {
    pub message: String,
    pub line: usize,
}

impl std::fmt::Display for ParserError {
    /// Formats as `line: message` for CLI-friendly diagnostics.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.line, self.message)
    }
}
