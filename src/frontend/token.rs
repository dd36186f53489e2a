/// Longest lexeme the lexer will accept for an identifier or terminal.
///
/// Exceeding it is a reportable lexical error, not an abort.
pub const MAX_LEXEME: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Rule name or non-terminal reference.
    Ident(String),
    /// Quoted terminal; the lexeme excludes the quotes.
    Terminal(String),

    // Punctuation
    LBracket,  // [
    RBracket,  // ]
    LBrace,    // {
    RBrace,    // }
    LParen,    // (
    RParen,    // )
    Lt,        // <
    Gt,        // >
    Equal,     // =
    Pipe,      // |
    Dot,       // .
    Comma,     // ,
    Semicolon, // ;

    Eof,
}

impl Token {
    /// Symbolic name used in diagnostics and the token dump.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Token::Ident(_) => "identifier",
            Token::Terminal(_) => "terminal",
            Token::LBracket
            | Token::RBracket
            | Token::LBrace
            | Token::RBrace
            | Token::LParen
            | Token::RParen
            | Token::Lt
            | Token::Gt
            | Token::Equal
            | Token::Pipe
            | Token::Dot
            | Token::Comma
            | Token::Semicolon => "punctuation",
            Token::Eof => "eof",
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{}", s),
            Token::Terminal(s) => write!(f, "\"{}\"", s),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::Equal => write!(f, "="),
            Token::Pipe => write!(f, "|"),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::Eof => write!(f, "EOF"),
        }
    }
}
