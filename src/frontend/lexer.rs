use crate::frontend::token::{MAX_LEXEME, Token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug)]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

/// Streaming lexer for the EBNF dialect.
///
/// Produces one token per `next` call and supports exactly one token of
/// pushback via `unget`. Whitespace and `(* ... *)` comments are skipped.
pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    /// One-slot pushback buffer.
    pushback: Option<Spanned>,
    /// Whether the most recent `next` replayed a pushed-back token.
    replayed: bool,
    /// Echo every fetch to stdout (`token <repr>` / `unget-token <repr>`).
    trace: bool,
}

/// Trace echo for one token fetch.
fn trace_line(replayed: bool, token: &Token) -> String {
    if replayed {
        format!("unget-token {}", token)
    } else {
        format!("token {}", token)
    }
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            pushback: None,
            replayed: false,
            trace: false,
        }
    }

    pub fn with_trace(mut self) -> Self {
        self.trace = true;
        self
    }

    /// True when the token returned by the most recent `next` came out of
    /// the pushback slot rather than a fresh scan.
    pub fn last_was_pushback(&self) -> bool {
        self.replayed
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn error(&self, message: impl Into<String>) -> LexerError {
        LexerError {
            message: message.into(),
            line: self.line,
            col: self.col,
        }
    }

    /// Pushes a token back into the one-slot buffer.
    ///
    /// The next `next` call returns it verbatim, without re-scanning.
    /// Ungetting twice without an intervening `next` is an error.
    pub fn unget(&mut self, token: Spanned) -> Result<(), LexerError> {
        if self.pushback.is_some() {
            return Err(self.error("token already pushed back"));
        }
        self.pushback = Some(token);
        Ok(())
    }

    /// Fetches the next token, draining the pushback slot first. In trace
    /// mode every fetch is echoed; a pushback replay echoes as
    /// `unget-token`, a fresh scan as `token`.
    pub fn next(&mut self) -> Result<Spanned, LexerError> {
        if let Some(token) = self.pushback.take() {
            self.replayed = true;
            if self.trace {
                println!("{}", trace_line(true, &token.token));
            }
            return Ok(token);
        }
        self.replayed = false;
        let token = self.scan()?;
        if self.trace {
            println!("{}", trace_line(false, &token.token));
        }
        Ok(token)
    }

    fn scan(&mut self) -> Result<Spanned, LexerError> {
        self.skip_whitespace_and_comments()?;
        let span = self.span();

        let token = match self.current() {
            None => Token::Eof,
            Some('[') => {
                self.advance();
                Token::LBracket
            }
            Some(']') => {
                self.advance();
                Token::RBracket
            }
            Some('{') => {
                self.advance();
                Token::LBrace
            }
            Some('}') => {
                self.advance();
                Token::RBrace
            }
            Some('(') => {
                self.advance();
                Token::LParen
            }
            Some(')') => {
                self.advance();
                Token::RParen
            }
            Some('<') => {
                self.advance();
                Token::Lt
            }
            Some('>') => {
                self.advance();
                Token::Gt
            }
            Some('=') => {
                self.advance();
                Token::Equal
            }
            Some('|') => {
                self.advance();
                Token::Pipe
            }
            Some('.') => {
                self.advance();
                Token::Dot
            }
            Some(',') => {
                self.advance();
                Token::Comma
            }
            Some(';') => {
                self.advance();
                Token::Semicolon
            }
            Some(q @ ('\'' | '"')) => self.read_terminal(q)?,
            Some(ch) if ch.is_ascii_alphabetic() => self.read_identifier()?,
            Some(ch) => return Err(self.error(format!("unexpected character: '{}'", ch))),
        };

        Ok(Spanned { token, span })
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexerError> {
        loop {
            match self.current() {
                Some(' ' | '\t' | '\r' | '\n') => {
                    self.advance();
                }
                Some('(') if self.peek() == Some('*') => {
                    self.skip_comment()?;
                }
                _ => return Ok(()),
            }
        }
    }

    /// Skips a `(* ... *)` comment.
    ///
    /// Matches the original scanner: positions inside a comment advance the
    /// raw cursor only, so embedded newlines do not bump the line counter
    /// and later diagnostics can under-report line numbers.
    fn skip_comment(&mut self) -> Result<(), LexerError> {
        self.pos += 2; // over "(*"
        self.col += 2;
        loop {
            match self.source.get(self.pos) {
                None => return Err(self.error("comment missing closing *)")),
                Some('*') if self.source.get(self.pos + 1) == Some(&')') => {
                    self.pos += 2;
                    self.col += 2;
                    return Ok(());
                }
                Some(_) => {
                    self.pos += 1;
                    self.col += 1;
                }
            }
        }
    }

    fn read_identifier(&mut self) -> Result<Token, LexerError> {
        let mut ident = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                if ident.len() >= MAX_LEXEME {
                    return Err(self.error("token too long"));
                }
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Ok(Token::Ident(ident))
    }

    /// Reads a quoted terminal. The body may contain letters, digits, ASCII
    /// punctuation, and `_`; the opening quote character terminates it.
    fn read_terminal(&mut self, quote: char) -> Result<Token, LexerError> {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.current() {
                Some(ch) if ch == quote => {
                    self.advance();
                    return Ok(Token::Terminal(text));
                }
                Some(ch)
                    if ch.is_ascii_alphanumeric() || ch.is_ascii_punctuation() || ch == '_' =>
                {
                    if text.len() >= MAX_LEXEME {
                        return Err(self.error("token too long"));
                    }
                    text.push(ch);
                    self.advance();
                }
                _ => return Err(self.error("unterminated terminal")),
            }
        }
    }

    /// Drains the whole stream (including the final `Eof`), mainly for the
    /// token dumper.
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                return Ok(tokens);
            }
        }
    }
}
