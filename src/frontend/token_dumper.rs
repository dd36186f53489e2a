use crate::frontend::lexer::Spanned;
use crate::frontend::token::Token;

/// Prints a lexed token stream for `--tokens`.
pub struct TokenDumper {
    pub color: bool,
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self { color: true }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn dump(&self, tokens: &[Spanned]) {
        for s in tokens {
            self.print_one(s);
        }
    }

    fn print_one(&self, s: &Spanned) {
        let colr = if self.color { self.color(&s.token) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };
        println!(
            "[{:02}:{:02}] {}{:<12} {}{}",
            s.span.line,
            s.span.col,
            colr,
            s.token.kind_name(),
            s.token,
            reset
        );
    }

    fn color(&self, token: &Token) -> &'static str {
        match token {
            Token::Ident(_) => Self::CYN,
            Token::Terminal(_) => Self::GRN,
            Token::Eof => Self::DIM,
            _ => Self::YEL,
        }
    }
}
