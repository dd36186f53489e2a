use crate::frontend::lexer::{Lexer, LexerError, Spanned};
use crate::frontend::parser_error::ParserError;
use crate::frontend::token::Token;
use crate::lang::node::Node;

impl From<LexerError> for ParserError {
    fn from(err: LexerError) -> Self {
        ParserError {
            message: err.message,
            line: err.line,
        }
    }
}

/// Recursive-descent parser for the EBNF dialect.
///
/// One method per production:
///
/// ```text
/// grammar    = { rule } ;
/// rule       = lhs , "=" , rhs , ";" ;
/// lhs        = identifier ;
/// rhs        = term | term , "|" , rhs | term , "," , rhs ;
/// term       = identifier | terminal | grouping | optional | repetition ;
/// grouping   = "(" , rhs , ")" ;
/// optional   = "[" , rhs , "]" ;
/// repetition = "{" , rhs , "}" ;
/// ```
///
/// The parser pulls tokens straight from the lexer and builds the whole
/// tree in one call. Any failure propagates by `Result` out of every
/// active production back to `parse`; the partial tree is dropped on the
/// way and nothing of it escapes. Each `Parser` value is independent, so
/// repeated invocations never share state.
pub struct Parser {
    lexer: Lexer,
}

impl Parser {
    pub fn new(lexer: Lexer) -> Self {
        Parser { lexer }
    }

    fn next(&mut self) -> Result<Spanned, ParserError> {
        Ok(self.lexer.next()?)
    }

    fn unget(&mut self, token: Spanned) -> Result<(), ParserError> {
        Ok(self.lexer.unget(token)?)
    }

    /// Builds a syntax error around the offending token, noting whether it
    /// was replayed from the pushback slot.
    fn syntax_error(&self, expected: &str, got: &Spanned) -> ParserError {
        let origin = if self.lexer.last_was_pushback() {
            " (pushed back)"
        } else {
            ""
        };
        ParserError {
            message: format!("syntax error: expected {}, got '{}'{}", expected, got.token, origin),
            line: got.span.line,
        }
    }

    fn expect(&mut self, want: Token, expected: &str) -> Result<(), ParserError> {
        let got = self.next()?;
        if got.token == want {
            Ok(())
        } else {
            Err(self.syntax_error(expected, &got))
        }
    }

    /// Parses a complete grammar: rules until end of input, then the `Eof`
    /// leaf that closes the tree.
    pub fn parse(&mut self) -> Result<Node, ParserError> {
        let mut items = Vec::new();
        loop {
            let token = self.next()?;
            if token.token == Token::Eof {
                items.push(Node::Eof);
                return Ok(Node::Grammar(items));
            }
            self.unget(token)?;
            items.push(self.rule()?);
        }
    }

    /// `rule = lhs , "=" , rhs , ";" ;`
    fn rule(&mut self) -> Result<Node, ParserError> {
        let lhs = self.lhs()?;
        self.expect(Token::Equal, "'='")?;
        let rhs = self.rhs()?;
        self.expect(Token::Semicolon, "';'")?;
        Ok(Node::Rule {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// `lhs = identifier ;`
    fn lhs(&mut self) -> Result<Node, ParserError> {
        let got = self.next()?;
        match got.token {
            Token::Ident(name) => Ok(Node::Lhs(name)),
            _ => Err(self.syntax_error("rule name", &got)),
        }
    }

    /// Accumulates the flat term list. `,` continues the sequence; `|`
    /// continues it too but drops an `Alternate` marker in between and sets
    /// the node's flag. Anything else ends the rhs and is pushed back for
    /// the caller.
    fn rhs(&mut self) -> Result<Node, ParserError> {
        let mut items = Vec::new();
        let mut alternated = false;
        loop {
            items.push(self.term()?);
            let sep = self.next()?;
            match sep.token {
                Token::Comma => {}
                Token::Pipe => {
                    alternated = true;
                    items.push(Node::Alternate);
                }
                _ => {
                    self.unget(sep)?;
                    return Ok(Node::Rhs { items, alternated });
                }
            }
        }
    }

    /// `term = identifier | terminal | grouping | optional | repetition ;`
    fn term(&mut self) -> Result<Node, ParserError> {
        let got = self.next()?;
        let inner = match got.token {
            Token::Ident(name) => Node::Identifier(name),
            Token::Terminal(text) => Node::Terminal(text),
            Token::LParen => {
                let rhs = self.rhs()?;
                self.expect(Token::RParen, "')'")?;
                Node::Grouping(Box::new(rhs))
            }
            Token::LBracket => {
                let rhs = self.rhs()?;
                self.expect(Token::RBracket, "']'")?;
                Node::Optional(Box::new(rhs))
            }
            Token::LBrace => {
                let rhs = self.rhs()?;
                self.expect(Token::RBrace, "'}'")?;
                Node::Repetition(Box::new(rhs))
            }
            _ => return Err(self.syntax_error("a term", &got)),
        };
        Ok(Node::Term(Box::new(inner)))
    }
}

/// Parses EBNF source into a grammar AST in one shot.
pub fn parse_grammar(source: &str) -> Result<Node, ParserError> {
    Parser::new(Lexer::new(source)).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Node {
        parse_grammar(source).unwrap()
    }

    fn parse_err(source: &str) -> ParserError {
        parse_grammar(source).unwrap_err()
    }

    /// Unwraps `Grammar([...rules..., Eof])` into the rule list.
    fn rules(grammar: &Node) -> Vec<&Node> {
        match grammar {
            Node::Grammar(items) => {
                assert_eq!(items.last(), Some(&Node::Eof));
                items[..items.len() - 1].iter().collect()
            }
            other => panic!("expected grammar, got {:?}", other),
        }
    }

    #[test]
    fn test_single_terminal_rule() {
        let grammar = parse("a = \"x\" ;");
        let rules = rules(&grammar);
        assert_eq!(rules.len(), 1);
        match rules[0] {
            Node::Rule { lhs, rhs } => {
                assert_eq!(**lhs, Node::Lhs("a".to_string()));
                match &**rhs {
                    Node::Rhs { items, alternated } => {
                        assert!(!alternated);
                        assert_eq!(
                            items[..],
                            [Node::Term(Box::new(Node::Terminal("x".to_string())))]
                        );
                    }
                    other => panic!("expected rhs, got {:?}", other),
                }
            }
            other => panic!("expected rule, got {:?}", other),
        }
    }

    #[test]
    fn test_alternation_sets_flag_and_marker() {
        let grammar = parse("digit = \"0\" | \"1\" ;");
        let rules = rules(&grammar);
        match rules[0] {
            Node::Rule { rhs, .. } => match &**rhs {
                Node::Rhs { items, alternated } => {
                    assert!(*alternated);
                    assert_eq!(
                        items[..],
                        [
                            Node::Term(Box::new(Node::Terminal("0".to_string()))),
                            Node::Alternate,
                            Node::Term(Box::new(Node::Terminal("1".to_string()))),
                        ]
                    );
                }
                other => panic!("expected rhs, got {:?}", other),
            },
            other => panic!("expected rule, got {:?}", other),
        }
    }

    #[test]
    fn test_sequence_has_no_marker() {
        let grammar = parse("x = y , z ;");
        let rules = rules(&grammar);
        match rules[0] {
            Node::Rule { rhs, .. } => match &**rhs {
                Node::Rhs { items, alternated } => {
                    assert!(!alternated);
                    assert_eq!(
                        items[..],
                        [
                            Node::Term(Box::new(Node::Identifier("y".to_string()))),
                            Node::Term(Box::new(Node::Identifier("z".to_string()))),
                        ]
                    );
                }
                other => panic!("expected rhs, got {:?}", other),
            },
            other => panic!("expected rule, got {:?}", other),
        }
    }

    #[test]
    fn test_mixed_separators_stay_flat() {
        // No precedence between ',' and '|': one flat list with a marker.
        let grammar = parse("r = a , b | c ;");
        let rules = rules(&grammar);
        match rules[0] {
            Node::Rule { rhs, .. } => match &**rhs {
                Node::Rhs { items, alternated } => {
                    assert!(*alternated);
                    assert_eq!(items.len(), 4);
                    assert_eq!(items[2], Node::Alternate);
                }
                other => panic!("expected rhs, got {:?}", other),
            },
            other => panic!("expected rule, got {:?}", other),
        }
    }

    #[test]
    fn test_grouping_optional_repetition() {
        let grammar = parse("r = ( a ) , [ b ] , { c } ;");
        let rules = rules(&grammar);
        match rules[0] {
            Node::Rule { rhs, .. } => match &**rhs {
                Node::Rhs { items, .. } => {
                    assert!(matches!(
                        &items[0],
                        Node::Term(t) if matches!(**t, Node::Grouping(_))
                    ));
                    assert!(matches!(
                        &items[1],
                        Node::Term(t) if matches!(**t, Node::Optional(_))
                    ));
                    assert!(matches!(
                        &items[2],
                        Node::Term(t) if matches!(**t, Node::Repetition(_))
                    ));
                }
                other => panic!("expected rhs, got {:?}", other),
            },
            other => panic!("expected rule, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_rules_in_source_order() {
        let grammar = parse("a = b ;\nb = \"x\" ;\nc = \"y\" ;");
        let rules = rules(&grammar);
        let names: Vec<_> = rules
            .iter()
            .map(|r| match r {
                Node::Rule { lhs, .. } => lhs.text().unwrap().to_string(),
                other => panic!("expected rule, got {:?}", other),
            })
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_missing_rhs_reports_line_and_token() {
        let err = parse_err("x = ;");
        assert_eq!(err.line, 1);
        assert!(err.message.contains("';'"), "msg was: {}", err.message);
    }

    #[test]
    fn test_missing_semicolon_reports_next_line() {
        let err = parse_err("x = y\nz = w ;");
        // The offending token is 'z' at the start of line 2, replayed from
        // the pushback slot after the rhs gave it up.
        assert_eq!(err.line, 2);
        assert!(err.message.contains("';'"), "msg was: {}", err.message);
        assert!(
            err.message.contains("(pushed back)"),
            "msg was: {}",
            err.message
        );
    }

    #[test]
    fn test_comment_parses_identically() {
        let with = parse("a (* ignored *) = \"x\" ;");
        let without = parse("a = \"x\" ;");
        assert_eq!(with, without);
    }

    #[test]
    fn test_empty_source_is_just_eof() {
        let grammar = parse("");
        assert_eq!(grammar, Node::Grammar(vec![Node::Eof]));
    }

    #[test]
    fn test_unclosed_grouping() {
        let err = parse_err("a = ( b ;");
        assert!(err.message.contains("')'"), "msg was: {}", err.message);
    }

    #[test]
    fn test_lexical_error_propagates() {
        let err = parse_err("a = \"x ;");
        assert!(
            err.message.contains("unterminated terminal"),
            "msg was: {}",
            err.message
        );
    }
}
