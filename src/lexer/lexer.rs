use log::trace;
use thiserror::Error;
use super::token::{Token, TokenKind};

#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum LexError {
    #[error("unexpected end of input: unterminated quote {0} starting at position {1}")]
    UnterminatedQuote(char, usize),
}

/// Scans one input line. The cursor is a byte offset into `input` and only
/// ever moves forward.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
    }

    /// Produces the next token and advances the cursor past it.
    /// Once the end of the line is reached every further call yields `Eol`.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_spaces();
        let start = self.pos;

        let token = match self.peek() {
            None | Some('\n') | Some('\r') => Token {
                kind: TokenKind::Eol,
                lexeme: String::new(),
                span: (start, start),
            },
            Some('|') => {
                self.pos += 1;
                Token::operator(TokenKind::Pipe, start)
            }
            Some('<') => {
                self.pos += 1;
                Token::operator(TokenKind::RedirectIn, start)
            }
            Some('>') => {
                self.pos += 1;
                Token::operator(TokenKind::RedirectOut, start)
            }
            Some(quote @ ('\'' | '"')) => self.quoted_word(quote)?,
            Some(_) => self.bare_word(),
        };

        trace!("token {:?} {:?} at {:?}", token.kind, token.lexeme, token.span);
        Ok(token)
    }

    pub fn tokenize_all(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eol = token.is_eol();
            tokens.push(token);
            if is_eol {
                break;
            }
        }
        Ok(tokens)
    }

    // Cursor sits on the opening quote.
    fn quoted_word(&mut self, quote: char) -> Result<Token, LexError> {
        let start = self.pos;
        self.pos += 1;
        let mut buf = String::new();

        loop {
            match self.bump() {
                Some(ch) if ch == quote => {
                    return Ok(Token {
                        kind: TokenKind::Word,
                        lexeme: buf,
                        span: (start, self.pos),
                    });
                }
                // Only the delimiter and the backslash itself are unescaped;
                // any other pair is copied verbatim for the program to read.
                Some('\\') => match self.bump() {
                    Some(escaped) if escaped == quote || escaped == '\\' => buf.push(escaped),
                    Some(other) if !is_line_end(other) => {
                        buf.push('\\');
                        buf.push(other);
                    }
                    _ => break,
                },
                Some(ch) if !is_line_end(ch) => buf.push(ch),
                _ => break,
            }
        }

        Err(LexError::UnterminatedQuote(quote, start))
    }

    fn bare_word(&mut self) -> Token {
        let start = self.pos;
        let mut buf = String::new();

        while let Some(ch) = self.peek() {
            if is_word_end(ch) {
                break;
            }
            self.pos += ch.len_utf8();
            if ch != '\\' {
                buf.push(ch);
                continue;
            }
            match self.peek() {
                Some(escaped) if !is_line_end(escaped) => {
                    buf.push(escaped);
                    self.pos += escaped.len_utf8();
                }
                // nothing left to escape, keep the backslash itself
                _ => buf.push('\\'),
            }
        }

        Token {
            kind: TokenKind::Word,
            lexeme: buf,
            span: (start, self.pos),
        }
    }
}

fn is_line_end(ch: char) -> bool {
    ch == '\n' || ch == '\r'
}

fn is_word_end(ch: char) -> bool {
    matches!(ch, ' ' | '\'' | '"' | '<' | '>' | '|') || is_line_end(ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(kind: TokenKind, lexeme: &str, span: (usize, usize)) -> Token {
        Token {
            kind,
            lexeme: lexeme.to_string(),
            span,
        }
    }

    fn words(input: &str) -> Vec<String> {
        Lexer::new(input)
            .tokenize_all()
            .unwrap()
            .into_iter()
            .filter(|t| t.kind == TokenKind::Word)
            .map(|t| t.lexeme)
            .collect()
    }

    #[test]
    fn test_tokenize_simple_words() {
        let mut lexer = Lexer::new("echo hello");
        let tokens = lexer.tokenize_all().unwrap();
        assert_eq!(
            tokens,
            vec![
                token(TokenKind::Word, "echo", (0, 4)),
                token(TokenKind::Word, "hello", (5, 10)),
                token(TokenKind::Eol, "", (10, 10)),
            ]
        );
    }

    #[test]
    fn test_tokenize_operators() {
        let mut lexer = Lexer::new("a|b  >  e<f");
        let tokens = lexer.tokenize_all().unwrap();
        assert_eq!(
            tokens,
            vec![
                token(TokenKind::Word, "a", (0, 1)),
                token(TokenKind::Pipe, "|", (1, 2)),
                token(TokenKind::Word, "b", (2, 3)),
                token(TokenKind::RedirectOut, ">", (5, 6)),
                token(TokenKind::Word, "e", (8, 9)),
                token(TokenKind::RedirectIn, "<", (9, 10)),
                token(TokenKind::Word, "f", (10, 11)),
                token(TokenKind::Eol, "", (11, 11)),
            ]
        );
    }

    #[test]
    fn test_single_quoted_word() {
        let mut lexer = Lexer::new("echo 'a b'");
        let tokens = lexer.tokenize_all().unwrap();
        assert_eq!(
            tokens,
            vec![
                token(TokenKind::Word, "echo", (0, 4)),
                token(TokenKind::Word, "a b", (5, 10)),
                token(TokenKind::Eol, "", (10, 10)),
            ]
        );
    }

    #[test]
    fn test_double_quoted_word_keeps_operators() {
        assert_eq!(words("echo \"x | y > z\""), vec!["echo", "x | y > z"]);
    }

    #[test]
    fn test_escaped_space_and_backslash() {
        assert_eq!(words(r"echo a\ b"), vec!["echo", "a b"]);
        assert_eq!(words(r"echo a\\b"), vec!["echo", r"a\b"]);
    }

    #[test]
    fn test_escape_inside_quotes() {
        assert_eq!(words(r"echo 'it\'s'"), vec!["echo", "it's"]);
        assert_eq!(words(r#"echo "say \"hi\"""#), vec!["echo", "say \"hi\""]);
    }

    #[test]
    fn test_other_escapes_inside_quotes_are_verbatim() {
        assert_eq!(words(r#"printf "b\na\n""#), vec!["printf", r"b\na\n"]);
        assert_eq!(words(r"echo 'a\\b'"), vec!["echo", r"a\b"]);
    }

    #[test]
    fn test_escaped_operator_is_literal() {
        assert_eq!(words(r"echo a\|b"), vec!["echo", "a|b"]);
    }

    #[test]
    fn test_quote_ends_bare_word() {
        assert_eq!(words("echo \"a\"b"), vec!["echo", "a", "b"]);
        assert_eq!(words("echo a'b c'"), vec!["echo", "a", "b c"]);
    }

    #[test]
    fn test_trailing_backslash_is_kept() {
        assert_eq!(words(r"echo a\"), vec!["echo", r"a\"]);
    }

    #[test]
    fn test_tab_is_a_word_character() {
        assert_eq!(words("a\tb c"), vec!["a\tb", "c"]);
    }

    #[test]
    fn test_empty_quotes_yield_empty_word() {
        assert_eq!(words("echo ''"), vec!["echo", ""]);
    }

    #[test]
    fn test_unterminated_single_quote() {
        let result = Lexer::new("echo 'oops").tokenize_all();
        assert_eq!(result, Err(LexError::UnterminatedQuote('\'', 5)));
    }

    #[test]
    fn test_unterminated_double_quote() {
        let result = Lexer::new("echo \"oops").tokenize_all();
        assert_eq!(result, Err(LexError::UnterminatedQuote('"', 5)));
    }

    #[test]
    fn test_newline_inside_quote_is_unterminated() {
        let result = Lexer::new("echo 'a\nb'").tokenize_all();
        assert_eq!(result, Err(LexError::UnterminatedQuote('\'', 5)));
    }

    #[test]
    fn test_escape_at_end_of_quote_is_unterminated() {
        let result = Lexer::new(r"echo 'abc\").tokenize_all();
        assert_eq!(result, Err(LexError::UnterminatedQuote('\'', 5)));
    }

    #[test]
    fn test_line_terminator_stops_tokenizing() {
        let mut lexer = Lexer::new("ls -l\nrm -rf x");
        let tokens = lexer.tokenize_all().unwrap();
        assert_eq!(
            tokens,
            vec![
                token(TokenKind::Word, "ls", (0, 2)),
                token(TokenKind::Word, "-l", (3, 5)),
                token(TokenKind::Eol, "", (5, 5)),
            ]
        );
        // Eol is sticky
        assert_eq!(lexer.next_token().unwrap(), token(TokenKind::Eol, "", (5, 5)));
    }

    #[test]
    fn test_tokenize_empty() {
        let tokens = Lexer::new("").tokenize_all().unwrap();
        assert_eq!(tokens, vec![token(TokenKind::Eol, "", (0, 0))]);

        let tokens = Lexer::new("    ").tokenize_all().unwrap();
        assert_eq!(tokens, vec![token(TokenKind::Eol, "", (4, 4))]);
    }

    #[test]
    fn test_retokenizing_clean_word_is_stable() {
        for raw in ["sort", "head", "-n", "/usr/bin/env", "file.txt", "日本語"] {
            let once = words(raw);
            assert_eq!(once, vec![raw]);
            assert_eq!(words(&once[0]), once);
        }
    }
}
