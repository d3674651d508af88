#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,          // program name, argument or file name
    Pipe,          // |
    RedirectIn,    // <
    RedirectOut,   // >
    Eol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,       // Decoded text (quotes removed, escapes resolved)
    pub span: (usize, usize), // Position info [start, end) in the raw line
}

impl Token {
    pub fn operator(kind: TokenKind, pos: usize) -> Self {
        let lexeme = match kind {
            TokenKind::Pipe => "|",
            TokenKind::RedirectIn => "<",
            TokenKind::RedirectOut => ">",
            TokenKind::Word | TokenKind::Eol => "",
        };
        Token {
            kind,
            lexeme: lexeme.to_string(),
            span: (pos, pos + lexeme.len()),
        }
    }

    pub fn is_eol(&self) -> bool {
        self.kind == TokenKind::Eol
    }
}
