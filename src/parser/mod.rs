mod assembler;

use thiserror::Error;
use crate::lexer::LexError;

pub use assembler::{Assembler, DEFAULT_MAX_ARGS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("syntax error near unexpected token `newline' at position {pos}")]
    DanglingRedirect { pos: usize },
    #[error("syntax error near unexpected token `{found}' at position {pos}")]
    UnexpectedToken { found: String, pos: usize },
    #[error("syntax error: missing command at position {pos}")]
    EmptyStage { pos: usize },
    #[error("too many arguments: a command takes at most {max} words")]
    TooManyArguments { max: usize },
    #[error("syntax error: `<' at position {pos} must belong to the first command of a pipeline")]
    MisplacedInput { pos: usize },
    #[error("syntax error: `>' before position {pos} must belong to the last command of a pipeline")]
    MisplacedOutput { pos: usize },
}
