use log::{debug, warn};
use crate::ast::{Command, Pipeline, RedirectKind, Redirection};
use crate::lexer::{Lexer, Token, TokenKind};
use super::SyntaxError;

/// Legacy per-stage limit: 20 argv entries, program name included.
pub const DEFAULT_MAX_ARGS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordRole {
    Program,
    Argument,
}

// Everything that changes while one line is assembled. Lives for a single
// `assemble` call and is threaded through the handlers by reference.
#[derive(Debug)]
struct AssemblyContext {
    role: WordRole,
    pending: Option<(RedirectKind, usize)>,
    stage: usize,
    current: Option<Command>,
    stages: Vec<Command>,
    redirection: Redirection,
    output_stage: Option<usize>,
}

impl AssemblyContext {
    fn new() -> Self {
        AssemblyContext {
            role: WordRole::Program,
            pending: None,
            stage: 0,
            current: None,
            stages: Vec::new(),
            redirection: Redirection::default(),
            output_stage: None,
        }
    }
}

/// Groups the token stream of one line into pipeline stages.
pub struct Assembler {
    max_args: usize,
}

impl Default for Assembler {
    fn default() -> Self {
        Assembler::new(DEFAULT_MAX_ARGS)
    }
}

impl Assembler {
    pub fn new(max_args: usize) -> Self {
        Assembler { max_args }
    }

    /// Pulls tokens from `lexer` up to the end of the line.
    /// Returns `Ok(None)` when the line holds no command at all.
    pub fn assemble(&self, lexer: &mut Lexer) -> Result<Option<Pipeline>, SyntaxError> {
        let mut ctx = AssemblyContext::new();
        loop {
            let token = lexer.next_token()?;
            match token.kind {
                TokenKind::Word => self.on_word(&mut ctx, token.lexeme)?,
                TokenKind::RedirectIn => self.on_redirect(&mut ctx, RedirectKind::In, &token)?,
                TokenKind::RedirectOut => self.on_redirect(&mut ctx, RedirectKind::Out, &token)?,
                TokenKind::Pipe => self.on_pipe(&mut ctx, &token)?,
                TokenKind::Eol => return self.finish(ctx, &token),
            }
        }
    }

    pub fn assemble_line(&self, line: &str) -> Result<Option<Pipeline>, SyntaxError> {
        self.assemble(&mut Lexer::new(line))
    }

    fn on_word(&self, ctx: &mut AssemblyContext, word: String) -> Result<(), SyntaxError> {
        if let Some((kind, pos)) = ctx.pending.take() {
            return self.attach_redirect(ctx, kind, pos, word);
        }

        match (ctx.role, ctx.current.as_mut()) {
            (WordRole::Argument, Some(cmd)) => {
                if cmd.argv().len() >= self.max_args {
                    return Err(SyntaxError::TooManyArguments { max: self.max_args });
                }
                debug!("reading in argument {}: {}", cmd.argv().len(), word);
                cmd.push_arg(word);
            }
            _ => {
                debug!("reading in command: {}", word);
                ctx.current = Some(Command::new(word));
                ctx.role = WordRole::Argument;
            }
        }
        Ok(())
    }

    fn attach_redirect(
        &self,
        ctx: &mut AssemblyContext,
        kind: RedirectKind,
        pos: usize,
        file: String,
    ) -> Result<(), SyntaxError> {
        let slot = match kind {
            RedirectKind::In => {
                if ctx.stage != 0 {
                    return Err(SyntaxError::MisplacedInput { pos });
                }
                &mut ctx.redirection.input
            }
            RedirectKind::Out => {
                ctx.output_stage = Some(ctx.stage);
                &mut ctx.redirection.output
            }
        };
        if let Some(previous) = slot.replace(file) {
            warn!("{:?} redirection to '{}' replaced", kind, previous);
        }
        Ok(())
    }

    fn on_redirect(
        &self,
        ctx: &mut AssemblyContext,
        kind: RedirectKind,
        token: &Token,
    ) -> Result<(), SyntaxError> {
        debug!("redirection symbol '{}' located", token.lexeme);
        if ctx.pending.is_some() {
            return Err(SyntaxError::UnexpectedToken {
                found: token.lexeme.clone(),
                pos: token.span.0,
            });
        }
        ctx.pending = Some((kind, token.span.0));
        Ok(())
    }

    fn on_pipe(&self, ctx: &mut AssemblyContext, token: &Token) -> Result<(), SyntaxError> {
        debug!("pipe symbol '|' located");
        if ctx.pending.is_some() {
            return Err(SyntaxError::UnexpectedToken {
                found: token.lexeme.clone(),
                pos: token.span.0,
            });
        }
        let cmd = ctx
            .current
            .take()
            .ok_or(SyntaxError::EmptyStage { pos: token.span.0 })?;
        if ctx.output_stage == Some(ctx.stage) {
            return Err(SyntaxError::MisplacedOutput { pos: token.span.0 });
        }
        ctx.stages.push(cmd);
        ctx.stage += 1;
        ctx.role = WordRole::Program;
        Ok(())
    }

    fn finish(&self, mut ctx: AssemblyContext, eol: &Token) -> Result<Option<Pipeline>, SyntaxError> {
        if ctx.pending.is_some() {
            return Err(SyntaxError::DanglingRedirect { pos: eol.span.0 });
        }
        match ctx.current.take() {
            Some(cmd) => ctx.stages.push(cmd),
            None if ctx.stages.is_empty() && ctx.redirection == Redirection::default() => {
                return Ok(None);
            }
            None => return Err(SyntaxError::EmptyStage { pos: eol.span.0 }),
        }

        let pipeline = Pipeline {
            stages: ctx.stages,
            redirection: ctx.redirection,
        };
        debug!("assembled {:?}", pipeline);
        Ok(Some(pipeline))
    }
}
