//! Input sources for the expansion engine.
//!
//! The engine reads from a stack of inputs: the source file at the bottom and
//! synthetic buffers (macro replacement lists, macro arguments) stacked on top.
//! A stacked buffer that runs dry is popped the next time a token is read, so
//! a reader can cross from a replacement list into the text that follows it.
//! The engine detects that crossing by comparing [`TokenSource::current_input`]
//! with the handle it got from [`TokenSource::stack_input`].

use std::collections::VecDeque;

use tracing::trace;

use crate::syntax::token::Token;

/// Identity of one stacked input.
pub type InputHandle = u64;

/// Position of the reader: the current input and how many tokens have been
/// consumed from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPosition {
    pub input: InputHandle,
    pub consumed: usize,
}

/// The tokenizer interface the engine drives.
pub trait TokenSource {
    /// Next token, popping exhausted stacked inputs first. Returns
    /// [`Token::Eof`] once the bottom input is exhausted.
    fn next_token(&mut self) -> Token;

    /// Returns `token` to the front of the current input.
    fn push_back(&mut self, token: Token);

    /// Makes `tokens` the current input.
    fn stack_input(&mut self, tokens: Vec<Token>, name: Option<&str>) -> InputHandle;

    fn current_input(&self) -> InputHandle;

    fn current_input_is_exhausted(&self) -> bool;

    /// True if the current input is a real source file rather than a
    /// synthetic buffer.
    fn current_input_is_source(&self) -> bool;

    /// Pops `handle` if it is the current input and has been fully read.
    fn finish_input(&mut self, handle: InputHandle);

    /// Discards every stacked synthetic input.
    fn unwind_stacked(&mut self);

    /// Line of the most recent token read from a source file.
    fn current_line(&self) -> u32;

    /// Name of the nearest real source file.
    fn current_filename(&self) -> &str;

    /// True while the driver is reading a directive line, where a newline ends
    /// the logical input.
    fn in_directive(&self) -> bool;

    fn position(&self) -> InputPosition;
}

#[derive(Debug)]
enum FrameKind {
    Source { filename: String },
    Stacked { name: Option<String> },
}

#[derive(Debug)]
struct Frame {
    id: InputHandle,
    kind: FrameKind,
    tokens: VecDeque<Token>,
    consumed: usize,
}

/// Concrete [`TokenSource`] over pre-tokenized inputs.
#[derive(Debug)]
pub struct InputStack {
    frames: Vec<Frame>,
    next_id: InputHandle,
    line: u32,
    in_directive: bool,
}

impl InputStack {
    /// Starts with a single source file.
    pub fn new(filename: impl Into<String>, tokens: Vec<Token>) -> Self {
        Self {
            frames: vec![Frame {
                id: 0,
                kind: FrameKind::Source {
                    filename: filename.into(),
                },
                tokens: tokens.into(),
                consumed: 0,
            }],
            next_id: 1,
            line: 1,
            in_directive: false,
        }
    }

    pub fn set_in_directive(&mut self, in_directive: bool) {
        self.in_directive = in_directive;
    }

    /// Number of inputs on the stack, the source file included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }
}

impl TokenSource for InputStack {
    fn next_token(&mut self) -> Token {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Token::Eof;
            };
            if let Some(token) = frame.tokens.pop_front() {
                frame.consumed += 1;
                if let (FrameKind::Source { .. }, Token::Pp(tok)) = (&frame.kind, &token) {
                    if let Some(span) = tok.span {
                        self.line = span.end_line;
                    }
                }
                if matches!(frame.kind, FrameKind::Source { .. }) && token == Token::Newline {
                    self.line += 1;
                }
                return token;
            }
            if matches!(frame.kind, FrameKind::Stacked { .. }) {
                trace!(input = frame.id, "input exhausted");
                self.frames.pop();
                continue;
            }
            return Token::Eof;
        }
    }

    fn push_back(&mut self, token: Token) {
        if token == Token::Eof {
            return;
        }
        if let Some(frame) = self.frames.last_mut() {
            if matches!(frame.kind, FrameKind::Source { .. }) && token == Token::Newline {
                self.line = self.line.saturating_sub(1);
            }
            frame.consumed = frame.consumed.saturating_sub(1);
            frame.tokens.push_front(token);
        }
    }

    fn stack_input(&mut self, tokens: Vec<Token>, name: Option<&str>) -> InputHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.frames.push(Frame {
            id,
            kind: FrameKind::Stacked {
                name: name.map(str::to_string),
            },
            tokens: tokens.into(),
            consumed: 0,
        });
        id
    }

    fn current_input(&self) -> InputHandle {
        self.top().map_or(0, |f| f.id)
    }

    fn current_input_is_exhausted(&self) -> bool {
        self.top().map_or(true, |f| f.tokens.is_empty())
    }

    fn current_input_is_source(&self) -> bool {
        self.top()
            .is_some_and(|f| matches!(f.kind, FrameKind::Source { .. }))
    }

    fn finish_input(&mut self, handle: InputHandle) {
        if let Some(frame) = self.top() {
            if frame.id == handle
                && frame.tokens.is_empty()
                && matches!(frame.kind, FrameKind::Stacked { .. })
            {
                self.frames.pop();
            }
        }
    }

    fn unwind_stacked(&mut self) {
        while self
            .top()
            .is_some_and(|f| matches!(f.kind, FrameKind::Stacked { .. }))
        {
            if let Some(frame) = self.frames.pop() {
                if let FrameKind::Stacked { name } = frame.kind {
                    trace!(input = frame.id, name = ?name, "discarding stacked input");
                }
            }
        }
    }

    fn current_line(&self) -> u32 {
        self.line
    }

    fn current_filename(&self) -> &str {
        self.frames
            .iter()
            .rev()
            .find_map(|f| match &f.kind {
                FrameKind::Source { filename } => Some(filename.as_str()),
                FrameKind::Stacked { .. } => None,
            })
            .unwrap_or("")
    }

    fn in_directive(&self) -> bool {
        self.in_directive
    }

    fn position(&self) -> InputPosition {
        InputPosition {
            input: self.current_input(),
            consumed: self.top().map_or(0, |f| f.consumed),
        }
    }
}
