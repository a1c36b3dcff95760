//! The layout filter.
//!
//! Rewrites the raw token stream by injecting `BlockStart`, `BlockEnd` and
//! `LineFoldEnd` tokens according to the off-side rule, so the parser never
//! has to look at columns.

use crate::token::{Data, Token};
use bolt_diagnostic::TextLoc;
use std::collections::VecDeque;

/// Inserts block and line-fold structure into a raw token stream.
///
/// The filter keeps a stack of open block columns. A block becomes pending
/// when a `.` or `=` ends its physical line; the next, deeper line then
/// opens the block. A line at the same column as the innermost block ends
/// the current line-fold; a shallower line closes blocks. On a dedent the
/// emitted order is `LineFoldEnd (BlockEnd LineFoldEnd)*`: every logical
/// line ends in exactly one `LineFoldEnd`, and each block owner's fold ends
/// right after the block it owns.
///
/// After the raw stream is exhausted the filter flushes all open blocks and
/// then yields `EndOfFile` tokens forever.
pub struct Punctuator<I: Iterator<Item = Token>> {
    tokens: I,
    queue: VecDeque<Token>,
    blocks: Vec<usize>,
    root_column: usize,
    last_line: usize,
    pending_block: bool,
    eof_loc: TextLoc,
    flushed: bool,
}

impl<I: Iterator<Item = Token>> Punctuator<I> {
    pub fn new(tokens: I) -> Self {
        Punctuator {
            tokens,
            queue: VecDeque::new(),
            blocks: Vec::new(),
            root_column: 1,
            last_line: 0,
            pending_block: false,
            eof_loc: TextLoc::new(1, 1),
            flushed: false,
        }
    }

    fn block_column(&self) -> usize {
        self.blocks.last().copied().unwrap_or(self.root_column)
    }

    /// Inject synthetic tokens owed before `token`, which starts a new
    /// physical line.
    fn handle_new_line(&mut self, token: &Token) {
        let column = token.start.column;
        if column > self.block_column() {
            if self.pending_block {
                self.blocks.push(column);
                self.queue
                    .push_back(Token::new(token.start, Data::BlockStart));
            }
            // Deeper than the block without a pending introducer: the
            // current line-fold continues.
            return;
        }

        self.queue
            .push_back(Token::new(token.start, Data::LineFoldEnd));
        while column < self.block_column() {
            self.blocks.pop();
            self.queue.push_back(Token::new(token.start, Data::BlockEnd));
            self.queue
                .push_back(Token::new(token.start, Data::LineFoldEnd));
        }
    }

    fn flush(&mut self) {
        if self.last_line > 0 {
            self.queue
                .push_back(Token::new(self.eof_loc, Data::LineFoldEnd));
            while !self.blocks.is_empty() {
                self.blocks.pop();
                self.queue.push_back(Token::new(self.eof_loc, Data::BlockEnd));
                self.queue
                    .push_back(Token::new(self.eof_loc, Data::LineFoldEnd));
            }
        }
        self.flushed = true;
    }
}

impl<I: Iterator<Item = Token>> Iterator for Punctuator<I> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if let Some(token) = self.queue.pop_front() {
                return Some(token);
            }
            if self.flushed {
                return Some(Token::new(self.eof_loc, Data::EndOfFile));
            }
            match self.tokens.next() {
                None => {
                    self.flush();
                    self.queue
                        .push_back(Token::new(self.eof_loc, Data::EndOfFile));
                }
                Some(token) => {
                    if self.last_line == 0 {
                        self.root_column = token.start.column;
                    } else if token.start.line > self.last_line {
                        self.handle_new_line(&token);
                    }
                    self.last_line = token.end().line;
                    self.eof_loc = token.end();
                    self.pending_block = matches!(token.data, Data::Dot | Data::Equals);
                    self.queue.push_back(token);
                }
            }
        }
    }
}
