//! Builds the instruction tree straight from characters.
//!
//! There is no separate token stream: every production reads bytes from the
//! [`PositionedReader`] with at most one byte of push back. Nested blocks are
//! tracked with an explicit stack of open block openers instead of recursive
//! calls, so one loop drives the whole parse.

use std::io::BufRead;

use crate::ast::{AssignOp, InstructionKind, NodeId, Operand, Program, Relation};
use crate::diagnostic::Diagnostic;
use crate::profile::GrammarProfile;
use crate::reader::PositionedReader;

mod error;

pub use error::{ParseError, ParseResult, SyntaxError};

/// Where the main loop continues after a statement has been closed off.
enum Continuation {
    Statement(NodeId),
    Finished,
}

pub struct Parser<R> {
    reader: PositionedReader<R>,
    source_name: String,
    profile: GrammarProfile,
    program: Program,
    open_blocks: Vec<NodeId>,
}

impl<R: BufRead> Parser<R> {
    pub fn new(reader: PositionedReader<R>, source_name: impl Into<String>, profile: GrammarProfile) -> Self {
        Self {
            reader,
            source_name: source_name.into(),
            profile,
            program: Program::new(),
            open_blocks: Vec::new(),
        }
    }

    pub fn parse_program(mut self) -> ParseResult<Program> {
        let mut current = self.program.root();

        loop {
            self.skip_whitespace(0)?;
            let trailing = match self.next()? {
                None => return Err(self.error(SyntaxError::UnexpectedEndOfFile)),
                Some(b'x') => self.parse_assignment(current)?,
                Some(b'L') => {
                    self.parse_loop(current)?;
                    current = self.open_block(current);
                    continue;
                }
                Some(b'W') if self.profile.while_loops() => {
                    self.parse_while(current)?;
                    current = self.open_block(current);
                    continue;
                }
                Some(b'I') if self.profile.if_branches() => {
                    self.parse_if(current)?;
                    current = self.open_block(current);
                    continue;
                }
                Some(_) => return Err(self.error(SyntaxError::ExpectedInstruction)),
            };

            match self.finish_statement(current, trailing)? {
                Continuation::Statement(next) => current = next,
                Continuation::Finished => break,
            }
        }

        Ok(self.program)
    }

    /// Handles what follows a complete statement: `;`, a run of `END`s, an
    /// `ELSE`, or the end of input. Chained closers are resolved here without
    /// going back through statement parsing.
    fn finish_statement(&mut self, mut current: NodeId, mut trailing: usize) -> ParseResult<Continuation> {
        loop {
            match self.next()? {
                Some(b';') => return Ok(Continuation::Statement(self.program.append_next(current))),
                Some(b'E') => {
                    if trailing == 0 && !self.profile.allow_missing_whitespace {
                        return Err(self.error(SyntaxError::ExpectedWhitespace));
                    }
                    match self.next()? {
                        Some(b'N') => {
                            self.expect_literal("D")?;
                            current = self
                                .open_blocks
                                .pop()
                                .ok_or_else(|| self.error(SyntaxError::UnexpectedEnd))?;
                            trailing = self.skip_whitespace(0)?;
                        }
                        Some(b'L') => {
                            self.expect_literal("SE")?;
                            let else_branch = self.open_else()?;
                            self.skip_whitespace(1)?;
                            return Ok(Continuation::Statement(self.open_block(else_branch)));
                        }
                        None => return Err(self.error(SyntaxError::UnexpectedEndOfFile)),
                        Some(_) if self.profile.allow_if_extended => {
                            return Err(self.error(SyntaxError::ExpectedEndOrElse));
                        }
                        Some(_) => return Err(self.error(SyntaxError::ExpectedEnd)),
                    }
                }
                None => {
                    if !self.open_blocks.is_empty() {
                        return Err(self.error(SyntaxError::UnexpectedEndOfFile));
                    }
                    return Ok(Continuation::Finished);
                }
                Some(_) if self.open_blocks.is_empty() => {
                    return Err(self.error(SyntaxError::ExpectedSeparatorOrEof));
                }
                Some(_) => return Err(self.error(SyntaxError::ExpectedSeparatorOrEnd)),
            }
        }
    }

    /// Closes the innermost `IF` arm and returns the new `ELSE` node placed
    /// right after it.
    fn open_else(&mut self) -> ParseResult<NodeId> {
        if !self.profile.allow_if_extended {
            return Err(self.error(SyntaxError::UnexpectedElse));
        }
        let Some(if_start) = self.open_blocks.pop() else {
            return Err(self.error(SyntaxError::UnexpectedElse));
        };
        if !matches!(self.program[if_start].kind, InstructionKind::IfBranchStart(_)) {
            return Err(self.error(SyntaxError::UnexpectedElse));
        }
        let else_branch = self.program.append_next(if_start);
        self.program[else_branch].kind = InstructionKind::IfBranchElse;
        Ok(else_branch)
    }

    fn open_block(&mut self, opener: NodeId) -> NodeId {
        self.open_blocks.push(opener);
        self.program.open_body(opener)
    }

    /// Parses the remainder of `x<i> := ...` after the leading `x` and returns
    /// the amount of whitespace that followed it.
    fn parse_assignment(&mut self, node: NodeId) -> ParseResult<usize> {
        let target = self.parse_index()?;
        self.program[node].target = target;
        self.skip_whitespace(1)?;
        self.expect_literal(":=")?;
        self.skip_whitespace(1)?;

        if self.profile.allow_extended_assignment && self.peek()?.is_some_and(|c| c.is_ascii_digit()) {
            let constant = self.parse_number()?;
            let instruction = &mut self.program[node];
            instruction.kind = InstructionKind::Assignment(AssignOp::SetConstant);
            instruction.operand = Operand::Constant(constant);
            return self.skip_whitespace(0);
        }

        self.expect_literal("x")?;
        let source = self.parse_index()?;
        self.program[node].source = source;

        if self.profile.allow_extended_assignment {
            let trailing = self.skip_whitespace(0)?;
            let lookahead = self.peek()?;
            if matches!(lookahead, None | Some(b';') | Some(b'E')) {
                if lookahead == Some(b'E') && trailing == 0 && !self.profile.allow_missing_whitespace {
                    return Err(self.error(SyntaxError::ExpectedWhitespace));
                }
                self.program[node].kind = InstructionKind::Assignment(AssignOp::CopyVariable);
                return Ok(trailing);
            }
        } else {
            self.skip_whitespace(1)?;
        }

        let op = self.parse_assign_op()?;
        self.skip_whitespace(1)?;

        let operand = if self.profile.allow_extended_assignment {
            match self.next()? {
                Some(b'x') => Operand::Variable(self.parse_index()?),
                Some(c) if c.is_ascii_digit() => {
                    self.reader.push_back();
                    Operand::Constant(self.parse_number()?)
                }
                None => return Err(self.error(SyntaxError::UnexpectedEndOfFile)),
                Some(_) => return Err(self.error(SyntaxError::ExpectedOperand)),
            }
        } else {
            Operand::Constant(self.parse_number()?)
        };

        let instruction = &mut self.program[node];
        instruction.kind = InstructionKind::Assignment(op);
        instruction.operand = operand;
        self.skip_whitespace(0)
    }

    fn parse_assign_op(&mut self) -> ParseResult<AssignOp> {
        let arithmetic = self.profile.allow_arithmetic;
        match self.next()? {
            Some(b'+') => Ok(AssignOp::Add),
            Some(b'-') => Ok(AssignOp::SubtractSaturating),
            Some(b'*') if arithmetic => Ok(AssignOp::Multiply),
            Some(b'D') if arithmetic => {
                self.expect_literal("IV")?;
                Ok(AssignOp::DivideInteger)
            }
            Some(b'M') if arithmetic => {
                self.expect_literal("OD")?;
                Ok(AssignOp::Modulo)
            }
            None => Err(self.error(SyntaxError::UnexpectedEndOfFile)),
            Some(_) if arithmetic => Err(self.error(SyntaxError::ExpectedExtendedOperator)),
            Some(_) => Err(self.error(SyntaxError::ExpectedOperator)),
        }
    }

    fn parse_loop(&mut self, node: NodeId) -> ParseResult<()> {
        self.program[node].kind = InstructionKind::BoundedLoop;
        self.expect_literal("OOP")?;
        self.skip_whitespace(1)?;
        self.expect_literal("x")?;
        self.program[node].target = self.parse_index()?;
        self.skip_whitespace(1)?;
        self.expect_literal("DO")?;
        self.skip_whitespace(1)?;
        Ok(())
    }

    fn parse_while(&mut self, node: NodeId) -> ParseResult<()> {
        self.expect_literal("HILE")?;
        self.skip_whitespace(1)?;
        self.expect_literal("x")?;
        self.program[node].target = self.parse_index()?;
        self.skip_whitespace(1)?;

        let extended = self.profile.allow_while_extended;
        let relation = match self.next()? {
            Some(b'!') => {
                self.expect_literal("=")?;
                Relation::NotEqual
            }
            Some(c) if extended => self.parse_extended_relation(c)?,
            None => return Err(self.error(SyntaxError::UnexpectedEndOfFile)),
            Some(_) => return Err(self.error(SyntaxError::ExpectedRelation("\"!=\""))),
        };
        self.skip_whitespace(1)?;
        self.program[node].operand = self.parse_test_operand(extended)?;
        self.program[node].kind = InstructionKind::ConditionalLoop(relation);
        self.skip_whitespace(1)?;
        self.expect_literal("DO")?;
        self.skip_whitespace(1)?;
        Ok(())
    }

    fn parse_if(&mut self, node: NodeId) -> ParseResult<()> {
        self.expect_literal("F")?;
        self.skip_whitespace(1)?;
        self.expect_literal("x")?;
        self.program[node].target = self.parse_index()?;
        self.skip_whitespace(1)?;

        let extended = self.profile.allow_if_extended;
        let relation = match self.next()? {
            Some(b'=') => Relation::Equal,
            Some(c) if extended => self.parse_extended_relation(c)?,
            None => return Err(self.error(SyntaxError::UnexpectedEndOfFile)),
            Some(_) => return Err(self.error(SyntaxError::ExpectedRelation("'='"))),
        };
        self.skip_whitespace(1)?;
        self.program[node].operand = self.parse_test_operand(extended)?;
        self.program[node].kind = InstructionKind::IfBranchStart(relation);
        self.skip_whitespace(1)?;
        self.expect_literal("THEN")?;
        self.skip_whitespace(1)?;
        Ok(())
    }

    /// `first` has already been consumed.
    fn parse_extended_relation(&mut self, first: u8) -> ParseResult<Relation> {
        match first {
            b'=' => Ok(Relation::Equal),
            b'!' => {
                self.expect_literal("=")?;
                Ok(Relation::NotEqual)
            }
            b'>' => Ok(self.relation_or_equal(Relation::Greater, Relation::GreaterOrEqual)?),
            b'<' => Ok(self.relation_or_equal(Relation::Less, Relation::LessOrEqual)?),
            _ => Err(self.error(SyntaxError::ExpectedExtendedRelation)),
        }
    }

    fn relation_or_equal(&mut self, strict: Relation, inclusive: Relation) -> ParseResult<Relation> {
        if self.next()? == Some(b'=') {
            Ok(inclusive)
        } else {
            self.reader.push_back();
            Ok(strict)
        }
    }

    /// Extended tests take a number or `x<k>`; base tests only the literal `0`.
    fn parse_test_operand(&mut self, extended: bool) -> ParseResult<Operand> {
        if !extended {
            self.expect_literal("0")?;
            return Ok(Operand::Constant(0));
        }
        if self.next()? == Some(b'x') {
            Ok(Operand::Variable(self.parse_index()?))
        } else {
            self.reader.push_back();
            Ok(Operand::Constant(self.parse_number()?))
        }
    }

    /// Parses the digits of `x<n>` and records `n` as referenced.
    fn parse_index(&mut self) -> ParseResult<u64> {
        let index = self.parse_number()?;
        self.program.note_index(index);
        Ok(index)
    }

    fn parse_number(&mut self) -> ParseResult<u64> {
        let mut value: u64 = 0;
        let mut digits = 0;
        let last = loop {
            match self.next()? {
                Some(c) if c.is_ascii_digit() => {
                    value = value
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(u64::from(c - b'0')))
                        .ok_or_else(|| self.error(SyntaxError::NumberTooLarge))?;
                    digits += 1;
                }
                other => break other,
            }
        };
        if digits == 0 {
            return Err(match last {
                None => self.error(SyntaxError::UnexpectedEndOfFile),
                Some(_) => self.error(SyntaxError::ExpectedNumber),
            });
        }
        self.reader.push_back();
        Ok(value)
    }

    /// Consumes whitespace and returns how much was skipped. Fewer than
    /// `minimum` characters is an error unless whitespace may be omitted.
    fn skip_whitespace(&mut self, minimum: usize) -> ParseResult<usize> {
        let mut count = 0;
        let last = loop {
            match self.next()? {
                Some(b' ' | b'\t' | b'\r' | b'\n') => count += 1,
                other => break other,
            }
        };
        if count < minimum && !self.profile.allow_missing_whitespace {
            return Err(match last {
                None => self.error(SyntaxError::UnexpectedEndOfFile),
                Some(_) => self.error(SyntaxError::ExpectedWhitespace),
            });
        }
        self.reader.push_back();
        Ok(count)
    }

    fn expect_literal(&mut self, literal: &'static str) -> ParseResult<()> {
        for expected in literal.bytes() {
            match self.next()? {
                Some(c) if c == expected => {}
                None => return Err(self.error(SyntaxError::UnexpectedEndOfFile)),
                Some(c) => {
                    return Err(self.error(SyntaxError::ExpectedLiteral {
                        expected: literal,
                        found: char::from(c),
                    }));
                }
            }
        }
        Ok(())
    }

    fn peek(&mut self) -> ParseResult<Option<u8>> {
        let next = self.next()?;
        self.reader.push_back();
        Ok(next)
    }

    fn next(&mut self) -> ParseResult<Option<u8>> {
        self.reader.next_char().map_err(|source| ParseError::Io {
            source_name: self.source_name.clone(),
            source,
        })
    }

    fn error(&self, kind: SyntaxError) -> ParseError {
        let diagnostic = Diagnostic::capture(&self.reader, &self.source_name, kind.to_string());
        ParseError::Syntax { kind, diagnostic }
    }
}

/// Parses a whole program from `input`.
pub fn parse<R: BufRead>(input: R, source_name: &str, profile: GrammarProfile) -> ParseResult<Program> {
    Parser::new(PositionedReader::new(input), source_name, profile).parse_program()
}

pub fn parse_str(source: &str, profile: GrammarProfile) -> ParseResult<Program> {
    parse(source.as_bytes(), "<input>", profile)
}
