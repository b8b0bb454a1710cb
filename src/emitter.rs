//! Lowers the instruction tree into the body of a C function.
//!
//! The walk mirrors the parser: an explicit stack of enclosing block openers
//! replaces recursion, and each pop writes one closing brace.

use thiserror::Error;

use crate::ast::{AssignOp, Instruction, InstructionKind, Operand, Program, Relation};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("Encountered instruction of undefined type")]
    UndefinedInstruction,
    #[error("Encountered block opener without a body")]
    MissingBody,
    #[error("Encountered body under a non-block instruction")]
    UnexpectedBody,
    #[error("Invalid target option: {0} must not be empty")]
    EmptyOption(&'static str),
}

pub type EmitResult<T> = Result<T, EmitError>;

/// Names that pass through to the generated C unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOptions {
    pub function_name: String,
    pub integer_type: String,
    /// `inttypes.h` macro that prints `integer_type`.
    pub print_macro: String,
}

impl TargetOptions {
    pub fn new(function_name: impl Into<String>) -> EmitResult<Self> {
        Self {
            function_name: function_name.into(),
            ..Self::default()
        }
        .validated()
    }

    pub fn validated(self) -> EmitResult<Self> {
        if self.function_name.is_empty() {
            return Err(EmitError::EmptyOption("function name"));
        }
        if self.integer_type.is_empty() {
            return Err(EmitError::EmptyOption("integer type"));
        }
        if self.print_macro.is_empty() {
            return Err(EmitError::EmptyOption("print macro"));
        }
        Ok(self)
    }
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            function_name: "program".to_string(),
            integer_type: "uint_fast64_t".to_string(),
            print_macro: "PRIuFAST64".to_string(),
        }
    }
}

pub struct Emitter<'a> {
    options: &'a TargetOptions,
    output: String,
}

impl<'a> Emitter<'a> {
    pub fn new(options: &'a TargetOptions) -> Self {
        Self {
            options,
            output: String::new(),
        }
    }

    /// Emits every statement of `program`, starting at indentation depth 1.
    /// Each statement starts on a fresh line.
    pub fn emit(mut self, program: &Program) -> EmitResult<String> {
        let mut enclosing = Vec::new();
        let mut depth = 1;
        let mut current = program.root();

        loop {
            let instruction = &program[current];
            if instruction.kind == InstructionKind::IfBranchElse {
                self.output.push(' ');
            } else {
                self.newline(depth);
            }
            self.write_instruction(instruction)?;

            match (instruction.kind.is_block_opener(), instruction.body) {
                (true, Some(body)) => {
                    enclosing.push(current);
                    current = body;
                    depth += 1;
                    continue;
                }
                (true, None) => return Err(EmitError::MissingBody),
                (false, Some(_)) => return Err(EmitError::UnexpectedBody),
                (false, None) => {}
            }

            let mut finished = current;
            loop {
                if let Some(next) = program[finished].next {
                    current = next;
                    break;
                }
                let Some(opener) = enclosing.pop() else {
                    return Ok(self.output);
                };
                depth -= 1;
                self.newline(depth);
                self.output.push('}');
                finished = opener;
            }
        }
    }

    fn write_instruction(&mut self, instruction: &Instruction) -> EmitResult<()> {
        let i = instruction.target;
        let j = instruction.source;
        let operand = render_operand(instruction.operand);
        let line = match instruction.kind {
            InstructionKind::Assignment(op) => match op {
                AssignOp::SetConstant => {
                    let constant = match instruction.operand {
                        Operand::Constant(c) | Operand::Variable(c) => c,
                    };
                    format!("x[{i}] = {constant};")
                }
                AssignOp::CopyVariable => format!("x[{i}] = x[{j}];"),
                AssignOp::Add => format!("x[{i}] = x[{j}] + {operand};"),
                AssignOp::SubtractSaturating => {
                    format!("x[{i}] = x[{j}] > {operand} ? x[{j}] - {operand} : 0;")
                }
                AssignOp::Multiply => format!("x[{i}] = x[{j}] * {operand};"),
                AssignOp::DivideInteger => format!("x[{i}] = x[{j}] / {operand};"),
                AssignOp::Modulo => format!("x[{i}] = x[{j}] % {operand};"),
            },
            InstructionKind::BoundedLoop => {
                format!("for ({} i = x[{i}]; i; --i) {{", self.options.integer_type)
            }
            InstructionKind::ConditionalLoop(relation) => {
                format!("while (x[{i}] {} {operand}) {{", c_relation(relation))
            }
            InstructionKind::IfBranchStart(relation) => {
                format!("if (x[{i}] {} {operand}) {{", c_relation(relation))
            }
            InstructionKind::IfBranchElse => "else {".to_string(),
            InstructionKind::Unfilled => return Err(EmitError::UndefinedInstruction),
        };
        self.output.push_str(&line);
        Ok(())
    }

    fn newline(&mut self, depth: usize) {
        self.output.push('\n');
        for _ in 0..depth {
            self.output.push('\t');
        }
    }
}

fn render_operand(operand: Operand) -> String {
    match operand {
        Operand::Constant(c) => c.to_string(),
        Operand::Variable(k) => format!("x[{k}]"),
    }
}

fn c_relation(relation: Relation) -> &'static str {
    match relation {
        Relation::Equal => "==",
        Relation::NotEqual => "!=",
        Relation::Greater => ">",
        Relation::GreaterOrEqual => ">=",
        Relation::Less => "<",
        Relation::LessOrEqual => "<=",
    }
}

pub fn emit(program: &Program, options: &TargetOptions) -> EmitResult<String> {
    Emitter::new(options).emit(program)
}
