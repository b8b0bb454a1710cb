use anyhow::Result;
use thiserror::Error;

use crate::ast::{AssignOp, Instruction, InstructionKind, NodeId, Operand, Program, Relation};
use crate::backend::{Backend, PreparedBackend};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Division by zero in x{target} := x{dividend} DIV ...")]
    DivisionByZero { target: u64, dividend: u64 },
    #[error("Modulo by zero in x{target} := x{dividend} MOD ...")]
    ModuloByZero { target: u64, dividend: u64 },
    #[error("Encountered instruction of undefined type")]
    UndefinedInstruction,
    #[error("Variable index {0} does not fit in memory")]
    IndexOutOfRange(u64),
    #[error("Cannot allocate {0} variable slots")]
    MemoryExhausted(u64),
}

/// Tree-walking backend that evaluates programs directly on `u64` slots.
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// An open block awaiting the end of its body.
struct Frame {
    opener: NodeId,
    /// Iterations still owed by a bounded loop, including the running one.
    remaining: u64,
}

pub struct PreparedInterpreter {
    program: Program,
}

impl PreparedInterpreter {
    pub fn new(program: Program) -> Self {
        Self { program }
    }

    /// Runs with `inputs` copied into `x1, x2, ...` and returns `x0`.
    pub fn execute(&self, inputs: &[u64]) -> std::result::Result<u64, RuntimeError> {
        let memory = Memory::with_inputs(self.program.highest_index, inputs)?;
        self.run_memory(memory)?.get(0)
    }

    /// Runs with `initial` as the starting value of `x0, x1, ...` and returns
    /// every slot once the program finishes.
    pub fn execute_slots(&self, initial: &[u64]) -> std::result::Result<Vec<u64>, RuntimeError> {
        let mut memory = Memory::with_inputs(self.program.highest_index, &[])?;
        let copied = initial.len().min(memory.slots.len());
        memory.slots[..copied].copy_from_slice(&initial[..copied]);
        Ok(self.run_memory(memory)?.slots)
    }

    fn run_memory(&self, mut memory: Memory) -> std::result::Result<Memory, RuntimeError> {
        let mut frames: Vec<Frame> = Vec::new();
        let mut current = Some(self.program.root());

        loop {
            let Some(id) = current else {
                let Some(frame) = frames.pop() else {
                    break;
                };
                current = self.resume(frame, &mut frames, &memory)?;
                continue;
            };

            let instruction = &self.program[id];
            current = match instruction.kind {
                InstructionKind::Assignment(op) => {
                    memory.assign(op, instruction)?;
                    instruction.next
                }
                InstructionKind::BoundedLoop => {
                    let count = memory.get(instruction.target)?;
                    if count == 0 {
                        instruction.next
                    } else {
                        frames.push(Frame {
                            opener: id,
                            remaining: count,
                        });
                        instruction.body
                    }
                }
                InstructionKind::ConditionalLoop(relation) => {
                    if memory.test(relation, instruction)? {
                        frames.push(Frame {
                            opener: id,
                            remaining: 0,
                        });
                        instruction.body
                    } else {
                        instruction.next
                    }
                }
                InstructionKind::IfBranchStart(relation) => {
                    if memory.test(relation, instruction)? {
                        frames.push(Frame {
                            opener: id,
                            remaining: 0,
                        });
                        instruction.body
                    } else {
                        match instruction.next {
                            Some(next) if self.program[next].kind == InstructionKind::IfBranchElse => {
                                frames.push(Frame {
                                    opener: next,
                                    remaining: 0,
                                });
                                self.program[next].body
                            }
                            next => next,
                        }
                    }
                }
                // Reached only after the matching then-arm ran.
                InstructionKind::IfBranchElse => instruction.next,
                InstructionKind::Unfilled => return Err(RuntimeError::UndefinedInstruction),
            };
        }

        Ok(memory)
    }

    /// Decides where execution continues once the body of `frame` is done.
    fn resume(
        &self,
        mut frame: Frame,
        frames: &mut Vec<Frame>,
        memory: &Memory,
    ) -> std::result::Result<Option<NodeId>, RuntimeError> {
        let opener = &self.program[frame.opener];
        let repeat = match opener.kind {
            InstructionKind::BoundedLoop => {
                frame.remaining -= 1;
                frame.remaining > 0
            }
            InstructionKind::ConditionalLoop(relation) => memory.test(relation, opener)?,
            _ => false,
        };
        if repeat {
            frames.push(frame);
            Ok(opener.body)
        } else {
            Ok(opener.next)
        }
    }
}

impl PreparedBackend for PreparedInterpreter {
    fn run(&self, inputs: &[u64]) -> Result<u64> {
        Ok(self.execute(inputs)?)
    }
}

impl Backend for Interpreter {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>> {
        Ok(Box::new(PreparedInterpreter::new(program.clone())))
    }
}

struct Memory {
    slots: Vec<u64>,
}

impl Memory {
    /// Slot 0 is the result; inputs fill slots 1..=highest_index.
    fn with_inputs(highest_index: u64, inputs: &[u64]) -> std::result::Result<Self, RuntimeError> {
        let size = usize::try_from(highest_index)
            .ok()
            .and_then(|highest| highest.checked_add(1))
            .ok_or(RuntimeError::IndexOutOfRange(highest_index))?;
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(size)
            .map_err(|_| RuntimeError::MemoryExhausted(highest_index))?;
        slots.resize(size, 0);
        let copied = inputs.len().min(size - 1);
        slots[1..=copied].copy_from_slice(&inputs[..copied]);
        Ok(Self { slots })
    }

    fn get(&self, index: u64) -> std::result::Result<u64, RuntimeError> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.slots.get(index))
            .copied()
            .ok_or(RuntimeError::IndexOutOfRange(index))
    }

    fn set(&mut self, index: u64, value: u64) -> std::result::Result<(), RuntimeError> {
        let slot = usize::try_from(index)
            .ok()
            .and_then(|index| self.slots.get_mut(index))
            .ok_or(RuntimeError::IndexOutOfRange(index))?;
        *slot = value;
        Ok(())
    }

    fn operand(&self, operand: Operand) -> std::result::Result<u64, RuntimeError> {
        match operand {
            Operand::Constant(value) => Ok(value),
            Operand::Variable(index) => self.get(index),
        }
    }

    fn test(
        &self,
        relation: Relation,
        instruction: &Instruction,
    ) -> std::result::Result<bool, RuntimeError> {
        let left = self.get(instruction.target)?;
        let right = self.operand(instruction.operand)?;
        Ok(relation.holds(left, right))
    }

    fn assign(&mut self, op: AssignOp, instruction: &Instruction) -> std::result::Result<(), RuntimeError> {
        let target = instruction.target;
        let source = instruction.source;
        let value = match op {
            AssignOp::SetConstant => self.operand(instruction.operand)?,
            AssignOp::CopyVariable => self.get(source)?,
            AssignOp::Add => self.get(source)?.wrapping_add(self.operand(instruction.operand)?),
            AssignOp::SubtractSaturating => self
                .get(source)?
                .saturating_sub(self.operand(instruction.operand)?),
            AssignOp::Multiply => self.get(source)?.wrapping_mul(self.operand(instruction.operand)?),
            AssignOp::DivideInteger => self
                .get(source)?
                .checked_div(self.operand(instruction.operand)?)
                .ok_or(RuntimeError::DivisionByZero {
                    target,
                    dividend: source,
                })?,
            AssignOp::Modulo => self
                .get(source)?
                .checked_rem(self.operand(instruction.operand)?)
                .ok_or(RuntimeError::ModuloByZero {
                    target,
                    dividend: source,
                })?,
        };
        self.set(target, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;
    use crate::profile::GrammarProfile;
    use indoc::indoc;

    fn run(source: &str, profile: GrammarProfile, inputs: &[u64]) -> u64 {
        let program = parse_str(source, profile).expect("parse");
        PreparedInterpreter::new(program)
            .execute(inputs)
            .expect("execute")
    }

    #[test]
    fn increments_preset_variable() {
        let program = parse_str("x1 := x0 + 1", GrammarProfile::base()).expect("parse");
        let slots = PreparedInterpreter::new(program)
            .execute_slots(&[5])
            .expect("execute");
        assert_eq!(slots, vec![5, 6]);
    }

    #[test]
    fn increments_from_input() {
        // x0 is the result slot, so the input lands in x1.
        assert_eq!(run("x0 := x1 + 1", GrammarProfile::base(), &[5]), 6);
    }

    #[test]
    fn loop_runs_bound_times() {
        let source = "LOOP x1 DO x0 := x0 + 1 END";
        assert_eq!(run(source, GrammarProfile::base(), &[3]), 3);
        assert_eq!(run(source, GrammarProfile::base(), &[0]), 0);
    }

    #[test]
    fn loop_bound_is_read_once() {
        let source = "LOOP x1 DO x1 := x1 + 1; x0 := x0 + 1 END";
        assert_eq!(run(source, GrammarProfile::base(), &[4]), 4);
    }

    #[test]
    fn if_else_selects_one_arm() {
        let source = "IF x1 = 0 THEN x0 := 1 ELSE x0 := 2 END";
        let profile = GrammarProfile::base().with_if_extended().with_extended_assignment();
        assert_eq!(run(source, profile, &[1]), 2);
        assert_eq!(run(source, profile, &[0]), 1);
    }

    #[test]
    fn while_counts_down() {
        let source = "WHILE x1 != 0 DO x1 := x1 - 1; x0 := x0 + 2 END";
        assert_eq!(run(source, GrammarProfile::base().with_while(), &[4]), 8);
    }

    #[test]
    fn subtraction_saturates_at_zero() {
        assert_eq!(run("x0 := x1 - 7", GrammarProfile::base(), &[3]), 0);
        let profile = GrammarProfile::base().with_extended_assignment();
        assert_eq!(run("x0 := x1 - x2", profile, &[3, 10]), 0);
        assert_eq!(run("x0 := x1 - x2", profile, &[10, 3]), 7);
    }

    #[test]
    fn multiplication_by_nested_loops() {
        let source = indoc! {"
            LOOP x1 DO
                LOOP x2 DO
                    x0 := x0 + 1
                END
            END
        "};
        assert_eq!(run(source, GrammarProfile::base(), &[6, 7]), 42);
    }

    #[test]
    fn extra_inputs_are_ignored() {
        assert_eq!(run("x0 := x1 + 0", GrammarProfile::base(), &[2, 9, 9]), 2);
    }

    #[test]
    fn division_by_zero_is_reported() {
        let program = parse_str("x0 := x1 DIV 0", GrammarProfile::base().with_arithmetic())
            .expect("parse");
        let err = PreparedInterpreter::new(program)
            .execute(&[4])
            .expect_err("division by zero");
        assert_eq!(
            err,
            RuntimeError::DivisionByZero {
                target: 0,
                dividend: 1
            }
        );
    }

    #[test]
    fn huge_variable_index_is_an_error() {
        let program = parse_str("x0 := x2305843009213693952 + 1", GrammarProfile::base())
            .expect("parse");
        let err = PreparedInterpreter::new(program)
            .execute(&[])
            .expect_err("allocation must fail");
        assert_eq!(err, RuntimeError::MemoryExhausted(2305843009213693952));

        let program = parse_str("x0 := x18446744073709551615 + 1", GrammarProfile::base())
            .expect("parse");
        let err = PreparedInterpreter::new(program)
            .execute(&[])
            .expect_err("index out of range");
        assert_eq!(err, RuntimeError::IndexOutOfRange(u64::MAX));
    }

    #[test]
    fn backend_trait_runs_program() -> Result<()> {
        let program = parse_str("x0 := x1 + x2", GrammarProfile::base().with_extended_assignment())?;
        let interpreter = Interpreter::new();
        assert_eq!(interpreter.name(), "interpreter");
        assert_eq!(interpreter.run(&program, &[20, 22])?, 42);
        Ok(())
    }
}
