use anyhow::Result;

use crate::ast::Program;

pub mod interpreter;
pub mod transpiler;

/// Executable artifact produced by a backend `prepare` step.
///
/// Preparing once and running many times lets tests feed several input
/// vectors through one compiled program.
pub trait PreparedBackend {
    /// Runs the program with `inputs` placed in `x1, x2, ...` and returns `x0`.
    fn run(&self, inputs: &[u64]) -> Result<u64>;
}

/// Common interface implemented by each execution backend.
pub trait Backend {
    fn name(&self) -> &'static str;
    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>>;

    fn run(&self, program: &Program, inputs: &[u64]) -> Result<u64> {
        self.prepare(program)?.run(inputs)
    }
}

pub fn backends() -> Vec<Box<dyn Backend>> {
    vec![
        Box::new(interpreter::Interpreter::new()),
        Box::new(transpiler::Transpiler::default()),
    ]
}
