use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use self::c_runtime::{
    C_INCLUDES, compile_source, function_epilogue, function_prologue, header_file,
    header_include, run_compiled_binary,
};
use crate::ast::Program;
use crate::backend::{Backend, PreparedBackend};
use crate::emitter::{TargetOptions, emit};

pub mod c_runtime;

/// Wraps the emitted function body into a complete C translation unit.
#[derive(Debug, Clone, Default)]
pub struct Transpiler {
    options: TargetOptions,
    header_name: Option<String>,
}

pub struct PreparedTranspiler {
    source_path: PathBuf,
    binary_path: PathBuf,
}

impl Transpiler {
    pub fn new(options: TargetOptions) -> Self {
        Self {
            options,
            header_name: None,
        }
    }

    /// Makes the generated source `#include` the named companion header.
    pub fn with_header(mut self, header_name: impl Into<String>) -> Self {
        self.header_name = Some(header_name.into());
        self
    }

    pub fn transpile(&self, program: &Program) -> Result<String> {
        let body = emit(program, &self.options)?;

        let mut output = String::new();
        output.push_str(C_INCLUDES);
        if let Some(header_name) = &self.header_name {
            output.push_str(&header_include(header_name));
        }
        output.push_str(&function_prologue(&self.options, program.highest_index));
        output.push_str(&body);
        output.push_str(&function_epilogue(&self.options));
        Ok(output)
    }

    /// Declaration-only companion file for the generated function.
    pub fn header(&self) -> String {
        header_file(&self.options)
    }
}

impl Backend for Transpiler {
    fn name(&self) -> &'static str {
        "transpiler"
    }

    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>> {
        // A header include would point at a file that is never written here.
        let standalone = Transpiler::new(self.options.clone());
        let source = standalone.transpile(program)?;
        let (source_path, binary_path) =
            compile_source(
            &source,
            "transpile",
            ".bin",
            "C compilation failed in prepare phase",
        )?;
        Ok(Box::new(PreparedTranspiler {
            source_path,
            binary_path,
        }))
    }
}

impl PreparedBackend for PreparedTranspiler {
    fn run(&self, inputs: &[u64]) -> Result<u64> {
        run_compiled_binary(&self.binary_path, inputs, "Transpiled program failed")
    }
}

impl Drop for PreparedTranspiler {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.source_path);
        let _ = fs::remove_file(&self.binary_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;
    use crate::profile::GrammarProfile;
    use super::c_runtime::c_compiler_available;
    use indoc::indoc;

    #[test]
    fn wraps_body_with_function_and_main() -> Result<()> {
        let program = parse_str("x0 := x2 + 1", GrammarProfile::base())?;
        let source = Transpiler::default().transpile(&program)?;
        assert!(source.starts_with(C_INCLUDES));
        assert!(source.contains("uint_fast64_t program(uint_fast64_t argc, uint_fast64_t *argv) {"));
        assert!(source.contains("\tuint_fast64_t *x = calloc(3, sizeof(uint_fast64_t));"));
        assert!(source.contains("\tuint_fast64_t n = argc < 2 ? argc : 2;"));
        assert!(source.contains("\n\tx[0] = x[2] + 1;\n"));
        assert!(source.contains("printf(\"%\" PRIuFAST64 \"\\n\", res);"));
        assert!(!source.contains("#include \""));
        Ok(())
    }

    #[test]
    fn header_uses_function_name() -> Result<()> {
        let transpiler = Transpiler::new(TargetOptions::new("square")?).with_header("out.h");
        let program = parse_str("x0 := x1 + 0", GrammarProfile::base())?;
        let source = transpiler.transpile(&program)?;
        assert!(source.contains("#include \"out.h\"\n"));
        assert_eq!(
            transpiler.header(),
            indoc! {"
                #ifndef LOOP_square_H
                #define LOOP_square_H

                uint_fast64_t square(uint_fast64_t argc, uint_fast64_t *argv);

                #endif
            "}
        );
        Ok(())
    }

    #[test]
    fn slow_compiled_program_matches_interpreter() -> Result<()> {
        if !c_compiler_available() {
            eprintln!("Skipping C execution test: no cc found.");
            return Ok(());
        }
        let source = "IF x1 = 0 THEN x0 := 1 ELSE x0 := 2 END; LOOP x2 DO x0 := x0 + 1 END";
        let program = parse_str(source, GrammarProfile::exam())?;
        let prepared = Transpiler::default().prepare(&program)?;
        assert_eq!(prepared.run(&[1, 3])?, 5);
        assert_eq!(prepared.run(&[0, 0])?, 1);
        Ok(())
    }
}
