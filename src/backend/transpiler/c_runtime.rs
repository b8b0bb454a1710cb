use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::emitter::TargetOptions;

pub const C_INCLUDES: &str = r#"#include <stdlib.h>
#include <stdio.h>
#include <string.h>
#include <inttypes.h>
"#;

pub fn header_include(header_name: &str) -> String {
    format!("#include \"{header_name}\"\n")
}

/// Opens the generated function and loads the caller's values into `x[1..]`.
pub fn function_prologue(options: &TargetOptions, highest_index: u64) -> String {
    let TargetOptions {
        function_name: name,
        integer_type: ty,
        ..
    } = options;
    let slots = u128::from(highest_index) + 1;
    format!(
        "\n\
         {ty} {name}({ty} argc, {ty} *argv) {{\n\
         \t{ty} *x = calloc({slots}, sizeof({ty}));\n\
         \t{ty} n = argc < {highest_index} ? argc : {highest_index};\n\
         \tmemcpy(x + 1, argv, n * sizeof({ty}));\n"
    )
}

/// Returns `x[0]`, closes the function and adds a `main` that forwards the
/// command-line arguments.
pub fn function_epilogue(options: &TargetOptions) -> String {
    let TargetOptions {
        function_name: name,
        integer_type: ty,
        print_macro,
    } = options;
    format!(
        "\n\
         \n\
         \t{ty} ret = x[0];\n\
         \tfree(x);\n\
         \treturn ret;\n\
         }}\n\
         \n\
         int main(int argc, char **argv) {{\n\
         \t{ty} *arr = malloc((argc - 1) * sizeof({ty}));\n\
         \tfor (int i = 0; i < argc - 1; ++i) {{\n\
         \t\tarr[i] = strtoull(argv[i + 1], NULL, 10);\n\
         \t}}\n\
         \t{ty} res = {name}(argc - 1, arr);\n\
         \tfree(arr);\n\
         \tprintf(\"%\" {print_macro} \"\\n\", res);\n\
         \treturn 0;\n\
         }}\n"
    )
}

pub fn header_file(options: &TargetOptions) -> String {
    let TargetOptions {
        function_name: name,
        integer_type: ty,
        ..
    } = options;
    format!(
        "#ifndef LOOP_{name}_H\n\
         #define LOOP_{name}_H\n\
         \n\
         {ty} {name}({ty} argc, {ty} *argv);\n\
         \n\
         #endif\n"
    )
}

pub fn c_compiler_available() -> bool {
    Command::new("cc")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

pub fn temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push("loop2c");
    dir
}

/// Writes `contents` to a fresh `<label>_<pid>_<nanos>.c` and returns it with
/// the matching binary path.
pub fn write_temp_file(contents: &str, label: &str, suffix: &str) -> Result<(PathBuf, PathBuf)> {
    let dir = temp_dir();
    fs::create_dir_all(&dir).context("Creating temp directory")?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let file_stem = format!("{label}_{}_{nanos}", std::process::id());
    let source_path = dir.join(format!("{file_stem}.c"));
    let binary_path = dir.join(format!("{file_stem}{suffix}"));

    fs::write(&source_path, contents).context("Writing C source")?;
    Ok((source_path, binary_path))
}

/// Compiles `source` with `cc`. Nothing is left on disk when this fails.
pub fn compile_source(
    source: &str,
    label: &str,
    suffix: &str,
    compile_error: &str,
) -> Result<(PathBuf, PathBuf)> {
    let (source_path, binary_path) = write_temp_file(source, label, suffix)?;
    let compile = Command::new("cc")
        .arg(&source_path)
        .arg("-std=c99")
        .arg("-O2")
        .arg("-o")
        .arg(&binary_path)
        .output();
    let compile = match compile {
        Ok(compile) => compile,
        Err(err) => {
            let _ = fs::remove_file(&source_path);
            return Err(err).context("Running C compiler");
        }
    };
    if !compile.status.success() {
        let _ = fs::remove_file(&source_path);
        let _ = fs::remove_file(&binary_path);
        let stderr = String::from_utf8_lossy(&compile.stderr);
        bail!("{compile_error}: {stderr}");
    }
    Ok((source_path, binary_path))
}

pub fn run_compiled_binary(binary_path: &Path, args: &[u64], run_error: &str) -> Result<u64> {
    let output = Command::new(binary_path)
        .args(args.iter().map(u64::to_string))
        .output()
        .context("Running compiled program")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{run_error}: {stderr}");
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .trim()
        .parse::<u64>()
        .with_context(|| format!("Parsing program output '{}'", stdout.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leftovers(prefix: &str) -> usize {
        fs::read_dir(temp_dir())
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn failed_compilation_removes_temp_source() {
        if !c_compiler_available() {
            eprintln!("Skipping C compilation test: no cc found.");
            return;
        }
        let label = "rejected";
        let prefix = format!("{label}_{}_", std::process::id());
        let err = compile_source("int main(void) { return }", label, ".bin", "C compilation failed")
            .expect_err("invalid C must not compile");
        assert!(err.to_string().starts_with("C compilation failed"));
        assert_eq!(leftovers(&prefix), 0);
    }
}
