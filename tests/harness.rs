use anyhow::{Context, Result, bail, ensure};
use std::path::Path;

use loop2c::backend::Backend;
use loop2c::backend::interpreter::Interpreter;
use loop2c::backend::transpiler::Transpiler;
use loop2c::backend::transpiler::c_runtime::c_compiler_available;
use loop2c::{GrammarProfile, ParseError, Program, TargetOptions, emitter, parser};
use test_support::{Case, CaseClass, load_cases, normalize_output};

fn compiler_required() -> bool {
    std::env::var("LOOP2C_CC_REQUIRED")
        .map(|value| value == "1")
        .unwrap_or(false)
}

fn parse_case(case: &Case) -> Result<std::result::Result<Program, ParseError>> {
    let source = case.source()?;
    let source_name = case.program_path.display().to_string();
    Ok(parser::parse(
        source.as_bytes(),
        &source_name,
        case.spec.profile.grammar_profile(),
    ))
}

fn check_translation(case: &Case, program: &Program) -> Result<()> {
    if let Some(highest) = case.spec.expected.highest_index {
        assert_eq!(
            program.highest_index, highest,
            "Highest index mismatch for {}",
            case.name
        );
    }

    let body = emitter::emit(program, &TargetOptions::default())
        .with_context(|| format!("Emitting {}", case.name))?;
    if let Some(body_file) = case.spec.expected.body_file.as_deref() {
        let expected = case.read_text(body_file)?;
        let actual = body.strip_prefix('\n').unwrap_or(&body);
        assert_eq!(
            normalize_output(actual),
            normalize_output(&expected),
            "Emitted C mismatch for {}",
            case.name
        );
    }
    Ok(())
}

fn run_programs_for_backend(backend: &dyn Backend) -> Result<()> {
    let cases = load_cases(Path::new("tests/programs"))?;

    for case in cases {
        if case.spec.bench.enabled {
            ensure!(
                !case.spec.bench.tags.is_empty(),
                "Case {} has bench enabled but no tags",
                case.name
            );
        }
        let parsed = parse_case(&case)?;
        match case.spec.class {
            CaseClass::TranslationSuccess => {
                let program = parsed.with_context(|| format!("Parsing {}", case.name))?;
                ensure!(
                    !case.spec.runs.is_empty(),
                    "Case {} has no runs",
                    case.name
                );
                check_translation(&case, &program)?;
                let prepared = backend.prepare(&program).with_context(|| {
                    format!("Backend {} failed to prepare {}", backend.name(), case.name)
                })?;
                for run in &case.spec.runs {
                    let actual = prepared.run(&run.inputs).with_context(|| {
                        format!("Backend {} failed for {}", backend.name(), case.name)
                    })?;
                    assert_eq!(
                        actual,
                        run.result,
                        "Backend {} mismatch for {} with inputs {:?}",
                        backend.name(),
                        case.name,
                        run.inputs
                    );
                }
            }
            CaseClass::FrontendError => {
                let expected_file = case
                    .spec
                    .expected
                    .stderr_contains_file
                    .as_deref()
                    .with_context(|| format!("Missing stderr expectation file in {}", case.name))?;
                let expected_error = case.read_text(expected_file)?;
                let expected_error = expected_error.trim();
                let error = match parsed {
                    Ok(_) => bail!("Expected frontend error in {}, but parsing succeeded", case.name),
                    Err(error) => error,
                };
                let diagnostic = error
                    .diagnostic()
                    .with_context(|| format!("Expected a syntax error in {}, got {error}", case.name))?;
                let actual = error.to_string();
                ensure!(
                    actual.contains(expected_error),
                    "Expected frontend error containing '{expected_error}' in {}, got '{actual}'",
                    case.name
                );
                if let Some(location) = case.spec.expected.location.as_deref() {
                    assert_eq!(
                        format!("{}:{}", diagnostic.line, diagnostic.column),
                        location,
                        "Diagnostic location mismatch for {}",
                        case.name
                    );
                }
                ensure!(
                    actual.lines().count() == 3 && actual.ends_with('^'),
                    "Diagnostic for {} lacks the source line and caret: '{actual}'",
                    case.name
                );
            }
        }
    }

    Ok(())
}

#[test]
fn runs_programs_interpreter_backend() -> Result<()> {
    run_programs_for_backend(&Interpreter::new())
}

#[test]
fn runs_programs_transpiler_backend() -> Result<()> {
    if !c_compiler_available() {
        if compiler_required() {
            bail!("C execution required but no cc found.");
        }
        eprintln!("Skipping transpiler parity test: no cc found.");
        return Ok(());
    }
    run_programs_for_backend(&Transpiler::default())
}

#[test]
fn wider_profiles_build_the_same_tree() -> Result<()> {
    let cases = load_cases(Path::new("tests/programs"))?;
    for case in cases {
        let source = case.source()?;
        let Ok(narrow) = loop2c::parse_str(&source, case.spec.profile.grammar_profile()) else {
            continue;
        };
        let widest = loop2c::parse_str(&source, GrammarProfile::all())
            .with_context(|| format!("Case {} rejected by the widest profile", case.name))?;
        assert_eq!(narrow, widest, "Tree mismatch for {}", case.name);
    }
    Ok(())
}
