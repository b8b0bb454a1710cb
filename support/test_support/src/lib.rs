use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use loop2c::{Extension, GrammarProfile};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseClass {
    TranslationSuccess,
    FrontendError,
}

/// Grammar extensions a case is translated with; absent flags are off.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileSpec {
    pub r#while: bool,
    pub while_extended: bool,
    pub arithmetic: bool,
    pub extended_assignment: bool,
    pub r#if: bool,
    pub if_extended: bool,
    pub missing_whitespace: bool,
}

impl ProfileSpec {
    pub fn grammar_profile(&self) -> GrammarProfile {
        GrammarProfile::base().with_flags([
            (Extension::While, self.r#while),
            (Extension::WhileExtended, self.while_extended),
            (Extension::Arithmetic, self.arithmetic),
            (Extension::ExtendedAssignment, self.extended_assignment),
            (Extension::If, self.r#if),
            (Extension::IfExtended, self.if_extended),
            (Extension::MissingWhitespace, self.missing_whitespace),
        ])
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BenchConfig {
    pub enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tags: Vec::new(),
        }
    }
}

/// One execution: the values passed as `x1, x2, ...` and the expected `x0`.
#[derive(Debug, Deserialize, Clone)]
pub struct RunSpec {
    pub inputs: Vec<u64>,
    pub result: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ExpectedOutcome {
    pub highest_index: Option<u64>,
    /// Exact text of the emitted function body.
    pub body_file: Option<String>,
    pub stderr_contains_file: Option<String>,
    /// `line:column` of the reported diagnostic.
    pub location: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaseSpec {
    pub class: CaseClass,
    #[serde(default)]
    pub profile: ProfileSpec,
    #[serde(default)]
    pub runs: Vec<RunSpec>,
    #[serde(default)]
    pub expected: ExpectedOutcome,
    #[serde(default)]
    pub bench: BenchConfig,
}

#[derive(Debug, Clone)]
pub struct Case {
    pub name: String,
    pub dir: PathBuf,
    pub program_path: PathBuf,
    pub spec: CaseSpec,
}

impl Case {
    pub fn read_text(&self, relative_path: &str) -> Result<String> {
        fs::read_to_string(self.dir.join(relative_path))
            .with_context(|| format!("Reading {} fixture file {}", self.name, relative_path))
    }

    pub fn source(&self) -> Result<String> {
        fs::read_to_string(&self.program_path)
            .with_context(|| format!("Reading {}", self.program_path.display()))
    }
}

pub fn load_cases(programs_dir: &Path) -> Result<Vec<Case>> {
    let mut cases = Vec::new();

    for entry in
        fs::read_dir(programs_dir).with_context(|| format!("Reading {}", programs_dir.display()))?
    {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }

        let case_path = path.join("case.yaml");
        if !case_path.exists() {
            continue;
        }

        let program_path = path.join("program.loop");
        ensure!(
            program_path.exists(),
            "Missing program.loop for case {}",
            path.display()
        );

        let case_name = path
            .file_name()
            .and_then(|value| value.to_str())
            .map(str::to_string)
            .with_context(|| format!("Invalid case directory name {}", path.display()))?;
        let case_raw = fs::read_to_string(&case_path)
            .with_context(|| format!("Reading {}", case_path.display()))?;
        let spec: CaseSpec = serde_yaml::from_str(&case_raw)
            .with_context(|| format!("Parsing {}", case_path.display()))?;

        cases.push(Case {
            name: case_name,
            dir: path,
            program_path,
            spec,
        });
    }

    ensure!(
        !cases.is_empty(),
        "No test cases found in {}",
        programs_dir.display()
    );
    cases.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(cases)
}

pub fn bench_cases(programs_dir: &Path) -> Result<Vec<Case>> {
    let mut cases = load_cases(programs_dir)?;
    cases.retain(|case| case.spec.bench.enabled);
    Ok(cases)
}

pub fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim_end().to_string()
}

/// A scratch directory unique to this process and `label`.
pub fn scratch_dir(label: &str) -> Result<PathBuf> {
    let mut dir = std::env::temp_dir();
    dir.push(format!("loop2c-{label}-{}", std::process::id()));
    fs::create_dir_all(&dir).with_context(|| format!("Creating {}", dir.display()))?;
    Ok(dir)
}
