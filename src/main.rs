use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use loop2c::backend::PreparedBackend;
use loop2c::backend::interpreter::PreparedInterpreter;
use loop2c::backend::transpiler::Transpiler;
use loop2c::{Extension, GrammarProfile, ParseError, TargetOptions, parse};

/// Translate LOOP, WHILE and IF programs into C.
#[derive(Debug, Parser)]
#[command(name = "loop2c", disable_version_flag = true)]
struct Args {
    /// Program to translate.
    file: Option<PathBuf>,

    /// Place the output into <file>; ".c" is appended when missing.
    #[arg(short, long, value_name = "file", default_value = "a")]
    output: String,

    /// Name of the generated function.
    #[arg(short, long, value_name = "name", default_value = "program")]
    name: String,

    /// Also generate and include a header file.
    #[arg(short = 'H', long)]
    header: bool,

    /// Also accept multiplication, division, and modulo.
    #[arg(short = 'O', long)]
    operations: bool,

    /// Also accept various different assignments.
    #[arg(short = 'a', long)]
    assignment: bool,

    /// Also accept basic IF programs.
    #[arg(short = 'i', long = "if")]
    if_basic: bool,

    /// Also accept various different IF programs.
    #[arg(short = 'I', long = "ifExtended")]
    if_extended: bool,

    /// Also accept basic WHILE programs.
    #[arg(short = 'w', long = "while")]
    while_basic: bool,

    /// Also accept various different WHILE programs.
    #[arg(short = 'W', long = "whileExtended")]
    while_extended: bool,

    /// Also accept programs with missing whitespace.
    #[arg(short = 'N', long = "noWhitespace")]
    no_whitespace: bool,

    /// The same as -O -a -I.
    #[arg(short = 'k', long)]
    klausur: bool,

    /// Interpret the program with the given inputs and print x0 instead of
    /// writing C.
    #[arg(short = 'r', long, value_name = "VALUE", num_args = 0..)]
    run: Option<Vec<u64>>,

    /// Display version information.
    #[arg(short = 'v', long)]
    version: bool,
}

impl Args {
    fn profile(&self) -> GrammarProfile {
        let preset = if self.klausur {
            GrammarProfile::exam()
        } else {
            GrammarProfile::base()
        };
        preset.with_flags([
            (Extension::Arithmetic, self.operations),
            (Extension::ExtendedAssignment, self.assignment),
            (Extension::If, self.if_basic),
            (Extension::IfExtended, self.if_extended),
            (Extension::While, self.while_basic),
            (Extension::WhileExtended, self.while_extended),
            (Extension::MissingWhitespace, self.no_whitespace),
        ])
    }
}

/// Appends ".c" unless the name already ends with it.
fn output_path(output: &str) -> PathBuf {
    if output.len() >= 2 && output.ends_with(".c") {
        PathBuf::from(output)
    } else {
        PathBuf::from(format!("{output}.c"))
    }
}

fn header_path(output: &Path) -> PathBuf {
    output.with_extension("h")
}

fn run(args: &Args) -> Result<()> {
    if args.version {
        println!("LOOP to C transpiler {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let file = args.file.as_ref().context("No input file")?;
    let source_name = file.display().to_string();
    let input = File::open(file).with_context(|| format!("Opening {source_name}"))?;
    let program = parse(BufReader::new(input), &source_name, args.profile())?;

    if let Some(inputs) = &args.run {
        let result = PreparedInterpreter::new(program).run(inputs)?;
        println!("{result}");
        return Ok(());
    }

    let options = TargetOptions::new(args.name.as_str())?;
    let output = output_path(&args.output);
    let mut transpiler = Transpiler::new(options);
    let header = if args.header {
        let header = header_path(&output);
        let include = header
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("Invalid output file name {}", output.display()))?;
        transpiler = transpiler.with_header(include);
        Some(header)
    } else {
        None
    };

    // Everything is rendered before any file is created.
    let source = transpiler.transpile(&program)?;
    fs::write(&output, source).with_context(|| format!("Writing {}", output.display()))?;
    if let Some(header) = header
        && let Err(err) = fs::write(&header, transpiler.header())
    {
        let _ = fs::remove_file(&output);
        return Err(err).with_context(|| format!("Writing {}", header.display()));
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<ParseError>().and_then(ParseError::diagnostic) {
                Some(diagnostic) => eprintln!("{diagnostic}"),
                None => eprintln!("loop2c: error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
