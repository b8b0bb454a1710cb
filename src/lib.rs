pub mod ast;
pub mod backend;
pub mod diagnostic;
pub mod emitter;
pub mod parser;
pub mod profile;
pub mod reader;

pub use ast::Program;
pub use emitter::TargetOptions;
pub use parser::{ParseError, parse, parse_str};
pub use profile::{Extension, GrammarProfile};
