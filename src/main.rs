//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las fases del proceso de traducción y
//! expone una CLI: análisis léxico, parsing con resolución de
//! alcances, verificación semántica y evaluación, deteniéndose en
//! el primer error reportado.

use anyhow::Context;
use clap::{crate_version, Arg, Command};
use log::{debug, trace};
use minic::{
    error::Report,
    eval::Evaluator,
    lex::Lexer,
    parse,
    source::Located,
    tables::{LiteralTable, VariableTable},
};

use std::{fs, io, process};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("MiniC translator")
        .version(crate_version!())
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .multiple_occurrences(true)
                .help("Increase logging verbosity"),
        )
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .required(true)
                .help("MiniC source file to translate"),
        )
        .get_matches();

    let level = match args.occurrences_of("verbose") {
        0 => log::Level::Warn,
        1 => log::Level::Debug,
        _ => log::Level::Trace,
    };

    simple_logger::init_with_level(level)?;

    let path = args.value_of("file").unwrap();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read source file: {}", path))?;

    translate(path, &text)
}

/// Corre la pipeline completa sobre un archivo ya leído.
///
/// Los errores estáticos terminan el proceso con estado 1, los de
/// ejecución con estado -1, y `exit(code)` con el código pedido.
fn translate(name: &str, text: &str) -> anyhow::Result<()> {
    let mut literals = LiteralTable::default();
    let mut variables = VariableTable::default();

    debug!("lexical analysis of {}", name);
    let lexer = Lexer::new(text.chars(), &mut literals, &mut variables);
    let lexemes = match lexer.analyze() {
        Ok(lexemes) => lexemes,
        Err(error) => abort(name, error),
    };

    for lexeme in &lexemes {
        trace!("lexeme {:?}", lexeme);
    }

    debug!("parsing {} lexemes", lexemes.len());
    let tree = match parse::parse(lexemes, &literals, &mut variables) {
        Ok(tree) => tree,
        Err(error) => abort(name, error),
    };

    for literal in literals.iter() {
        trace!("literal {:?}", literal);
    }

    for variable in variables.iter() {
        trace!("variable {:?}", variable);
    }

    trace!("syntax tree: {:#?}", tree);

    debug!("semantic checks");
    if let Err(error) = tree.check(&literals, &variables) {
        abort(name, error);
    }

    debug!("evaluating");
    let stdin = io::stdin();
    let mut evaluator = Evaluator::new(&literals, &mut variables, stdin.lock(), io::stdout());

    match evaluator.run(&tree) {
        Ok(Some(code)) => process::exit(code),
        Ok(None) => Ok(()),

        Err(error) => {
            eprintln!("{}", Report::new(name, error));
            process::exit(-1);
        }
    }
}

/// Reporta un error de fase estática y termina con estado 1.
fn abort<E: std::error::Error>(name: &str, error: Located<E>) -> ! {
    eprintln!("{}", Report::new(name, error));
    process::exit(1);
}
