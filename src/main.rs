//! Punto de entrada ("driver").
//!
//! Este módulo lee la unidad de entrada, invoca la pipeline del
//! compilador y expone una CLI.

use anyhow::{self, bail, Context};
use clap::{self, crate_version, Arg, ArgAction, Command};
use esper::{compile, dump, Compilation, EmitOptions};
use log::{info, LevelFilter};

use std::{
    fs,
    io::{self, Read, Write},
};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("Esper compiler")
        .version(crate_version!())
        .about("Translates Esper programs into C")
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .required(true)
                .help("Source file ('-' for stdin)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .takes_value(true)
                .default_value("-")
                .help("Output file ('-' for stdout)"),
        )
        .arg(
            Arg::new("dump")
                .long("dump")
                .value_name("STAGE")
                .takes_value(true)
                .value_parser(["tokens", "cst", "ast"])
                .help("Print a debug dump instead of C"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .action(ArgAction::SetTrue)
                .help("Refuse to emit C if any error is reported"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("Increase logging verbosity"),
        )
        .get_matches();

    // RUST_LOG tiene prioridad sobre -v
    let level = match args.get_count("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    // Se extraen argumentos necesarios
    let input = args.get_one::<String>("input").map_or("-", String::as_str);
    let output = args.get_one::<String>("output").map_or("-", String::as_str);
    let dump = args.get_one::<String>("dump").map(String::as_str);

    let mut options = EmitOptions::empty();
    if args.get_flag("strict") {
        options |= EmitOptions::STRICT;
    }

    let (name, text) = read_input(input)?;
    let compilation = compile(&name, &text, options);

    match dump {
        Some(stage) => {
            let stdout = io::stdout();
            let mut stdout = stdout.lock();

            write_dump(&compilation, stage, &mut stdout).context("Failed to write dump")?;
        }

        None => {
            if let Some(c) = &compilation.c {
                write_output(output, c)?;
            }
        }
    }

    if !compilation.diagnostics.is_empty() {
        eprint!("{}", compilation.diagnostics);
    }

    if compilation.c.is_none() || !compilation.diagnostics.is_empty() {
        bail!(
            "Compilation of {} failed ({} lexical, {} syntax, {} total)",
            name,
            compilation.lexer_errors,
            compilation.parser_errors,
            compilation.diagnostics.len()
        );
    }

    info!("{}: compiled successfully", name);
    Ok(())
}

fn read_input(path: &str) -> anyhow::Result<(String, String)> {
    if path == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read from stdin")?;

        return Ok((String::from("<stdin>"), text));
    }

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to open for reading: {}", path))?;

    Ok((path.to_owned(), text))
}

fn write_output(path: &str, c: &str) -> anyhow::Result<()> {
    match path {
        "-" => io::stdout()
            .write_all(c.as_bytes())
            .context("Failed to emit to stdout"),

        path => fs::write(path, c).with_context(|| format!("Failed to emit to file: {}", path)),
    }
}

fn write_dump<W: Write>(compilation: &Compilation, stage: &str, output: &mut W) -> io::Result<()> {
    match (stage, &compilation.tree, &compilation.program) {
        ("tokens", _, _) => dump::tokens(&compilation.tokens, output),
        ("cst", Some(tree), _) => dump::cst(tree, output),
        ("ast", _, Some(program)) => dump::ast(program, &compilation.variables, output),

        // Sin árbol no hay nada que volcar, los diagnósticos lo explican
        _ => Ok(()),
    }
}
