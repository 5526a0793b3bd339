use esper::{dump, error::Diagnostics, error::Stage, lex::Lexer, parse, semantic, source::Source};

use std::io::{self, Read, Write};

fn main() -> io::Result<()> {
    let mut text = String::new();
    io::stdin().read_to_string(&mut text)?;

    let source = Source::new("<stdin>", text);
    let lexed = Lexer::new(&source).tokenize();

    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    writeln!(stdout, "Lexer output:")?;
    dump::tokens(&lexed.tokens, &mut stdout)?;

    let parsed = parse::parse(&lexed.tokens);
    let mut diagnostics = Diagnostics::default()
        .with(Stage::Lexer, lexed.errors)
        .with(Stage::Parser, parsed.errors);

    if let Some(tree) = parsed.tree {
        writeln!(stdout, "Parser output:")?;
        dump::cst(&tree, &mut stdout)?;

        let normalized = semantic::normalize(&tree);
        writeln!(stdout, "Normalized:")?;
        dump::ast(&normalized.program, &normalized.variables, &mut stdout)?;

        diagnostics.extend(Stage::Semantic, normalized.errors);
    }

    eprint!("{}", diagnostics);
    Ok(())
}
