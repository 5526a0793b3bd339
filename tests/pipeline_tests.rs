use esper::{
    ast::{BinOp, Expr, ScopeId, Statement, Type, VarId},
    compile,
    error::Stage,
    lex::{Lexer, Token, TokenKind},
    parse::Rule,
    source::Source,
    EmitOptions,
};

#[test]
fn end_to_end_example() {
    let compilation = compile("main.esp", "var x = 1 + 2;", EmitOptions::empty());

    let tokens: Vec<String> = compilation
        .tokens
        .iter()
        .filter(|token| token.kind() != TokenKind::Eof)
        .map(Token::to_string)
        .collect();

    assert_eq!(
        tokens,
        ["KEYWORD(var)", "IDENT(x)", "OP(=)", "INT(1)", "OP(+)", "INT(2)", "SEMI"]
    );

    let tree = compilation.tree.as_ref().expect("no syntax tree");
    let statement = &tree.children()[0];
    assert_eq!(statement.rule(), Some(Rule::Statement));
    assert_eq!(statement.children()[0].rule(), Some(Rule::Declaration));

    assert_eq!(compilation.variables.len(), 1);
    let x = &compilation.variables[0];
    assert_eq!(x.name.to_string(), "x");
    assert_eq!(x.declared_type, Type::Int);
    assert_eq!(x.scope, ScopeId(0));
    assert_eq!(x.order, 0);

    let program = compilation.program.as_ref().expect("no program");
    match &program.body.statements[..] {
        [Statement::Declaration {
            variable: VarId(0),
            assignment: Some(assignment),
        }] => {
            assert_eq!(assignment.target.val().variable, Some(VarId(0)));
            assert!(matches!(
                assignment.value.val(),
                Expr::Binary(_, BinOp::Add, _)
            ));
        }

        other => panic!("unexpected statements: {:?}", other),
    }

    let c = compilation.c.as_deref().expect("no C output");
    assert!(c.contains("    int x;\n"));
    assert!(c.contains("    x = 1 + 2;\n"));
    assert!(compilation.diagnostics.is_empty());
}

#[test]
fn lexing_covers_every_character() {
    let text = "var größe = 1.5; // comentario\nif (a <= b) { $ }\n\"sin cierre";
    let source = Source::new("test", text);

    let tokens: Vec<Token> = Lexer::new(&source).collect();
    let rebuilt: String = tokens.iter().map(Token::text).collect();
    assert_eq!(rebuilt, text);

    let mut offset = 0;
    for token in &tokens {
        assert_eq!(token.location().range().start, offset);
        offset = token.location().range().end;
    }

    assert_eq!(offset, text.len());
    assert_eq!(tokens.last().map(Token::kind), Some(TokenKind::Eof));
}

#[test]
fn maximal_munch_prefers_longer_operators() {
    let compilation = compile("test", "var a = 1 <= 2;", EmitOptions::empty());
    let texts: Vec<&str> = compilation.tokens.iter().map(Token::text).collect();

    assert!(texts.contains(&"<="));
    assert!(!texts.contains(&"<"));
}

#[test]
fn malformed_statement_between_good_ones() {
    let text = "var a = 1;\nvar = 5;\nvar b = 2;\n";
    let compilation = compile("test", text, EmitOptions::empty());

    assert!(compilation.parser_errors > 0);
    assert_eq!(compilation.diagnostics.count(Stage::Parser), compilation.parser_errors);

    let names: Vec<String> = compilation
        .variables
        .iter()
        .map(|variable| variable.name.to_string())
        .collect();

    assert_eq!(names, ["a", "b"]);

    let c = compilation.c.as_deref().expect("no C output");
    assert!(c.contains("a = 1;"));
    assert!(c.contains("b = 2;"));
    assert!(!compilation.succeeded(Stage::Parser));
}

#[test]
fn redeclaration_keeps_the_first_entry() {
    let compilation = compile("test", "var a = 1; var a = \"no\";", EmitOptions::empty());

    assert_eq!(compilation.diagnostics.count(Stage::Semantic), 1);
    assert_eq!(compilation.variables.len(), 1);
    assert_eq!(compilation.variables[0].declared_type, Type::Int);

    let entry = compilation.diagnostics.iter().next().expect("no diagnostic");
    assert_eq!(entry.message(), "Variable `a` is already declared in this scope");
    assert_eq!(entry.location().text(), "a");
}

#[test]
fn inner_declarations_shadow_outer_ones() {
    let compilation = compile(
        "test",
        "var x = 1; { var x = 2; x = x + 1; } x = 0;",
        EmitOptions::empty(),
    );

    assert!(compilation.diagnostics.is_empty());
    assert_eq!(compilation.variables.len(), 2);
    assert_eq!(compilation.variables[1].scope, ScopeId(1));

    let program = compilation.program.as_ref().expect("no program");
    let inner = match &program.body.statements[1] {
        Statement::Block(block) => block,
        other => panic!("expected a block, got {:?}", other),
    };

    match &inner.statements[1] {
        Statement::Assignment(assignment) => {
            assert_eq!(assignment.target.val().variable, Some(VarId(1)));
        }

        other => panic!("expected an assignment, got {:?}", other),
    }

    match &program.body.statements[2] {
        Statement::Assignment(assignment) => {
            assert_eq!(assignment.target.val().variable, Some(VarId(0)));
        }

        other => panic!("expected an assignment, got {:?}", other),
    }
}

#[test]
fn unresolved_references_are_reported() {
    let compilation = compile("test", "print(missing);", EmitOptions::empty());

    let messages: Vec<String> = compilation
        .diagnostics
        .iter()
        .map(|entry| entry.message())
        .collect();

    assert_eq!(messages[0], "Symbol `missing` is undefined");
    assert_eq!(compilation.diagnostics.count(Stage::Codegen), 1);
}

#[test]
fn emission_is_deterministic() {
    let text = "var i = 0; while (i < 10) { var j = i * i; if (j > 20) { print(j); } i = i + 1; }";

    let first = compile("test", text, EmitOptions::empty());
    let second = compile("test", text, EmitOptions::empty());

    assert!(first.c.is_some());
    assert_eq!(first.c, second.c);
}

#[test]
fn strict_mode_withholds_output() {
    let text = "var x: color = 1;";

    let lenient = compile("test", text, EmitOptions::empty());
    assert!(lenient.c.is_some());
    assert_eq!(lenient.diagnostics.count(Stage::Codegen), 1);

    let strict = compile("test", text, EmitOptions::STRICT);
    assert!(strict.c.is_none());
    assert!(strict.program.is_some());
}

#[test]
fn empty_program_is_rejected() {
    let compilation = compile("test", "  // nada\n", EmitOptions::empty());

    assert!(compilation.tree.is_none());
    assert!(compilation.c.is_none());
    assert_eq!(compilation.parser_errors, 1);
}

#[test]
fn diagnostics_render_with_labels() {
    let compilation = compile("bad.esp", "var a = 1\nvar b = 2;", EmitOptions::empty());
    let rendered = compilation.diagnostics.to_string();

    assert!(rendered.starts_with("Syntax error: Expected `;`, found keyword `var` instead\n"));
    assert!(rendered.contains(" --> bad.esp:[2:1-2:3]\n"));
    assert!(rendered.contains("2 | var b = 2;\n"));
    assert!(rendered.ends_with("Build failed with 1 error\n"));
}

#[test]
fn overflowing_literals_report_once_and_keep_emitting() {
    let text = "var big = 99999999999; big = 1; print(big);\nvar i = 0;\nwhile (i < 99999999999) { i = i + 1; }";
    let compilation = compile("test", text, EmitOptions::empty());

    let messages: Vec<String> = compilation
        .diagnostics
        .iter()
        .map(|entry| entry.message())
        .collect();

    assert_eq!(
        messages,
        [
            "Integer literal `99999999999` does not fit in a C `int`",
            "Integer literal `99999999999` does not fit in a C `int`",
        ]
    );

    let c = compilation.c.as_deref().expect("no C output");
    assert!(c.contains("    int big;\n"));
    assert!(c.contains("    big = 0;\n"));
    assert!(c.contains("    printf(\"%d\\n\", big);\n"));
    assert!(c.contains("    while (i < 0) {\n        i = i + 1;\n    }\n"));
}

#[test]
fn int_minimum_is_accepted() {
    let compilation = compile("test", "var m = -2147483648; print(m);", EmitOptions::STRICT);

    assert!(compilation.diagnostics.is_empty());
    let c = compilation.c.as_deref().expect("no C output");
    assert!(c.contains("    m = -2147483647 - 1;\n"));

    let rejected = compile("test", "var m = -2147483649;", EmitOptions::empty());
    assert_eq!(rejected.diagnostics.count(Stage::Semantic), 1);
}
