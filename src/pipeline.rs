//! Orquestación de las fases.
//!
//! [`compile()`] lleva una unidad de código fuente en memoria a través de
//! análisis léxico, análisis sintáctico, normalización y generación de
//! código. Cada fase corre aunque la anterior haya reportado errores,
//! con una única excepción: si el parser no pudo construir un árbol, no
//! hay nada que normalizar y la compilación termina ahí. Si se emite C a
//! pesar de los errores es decisión de quien llama ([`EmitOptions`]).

use bitflags::bitflags;
use log::{info, warn};

use crate::{
    ast::{Program, VariableInfo},
    codegen,
    error::{Diagnostics, Stage},
    lex::{Lexer, Token},
    parse::{self, Cst},
    semantic,
    source::Source,
};

bitflags! {
    /// Opciones de emisión.
    pub struct EmitOptions: u32 {
        /// No producir C si cualquier fase reportó errores.
        const STRICT = 0x01;
    }
}

/// Resultado de una compilación completa.
#[derive(Debug)]
pub struct Compilation {
    /// Tokens significativos, terminando en EOF.
    pub tokens: Vec<Token>,

    /// CST, ausente si el error sintáctico fue irrecuperable.
    pub tree: Option<Cst>,

    /// Árbol normalizado, ausente si no hubo CST.
    pub program: Option<Program>,

    /// Tabla de símbolos.
    pub variables: Vec<VariableInfo>,

    /// Texto de C emitido.
    pub c: Option<String>,

    pub diagnostics: Diagnostics,
    pub lexer_errors: usize,
    pub parser_errors: usize,
}

impl Compilation {
    /// Determina si una fase corrió y terminó sin errores.
    pub fn succeeded(&self, stage: Stage) -> bool {
        let ran = match stage {
            Stage::Lexer => true,
            Stage::Parser => self.tree.is_some(),
            Stage::Semantic => self.program.is_some(),
            Stage::Codegen => self.c.is_some(),
        };

        ran && self.diagnostics.count(stage) == 0
    }

    /// Determina si se produjo C sin ningún diagnóstico.
    pub fn is_clean(&self) -> bool {
        self.c.is_some() && self.diagnostics.is_empty()
    }
}

/// Compila una unidad de código fuente.
pub fn compile(name: &str, text: &str, options: EmitOptions) -> Compilation {
    let source = Source::new(name, text);
    let mut diagnostics = Diagnostics::default();

    let lexed = Lexer::new(&source).tokenize();
    let lexer_errors = lexed.errors.len();
    diagnostics.extend(Stage::Lexer, lexed.errors);

    let parsed = parse::parse(&lexed.tokens);
    let parser_errors = parsed.errors.len();
    diagnostics.extend(Stage::Parser, parsed.errors);

    let normalized = parsed.tree.as_ref().map(semantic::normalize);
    let mut compilation = Compilation {
        tokens: lexed.tokens,
        tree: parsed.tree,
        program: None,
        variables: Vec::new(),
        c: None,
        diagnostics,
        lexer_errors,
        parser_errors,
    };

    let normalized = match normalized {
        Some(normalized) => normalized,
        None => {
            warn!("{}: no syntax tree could be built", name);
            return compilation;
        }
    };

    compilation
        .diagnostics
        .extend(Stage::Semantic, normalized.errors);

    let generated = codegen::generate(&normalized.program, &normalized.variables);
    compilation
        .diagnostics
        .extend(Stage::Codegen, generated.errors);

    compilation.program = Some(normalized.program);
    compilation.variables = normalized.variables;

    let errors = compilation.diagnostics.len();
    if errors > 0 && options.contains(EmitOptions::STRICT) {
        warn!("{}: withholding C output due to {} errors", name, errors);
    } else {
        if errors > 0 {
            warn!("{}: emitting C despite {} errors", name, errors);
        }

        compilation.c = Some(generated.text);
    }

    info!(
        "{}: {} lexer errors, {} parser errors, {} total",
        name, lexer_errors, compilation.parser_errors, errors
    );

    compilation
}
