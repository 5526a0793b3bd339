//! Diagnósticos.
//!
//! Cada fase define su propio tipo de error y los reporta envueltos en
//! [`Located`]. [`Diagnostics`] los reúne en orden, recordando la fase
//! de la que provino cada uno, y los presenta señalando el fragmento de
//! código fuente responsable.

use std::{
    error::Error,
    fmt::{self, Display},
};

use crate::source::{Located, Location};

/// Fase del compilador que originó un diagnóstico.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Lexer,
    Parser,
    Semantic,
    Codegen,
}

impl Stage {
    /// Etiqueta con la que se presentan los errores de esta fase.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Lexer => "Lexical error",
            Stage::Parser => "Syntax error",
            Stage::Semantic => "Semantic error",
            Stage::Codegen => "Emission error",
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

struct Diagnostic {
    stage: Stage,
    error: Box<dyn 'static + LocatedError>,
}

/// Secuencia ordenada de diagnósticos de una compilación.
#[derive(Default)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Agrega errores de una misma fase, preservando su orden.
    pub fn extend<E, I>(&mut self, stage: Stage, errors: I)
    where
        E: 'static + LocatedError,
        I: IntoIterator<Item = E>,
    {
        self.diagnostics
            .extend(errors.into_iter().map(|error| Diagnostic {
                stage,
                error: Box::new(error),
            }));
    }

    /// Agrega errores de una fase, construyendo a partir de un vector.
    pub fn with<E>(mut self, stage: Stage, errors: Vec<E>) -> Self
    where
        E: 'static + LocatedError,
    {
        self.extend(stage, errors);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Cantidad de diagnósticos de una fase.
    pub fn count(&self, stage: Stage) -> usize {
        self.iter().filter(|entry| entry.stage() == stage).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = Entry<'_>> {
        self.diagnostics.iter().map(Entry)
    }
}

/// Vista de un diagnóstico individual.
#[derive(Copy, Clone)]
pub struct Entry<'a>(&'a Diagnostic);

impl<'a> Entry<'a> {
    pub fn stage(&self) -> Stage {
        self.0.stage
    }

    pub fn message(&self) -> String {
        self.0.error.source().to_string()
    }

    pub fn location(&self) -> &'a Location {
        self.0.error.location()
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_list()
            .entries(
                self.iter()
                    .map(|entry| (entry.stage(), entry.message(), entry.location().clone())),
            )
            .finish()
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for entry in self.iter() {
            writeln!(fmt, "{}: {}", entry.stage().label(), entry.message())?;
            excerpt(fmt, entry.location())?;
            writeln!(fmt)?;
        }

        let error_or_errors = if self.len() == 1 { "error" } else { "errors" };
        writeln!(fmt, "Build failed with {} {}", self.len(), error_or_errors)
    }
}

/// Muestra las líneas que cubre una ubicación y subraya el rango.
fn excerpt(fmt: &mut fmt::Formatter<'_>, location: &Location) -> fmt::Result {
    writeln!(fmt, " --> {}", location)?;

    let (start, last) = (location.start(), location.last());
    let digits = last.line().to_string().len();
    writeln!(fmt, "{:digits$} |", "", digits = digits)?;

    for line_number in start.line()..=last.line() {
        let line = location.source().line(line_number).unwrap_or("");
        writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)?;
    }

    // En rangos de varias líneas se subraya desde el inicio hasta la
    // columna final de la última línea
    let (from, to) = if start.line() == last.line() {
        (start.column(), last.column())
    } else {
        (1, last.column())
    };

    let skip = (from.min(to) - 1) as usize;
    let highlight = (from.max(to) - from.min(to) + 1) as usize;

    writeln!(
        fmt,
        "{:digits$} | {:skip$}{:^<highlight$}",
        "",
        "",
        "",
        digits = digits,
        skip = skip,
        highlight = highlight
    )
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}
