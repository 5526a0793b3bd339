//! Compilador de Esper a C.
//!
//! # Front end
//! Cada programa deriva de un único archivo de código fuente.
//! Este archivo se somete primero a análisis léxico en [`lex`], de
//! lo cual se obtiene un flujo de tokens. El flujo de tokens se
//! dispone en un árbol sintáctico concreto por medio de análisis
//! sintáctico en [`parse`]. Ambas fases se recuperan de errores y
//! continúan, de modo que una sola corrida reporta tantos problemas
//! como sea posible.
//!
//! # Normalización
//! El árbol concreto todavía refleja la gramática, incluyendo los
//! niveles de precedencia. En [`semantic`] se reduce a la forma fija
//! descrita en [`ast`] y se construye la tabla de símbolos, resolviendo
//! cada referencia contra el ámbito léxico que corresponde.
//!
//! # Back end
//! El árbol normalizado se traduce a una unidad de C99 en [`codegen`].
//! Compilar y enlazar ese C queda en manos de la toolchain del sistema.
//!
//! [`pipeline`] encadena las cuatro fases y reúne sus diagnósticos, los
//! cuales se describen en [`error`].

#[macro_use]
mod macros;

pub mod ast;
pub mod codegen;
pub mod dump;
pub mod error;
pub mod lex;
pub mod parse;
pub mod pipeline;
pub mod semantic;
pub mod source;

pub use pipeline::{compile, Compilation, EmitOptions};
