//! Asignación de identificadores de C.
//!
//! Todas las declaraciones se elevan al inicio de su bloque, así que dos
//! variables con el mismo nombre en ámbitos distintos no pueden compartir
//! identificador en C sin cambiar qué variable lee cada referencia. Cada
//! variable conserva su nombre original salvo que este choque con una
//! palabra reservada de C o con un nombre ya asignado, en cuyo caso
//! recibe el primer sufijo `_N` libre.

use std::collections::HashSet;

use crate::ast::VariableInfo;

/// Nombres que el código emitido no puede redefinir.
const RESERVED: &[&str] = &[
    "auto",
    "break",
    "case",
    "char",
    "const",
    "continue",
    "default",
    "do",
    "double",
    "else",
    "enum",
    "extern",
    "float",
    "for",
    "goto",
    "if",
    "inline",
    "int",
    "long",
    "register",
    "restrict",
    "return",
    "short",
    "signed",
    "sizeof",
    "static",
    "struct",
    "switch",
    "typedef",
    "union",
    "unsigned",
    "void",
    "volatile",
    "while",
    "_Alignas",
    "_Alignof",
    "_Atomic",
    "_Bool",
    "_Complex",
    "_Generic",
    "_Imaginary",
    "_Noreturn",
    "_Static_assert",
    "_Thread_local",
    "bool",
    "true",
    "false",
    "main",
    "printf",
    "NULL",
];

/// Determina si un nombre está reservado en el código emitido.
fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

/// Asigna un identificador de C a cada variable, en el mismo orden que
/// la tabla de símbolos. El resultado solo depende de la tabla.
pub fn assign(variables: &[VariableInfo]) -> Vec<String> {
    // Un sufijo nunca debe producir el nombre de otra variable del programa
    let original: HashSet<&str> = variables
        .iter()
        .map(|variable| variable.name.as_str())
        .collect();

    let mut taken: HashSet<String> = HashSet::new();
    variables
        .iter()
        .map(|variable| {
            let name: &str = variable.name.as_str();
            let assigned = if !is_reserved(name) && !taken.contains(name) {
                name.to_owned()
            } else {
                (1..)
                    .map(|suffix| format!("{}_{}", name, suffix))
                    .find(|candidate| {
                        !taken.contains(candidate.as_str())
                            && !original.contains(candidate.as_str())
                            && !is_reserved(candidate)
                    })
                    .unwrap_or_default()
            };

            taken.insert(assigned.clone());
            assigned
        })
        .collect()
}
