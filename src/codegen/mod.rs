//! Generación de código C.
//!
//! El árbol normalizado se traduce a una única unidad de traducción de
//! C99 en un solo recorrido. Todo el programa forma el cuerpo de `main`.
//! Las declaraciones de cada ámbito se elevan al inicio del bloque que
//! lo abre, de modo que una declaración con valor inicial se convierte
//! en una asignación en su posición original.
//!
//! La generación es total: una construcción que no puede traducirse se
//! reporta como [`CodegenError`] y se omite, pero el resto del programa
//! se emite de todas formas.

use thiserror::Error;

use std::{
    collections::HashMap,
    fmt::{self, Write},
};

use log::debug;

use crate::{
    ast::{
        Assignment, Block, Call, Conditional, Else, Expr, Literal, Program, Reference, ScopeId,
        Statement, Type, VarId, VariableInfo,
    },
    source::{Located, Location},
};

mod names;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("Type `{0}` has no C equivalent")]
    UnsupportedTypeMapping(Type),

    #[error("Cannot print a value of type `{0}`")]
    UnsupportedPrintArgument(Type),
}

/// Texto de C emitido junto con los errores encontrados.
#[derive(Debug)]
pub struct Generated {
    pub text: String,
    pub errors: Vec<Located<CodegenError>>,
}

/// Tipo de C que corresponde a un tipo de Esper.
pub fn c_type(typ: &Type) -> Result<&'static str, CodegenError> {
    match typ {
        Type::Int => Ok("int"),
        Type::Float => Ok("double"),
        Type::Bool => Ok("bool"),
        Type::String => Ok("const char *"),
        Type::Named(_) | Type::Unknown => Err(CodegenError::UnsupportedTypeMapping(typ.clone())),
    }
}

/// Genera C para un programa completo en memoria.
pub fn generate(program: &Program, variables: &[VariableInfo]) -> Generated {
    let mut text = String::new();

    match emit(program, variables, &mut text) {
        Ok(errors) => Generated { text, errors },
        Err(_) => unreachable!("formatting into a String never fails"),
    }
}

/// Emite C para un programa completo hacia cualquier destino.
///
/// Un `Err` solo puede provenir del destino. Los errores de traducción
/// se retornan en el `Ok`.
pub fn emit<W: Write>(
    program: &Program,
    variables: &[VariableInfo],
    output: &mut W,
) -> Result<Vec<Located<CodegenError>>, fmt::Error> {
    let mut scopes: HashMap<ScopeId, Vec<VarId>> = HashMap::new();
    for (index, variable) in variables.iter().enumerate() {
        scopes.entry(variable.scope).or_default().push(VarId(index));
    }

    let mut context = Context {
        output,
        indent: 0,
        variables,
        names: names::assign(variables),
        scopes,
        errors: Vec::new(),
    };

    context.program(program)?;

    debug!("Emitted C with {} errors", context.errors.len());
    Ok(context.errors)
}

struct Context<'a, W> {
    output: &'a mut W,
    indent: usize,
    variables: &'a [VariableInfo],
    names: Vec<String>,

    /// Variables de cada ámbito, en orden de declaración.
    scopes: HashMap<ScopeId, Vec<VarId>>,

    errors: Vec<Located<CodegenError>>,
}

impl<W: Write> Context<'_, W> {
    fn program(&mut self, program: &Program) -> fmt::Result {
        emit!(self, "#include <stdbool.h>")?;
        emit!(self, "#include <stdio.h>")?;
        emit!(self)?;
        emit!(self, "int main(void) {{")?;

        self.indent += 1;
        self.contents(&program.body)?;
        emit!(self, "return 0;")?;
        self.indent -= 1;

        emit!(self, "}}")
    }

    /// Emite el interior de un bloque con un nivel más de sangría. Las
    /// llaves corresponden a quien llama.
    fn body(&mut self, block: &Block) -> fmt::Result {
        self.indent += 1;
        self.contents(block)?;
        self.indent -= 1;

        Ok(())
    }

    fn contents(&mut self, block: &Block) -> fmt::Result {
        self.declarations(block.scope)?;
        for statement in &block.statements {
            self.statement(statement)?;
        }

        Ok(())
    }

    fn declarations(&mut self, scope: ScopeId) -> fmt::Result {
        let variables = self.variables;
        let declared = self.scopes.remove(&scope).unwrap_or_default();

        for VarId(index) in declared {
            let variable = &variables[index];

            match c_type(&variable.declared_type) {
                Ok(typ) => {
                    let declarator = declarator(typ, &self.names[index]);
                    emit!(self, "{};", declarator)?;
                }

                Err(error) => self
                    .errors
                    .push(Located::at(error, variable.location.clone())),
            }
        }

        Ok(())
    }

    fn statement(&mut self, statement: &Statement) -> fmt::Result {
        match statement {
            Statement::Declaration {
                assignment: Some(assignment),
                ..
            }
            | Statement::Assignment(assignment) => self.assignment(assignment),

            Statement::Declaration {
                assignment: None, ..
            } => Ok(()),

            Statement::Conditional(conditional) => {
                let condition = self.expr(&conditional.condition);
                emit!(self, "if ({}) {{", condition)?;
                self.conditional_tail(conditional)
            }

            Statement::Loop { condition, body } => {
                let condition = self.expr(condition);
                emit!(self, "while ({}) {{", condition)?;
                self.body(body)?;
                emit!(self, "}}")
            }

            Statement::Call(call) => {
                let call = self.call(call.val());
                emit!(self, "{};", call)
            }

            Statement::Block(block) => {
                emit!(self, "{{")?;
                self.body(block)?;
                emit!(self, "}}")
            }
        }
    }

    fn assignment(&mut self, assignment: &Assignment) -> fmt::Result {
        let target = self.reference(assignment.target.val());
        let value = self.expr(&assignment.value);

        emit!(self, "{} = {};", target, value)
    }

    /// Emite el cuerpo de un condicional y lo cierra, encadenando
    /// `else if` sin anidar bloques.
    fn conditional_tail(&mut self, conditional: &Conditional) -> fmt::Result {
        self.body(&conditional.body)?;

        match &conditional.otherwise {
            None => emit!(self, "}}"),

            Some(Else::Block(block)) => {
                emit!(self, "}} else {{")?;
                self.body(block)?;
                emit!(self, "}}")
            }

            Some(Else::Conditional(next)) => {
                let condition = self.expr(&next.condition);
                emit!(self, "}} else if ({}) {{", condition)?;
                self.conditional_tail(next)
            }
        }
    }

    fn expr(&mut self, expr: &Located<Expr>) -> String {
        match expr.val() {
            Expr::Literal(literal) => c_literal(literal),
            Expr::Reference(reference) => self.reference(reference),
            Expr::Unary(op, operand) => format!("{}{}", op.symbol(), self.operand(operand)),

            Expr::Binary(left, op, right) => {
                let left = self.operand(left);
                let right = self.operand(right);

                format!("{} {} {}", left, op.symbol(), right)
            }

            Expr::Call(call) => self.call(call),
        }
    }

    /// Los operandos que son a su vez operaciones van entre paréntesis,
    /// al igual que los literales negativos.
    fn operand(&mut self, operand: &Located<Expr>) -> String {
        match operand.val() {
            Expr::Unary(..) | Expr::Binary(..) => format!("({})", self.expr(operand)),
            Expr::Literal(Literal::Int(value)) if *value < 0 => {
                format!("({})", self.expr(operand))
            }

            _ => self.expr(operand),
        }
    }

    fn reference(&self, reference: &Reference) -> String {
        match reference.variable {
            Some(VarId(index)) => self.names[index].clone(),
            None => reference.name.to_string(),
        }
    }

    fn call(&mut self, call: &Call) -> String {
        if call.function.as_str() == "print" {
            return self.print(&call.arguments);
        }

        let arguments: Vec<String> = call
            .arguments
            .iter()
            .map(|argument| self.expr(argument))
            .collect();

        format!("{}({})", call.function, arguments.join(", "))
    }

    /// `print(a, b, ...)` imprime sus argumentos separados por espacios
    /// y termina con un cambio de línea.
    fn print(&mut self, arguments: &[Located<Expr>]) -> String {
        let mut formats = Vec::new();
        let mut values = Vec::new();

        for argument in arguments {
            let value = self.expr(argument);

            match argument.val().typ(self.variables) {
                Type::Int => {
                    formats.push("%d");
                    values.push(value);
                }

                Type::Float => {
                    formats.push("%g");
                    values.push(value);
                }

                Type::Bool => {
                    formats.push("%s");
                    values.push(format!("({}) ? \"true\" : \"false\"", value));
                }

                Type::String => {
                    formats.push("%s");
                    values.push(value);
                }

                typ => self.error(
                    CodegenError::UnsupportedPrintArgument(typ),
                    argument.location(),
                ),
            }
        }

        let mut text = format!("printf(\"{}\\n\"", formats.join(" "));
        for value in values {
            text.push_str(", ");
            text.push_str(&value);
        }

        text.push(')');
        text
    }

    fn error(&mut self, error: CodegenError, location: &Location) {
        self.errors.push(Located::at(error, location.clone()));
    }
}

/// Declarador de C, sin espacio entre `*` y el nombre.
fn declarator(typ: &str, name: &str) -> String {
    if typ.ends_with('*') {
        format!("{}{}", typ, name)
    } else {
        format!("{} {}", typ, name)
    }
}

fn c_literal(literal: &Literal) -> String {
    match literal {
        // En C, `-2147483648` es la negación de un literal que no cabe en `int`
        Literal::Int(i32::MIN) => format!("{} - 1", i32::MIN + 1),
        Literal::Int(value) => value.to_string(),
        Literal::Bool(value) => value.to_string(),

        // `Debug` conserva todos los dígitos y usa exponente en magnitudes
        // extremas, lo cual ya es un literal `double` válido
        Literal::Float(value) if value.is_finite() => {
            let text = format!("{:?}", value);
            if text.contains(&['.', 'e'][..]) {
                text
            } else {
                text + ".0"
            }
        }

        // Desborda a infinito igual que en Esper
        Literal::Float(_) => String::from("1.0e999"),

        Literal::Str(string) => escape(string),
    }
}

/// Cita un string como literal de C.
fn escape(string: &str) -> String {
    let mut escaped = String::with_capacity(string.len() + 2);
    escaped.push('"');

    for c in string.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            '?' => escaped.push_str("\\?"),
            c if c.is_ascii_control() => {
                let _ = write!(escaped, "\\{:03o}", c as u32);
            }

            c => escaped.push(c),
        }
    }

    escaped.push('"');
    escaped
}
