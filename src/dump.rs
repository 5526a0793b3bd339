//! Volcados de depuración.
//!
//! Estas funciones muestran el flujo de tokens y los árboles de cada fase
//! en un formato de texto plano, una entrada por línea. Los árboles se
//! recorren en profundidad y cada nodo se prefija con un `>` por nivel.
//! Nada de lo que se imprime aquí afecta la salida del compilador.

use std::io::{self, Write};

use crate::{
    ast::{
        Assignment, AstNodeKind, Block, Conditional, Else, Expr, Program, Statement, VarId,
        VariableInfo,
    },
    lex::{Token, TokenKind},
    parse::{Cst, Kind},
    source::Located,
};

/// Vuelca tokens significativos como `Token: <texto> | <CATEGORÍA>`.
pub fn tokens<W: Write>(tokens: &[Token], output: &mut W) -> io::Result<()> {
    for token in tokens.iter().filter(|token| token.kind() != TokenKind::Eof) {
        writeln!(output, "Token: {} | {}", token.text(), token.kind().name())?;
    }

    Ok(())
}

/// Vuelca un CST. Los nodos de reglas se muestran por nombre.
pub fn cst<W: Write>(tree: &Cst, output: &mut W) -> io::Result<()> {
    cst_node(tree, 1, output)
}

fn cst_node<W: Write>(node: &Cst, depth: usize, output: &mut W) -> io::Result<()> {
    let text = match node.kind() {
        Kind::Rule(rule) => rule.name(),
        Kind::Token(_) => node.text(),
    };

    line(output, depth, text, node.kind().name())?;
    for child in node.children() {
        cst_node(child, depth + 1, output)?;
    }

    Ok(())
}

/// Vuelca un árbol normalizado.
pub fn ast<W: Write>(
    program: &Program,
    variables: &[VariableInfo],
    output: &mut W,
) -> io::Result<()> {
    let mut dumper = AstDumper { variables, output };

    dumper.node(1, "PROGRAM", AstNodeKind::Program)?;
    dumper.statements(&program.body, 2)
}

struct AstDumper<'a, W> {
    variables: &'a [VariableInfo],
    output: &'a mut W,
}

impl<W: Write> AstDumper<'_, W> {
    fn node(&mut self, depth: usize, text: &str, kind: AstNodeKind) -> io::Result<()> {
        line(self.output, depth, text, kind.name())
    }

    fn statements(&mut self, block: &Block, depth: usize) -> io::Result<()> {
        for statement in &block.statements {
            self.statement(statement, depth)?;
        }

        Ok(())
    }

    fn block(&mut self, block: &Block, depth: usize) -> io::Result<()> {
        self.node(depth, "BLOCK", AstNodeKind::Block)?;
        self.statements(block, depth + 1)
    }

    fn statement(&mut self, statement: &Statement, depth: usize) -> io::Result<()> {
        match statement {
            Statement::Declaration {
                variable: VarId(index),
                assignment,
            } => {
                let variables = self.variables;
                let name = variables
                    .get(*index)
                    .map_or("?", |variable| variable.name.as_str());

                self.node(depth, name, AstNodeKind::Declaration)?;
                if let Some(assignment) = assignment {
                    self.assignment(assignment, depth + 1)?;
                }

                Ok(())
            }

            Statement::Assignment(assignment) => self.assignment(assignment, depth),

            Statement::Conditional(conditional) => self.conditional(conditional, depth),

            Statement::Loop { condition, body } => {
                self.node(depth, "while", AstNodeKind::Loop)?;
                self.expr(condition, depth + 1)?;
                self.block(body, depth + 1)
            }

            Statement::Call(call) => {
                self.node(depth, call.val().function.as_str(), AstNodeKind::Call)?;
                for argument in &call.val().arguments {
                    self.expr(argument, depth + 1)?;
                }

                Ok(())
            }

            Statement::Block(block) => self.block(block, depth),
        }
    }

    fn conditional(&mut self, conditional: &Conditional, depth: usize) -> io::Result<()> {
        self.node(depth, "if", AstNodeKind::Conditional)?;
        self.expr(&conditional.condition, depth + 1)?;
        self.block(&conditional.body, depth + 1)?;

        match &conditional.otherwise {
            None => Ok(()),
            Some(otherwise) => {
                self.node(depth + 1, "else", AstNodeKind::Else)?;
                match otherwise {
                    Else::Block(block) => self.block(block, depth + 2),
                    Else::Conditional(next) => self.conditional(next, depth + 2),
                }
            }
        }
    }

    fn assignment(&mut self, assignment: &Assignment, depth: usize) -> io::Result<()> {
        self.node(depth, "=", AstNodeKind::Assignment)?;
        self.node(
            depth + 1,
            assignment.target.val().name.as_str(),
            AstNodeKind::Reference,
        )?;

        self.expr(&assignment.value, depth + 1)
    }

    fn expr(&mut self, expr: &Located<Expr>, depth: usize) -> io::Result<()> {
        let kind = expr.val().kind();

        match expr.val() {
            Expr::Literal(_) => self.node(depth, expr.location().text(), kind),
            Expr::Reference(reference) => self.node(depth, reference.name.as_str(), kind),

            Expr::Unary(op, operand) => {
                self.node(depth, op.symbol(), kind)?;
                self.expr(operand, depth + 1)
            }

            Expr::Binary(left, op, right) => {
                self.node(depth, op.symbol(), kind)?;
                self.expr(left, depth + 1)?;
                self.expr(right, depth + 1)
            }

            Expr::Call(call) => {
                self.node(depth, call.function.as_str(), kind)?;
                for argument in &call.arguments {
                    self.expr(argument, depth + 1)?;
                }

                Ok(())
            }
        }
    }
}

fn line<W: Write>(output: &mut W, depth: usize, text: &str, kind: &str) -> io::Result<()> {
    writeln!(output, "{} {} | {}", ">".repeat(depth), text, kind)
}
