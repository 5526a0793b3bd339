//! Normalización del árbol y tabla de símbolos.
//!
//! Esta fase recorre el CST una única vez, en profundidad, y produce al
//! mismo tiempo el árbol normalizado de [`crate::ast`] y la secuencia de
//! variables declaradas ([`VariableInfo`]) en orden de primera
//! declaración. Durante el recorrido:
//!
//! - Los nodos que solo existen por precedencia o agrupación colapsan
//!   a su único hijo significativo.
//! - Las cadenas de operadores se pliegan en nodos binarios asociativos
//!   por la izquierda.
//! - Los nodos de error que dejó la recuperación del parser se descartan.
//! - Cada bloque abre un nuevo ámbito. Las referencias resuelven contra
//!   el ámbito más cercano que declara el nombre.
//!
//! Los errores semánticos se acumulan sin detener el recorrido.

use thiserror::Error;

use std::collections::HashMap;

use log::debug;

use crate::{
    ast::{
        Assignment, BinOp, Block, Call, Conditional, Else, Expr, Literal, Program, Reference,
        ScopeId, Statement, Type, UnOp, VarId, VariableInfo,
    },
    lex::{Identifier, Keyword, Operator, TokenKind},
    parse::{Cst, Rule},
    source::{Located, Location},
};

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("Variable `{0}` is already declared in this scope")]
    DuplicateDeclaration(Identifier),

    #[error("Symbol `{0}` is undefined")]
    UnresolvedReference(Identifier),

    #[error("Integer literal `{0}` does not fit in a C `int`")]
    IntegerOverflow(String),
}

/// Resultado de la normalización.
#[derive(Debug)]
pub struct Normalized {
    pub program: Program,

    /// Tabla de símbolos, en orden de primera declaración.
    pub variables: Vec<VariableInfo>,

    pub errors: Vec<Located<SemanticError>>,
}

/// Normaliza un CST con raíz en [`Rule::Program`].
pub fn normalize(tree: &Cst) -> Normalized {
    let mut normalizer = Normalizer {
        scopes: Vec::new(),
        next_scope: 0,
        variables: Vec::new(),
        errors: Vec::new(),
    };

    let body = normalizer.scoped(|this| this.statements(tree.children()));

    debug!(
        "Normalized tree with {} variables and {} errors",
        normalizer.variables.len(),
        normalizer.errors.len()
    );

    Normalized {
        program: Program { body },
        variables: normalizer.variables,
        errors: normalizer.errors,
    }
}

/// Un nivel de la pila de ámbitos.
struct SymbolTable {
    id: ScopeId,
    symbols: HashMap<Identifier, VarId>,
}

struct Normalizer {
    scopes: Vec<SymbolTable>,
    next_scope: u32,
    variables: Vec<VariableInfo>,
    errors: Vec<Located<SemanticError>>,
}

impl Normalizer {
    /// Ejecuta `body` dentro de un nuevo ámbito.
    fn scoped<F>(&mut self, body: F) -> Block
    where
        F: FnOnce(&mut Self) -> Vec<Statement>,
    {
        let scope = ScopeId(self.next_scope);
        self.next_scope += 1;

        self.scopes.push(SymbolTable {
            id: scope,
            symbols: HashMap::new(),
        });

        let statements = body(self);
        self.scopes.pop();

        Block { scope, statements }
    }

    fn statements(&mut self, nodes: &[Cst]) -> Vec<Statement> {
        nodes
            .iter()
            .filter(|node| node.rule() == Some(Rule::Statement))
            .filter_map(|node| self.statement(node))
            .collect()
    }

    fn statement(&mut self, node: &Cst) -> Option<Statement> {
        // `statement` siempre envuelve exactamente una alternativa
        let inner = node.children().first()?;

        match inner.rule()? {
            Rule::Declaration => self.declaration(inner),
            Rule::Assignment => self.assignment(inner).map(Statement::Assignment),
            Rule::Conditional => self.conditional(inner).map(Statement::Conditional),
            Rule::Loop => {
                let condition = self.expr(rule_child(inner, Rule::Expression)?)?;
                let body = self.block(rule_child(inner, Rule::Block)?);

                Some(Statement::Loop { condition, body })
            }

            Rule::CallStatement => {
                let call = rule_child(inner, Rule::Call)?;
                let location = call.location().clone();

                Some(Statement::Call(Located::at(self.call(call)?, location)))
            }

            Rule::Block => Some(Statement::Block(self.block(inner))),
            _ => None,
        }
    }

    fn declaration(&mut self, node: &Cst) -> Option<Statement> {
        let name = token_child(node, TokenKind::Ident)?;
        let id = Identifier::new(name.text());

        let annotation = rule_child(node, Rule::TypeAnnotation)
            .and_then(|annotation| annotation.children().last())
            .map(|typ| match typ.token() {
                Some(TokenKind::Keyword(Keyword::Int)) => Type::Int,
                Some(TokenKind::Keyword(Keyword::Float)) => Type::Float,
                Some(TokenKind::Keyword(Keyword::Bool)) => Type::Bool,
                Some(TokenKind::Keyword(Keyword::String)) => Type::String,
                _ => Type::Named(Identifier::new(typ.text())),
            });

        // El inicializador se resuelve antes de declarar el nombre, de
        // forma que `var x = x;` lee una `x` de un ámbito externo
        let initializer = rule_child(node, Rule::Expression).and_then(|expr| self.expr(expr));

        let declared_type = match (annotation, &initializer) {
            (Some(typ), _) => typ,
            (None, Some(value)) => value.val().typ(&self.variables),
            (None, None) => Type::Unknown,
        };

        let variable = self.declare(id.clone(), declared_type, name.location());
        let assignment = initializer.map(|value| Assignment {
            target: Located::at(
                Reference {
                    name: id,
                    variable: Some(variable),
                },
                name.location().clone(),
            ),
            value,
        });

        Some(Statement::Declaration {
            variable,
            assignment,
        })
    }

    fn assignment(&mut self, node: &Cst) -> Option<Assignment> {
        let target = token_child(node, TokenKind::Ident)?;
        let target = Located::at(self.resolve(target), target.location().clone());
        let value = self.expr(rule_child(node, Rule::Expression)?)?;

        Some(Assignment { target, value })
    }

    fn conditional(&mut self, node: &Cst) -> Option<Conditional> {
        let condition = self.expr(rule_child(node, Rule::Expression)?)?;
        let body = self.block(rule_child(node, Rule::Block)?);

        let otherwise = match rule_child(node, Rule::Else) {
            None => None,
            Some(otherwise) => {
                let branch = otherwise.children().last()?;
                match branch.rule()? {
                    Rule::Conditional => {
                        Some(Else::Conditional(Box::new(self.conditional(branch)?)))
                    }

                    _ => Some(Else::Block(self.block(branch))),
                }
            }
        };

        Some(Conditional {
            condition,
            body,
            otherwise,
        })
    }

    fn block(&mut self, node: &Cst) -> Block {
        self.scoped(|this| this.statements(node.children()))
    }

    fn call(&mut self, node: &Cst) -> Option<Call> {
        let function = Identifier::new(token_child(node, TokenKind::Ident)?.text());
        let arguments = match rule_child(node, Rule::Arguments) {
            None => Vec::new(),
            Some(arguments) => arguments
                .children()
                .iter()
                .filter(|child| child.rule() == Some(Rule::Expression))
                .map(|argument| self.expr(argument))
                .collect::<Option<Vec<_>>>()?,
        };

        Some(Call {
            function,
            arguments,
        })
    }

    /// Normaliza cualquier nodo de expresión, colapsando envolturas.
    fn expr(&mut self, node: &Cst) -> Option<Located<Expr>> {
        let children = node.children();

        match node.rule() {
            None => self.atom(node),

            // Envolturas con un solo hijo
            Some(_) if children.len() == 1 => self.expr(&children[0]),

            Some(Rule::Or)
            | Some(Rule::And)
            | Some(Rule::Equality)
            | Some(Rule::Comparison)
            | Some(Rule::Additive)
            | Some(Rule::Multiplicative) => {
                let mut left = self.expr(children.first()?)?;
                for pair in children[1..].chunks(2) {
                    let op = match pair[0].token()? {
                        TokenKind::Op(op) => binary_op(op)?,
                        _ => return None,
                    };

                    let right = self.expr(pair.get(1)?)?;
                    let location = Location::span(left.location().clone(), right.location());
                    left = Located::at(Expr::Binary(Box::new(left), op, Box::new(right)), location);
                }

                Some(left)
            }

            Some(Rule::Unary) => {
                let op = match children.first()?.token()? {
                    TokenKind::Op(Operator::Minus) => UnOp::Negate,
                    TokenKind::Op(Operator::Not) => UnOp::Not,
                    _ => return None,
                };

                let operand = children.get(1)?;

                // `-2147483648` cabe en un `int` solo como un único literal
                if let (UnOp::Negate, Some(literal)) = (op, int_leaf(operand)) {
                    let value = self.integer(&format!("-{}", literal.text()), node);
                    return Some(Located::at(value, node.location().clone()));
                }

                let operand = self.expr(operand)?;
                Some(Located::at(
                    Expr::Unary(op, Box::new(operand)),
                    node.location().clone(),
                ))
            }

            // `( expression )`
            Some(Rule::Primary) => self.expr(rule_child(node, Rule::Expression)?),

            Some(Rule::Call) => {
                let call = self.call(node)?;
                Some(Located::at(Expr::Call(call), node.location().clone()))
            }

            Some(_) => None,
        }
    }

    /// Hojas: literales y referencias.
    fn atom(&mut self, leaf: &Cst) -> Option<Located<Expr>> {
        let text = leaf.text();
        let expr = match leaf.token()? {
            TokenKind::Int => self.integer(text, leaf),

            TokenKind::Float => Expr::Literal(Literal::Float(text.parse().ok()?)),
            TokenKind::Str => Expr::Literal(Literal::Str(unescape(text))),
            TokenKind::Keyword(Keyword::True) => Expr::Literal(Literal::Bool(true)),
            TokenKind::Keyword(Keyword::False) => Expr::Literal(Literal::Bool(false)),
            TokenKind::Ident => Expr::Reference(self.resolve(leaf)),
            _ => return None,
        };

        Some(Located::at(expr, leaf.location().clone()))
    }

    /// Literal entero con signo opcional. Si no cabe en un `int` de C se
    /// reporta y queda en 0, de forma que la sentencia que lo contiene
    /// se conserva.
    fn integer(&mut self, text: &str, node: &Cst) -> Expr {
        let value = text.parse::<i32>().unwrap_or_else(|_| {
            let error = SemanticError::IntegerOverflow(text.to_owned());
            self.errors.push(Located::at(error, node.location().clone()));

            0
        });

        Expr::Literal(Literal::Int(value))
    }

    /// Registra una variable en el ámbito actual.
    ///
    /// Una redeclaración en el mismo ámbito es un error; se conserva
    /// la primera entrada y se retorna esa.
    fn declare(&mut self, name: Identifier, declared_type: Type, location: &Location) -> VarId {
        let order = self.variables.len();

        let scope = match self.scopes.last_mut() {
            Some(scope) => scope,
            None => unreachable!("declaration outside of any scope"),
        };

        if let Some(&existing) = scope.symbols.get(&name) {
            let error = SemanticError::DuplicateDeclaration(name);
            self.errors.push(Located::at(error, location.clone()));

            return existing;
        }

        let id = VarId(order);
        scope.symbols.insert(name.clone(), id);

        self.variables.push(VariableInfo {
            name,
            declared_type,
            scope: scope.id,
            order,
            location: location.clone(),
        });

        id
    }

    /// Resuelve un identificador contra el ámbito más cercano que lo declara.
    fn resolve(&mut self, leaf: &Cst) -> Reference {
        let name = Identifier::new(leaf.text());
        let variable = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.get(&name).copied());

        if variable.is_none() {
            let error = SemanticError::UnresolvedReference(name.clone());
            self.errors.push(Located::at(error, leaf.location().clone()));
        }

        Reference { name, variable }
    }
}

fn rule_child(node: &Cst, rule: Rule) -> Option<&Cst> {
    node.children().iter().find(|child| child.rule() == Some(rule))
}

fn token_child(node: &Cst, kind: TokenKind) -> Option<&Cst> {
    node.children().iter().find(|child| child.token() == Some(kind))
}

/// Hoja de literal entero a la que colapsa una cadena de envolturas.
fn int_leaf(node: &Cst) -> Option<&Cst> {
    match node.children() {
        [] => (node.token() == Some(TokenKind::Int)).then(|| node),
        [only] if node.rule().is_some() => int_leaf(only),
        _ => None,
    }
}

fn binary_op(op: Operator) -> Option<BinOp> {
    use Operator::*;

    let op = match op {
        Plus => BinOp::Add,
        Minus => BinOp::Sub,
        Times => BinOp::Mul,
        Divide => BinOp::Div,
        Modulo => BinOp::Mod,
        Equal => BinOp::Equal,
        NotEqual => BinOp::NotEqual,
        Less => BinOp::Less,
        LessOrEqual => BinOp::LessOrEqual,
        Greater => BinOp::Greater,
        GreaterOrEqual => BinOp::GreaterOrEqual,
        And => BinOp::And,
        Or => BinOp::Or,
        Assign | Not => return None,
    };

    Some(op)
}

/// Decodifica un literal de cadena, incluyendo sus comillas.
fn unescape(literal: &str) -> String {
    let inner = literal
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(literal);

    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some('r') => value.push('\r'),
            Some('0') => value.push('\0'),
            Some(other) => value.push(other),
            None => value.push('\\'),
        }
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, parse, source::Source};

    fn normalize_text(text: &str) -> Normalized {
        let lexed = Lexer::new(&Source::new("test", text)).tokenize();
        assert!(lexed.errors.is_empty());

        let parsed = parse::parse(&lexed.tokens);
        normalize(&parsed.tree.expect("test program must parse"))
    }

    fn summary(normalized: &Normalized) -> Vec<(String, Type, u32)> {
        normalized
            .variables
            .iter()
            .map(|var| (var.name.to_string(), var.declared_type.clone(), var.scope.0))
            .collect()
    }

    #[test]
    fn declaration_with_initializer() {
        let normalized = normalize_text("var x = 1 + 2;");
        assert!(normalized.errors.is_empty());
        assert_eq!(summary(&normalized), [("x".to_owned(), Type::Int, 0)]);

        let statements = &normalized.program.body.statements;
        assert_eq!(statements.len(), 1);

        match &statements[0] {
            Statement::Declaration {
                variable: VarId(0),
                assignment: Some(Assignment { target, value }),
            } => {
                assert_eq!(target.val().variable, Some(VarId(0)));
                assert!(matches!(
                    value.val(),
                    Expr::Binary(left, BinOp::Add, right)
                        if matches!(left.val(), Expr::Literal(Literal::Int(1)))
                            && matches!(right.val(), Expr::Literal(Literal::Int(2)))
                ));
            }

            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn wrappers_and_parentheses_collapse() {
        let normalized = normalize_text("var y = (1 + 2) * -3;");
        let value = match &normalized.program.body.statements[0] {
            Statement::Declaration {
                assignment: Some(assignment),
                ..
            } => &assignment.value,
            other => panic!("unexpected statement {:?}", other),
        };

        match value.val() {
            Expr::Binary(left, BinOp::Mul, right) => {
                assert!(matches!(left.val(), Expr::Binary(_, BinOp::Add, _)));
                assert!(matches!(right.val(), Expr::Literal(Literal::Int(-3))));
                assert_eq!(right.location().text(), "-3");
                assert_eq!(left.location().text(), "1 + 2");
            }

            other => panic!("unexpected expression {:?}", other),
        }
    }

    #[test]
    fn operator_chains_are_left_associative() {
        let normalized = normalize_text("var z = 10 - 4 - 3;");
        let value = match &normalized.program.body.statements[0] {
            Statement::Declaration {
                assignment: Some(assignment),
                ..
            } => &assignment.value,
            other => panic!("unexpected statement {:?}", other),
        };

        match value.val() {
            Expr::Binary(left, BinOp::Sub, right) => {
                assert_eq!(left.location().text(), "10 - 4");
                assert_eq!(right.location().text(), "3");
            }

            other => panic!("unexpected expression {:?}", other),
        }
    }

    #[test]
    fn duplicate_declarations_keep_the_first() {
        let normalized = normalize_text("var a = 1; var a = 2.5;");
        assert_eq!(normalized.errors.len(), 1);
        assert_eq!(
            *normalized.errors[0].val(),
            SemanticError::DuplicateDeclaration(Identifier::new("a"))
        );

        assert_eq!(summary(&normalized), [("a".to_owned(), Type::Int, 0)]);
        assert!(matches!(
            normalized.program.body.statements[1],
            Statement::Declaration {
                variable: VarId(0),
                ..
            }
        ));
    }

    #[test]
    fn inner_blocks_shadow_outer_variables() {
        let normalized = normalize_text("var x = 1; { var x = x + 0.5; x = 2.0; } x = 3;");
        assert!(normalized.errors.is_empty());
        assert_eq!(
            summary(&normalized),
            [("x".to_owned(), Type::Int, 0), ("x".to_owned(), Type::Float, 1)]
        );

        let block = match &normalized.program.body.statements[1] {
            Statement::Block(block) => block,
            other => panic!("unexpected statement {:?}", other),
        };

        // El inicializador lee la `x` externa, la asignación escribe la interna
        match &block.statements[0] {
            Statement::Declaration {
                assignment: Some(assignment),
                ..
            } => match assignment.value.val() {
                Expr::Binary(left, _, _) => assert!(matches!(
                    left.val(),
                    Expr::Reference(Reference {
                        variable: Some(VarId(0)),
                        ..
                    })
                )),
                other => panic!("unexpected expression {:?}", other),
            },

            other => panic!("unexpected statement {:?}", other),
        }

        match &block.statements[1] {
            Statement::Assignment(assignment) => {
                assert_eq!(assignment.target.val().variable, Some(VarId(1)))
            }
            other => panic!("unexpected statement {:?}", other),
        }

        match &normalized.program.body.statements[2] {
            Statement::Assignment(assignment) => {
                assert_eq!(assignment.target.val().variable, Some(VarId(0)))
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn unresolved_references_do_not_stop_normalization() {
        let normalized = normalize_text("y = 1; var a = b; print(a);");
        let errors: Vec<_> = normalized.errors.iter().map(|e| e.val().clone()).collect();
        assert_eq!(
            errors,
            [
                SemanticError::UnresolvedReference(Identifier::new("y")),
                SemanticError::UnresolvedReference(Identifier::new("b")),
            ]
        );

        assert_eq!(normalized.program.body.statements.len(), 3);
        assert_eq!(summary(&normalized), [("a".to_owned(), Type::Unknown, 0)]);
    }

    #[test]
    fn scopes_are_numbered_in_order() {
        let normalized = normalize_text(
            "var a; if (true) { var b = 1; } else if (false) { var c = true; } else { var d = \"s\"; }",
        );

        assert_eq!(
            summary(&normalized),
            [
                ("a".to_owned(), Type::Unknown, 0),
                ("b".to_owned(), Type::Int, 1),
                ("c".to_owned(), Type::Bool, 2),
                ("d".to_owned(), Type::String, 3),
            ]
        );
    }

    #[test]
    fn annotations_override_inference() {
        let normalized = normalize_text("var f: float = 1; var m: matrix;");
        assert_eq!(
            summary(&normalized),
            [
                ("f".to_owned(), Type::Float, 0),
                ("m".to_owned(), Type::Named(Identifier::new("matrix")), 0),
            ]
        );
    }

    #[test]
    fn integer_overflow_is_reported() {
        let normalized = normalize_text("var big = 2147483648; var ok = 2147483647;");
        let errors: Vec<_> = normalized.errors.iter().map(|e| e.val().clone()).collect();

        assert_eq!(errors, [SemanticError::IntegerOverflow("2147483648".to_owned())]);
        assert_eq!(
            summary(&normalized),
            [("big".to_owned(), Type::Int, 0), ("ok".to_owned(), Type::Int, 0)]
        );
    }

    #[test]
    fn overflowing_literals_keep_their_statement() {
        let normalized = normalize_text("var big = 99999999999; big = 1; print(big);");

        assert_eq!(normalized.errors.len(), 1);
        assert!(matches!(normalized.errors[0].val(), SemanticError::IntegerOverflow(_)));
        assert_eq!(summary(&normalized), [("big".to_owned(), Type::Int, 0)]);
        assert_eq!(normalized.program.body.statements.len(), 3);

        match &normalized.program.body.statements[0] {
            Statement::Declaration {
                assignment: Some(assignment),
                ..
            } => assert!(matches!(assignment.value.val(), Expr::Literal(Literal::Int(0)))),
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn overflowing_conditions_keep_the_loop_body() {
        let normalized = normalize_text("var i = 0; while (i < 99999999999) { i = i + 1; }");

        assert_eq!(normalized.errors.len(), 1);
        match &normalized.program.body.statements[1] {
            Statement::Loop { body, .. } => {
                assert_eq!(body.statements.len(), 1);
                assert!(matches!(body.statements[0], Statement::Assignment(_)));
            }

            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn negated_literals_are_checked_as_one_value() {
        let normalized = normalize_text("var m = -2147483648; var n = -2147483649;");
        let errors: Vec<_> = normalized.errors.iter().map(|e| e.val().clone()).collect();

        assert_eq!(errors, [SemanticError::IntegerOverflow("-2147483649".to_owned())]);
        assert_eq!(normalized.errors[0].location().text(), "-2147483649");

        match &normalized.program.body.statements[0] {
            Statement::Declaration {
                assignment: Some(assignment),
                ..
            } => assert!(matches!(
                assignment.value.val(),
                Expr::Literal(Literal::Int(i32::MIN))
            )),
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn error_nodes_are_dropped() {
        let lexed = Lexer::new(&Source::new("test", "var a = 1; var = 2; var b = 3;")).tokenize();
        let parsed = parse::parse(&lexed.tokens);
        let normalized = normalize(parsed.tree.as_ref().unwrap());

        assert_eq!(normalized.program.body.statements.len(), 2);
        assert_eq!(normalized.variables.len(), 2);
    }

    #[test]
    fn strings_are_unescaped() {
        assert_eq!(unescape(r#""a\"b\\c\n""#), "a\"b\\c\n");
        assert_eq!(unescape(r#""\q""#), "q");
    }
}
