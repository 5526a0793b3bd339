//! Árbol sintáctico normalizado.
//!
//! Esta es la representación que consume [`crate::codegen`]. A diferencia
//! del CST, aquí no hay nodos de precedencia ni de puntuación: cada tipo
//! de nodo tiene una forma fija, de manera que la generación de código
//! puede despachar exhaustivamente sobre él. Las referencias a variables
//! ya están resueltas contra la tabla de símbolos ([`VariableInfo`]).

use std::fmt::{self, Display};

use crate::{
    lex::Identifier,
    source::{Located, Location},
};

/// Identificador de un ámbito léxico. El cuerpo del programa es el
/// ámbito 0 y cada bloque recibe el siguiente identificador.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

/// Índice de una variable en la tabla de símbolos.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

/// Tipo declarado o inferido de una variable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Bool,
    String,

    /// Nombre de tipo que el lenguaje no define.
    Named(Identifier),

    /// Tipo que no pudo determinarse.
    Unknown,
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => fmt.write_str("int"),
            Type::Float => fmt.write_str("float"),
            Type::Bool => fmt.write_str("bool"),
            Type::String => fmt.write_str("string"),
            Type::Named(name) => name.fmt(fmt),
            Type::Unknown => fmt.write_str("{unknown}"),
        }
    }
}

/// Entrada de la tabla de símbolos.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableInfo {
    pub name: Identifier,
    pub declared_type: Type,
    pub scope: ScopeId,

    /// Orden de primera declaración, igual a su posición en la tabla.
    pub order: usize,

    pub location: Location,
}

#[derive(Debug)]
pub struct Program {
    pub body: Block,
}

#[derive(Debug)]
pub struct Block {
    pub scope: ScopeId,
    pub statements: Vec<Statement>,
}

#[derive(Debug)]
pub enum Statement {
    /// Declaración, opcionalmente con asignación inicial.
    Declaration {
        variable: VarId,
        assignment: Option<Assignment>,
    },

    Assignment(Assignment),

    Conditional(Conditional),

    Loop {
        condition: Located<Expr>,
        body: Block,
    },

    Call(Located<Call>),

    Block(Block),
}

/// `if (condition) { body }`, opcionalmente seguido de `else`.
#[derive(Debug)]
pub struct Conditional {
    pub condition: Located<Expr>,
    pub body: Block,
    pub otherwise: Option<Else>,
}

#[derive(Debug)]
pub enum Else {
    Block(Block),

    /// `else if`, que se encadena sin introducir un bloque.
    Conditional(Box<Conditional>),
}

#[derive(Debug)]
pub struct Assignment {
    pub target: Located<Reference>,
    pub value: Located<Expr>,
}

/// Uso de una variable por nombre.
#[derive(Clone, Debug, PartialEq)]
pub struct Reference {
    pub name: Identifier,

    /// Variable a la que resuelve el nombre, si existe.
    pub variable: Option<VarId>,
}

#[derive(Debug)]
pub struct Call {
    pub function: Identifier,
    pub arguments: Vec<Located<Expr>>,
}

#[derive(Debug)]
pub enum Expr {
    Literal(Literal),
    Reference(Reference),
    Unary(UnOp, Box<Located<Expr>>),
    Binary(Box<Located<Expr>>, BinOp, Box<Located<Expr>>),
    Call(Call),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i32),
    Float(f64),
    Bool(bool),
    Str(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnOp {
    Negate,
    Not,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
}

impl UnOp {
    /// Operador en sintaxis de Esper, que coincide con la de C.
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Negate => "-",
            UnOp::Not => "!",
        }
    }
}

impl BinOp {
    /// Operador en sintaxis de Esper, que coincide con la de C.
    pub fn symbol(self) -> &'static str {
        use BinOp::*;

        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            LessOrEqual => "<=",
            Greater => ">",
            GreaterOrEqual => ">=",
            And => "&&",
            Or => "||",
        }
    }
}

/// Nombres de los distintos tipos de nodo, para volcados.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AstNodeKind {
    Program,
    Block,
    Declaration,
    Assignment,
    Conditional,
    Else,
    Loop,
    Call,
    Literal,
    Reference,
    Unary,
    Binary,
}

impl AstNodeKind {
    pub fn name(self) -> &'static str {
        use AstNodeKind::*;

        match self {
            Program => "PROGRAM",
            Block => "BLOCK",
            Declaration => "DECLARATION",
            Assignment => "ASSIGNMENT",
            Conditional => "CONDITIONAL",
            Else => "ELSE",
            Loop => "LOOP",
            Call => "CALL",
            Literal => "LITERAL",
            Reference => "REFERENCE",
            Unary => "UNARY",
            Binary => "BINARY",
        }
    }
}

impl Statement {
    pub fn kind(&self) -> AstNodeKind {
        match self {
            Statement::Declaration { .. } => AstNodeKind::Declaration,
            Statement::Assignment(_) => AstNodeKind::Assignment,
            Statement::Conditional(_) => AstNodeKind::Conditional,
            Statement::Loop { .. } => AstNodeKind::Loop,
            Statement::Call(_) => AstNodeKind::Call,
            Statement::Block(_) => AstNodeKind::Block,
        }
    }
}

impl Expr {
    pub fn kind(&self) -> AstNodeKind {
        match self {
            Expr::Literal(_) => AstNodeKind::Literal,
            Expr::Reference(_) => AstNodeKind::Reference,
            Expr::Unary(..) => AstNodeKind::Unary,
            Expr::Binary(..) => AstNodeKind::Binary,
            Expr::Call(_) => AstNodeKind::Call,
        }
    }

    /// Infiere el tipo de una expresión.
    ///
    /// No hay verificación de tipos: una combinación que no tiene un
    /// tipo evidente resulta en [`Type::Unknown`].
    pub fn typ(&self, variables: &[VariableInfo]) -> Type {
        use BinOp::*;

        match self {
            Expr::Literal(Literal::Int(_)) => Type::Int,
            Expr::Literal(Literal::Float(_)) => Type::Float,
            Expr::Literal(Literal::Bool(_)) => Type::Bool,
            Expr::Literal(Literal::Str(_)) => Type::String,

            Expr::Reference(reference) => reference
                .variable
                .and_then(|VarId(index)| variables.get(index))
                .map_or(Type::Unknown, |variable| variable.declared_type.clone()),

            Expr::Unary(UnOp::Not, _) => Type::Bool,
            Expr::Unary(UnOp::Negate, operand) => match operand.val().typ(variables) {
                typ @ (Type::Int | Type::Float) => typ,
                _ => Type::Unknown,
            },

            Expr::Binary(_, Equal | NotEqual | Less | LessOrEqual | Greater | GreaterOrEqual, _)
            | Expr::Binary(_, And | Or, _) => Type::Bool,

            Expr::Binary(left, op, right) => {
                let left = left.val().typ(variables);
                let right = right.val().typ(variables);

                match (*op, left, right) {
                    (_, Type::Int, Type::Int) => Type::Int,
                    (Mod, _, _) => Type::Unknown,
                    (_, Type::Float, Type::Int | Type::Float) | (_, Type::Int, Type::Float) => {
                        Type::Float
                    }

                    _ => Type::Unknown,
                }
            }

            Expr::Call(_) => Type::Unknown,
        }
    }
}
