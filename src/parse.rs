//! Análisis sintáctico.
//!
//! El parser es descendente recursivo y construye un árbol sintáctico
//! concreto ([`Cst`]) cuya forma refleja exactamente la gramática,
//! incluyendo los nodos que existen solo para codificar precedencia
//! (`or`, `and`, `additive`, ...). Eliminar ese ruido estructural es
//! responsabilidad de [`crate::semantic`], no del parser.
//!
//! # Recuperación de errores
//! Cuando una sentencia no se puede reducir, el parser registra el
//! error, descarta tokens hasta el siguiente `;` (inclusive), `}` o
//! palabra clave que inicia sentencia (exclusive) y conserva los tokens
//! descartados en un nodo [`Rule::Error`]. Así, una sentencia malformada no impide analizar
//! las demás. Agotar la entrada a mitad de una regla no tiene
//! recuperación posible y el parse termina sin árbol.

use std::fmt::{self, Display};
use thiserror::Error;

use log::debug;

use crate::{
    lex::{Keyword, Operator, Token, TokenKind},
    source::{Located, Location},
};

/// Regla gramatical que produjo un nodo interior del CST.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    Program,
    Statement,
    Declaration,
    TypeAnnotation,
    Assignment,
    Conditional,
    Else,
    Loop,
    CallStatement,
    Block,
    Expression,
    Or,
    And,
    Equality,
    Comparison,
    Additive,
    Multiplicative,
    Unary,
    Primary,
    Call,
    Arguments,

    /// Tokens descartados durante recuperación de errores.
    Error,
}

impl Rule {
    pub fn name(self) -> &'static str {
        use Rule::*;

        match self {
            Program => "PROGRAM",
            Statement => "STATEMENT",
            Declaration => "DECLARATION",
            TypeAnnotation => "TYPE",
            Assignment => "ASSIGNMENT",
            Conditional => "CONDITIONAL",
            Else => "ELSE",
            Loop => "LOOP",
            CallStatement => "CALL_STATEMENT",
            Block => "BLOCK",
            Expression => "EXPRESSION",
            Or => "OR",
            And => "AND",
            Equality => "EQUALITY",
            Comparison => "COMPARISON",
            Additive => "ADDITIVE",
            Multiplicative => "MULTIPLICATIVE",
            Unary => "UNARY",
            Primary => "PRIMARY",
            Call => "CALL",
            Arguments => "ARGUMENTS",
            Error => "ERROR",
        }
    }
}

/// Tipo de un nodo del CST: una regla o un token hoja.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Rule(Rule),
    Token(TokenKind),
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Rule(rule) => rule.name(),
            Kind::Token(token) => token.name(),
        }
    }
}

/// Nodo del árbol sintáctico concreto.
#[derive(Debug, Clone)]
pub struct Cst {
    kind: Kind,
    location: Location,
    children: Vec<Cst>,
}

impl Cst {
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Regla de este nodo, si no es una hoja.
    pub fn rule(&self) -> Option<Rule> {
        match self.kind {
            Kind::Rule(rule) => Some(rule),
            Kind::Token(_) => None,
        }
    }

    /// Categoría léxica de este nodo, si es una hoja.
    pub fn token(&self) -> Option<TokenKind> {
        match self.kind {
            Kind::Token(token) => Some(token),
            Kind::Rule(_) => None,
        }
    }

    /// Texto original que cubre el nodo.
    pub fn text(&self) -> &str {
        self.location.text()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn children(&self) -> &[Cst] {
        &self.children
    }

    fn leaf(token: &Token) -> Self {
        Cst {
            kind: Kind::Token(token.kind()),
            location: token.location().clone(),
            children: Vec::new(),
        }
    }
}

/// Lo que se esperaba encontrar en un punto de error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Expected {
    Token(TokenKind),
    Identifier,
    Statement,
    Type,
    Expression,
}

impl Display for Expected {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Token(token) => token.fmt(fmt),
            Expected::Identifier => fmt.write_str("identifier"),
            Expected::Statement => {
                fmt.write_str("any of `var`, `if`, `while`, `{`, assignment or call")
            }
            Expected::Type => fmt.write_str("any of `int`, `float`, `bool`, `string` or a type name"),
            Expected::Expression => fmt.write_str("an expression"),
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParserError {
    #[error("Expected {0}, found {1} instead")]
    UnexpectedToken(Expected, TokenKind),

    #[error("Expected {0}, none was found instead")]
    UnexpectedEof(Expected),

    #[error("Program is empty, at least one statement is required")]
    EmptyProgram,
}

/// Resultado del análisis sintáctico.
#[derive(Debug)]
pub struct Parsed {
    /// Árbol resultante, ausente si el parse fue irrecuperable.
    pub tree: Option<Cst>,

    /// Errores sintácticos, en orden de aparición.
    pub errors: Vec<Located<ParserError>>,
}

/// Construye un CST a partir de tokens significativos.
///
/// Se asume que `tokens` no contiene tokens ignorables y termina con
/// [`TokenKind::Eof`], tal como lo produce [`crate::lex::Lexer::tokenize()`].
pub fn parse(tokens: &[Token]) -> Parsed {
    let mut parser = Parser {
        tokens,
        cursor: 0,
        errors: Vec::new(),
    };

    let tree = match parser.program() {
        Ok(tree) => Some(tree),
        Err(failure) => {
            parser.errors.push(failure.coerce());
            None
        }
    };

    debug!(
        "Parsed {} tokens with {} errors, tree {}",
        tokens.len(),
        parser.errors.len(),
        if tree.is_some() { "built" } else { "discarded" }
    );

    Parsed {
        tree,
        errors: parser.errors,
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    cursor: usize,
    errors: Vec<Located<ParserError>>,
}

enum Failure {
    /// Error local, la sentencia en curso puede descartarse.
    Recoverable(Located<ParserError>),

    /// Error sin recuperación posible.
    Fatal(Located<ParserError>),
}

impl Failure {
    fn coerce(self) -> Located<ParserError> {
        match self {
            Failure::Recoverable(error) => error,
            Failure::Fatal(error) => error,
        }
    }
}

type Parse<T> = Result<T, Failure>;

const EQUALITY: &[Operator] = &[Operator::Equal, Operator::NotEqual];
const COMPARISON: &[Operator] = &[
    Operator::Less,
    Operator::LessOrEqual,
    Operator::Greater,
    Operator::GreaterOrEqual,
];
const ADDITIVE: &[Operator] = &[Operator::Plus, Operator::Minus];
const MULTIPLICATIVE: &[Operator] = &[Operator::Times, Operator::Divide, Operator::Modulo];

impl<'a> Parser<'a> {
    fn program(&mut self) -> Parse<Cst> {
        if self.at(TokenKind::Eof) {
            let location = self.peek_location();
            return Err(Failure::Fatal(Located::at(ParserError::EmptyProgram, location)));
        }

        let mut children = Vec::new();
        while !self.at(TokenKind::Eof) {
            children.push(self.recovering(Parser::statement)?);
        }

        children.extend(self.next().as_ref().map(Cst::leaf));
        Ok(self.node(Rule::Program, children))
    }

    fn statement(&mut self) -> Parse<Cst> {
        let inner = match self.peek_kind() {
            TokenKind::Keyword(Keyword::Var) => self.declaration()?,
            TokenKind::Keyword(Keyword::If) => self.conditional()?,
            TokenKind::Keyword(Keyword::While) => self.loop_statement()?,
            TokenKind::OpenCurly => self.block()?,

            TokenKind::Ident if self.peek_nth_kind(1) == TokenKind::OpenParen => {
                self.call_statement()?
            }

            TokenKind::Ident => self.assignment()?,
            _ => return self.fail(Expected::Statement),
        };

        Ok(self.node(Rule::Statement, vec![inner]))
    }

    fn declaration(&mut self) -> Parse<Cst> {
        let mut children = vec![self.keyword(Keyword::Var)?, self.id()?];

        if self.at(TokenKind::Colon) {
            let colon = self.expect(TokenKind::Colon)?;
            let typ = self.typ()?;
            children.push(self.node(Rule::TypeAnnotation, vec![colon, typ]));
        }

        if self.at(TokenKind::Op(Operator::Assign)) {
            children.push(self.expect(TokenKind::Op(Operator::Assign))?);
            children.push(self.expression()?);
        }

        children.push(self.expect(TokenKind::Semicolon)?);
        Ok(self.node(Rule::Declaration, children))
    }

    fn typ(&mut self) -> Parse<Cst> {
        use Keyword::*;

        match self.peek_kind() {
            TokenKind::Keyword(Int | Float | Bool | String) | TokenKind::Ident => self.leaf(),
            _ => self.fail(Expected::Type),
        }
    }

    fn assignment(&mut self) -> Parse<Cst> {
        let children = vec![
            self.id()?,
            self.expect(TokenKind::Op(Operator::Assign))?,
            self.expression()?,
            self.expect(TokenKind::Semicolon)?,
        ];

        Ok(self.node(Rule::Assignment, children))
    }

    fn conditional(&mut self) -> Parse<Cst> {
        let mut children = vec![self.keyword(Keyword::If)?];
        children.extend(self.parenthesized()?);
        children.push(self.block()?);

        if self.at(TokenKind::Keyword(Keyword::Else)) {
            let otherwise = self.keyword(Keyword::Else)?;
            let body = match self.peek_kind() {
                TokenKind::Keyword(Keyword::If) => self.conditional()?,
                _ => self.block()?,
            };

            children.push(self.node(Rule::Else, vec![otherwise, body]));
        }

        Ok(self.node(Rule::Conditional, children))
    }

    fn loop_statement(&mut self) -> Parse<Cst> {
        let mut children = vec![self.keyword(Keyword::While)?];
        children.extend(self.parenthesized()?);
        children.push(self.block()?);

        Ok(self.node(Rule::Loop, children))
    }

    fn call_statement(&mut self) -> Parse<Cst> {
        let children = vec![self.call()?, self.expect(TokenKind::Semicolon)?];
        Ok(self.node(Rule::CallStatement, children))
    }

    fn block(&mut self) -> Parse<Cst> {
        let mut children = vec![self.expect(TokenKind::OpenCurly)?];

        loop {
            match self.peek_kind() {
                TokenKind::CloseCurly | TokenKind::Eof => break,
                _ => children.push(self.recovering(Parser::statement)?),
            }
        }

        children.push(self.expect(TokenKind::CloseCurly)?);
        Ok(self.node(Rule::Block, children))
    }

    /// `'(' expression ')'`, sin nodo propio.
    fn parenthesized(&mut self) -> Parse<[Cst; 3]> {
        Ok([
            self.expect(TokenKind::OpenParen)?,
            self.expression()?,
            self.expect(TokenKind::CloseParen)?,
        ])
    }

    fn expression(&mut self) -> Parse<Cst> {
        let or = self.or()?;
        Ok(self.node(Rule::Expression, vec![or]))
    }

    fn or(&mut self) -> Parse<Cst> {
        self.binary(Rule::Or, &[Operator::Or], Parser::and)
    }

    fn and(&mut self) -> Parse<Cst> {
        self.binary(Rule::And, &[Operator::And], Parser::equality)
    }

    fn equality(&mut self) -> Parse<Cst> {
        self.binary(Rule::Equality, EQUALITY, Parser::comparison)
    }

    fn comparison(&mut self) -> Parse<Cst> {
        self.binary(Rule::Comparison, COMPARISON, Parser::additive)
    }

    fn additive(&mut self) -> Parse<Cst> {
        self.binary(Rule::Additive, ADDITIVE, Parser::multiplicative)
    }

    fn multiplicative(&mut self) -> Parse<Cst> {
        self.binary(Rule::Multiplicative, MULTIPLICATIVE, Parser::unary)
    }

    fn unary(&mut self) -> Parse<Cst> {
        let children = match self.peek_kind() {
            TokenKind::Op(Operator::Minus | Operator::Not) => vec![self.leaf()?, self.unary()?],
            _ => vec![self.primary()?],
        };

        Ok(self.node(Rule::Unary, children))
    }

    fn primary(&mut self) -> Parse<Cst> {
        let children = match self.peek_kind() {
            TokenKind::Int
            | TokenKind::Float
            | TokenKind::Str
            | TokenKind::Keyword(Keyword::True | Keyword::False) => vec![self.leaf()?],

            TokenKind::Ident if self.peek_nth_kind(1) == TokenKind::OpenParen => {
                vec![self.call()?]
            }

            TokenKind::Ident => vec![self.leaf()?],
            TokenKind::OpenParen => self.parenthesized()?.into(),
            _ => return self.fail(Expected::Expression),
        };

        Ok(self.node(Rule::Primary, children))
    }

    fn call(&mut self) -> Parse<Cst> {
        let mut children = vec![self.id()?, self.expect(TokenKind::OpenParen)?];

        if !self.at(TokenKind::CloseParen) {
            let mut arguments = vec![self.expression()?];
            while self.at(TokenKind::Comma) {
                arguments.push(self.expect(TokenKind::Comma)?);
                arguments.push(self.expression()?);
            }

            children.push(self.node(Rule::Arguments, arguments));
        }

        children.push(self.expect(TokenKind::CloseParen)?);
        Ok(self.node(Rule::Call, children))
    }

    /// Secuencia asociativa por la izquierda `next (op next)*`.
    fn binary<F>(&mut self, rule: Rule, operators: &[Operator], mut next: F) -> Parse<Cst>
    where
        F: FnMut(&mut Self) -> Parse<Cst>,
    {
        let mut children = vec![next(self)?];

        loop {
            match self.peek_kind() {
                TokenKind::Op(op) if operators.contains(&op) => {
                    children.push(self.leaf()?);
                    children.push(next(self)?);
                }

                _ => break Ok(self.node(rule, children)),
            }
        }
    }

    /// Aplica una regla de sentencia; ante un error recuperable, registra
    /// el error y sincroniza en vez de propagarlo.
    fn recovering<F>(&mut self, rule: F) -> Parse<Cst>
    where
        F: FnOnce(&mut Self) -> Parse<Cst>,
    {
        let start = self.cursor;

        match rule(self) {
            Err(Failure::Recoverable(error)) => {
                debug!("Recovering from syntax error at {}", error.location());
                self.errors.push(error);

                self.synchronize(start);
                let skipped = self.tokens[start..self.cursor].iter().map(Cst::leaf).collect();

                Ok(self.node(Rule::Error, skipped))
            }

            result => result,
        }
    }

    /// Descarta tokens hasta `;` (inclusive), `}`, el inicio de otra
    /// sentencia o el final de la entrada. Siempre se descarta al menos
    /// un token.
    fn synchronize(&mut self, start: usize) {
        if self.cursor == start {
            let discarded = self.next().map(|token| token.kind());
            if let Some(TokenKind::Semicolon | TokenKind::CloseCurly) = discarded {
                return;
            }
        }

        loop {
            match self.peek_kind() {
                TokenKind::CloseCurly
                | TokenKind::Eof
                | TokenKind::Keyword(Keyword::Var | Keyword::If | Keyword::While) => break,

                TokenKind::Semicolon => {
                    self.next();
                    break;
                }

                _ => {
                    self.next();
                }
            }
        }
    }

    fn id(&mut self) -> Parse<Cst> {
        match self.peek_kind() {
            TokenKind::Ident => self.leaf(),
            _ => self.fail(Expected::Identifier),
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<Cst> {
        self.expect(TokenKind::Keyword(keyword))
    }

    /// Consume un token específico. No consume nada si no coincide.
    fn expect(&mut self, kind: TokenKind) -> Parse<Cst> {
        if self.at(kind) {
            self.leaf()
        } else {
            self.fail(Expected::Token(kind))
        }
    }

    /// Consume el siguiente token como hoja, sin importar su tipo.
    fn leaf(&mut self) -> Parse<Cst> {
        match self.next() {
            Some(token) => Ok(Cst::leaf(&token)),
            None => self.fail(Expected::Expression),
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor)?.clone();
        if token.kind() != TokenKind::Eof {
            self.cursor += 1;
        }

        Some(token)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek_nth_kind(0)
    }

    /// Una entrada sin más tokens se trata como si terminara en `EOF`.
    fn peek_nth_kind(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.cursor + n)
            .map_or(TokenKind::Eof, Token::kind)
    }

    fn peek_location(&self) -> Location {
        match self.tokens.get(self.cursor).or_else(|| self.tokens.last()) {
            Some(token) => token.location().clone(),
            None => crate::source::Source::new("<empty>", "").start(),
        }
    }

    fn fail<T>(&self, expected: Expected) -> Parse<T> {
        let location = self.peek_location();

        Err(match self.peek_kind() {
            TokenKind::Eof => Failure::Fatal(Located::at(ParserError::UnexpectedEof(expected), location)),
            found => Failure::Recoverable(Located::at(
                ParserError::UnexpectedToken(expected, found),
                location,
            )),
        })
    }

    fn node(&self, rule: Rule, children: Vec<Cst>) -> Cst {
        let location = match (children.first(), children.last()) {
            (Some(first), Some(last)) => Location::span(first.location.clone(), &last.location),
            _ => self.peek_location(),
        };

        Cst {
            kind: Kind::Rule(rule),
            location,
            children,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, source::Source};

    fn parse_text(text: &str) -> Parsed {
        let lexed = Lexer::new(&Source::new("test", text)).tokenize();
        parse(&lexed.tokens)
    }

    fn rules(node: &Cst) -> Vec<Rule> {
        node.children().iter().filter_map(Cst::rule).collect()
    }

    /// Desciende por una cadena de nodos con un solo hijo.
    fn descend(mut node: &Cst, path: &[Rule]) -> Cst {
        for &rule in path {
            node = node
                .children()
                .iter()
                .find(|child| child.rule() == Some(rule))
                .unwrap_or_else(|| panic!("no {:?} under {:?}", rule, node.kind()));
        }

        node.clone()
    }

    #[test]
    fn declaration_keeps_grammar_shape() {
        let parsed = parse_text("var x = 1 + 2;");
        assert!(parsed.errors.is_empty());

        let program = parsed.tree.unwrap();
        assert_eq!(program.rule(), Some(Rule::Program));
        assert_eq!(
            program.children().last().and_then(Cst::token),
            Some(TokenKind::Eof)
        );

        let declaration = descend(&program, &[Rule::Statement, Rule::Declaration]);
        let kinds: Vec<_> = declaration.children().iter().map(Cst::kind).collect();
        assert_eq!(
            kinds,
            [
                Kind::Token(TokenKind::Keyword(Keyword::Var)),
                Kind::Token(TokenKind::Ident),
                Kind::Token(TokenKind::Op(Operator::Assign)),
                Kind::Rule(Rule::Expression),
                Kind::Token(TokenKind::Semicolon),
            ]
        );

        let additive = descend(
            &declaration,
            &[
                Rule::Expression,
                Rule::Or,
                Rule::And,
                Rule::Equality,
                Rule::Comparison,
                Rule::Additive,
            ],
        );

        assert_eq!(additive.text(), "1 + 2");
        assert_eq!(additive.children().len(), 3);
    }

    #[test]
    fn type_annotations_and_else_chains() {
        let parsed = parse_text(
            "var f: float; if (f > 1.0) { f = 1.0; } else if (f < 0.0) { f = 0.0; } else { }",
        );
        assert!(parsed.errors.is_empty());

        let program = parsed.tree.unwrap();
        let declaration = descend(&program, &[Rule::Statement, Rule::Declaration]);
        assert_eq!(rules(&declaration), [Rule::TypeAnnotation]);

        let conditional = &program.children()[1].children()[0];
        assert_eq!(conditional.rule(), Some(Rule::Conditional));
        let nested = descend(conditional, &[Rule::Else, Rule::Conditional]);
        assert_eq!(rules(&nested), [Rule::Expression, Rule::Block, Rule::Else]);
    }

    #[test]
    fn malformed_statement_is_skipped() {
        let parsed = parse_text("var a = 1; var = 5; var b = 2;");
        assert_eq!(parsed.errors.len(), 1);

        let program = parsed.tree.unwrap();
        assert_eq!(
            rules(&program),
            [Rule::Statement, Rule::Error, Rule::Statement]
        );
        assert_eq!(program.children()[1].text(), "var = 5;");
    }

    #[test]
    fn recovery_inside_blocks_keeps_the_closing_brace() {
        let parsed = parse_text("while (true) { x = ; y = 1; } z = 2;");
        assert_eq!(parsed.errors.len(), 1);

        let program = parsed.tree.unwrap();
        let block = descend(&program, &[Rule::Statement, Rule::Loop, Rule::Block]);
        assert_eq!(rules(&block), [Rule::Error, Rule::Statement]);
        assert_eq!(rules(&program), [Rule::Statement, Rule::Statement]);
    }

    #[test]
    fn stray_closing_brace_is_discarded() {
        let parsed = parse_text("} var a = 1;");
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(
            rules(&parsed.tree.unwrap()),
            [Rule::Error, Rule::Statement]
        );
    }

    #[test]
    fn eof_inside_a_rule_is_fatal() {
        let parsed = parse_text("var a = 1; var b = ");
        assert!(parsed.tree.is_none());
        assert_eq!(
            *parsed.errors[0].val(),
            ParserError::UnexpectedEof(Expected::Expression)
        );
    }

    #[test]
    fn unclosed_block_is_fatal() {
        let parsed = parse_text("{ var a = 1;");
        assert!(parsed.tree.is_none());
        assert_eq!(parsed.errors.len(), 1);
    }

    #[test]
    fn empty_program_has_no_tree() {
        let parsed = parse_text("  // nothing here\n");
        assert!(parsed.tree.is_none());
        assert_eq!(*parsed.errors[0].val(), ParserError::EmptyProgram);
    }

    #[test]
    fn calls_with_arguments() {
        let parsed = parse_text("print(1, a + 2, f());");
        assert!(parsed.errors.is_empty());

        let program = parsed.tree.unwrap();
        let call = descend(&program, &[Rule::Statement, Rule::CallStatement, Rule::Call]);
        let arguments = descend(&call, &[Rule::Arguments]);
        assert_eq!(rules(&arguments), [Rule::Expression; 3]);
    }

    #[test]
    fn recovery_stops_before_the_next_statement() {
        let parsed = parse_text("x = 1 var y = 2;");
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(
            rules(&parsed.tree.unwrap()),
            [Rule::Error, Rule::Statement]
        );
    }

    #[test]
    fn error_messages_name_the_expectation() {
        let parsed = parse_text("var x = 1 var y = 2;");
        assert_eq!(
            parsed.errors[0].val().to_string(),
            "Expected `;`, found keyword `var` instead"
        );
    }
}
