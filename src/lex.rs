//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone el texto de un
//! [`Source`] en unidades léxicas denominadas tokens. Cada token emitido
//! está asociado a una ubicación en el código fuente original, lo cual
//! permite rastrear errores en tanto los mismos como constructos más
//! elevados de fases posteriores.
//!
//! # Reglas léxicas
//! Las reglas se declaran en orden en [`RULES`]. En cada posición se
//! prueban todas y gana la coincidencia más larga; si dos reglas
//! coinciden con la misma longitud gana la que se declaró primero
//! ("maximal munch"). Así, `<=` es un solo operador y `var` es una
//! palabra clave en vez de un identificador.
//!
//! - Las palabras clave no distinguen mayúsculas de minúsculas: `var`,
//!   `VAR` y `Var` resultan en [`Keyword::Var`].
//! - Los identificadores sí distinguen mayúsculas, igual que en C.
//!
//! # Espacios en blanco
//! Espacios, saltos de línea, tabuladores y comentarios `//` son tokens
//! ignorables. El lexer los emite como cualquier otro token, de forma que
//! la concatenación de todos los tokens reproduce exactamente la entrada,
//! pero [`Lexer::tokenize()`] los excluye del flujo que recibe el parser.
//!
//! # Errores
//! Todo carácter que no coincide con alguna regla forma un token
//! [`TokenKind::Unknown`]. El lexer nunca se detiene ante un error: estos
//! se acumulan y el análisis continúa con el siguiente carácter.

use crate::source::{Located, Location, Position, Source};
use std::{
    fmt::{self, Display},
    rc::Rc,
    str::FromStr,
};

use log::debug;
use thiserror::Error;

// Case-insensitive
pub use unicase::Ascii as NoCase;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Una cadena de texto sin `"` de cierre en su misma línea.
    #[error("Unterminated string literal")]
    UnterminatedString,
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Rc<str>);

impl Identifier {
    pub fn new(name: &str) -> Self {
        Identifier(Rc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Categoría léxica de un token.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Espacios, tabuladores y saltos de línea.
    Whitespace,

    /// `// ...`
    Comment,

    /// Palabra clave.
    Keyword(Keyword),

    /// Identificador.
    Ident,

    /// Literal de entero.
    Int,

    /// Literal de punto flotante.
    Float,

    /// Literal de cadena, incluyendo sus comillas.
    Str,

    /// Operador.
    Op(Operator),

    /// `;`
    Semicolon,

    /// `,`
    Comma,

    /// `:`
    Colon,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `{`
    OpenCurly,

    /// `}`
    CloseCurly,

    /// Fin de la entrada.
    Eof,

    /// Carácter que no coincide con ninguna regla.
    Unknown,
}

impl TokenKind {
    /// Nombre de la categoría, tal como se muestra en volcados.
    pub fn name(self) -> &'static str {
        use TokenKind::*;

        match self {
            Whitespace => "WS",
            Comment => "COMMENT",
            Keyword(_) => "KEYWORD",
            Ident => "IDENT",
            Int => "INT",
            Float => "FLOAT",
            Str => "STRING",
            Op(_) => "OP",
            Semicolon => "SEMI",
            Comma => "COMMA",
            Colon => "COLON",
            OpenParen => "LPAREN",
            CloseParen => "RPAREN",
            OpenCurly => "LCURLY",
            CloseCurly => "RCURLY",
            Eof => "EOF",
            Unknown => "UNKNOWN",
        }
    }

    /// Determina si el parser nunca debe ver tokens de esta categoría.
    pub fn is_ignorable(self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }

    /// Determina si el texto del token es parte de su identidad.
    fn has_lexeme(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Keyword(_) | Ident | Int | Float | Str | Op(_) | Unknown
        )
    }
}

impl Display for TokenKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            TokenKind::Op(op) => write!(fmt, "`{}`", op),
            TokenKind::Semicolon => fmt.write_str("`;`"),
            TokenKind::Comma => fmt.write_str("`,`"),
            TokenKind::Colon => fmt.write_str("`:`"),
            TokenKind::OpenParen => fmt.write_str("`(`"),
            TokenKind::CloseParen => fmt.write_str("`)`"),
            TokenKind::OpenCurly => fmt.write_str("`{`"),
            TokenKind::CloseCurly => fmt.write_str("`}`"),
            TokenKind::Ident => fmt.write_str("identifier"),
            TokenKind::Int => fmt.write_str("integer literal"),
            TokenKind::Float => fmt.write_str("float literal"),
            TokenKind::Str => fmt.write_str("string literal"),
            TokenKind::Eof => fmt.write_str("end of input"),
            TokenKind::Whitespace => fmt.write_str("whitespace"),
            TokenKind::Comment => fmt.write_str("comment"),
            TokenKind::Unknown => fmt.write_str("unknown character"),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Keyword {
    Var,
    If,
    Else,
    While,
    True,
    False,
    Int,
    Float,
    Bool,
    String,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;
        let string = match self {
            Var    => "var",
            If     => "if",
            Else   => "else",
            While  => "while",
            True   => "true",
            False  => "false",
            Int    => "int",
            Float  => "float",
            Bool   => "bool",
            String => "string",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        const KEYWORDS: &[(NoCase<&str>, Keyword)] = &[
            (NoCase::new("var"),    Var),
            (NoCase::new("if"),     If),
            (NoCase::new("else"),   Else),
            (NoCase::new("while"),  While),
            (NoCase::new("true"),   True),
            (NoCase::new("false"),  False),
            (NoCase::new("int"),    Int),
            (NoCase::new("float"),  Float),
            (NoCase::new("bool"),   Bool),
            (NoCase::new("string"), String),
        ];

        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == NoCase::new(string))
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Un operador.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Assign,
    Plus,
    Minus,
    Times,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
    Not,
}

impl Operator {
    /// Lexema del operador.
    pub fn symbol(self) -> &'static str {
        use Operator::*;

        match self {
            Assign => "=",
            Plus => "+",
            Minus => "-",
            Times => "*",
            Divide => "/",
            Modulo => "%",
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            LessOrEqual => "<=",
            Greater => ">",
            GreaterOrEqual => ">=",
            And => "&&",
            Or => "||",
            Not => "!",
        }
    }
}

impl Display for Operator {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.symbol())
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente. Su texto es exactamente
/// el rango que cubre su ubicación.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    kind: TokenKind,
    location: Location,
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        self.location.text()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.has_lexeme() {
            write!(fmt, "{}({})", self.kind.name(), self.text())
        } else {
            fmt.write_str(self.kind.name())
        }
    }
}

/// Una regla léxica.
#[derive(Copy, Clone)]
enum Rule {
    Whitespace,
    Comment,
    Keyword,
    Float,
    Int,
    Ident,
    Str,
    Symbol(&'static str, TokenKind),
}

/// Reglas léxicas en orden de declaración.
///
/// El orden importa: ante coincidencias de la misma longitud gana la
/// regla que aparece primero.
const RULES: &[Rule] = &[
    Rule::Whitespace,
    Rule::Comment,
    Rule::Keyword,
    Rule::Float,
    Rule::Int,
    Rule::Ident,
    Rule::Str,
    Rule::Symbol("==", TokenKind::Op(Operator::Equal)),
    Rule::Symbol("!=", TokenKind::Op(Operator::NotEqual)),
    Rule::Symbol("<=", TokenKind::Op(Operator::LessOrEqual)),
    Rule::Symbol(">=", TokenKind::Op(Operator::GreaterOrEqual)),
    Rule::Symbol("&&", TokenKind::Op(Operator::And)),
    Rule::Symbol("||", TokenKind::Op(Operator::Or)),
    Rule::Symbol("=", TokenKind::Op(Operator::Assign)),
    Rule::Symbol("<", TokenKind::Op(Operator::Less)),
    Rule::Symbol(">", TokenKind::Op(Operator::Greater)),
    Rule::Symbol("+", TokenKind::Op(Operator::Plus)),
    Rule::Symbol("-", TokenKind::Op(Operator::Minus)),
    Rule::Symbol("*", TokenKind::Op(Operator::Times)),
    Rule::Symbol("/", TokenKind::Op(Operator::Divide)),
    Rule::Symbol("%", TokenKind::Op(Operator::Modulo)),
    Rule::Symbol("!", TokenKind::Op(Operator::Not)),
    Rule::Symbol(";", TokenKind::Semicolon),
    Rule::Symbol(",", TokenKind::Comma),
    Rule::Symbol(":", TokenKind::Colon),
    Rule::Symbol("(", TokenKind::OpenParen),
    Rule::Symbol(")", TokenKind::CloseParen),
    Rule::Symbol("{", TokenKind::OpenCurly),
    Rule::Symbol("}", TokenKind::CloseCurly),
];

impl Rule {
    /// Intenta aplicar la regla al inicio de `rest`, retornando la
    /// longitud en bytes de la coincidencia y la categoría resultante.
    fn accept(self, rest: &str) -> Option<(usize, TokenKind)> {
        let (length, kind) = match self {
            Rule::Whitespace => (
                prefix_len(rest, |c| matches!(c, ' ' | '\t' | '\r' | '\n')),
                TokenKind::Whitespace,
            ),

            Rule::Comment if rest.starts_with("//") => (
                rest.find('\n').unwrap_or(rest.len()),
                TokenKind::Comment,
            ),

            Rule::Comment => return None,

            Rule::Keyword => {
                let word = &rest[..prefix_len(rest, is_word_char)];
                let keyword = Keyword::from_str(word).ok()?;
                (word.len(), TokenKind::Keyword(keyword))
            }

            Rule::Float => {
                let integer = prefix_len(rest, |c| c.is_ascii_digit());
                let after = rest[integer..].strip_prefix('.')?;
                let fraction = prefix_len(after, |c| c.is_ascii_digit());

                if integer == 0 || fraction == 0 {
                    return None;
                }

                (integer + 1 + fraction, TokenKind::Float)
            }

            Rule::Int => (
                prefix_len(rest, |c| c.is_ascii_digit()),
                TokenKind::Int,
            ),

            Rule::Ident => match rest.chars().next() {
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                    (prefix_len(rest, is_word_char), TokenKind::Ident)
                }

                _ => return None,
            },

            Rule::Str => (string_len(rest)?, TokenKind::Str),

            Rule::Symbol(symbol, kind) if rest.starts_with(symbol) => (symbol.len(), kind),
            Rule::Symbol(..) => return None,
        };

        Some((length, kind)).filter(|&(length, _)| length > 0)
    }
}

/// Longitud en bytes del prefijo más largo de caracteres que cumplen `accept`.
fn prefix_len<F: Fn(char) -> bool>(rest: &str, accept: F) -> usize {
    rest.find(|c: char| !accept(c)).unwrap_or(rest.len())
}

/// Longitud de una cadena de texto completa, incluyendo sus comillas.
fn string_len(rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices();
    if !matches!(chars.next(), Some((_, '"'))) {
        return None;
    }

    while let Some((index, c)) = chars.next() {
        match c {
            '"' => return Some(index + 1),
            '\n' => return None,
            '\\' => match chars.next() {
                Some((_, '\n')) | None => return None,
                Some(_) => (),
            },

            _ => (),
        }
    }

    None
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Resultado del análisis léxico de una unidad completa.
#[derive(Debug)]
pub struct Lexed {
    /// Tokens significativos, terminando en [`TokenKind::Eof`].
    pub tokens: Vec<Token>,

    /// Errores léxicos, en orden de aparición.
    pub errors: Vec<Located<LexerError>>,
}

/// Analizador léxico.
///
/// Un lexer es un iterador perezoso y finito sobre todos los tokens
/// de una unidad, incluyendo los ignorables, que termina siempre con un
/// único [`TokenKind::Eof`]. Puede clonarse en cualquier punto para
/// reiniciar el recorrido desde ahí.
#[derive(Clone)]
pub struct Lexer {
    source: Rc<Source>,
    offset: usize,
    position: Position,
    finished: bool,
}

impl Lexer {
    /// Crea un lexer en estado inicial a partir de una unidad.
    pub fn new(source: &Rc<Source>) -> Self {
        Lexer {
            source: Rc::clone(source),
            offset: 0,
            position: Position::default(),
            finished: false,
        }
    }

    /// Recorre la unidad completa, separando tokens significativos y
    /// acumulando errores léxicos.
    pub fn tokenize(self) -> Lexed {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        for token in self.filter(|token| !token.kind().is_ignorable()) {
            if token.kind() == TokenKind::Unknown {
                let error = match token.text().chars().next() {
                    Some('"') => LexerError::UnterminatedString,
                    Some(c) => LexerError::BadChar(c),
                    None => continue,
                };

                errors.push(Located::at(error, token.location().clone()));
            }

            tokens.push(token);
        }

        debug!(
            "Lexed {} significant tokens with {} errors",
            tokens.len(),
            errors.len()
        );

        Lexed { tokens, errors }
    }

    /// Encuentra la regla con la coincidencia más larga.
    fn longest_match(rest: &str) -> Option<(usize, TokenKind)> {
        RULES
            .iter()
            .filter_map(|rule| rule.accept(rest))
            .fold(None, |best, (length, kind)| match best {
                Some((best_length, _)) if best_length >= length => best,
                _ => Some((length, kind)),
            })
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let rest = &self.source.text()[self.offset..];
        let start = self.position;

        if rest.is_empty() {
            self.finished = true;

            let span = self.offset..self.offset;
            let location = Location::new(Rc::clone(&self.source), span, start, start);

            return Some(Token {
                kind: TokenKind::Eof,
                location,
            });
        }

        let (length, kind) = Lexer::longest_match(rest).unwrap_or_else(|| {
            let length = rest.chars().next().map_or(1, char::len_utf8);
            (length, TokenKind::Unknown)
        });

        let mut last = start;
        for c in rest[..length].chars() {
            last = self.position;
            self.position = self.position.after(c);
        }

        let span = self.offset..self.offset + length;
        self.offset += length;

        Some(Token {
            kind,
            location: Location::new(Rc::clone(&self.source), span, start, last),
        })
    }
}
