//! Rastreo de ubicaciones originales en código fuente.
//!
//! Los distintos objetos internos que el compilador construye
//! deben llevar cuenta de posiciones o rangos de ubicaciones en
//! el código fuente original, lo cual permite determinar un punto
//! exacto o aproximado en donde ocurre un error de abstracción
//! arbitraria.
//!
//! Una ubicación lleva tanto el rango de bytes que ocupa en el texto
//! original como las posiciones línea-columna de su primer y último
//! carácter. Lo primero permite reconstruir el texto exacto que
//! cubre un token; lo segundo permite reportar errores legibles.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::Range,
    rc::Rc,
};

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    /// Transforma el valor con la misma ubicación.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            location: self.location,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Unidad de código fuente: un nombre y su texto completo en memoria.
pub struct Source {
    name: String,
    text: String,
}

impl Source {
    /// Construye una unidad compartida a partir de un nombre y un texto.
    pub fn new<N, T>(name: N, text: T) -> Rc<Self>
    where
        N: Into<String>,
        T: Into<String>,
    {
        Rc::new(Source {
            name: name.into(),
            text: text.into(),
        })
    }

    /// Nombre de origen, usualmente una ruta o `<stdin>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Texto completo.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Obtiene una línea por número, contando desde 1.
    pub fn line(&self, number: u32) -> Option<&str> {
        let index = (number as usize).checked_sub(1)?;
        self.text.lines().nth(index)
    }

    /// Ubicación vacía al inicio del texto.
    pub fn start(self: &Rc<Self>) -> Location {
        Location {
            from: Rc::clone(self),
            span: 0..0,
            start: Position::default(),
            last: Position::default(),
        }
    }
}

impl Debug for Source {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Source")
            .field("name", &self.name)
            .field("len", &self.text.len())
            .finish()
    }
}

/// Una ubicación está conformada por un origen, un rango de bytes
/// y las posiciones de su primer y último carácter.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    span: Range<usize>,
    start: Position,
    last: Position,
}

impl Location {
    /// Construye una ubicación. `last` es la posición del último
    /// carácter cubierto, o `start` si el rango es vacío.
    pub fn new(from: Rc<Source>, span: Range<usize>, start: Position, last: Position) -> Self {
        Location {
            from,
            span,
            start,
            last,
        }
    }

    /// Unifica un rango de ubicaciones. Se asume el mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            from: from.from,
            span: from.span.start..to.span.end,
            start: from.start,
            last: to.last,
        }
    }

    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.start
    }

    /// Obtiene la posición del último carácter.
    pub fn last(&self) -> Position {
        self.last
    }

    /// Rango de bytes en el texto original.
    pub fn range(&self) -> Range<usize> {
        self.span.clone()
    }

    /// Texto original que cubre esta ubicación.
    pub fn text(&self) -> &str {
        &self.from.text[self.span.clone()]
    }

    /// Unidad de código fuente de origen.
    pub fn source(&self) -> &Source {
        &self.from
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.from, &other.from) && self.span == other.span
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.from.name)?;

        if self.start == self.last {
            // Solo se señala una columna en específico
            write!(formatter, "{}", self.start)
        } else {
            write!(formatter, "[{}-{}]", self.start, self.last)
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna en un archivo.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Posición que sigue a un carácter ubicado en esta posición.
    pub fn after(self, c: char) -> Position {
        match c {
            '\n' => Position {
                line: self.line + 1,
                column: 1,
            },

            _ => Position {
                line: self.line,
                column: self.column + 1,
            },
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_advance_across_lines() {
        let position = Position::default().after('a').after('\n').after('b');
        assert_eq!((position.line(), position.column()), (2, 2));
    }

    #[test]
    fn span_covers_both_ends() {
        let source = Source::new("test", "abc def");
        let first = Location::new(
            Rc::clone(&source),
            0..3,
            Position::default(),
            Position { line: 1, column: 3 },
        );
        let second = Location::new(
            Rc::clone(&source),
            4..7,
            Position { line: 1, column: 5 },
            Position { line: 1, column: 7 },
        );

        let joined = Location::span(first, &second);
        assert_eq!(joined.text(), "abc def");
        assert_eq!(joined.to_string(), "test:[1:1-1:7]");
    }

    #[test]
    fn lines_are_one_based() {
        let source = Source::new("test", "first\nsecond\n");
        assert_eq!(source.line(2), Some("second"));
        assert_eq!(source.line(0), None);
        assert_eq!(source.line(3), None);
    }
}
