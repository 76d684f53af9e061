//! Rastreo de ubicaciones originales en código fuente.
//!
//! Los distintos objetos internos que el traductor construye
//! deben llevar cuenta de posiciones en el código fuente original,
//! lo cual permite determinar el punto exacto donde ocurre un
//! error de abstracción arbitraria.

use std::fmt::{self, Debug, Display, Formatter};

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    position: Position,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la posición.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Descarta la posición y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Position, T) {
        (self.position, self.value)
    }

    /// Construye a partir de un valor y una posición.
    pub fn at(value: T, position: Position) -> Self {
        Located { value, position }
    }

    /// Transforma el valor con la misma posición.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            position: self.position,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Una posición línea-columna en un archivo.
///
/// Tanto líneas como columnas comienzan en 1. Un tabulador ocupa
/// una sola columna.
#[derive(Copy, Clone, Eq, PartialEq)]
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

    /// Incrementa el número de columna.
    pub fn advance(self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    /// Incrementa el número de línea y retorna a la columna 1.
    pub fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
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

impl Debug for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_start_at_one_one() {
        let position = Position::default();
        assert_eq!((position.line(), position.column()), (1, 1));
    }

    #[test]
    fn advance_moves_within_the_same_line() {
        let position = Position::default().advance().advance();
        assert_eq!((position.line(), position.column()), (1, 3));
    }

    #[test]
    fn newline_resets_the_column() {
        let position = Position::default().advance().newline();
        assert_eq!((position.line(), position.column()), (2, 1));
    }

    #[test]
    fn located_preserves_position_across_map() {
        let located = Located::at(7, Position::default().advance());
        let (position, value) = located.map(|n| n * 2).split();
        assert_eq!(value, 14);
        assert_eq!(position.column(), 2);
    }
}
