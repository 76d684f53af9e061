use crate::source::{Located, Position};
use std::{
    error::Error,
    fmt::{self, Display},
};

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn position(&self) -> Position;
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.val()
    }

    fn position(&self) -> Position {
        Located::position(self)
    }
}

/// Diagnóstico de una sola línea, listo para presentarse.
///
/// El traductor no acumula errores: el primero de cualquier fase
/// aborta la pipeline y se reporta en este formato.
pub struct Report {
    file: String,
    position: Position,
    message: String,
}

impl Report {
    pub fn new<E: LocatedError>(file: impl Into<String>, error: E) -> Self {
        Report {
            file: file.into(),
            position: error.position(),
            message: error.source().to_string(),
        }
    }
}

impl Display for Report {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            fmt,
            "File \"{}\", line {} col {}: {}",
            self.file,
            self.position.line(),
            self.position.column(),
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::ParserError;

    #[test]
    fn reports_render_as_a_single_line() {
        let error = Located::at(
            ParserError::Expected("`;`".to_owned()),
            Position::default().advance(),
        );

        let report = Report::new("demo.mc", error);
        assert_eq!(
            report.to_string(),
            "File \"demo.mc\", line 1 col 2: `;` expected"
        );
    }
}
