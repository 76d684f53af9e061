//! Análisis semántico estático.

use thiserror::Error;

use crate::lex::{Keyword, Operator, Payload};
use crate::parse::Node;
use crate::source::Located;
use crate::tables::{LiteralTable, VariableTable, VariableType};

pub type Semantic<T> = Result<T, Located<SemanticError>>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("Division by zero.")]
    DivisionByZero,

    #[error("Int expected.")]
    IntExpected,
}

impl Node {
    /// Pasada recursiva única sobre el árbol anotado.
    ///
    /// Verifica dos propiedades de seguridad: que ningún `/` tenga
    /// como divisor un literal igual a cero, y que ambos operandos
    /// de `%` sean expresiones estáticamente enteras. Todo lo demás
    /// queda diferido al evaluador.
    pub fn check(&self, literals: &LiteralTable, variables: &VariableTable) -> Semantic<()> {
        if let Some(lexeme) = self.lexeme() {
            match lexeme.payload {
                Payload::Operator(Operator::Slash) => {
                    let divisor = &self.children()[1];

                    if let Some(divisor) = divisor.lexeme() {
                        let zero = match divisor.payload {
                            Payload::IntNumber(literal) => literals
                                .get(literal)
                                .text
                                .parse::<i64>()
                                .map(|value| value == 0)
                                .unwrap_or(false),

                            Payload::DoubleNumber(literal) => literals
                                .get(literal)
                                .text
                                .parse::<f64>()
                                .map(|value| value == 0.0)
                                .unwrap_or(false),

                            _ => false,
                        };

                        if zero {
                            return Err(Located::at(
                                SemanticError::DivisionByZero,
                                divisor.position,
                            ));
                        }
                    }
                }

                Payload::Operator(Operator::Percent) => {
                    check_int_expr(&self.children()[0], variables)?;
                    check_int_expr(&self.children()[1], variables)?;
                    return Ok(());
                }

                _ => (),
            }
        }

        for child in self.children() {
            child.check(literals, variables)?;
        }

        Ok(())
    }
}

/// Exige que un subárbol sea estáticamente entero.
///
/// Las llamadas a `stoi` cortan el descenso como enteras sin
/// importar su argumento.
fn check_int_expr(node: &Node, variables: &VariableTable) -> Semantic<()> {
    if let Some(lexeme) = node.lexeme() {
        match lexeme.payload {
            Payload::DoubleNumber(_) => {
                return Err(Located::at(SemanticError::IntExpected, lexeme.position))
            }

            Payload::Keyword(Keyword::Stod) => {
                return Err(Located::at(SemanticError::IntExpected, lexeme.position))
            }

            Payload::Keyword(Keyword::Stoi) => return Ok(()),

            Payload::Identifier(row) if variables[row].typ == VariableType::Double => {
                return Err(Located::at(SemanticError::IntExpected, lexeme.position))
            }

            _ => (),
        }
    }

    for child in node.children() {
        check_int_expr(child, variables)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::Lexer;
    use crate::parse;

    fn check(source: &str) -> Semantic<()> {
        let mut literals = LiteralTable::default();
        let mut variables = VariableTable::default();

        let lexemes = Lexer::new(source.chars(), &mut literals, &mut variables)
            .analyze()
            .expect("lexical error");

        let tree = parse::parse(lexemes, &literals, &mut variables).expect("parse error");
        tree.check(&literals, &variables)
    }

    #[test]
    fn literal_zero_divisor_is_rejected() {
        let error = check("int a = 5; int c = a / 0;").unwrap_err();
        assert!(matches!(error.val(), SemanticError::DivisionByZero));
        assert_eq!((error.position().line(), error.position().column()), (1, 24));
    }

    #[test]
    fn double_zero_divisor_is_rejected() {
        let error = check("double d = 1.5 / 0.0;").unwrap_err();
        assert!(matches!(error.val(), SemanticError::DivisionByZero));
    }

    #[test]
    fn identifier_divisor_passes_the_static_check() {
        assert!(check("int a = 5; int b = 0; int c = a / b;").is_ok());
    }

    #[test]
    fn parenthesized_zero_divisor_is_still_a_literal() {
        assert!(check("int a = 5; int c = a / (0);").is_err());
    }

    #[test]
    fn nonzero_divisors_pass() {
        assert!(check("int a = 5; int c = a / 2; double d = 1.0 / 0.5;").is_ok());
    }

    #[test]
    fn modulo_of_integers_passes() {
        assert!(check("int a = 7; int b = a % 2;").is_ok());
    }

    #[test]
    fn modulo_with_double_literal_is_rejected() {
        let error = check("int a = 7; int b = a % 2.0;").unwrap_err();
        assert!(matches!(error.val(), SemanticError::IntExpected));
    }

    #[test]
    fn modulo_with_double_identifier_is_rejected() {
        let error = check("double d = 2.0; int b = 4 % d;").unwrap_err();
        assert!(matches!(error.val(), SemanticError::IntExpected));
    }

    #[test]
    fn modulo_over_stod_is_rejected() {
        let error = check("int b = stod(\"2\") % 2;").unwrap_err();
        assert!(matches!(error.val(), SemanticError::IntExpected));
    }

    #[test]
    fn stoi_calls_count_as_integers() {
        assert!(check("int b = stoi(\"2.5\") % 2;").is_ok());
    }

    #[test]
    fn modulo_checks_descend_into_subtrees() {
        let error = check("double d = 1.0; int b = (1 + 2 * d) % 3;").unwrap_err();
        assert!(matches!(error.val(), SemanticError::IntExpected));
    }
}
