//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del traductor. Descompone un flujo de
//! caracteres en unidades léxicas denominadas lexemas. Los espacios
//! en blanco y los comentarios se descartan durante esta operación.
//! Cada lexema emitido está asociado a la posición de su primer
//! carácter en el código fuente original, lo cual permite rastrear
//! errores tanto en los mismos como en constructos más elevados de
//! fases posteriores.
//!
//! # Contenido de un lexema
//! Un lexema lleva una carga discriminada según su categoría. Las
//! palabras clave, delimitadores y operadores se identifican por el
//! hecho de lo que son y no incluyen texto. Los identificadores
//! llevan un índice hacia la tabla de variables, donde el lexer crea
//! una fila provisional en la primera aparición de cada nombre. Las
//! constantes numéricas y de string llevan un índice hacia la tabla
//! de literales.
//!
//! # Errores
//! El lexer no se recupera: el primer error léxico aborta la fase y
//! se reporta con la posición del carácter ofensor.

use std::fmt::{self, Display};
use std::iter::Peekable;
use std::str::FromStr;

use thiserror::Error;

use crate::source::{Located, Position};
use crate::tables::{LiteralKind, LiteralTable, VariableTable};

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Una constante numérica contiene más de un punto decimal.
    #[error("too many decimal points in number")]
    TooManyDecimalPoints,

    /// Una constante numérica termina en un carácter que no puede
    /// seguir a un número.
    #[error("wrong characters after a number")]
    WrongCharactersAfterNumber,

    /// Un literal de string alcanza el fin de línea o de archivo.
    #[error("missing terminating \" character")]
    UnterminatedString,

    /// Secuencia de escape desconocida dentro de un string.
    #[error("no such escape sequence")]
    NoSuchEscapeSequence,

    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("unknown character")]
    UnknownCharacter,
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Int,
    Double,
    Bool,
    String,
    Void,
    True,
    False,
    Nullptr,
    While,
    Continue,
    Break,
    If,
    Else,
    Print,
    Scan,
    ToString,
    Stoi,
    Stod,
    Exit,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;

        let string = match self {
            Int => "int",
            Double => "double",
            Bool => "bool",
            String => "string",
            Void => "void",
            True => "true",
            False => "false",
            Nullptr => "nullptr",
            While => "while",
            Continue => "continue",
            Break => "break",
            If => "if",
            Else => "else",
            Print => "print",
            Scan => "scan",
            ToString => "to_string",
            Stoi => "stoi",
            Stod => "stod",
            Exit => "exit",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        let keyword = match string {
            "int" => Int,
            "double" => Double,
            "bool" => Bool,
            "string" => String,
            "void" => Void,
            "true" => True,
            "false" => False,
            "nullptr" => Nullptr,
            "while" => While,
            "continue" => Continue,
            "break" => Break,
            "if" => If,
            "else" => Else,
            "print" => Print,
            "scan" => Scan,
            "to_string" => ToString,
            "stoi" => Stoi,
            "stod" => Stod,
            "exit" => Exit,

            _ => return Err(()),
        };

        Ok(keyword)
    }
}

/// Un delimitador de un solo carácter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Delimiter {
    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `;`
    Semicolon,

    /// `{`
    OpenBrace,

    /// `}`
    CloseBrace,

    /// `[`
    OpenBracket,

    /// `]`
    CloseBracket,
}

impl Delimiter {
    fn from_char(c: char) -> Option<Self> {
        use Delimiter::*;

        let delimiter = match c {
            '(' => OpenParen,
            ')' => CloseParen,
            ';' => Semicolon,
            '{' => OpenBrace,
            '}' => CloseBrace,
            '[' => OpenBracket,
            ']' => CloseBracket,

            _ => return None,
        };

        Some(delimiter)
    }
}

impl Display for Delimiter {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Delimiter::*;

        let string = match self {
            OpenParen => "`(`",
            CloseParen => "`)`",
            Semicolon => "`;`",
            OpenBrace => "`{`",
            CloseBrace => "`}`",
            OpenBracket => "`[`",
            CloseBracket => "`]`",
        };

        fmt.write_str(string)
    }
}

/// Un operador.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Assign,

    /// `!`
    Not,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `<`
    Less,

    /// `<=`
    LessOrEqual,

    /// `>`
    Greater,

    /// `>=`
    GreaterOrEqual,

    /// `&&`
    And,

    /// `||`
    Or,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Asterisk,

    /// `/`
    Slash,

    /// `%`
    Percent,

    /// `&`
    Ampersand,
}

impl Operator {
    /// Operador de un solo carácter.
    fn from_char(c: char) -> Option<Self> {
        use Operator::*;

        let operator = match c {
            '=' => Assign,
            '!' => Not,
            '<' => Less,
            '>' => Greater,
            '+' => Plus,
            '-' => Minus,
            '*' => Asterisk,
            '/' => Slash,
            '%' => Percent,
            '&' => Ampersand,

            _ => return None,
        };

        Some(operator)
    }

    /// Operador de dos caracteres. La ventana `//` no es un operador
    /// emitible, ya que inicia un comentario de línea.
    fn from_pair(first: char, second: char) -> Option<Self> {
        use Operator::*;

        let operator = match (first, second) {
            ('=', '=') => Equal,
            ('!', '=') => NotEqual,
            ('<', '=') => LessOrEqual,
            ('>', '=') => GreaterOrEqual,
            ('&', '&') => And,
            ('|', '|') => Or,

            _ => return None,
        };

        Some(operator)
    }

    /// Determina si un carácter puede terminar una constante numérica.
    fn is_single(c: char) -> bool {
        Operator::from_char(c).is_some()
    }
}

impl Display for Operator {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Operator::*;

        let string = match self {
            Assign => "`=`",
            Not => "`!`",
            Equal => "`==`",
            NotEqual => "`!=`",
            Less => "`<`",
            LessOrEqual => "`<=`",
            Greater => "`>`",
            GreaterOrEqual => "`>=`",
            And => "`&&`",
            Or => "`||`",
            Plus => "`+`",
            Minus => "`-`",
            Asterisk => "`*`",
            Slash => "`/`",
            Percent => "`%`",
            Ampersand => "`&`",
        };

        fmt.write_str(string)
    }
}

/// Carga discriminada de un lexema.
///
/// Las fases posteriores deben despachar sobre la categoría antes de
/// interpretar los índices.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Keyword(Keyword),
    Delimiter(Delimiter),
    Operator(Operator),

    /// Índice hacia la tabla de variables.
    Identifier(usize),

    /// Índice hacia la tabla de literales.
    IntNumber(usize),

    /// Índice hacia la tabla de literales.
    DoubleNumber(usize),

    /// Índice hacia la tabla de literales.
    StringLiteral(usize),
}

/// Objeto resultante del análisis léxico.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Lexeme {
    pub payload: Payload,
    pub position: Position,
}

/// Posibles estados del lexer.
///
/// La salida del lexer, así como su siguiente estado, se define a
/// partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un lexema.
    Start,

    /// Término que puede ser un identificador o una palabra clave.
    Word { text: String, start: Position },

    /// Constante numérica, entera o de punto flotante.
    Number {
        text: String,
        seen_dot: bool,
        start: Position,
    },

    /// Literal de string, con comilla de apertura ya consumida.
    Str { text: String, start: Position },

    /// Comentario de línea. Vuelve a [`State::Start`] al encontrar
    /// un fin de línea.
    Comment,
}

/// Máquina de estados para análisis léxico.
pub struct Lexer<'t, S: Iterator<Item = char>> {
    source: Peekable<S>,
    position: Position,
    literals: &'t mut LiteralTable,
    variables: &'t mut VariableTable,
}

impl<'t, S: Iterator<Item = char>> Lexer<'t, S> {
    /// Crea un lexer en estado inicial a partir de un flujo de
    /// caracteres y las dos tablas compartidas.
    pub fn new(
        source: S,
        literals: &'t mut LiteralTable,
        variables: &'t mut VariableTable,
    ) -> Self {
        Lexer {
            source: source.peekable(),
            position: Position::default(),
            literals,
            variables,
        }
    }

    /// Reduce la entrada completa a una secuencia de lexemas o al
    /// primer error léxico encontrado.
    pub fn analyze(mut self) -> Result<Vec<Lexeme>, Located<LexerError>> {
        let mut lexemes = Vec::new();
        let mut state = State::Start;

        loop {
            let next = self.source.peek().copied();

            // Switch table principal: combinaciones del estado actual
            // y el siguiente carácter del flujo de entrada
            state = match (state, next) {
                (State::Start, None) => return Ok(lexemes),

                // Espacios en blanco
                (State::Start, Some(c)) if c == ' ' || c == '\t' || c == '\n' => {
                    self.bump();
                    State::Start
                }

                // Identificadores y palabras clave
                (State::Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => State::Word {
                    text: String::new(),
                    start: self.position,
                },

                (State::Word { mut text, start }, Some(c))
                    if c.is_ascii_alphanumeric() || c == '_' =>
                {
                    text.push(c);
                    self.bump();
                    State::Word { text, start }
                }

                (State::Word { text, start }, _) => {
                    let payload = match Keyword::from_str(&text) {
                        Ok(keyword) => Payload::Keyword(keyword),
                        Err(()) => Payload::Identifier(self.variables.placeholder(&text)),
                    };

                    lexemes.push(Lexeme {
                        payload,
                        position: start,
                    });

                    State::Start
                }

                // Constantes numéricas
                (State::Start, Some(c)) if c.is_ascii_digit() || c == '.' => State::Number {
                    text: String::new(),
                    seen_dot: false,
                    start: self.position,
                },

                (State::Number { seen_dot: true, .. }, Some('.')) => {
                    return Err(Located::at(
                        LexerError::TooManyDecimalPoints,
                        self.position,
                    ))
                }

                (
                    State::Number {
                        mut text,
                        seen_dot,
                        start,
                    },
                    Some(c),
                ) if c.is_ascii_digit() || c == '.' => {
                    text.push(c);
                    self.bump();

                    State::Number {
                        text,
                        seen_dot: seen_dot || c == '.',
                        start,
                    }
                }

                (
                    State::Number {
                        text,
                        seen_dot,
                        start,
                    },
                    next,
                ) => {
                    let boundary = match next {
                        None => true,
                        Some(c) => {
                            c == ' '
                                || c == '\t'
                                || c == '\n'
                                || c == ';'
                                || c == ')'
                                || c == ']'
                                || Operator::is_single(c)
                        }
                    };

                    if !boundary {
                        return Err(Located::at(
                            LexerError::WrongCharactersAfterNumber,
                            self.position,
                        ));
                    }

                    let (kind, make): (LiteralKind, fn(usize) -> Payload) = if seen_dot {
                        (LiteralKind::Double, Payload::DoubleNumber)
                    } else {
                        (LiteralKind::Int, Payload::IntNumber)
                    };

                    lexemes.push(Lexeme {
                        payload: make(self.literals.push(&text, kind)),
                        position: start,
                    });

                    State::Start
                }

                // Delimitadores
                (State::Start, Some(c)) if Delimiter::from_char(c).is_some() => {
                    lexemes.push(Lexeme {
                        payload: Payload::Delimiter(Delimiter::from_char(c).unwrap()),
                        position: self.position,
                    });

                    self.bump();
                    State::Start
                }

                // Literales de string
                (State::Start, Some('"')) => {
                    let start = self.position;
                    self.bump();

                    State::Str {
                        text: String::new(),
                        start,
                    }
                }

                (State::Str { .. }, Some('\n')) | (State::Str { .. }, None) => {
                    return Err(Located::at(LexerError::UnterminatedString, self.position))
                }

                (State::Str { text, start }, Some('"')) => {
                    lexemes.push(Lexeme {
                        payload: Payload::StringLiteral(
                            self.literals.push(&text, LiteralKind::String),
                        ),
                        position: start,
                    });

                    self.bump();
                    State::Start
                }

                // Una secuencia de escape consume exactamente un
                // carácter tras la barra; el error se reporta en la
                // columna de la barra misma
                (State::Str { mut text, start }, Some('\\')) => {
                    let backslash = self.position;
                    self.bump();

                    match self.source.peek().copied().and_then(escape) {
                        Some(decoded) => {
                            text.push(decoded);
                            self.bump();
                        }

                        None => {
                            return Err(Located::at(LexerError::NoSuchEscapeSequence, backslash))
                        }
                    }

                    State::Str { text, start }
                }

                (State::Str { mut text, start }, Some(c)) => {
                    text.push(c);
                    self.bump();
                    State::Str { text, start }
                }

                // Comentarios de línea
                (State::Comment, Some('\n')) => {
                    self.bump();
                    State::Start
                }

                (State::Comment, Some(_)) => {
                    self.bump();
                    State::Comment
                }

                (State::Comment, None) => return Ok(lexemes),

                // Operadores: se observa una ventana de dos caracteres;
                // si la ventana no forma un operador conocido, el
                // segundo carácter queda sin leer
                (State::Start, Some(first)) => {
                    let start = self.position;
                    self.bump();
                    let second = self.source.peek().copied();

                    if first == '/' && second == Some('/') {
                        self.bump();
                        State::Comment
                    } else if let Some(operator) =
                        second.and_then(|second| Operator::from_pair(first, second))
                    {
                        lexemes.push(Lexeme {
                            payload: Payload::Operator(operator),
                            position: start,
                        });

                        self.bump();
                        State::Start
                    } else if let Some(operator) = Operator::from_char(first) {
                        lexemes.push(Lexeme {
                            payload: Payload::Operator(operator),
                            position: start,
                        });

                        State::Start
                    } else {
                        return Err(Located::at(LexerError::UnknownCharacter, start));
                    }
                }
            };
        }
    }

    /// Consume el carácter observado con lookahead, ajustando la
    /// posición del siguiente.
    fn bump(&mut self) {
        if let Some(c) = self.source.next() {
            self.position = match c {
                '\n' => self.position.newline(),
                _ => self.position.advance(),
            };
        }
    }
}

/// Traduce el carácter que sigue a una barra de escape.
fn escape(c: char) -> Option<char> {
    let decoded = match c {
        'a' => '\u{07}',
        'b' => '\u{08}',
        'f' => '\u{0C}',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\u{0B}',
        '\'' => '\'',
        '"' => '"',
        '\\' => '\\',

        _ => return None,
    };

    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Result<Vec<Lexeme>, Located<LexerError>> {
        let mut literals = LiteralTable::default();
        let mut variables = VariableTable::default();
        Lexer::new(source.chars(), &mut literals, &mut variables).analyze()
    }

    fn lex_with_tables(source: &str) -> (Vec<Lexeme>, LiteralTable, VariableTable) {
        let mut literals = LiteralTable::default();
        let mut variables = VariableTable::default();
        let lexemes = Lexer::new(source.chars(), &mut literals, &mut variables)
            .analyze()
            .expect("lexical error");

        (lexemes, literals, variables)
    }

    fn payloads(source: &str) -> Vec<Payload> {
        lex(source)
            .expect("lexical error")
            .into_iter()
            .map(|lexeme| lexeme.payload)
            .collect()
    }

    #[test]
    fn keywords_and_identifiers_are_distinguished() {
        let (lexemes, _, variables) = lex_with_tables("int contador while whilex");

        assert_eq!(lexemes[0].payload, Payload::Keyword(Keyword::Int));
        assert_eq!(lexemes[2].payload, Payload::Keyword(Keyword::While));

        assert!(matches!(lexemes[1].payload, Payload::Identifier(_)));
        assert!(matches!(lexemes[3].payload, Payload::Identifier(_)));
        assert_eq!(variables.len(), 2);
    }

    #[test]
    fn repeated_identifiers_share_a_placeholder_row() {
        let (lexemes, _, variables) = lex_with_tables("x y x");

        assert_eq!(lexemes[0].payload, lexemes[2].payload);
        assert_ne!(lexemes[0].payload, lexemes[1].payload);
        assert_eq!(variables.len(), 2);
    }

    #[test]
    fn identifier_payloads_index_the_variable_table() {
        let (lexemes, _, variables) = lex_with_tables("uno dos tres uno");

        for lexeme in lexemes {
            match lexeme.payload {
                Payload::Identifier(index) => assert!(index < variables.len()),
                other => panic!("unexpected payload {:?}", other),
            }
        }
    }

    #[test]
    fn numbers_are_classified_by_decimal_point() {
        let (lexemes, literals, _) = lex_with_tables("12 3.5 .5 7.");

        assert!(matches!(lexemes[0].payload, Payload::IntNumber(_)));
        assert!(matches!(lexemes[1].payload, Payload::DoubleNumber(_)));
        assert!(matches!(lexemes[2].payload, Payload::DoubleNumber(_)));
        assert!(matches!(lexemes[3].payload, Payload::DoubleNumber(_)));

        let texts: Vec<_> = literals
            .iter()
            .map(|literal| literal.text.as_str())
            .collect();

        assert_eq!(texts, ["12", "3.5", ".5", "7."]);
    }

    #[test]
    fn number_boundaries_accept_closing_delimiters() {
        assert!(lex("(5)").is_ok());
        assert!(lex("v[3]").is_ok());
        assert!(lex("5;").is_ok());
        assert!(lex("5+1").is_ok());
    }

    #[test]
    fn number_followed_by_letter_is_rejected() {
        let error = lex("123abc").unwrap_err();
        assert!(matches!(
            error.val(),
            LexerError::WrongCharactersAfterNumber
        ));
        assert_eq!(error.position().column(), 4);
    }

    #[test]
    fn number_with_two_dots_is_rejected() {
        let error = lex("1.2.3").unwrap_err();
        assert!(matches!(error.val(), LexerError::TooManyDecimalPoints));
        assert_eq!(error.position().column(), 4);
    }

    #[test]
    fn two_character_operators_win_over_single() {
        assert_eq!(
            payloads("== != <= >= && || = < >"),
            [
                Payload::Operator(Operator::Equal),
                Payload::Operator(Operator::NotEqual),
                Payload::Operator(Operator::LessOrEqual),
                Payload::Operator(Operator::GreaterOrEqual),
                Payload::Operator(Operator::And),
                Payload::Operator(Operator::Or),
                Payload::Operator(Operator::Assign),
                Payload::Operator(Operator::Less),
                Payload::Operator(Operator::Greater),
            ]
        );
    }

    #[test]
    fn adjacent_operator_pairs_leave_second_unread() {
        assert_eq!(
            payloads("a=-1;"),
            [
                Payload::Identifier(0),
                Payload::Operator(Operator::Assign),
                Payload::Operator(Operator::Minus),
                Payload::IntNumber(0),
                Payload::Delimiter(Delimiter::Semicolon),
            ]
        );
    }

    #[test]
    fn lone_pipe_is_an_unknown_character() {
        let error = lex("a | b").unwrap_err();
        assert!(matches!(error.val(), LexerError::UnknownCharacter));
        assert_eq!(error.position().column(), 3);
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            payloads("1 // esto se ignora ; } \"\n2"),
            [Payload::IntNumber(0), Payload::IntNumber(1)]
        );
    }

    #[test]
    fn comment_at_end_of_file_terminates() {
        assert_eq!(payloads("7 // sin salto final"), [Payload::IntNumber(0)]);
    }

    #[test]
    fn string_escapes_are_decoded() {
        let (_, literals, _) = lex_with_tables(r#""a\tb\n\"c\"\\""#);
        assert_eq!(literals.get(0).text, "a\tb\n\"c\"\\");
    }

    #[test]
    fn unknown_escape_points_at_the_backslash() {
        let error = lex(r#""abc\q""#).unwrap_err();
        assert!(matches!(error.val(), LexerError::NoSuchEscapeSequence));
        assert_eq!(error.position().column(), 5);
    }

    #[test]
    fn unterminated_string_points_at_the_newline() {
        let error = lex("\"abc\nrest").unwrap_err();
        assert!(matches!(error.val(), LexerError::UnterminatedString));
        assert_eq!(error.position().line(), 1);
        assert_eq!(error.position().column(), 5);
    }

    #[test]
    fn unterminated_string_at_eof() {
        let error = lex("\"abc").unwrap_err();
        assert!(matches!(error.val(), LexerError::UnterminatedString));
        assert_eq!(error.position().column(), 5);
    }

    #[test]
    fn positions_are_one_based_and_track_lines() {
        let (lexemes, _, _) = lex_with_tables("int x;\n  y = 2;");

        let positions: Vec<_> = lexemes
            .iter()
            .map(|lexeme| (lexeme.position.line(), lexeme.position.column()))
            .collect();

        assert_eq!(
            positions,
            [(1, 1), (1, 5), (1, 6), (2, 3), (2, 5), (2, 7), (2, 8)]
        );
    }

    #[test]
    fn equal_literals_share_a_table_row() {
        let (lexemes, literals, _) = lex_with_tables("1 2 1 \"x\" \"x\"");

        assert_eq!(lexemes[0].payload, lexemes[2].payload);
        assert_eq!(lexemes[3].payload, lexemes[4].payload);
        assert_eq!(literals.len(), 3);
    }
}
