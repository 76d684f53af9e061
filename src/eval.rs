//! Evaluación por recorrido del árbol anotado.
//!
//! El evaluador interpreta el árbol que produce el parser. El
//! despacho ocurre por tipo de nodo, luego por categoría de lexema
//! y finalmente por código de palabra clave u operador. Los valores
//! de ejecución viven en las celdas de la tabla de variables, a
//! través de los mismos índices que el parser dejó anotados en los
//! lexemas de identificador.
//!
//! La entrada y salida estándar se inyectan como flujos genéricos,
//! por lo cual `print` y `scan` son observables en pruebas sin
//! tocar el proceso.

use std::fmt::{self, Display};
use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::lex::{Keyword, Lexeme, Operator, Payload};
use crate::parse::Node;
use crate::source::{Located, Position};
use crate::tables::{LiteralTable, VariableTable, VariableType};

/// Error de ejecución.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Error de E/S sobre los flujos estándar.
    #[error("I/O error")]
    Input(#[from] io::Error),

    #[error("Integer overflow")]
    IntegerOverflow,

    #[error("Malformed numeric literal")]
    MalformedNumber,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("`stoi` cannot parse `{0}` as an integer")]
    BadStoi(String),

    #[error("`stod` cannot parse `{0}` as a double")]
    BadStod(String),

    #[error("Index {0} is out of bounds for an array of size {1}")]
    OutOfBounds(i64, usize),

    /// Los tipos de los operandos no corresponden a la operación.
    #[error("Invalid operand types")]
    InvalidOperands,
}

pub type Execution<T> = Result<T, Located<RuntimeError>>;

/// Valor de ejecución etiquetado.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Void,
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    Array(Vec<Value>),
}

impl Value {
    /// Elemento neutro de un tipo declarado; es lo que produce la
    /// lectura de una variable antes de su primera asignación.
    fn neutral(typ: VariableType) -> Value {
        match typ {
            VariableType::Int => Value::Int(0),
            VariableType::Double => Value::Double(0.0),
            VariableType::Bool => Value::Bool(false),
            VariableType::String => Value::Str(String::new()),
            VariableType::Unknown => Value::Void,
        }
    }
}

impl Display for Value {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void | Value::Array(_) => Ok(()),
            Value::Int(value) => write!(fmt, "{}", value),
            Value::Double(value) => write!(fmt, "{}", value),
            Value::Bool(value) => write!(fmt, "{}", value),
            Value::Str(value) => fmt.write_str(value),
        }
    }
}

/// Resultado de control de flujo de una sentencia.
enum Flow {
    Next,
    Break,
    Continue,
    Exit(i32),
}

/// Intérprete por recorrido de árbol.
pub struct Evaluator<'t, R: BufRead, W: Write> {
    literals: &'t LiteralTable,
    variables: &'t mut VariableTable,
    input: R,
    output: W,
}

impl<'t, R: BufRead, W: Write> Evaluator<'t, R, W> {
    pub fn new(
        literals: &'t LiteralTable,
        variables: &'t mut VariableTable,
        input: R,
        output: W,
    ) -> Self {
        Evaluator {
            literals,
            variables,
            input,
            output,
        }
    }

    /// Ejecuta el programa completo. Retorna el código solicitado
    /// a través de `exit`, si la ejecución llegó a uno.
    pub fn run(&mut self, root: &Node) -> Execution<Option<i32>> {
        match self.execute(root)? {
            Flow::Exit(code) => Ok(Some(code)),
            _ => Ok(None),
        }
    }

    fn execute(&mut self, node: &Node) -> Execution<Flow> {
        match node {
            Node::Block { children } => {
                for child in children {
                    match self.execute(child)? {
                        Flow::Next => (),
                        other => return Ok(other),
                    }
                }

                Ok(Flow::Next)
            }

            // El hijo de una declaración es el identificador solo o
            // bien su nodo `=` inicializador; la celda de una variable
            // sin inicializar queda vacía hasta la primera lectura
            Node::Declaration { children } => {
                if let Some(Node::Common { lexeme, children }) = children.first() {
                    if lexeme.payload == Payload::Operator(Operator::Assign) {
                        self.assign(children)?;
                    }
                }

                Ok(Flow::Next)
            }

            Node::Common { lexeme, children } => self.execute_common(lexeme, children),

            Node::IndexAppeal { .. } => unreachable!(),
        }
    }

    fn execute_common(&mut self, lexeme: &Lexeme, children: &[Node]) -> Execution<Flow> {
        match lexeme.payload {
            Payload::Operator(Operator::Assign) => {
                self.assign(children)?;
                Ok(Flow::Next)
            }

            Payload::Keyword(Keyword::While) => {
                loop {
                    let condition = self.evaluate(&children[0])?;
                    if !self.truthy(condition, &children[0])? {
                        break;
                    }

                    if let Some(body) = children.get(1) {
                        match self.execute(body)? {
                            Flow::Next => (),
                            Flow::Continue => (),
                            Flow::Break => break,
                            exit @ Flow::Exit(_) => return Ok(exit),
                        }
                    }
                }

                Ok(Flow::Next)
            }

            Payload::Keyword(Keyword::If) => {
                let condition = self.evaluate(&children[0])?;

                if self.truthy(condition, &children[0])? {
                    self.execute(&children[1])
                } else if let Some(alternative) = children.get(2) {
                    self.execute(alternative)
                } else {
                    Ok(Flow::Next)
                }
            }

            Payload::Keyword(Keyword::Print) => {
                let value = self.evaluate(&children[0])?;
                let text = value.to_string();

                self.output
                    .write_all(text.as_bytes())
                    .and_then(|()| self.output.flush())
                    .map_err(|error| Located::at(error.into(), lexeme.position))?;

                Ok(Flow::Next)
            }

            Payload::Keyword(Keyword::Exit) => {
                let code = match self.evaluate(&children[0])? {
                    Value::Int(code) => code as i32,
                    Value::Double(code) => code as i32,
                    _ => {
                        return Err(Located::at(RuntimeError::InvalidOperands, lexeme.position))
                    }
                };

                Ok(Flow::Exit(code))
            }

            Payload::Keyword(Keyword::Break) => Ok(Flow::Break),
            Payload::Keyword(Keyword::Continue) => Ok(Flow::Continue),

            _ => unreachable!(),
        }
    }

    /// Asignación: escribe la evaluación del lado derecho en la celda
    /// del identificador o del elemento de arreglo del lado izquierdo.
    fn assign(&mut self, children: &[Node]) -> Execution<()> {
        let target = &children[0];
        let value = self.evaluate(&children[1])?;

        match target {
            Node::Common { .. } => {
                let row = identifier_row(target);
                let typ = self.variables[row].typ;
                self.variables.get_mut(row).value = Some(coerce(value, typ));

                Ok(())
            }

            Node::IndexAppeal { children } => {
                let row = identifier_row(&children[0]);
                let position = position_of(&children[0]);

                let index = self.evaluate(&children[1])?;
                let size = self.variables[row].array_size.unwrap_or(0);
                let index = element_index(index, size, position)?;

                let typ = self.variables[row].typ;
                self.array_slot(row)[index] = coerce(value, typ);

                Ok(())
            }

            _ => unreachable!(),
        }
    }

    fn evaluate(&mut self, node: &Node) -> Execution<Value> {
        match node {
            Node::Common { lexeme, children } => self.evaluate_common(lexeme, children),

            Node::IndexAppeal { children } => {
                let row = identifier_row(&children[0]);
                let position = position_of(&children[0]);

                let index = self.evaluate(&children[1])?;
                let size = self.variables[row].array_size.unwrap_or(0);
                let index = element_index(index, size, position)?;

                Ok(self.array_slot(row)[index].clone())
            }

            _ => unreachable!(),
        }
    }

    fn evaluate_common(&mut self, lexeme: &Lexeme, children: &[Node]) -> Execution<Value> {
        match lexeme.payload {
            Payload::IntNumber(literal) => self
                .literals
                .get(literal)
                .text
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| Located::at(RuntimeError::IntegerOverflow, lexeme.position)),

            Payload::DoubleNumber(literal) => self
                .literals
                .get(literal)
                .text
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| Located::at(RuntimeError::MalformedNumber, lexeme.position)),

            Payload::StringLiteral(literal) => {
                Ok(Value::Str(self.literals.get(literal).text.clone()))
            }

            Payload::Identifier(row) => Ok(self.load(row)),

            Payload::Keyword(keyword) => self.evaluate_keyword(keyword, lexeme, children),
            Payload::Operator(operator) => self.evaluate_operator(operator, lexeme, children),

            Payload::Delimiter(_) => unreachable!(),
        }
    }

    fn evaluate_keyword(
        &mut self,
        keyword: Keyword,
        lexeme: &Lexeme,
        children: &[Node],
    ) -> Execution<Value> {
        use Keyword::*;

        match keyword {
            True => Ok(Value::Bool(true)),
            False => Ok(Value::Bool(false)),

            // Una línea de la entrada estándar, sin el terminador
            Scan => {
                let mut line = std::string::String::new();
                self.input
                    .read_line(&mut line)
                    .map_err(|error| Located::at(error.into(), lexeme.position))?;

                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }

                Ok(Value::Str(line))
            }

            ToString => {
                let value = self.evaluate(&children[0])?;
                Ok(Value::Str(value.to_string()))
            }

            Stoi => match self.evaluate(&children[0])? {
                Value::Str(text) => match text.trim().parse::<i64>() {
                    Ok(value) => Ok(Value::Int(value)),
                    Err(_) => Err(Located::at(RuntimeError::BadStoi(text), lexeme.position)),
                },

                _ => Err(Located::at(RuntimeError::InvalidOperands, lexeme.position)),
            },

            Stod => match self.evaluate(&children[0])? {
                Value::Str(text) => match text.trim().parse::<f64>() {
                    Ok(value) => Ok(Value::Double(value)),
                    Err(_) => Err(Located::at(RuntimeError::BadStod(text), lexeme.position)),
                },

                _ => Err(Located::at(RuntimeError::InvalidOperands, lexeme.position)),
            },

            // Los nombres de tipo y `nullptr` se reducen al valor neutro
            Int | Double | Bool | String | Void | Nullptr => Ok(Value::Void),

            While | If | Else | Print | Exit | Break | Continue => unreachable!(),
        }
    }

    fn evaluate_operator(
        &mut self,
        operator: Operator,
        lexeme: &Lexeme,
        children: &[Node],
    ) -> Execution<Value> {
        use Operator::*;

        match operator {
            // `&&` y `||` no preevalúan su operando derecho
            And => {
                let left = self.evaluate(&children[0])?;
                if !self.truthy(left, &children[0])? {
                    return Ok(Value::Bool(false));
                }

                let right = self.evaluate(&children[1])?;
                Ok(Value::Bool(self.truthy(right, &children[1])?))
            }

            Or => {
                let left = self.evaluate(&children[0])?;
                if self.truthy(left, &children[0])? {
                    return Ok(Value::Bool(true));
                }

                let right = self.evaluate(&children[1])?;
                Ok(Value::Bool(self.truthy(right, &children[1])?))
            }

            Not => {
                let value = self.evaluate(&children[0])?;
                Ok(Value::Bool(!self.truthy(value, &children[0])?))
            }

            Plus | Minus if children.len() == 1 => {
                let value = self.evaluate(&children[0])?;

                match (operator, value) {
                    (Plus, Value::Int(value)) => Ok(Value::Int(value)),
                    (Plus, Value::Double(value)) => Ok(Value::Double(value)),

                    (Minus, Value::Int(value)) => value
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| Located::at(RuntimeError::IntegerOverflow, lexeme.position)),

                    (Minus, Value::Double(value)) => Ok(Value::Double(-value)),

                    _ => Err(Located::at(RuntimeError::InvalidOperands, lexeme.position)),
                }
            }

            Plus | Minus | Asterisk | Slash | Percent => {
                let left = self.evaluate(&children[0])?;
                let right = self.evaluate(&children[1])?;
                arithmetic(operator, left, right, lexeme.position)
            }

            Equal | NotEqual | Less | LessOrEqual | Greater | GreaterOrEqual => {
                let left = self.evaluate(&children[0])?;
                let right = self.evaluate(&children[1])?;
                compare(operator, left, right, lexeme.position)
            }

            Assign | Ampersand => unreachable!(),
        }
    }

    /// Lectura de la celda de una variable.
    fn load(&self, row: usize) -> Value {
        let variable = &self.variables[row];

        match &variable.value {
            Some(value) => value.clone(),

            None if variable.is_array => Value::Array(vec![
                Value::neutral(variable.typ);
                variable.array_size.unwrap_or(0)
            ]),

            None => Value::neutral(variable.typ),
        }
    }

    /// Celda de arreglo, materializada con elementos neutros en el
    /// primer acceso.
    fn array_slot(&mut self, row: usize) -> &mut Vec<Value> {
        let typ = self.variables[row].typ;
        let size = self.variables[row].array_size.unwrap_or(0);

        let slot = &mut self.variables.get_mut(row).value;
        match slot {
            Some(Value::Array(_)) => (),
            _ => *slot = Some(Value::Array(vec![Value::neutral(typ); size])),
        }

        match slot {
            Some(Value::Array(elements)) => elements,
            _ => unreachable!(),
        }
    }

    fn truthy(&self, value: Value, node: &Node) -> Execution<bool> {
        match value {
            Value::Bool(value) => Ok(value),
            _ => Err(Located::at(
                RuntimeError::InvalidOperands,
                position_of(node),
            )),
        }
    }
}

/// Ajusta un valor al tipo declarado de la celda que lo recibe.
fn coerce(value: Value, typ: VariableType) -> Value {
    match (typ, value) {
        (VariableType::Int, Value::Double(value)) => Value::Int(value as i64),
        (VariableType::Double, Value::Int(value)) => Value::Double(value as f64),
        (_, value) => value,
    }
}

fn arithmetic(
    operator: Operator,
    left: Value,
    right: Value,
    position: Position,
) -> Execution<Value> {
    use Operator::*;

    let value = match (left, right) {
        // `+` entre strings es concatenación
        (Value::Str(left), Value::Str(right)) if operator == Plus => Value::Str(left + &right),

        (Value::Int(left), Value::Int(right)) => {
            let result = match operator {
                Plus => left.checked_add(right),
                Minus => left.checked_sub(right),
                Asterisk => left.checked_mul(right),

                Slash | Percent => {
                    if right == 0 {
                        return Err(Located::at(RuntimeError::DivisionByZero, position));
                    }

                    match operator {
                        Slash => left.checked_div(right),
                        _ => left.checked_rem(right),
                    }
                }

                _ => unreachable!(),
            };

            match result {
                Some(result) => Value::Int(result),
                None => return Err(Located::at(RuntimeError::IntegerOverflow, position)),
            }
        }

        // Mezclas de int y double se ensanchan a double
        (left, right) => {
            let (left, right) = match (number(left), number(right)) {
                (Some(left), Some(right)) => (left, right),
                _ => return Err(Located::at(RuntimeError::InvalidOperands, position)),
            };

            let result = match operator {
                Plus => left + right,
                Minus => left - right,
                Asterisk => left * right,

                // La división flotante sigue IEEE 754
                Slash => left / right,

                Percent => return Err(Located::at(RuntimeError::InvalidOperands, position)),
                _ => unreachable!(),
            };

            Value::Double(result)
        }
    };

    Ok(value)
}

fn compare(operator: Operator, left: Value, right: Value, position: Position) -> Execution<Value> {
    let result = match (left, right) {
        (Value::Str(left), Value::Str(right)) => holds(operator, &left, &right),
        (Value::Int(left), Value::Int(right)) => holds(operator, &left, &right),

        (left, right) => match (number(left), number(right)) {
            (Some(left), Some(right)) => holds(operator, &left, &right),
            _ => return Err(Located::at(RuntimeError::InvalidOperands, position)),
        },
    };

    Ok(Value::Bool(result))
}

fn holds<T: PartialOrd + ?Sized>(operator: Operator, left: &T, right: &T) -> bool {
    use Operator::*;

    match operator {
        Equal => left == right,
        NotEqual => left != right,
        Less => left < right,
        LessOrEqual => left <= right,
        Greater => left > right,
        GreaterOrEqual => left >= right,
        _ => unreachable!(),
    }
}

fn number(value: Value) -> Option<f64> {
    match value {
        Value::Int(value) => Some(value as f64),
        Value::Double(value) => Some(value),
        _ => None,
    }
}

fn element_index(value: Value, size: usize, position: Position) -> Execution<usize> {
    let index = match value {
        Value::Int(index) => index,
        Value::Double(index) => index as i64,
        _ => return Err(Located::at(RuntimeError::InvalidOperands, position)),
    };

    if index < 0 || index as usize >= size {
        return Err(Located::at(RuntimeError::OutOfBounds(index, size), position));
    }

    Ok(index as usize)
}

fn identifier_row(node: &Node) -> usize {
    match node.lexeme() {
        Some(Lexeme {
            payload: Payload::Identifier(row),
            ..
        }) => *row,

        _ => unreachable!(),
    }
}

/// Posición más cercana disponible dentro de un subárbol.
fn position_of(node: &Node) -> Position {
    match node.lexeme() {
        Some(lexeme) => lexeme.position,
        None => node
            .children()
            .first()
            .map(position_of)
            .unwrap_or_default(),
    }
}
