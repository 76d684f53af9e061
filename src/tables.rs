//! Tablas de símbolos compartidas entre las fases del traductor.
//!
//! La tabla de literales y la tabla de variables son la columna
//! vertebral de datos de la pipeline: el lexer las puebla, el parser
//! reescribe y agrega filas de variables al resolver alcances, y el
//! evaluador lee y escribe los valores de ejecución a través de los
//! mismos índices.

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::ops::Index;

use crate::eval::Value;

/// Clase de una constante literal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LiteralKind {
    Int,
    Double,
    String,
}

/// Una fila de la tabla de literales.
///
/// El texto se almacena en forma verbatim, ya procesadas las
/// secuencias de escape en el caso de literales de string.
#[derive(Debug)]
pub struct Literal {
    pub kind: LiteralKind,
    pub text: String,
}

/// Registro de constantes literales, direccionado por contenido.
///
/// Una vez asignado, el índice de un literal es estable por el
/// resto de la traducción.
#[derive(Debug, Default)]
pub struct LiteralTable {
    items: Vec<Literal>,
    indices: HashMap<String, usize>,
}

impl LiteralTable {
    /// Inserta un literal si su forma textual no ha sido vista,
    /// retornando el índice ya asignado en caso contrario.
    pub fn push(&mut self, text: &str, kind: LiteralKind) -> usize {
        if let Some(&index) = self.indices.get(text) {
            return index;
        }

        let index = self.items.len();
        self.items.push(Literal {
            kind,
            text: text.to_owned(),
        });

        self.indices.insert(text.to_owned(), index);
        index
    }

    /// Obtiene un literal por índice.
    pub fn get(&self, index: usize) -> &Literal {
        &self.items[index]
    }

    /// Itera sobre las filas en orden de inserción.
    pub fn iter(&self) -> impl Iterator<Item = &Literal> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Tipo declarado de una variable.
///
/// `Unknown` corresponde a filas provisionales creadas por el lexer
/// para identificadores que el parser aún no ha resuelto.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VariableType {
    Unknown,
    Int,
    Double,
    Bool,
    String,
}

impl Display for VariableType {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            VariableType::Unknown => "unknown",
            VariableType::Int => "int",
            VariableType::Double => "double",
            VariableType::Bool => "bool",
            VariableType::String => "string",
        };

        fmt.write_str(string)
    }
}

/// Una fila de la tabla de variables.
#[derive(Debug)]
pub struct Variable {
    pub name: String,
    pub typ: VariableType,

    /// Profundidad léxica del bloque declarante, 0 para el archivo.
    pub block_level: u32,

    /// Identidad única de la instancia de bloque declarante.
    pub block_id: u32,

    pub is_array: bool,
    pub array_size: Option<usize>,

    /// Celda de valor de ejecución, poblada por el evaluador.
    pub value: Option<Value>,
}

impl Variable {
    fn placeholder(name: &str) -> Self {
        Variable {
            name: name.to_owned(),
            typ: VariableType::Unknown,
            block_level: 0,
            block_id: 0,
            is_array: false,
            array_size: None,
            value: None,
        }
    }
}

/// Secuencia ordenada de filas de variables.
///
/// La tabla cumple dos roles que no deben confundirse: durante el
/// análisis léxico, cada primera aparición de un identificador crea
/// una fila provisional; durante el parsing, las declaraciones reales
/// agregan filas con la pareja `(nivel, id)` del bloque declarante y
/// los usos se resuelven contra la pila de alcances.
#[derive(Debug, Default)]
pub struct VariableTable {
    rows: Vec<Variable>,
}

impl VariableTable {
    /// Retorna la fila provisional para un nombre, creándola si es
    /// la primera aparición del mismo.
    pub fn placeholder(&mut self, name: &str) -> usize {
        match self.rows.iter().position(|row| row.name == name) {
            Some(index) => index,
            None => {
                self.rows.push(Variable::placeholder(name));
                self.rows.len() - 1
            }
        }
    }

    /// Agrega una fila ya declarada y retorna su índice.
    pub fn push(&mut self, row: Variable) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }

    /// Busca una fila declarada por nombre y bloque declarante.
    pub fn find(&self, name: &str, block_level: u32, block_id: u32) -> Option<usize> {
        self.rows.iter().position(|row| {
            row.typ != VariableType::Unknown
                && row.name == name
                && row.block_level == block_level
                && row.block_id == block_id
        })
    }

    /// Determina si un nombre ya fue declarado dentro de un bloque.
    pub fn is_declared_in_block(&self, name: &str, block_id: u32) -> bool {
        self.rows
            .iter()
            .any(|row| row.typ != VariableType::Unknown && row.name == name && row.block_id == block_id)
    }

    pub fn get(&self, index: usize) -> &Variable {
        &self.rows[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Variable {
        &mut self.rows[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Index<usize> for VariableTable {
    type Output = Variable;

    fn index(&self, index: usize) -> &Variable {
        &self.rows[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_push_is_idempotent() {
        let mut table = LiteralTable::default();
        let first = table.push("42", LiteralKind::Int);
        let second = table.push("42", LiteralKind::Int);

        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn literal_indices_are_stable() {
        let mut table = LiteralTable::default();
        let a = table.push("1", LiteralKind::Int);
        let b = table.push("2.5", LiteralKind::Double);
        table.push("hola", LiteralKind::String);

        assert_eq!(table.push("1", LiteralKind::Int), a);
        assert_eq!(table.push("2.5", LiteralKind::Double), b);
        assert_eq!(table.get(b).text, "2.5");
    }

    #[test]
    fn placeholder_reuses_rows_by_spelling() {
        let mut table = VariableTable::default();
        let x = table.placeholder("x");
        let y = table.placeholder("y");
        assert_ne!(x, y);
        assert_eq!(table.placeholder("x"), x);
        assert_eq!(table[x].typ, VariableType::Unknown);
    }

    #[test]
    fn find_ignores_placeholder_rows() {
        let mut table = VariableTable::default();
        table.placeholder("x");
        assert_eq!(table.find("x", 0, 0), None);

        let declared = table.push(Variable {
            name: "x".to_owned(),
            typ: VariableType::Int,
            block_level: 1,
            block_id: 3,
            is_array: false,
            array_size: None,
            value: None,
        });

        assert_eq!(table.find("x", 1, 3), Some(declared));
        assert!(table.is_declared_in_block("x", 3));
        assert!(!table.is_declared_in_block("x", 0));
    }
}
