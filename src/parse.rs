//! Análisis sintáctico.
//!
//! El parser es descendente-recursivo con un lexema de lookahead.
//! Además de construir el árbol de sintaxis, resuelve alcances sobre
//! la tabla de variables: las declaraciones agregan o reescriben
//! filas y los usos se resuelven contra la pila de alcances,
//! reescribiendo la carga del lexema para que apunte a la fila
//! correcta. El único retroceso ocurre en la ventana ambigua de
//! términos booleanos y de comparación.

use thiserror::Error;

use crate::lex::{Delimiter, Keyword, Lexeme, Operator, Payload};
use crate::source::{Located, Position};
use crate::tables::{LiteralTable, Variable, VariableTable, VariableType};

/// Error de parsing.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("{0} expected")]
    Expected(String),

    #[error("Variable {0} using before declaration")]
    UsingBeforeDeclaration(String),

    #[error("Double declaration of variable {0}")]
    DoubleDeclaration(String),

    #[error("Variable {0} is not subscriptable")]
    NotSubscriptable(String),

    #[error("{0}")]
    Syntax(String),
}

pub type Parse<T> = Result<T, Located<ParserError>>;

/// Un nodo del árbol de sintaxis.
///
/// Cada nodo es dueño exclusivo de sus hijos; el árbol completo
/// cuelga de una única raíz de tipo [`Node::Block`].
#[derive(Debug)]
pub enum Node {
    /// Operador, palabra clave, literal o identificador, con la
    /// cantidad de hijos que el constructo amerite.
    Common { lexeme: Lexeme, children: Vec<Node> },

    /// Declaración de variable. El único hijo es el identificador
    /// declarado o bien el nodo `=` de su inicializador.
    Declaration { children: Vec<Node> },

    /// Secuencia de sentencias.
    Block { children: Vec<Node> },

    /// Acceso a un elemento de arreglo: el identificador y el
    /// subárbol de la expresión de índice.
    IndexAppeal { children: Vec<Node> },
}

impl Node {
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Common { children, .. }
            | Node::Declaration { children }
            | Node::Block { children }
            | Node::IndexAppeal { children } => children,
        }
    }

    pub fn lexeme(&self) -> Option<&Lexeme> {
        match self {
            Node::Common { lexeme, .. } => Some(lexeme),
            _ => None,
        }
    }
}

/// Corre el parser sobre una secuencia completa de lexemas.
///
/// La tabla de variables queda con todas las filas declaradas al
/// terminar; el árbol retornado referencia esas filas a través de
/// los índices reescritos en sus lexemas de identificador.
pub fn parse(
    lexemes: Vec<Lexeme>,
    literals: &LiteralTable,
    variables: &mut VariableTable,
) -> Parse<Node> {
    let mut parser = Parser {
        lexemes,
        cursor: 0,
        literals,
        variables,
        block_level: 0,
        next_block_id: 1,
        scope_stack: vec![(0, 0)],
        nesting_while: 0,
        last_position: Position::default(),
    };

    parser.program()
}

struct Parser<'t> {
    lexemes: Vec<Lexeme>,
    cursor: usize,
    literals: &'t LiteralTable,
    variables: &'t mut VariableTable,
    block_level: u32,
    next_block_id: u32,
    scope_stack: Vec<(u32, u32)>,
    nesting_while: u32,
    last_position: Position,
}

impl Parser<'_> {
    fn program(&mut self) -> Parse<Node> {
        let mut children = Vec::new();
        while self.peek().is_some() {
            children.push(self.statement()?);
        }

        Ok(Node::Block { children })
    }

    fn statement(&mut self) -> Parse<Node> {
        use Keyword::*;

        let lexeme = match self.peek() {
            Some(&lexeme) => lexeme,
            None => return self.expected("statement"),
        };

        match lexeme.payload {
            Payload::Keyword(Int) => self.declaration(VariableType::Int),
            Payload::Keyword(Double) => self.declaration(VariableType::Double),
            Payload::Keyword(Bool) => self.declaration(VariableType::Bool),
            Payload::Keyword(String) => self.declaration(VariableType::String),

            Payload::Keyword(If) => self.if_statement(),
            Payload::Keyword(While) => self.while_statement(),
            Payload::Keyword(Print) => self.print_statement(),
            Payload::Keyword(Exit) => self.exit_statement(),
            Payload::Keyword(Break) | Payload::Keyword(Continue) => self.loop_jump(),

            Payload::Delimiter(Delimiter::OpenBrace) => self.block(),
            Payload::Identifier(_) => self.assignment(),

            _ => self.expected("statement"),
        }
    }

    fn block(&mut self) -> Parse<Node> {
        self.expect_delimiter(Delimiter::OpenBrace)?;
        self.enter_block();

        let mut children = Vec::new();
        while !self.matches_delimiter(Delimiter::CloseBrace) {
            if self.peek().is_none() {
                return self.expected(&Delimiter::CloseBrace.to_string());
            }

            children.push(self.statement()?);
        }

        self.expect_delimiter(Delimiter::CloseBrace)?;
        self.exit_block();

        Ok(Node::Block { children })
    }

    fn declaration(&mut self, typ: VariableType) -> Parse<Node> {
        self.next("type")?;
        let id_node = self.declare_identifier(typ)?;

        let row = match id_node.lexeme() {
            Some(Lexeme {
                payload: Payload::Identifier(row),
                ..
            }) => *row,

            _ => unreachable!(),
        };

        // Sufijo opcional de arreglo: reescribe la fila recién declarada
        let mut is_array = false;
        if self.matches_delimiter(Delimiter::OpenBracket) {
            self.expect_delimiter(Delimiter::OpenBracket)?;
            let size = self.array_size()?;
            self.expect_delimiter(Delimiter::CloseBracket)?;

            let declared = self.variables.get_mut(row);
            declared.is_array = true;
            declared.array_size = Some(size);
            is_array = true;
        }

        let children = if self.matches_operator(Operator::Assign) {
            if is_array {
                return self.expected(&Delimiter::Semicolon.to_string());
            }

            let assign = self.next("`=`")?;
            let value = match typ {
                VariableType::Int | VariableType::Double => self.arith_expression()?,
                VariableType::String => self.string_expression()?,
                VariableType::Bool => self.bool_expression()?,
                VariableType::Unknown => unreachable!(),
            };

            vec![Node::Common {
                lexeme: assign,
                children: vec![id_node, value],
            }]
        } else {
            vec![id_node]
        };

        self.expect_delimiter(Delimiter::Semicolon)?;
        Ok(Node::Declaration { children })
    }

    fn assignment(&mut self) -> Parse<Node> {
        let (target, row) = self.subscripted_use()?;
        let typ = self.variables[row].typ;

        if !self.matches_operator(Operator::Assign) {
            return self.expected(&Operator::Assign.to_string());
        }

        let assign = self.next("`=`")?;
        let value = match typ {
            VariableType::Int | VariableType::Double => self.arith_expression()?,
            VariableType::String => self.string_expression()?,
            VariableType::Bool => self.bool_expression()?,
            VariableType::Unknown => unreachable!(),
        };

        self.expect_delimiter(Delimiter::Semicolon)?;
        Ok(Node::Common {
            lexeme: assign,
            children: vec![target, value],
        })
    }

    fn if_statement(&mut self) -> Parse<Node> {
        let keyword = self.next("`if`")?;

        self.expect_delimiter(Delimiter::OpenParen)?;
        let condition = self.bool_expression()?;
        self.expect_delimiter(Delimiter::CloseParen)?;

        let mut children = vec![condition, self.statement()?];
        if self.matches_keyword(Keyword::Else) {
            self.next("`else`")?;
            children.push(self.statement()?);
        }

        Ok(Node::Common { lexeme: keyword, children })
    }

    fn while_statement(&mut self) -> Parse<Node> {
        let keyword = self.next("`while`")?;

        self.expect_delimiter(Delimiter::OpenParen)?;
        let mut children = vec![self.bool_expression()?];
        self.expect_delimiter(Delimiter::CloseParen)?;

        if self.matches_delimiter(Delimiter::Semicolon) {
            // `while (cond);` es un lazo sin cuerpo
            self.next("`;`")?;
        } else {
            self.nesting_while += 1;
            let body = self.statement();
            self.nesting_while -= 1;
            children.push(body?);
        }

        Ok(Node::Common { lexeme: keyword, children })
    }

    fn print_statement(&mut self) -> Parse<Node> {
        let keyword = self.next("`print`")?;

        self.expect_delimiter(Delimiter::OpenParen)?;
        let argument = self.string_expression()?;
        self.expect_delimiter(Delimiter::CloseParen)?;
        self.expect_delimiter(Delimiter::Semicolon)?;

        Ok(Node::Common {
            lexeme: keyword,
            children: vec![argument],
        })
    }

    fn exit_statement(&mut self) -> Parse<Node> {
        let keyword = self.next("`exit`")?;

        self.expect_delimiter(Delimiter::OpenParen)?;
        let code = self.arith_expression()?;
        self.expect_delimiter(Delimiter::CloseParen)?;
        self.expect_delimiter(Delimiter::Semicolon)?;

        Ok(Node::Common {
            lexeme: keyword,
            children: vec![code],
        })
    }

    fn loop_jump(&mut self) -> Parse<Node> {
        let keyword = self.next("statement")?;

        if self.nesting_while == 0 {
            let name = match keyword.payload {
                Payload::Keyword(keyword) => keyword,
                _ => unreachable!(),
            };

            return Err(Located::at(
                ParserError::Syntax(format!("{} outside of a while loop", name)),
                keyword.position,
            ));
        }

        self.expect_delimiter(Delimiter::Semicolon)?;
        Ok(Node::Common {
            lexeme: keyword,
            children: Vec::new(),
        })
    }

    /// Declara el identificador actual en el alcance vigente.
    ///
    /// Si la fila a la que apunta el lexema sigue provisional, se
    /// reescribe en sitio. De lo contrario el nombre ya fue declarado
    /// en algún bloque: una colisión dentro del bloque vigente es una
    /// doble declaración, y en cualquier otro caso se agrega una fila
    /// nueva y se reapunta la carga del lexema hacia ella.
    fn declare_identifier(&mut self, typ: VariableType) -> Parse<Node> {
        let lexeme = match self.peek() {
            Some(&lexeme) => lexeme,
            None => return self.expected("identifier"),
        };

        let index = match lexeme.payload {
            Payload::Identifier(index) => index,
            _ => return self.expected("identifier"),
        };

        let &(block_level, block_id) = self.scope_stack.last().unwrap();

        if self.variables[index].typ == VariableType::Unknown {
            let row = self.variables.get_mut(index);
            row.typ = typ;
            row.block_level = block_level;
            row.block_id = block_id;
        } else {
            let name = self.variables[index].name.clone();
            if self.variables.is_declared_in_block(&name, block_id) {
                return Err(Located::at(
                    ParserError::DoubleDeclaration(name),
                    lexeme.position,
                ));
            }

            let fresh = self.variables.push(Variable {
                name,
                typ,
                block_level,
                block_id,
                is_array: false,
                array_size: None,
                value: None,
            });

            self.lexemes[self.cursor].payload = Payload::Identifier(fresh);
        }

        let lexeme = self.next("identifier")?;
        Ok(Node::Common {
            lexeme,
            children: Vec::new(),
        })
    }

    /// Resuelve el uso del identificador actual contra la pila de
    /// alcances, reescribiendo la carga del lexema hacia la fila
    /// encontrada. Retorna el nodo hoja y el índice resuelto.
    fn use_identifier(&mut self) -> Parse<(Node, usize)> {
        let lexeme = match self.peek() {
            Some(&lexeme) => lexeme,
            None => return self.expected("identifier"),
        };

        let index = match lexeme.payload {
            Payload::Identifier(index) => index,
            _ => return self.expected("identifier"),
        };

        let resolved = match self.resolve(index) {
            Some(resolved) => resolved,
            None => {
                return Err(Located::at(
                    ParserError::UsingBeforeDeclaration(self.variables[index].name.clone()),
                    lexeme.position,
                ))
            }
        };

        self.lexemes[self.cursor].payload = Payload::Identifier(resolved);
        let lexeme = self.next("identifier")?;

        Ok((
            Node::Common {
                lexeme,
                children: Vec::new(),
            },
            resolved,
        ))
    }

    /// Búsqueda pura de la fila visible para un nombre, de adentro
    /// hacia afuera en la pila de alcances.
    fn resolve(&self, index: usize) -> Option<usize> {
        let row = &self.variables[index];
        if row.typ == VariableType::Unknown {
            return None;
        }

        self.scope_stack
            .iter()
            .rev()
            .find_map(|&(level, id)| self.variables.find(&row.name, level, id))
    }

    /// Uso de identificador con sufijo opcional de subíndice.
    fn subscripted_use(&mut self) -> Parse<(Node, usize)> {
        let position = self.here();
        let (node, row) = self.use_identifier()?;

        if !self.matches_delimiter(Delimiter::OpenBracket) {
            return Ok((node, row));
        }

        if !self.variables[row].is_array {
            return Err(Located::at(
                ParserError::NotSubscriptable(self.variables[row].name.clone()),
                position,
            ));
        }

        self.expect_delimiter(Delimiter::OpenBracket)?;
        let index = self.arith_expression()?;
        self.expect_delimiter(Delimiter::CloseBracket)?;

        Ok((
            Node::IndexAppeal {
                children: vec![node, index],
            },
            row,
        ))
    }

    fn array_size(&mut self) -> Parse<usize> {
        let lexeme = match self.peek() {
            Some(&lexeme) => lexeme,
            None => return self.expected("integer literal"),
        };

        let literal = match lexeme.payload {
            Payload::IntNumber(literal) => literal,
            _ => return self.expected("integer literal"),
        };

        let size = self
            .literals
            .get(literal)
            .text
            .parse::<usize>()
            .map_err(|_| {
                Located::at(
                    ParserError::Syntax("array size out of range".to_owned()),
                    lexeme.position,
                )
            })?;

        self.next("integer literal")?;
        Ok(size)
    }

    fn arith_expression(&mut self) -> Parse<Node> {
        let mut node = self.arith_unary()?;

        while let Some(lexeme) = self.match_operators(&[Operator::Plus, Operator::Minus]) {
            self.next("operator")?;
            let rhs = self.arith_unary()?;
            node = Node::Common {
                lexeme,
                children: vec![node, rhs],
            };
        }

        Ok(node)
    }

    fn arith_unary(&mut self) -> Parse<Node> {
        let sign = match self.match_operators(&[Operator::Plus, Operator::Minus]) {
            Some(_) => Some(self.next("sign")?),
            None => None,
        };

        let mut node = self.arith_term()?;
        while let Some(lexeme) =
            self.match_operators(&[Operator::Asterisk, Operator::Slash, Operator::Percent])
        {
            self.next("operator")?;
            let rhs = self.arith_term()?;
            node = Node::Common {
                lexeme,
                children: vec![node, rhs],
            };
        }

        Ok(match sign {
            Some(lexeme) => Node::Common {
                lexeme,
                children: vec![node],
            },

            None => node,
        })
    }

    fn arith_term(&mut self) -> Parse<Node> {
        let lexeme = match self.peek() {
            Some(&lexeme) => lexeme,
            None => return self.expected("arithmetic term"),
        };

        match lexeme.payload {
            Payload::Delimiter(Delimiter::OpenParen) => {
                self.next("`(`")?;
                let node = self.arith_expression()?;
                self.expect_delimiter(Delimiter::CloseParen)?;
                Ok(node)
            }

            Payload::IntNumber(_) | Payload::DoubleNumber(_) => {
                self.next("number")?;
                Ok(Node::Common {
                    lexeme,
                    children: Vec::new(),
                })
            }

            Payload::Keyword(Keyword::Stoi) | Payload::Keyword(Keyword::Stod) => {
                self.conversion_call()
            }

            Payload::Identifier(_) => {
                let position = lexeme.position;
                let (node, row) = self.subscripted_use()?;

                match self.variables[row].typ {
                    VariableType::Int | VariableType::Double => Ok(node),
                    _ => Err(Located::at(
                        ParserError::Expected("int or double variable".to_owned()),
                        position,
                    )),
                }
            }

            _ => self.expected("arithmetic term"),
        }
    }

    /// `stoi(...)` o `stod(...)` sobre una expresión de string.
    fn conversion_call(&mut self) -> Parse<Node> {
        let keyword = self.next("`stoi` or `stod`")?;

        self.expect_delimiter(Delimiter::OpenParen)?;
        let argument = self.string_expression()?;
        self.expect_delimiter(Delimiter::CloseParen)?;

        Ok(Node::Common {
            lexeme: keyword,
            children: vec![argument],
        })
    }

    fn string_expression(&mut self) -> Parse<Node> {
        let mut node = self.string_term()?;

        while let Some(lexeme) = self.match_operators(&[Operator::Plus]) {
            self.next("operator")?;
            let rhs = self.string_term()?;
            node = Node::Common {
                lexeme,
                children: vec![node, rhs],
            };
        }

        Ok(node)
    }

    fn string_term(&mut self) -> Parse<Node> {
        let lexeme = match self.peek() {
            Some(&lexeme) => lexeme,
            None => return self.expected("string term"),
        };

        match lexeme.payload {
            Payload::StringLiteral(_) => {
                self.next("string literal")?;
                Ok(Node::Common {
                    lexeme,
                    children: Vec::new(),
                })
            }

            Payload::Keyword(Keyword::ToString) => {
                let keyword = self.next("`to_string`")?;

                self.expect_delimiter(Delimiter::OpenParen)?;
                let argument = self.arith_expression()?;
                self.expect_delimiter(Delimiter::CloseParen)?;

                Ok(Node::Common {
                    lexeme: keyword,
                    children: vec![argument],
                })
            }

            Payload::Keyword(Keyword::Scan) => {
                let keyword = self.next("`scan`")?;

                self.expect_delimiter(Delimiter::OpenParen)?;
                self.expect_delimiter(Delimiter::CloseParen)?;

                Ok(Node::Common {
                    lexeme: keyword,
                    children: Vec::new(),
                })
            }

            Payload::Identifier(_) => {
                let position = lexeme.position;
                let (node, row) = self.subscripted_use()?;

                match self.variables[row].typ {
                    VariableType::String => Ok(node),
                    _ => Err(Located::at(
                        ParserError::Expected("string variable".to_owned()),
                        position,
                    )),
                }
            }

            _ => self.expected("string term"),
        }
    }

    fn bool_expression(&mut self) -> Parse<Node> {
        let mut node = self.bool_and()?;

        while let Some(lexeme) = self.match_operators(&[Operator::Or]) {
            self.next("operator")?;
            let rhs = self.bool_and()?;
            node = Node::Common {
                lexeme,
                children: vec![node, rhs],
            };
        }

        Ok(node)
    }

    fn bool_and(&mut self) -> Parse<Node> {
        let mut node = self.bool_not()?;

        while let Some(lexeme) = self.match_operators(&[Operator::And]) {
            self.next("operator")?;
            let rhs = self.bool_not()?;
            node = Node::Common {
                lexeme,
                children: vec![node, rhs],
            };
        }

        Ok(node)
    }

    fn bool_not(&mut self) -> Parse<Node> {
        match self.match_operators(&[Operator::Not]) {
            Some(lexeme) => {
                self.next("`!`")?;
                let term = self.bool_term()?;

                Ok(Node::Common {
                    lexeme,
                    children: vec![term],
                })
            }

            None => self.bool_term(),
        }
    }

    fn bool_term(&mut self) -> Parse<Node> {
        let lexeme = match self.peek() {
            Some(&lexeme) => lexeme,
            None => return self.expected("boolean expression"),
        };

        match lexeme.payload {
            Payload::Keyword(Keyword::True) | Payload::Keyword(Keyword::False) => {
                self.next("boolean literal")?;
                Ok(Node::Common {
                    lexeme,
                    children: Vec::new(),
                })
            }

            // Un identificador bool es un término por sí mismo; con
            // cualquier otro tipo declarado debe iniciar una comparación
            Payload::Identifier(index) => match self.resolve(index) {
                Some(row) if self.variables[row].typ == VariableType::Bool => {
                    let (node, _) = self.subscripted_use()?;
                    Ok(node)
                }

                _ => self.comparison(),
            },

            // Ventana de backtracking: un paréntesis puede abrir tanto
            // una subexpresión booleana como el operando izquierdo de
            // una comparación aritmética o de strings
            Payload::Delimiter(Delimiter::OpenParen) => {
                let saved = (self.cursor, self.last_position);
                match self.parenthesized_bool() {
                    Ok(node) => Ok(node),
                    Err(_) => {
                        (self.cursor, self.last_position) = saved;
                        self.comparison()
                    }
                }
            }

            Payload::IntNumber(_)
            | Payload::DoubleNumber(_)
            | Payload::StringLiteral(_)
            | Payload::Keyword(
                Keyword::Stoi | Keyword::Stod | Keyword::ToString | Keyword::Scan,
            ) => self.comparison(),

            _ => self.expected("boolean expression"),
        }
    }

    fn parenthesized_bool(&mut self) -> Parse<Node> {
        self.expect_delimiter(Delimiter::OpenParen)?;
        let node = self.bool_expression()?;
        self.expect_delimiter(Delimiter::CloseParen)?;
        Ok(node)
    }

    fn comparison(&mut self) -> Parse<Node> {
        use Operator::*;

        let (left, is_string) = self.comparison_term()?;

        let lexeme = match self.match_operators(&[
            Equal,
            NotEqual,
            Less,
            LessOrEqual,
            Greater,
            GreaterOrEqual,
        ]) {
            Some(lexeme) => lexeme,
            None => return self.expected("comparison operator"),
        };

        self.next("comparison operator")?;

        // Ambos operandos deben coincidir en categoría
        let right = if is_string {
            self.string_expression()?
        } else {
            self.arith_expression()?
        };

        Ok(Node::Common {
            lexeme,
            children: vec![left, right],
        })
    }

    /// Operando de comparación: se intenta como expresión aritmética
    /// y, si eso falla, se rebobina el cursor y se reintenta como
    /// expresión de strings.
    fn comparison_term(&mut self) -> Parse<(Node, bool)> {
        let saved = (self.cursor, self.last_position);

        match self.arith_expression() {
            Ok(node) => Ok((node, false)),
            Err(_) => {
                (self.cursor, self.last_position) = saved;
                let node = self.string_expression()?;
                Ok((node, true))
            }
        }
    }

    fn enter_block(&mut self) {
        self.block_level += 1;

        // Los identificadores de bloque nunca se repiten, por lo cual
        // dos alcances sintácticamente idénticos quedan distinguibles
        let id = self.next_block_id;
        self.next_block_id += 1;
        self.scope_stack.push((self.block_level, id));
    }

    fn exit_block(&mut self) {
        self.block_level -= 1;
        self.scope_stack.pop();
    }

    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.cursor)
    }

    fn here(&self) -> Position {
        self.peek()
            .map(|lexeme| lexeme.position)
            .unwrap_or(self.last_position)
    }

    fn next(&mut self, what: &str) -> Parse<Lexeme> {
        match self.lexemes.get(self.cursor) {
            Some(&lexeme) => {
                self.cursor += 1;
                self.last_position = lexeme.position;
                Ok(lexeme)
            }

            None => self.expected(what),
        }
    }

    fn expected<T>(&self, what: &str) -> Parse<T> {
        Err(Located::at(
            ParserError::Expected(what.to_owned()),
            self.here(),
        ))
    }

    fn matches_delimiter(&self, delimiter: Delimiter) -> bool {
        matches!(
            self.peek().map(|lexeme| lexeme.payload),
            Some(Payload::Delimiter(found)) if found == delimiter
        )
    }

    fn matches_operator(&self, operator: Operator) -> bool {
        matches!(
            self.peek().map(|lexeme| lexeme.payload),
            Some(Payload::Operator(found)) if found == operator
        )
    }

    fn matches_keyword(&self, keyword: Keyword) -> bool {
        matches!(
            self.peek().map(|lexeme| lexeme.payload),
            Some(Payload::Keyword(found)) if found == keyword
        )
    }

    /// Retorna el lexema actual si su operador es uno de los buscados.
    fn match_operators(&self, operators: &[Operator]) -> Option<Lexeme> {
        let lexeme = *self.peek()?;
        match lexeme.payload {
            Payload::Operator(found) if operators.contains(&found) => Some(lexeme),
            _ => None,
        }
    }

    fn expect_delimiter(&mut self, delimiter: Delimiter) -> Parse<Lexeme> {
        if self.matches_delimiter(delimiter) {
            self.next("delimiter")
        } else {
            self.expected(&delimiter.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::Lexer;

    fn analyze(source: &str) -> (Parse<Node>, LiteralTable, VariableTable) {
        let mut literals = LiteralTable::default();
        let mut variables = VariableTable::default();

        let lexemes = Lexer::new(source.chars(), &mut literals, &mut variables)
            .analyze()
            .expect("lexical error");

        let tree = parse(lexemes, &literals, &mut variables);
        (tree, literals, variables)
    }

    fn tree_of(source: &str) -> (Node, VariableTable) {
        let (tree, _, variables) = analyze(source);
        (tree.expect("parse error"), variables)
    }

    fn error_of(source: &str) -> Located<ParserError> {
        let (tree, _, _) = analyze(source);
        tree.expect_err("expected a parse error")
    }

    fn identifier_rows(node: &Node, rows: &mut Vec<usize>) {
        if let Some(Lexeme {
            payload: Payload::Identifier(row),
            ..
        }) = node.lexeme()
        {
            rows.push(*row);
        }

        for child in node.children() {
            identifier_rows(child, rows);
        }
    }

    #[test]
    fn declarations_rewrite_placeholder_rows() {
        let (_, variables) = tree_of("int x = 1;");

        assert_eq!(variables.len(), 1);
        let row = &variables[0];
        assert_eq!(row.typ, VariableType::Int);
        assert_eq!((row.block_level, row.block_id), (0, 0));
    }

    #[test]
    fn shadowing_appends_a_distinct_row() {
        let (_, variables) = tree_of("int x = 1; { int x = 2; }");

        assert_eq!(variables.len(), 2);
        assert_eq!((variables[0].block_level, variables[0].block_id), (0, 0));
        assert_eq!((variables[1].block_level, variables[1].block_id), (1, 1));
    }

    #[test]
    fn sibling_blocks_get_distinct_block_ids() {
        let (_, variables) = tree_of("{ int a; } { int b; }");

        assert_eq!(variables[0].block_id, 1);
        assert_eq!(variables[1].block_id, 2);
        assert_eq!(variables[0].block_level, variables[1].block_level);
    }

    #[test]
    fn uses_resolve_to_the_innermost_declaration() {
        let (tree, variables) = tree_of("int x = 1; { int x = 2; x = x + 1; }");

        let mut rows = Vec::new();
        identifier_rows(&tree, &mut rows);

        // declaración externa, declaración interna, y tres usos internos
        assert_eq!(rows, [0, 1, 1, 1]);
        assert_eq!(variables[1].block_id, 1);
    }

    #[test]
    fn every_identifier_points_to_a_declared_row() {
        let (tree, variables) =
            tree_of("int x = 1; { double y = 2.5; y = y + x; } x = x * 2;");

        let mut rows = Vec::new();
        identifier_rows(&tree, &mut rows);

        for row in rows {
            assert_ne!(variables[row].typ, VariableType::Unknown);
        }
    }

    #[test]
    fn double_declaration_in_the_same_block_fails() {
        let error = error_of("int x; int x;");

        match error.val() {
            ParserError::DoubleDeclaration(name) => assert_eq!(name, "x"),
            other => panic!("unexpected error {:?}", other),
        }

        assert_eq!((error.position().line(), error.position().column()), (1, 12));
    }

    #[test]
    fn using_before_declaration_fails() {
        let error = error_of("x = 1;");
        assert!(matches!(
            error.val(),
            ParserError::UsingBeforeDeclaration(name) if name == "x"
        ));
    }

    #[test]
    fn sibling_scope_declarations_are_not_visible() {
        let error = error_of("{ int x; } x = 1;");
        assert!(matches!(
            error.val(),
            ParserError::UsingBeforeDeclaration(name) if name == "x"
        ));
    }

    #[test]
    fn break_outside_a_loop_fails() {
        let error = error_of("break;");
        assert!(matches!(error.val(), ParserError::Syntax(_)));
        assert_eq!(error.position().column(), 1);
    }

    #[test]
    fn continue_inside_nested_statement_parses() {
        tree_of("int x = 3; while (x > 0) { if (x == 2) continue; x = x - 1; }");
    }

    #[test]
    fn while_with_semicolon_body_parses() {
        let (tree, _) = tree_of("int x = 0; while (x > 0);");

        let children = tree.children();
        assert_eq!(children[1].children().len(), 1);
    }

    #[test]
    fn subscript_of_a_scalar_fails() {
        let error = error_of("int x; x[0] = 1;");
        assert!(matches!(
            error.val(),
            ParserError::NotSubscriptable(name) if name == "x"
        ));
    }

    #[test]
    fn array_declaration_records_size() {
        let (_, variables) = tree_of("int v[10]; v[3] = 7;");

        assert!(variables[0].is_array);
        assert_eq!(variables[0].array_size, Some(10));
    }

    #[test]
    fn comparison_of_string_and_number_fails() {
        let (tree, _, _) = analyze("int x = 1; bool b = \"abc\" < x;");
        assert!(tree.is_err());
    }

    #[test]
    fn parenthesized_bool_backtracks_to_comparison() {
        tree_of("int a = 1; int b = 2; bool c = (a + 1) < (b * 2);");
    }

    #[test]
    fn parenthesized_bool_expression_parses() {
        tree_of("bool a = true; bool b = (a || false) && !a;");
    }

    #[test]
    fn comparison_with_string_terms_parses() {
        tree_of("string s = \"a\"; bool b = s + \"x\" == \"ax\";");
    }

    #[test]
    fn assignment_side_dispatches_on_declared_type() {
        tree_of("bool b = true; b = 1 < 2; string s = \"x\"; s = s + s; int n = 0; n = n + 1;");
    }

    #[test]
    fn missing_semicolon_is_an_expected_error() {
        let error = error_of("int x = 1");
        assert!(matches!(
            error.val(),
            ParserError::Expected(what) if what == "`;`"
        ));
    }

    #[test]
    fn declaration_root_holds_the_initializer_assignment() {
        let (tree, _) = tree_of("int x = 1;");

        let declaration = &tree.children()[0];
        assert!(matches!(declaration, Node::Declaration { .. }));

        let assign = &declaration.children()[0];
        assert!(matches!(
            assign.lexeme().unwrap().payload,
            Payload::Operator(Operator::Assign)
        ));
        assert_eq!(assign.children().len(), 2);
    }
}
