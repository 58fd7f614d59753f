use std::error::Error;
use std::fmt::{self, Display};

use gridwire_common::{BinOp, Bounds, FuncName, RangeRef, column_to_number};

use crate::tokenizer::{Token, TokenSubType, TokenType, Tokenizer, TokenizerError};

/// A custom error type for the parser.
#[derive(Debug)]
pub struct ParserError {
    pub message: String,
    pub position: Option<usize>,
}

impl ParserError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        ParserError {
            message: message.into(),
            position: Some(position),
        }
    }
}

impl Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pos) = self.position {
            write!(f, "ParserError at position {}: {}", pos, self.message)
        } else {
            write!(f, "ParserError: {}", self.message)
        }
    }
}

impl Error for ParserError {}

impl From<TokenizerError> for ParserError {
    fn from(err: TokenizerError) -> Self {
        ParserError {
            message: err.message,
            position: Some(err.pos),
        }
    }
}

/// A parsed formula.
///
/// This is a closed surface: the synthesizer is total over exactly these
/// five shapes, so anything the tokenizer can produce either lands here or
/// fails to parse. Prefix signs are folded into numeric literals during
/// parsing; there is no unary node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Formula {
    Literal(f64),
    Range(RangeRef),
    /// Rows of elements, row-major.
    Array(Vec<Vec<Formula>>),
    Binary {
        op: BinOp,
        left: Box<Formula>,
        right: Box<Formula>,
    },
    Call {
        func: FuncName,
        args: Vec<Formula>,
    },
}

impl Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Literal(x) => write!(f, "{x}"),
            Formula::Range(r) => write!(f, "{r}"),
            Formula::Array(rows) => {
                write!(f, "{{")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        write!(f, ";")?;
                    }
                    for (j, elem) in row.iter().enumerate() {
                        if j > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{elem}")?;
                    }
                }
                write!(f, "}}")
            }
            Formula::Binary { op, left, right } => write!(f, "({op} {left} {right})"),
            Formula::Call { func, args } => {
                write!(f, "{func}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A parser for converting tokens into a [`Formula`].
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let tokens = tokens
            .into_iter()
            .filter(|t| t.token_type != TokenType::Whitespace)
            .collect();
        Parser {
            tokens,
            position: 0,
        }
    }

    /// Parse the tokens.
    ///
    /// `Ok(None)` means the cell carries no formula: it was blank, or its
    /// text is a non-numeric literal. Bare numeric text parses as a
    /// literal formula.
    pub fn parse(&mut self) -> Result<Option<Formula>, ParserError> {
        if self.tokens.is_empty() {
            return Ok(None);
        }

        if self.tokens[0].token_type == TokenType::Literal {
            return Ok(self.tokens[0].value.parse::<f64>().ok().map(Formula::Literal));
        }

        let ast = self.parse_expression()?;
        if self.position < self.tokens.len() {
            return Err(ParserError::new(
                format!("unexpected token {}", self.tokens[self.position]),
                self.tokens[self.position].pos,
            ));
        }
        Ok(Some(ast))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next_pos(&self) -> usize {
        self.peek().map(|t| t.pos).unwrap_or(0)
    }

    fn parse_expression(&mut self) -> Result<Formula, ParserError> {
        self.parse_binary_op(0)
    }

    fn parse_binary_op(&mut self, min_precedence: u8) -> Result<Formula, ParserError> {
        let mut left = self.parse_primary()?;

        while let Some(token) = self.peek() {
            if token.token_type != TokenType::OpInfix {
                break;
            }
            let op = BinOp::from_str(&token.value).ok_or_else(|| {
                ParserError::new(format!("unknown operator `{}`", token.value), token.pos)
            })?;
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.position += 1;

            // All binary operators associate left.
            let right = self.parse_binary_op(precedence + 1)?;
            left = Formula::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Formula, ParserError> {
        let token = match self.peek() {
            Some(t) => t.clone(),
            None => {
                return Err(ParserError {
                    message: "unexpected end of formula".to_string(),
                    position: None,
                });
            }
        };

        match (token.token_type, token.subtype) {
            // Signs fold into the numeric literal they precede; the AST has
            // no unary node.
            (TokenType::OpPrefix, _) => {
                self.position += 1;
                let inner = self.parse_primary()?;
                match inner {
                    Formula::Literal(x) if token.value == "-" => Ok(Formula::Literal(-x)),
                    Formula::Literal(x) => Ok(Formula::Literal(x)),
                    _ => Err(ParserError::new(
                        format!("`{}` sign must precede a number", token.value),
                        token.pos,
                    )),
                }
            }
            (TokenType::Operand, TokenSubType::Number) => {
                self.position += 1;
                let mut value = token.value.parse::<f64>().map_err(|_| {
                    ParserError::new(format!("invalid number `{}`", token.value), token.pos)
                })?;
                // `5%` is the number 0.05.
                while matches!(self.peek(), Some(t) if t.token_type == TokenType::OpPostfix) {
                    self.position += 1;
                    value /= 100.0;
                }
                Ok(Formula::Literal(value))
            }
            (TokenType::Operand, TokenSubType::Range) => {
                self.position += 1;
                parse_range(&token.value, token.pos).map(Formula::Range)
            }
            (TokenType::Operand, sub) => Err(ParserError::new(
                format!("operand `{}` ({sub:?}) has no circuit meaning", token.value),
                token.pos,
            )),
            (TokenType::Paren, TokenSubType::Open) => {
                self.position += 1;
                let expr = self.parse_expression()?;
                self.expect_close(TokenType::Paren)?;
                Ok(expr)
            }
            (TokenType::Array, TokenSubType::Open) => {
                self.position += 1;
                self.parse_array()
            }
            (TokenType::Func, TokenSubType::Open) => {
                self.position += 1;
                let name = &token.value[..token.value.len() - 1];
                let func = FuncName::from_str(name).ok_or_else(|| {
                    ParserError::new(format!("unknown function `{name}`"), token.pos)
                })?;
                let args = self.parse_function_arguments()?;
                Ok(Formula::Call { func, args })
            }
            _ => Err(ParserError::new(
                format!("unexpected token {token}"),
                token.pos,
            )),
        }
    }

    fn expect_close(&mut self, token_type: TokenType) -> Result<(), ParserError> {
        match self.peek() {
            Some(t) if t.token_type == token_type && t.subtype == TokenSubType::Close => {
                self.position += 1;
                Ok(())
            }
            _ => Err(ParserError::new("expected closing delimiter", self.next_pos())),
        }
    }

    fn parse_function_arguments(&mut self) -> Result<Vec<Formula>, ParserError> {
        let mut args = Vec::new();

        if let Some(t) = self.peek()
            && t.token_type == TokenType::Func
            && t.subtype == TokenSubType::Close
        {
            self.position += 1;
            return Ok(args);
        }

        args.push(self.parse_expression()?);
        loop {
            let token = self.peek().ok_or_else(|| ParserError {
                message: "unterminated function call".to_string(),
                position: None,
            })?;
            match (token.token_type, token.subtype) {
                (TokenType::Sep, TokenSubType::Arg) => {
                    self.position += 1;
                    args.push(self.parse_expression()?);
                }
                (TokenType::Func, TokenSubType::Close) => {
                    self.position += 1;
                    break;
                }
                _ => {
                    return Err(ParserError::new(
                        format!("expected `,` or `)` in function arguments, got {token}"),
                        token.pos,
                    ));
                }
            }
        }

        Ok(args)
    }

    fn parse_array(&mut self) -> Result<Formula, ParserError> {
        let mut rows = Vec::new();
        let mut current_row = vec![self.parse_expression()?];

        loop {
            let token = self.peek().ok_or_else(|| ParserError {
                message: "unterminated array literal".to_string(),
                position: None,
            })?;
            match (token.token_type, token.subtype) {
                (TokenType::Sep, TokenSubType::Arg) => {
                    self.position += 1;
                    current_row.push(self.parse_expression()?);
                }
                (TokenType::Sep, TokenSubType::Row) => {
                    self.position += 1;
                    rows.push(std::mem::take(&mut current_row));
                    current_row.push(self.parse_expression()?);
                }
                (TokenType::Array, TokenSubType::Close) => {
                    self.position += 1;
                    rows.push(current_row);
                    break;
                }
                _ => {
                    return Err(ParserError::new(
                        format!("unexpected token in array: {token}"),
                        token.pos,
                    ));
                }
            }
        }

        Ok(Formula::Array(rows))
    }
}

/// Parse an A1-style reference (`$A$4`, `A4:B5`, `Sheet!A4`,
/// `'My Sheet'!A4:B5`) into a [`RangeRef`].
fn parse_range(reference: &str, pos: usize) -> Result<RangeRef, ParserError> {
    let (sheet, cells) = extract_sheet_name(reference)
        .ok_or_else(|| ParserError::new(format!("invalid reference `{reference}`"), pos))?;

    let mut corners = cells.splitn(2, ':');
    let first = corners.next().unwrap();
    let (min_col, min_row) = parse_cell(first)
        .ok_or_else(|| ParserError::new(format!("invalid cell `{first}`"), pos))?;

    let bounds = match corners.next() {
        None => Bounds::single(min_col, min_row),
        Some(second) => {
            let (max_col, max_row) = parse_cell(second)
                .ok_or_else(|| ParserError::new(format!("invalid cell `{second}`"), pos))?;
            Bounds::new(min_col, min_row, max_col, max_row)
        }
    };

    Ok(RangeRef::new(sheet, bounds))
}

/// Split an optional (possibly quoted) sheet prefix from a reference.
fn extract_sheet_name(reference: &str) -> Option<(Option<String>, &str)> {
    if let Some(rest) = reference.strip_prefix('\'') {
        let end = rest.find('\'')?;
        let sheet = &rest[..end];
        let after = rest[end + 1..].strip_prefix('!')?;
        return Some((Some(sheet.to_string()), after));
    }
    match reference.find('!') {
        Some(i) if i > 0 => Some((Some(reference[..i].to_string()), &reference[i + 1..])),
        Some(_) => None,
        None => Some((None, reference)),
    }
}

/// Parse one `$A$4`-style corner into 1-based `(col, row)`.
fn parse_cell(cell: &str) -> Option<(u32, u32)> {
    let bytes = cell.as_bytes();
    let mut i = 0;

    if bytes.first() == Some(&b'$') {
        i += 1;
    }
    let col_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    if i == col_start {
        return None;
    }
    let col = column_to_number(&cell[col_start..i])?;

    if bytes.get(i) == Some(&b'$') {
        i += 1;
    }
    let row_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == row_start || i != bytes.len() {
        return None;
    }
    let row = cell[row_start..i].parse::<u32>().ok()?;
    if row == 0 {
        return None;
    }

    Some((col, row))
}

/// Parse a cell's text. See [`Parser::parse`] for the `Option` contract.
pub fn parse<T: AsRef<str>>(formula: T) -> Result<Option<Formula>, ParserError> {
    let tokens = Tokenizer::new(formula.as_ref())?.items;
    Parser::new(tokens).parse()
}
