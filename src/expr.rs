//! Boolean expression masks over the assignment grid.
//!
//! Constraint configuration can scope itself with expressions like
//! `"ICU and Block 3"` or `"not (CA1 or Elective)"`. An expression is
//! parsed once into an [`Expr`] tree and then evaluated against a roster
//! into a [`Mask`]: a dense boolean over every (resident, block, rotation)
//! cell, true where the expression selects the cell.
//!
//! Identifiers resolve in a fixed order: block id, then rotation id, then
//! resident id, then rotation group, then resident group. A name matching
//! nothing is a configuration error. Identifiers may contain spaces
//! ("Block 3", "Smith, John" via quoting); `and`/`or`/`not` and the symbols
//! `&`/`|`/`!` are reserved. Precedence is `not` over `and` over `or`,
//! both binary operators left-associative.

use crate::error::ConfigError;
use crate::models::Roster;

/// A parsed scoping expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Ident(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parses an expression string.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser {
            input,
            tokens,
            pos: 0,
        };
        let expr = parser.or_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("trailing input after expression"));
        }
        Ok(expr)
    }

    /// Evaluates the expression into a cell mask for `roster`.
    pub fn mask(&self, roster: &Roster) -> Result<Mask, ConfigError> {
        match self {
            Expr::Ident(name) => ident_mask(roster, name),
            Expr::Not(inner) => Ok(inner.mask(roster)?.not()),
            Expr::And(a, b) => Ok(a.mask(roster)?.and(&b.mask(roster)?)),
            Expr::Or(a, b) => Ok(a.mask(roster)?.or(&b.mask(roster)?)),
        }
    }
}

/// Dense boolean over (resident, block, rotation) cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    n_blocks: usize,
    n_rotations: usize,
    cells: Vec<bool>,
}

impl Mask {
    fn filled(roster: &Roster, value: bool) -> Self {
        Self {
            n_blocks: roster.n_blocks(),
            n_rotations: roster.n_rotations(),
            cells: vec![value; roster.n_residents() * roster.n_blocks() * roster.n_rotations()],
        }
    }

    fn idx(&self, resident: usize, block: usize, rotation: usize) -> usize {
        (resident * self.n_blocks + block) * self.n_rotations + rotation
    }

    /// Whether the mask selects the given cell.
    pub fn get(&self, resident: usize, block: usize, rotation: usize) -> bool {
        self.cells[self.idx(resident, block, rotation)]
    }

    fn set(&mut self, resident: usize, block: usize, rotation: usize, value: bool) {
        let i = self.idx(resident, block, rotation);
        self.cells[i] = value;
    }

    pub fn not(mut self) -> Self {
        for c in &mut self.cells {
            *c = !*c;
        }
        self
    }

    pub fn and(mut self, other: &Self) -> Self {
        for (c, o) in self.cells.iter_mut().zip(&other.cells) {
            *c &= o;
        }
        self
    }

    pub fn or(mut self, other: &Self) -> Self {
        for (c, o) in self.cells.iter_mut().zip(&other.cells) {
            *c |= o;
        }
        self
    }

    /// True count, mostly for diagnostics.
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }
}

fn ident_mask(roster: &Roster, name: &str) -> Result<Mask, ConfigError> {
    let mut mask = Mask::filled(roster, false);
    if let Ok(b) = roster.block_index(name) {
        for r in 0..roster.n_residents() {
            for t in 0..roster.n_rotations() {
                mask.set(r, b, t, true);
            }
        }
        return Ok(mask);
    }
    if let Ok(t) = roster.rotation_index(name) {
        for r in 0..roster.n_residents() {
            for b in 0..roster.n_blocks() {
                mask.set(r, b, t, true);
            }
        }
        return Ok(mask);
    }
    if let Ok(r) = roster.resident_index(name) {
        for b in 0..roster.n_blocks() {
            for t in 0..roster.n_rotations() {
                mask.set(r, b, t, true);
            }
        }
        return Ok(mask);
    }
    if let Ok(rotations) = roster.rotations_in_group(name) {
        for t in rotations {
            for r in 0..roster.n_residents() {
                for b in 0..roster.n_blocks() {
                    mask.set(r, b, t, true);
                }
            }
        }
        return Ok(mask);
    }
    if let Ok(residents) = roster.residents_in_group(name) {
        for r in residents {
            for b in 0..roster.n_blocks() {
                for t in 0..roster.n_rotations() {
                    mask.set(r, b, t, true);
                }
            }
        }
        return Ok(mask);
    }
    Err(ConfigError::UnknownName(name.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ConfigError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    // a bare identifier may span several words; successive words join
    // with single spaces until an operator or delimiter ends it
    let mut pending: Option<String> = None;

    let flush = |pending: &mut Option<String>, tokens: &mut Vec<Token>| {
        if let Some(word) = pending.take() {
            match word.as_str() {
                "and" => tokens.push(Token::And),
                "or" => tokens.push(Token::Or),
                "not" => tokens.push(Token::Not),
                _ => match tokens.last_mut() {
                    Some(Token::Ident(prev)) => {
                        prev.push(' ');
                        prev.push_str(&word);
                    }
                    _ => tokens.push(Token::Ident(word)),
                },
            }
        }
    };

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' => {
                flush(&mut pending, &mut tokens);
                chars.next();
            }
            '(' => {
                flush(&mut pending, &mut tokens);
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                flush(&mut pending, &mut tokens);
                tokens.push(Token::RParen);
                chars.next();
            }
            '&' => {
                flush(&mut pending, &mut tokens);
                tokens.push(Token::And);
                chars.next();
            }
            '|' => {
                flush(&mut pending, &mut tokens);
                tokens.push(Token::Or);
                chars.next();
            }
            '!' => {
                flush(&mut pending, &mut tokens);
                tokens.push(Token::Not);
                chars.next();
            }
            '"' => {
                flush(&mut pending, &mut tokens);
                chars.next();
                let mut quoted = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => quoted.push(c),
                        None => {
                            return Err(ConfigError::ExpressionParse {
                                input: input.to_string(),
                                reason: "unterminated quoted identifier".to_string(),
                            })
                        }
                    }
                }
                tokens.push(Token::Ident(quoted));
            }
            _ => {
                pending.get_or_insert_with(String::new).push(c);
                chars.next();
            }
        }
    }
    flush(&mut pending, &mut tokens);
    Ok(tokens)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> ConfigError {
        ConfigError::ExpressionParse {
            input: self.input.to_string(),
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn or_expr(&mut self) -> Result<Expr, ConfigError> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ConfigError> {
        let mut left = self.not_expr()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ConfigError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr, ConfigError> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(Expr::Ident(name))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.or_expr()?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(self.error("expected closing parenthesis"));
                }
                self.pos += 1;
                Ok(inner)
            }
            _ => Err(self.error("expected identifier or parenthesized expression")),
        }
    }
}
