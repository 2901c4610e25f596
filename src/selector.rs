//! Selector syntax tree and parser for the supported grammar:
//! type, universal, `#id`, `.class`, `[attr]`, `[attr=value]`, the
//! descendant, `>` and `+` combinators, and the structural pseudo-classes
//! `:first-child`, `:last-child`, `:nth-child()` and `:nth-of-type()`.
//! `:first-child` and `:last-child` are accepted without parentheses.

use crate::error::SelectorError;
use crate::nth::{NthIndex, parse_nth};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
    AdjacentSibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrFilter {
    Exists(String),
    Equals(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structural {
    FirstChild,
    LastChild,
    NthChild(NthIndex),
    NthOfType(NthIndex),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    /// Lower-cased; `None` for `*` or an omitted type.
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrFilter>,
    pub structural: Vec<Structural>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.structural.is_empty()
    }
}

/// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub compounds: Vec<Compound>,
    pub combinators: Vec<Combinator>,
}

pub fn parse_selector(text: &str) -> Result<Selector, SelectorError> {
    SelectorParser::new(text).parse()
}

struct SelectorParser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> SelectorParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.trim().chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> SelectorError {
        SelectorError {
            selector: self.source.trim().to_string(),
            position: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse(mut self) -> Result<Selector, SelectorError> {
        if self.chars.is_empty() {
            return Err(self.error("empty selector"));
        }
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                None => break,
                Some('>') => {
                    self.pos += 1;
                    Combinator::Child
                }
                Some('+') => {
                    self.pos += 1;
                    Combinator::AdjacentSibling
                }
                Some('~') => return Err(self.error("general sibling combinator")),
                Some(',') => return Err(self.error("selector list")),
                Some(_) if had_space => Combinator::Descendant,
                Some(ch) => return Err(self.error(format!("unexpected {ch:?}"))),
            };
            self.skip_whitespace();
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }
        Ok(Selector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut has_type = false;
        match self.peek() {
            Some('*') => {
                self.pos += 1;
                has_type = true;
            }
            Some(ch) if is_ident_char(ch) => {
                compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
                has_type = true;
            }
            _ => {}
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    let id = self.parse_ident()?;
                    if compound.id.replace(id).is_some() {
                        return Err(self.error("more than one id"));
                    }
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.parse_attr()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.structural.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }
        if !has_type && compound.is_empty() {
            return Err(self.error("expected a simple selector"));
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected an identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_attr(&mut self) -> Result<AttrFilter, SelectorError> {
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_whitespace();
        match self.bump() {
            Some(']') => Ok(AttrFilter::Exists(name)),
            Some('=') => {
                self.skip_whitespace();
                let value = match self.peek() {
                    Some(quote @ ('"' | '\'')) => {
                        self.pos += 1;
                        let start = self.pos;
                        while self.peek().is_some_and(|c| c != quote) {
                            self.pos += 1;
                        }
                        if self.peek().is_none() {
                            return Err(self.error("unterminated string"));
                        }
                        let value: String = self.chars[start..self.pos].iter().collect();
                        self.pos += 1;
                        value
                    }
                    _ => self.parse_ident()?,
                };
                self.skip_whitespace();
                if self.bump() != Some(']') {
                    return Err(self.error("expected ']'"));
                }
                Ok(AttrFilter::Equals(name, value))
            }
            Some(op @ ('~' | '|' | '^' | '$' | '*')) => {
                Err(self.error(format!("attribute operator '{op}='")))
            }
            _ => Err(self.error("malformed attribute selector")),
        }
    }

    fn parse_pseudo(&mut self) -> Result<Structural, SelectorError> {
        if self.peek() == Some(':') {
            return Err(self.error("pseudo-element"));
        }
        let name = self.parse_ident()?.to_ascii_lowercase();
        match name.as_str() {
            "first-child" => return Ok(Structural::FirstChild),
            "last-child" => return Ok(Structural::LastChild),
            "nth-child" | "nth-of-type" => {}
            other => return Err(self.error(format!("pseudo-class :{other}"))),
        }
        if self.bump() != Some('(') {
            return Err(self.error("expected '('"));
        }
        let start = self.pos;
        while self.peek().is_some_and(|c| c != ')') {
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err(self.error("unterminated argument"));
        }
        let argument: String = self.chars[start..self.pos].iter().collect();
        let index = parse_nth(&argument)
            .ok_or_else(|| self.error(format!("invalid An+B argument {argument:?}")))?;
        self.pos += 1;
        Ok(if name == "nth-child" {
            Structural::NthChild(index)
        } else {
            Structural::NthOfType(index)
        })
    }
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii()
}
