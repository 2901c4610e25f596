//! Compiled structural queries. A selector is translated once into a list of
//! axis steps that the tree boundary evaluates; nothing here touches styles.

use std::fmt;

use crate::error::SelectorError;
use crate::nth::PositionTest;
use crate::selector::{AttrFilter, Combinator, Compound, Selector, Structural, parse_selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Any element below the previous step (or below the document for the first step).
    Descendant,
    Child,
    /// The first element sibling following the previous step.
    AdjacentSibling,
}

/// Which siblings are counted for a positional predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionScope {
    AnySibling,
    SameTag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    HasAttribute(String),
    AttributeEquals(String, String),
    IdEquals(String),
    /// Whitespace-delimited membership in the `class` attribute.
    HasClass(String),
    Position {
        scope: PositionScope,
        test: PositionTest,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTest {
    pub tag: Option<String>,
    pub predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub steps: Vec<Step>,
}

pub fn translate(selector_text: &str) -> Result<Query, SelectorError> {
    Ok(compile(&parse_selector(selector_text)?))
}

pub fn compile(selector: &Selector) -> Query {
    let steps = selector
        .compounds
        .iter()
        .enumerate()
        .map(|(idx, compound)| {
            let axis = match idx.checked_sub(1).map(|i| selector.combinators[i]) {
                None | Some(Combinator::Descendant) => Axis::Descendant,
                Some(Combinator::Child) => Axis::Child,
                Some(Combinator::AdjacentSibling) => Axis::AdjacentSibling,
            };
            Step {
                axis,
                test: compile_compound(compound),
            }
        })
        .collect();
    Query { steps }
}

fn compile_compound(compound: &Compound) -> NodeTest {
    let mut predicates = Vec::new();
    for structural in &compound.structural {
        let (scope, test) = match structural {
            Structural::FirstChild => (PositionScope::AnySibling, PositionTest::Exact(1)),
            Structural::LastChild => (PositionScope::AnySibling, PositionTest::Last),
            Structural::NthChild(index) => (PositionScope::AnySibling, index.position_test()),
            Structural::NthOfType(index) => (PositionScope::SameTag, index.position_test()),
        };
        predicates.push(Predicate::Position { scope, test });
    }
    for attr in &compound.attrs {
        predicates.push(match attr {
            AttrFilter::Exists(name) => Predicate::HasAttribute(name.clone()),
            AttrFilter::Equals(name, value) => {
                Predicate::AttributeEquals(name.clone(), value.clone())
            }
        });
    }
    if let Some(id) = &compound.id {
        predicates.push(Predicate::IdEquals(id.clone()));
    }
    for class in &compound.classes {
        predicates.push(Predicate::HasClass(class.clone()));
    }
    NodeTest {
        tag: compound.tag.clone(),
        predicates,
    }
}

impl fmt::Display for Query {
    /// XPath-style rendering for diagnostics.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            match step.axis {
                Axis::Descendant => f.write_str("//")?,
                Axis::Child => f.write_str("/")?,
                Axis::AdjacentSibling => f.write_str("/following-sibling::*[1]/self::")?,
            }
            write!(f, "{}", step.test)?;
        }
        Ok(())
    }
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag.as_deref().unwrap_or("*");
        // Positions among all siblings are taken before narrowing by tag.
        for predicate in &self.predicates {
            if let Predicate::Position {
                scope: PositionScope::AnySibling,
                test,
            } = predicate
            {
                write!(f, "*[{}]/self::", PositionCondition(*test))?;
            }
        }
        f.write_str(tag)?;
        for predicate in &self.predicates {
            match predicate {
                Predicate::Position {
                    scope: PositionScope::SameTag,
                    test,
                } => write!(f, "[{}]", PositionCondition(*test))?,
                Predicate::Position { .. } => {}
                Predicate::HasAttribute(name) => write!(f, "[@{name}]")?,
                Predicate::AttributeEquals(name, value) => write!(f, "[@{name}=\"{value}\"]")?,
                Predicate::IdEquals(id) => write!(f, "[@id=\"{id}\"]")?,
                Predicate::HasClass(class) => write!(
                    f,
                    "[contains(concat(\" \",@class,\" \"),\" {class} \")]"
                )?,
            }
        }
        Ok(())
    }
}

struct PositionCondition(PositionTest);

impl fmt::Display for PositionCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            PositionTest::Exact(index) => write!(f, "{index}"),
            PositionTest::Last => f.write_str("last()"),
            PositionTest::Forward { step, offset } => write!(
                f,
                "position() >= {offset} and (position() - {offset}) mod {step} = 0"
            ),
            PositionTest::Backward { step, offset } => write!(
                f,
                "position() <= {offset} and ({offset} - position()) mod {step} = 0"
            ),
        }
    }
}
