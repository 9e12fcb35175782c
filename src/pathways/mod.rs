//! Pathway structure definitions.
//!
//! A pathway is a nested combinator tree over reaction ids. The closed set
//! of node kinds (reaction leaf, AND, OR, OPTIONAL) keeps evaluation
//! exhaustive and statically checkable. Structures are static reference
//! data: parsed once at load time, read-only afterwards.
//!
//! Two input forms are accepted: a compact textual grammar and a JSON
//! encoding. The textual form lists steps separated by whitespace (AND),
//! groups alternatives in parentheses separated by `|` (OR), and marks
//! optional steps with a leading `-`:
//!
//! ```text
//! RXN-1 RXN-2 ( RXN-3 | RXN-4 ) -RXN-5
//! ```

pub mod calculator;
pub mod minpath;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum StructureParseError {
    #[error("empty pathway structure")]
    Empty,

    #[error("unbalanced parentheses in pathway structure")]
    UnbalancedParens,

    #[error("unexpected token '{0}' in pathway structure")]
    UnexpectedToken(String),

    #[error("optional marker '-' not followed by a step")]
    DanglingOptional,
}

/// One node of a pathway's combinator tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathwayStructure {
    /// A single reaction step, identified by reaction id.
    Reaction(String),
    /// All children are required (limiting-reactant semantics).
    And(Vec<PathwayStructure>),
    /// Any one child satisfies the step.
    Or(Vec<PathwayStructure>),
    /// A step that may be gap-filled when undetected.
    Optional(Box<PathwayStructure>),
}

impl PathwayStructure {
    /// Parses the textual grammar form.
    pub fn parse(text: &str) -> Result<Self, StructureParseError> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Err(StructureParseError::Empty);
        }
        let mut pos = 0;
        let node = parse_alternation(&tokens, &mut pos)?;
        if pos != tokens.len() {
            // Leftover tokens mean an unmatched ')'.
            return Err(StructureParseError::UnbalancedParens);
        }
        Ok(node)
    }

    /// Unique reaction ids referenced anywhere in the tree, in order of
    /// first appearance.
    pub fn reactions(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_reactions(&mut out);
        out
    }

    fn collect_reactions<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            PathwayStructure::Reaction(id) => {
                if !out.contains(&id.as_str()) {
                    out.push(id);
                }
            }
            PathwayStructure::And(children) | PathwayStructure::Or(children) => {
                for child in children {
                    child.collect_reactions(out);
                }
            }
            PathwayStructure::Optional(child) => child.collect_reactions(out),
        }
    }

    /// Total number of structural leaf positions (duplicates counted), the
    /// denominator of pathway coverage.
    pub fn leaf_positions(&self) -> usize {
        match self {
            PathwayStructure::Reaction(_) => 1,
            PathwayStructure::And(children) | PathwayStructure::Or(children) => {
                children.iter().map(|c| c.leaf_positions()).sum()
            }
            PathwayStructure::Optional(child) => child.leaf_positions(),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Ident(String),
    Open,
    Close,
    Pipe,
    Optional,
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut ident = String::new();
    let flush = |ident: &mut String, tokens: &mut Vec<Token>| {
        if !ident.is_empty() {
            tokens.push(Token::Ident(std::mem::take(ident)));
        }
    };
    let mut at_token_start = true;
    for ch in text.chars() {
        match ch {
            '(' => {
                flush(&mut ident, &mut tokens);
                tokens.push(Token::Open);
                at_token_start = true;
            }
            ')' => {
                flush(&mut ident, &mut tokens);
                tokens.push(Token::Close);
                at_token_start = true;
            }
            '|' => {
                flush(&mut ident, &mut tokens);
                tokens.push(Token::Pipe);
                at_token_start = true;
            }
            c if c.is_whitespace() => {
                flush(&mut ident, &mut tokens);
                at_token_start = true;
            }
            // '-' only marks OPTIONAL at the start of a token; ids like
            // RXN-123 keep their interior dashes.
            '-' if at_token_start && ident.is_empty() => {
                tokens.push(Token::Optional);
                at_token_start = false;
            }
            c => {
                ident.push(c);
                at_token_start = false;
            }
        }
    }
    flush(&mut ident, &mut tokens);
    tokens
}

/// alternation := sequence ('|' sequence)*
fn parse_alternation(
    tokens: &[Token],
    pos: &mut usize,
) -> Result<PathwayStructure, StructureParseError> {
    let mut branches = vec![parse_sequence(tokens, pos)?];
    while matches!(tokens.get(*pos), Some(Token::Pipe)) {
        *pos += 1;
        branches.push(parse_sequence(tokens, pos)?);
    }
    Ok(if branches.len() == 1 {
        branches.remove(0)
    } else {
        PathwayStructure::Or(branches)
    })
}

/// sequence := term+
fn parse_sequence(
    tokens: &[Token],
    pos: &mut usize,
) -> Result<PathwayStructure, StructureParseError> {
    let mut terms = Vec::new();
    loop {
        match tokens.get(*pos) {
            Some(Token::Close) | Some(Token::Pipe) | None => break,
            _ => terms.push(parse_term(tokens, pos)?),
        }
    }
    match terms.len() {
        0 => Err(StructureParseError::Empty),
        1 => Ok(terms.remove(0)),
        _ => Ok(PathwayStructure::And(terms)),
    }
}

/// term := ['-'] atom
fn parse_term(tokens: &[Token], pos: &mut usize) -> Result<PathwayStructure, StructureParseError> {
    if matches!(tokens.get(*pos), Some(Token::Optional)) {
        *pos += 1;
        let atom = parse_atom(tokens, pos).map_err(|e| match e {
            StructureParseError::Empty => StructureParseError::DanglingOptional,
            other => other,
        })?;
        return Ok(PathwayStructure::Optional(Box::new(atom)));
    }
    parse_atom(tokens, pos)
}

/// atom := ident | '(' alternation ')'
fn parse_atom(tokens: &[Token], pos: &mut usize) -> Result<PathwayStructure, StructureParseError> {
    match tokens.get(*pos) {
        Some(Token::Ident(id)) => {
            *pos += 1;
            Ok(PathwayStructure::Reaction(id.clone()))
        }
        Some(Token::Open) => {
            *pos += 1;
            let inner = parse_alternation(tokens, pos)?;
            match tokens.get(*pos) {
                Some(Token::Close) => {
                    *pos += 1;
                    Ok(inner)
                }
                _ => Err(StructureParseError::UnbalancedParens),
            }
        }
        Some(Token::Pipe) => Err(StructureParseError::UnexpectedToken("|".to_string())),
        Some(Token::Close) => Err(StructureParseError::UnexpectedToken(")".to_string())),
        Some(Token::Optional) => Err(StructureParseError::DanglingOptional),
        None => Err(StructureParseError::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::PathwayStructure::{And, Optional, Or, Reaction};
    use super::*;

    fn rxn(id: &str) -> PathwayStructure {
        Reaction(id.to_string())
    }

    #[test]
    fn test_parse_single_reaction() {
        assert_eq!(PathwayStructure::parse("RXN-1").unwrap(), rxn("RXN-1"));
    }

    #[test]
    fn test_parse_and_sequence() {
        assert_eq!(
            PathwayStructure::parse("R1 R2 R3").unwrap(),
            And(vec![rxn("R1"), rxn("R2"), rxn("R3")])
        );
    }

    #[test]
    fn test_parse_alternation_group() {
        assert_eq!(
            PathwayStructure::parse("R1 ( R2 | R3 )").unwrap(),
            And(vec![rxn("R1"), Or(vec![rxn("R2"), rxn("R3")])])
        );
    }

    #[test]
    fn test_parse_optional_step() {
        assert_eq!(
            PathwayStructure::parse("R1 -R2").unwrap(),
            And(vec![rxn("R1"), Optional(Box::new(rxn("R2")))])
        );
    }

    #[test]
    fn test_interior_dashes_are_not_optional_markers() {
        assert_eq!(
            PathwayStructure::parse("RXN-66-321").unwrap(),
            rxn("RXN-66-321")
        );
    }

    #[test]
    fn test_parse_nested_groups() {
        let parsed = PathwayStructure::parse("R1 ( R2 R3 | R4 ) -( R5 | R6 )").unwrap();
        assert_eq!(
            parsed,
            And(vec![
                rxn("R1"),
                Or(vec![And(vec![rxn("R2"), rxn("R3")]), rxn("R4")]),
                Optional(Box::new(Or(vec![rxn("R5"), rxn("R6")]))),
            ])
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            PathwayStructure::parse("").unwrap_err(),
            StructureParseError::Empty
        );
        assert_eq!(
            PathwayStructure::parse("R1 ( R2").unwrap_err(),
            StructureParseError::UnbalancedParens
        );
        assert_eq!(
            PathwayStructure::parse("R1 )").unwrap_err(),
            StructureParseError::UnbalancedParens
        );
        assert_eq!(
            PathwayStructure::parse("R1 -").unwrap_err(),
            StructureParseError::DanglingOptional
        );
    }

    #[test]
    fn test_reactions_are_deduplicated() {
        let parsed = PathwayStructure::parse("R1 R2 ( R1 | R3 )").unwrap();
        assert_eq!(parsed.reactions(), vec!["R1", "R2", "R3"]);
    }

    #[test]
    fn test_leaf_positions_count_duplicates() {
        let parsed = PathwayStructure::parse("R1 R2 ( R1 | R3 )").unwrap();
        assert_eq!(parsed.leaf_positions(), 4);
    }

    #[test]
    fn test_json_round_trip() {
        let parsed = PathwayStructure::parse("R1 ( R2 | R3 ) -R4").unwrap();
        let json = serde_json::to_string(&parsed).unwrap();
        let back: PathwayStructure = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, back);
    }
}
