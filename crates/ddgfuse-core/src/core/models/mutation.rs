use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Chain assumed when a mutation string does not name one.
pub const DEFAULT_CHAIN_ID: char = 'A';

/// A single point mutation, e.g. `A_M1A`.
///
/// `residue_id` is the 1-based position of the residue in the sequence the
/// mutation is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mutation {
    pub chain_id: char,
    pub residue_id: usize,
    pub residue_wt: char,
    pub residue_mut: char,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseMutationError {
    #[error("Mutation string is empty")]
    Empty,
    #[error("Invalid chain identifier '{0}' (expected a single character)")]
    InvalidChain(String),
    #[error("Invalid mutation format '{0}' (expected [<chain>_]<wt><position><mut>)")]
    InvalidFormat(String),
    #[error("Invalid residue position in '{0}' (expected a positive integer)")]
    InvalidPosition(String),
    #[error("Mutation '{0}' does not change the residue")]
    IdenticalResidues(String),
}

impl Mutation {
    pub fn new(
        chain_id: char,
        residue_id: usize,
        residue_wt: char,
        residue_mut: char,
    ) -> Result<Self, ParseMutationError> {
        let display = format!("{chain_id}_{residue_wt}{residue_id}{residue_mut}");
        if residue_id == 0 {
            return Err(ParseMutationError::InvalidPosition(display));
        }
        if !residue_wt.is_ascii_uppercase() || !residue_mut.is_ascii_uppercase() {
            return Err(ParseMutationError::InvalidFormat(display));
        }
        if residue_wt == residue_mut {
            return Err(ParseMutationError::IdenticalResidues(display));
        }
        Ok(Self {
            chain_id,
            residue_id,
            residue_wt,
            residue_mut,
        })
    }

    /// 0-based index of the mutated position.
    pub fn index(&self) -> usize {
        self.residue_id - 1
    }
}

impl FromStr for Mutation {
    type Err = ParseMutationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseMutationError::Empty);
        }

        let (chain_id, body) = match s.split_once('_') {
            Some((chain, body)) => {
                let mut chars = chain.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => (c, body),
                    _ => return Err(ParseMutationError::InvalidChain(chain.to_string())),
                }
            }
            None => (DEFAULT_CHAIN_ID, s),
        };

        let chars: Vec<char> = body.chars().collect();
        if chars.len() < 3 {
            return Err(ParseMutationError::InvalidFormat(s.to_string()));
        }
        let residue_wt = chars[0];
        let residue_mut = chars[chars.len() - 1];
        let position: String = chars[1..chars.len() - 1].iter().collect();
        if !position.chars().all(|c| c.is_ascii_digit()) {
            return Err(ParseMutationError::InvalidPosition(s.to_string()));
        }
        let residue_id: usize = position
            .parse()
            .map_err(|_| ParseMutationError::InvalidPosition(s.to_string()))?;

        Mutation::new(chain_id, residue_id, residue_wt, residue_mut)
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}{}{}",
            self.chain_id, self.residue_wt, self.residue_id, self.residue_mut
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mutation_without_chain_using_default() {
        let mutation: Mutation = "M1A".parse().unwrap();
        assert_eq!(
            mutation,
            Mutation {
                chain_id: 'A',
                residue_id: 1,
                residue_wt: 'M',
                residue_mut: 'A',
            }
        );
        assert_eq!(mutation.index(), 0);
    }

    #[test]
    fn parses_mutation_with_explicit_chain() {
        let mutation: Mutation = "B_K123E".parse().unwrap();
        assert_eq!(mutation.chain_id, 'B');
        assert_eq!(mutation.residue_id, 123);
        assert_eq!(mutation.residue_wt, 'K');
        assert_eq!(mutation.residue_mut, 'E');
    }

    #[test]
    fn display_uses_canonical_chain_prefixed_form() {
        let mutation: Mutation = " G12D ".parse().unwrap();
        assert_eq!(mutation.to_string(), "A_G12D");
        assert_eq!(mutation.to_string().parse::<Mutation>().unwrap(), mutation);
    }

    #[test]
    fn rejects_malformed_mutations() {
        assert_eq!("".parse::<Mutation>(), Err(ParseMutationError::Empty));
        assert!(matches!(
            "AB_M1A".parse::<Mutation>(),
            Err(ParseMutationError::InvalidChain(_))
        ));
        assert!(matches!(
            "M1".parse::<Mutation>(),
            Err(ParseMutationError::InvalidFormat(_))
        ));
        assert!(matches!(
            "MxA".parse::<Mutation>(),
            Err(ParseMutationError::InvalidPosition(_))
        ));
        assert!(matches!(
            "M0A".parse::<Mutation>(),
            Err(ParseMutationError::InvalidPosition(_))
        ));
        assert!(matches!(
            "m1a".parse::<Mutation>(),
            Err(ParseMutationError::InvalidFormat(_))
        ));
    }

    #[test]
    fn rejects_mutation_to_the_same_residue() {
        assert!(matches!(
            "A_M1M".parse::<Mutation>(),
            Err(ParseMutationError::IdenticalResidues(_))
        ));
    }
}
