use super::chain::Chain;

/// A contiguous residue range within one chain.
///
/// `start` and `end` are 1-based, inclusive indices into the chain's residue
/// list (not author residue numbers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainDef {
    pub chain_id: char,
    pub start: usize,
    pub end: usize,
}

impl DomainDef {
    pub fn new(chain_id: char, start: usize, end: usize) -> Self {
        Self {
            chain_id,
            start,
            end,
        }
    }

    pub fn whole_chain(chain: &Chain) -> Self {
        Self::new(chain.id, 1, chain.len())
    }

    pub fn len(&self) -> usize {
        (self.end + 1).saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The desired sequence of one chain, used when building a model from a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainTarget {
    pub chain_id: char,
    pub target_sequence: String,
}
