use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Whether a prediction concerns folding stability (core) or binding to a
/// partner chain (interface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coi {
    Core,
    Interface,
}

#[derive(Debug, Error)]
#[error("Invalid core-or-interface value '{0}' (expected 'core' or 'interface')")]
pub struct ParseCoiError(String);

impl Coi {
    pub const ALL: [Coi; 2] = [Coi::Core, Coi::Interface];

    pub fn as_str(&self) -> &'static str {
        match self {
            Coi::Core => "core",
            Coi::Interface => "interface",
        }
    }

    /// The COI implied by the presence of a binding partner.
    pub fn for_ligand(has_ligand: bool) -> Self {
        if has_ligand { Coi::Interface } else { Coi::Core }
    }
}

impl FromStr for Coi {
    type Err = ParseCoiError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "core" => Ok(Coi::Core),
            "interface" => Ok(Coi::Interface),
            _ => Err(ParseCoiError(s.to_string())),
        }
    }
}

impl fmt::Display for Coi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_both_variants() {
        for coi in Coi::ALL {
            assert_eq!(coi.to_string().parse::<Coi>().unwrap(), coi);
        }
        assert_eq!(" Interface ".parse::<Coi>().unwrap(), Coi::Interface);
        assert!("surface".parse::<Coi>().is_err());
    }

    #[test]
    fn ligand_presence_selects_interface() {
        assert_eq!(Coi::for_ligand(false), Coi::Core);
        assert_eq!(Coi::for_ligand(true), Coi::Interface);
    }
}
