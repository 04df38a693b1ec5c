//! Record types for face samples and kin pairs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::DatasetError;

/// FIW relationship class of a verification pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KinRelation {
    /// Father–daughter.
    Fd,
    /// Father–son.
    Fs,
    /// Mother–daughter.
    Md,
    /// Mother–son.
    Ms,
    /// Brother–brother.
    Bb,
    /// Sister–sister.
    Ss,
    /// Brother–sister.
    Sibs,
    /// Grandfather–granddaughter.
    Gfgd,
    /// Grandfather–grandson.
    Gfgs,
    /// Grandmother–granddaughter.
    Gmgd,
    /// Grandmother–grandson.
    Gmgs,
}

impl KinRelation {
    /// Every relation, in reporting order.
    pub const ALL: [KinRelation; 11] = [
        Self::Fd,
        Self::Fs,
        Self::Md,
        Self::Ms,
        Self::Bb,
        Self::Ss,
        Self::Sibs,
        Self::Gfgd,
        Self::Gfgs,
        Self::Gmgd,
        Self::Gmgs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fd => "fd",
            Self::Fs => "fs",
            Self::Md => "md",
            Self::Ms => "ms",
            Self::Bb => "bb",
            Self::Ss => "ss",
            Self::Sibs => "sibs",
            Self::Gfgd => "gfgd",
            Self::Gfgs => "gfgs",
            Self::Gmgd => "gmgd",
            Self::Gmgs => "gmgs",
        }
    }
}

impl fmt::Display for KinRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KinRelation {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == lower)
            .ok_or_else(|| DatasetError::UnknownRelation(s.to_string()))
    }
}

/// One training face and the family (class) it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceSample {
    pub path: PathBuf,
    /// Class label in `[0, num_families)`.
    pub family: usize,
}

/// A verification pair: two faces, their relation, and whether they are kin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinPair {
    pub left: PathBuf,
    pub right: PathBuf,
    pub relation: KinRelation,
    pub label: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_parse_round_trip() {
        for rel in KinRelation::ALL {
            let parsed: KinRelation = rel.to_string().parse().unwrap();
            assert_eq!(parsed, rel);
        }
    }

    #[test]
    fn test_relation_parse_case_insensitive() {
        assert_eq!("FD".parse::<KinRelation>().unwrap(), KinRelation::Fd);
        assert_eq!("Sibs".parse::<KinRelation>().unwrap(), KinRelation::Sibs);
    }

    #[test]
    fn test_relation_unknown() {
        let err = "cousin".parse::<KinRelation>().unwrap_err();
        assert!(matches!(err, DatasetError::UnknownRelation(ref s) if s == "cousin"));
    }
}
