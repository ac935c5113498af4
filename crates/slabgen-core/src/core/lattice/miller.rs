use super::integer::gcd;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum MillerIndexError {
    #[error("Miller index must have at least one nonzero component")]
    AllZero,

    #[error("Invalid Miller index '{0}'. Expected 'h,k,l' (e.g., '1,1,0') or compact digits (e.g., '11-1').")]
    Parse(String),
}

/// A crystallographic plane orientation `(h k l)`.
///
/// The index is validated (not all zero) and stored in lowest terms: `(2 2 2)` and
/// `(1 1 1)` describe the same family of planes and produce the same surface cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i64; 3]", into = "[i64; 3]")]
pub struct MillerIndex {
    h: i64,
    k: i64,
    l: i64,
}

impl MillerIndex {
    pub fn new(h: i64, k: i64, l: i64) -> Result<Self, MillerIndexError> {
        let divisor = gcd(gcd(h, k), l);
        if divisor == 0 {
            return Err(MillerIndexError::AllZero);
        }
        Ok(Self {
            h: h / divisor,
            k: k / divisor,
            l: l / divisor,
        })
    }

    pub fn h(&self) -> i64 {
        self.h
    }

    pub fn k(&self) -> i64 {
        self.k
    }

    pub fn l(&self) -> i64 {
        self.l
    }

    pub fn as_array(&self) -> [i64; 3] {
        [self.h, self.k, self.l]
    }

    /// Index of the only nonzero component, if exactly one component is nonzero.
    pub fn single_nonzero_axis(&self) -> Option<usize> {
        let nonzero: Vec<usize> = self
            .as_array()
            .iter()
            .enumerate()
            .filter_map(|(axis, &v)| (v != 0).then_some(axis))
            .collect();
        match nonzero.as_slice() {
            [axis] => Some(*axis),
            _ => None,
        }
    }
}

impl Default for MillerIndex {
    fn default() -> Self {
        Self { h: 1, k: 1, l: 1 }
    }
}

impl TryFrom<[i64; 3]> for MillerIndex {
    type Error = MillerIndexError;

    fn try_from(value: [i64; 3]) -> Result<Self, Self::Error> {
        Self::new(value[0], value[1], value[2])
    }
}

impl From<MillerIndex> for [i64; 3] {
    fn from(index: MillerIndex) -> Self {
        index.as_array()
    }
}

impl FromStr for MillerIndex {
    type Err = MillerIndexError;

    /// Parses `"h,k,l"`, `"h k l"`, `"(h k l)"` or compact single-digit forms such as
    /// `"111"` and `"1-10"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_error = || MillerIndexError::Parse(s.to_string());
        let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')').trim();

        let components: Vec<i64> = if trimmed.contains([',', ' ']) {
            trimmed
                .split([',', ' '])
                .filter(|part| !part.is_empty())
                .map(|part| part.trim().parse::<i64>().map_err(|_| parse_error()))
                .collect::<Result<_, _>>()?
        } else {
            let mut values = Vec::new();
            let mut negative = false;
            for c in trimmed.chars() {
                match c {
                    '-' if !negative => negative = true,
                    d if d.is_ascii_digit() => {
                        let digit = i64::from(d.to_digit(10).ok_or_else(parse_error)?);
                        values.push(if negative { -digit } else { digit });
                        negative = false;
                    }
                    _ => return Err(parse_error()),
                }
            }
            if negative {
                return Err(parse_error());
            }
            values
        };

        match components.as_slice() {
            [h, k, l] => Self::new(*h, *k, *l),
            _ => Err(parse_error()),
        }
    }
}

impl fmt::Display for MillerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.h, self.k, self.l)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_zero_index_is_rejected() {
        assert_eq!(MillerIndex::new(0, 0, 0), Err(MillerIndexError::AllZero));
    }

    #[test]
    fn index_is_reduced_to_lowest_terms() {
        let index = MillerIndex::new(2, -4, 6).unwrap();
        assert_eq!(index.as_array(), [1, -2, 3]);
        assert_eq!(MillerIndex::new(0, 0, -3).unwrap().as_array(), [0, 0, -1]);
    }

    #[test]
    fn single_nonzero_axis_detects_axis_aligned_planes() {
        assert_eq!(MillerIndex::new(0, 2, 0).unwrap().single_nonzero_axis(), Some(1));
        assert_eq!(MillerIndex::new(1, 1, 0).unwrap().single_nonzero_axis(), None);
        assert_eq!(MillerIndex::default().single_nonzero_axis(), None);
    }

    #[test]
    fn parses_separated_and_compact_forms() {
        assert_eq!("1,1,0".parse::<MillerIndex>().unwrap().as_array(), [1, 1, 0]);
        assert_eq!("(2 1 -1)".parse::<MillerIndex>().unwrap().as_array(), [2, 1, -1]);
        assert_eq!("111".parse::<MillerIndex>().unwrap().as_array(), [1, 1, 1]);
        assert_eq!("1-10".parse::<MillerIndex>().unwrap().as_array(), [1, -1, 0]);
    }

    #[test]
    fn rejects_malformed_strings() {
        for bad in ["", "1,1", "1,1,1,1", "a,b,c", "11-", "1--10"] {
            assert!(matches!(
                bad.parse::<MillerIndex>(),
                Err(MillerIndexError::Parse(_))
            ), "{bad:?} should not parse");
        }
        assert_eq!("0,0,0".parse::<MillerIndex>(), Err(MillerIndexError::AllZero));
    }

    #[test]
    fn display_uses_crystallographic_notation() {
        assert_eq!(MillerIndex::new(1, -1, 0).unwrap().to_string(), "(1 -1 0)");
    }

    #[test]
    fn deserializes_from_an_integer_array() {
        #[derive(Deserialize)]
        struct Wrapper {
            index: MillerIndex,
        }
        let parsed: Wrapper = toml::from_str("index = [0, 2, 2]").unwrap();
        assert_eq!(parsed.index.as_array(), [0, 1, 1]);
        assert!(toml::from_str::<Wrapper>("index = [0, 0, 0]").is_err());
    }
}
