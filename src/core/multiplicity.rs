use serde::{Deserialize, Serialize};
use std::fmt;

/// Cardinality bounds of a property, parameter or value.
///
/// `upper == None` means unbounded. Construction through [`Multiplicity::new`]
/// guarantees `lower <= upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Multiplicity {
    pub lower: u32,
    pub upper: Option<u32>,
}

impl Multiplicity {
    pub const PURE_ONE: Multiplicity = Multiplicity { lower: 1, upper: Some(1) };
    pub const ZERO_ONE: Multiplicity = Multiplicity { lower: 0, upper: Some(1) };
    pub const ZERO_MANY: Multiplicity = Multiplicity { lower: 0, upper: None };
    pub const ONE_MANY: Multiplicity = Multiplicity { lower: 1, upper: None };
    pub const ZERO: Multiplicity = Multiplicity { lower: 0, upper: Some(0) };

    pub fn new(lower: u32, upper: Option<u32>) -> Result<Self, String> {
        match upper {
            Some(upper) if upper < lower => Err(format!(
                "Invalid multiplicity: lower bound {} is greater than upper bound {}",
                lower, upper
            )),
            _ => Ok(Self { lower, upper }),
        }
    }

    pub fn exactly(n: u32) -> Self {
        Self { lower: n, upper: Some(n) }
    }

    /// True when a value of multiplicity `self` may be used where `target` is
    /// expected.
    pub fn is_compatible_with(&self, target: &Multiplicity) -> bool {
        self.lower >= target.lower
            && match (target.upper, self.upper) {
                (None, _) => true,
                (Some(t), Some(s)) => s <= t,
                (Some(_), None) => false,
            }
    }

    /// Multiplicity of navigating through `self` then `other`.
    pub fn product(&self, other: &Multiplicity) -> Multiplicity {
        let upper = match (self.upper, other.upper) {
            (Some(a), Some(b)) => Some(a.saturating_mul(b)),
            (Some(0), None) | (None, Some(0)) => Some(0),
            _ => None,
        };
        Multiplicity { lower: self.lower.saturating_mul(other.lower), upper }
    }

    /// Multiplicity of concatenating values of `self` and `other`.
    pub fn sum(&self, other: &Multiplicity) -> Multiplicity {
        let upper = match (self.upper, other.upper) {
            (Some(a), Some(b)) => Some(a.saturating_add(b)),
            _ => None,
        };
        Multiplicity { lower: self.lower.saturating_add(other.lower), upper }
    }

    /// Token used inside function signature ids, e.g. `MANY` or `$0_1$`.
    pub fn signature_token(&self) -> String {
        match (self.lower, self.upper) {
            (l, Some(u)) if l == u => l.to_string(),
            (0, None) => "MANY".to_string(),
            (l, None) => format!("${}_MANY$", l),
            (l, Some(u)) => format!("${}_{}$", l, u),
        }
    }
}

impl Default for Multiplicity {
    fn default() -> Self {
        Self::PURE_ONE
    }
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lower, self.upper) {
            (l, Some(u)) if l == u => write!(f, "[{}]", l),
            (0, None) => write!(f, "[*]"),
            (l, None) => write!(f, "[{}..*]", l),
            (l, Some(u)) => write!(f, "[{}..{}]", l, u),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Multiplicity::PURE_ONE.to_string(), "[1]");
        assert_eq!(Multiplicity::ZERO_MANY.to_string(), "[*]");
        assert_eq!(Multiplicity::ZERO_ONE.to_string(), "[0..1]");
        assert_eq!(Multiplicity::ONE_MANY.to_string(), "[1..*]");
        assert_eq!(Multiplicity::exactly(4).to_string(), "[4]");
    }

    #[test]
    fn test_compatibility() {
        let four = Multiplicity::exactly(4);
        assert!(!four.is_compatible_with(&Multiplicity::PURE_ONE));
        assert!(four.is_compatible_with(&Multiplicity::ZERO_MANY));
        assert!(four.is_compatible_with(&Multiplicity::ONE_MANY));
        assert!(Multiplicity::PURE_ONE.is_compatible_with(&Multiplicity::ZERO_ONE));
        assert!(!Multiplicity::ZERO_ONE.is_compatible_with(&Multiplicity::PURE_ONE));
        assert!(!Multiplicity::ZERO_MANY.is_compatible_with(&Multiplicity::ZERO_ONE));
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(Multiplicity::new(3, Some(2)).is_err());
        assert!(Multiplicity::new(2, None).is_ok());
    }

    #[test]
    fn test_product_and_sum() {
        let one = Multiplicity::PURE_ONE;
        let opt = Multiplicity::ZERO_ONE;
        assert_eq!(one.product(&opt), opt);
        assert_eq!(opt.product(&Multiplicity::ZERO_MANY), Multiplicity::ZERO_MANY);
        assert_eq!(one.sum(&one), Multiplicity::exactly(2));
    }

    #[test]
    fn test_signature_tokens() {
        assert_eq!(Multiplicity::PURE_ONE.signature_token(), "1");
        assert_eq!(Multiplicity::ZERO_MANY.signature_token(), "MANY");
        assert_eq!(Multiplicity::ZERO_ONE.signature_token(), "$0_1$");
        assert_eq!(Multiplicity::ONE_MANY.signature_token(), "$1_MANY$");
    }
}
