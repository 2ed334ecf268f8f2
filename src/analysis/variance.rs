/// Position of a type within a larger type, deciding how subtyping
/// propagates into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    Covariant,     // A <: B => F<A> <: F<B>
    Contravariant, // A <: B => F<B> <: F<A>
    Invariant,     // F<A> <: F<B> only when A == B
}

impl Variance {
    /// Compose two variances (for nested types)
    pub fn compose(self, other: Self) -> Self {
        use Variance::*;
        match (self, other) {
            (Invariant, _) | (_, Invariant) => Invariant,
            (Covariant, Covariant) | (Contravariant, Contravariant) => Covariant,
            (Contravariant, Covariant) | (Covariant, Contravariant) => Contravariant,
        }
    }

    /// Flip variance (for contravariant positions)
    pub fn flip(self) -> Self {
        match self {
            Self::Covariant => Self::Contravariant,
            Self::Contravariant => Self::Covariant,
            Self::Invariant => Self::Invariant,
        }
    }

    /// Variance of a function type's parameters relative to the function.
    pub fn of_parameter(self) -> Self {
        self.compose(Self::Contravariant)
    }

    /// Variance of a generic type's arguments. Type arguments of classes
    /// compare by equality.
    pub fn of_type_argument(self) -> Self {
        self.compose(Self::Invariant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variance_composition() {
        assert_eq!(Variance::Covariant.compose(Variance::Covariant), Variance::Covariant);
        assert_eq!(Variance::Covariant.compose(Variance::Contravariant), Variance::Contravariant);
        assert_eq!(Variance::Contravariant.compose(Variance::Contravariant), Variance::Covariant);
        assert_eq!(Variance::Invariant.compose(Variance::Covariant), Variance::Invariant);
    }

    #[test]
    fn test_variance_flip() {
        assert_eq!(Variance::Covariant.flip(), Variance::Contravariant);
        assert_eq!(Variance::Contravariant.flip(), Variance::Covariant);
        assert_eq!(Variance::Invariant.flip(), Variance::Invariant);
    }

    #[test]
    fn test_parameters_of_parameters_are_covariant() {
        let outer = Variance::Covariant.of_parameter();
        assert_eq!(outer, Variance::Contravariant);
        assert_eq!(outer.of_parameter(), Variance::Covariant);
        assert_eq!(outer.of_type_argument(), Variance::Invariant);
    }
}
