//! Validator ordering
//!
//! Every validator carries an [`Order`]. Orders are grouped into bands of
//! [`Order::UNIT`]: a validator runs in the phase whose base it is at or above
//! and below the next base. Offsets inside a band give custom priorities.

use std::fmt;

/// Position of a validator within the validation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Order(i32);

impl Order {
    /// Width of one phase band.
    pub const UNIT: i32 = 10;

    /// Root hooks on the raw input mapping.
    pub const INITIAL_ROOT: Self = Self(0);
    /// Root hooks on the attribute-keyed mapping.
    pub const ROOT: Self = Self(10);
    /// Field validators before type coercion.
    pub const VALIDATOR: Self = Self(20);
    /// The type-derived validator. Not assignable.
    pub const ANNOTATION: Self = Self(30);
    /// Field validators after type coercion.
    pub const POST_VALIDATOR: Self = Self(40);
    /// Root hooks after every field is coerced.
    pub const FINAL_ROOT: Self = Self(50);

    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> i32 {
        self.0
    }

    /// Shifts the order inside its band, e.g. `Order::VALIDATOR.offset(5)`.
    #[must_use]
    pub const fn offset(self, by: i32) -> Self {
        Self(self.0 + by)
    }

    /// Whether this order falls into the band starting at `base`.
    pub const fn in_band(self, base: Self) -> bool {
        base.0 <= self.0 && self.0 < base.0 + Self::UNIT
    }

    /// The phase this order belongs to, if any.
    pub const fn phase(self) -> Option<Phase> {
        let mut i = 0;
        while i < Phase::ALL.len() {
            if self.in_band(Phase::ALL[i].order()) {
                return Some(Phase::ALL[i]);
            }
            i += 1;
        }
        None
    }
}

impl Default for Order {
    fn default() -> Self {
        Self::VALIDATOR
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Named pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    InitialRoot,
    Root,
    Validator,
    Annotation,
    PostValidator,
    FinalRoot,
}

impl Phase {
    pub const ALL: [Self; 6] = [
        Self::InitialRoot,
        Self::Root,
        Self::Validator,
        Self::Annotation,
        Self::PostValidator,
        Self::FinalRoot,
    ];

    /// Phases that run per-field validators.
    pub const FIELD: [Self; 3] = [Self::Validator, Self::Annotation, Self::PostValidator];

    /// Base order of the band.
    pub const fn order(self) -> Order {
        match self {
            Self::InitialRoot => Order::INITIAL_ROOT,
            Self::Root => Order::ROOT,
            Self::Validator => Order::VALIDATOR,
            Self::Annotation => Order::ANNOTATION,
            Self::PostValidator => Order::POST_VALIDATOR,
            Self::FinalRoot => Order::FINAL_ROOT,
        }
    }

    pub const fn is_root(self) -> bool {
        matches!(self, Self::InitialRoot | Self::Root | Self::FinalRoot)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::InitialRoot => "initial_root",
            Self::Root => "root",
            Self::Validator => "validator",
            Self::Annotation => "annotation",
            Self::PostValidator => "post_validator",
            Self::FinalRoot => "final_root",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Order::INITIAL_ROOT, Some(Phase::InitialRoot))]
    #[case(Order::VALIDATOR.offset(9), Some(Phase::Validator))]
    #[case(Order::POST_VALIDATOR, Some(Phase::PostValidator))]
    #[case(Order::FINAL_ROOT.offset(3), Some(Phase::FinalRoot))]
    #[case(Order::new(60), None)]
    #[case(Order::new(-1), None)]
    fn orders_map_to_bands(#[case] order: Order, #[case] phase: Option<Phase>) {
        assert_eq!(order.phase(), phase);
    }

    #[test]
    fn band_is_half_open() {
        assert!(Order::ANNOTATION.in_band(Order::ANNOTATION));
        assert!(!Order::POST_VALIDATOR.in_band(Order::ANNOTATION));
    }
}
