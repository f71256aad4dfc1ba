//! Tracking what is known about a set of boolean flags along a control flow path.
//!
//! A [`FlagAnalysis`] is an immutable dataflow fact.  Each flag of its universe is either
//! definitely true, definitely false or unknown.  Refining a fact after a branch on a flag, or
//! merging the facts of two paths at a join, always produces a new value.  The sets are persistent
//! [`im::OrdSet`]s so the copies share structure, and values may be handed to as many paths as
//! needed.

use std::{fmt, ops::BitAnd};

use im::OrdSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlagAnalysis {
    all_flags: OrdSet<String>,
    must_be_true: OrdSet<String>,
    must_be_false: OrdSet<String>,
}

impl FlagAnalysis {
    /// Create an analysis over `flags` with every flag unknown.
    pub fn new<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FlagAnalysis {
            all_flags: flags.into_iter().map(Into::into).collect(),
            must_be_true: OrdSet::new(),
            must_be_false: OrdSet::new(),
        }
    }

    /// Return a new analysis with `flag` known to be true.
    pub fn set_true(&self, flag: &str) -> Self {
        self.assert_in_universe(flag);
        FlagAnalysis {
            all_flags: self.all_flags.clone(),
            must_be_true: self.must_be_true.update(flag.to_owned()),
            must_be_false: self.must_be_false.without(flag),
        }
    }

    /// Return a new analysis with `flag` known to be false.
    pub fn set_false(&self, flag: &str) -> Self {
        self.assert_in_universe(flag);
        FlagAnalysis {
            all_flags: self.all_flags.clone(),
            must_be_true: self.must_be_true.without(flag),
            must_be_false: self.must_be_false.update(flag.to_owned()),
        }
    }

    /// Return whether `flag` must be true.
    pub fn is_definitely_true(&self, flag: &str) -> bool {
        self.assert_in_universe(flag);
        self.must_be_true.contains(flag)
    }

    /// Return whether `flag` must be false.
    pub fn is_definitely_false(&self, flag: &str) -> bool {
        self.assert_in_universe(flag);
        self.must_be_false.contains(flag)
    }

    /// Return whether nothing is known about `flag`.
    pub fn is_unknown(&self, flag: &str) -> bool {
        !self.is_definitely_true(flag) && !self.is_definitely_false(flag)
    }

    /// Iterate over the universe of flags, in sorted order.
    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.all_flags.iter().map(String::as_str)
    }

    /// Return the analysis holding only the facts both `self` and `other` agree on, as at a
    /// control flow join.
    pub fn conjunction(&self, other: &FlagAnalysis) -> FlagAnalysis {
        assert!(
            self.all_flags == other.all_flags,
            "Cannot conjoin flag analyses over different sets of flags."
        );
        FlagAnalysis {
            all_flags: self.all_flags.clone(),
            must_be_true: self.must_be_true.clone().intersection(other.must_be_true.clone()),
            must_be_false: self
                .must_be_false
                .clone()
                .intersection(other.must_be_false.clone()),
        }
    }

    fn assert_in_universe(&self, flag: &str) {
        assert!(
            self.all_flags.contains(flag),
            "Flag `{flag}` isn't tracked by this analysis."
        );
    }
}

impl BitAnd for &FlagAnalysis {
    type Output = FlagAnalysis;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.conjunction(rhs)
    }
}

impl BitAnd for FlagAnalysis {
    type Output = FlagAnalysis;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.conjunction(&rhs)
    }
}

impl fmt::Display for FlagAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for flag in &self.all_flags {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            let value = if self.must_be_true.contains(flag) {
                "true"
            } else if self.must_be_false.contains(flag) {
                "false"
            } else {
                "?"
            };
            write!(f, "{flag}={value}")?;
        }
        Ok(())
    }
}
