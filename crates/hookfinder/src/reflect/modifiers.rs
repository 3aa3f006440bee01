//! Access flags and include/exclude modifier masks
//!
//! Flag values follow the JVM access flags so that modifier words read from
//! class files or a runtime can be used unchanged.

use serde::{Deserialize, Serialize};

/// Modifier flags (bitflags)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modifiers(u32);

impl Modifiers {
    /// No modifiers
    pub const NONE: Self = Self(0x0000);
    /// `public`
    pub const PUBLIC: Self = Self(0x0001);
    /// `private`
    pub const PRIVATE: Self = Self(0x0002);
    /// `protected`
    pub const PROTECTED: Self = Self(0x0004);
    /// `static`
    pub const STATIC: Self = Self(0x0008);
    /// `final`
    pub const FINAL: Self = Self(0x0010);
    /// `synchronized`
    pub const SYNCHRONIZED: Self = Self(0x0020);
    /// `volatile`
    pub const VOLATILE: Self = Self(0x0040);
    /// `transient` (fields)
    pub const TRANSIENT: Self = Self(0x0080);
    /// Variable arity (methods and constructors, shares the transient bit)
    pub const VARARGS: Self = Self(0x0080);
    /// `native`
    pub const NATIVE: Self = Self(0x0100);
    /// Interface type
    pub const INTERFACE: Self = Self(0x0200);
    /// `abstract`
    pub const ABSTRACT: Self = Self(0x0400);
    /// `strictfp`
    pub const STRICT: Self = Self(0x0800);
    /// Compiler generated
    pub const SYNTHETIC: Self = Self(0x1000);
    /// Annotation type
    pub const ANNOTATION: Self = Self(0x2000);
    /// Enum type or constant
    pub const ENUM: Self = Self(0x4000);

    /// PUBLIC | PRIVATE | PROTECTED
    pub const ACCESS: Self = Self(0x0007);

    /// Create from raw bits
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Check if all flags of `other` are set
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if any flag of `other` is set
    pub const fn intersects(&self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Union of flags
    pub const fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Intersection of flags
    pub const fn intersection(&self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Difference (remove flags)
    pub const fn difference(&self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// True if no flag is set
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Parse a single modifier keyword
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Some(Self::PUBLIC),
            "private" => Some(Self::PRIVATE),
            "protected" => Some(Self::PROTECTED),
            "static" => Some(Self::STATIC),
            "final" => Some(Self::FINAL),
            "synchronized" => Some(Self::SYNCHRONIZED),
            "volatile" => Some(Self::VOLATILE),
            "transient" => Some(Self::TRANSIENT),
            "varargs" => Some(Self::VARARGS),
            "native" => Some(Self::NATIVE),
            "interface" => Some(Self::INTERFACE),
            "abstract" => Some(Self::ABSTRACT),
            "strictfp" | "strict" => Some(Self::STRICT),
            "synthetic" => Some(Self::SYNTHETIC),
            "annotation" => Some(Self::ANNOTATION),
            "enum" => Some(Self::ENUM),
            _ => None,
        }
    }

    /// Parse a whitespace separated list of modifier keywords
    pub fn parse(s: &str) -> Option<Self> {
        s.split_whitespace()
            .try_fold(Self::NONE, |acc, word| Some(acc.union(Self::from_name(word)?)))
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for Modifiers {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

/// Include/exclude constraint over a modifier word
///
/// A candidate with modifiers `m` is accepted iff every include flag is set
/// and no exclude flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModifierMask {
    include: Modifiers,
    exclude: Modifiers,
}

impl ModifierMask {
    /// Mask accepting everything
    pub const fn any() -> Self {
        Self {
            include: Modifiers::NONE,
            exclude: Modifiers::NONE,
        }
    }

    /// Build a mask from explicit include and exclude sets
    pub const fn new(include: Modifiers, exclude: Modifiers) -> Self {
        Self { include, exclude }
    }

    /// Require `flags` to be present (`set`) or absent (`!set`)
    pub fn require(&mut self, flags: Modifiers, set: bool) {
        if set {
            self.include = self.include.union(flags);
            self.exclude = self.exclude.difference(flags);
        } else {
            self.include = self.include.difference(flags);
            self.exclude = self.exclude.union(flags);
        }
    }

    /// Require package-private access (no access flag), or drop that requirement
    pub fn require_package_private(&mut self, set: bool) {
        if set {
            self.require(Modifiers::ACCESS, false);
        } else {
            self.exclude = self.exclude.difference(Modifiers::ACCESS);
        }
    }

    /// Flags that must be set
    pub fn include(&self) -> Modifiers {
        self.include
    }

    /// Flags that must be clear
    pub fn exclude(&self) -> Modifiers {
        self.exclude
    }

    /// Test a candidate's modifiers
    pub fn accepts(&self, actual: Modifiers) -> bool {
        actual.contains(self.include) && !actual.intersects(self.exclude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_modifier_ops() {
        let m = Modifiers::PUBLIC | Modifiers::STATIC;
        assert!(m.contains(Modifiers::PUBLIC));
        assert!(m.contains(Modifiers::STATIC));
        assert!(!m.contains(Modifiers::FINAL));
        assert_eq!(m.difference(Modifiers::STATIC), Modifiers::PUBLIC);
        assert_eq!(m.intersection(Modifiers::ACCESS), Modifiers::PUBLIC);
        assert!(Modifiers::NONE.is_empty());
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(
            Modifiers::parse("public static final"),
            Some(Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::FINAL)
        );
        assert_eq!(Modifiers::parse(""), Some(Modifiers::NONE));
        assert_eq!(Modifiers::parse("public bogus"), None);
        assert_eq!(Modifiers::from_name("ABSTRACT"), Some(Modifiers::ABSTRACT));
    }

    #[test]
    fn test_require_flips_between_sets() {
        let mut mask = ModifierMask::any();
        mask.require(Modifiers::STATIC, true);
        assert_eq!(mask.include(), Modifiers::STATIC);
        assert!(mask.exclude().is_empty());

        mask.require(Modifiers::STATIC, false);
        assert!(mask.include().is_empty());
        assert_eq!(mask.exclude(), Modifiers::STATIC);
    }

    #[test]
    fn test_package_private() {
        let mut mask = ModifierMask::any();
        mask.require_package_private(true);
        assert!(mask.accepts(Modifiers::STATIC));
        assert!(!mask.accepts(Modifiers::PUBLIC));
        assert!(!mask.accepts(Modifiers::PRIVATE | Modifiers::FINAL));

        mask.require_package_private(false);
        assert!(mask.accepts(Modifiers::PUBLIC));
    }

    proptest! {
        #[test]
        fn prop_mask_formula(actual in 0u32..0x8000, include in 0u32..0x8000, exclude in 0u32..0x8000) {
            let mask = ModifierMask::new(Modifiers::from_bits(include), Modifiers::from_bits(exclude));
            let expected = (actual & include) == include && (actual & exclude) == 0;
            prop_assert_eq!(mask.accepts(Modifiers::from_bits(actual)), expected);
        }
    }
}
