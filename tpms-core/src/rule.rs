use serde::{Deserialize, Serialize, Serializer};

/// Rule family tag, used to enable or disable whole groups of rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleFamily {
    Byte,
    U16Le,
    U16Be,
    U24Le,
    U24Be,
}

impl RuleFamily {
    pub const ALL: [RuleFamily; 5] = [
        RuleFamily::Byte,
        RuleFamily::U16Le,
        RuleFamily::U16Be,
        RuleFamily::U24Le,
        RuleFamily::U24Be,
    ];

    /// Number of consecutive bytes a rule of this family reads.
    pub const fn width(self) -> usize {
        match self {
            RuleFamily::Byte => 1,
            RuleFamily::U16Le | RuleFamily::U16Be => 2,
            RuleFamily::U24Le | RuleFamily::U24Be => 3,
        }
    }

    pub const fn at(self, offset: usize) -> ExtractionRule {
        match self {
            RuleFamily::Byte => ExtractionRule::Byte { offset },
            RuleFamily::U16Le => ExtractionRule::U16Le { offset },
            RuleFamily::U16Be => ExtractionRule::U16Be { offset },
            RuleFamily::U24Le => ExtractionRule::U24Le { offset },
            RuleFamily::U24Be => ExtractionRule::U24Be { offset },
        }
    }
}

impl RuleFamily {
    pub const fn name(self) -> &'static str {
        match self {
            RuleFamily::Byte => "byte",
            RuleFamily::U16Le => "u16-le",
            RuleFamily::U16Be => "u16-be",
            RuleFamily::U24Le => "u24-le",
            RuleFamily::U24Be => "u24-be",
        }
    }
}

impl core::fmt::Display for RuleFamily {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

impl core::str::FromStr for RuleFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleFamily::ALL
            .into_iter()
            .find(|family| family.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<&str> = RuleFamily::ALL.iter().map(|f| f.name()).collect();
                format!("unknown rule family {s:?}, expected one of {}", known.join(", "))
            })
    }
}

/// A candidate layout for the field under investigation.
///
/// Each variant reads a fixed number of bytes starting at `offset` and
/// combines them into one unsigned raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionRule {
    /// `b[i]`
    Byte { offset: usize },
    /// `b[i] + b[i+1]*256`
    U16Le { offset: usize },
    /// `b[i+1] + b[i]*256`
    U16Be { offset: usize },
    /// `b[i] + b[i+1]*256 + b[i+2]*65536`
    U24Le { offset: usize },
    /// `b[i+2] + b[i+1]*256 + b[i]*65536`
    U24Be { offset: usize },
}

impl ExtractionRule {
    pub const fn family(&self) -> RuleFamily {
        match self {
            ExtractionRule::Byte { .. } => RuleFamily::Byte,
            ExtractionRule::U16Le { .. } => RuleFamily::U16Le,
            ExtractionRule::U16Be { .. } => RuleFamily::U16Be,
            ExtractionRule::U24Le { .. } => RuleFamily::U24Le,
            ExtractionRule::U24Be { .. } => RuleFamily::U24Be,
        }
    }

    pub const fn offset(&self) -> usize {
        match *self {
            ExtractionRule::Byte { offset }
            | ExtractionRule::U16Le { offset }
            | ExtractionRule::U16Be { offset }
            | ExtractionRule::U24Le { offset }
            | ExtractionRule::U24Be { offset } => offset,
        }
    }

    /// Whether the rule stays inside a frame of `frame_len` bytes.
    pub const fn fits(&self, frame_len: usize) -> bool {
        match self.offset().checked_add(self.family().width()) {
            Some(end) => end <= frame_len,
            None => false,
        }
    }

    /// Raw value of this field in `bytes`, or `None` if the rule reads past the end.
    pub fn apply(&self, bytes: &[u8]) -> Option<u32> {
        let offset = self.offset();
        let end = offset.checked_add(self.family().width())?;
        let field = bytes.get(offset..end)?;

        let value = match (self, field) {
            (ExtractionRule::Byte { .. }, [b0]) => u32::from(*b0),
            (ExtractionRule::U16Le { .. }, [b0, b1]) => u32::from(u16::from_le_bytes([*b0, *b1])),
            (ExtractionRule::U16Be { .. }, [b0, b1]) => u32::from(u16::from_be_bytes([*b0, *b1])),
            (ExtractionRule::U24Le { .. }, [b0, b1, b2]) => u32::from_le_bytes([*b0, *b1, *b2, 0]),
            (ExtractionRule::U24Be { .. }, [b0, b1, b2]) => u32::from_be_bytes([0, *b0, *b1, *b2]),
            _ => return None,
        };

        Some(value)
    }
}

impl core::fmt::Display for ExtractionRule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let i = self.offset();
        match self.family() {
            RuleFamily::Byte => write!(f, "b[{i}]"),
            RuleFamily::U16Le => write!(f, "b[{}:{}] LE", i, i + 1),
            RuleFamily::U16Be => write!(f, "b[{}:{}] BE", i, i + 1),
            RuleFamily::U24Le => write!(f, "b[{}:{}:{}] LE", i, i + 1, i + 2),
            RuleFamily::U24Be => write!(f, "b[{}:{}:{}] BE", i, i + 1, i + 2),
        }
    }
}

impl Serialize for ExtractionRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The catalogue of rules tried against a batch.
///
/// Enumeration order is fixed: single bytes by offset, then each 2-byte
/// offset as LE then BE, then each 3-byte offset as LE then BE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRegistry {
    families: Box<[RuleFamily]>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self {
            families: RuleFamily::ALL.into(),
        }
    }
}

impl RuleRegistry {
    /// Registry limited to `families`. Order and duplicates in the input do
    /// not affect enumeration.
    pub fn with_families<I>(families: I) -> Self
    where
        I: IntoIterator<Item = RuleFamily>,
    {
        let requested: Vec<RuleFamily> = families.into_iter().collect();
        Self {
            families: RuleFamily::ALL
                .into_iter()
                .filter(|family| requested.contains(family))
                .collect(),
        }
    }

    pub fn families(&self) -> &[RuleFamily] {
        &self.families
    }

    pub fn is_enabled(&self, family: RuleFamily) -> bool {
        self.families.contains(&family)
    }

    /// Every enabled rule that fits entirely inside a `frame_len`-byte frame.
    pub fn rules(&self, frame_len: usize) -> Vec<ExtractionRule> {
        const GROUPS: [&[RuleFamily]; 3] = [
            &[RuleFamily::Byte],
            &[RuleFamily::U16Le, RuleFamily::U16Be],
            &[RuleFamily::U24Le, RuleFamily::U24Be],
        ];

        let mut rules = Vec::new();
        for group in GROUPS {
            for offset in 0..frame_len {
                rules.extend(
                    group
                        .iter()
                        .filter(|family| self.is_enabled(**family))
                        .map(|family| family.at(offset))
                        .filter(|rule| rule.fits(frame_len)),
                );
            }
        }
        rules
    }
}
