use std::{fmt::Display, num::ParseIntError, str::FromStr};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ByteCountError {
    #[error("invalid number: {0}")]
    InvalidNumber(#[from] ParseIntError),
    #[error("value '{0}' does not fit in 64 bits")]
    Overflow(String),
}

/// A size in bytes, as written by an operator: either a plain integer or a
/// number followed by one of the binary suffixes B, K, M, G or T.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteCount(pub u64);

impl From<u64> for ByteCount {
    fn from(x: u64) -> Self {
        ByteCount(x)
    }
}

impl ByteCount {
    pub fn bytes(self) -> u64 {
        self.0
    }

    pub fn to_human_readable(&self) -> String {
        match self.0.trailing_zeros() {
            _ if self.0 == 0 => "0".to_owned(),
            0..=9 => format!("{}", self.0),
            10..=19 => format!("{}K", self.0 >> 10),
            20..=29 => format!("{}M", self.0 >> 20),
            30..=39 => format!("{}G", self.0 >> 30),
            _ => format!("{}T", self.0 >> 40),
        }
    }

    pub fn from_human_readable(s: &str) -> Result<Self, ByteCountError> {
        let s = s.trim();
        let shift = |val: &str, shift: u8| -> Result<Self, ByteCountError> {
            let value = val.trim().parse::<u64>()?;
            value
                .checked_mul(1 << shift)
                .map(Self)
                .ok_or_else(|| ByteCountError::Overflow(s.to_owned()))
        };

        match s.char_indices().last() {
            Some((i, 'B')) => shift(&s[..i], 0),
            Some((i, 'K')) => shift(&s[..i], 10),
            Some((i, 'M')) => shift(&s[..i], 20),
            Some((i, 'G')) => shift(&s[..i], 30),
            Some((i, 'T')) => shift(&s[..i], 40),
            _ => shift(s, 0),
        }
    }
}

impl Display for ByteCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}

impl FromStr for ByteCount {
    type Err = ByteCountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_human_readable(s)
    }
}

impl<'de> serde::Deserialize<'de> for ByteCount {
    fn deserialize<D>(deserializer: D) -> Result<ByteCount, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Sizes come either as strings ("1K") or as bare YAML integers (1024),
        // so go through a generic value and branch on its type.
        let value = serde_yaml::Value::deserialize(deserializer)?;

        match value {
            serde_yaml::Value::String(s) => ByteCount::from_str(s.as_str())
                .map_err(|e| serde::de::Error::custom(format!("invalid byte count '{s}': {e}"))),
            serde_yaml::Value::Number(n) => {
                let n = n.as_u64().ok_or_else(|| {
                    serde::de::Error::custom("invalid byte count, expected unsigned integer")
                })?;
                Ok(ByteCount(n))
            }
            _ => Err(serde::de::Error::custom("invalid byte count")),
        }
    }
}

impl serde::Serialize for ByteCount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if self.0 & 0x3FF != 0 {
            serializer.serialize_u64(self.0)
        } else {
            serializer.serialize_str(self.to_human_readable().as_str())
        }
    }
}
