use std::fmt;

pub type Key = i64;
pub type Value = i64;

#[derive(Eq, Ord, PartialEq, PartialOrd, Clone, Copy, Debug)]
pub struct KeyValuePair {
    pub key: Key,
    pub value: Value,
}

impl KeyValuePair {
    pub fn new(key: Key, value: Value) -> Self {
        Self { key, value }
    }
}

impl From<(Key, Value)> for KeyValuePair {
    fn from((key, value): (Key, Value)) -> Self {
        Self { key, value }
    }
}

impl fmt::Display for KeyValuePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.value)
    }
}
