use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Dictionary enumeration mapping integer values to symbols.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EnumTable {
    pub name: String,
    values: BTreeMap<i64, String>,
}

impl EnumTable {
    pub fn new<I, S>(name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = (i64, S)>,
        S: Into<String>,
    {
        EnumTable {
            name: name.to_string(),
            values: values.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }

    #[must_use]
    pub fn lookup(&self, value: i64) -> Option<&str> {
        self.values.get(&value).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup() {
        let table = EnumTable::new("mode", [(0, "SAFE"), (3, "SCIENCE"), (-1, "INVALID")]);
        assert_eq!(table.lookup(3), Some("SCIENCE"));
        assert_eq!(table.lookup(-1), Some("INVALID"));
        assert_eq!(table.lookup(1), None);
        assert_eq!(table.len(), 3);
    }
}
