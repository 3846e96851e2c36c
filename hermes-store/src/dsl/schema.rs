//! Field numbering for stored documents

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Field identifier (the field's number inside one store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Field(pub u32);

/// A named field bound to its number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub number: Field,
}

/// Field name ↔ number mapping of one store
///
/// Each source store of a merge carries its own `FieldInfos`; the merged
/// store gets a global one built with [`FieldInfos::merged`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FieldInfo>", into = "Vec<FieldInfo>")]
pub struct FieldInfos {
    fields: Vec<FieldInfo>,
    by_name: FxHashMap<String, usize>,
    by_number: FxHashMap<u32, usize>,
}

impl FieldInfos {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from explicit `(name, number)` pairs.
    ///
    /// Duplicate names or numbers are a caller bug and rejected.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, u32)>) -> Result<Self> {
        let mut infos = Self::new();
        for (name, number) in pairs {
            infos.insert(FieldInfo {
                name: name.to_string(),
                number: Field(number),
            })?;
        }
        Ok(infos)
    }

    /// Global numbering for a merge: fields keep their number from the
    /// first source that declares them unless it is already taken.
    pub fn merged<'a>(sources: impl IntoIterator<Item = &'a FieldInfos>) -> Self {
        let mut merged = Self::new();
        for source in sources {
            for info in source.iter() {
                if merged.field_info(&info.name).is_some() {
                    continue;
                }
                let number = if merged.field_info_by_number(info.number.0).is_none() {
                    info.number
                } else {
                    Field(merged.next_number())
                };
                merged.push(FieldInfo {
                    name: info.name.clone(),
                    number,
                });
            }
        }
        merged
    }

    pub fn insert(&mut self, info: FieldInfo) -> Result<()> {
        if self.by_name.contains_key(&info.name) {
            return Err(Error::Config(format!("duplicate field name {:?}", info.name)));
        }
        if self.by_number.contains_key(&info.number.0) {
            return Err(Error::Config(format!(
                "duplicate field number {}",
                info.number.0
            )));
        }
        self.push(info);
        Ok(())
    }

    fn push(&mut self, info: FieldInfo) {
        let idx = self.fields.len();
        self.by_name.insert(info.name.clone(), idx);
        self.by_number.insert(info.number.0, idx);
        self.fields.push(info);
    }

    fn next_number(&self) -> u32 {
        self.fields
            .iter()
            .map(|info| info.number.0 + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn field_info(&self, name: &str) -> Option<&FieldInfo> {
        self.by_name.get(name).map(|&idx| &self.fields[idx])
    }

    pub fn field_info_by_number(&self, number: u32) -> Option<&FieldInfo> {
        self.by_number.get(&number).map(|&idx| &self.fields[idx])
    }

    pub fn get_field(&self, name: &str) -> Option<Field> {
        self.field_info(name).map(|info| info.number)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl TryFrom<Vec<FieldInfo>> for FieldInfos {
    type Error = Error;

    fn try_from(fields: Vec<FieldInfo>) -> Result<Self> {
        let mut infos = Self::new();
        for info in fields {
            infos.insert(info)?;
        }
        Ok(infos)
    }
}

impl From<FieldInfos> for Vec<FieldInfo> {
    fn from(infos: FieldInfos) -> Self {
        infos.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups() {
        let infos = FieldInfos::from_pairs([("title", 0), ("body", 1)]).unwrap();
        assert_eq!(infos.get_field("title"), Some(Field(0)));
        assert_eq!(infos.len(), 2);
        assert_eq!(infos.field_info_by_number(1).unwrap().name, "body");
        assert!(infos.field_info_by_number(2).is_none());
    }

    #[test]
    fn test_from_pairs_rejects_duplicates() {
        assert!(FieldInfos::from_pairs([("x", 0), ("x", 1)]).is_err());
        assert!(FieldInfos::from_pairs([("x", 0), ("y", 0)]).is_err());
    }

    #[test]
    fn test_merged_keeps_first_numbering() {
        let a = FieldInfos::from_pairs([("x", 0), ("y", 1)]).unwrap();
        let b = FieldInfos::from_pairs([("z", 0), ("x", 1)]).unwrap();
        let merged = FieldInfos::merged([&a, &b]);
        assert_eq!(merged.get_field("x"), Some(Field(0)));
        assert_eq!(merged.get_field("y"), Some(Field(1)));
        assert_eq!(merged.get_field("z"), Some(Field(2)));
    }

    #[test]
    fn test_serde_roundtrip() {
        let infos = FieldInfos::from_pairs([("x", 0), ("y", 3)]).unwrap();
        let json = serde_json::to_string(&infos).unwrap();
        let back: FieldInfos = serde_json::from_str(&json).unwrap();
        assert_eq!(back, infos);
        assert_eq!(back.field_info_by_number(3).unwrap().name, "y");

        let dup = r#"[{"name":"x","number":0},{"name":"x","number":1}]"#;
        assert!(serde_json::from_str::<FieldInfos>(dup).is_err());
    }
}
