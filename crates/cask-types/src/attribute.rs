use serde::{Deserialize, Serialize};

/// Well-known attribute key carrying the object's expiration epoch as a
/// decimal number. Objects past this epoch are logically absent from reads.
pub const EXPIRATION_EPOCH: &str = "system.expiration-epoch";

/// A user or system attribute attached to an object header.
///
/// Attributes are searchable through `Select`; keys are free-form strings
/// except for the `system.` prefix, which is reserved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub key: String,
    /// Attribute value.
    pub value: String,
}

impl Attribute {
    /// Create an attribute from a key/value pair.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_from_strs() {
        let attr = Attribute::new("color", "red");
        assert_eq!(attr.key, "color");
        assert_eq!(attr.value, "red");
    }
}
