//! Attribute and header-field search within one container.

use cask_types::{Address, ContainerId, ObjectHeader, ObjectType};

use crate::db::Metabase;
use crate::error::MetaResult;
use crate::keys;
use crate::records::{self, HeaderRecord};

/// Filter key addressing the object type header field.
pub const FILTER_TYPE: &str = "$type";
/// Filter key addressing the owner header field (hex-encoded).
pub const FILTER_OWNER: &str = "$owner";

/// Comparison applied by a [`Filter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchOp {
    /// Exact string equality.
    Equal,
    /// Value present and different.
    NotEqual,
    /// String prefix match.
    HasPrefix,
    /// Numeric greater-than (decimal-parsed).
    Gt,
    /// Numeric greater-or-equal.
    Ge,
    /// Numeric less-than.
    Lt,
    /// Numeric less-or-equal.
    Le,
}

/// One conjunct of a select query.
///
/// The key names either a header field (`$type`, `$owner`) or a user
/// attribute. A filter over an absent attribute matches nothing.
#[derive(Clone, Debug)]
pub struct Filter {
    /// Header field or attribute name.
    pub key: String,
    /// Comparison operation.
    pub op: MatchOp,
    /// Value operand.
    pub value: String,
}

impl Filter {
    /// Create a filter.
    pub fn new(key: impl Into<String>, op: MatchOp, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op,
            value: value.into(),
        }
    }
}

impl Metabase {
    /// Return the addresses in the container satisfying every filter.
    ///
    /// Result order is unspecified. Inhumed and expired addresses are
    /// excluded. An attribute-equality filter narrows the candidate set
    /// through the attribute index; otherwise the container's header range
    /// is scanned. Every candidate is verified against its stored header,
    /// so stale index entries from header overwrites cannot leak in.
    pub fn select(&self, container: &ContainerId, filters: &[Filter]) -> MetaResult<Vec<Address>> {
        let candidates = self.candidates(container, filters)?;

        let mut out = Vec::new();
        for address in candidates {
            let key = keys::address_key(&address);
            if self.trees.graveyard.get(key)?.is_some() {
                continue;
            }
            let Some(bytes) = self.trees.headers.get(key)? else {
                continue;
            };
            let record: HeaderRecord = records::decode(&bytes)?;
            if self.is_expired(record.expiration) {
                continue;
            }
            if filters.iter().all(|f| matches(&record.header, f)) {
                out.push(address);
            }
        }
        Ok(out)
    }

    /// Candidate addresses before header verification.
    fn candidates(
        &self,
        container: &ContainerId,
        filters: &[Filter],
    ) -> MetaResult<Vec<Address>> {
        // An attribute equality filter has a dedicated index range.
        if let Some(f) = filters
            .iter()
            .find(|f| f.op == MatchOp::Equal && !f.key.starts_with('$'))
        {
            let prefix = keys::attribute_prefix(container, &f.key, &f.value);
            let mut candidates = Vec::new();
            for item in self.trees.attributes.scan_prefix(prefix) {
                let (key, _) = item?;
                if let Some(object) = keys::object_from_attribute_key(&key) {
                    candidates.push(Address::new(*container, object));
                }
            }
            return Ok(candidates);
        }

        let mut candidates = Vec::new();
        for item in self
            .trees
            .headers
            .scan_prefix(keys::container_prefix(container))
        {
            let (key, _) = item?;
            if let Some(address) = keys::address_from_key(&key) {
                candidates.push(address);
            }
        }
        Ok(candidates)
    }
}

fn matches(header: &ObjectHeader, filter: &Filter) -> bool {
    let value = match filter.key.as_str() {
        FILTER_TYPE => Some(type_name(header.object_type).to_string()),
        FILTER_OWNER => Some(header.owner.to_hex()),
        key => header.attribute(key).map(str::to_string),
    };
    let Some(value) = value else {
        return false;
    };

    match filter.op {
        MatchOp::Equal => value == filter.value,
        MatchOp::NotEqual => value != filter.value,
        MatchOp::HasPrefix => value.starts_with(&filter.value),
        MatchOp::Gt | MatchOp::Ge | MatchOp::Lt | MatchOp::Le => {
            let (Ok(lhs), Ok(rhs)) = (value.parse::<u64>(), filter.value.parse::<u64>()) else {
                return false;
            };
            match filter.op {
                MatchOp::Gt => lhs > rhs,
                MatchOp::Ge => lhs >= rhs,
                MatchOp::Lt => lhs < rhs,
                MatchOp::Le => lhs <= rhs,
                _ => unreachable!("non-numeric op in numeric arm"),
            }
        }
    }
}

fn type_name(object_type: ObjectType) -> &'static str {
    match object_type {
        ObjectType::Regular => "Regular",
        ObjectType::Tombstone => "Tombstone",
        ObjectType::Lock => "Lock",
    }
}
