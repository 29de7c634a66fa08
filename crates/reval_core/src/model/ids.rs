//! Unique identifiers for scenario entities
//!
//! Each entity type has its own ID type to provide type safety and prevent
//! mixing up different kinds of identifiers.

use serde::{Deserialize, Serialize};

/// Unique identifier for an Operation (hotel, leasing block, ancillary income) within a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(pub u16);

/// Unique identifier for a debt tranche
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrancheId(pub u16);

/// Unique identifier for an equity class
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EquityClassId(pub u16);
