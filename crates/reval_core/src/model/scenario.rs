//! Scenario configuration tree
//!
//! A scenario is the unit of input to the valuation pipeline: property
//! operations, project parameters, capital structure and distribution rules.
//! Every type here owns its data, so `Clone` is a full deep copy. Analysis
//! engines clone the caller's scenario once per trial and mutate the clone.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use super::ids::{EquityClassId, OperationId, TrancheId};

/// Twelve monthly occupancy fractions (January..December)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccupancyCurve(pub [f64; 12]);

impl OccupancyCurve {
    /// Same occupancy in every month
    #[must_use]
    pub fn flat(value: f64) -> Self {
        Self([value; 12])
    }

    /// Occupancy for a calendar month (1-based)
    #[must_use]
    pub fn month(&self, month: i8) -> f64 {
        self.0[(month.clamp(1, 12) - 1) as usize]
    }

    /// Simple average across the twelve months
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.0.iter().sum::<f64>() / 12.0
    }

    pub fn fill(&mut self, value: f64) {
        self.0 = [value; 12];
    }

    /// Multiply every month by `factor`, clipping to [0, 1]
    pub fn scale(&mut self, factor: f64) {
        for month in &mut self.0 {
            *month = (*month * factor).clamp(0.0, 1.0);
        }
    }
}

impl Default for OccupancyCurve {
    fn default() -> Self {
        Self::flat(0.7)
    }
}

/// What an operation earns revenue from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationKind {
    /// Keyed hotel: rooms x ADR x occupancy x days in month
    Hotel {
        rooms: u32,
        /// Average daily rate in year one
        adr: f64,
        occupancy: OccupancyCurve,
        /// Operating expenses as a fraction of revenue
        expense_ratio: f64,
        /// Annual ADR growth
        #[serde(default)]
        rate_growth: f64,
    },
    /// Leased space (retail podium, offices) billed per unit of area
    Leasing {
        leasable_area: f64,
        annual_rent_per_unit: f64,
        occupancy: OccupancyCurve,
        expense_ratio: f64,
        #[serde(default)]
        rent_growth: f64,
    },
    /// Flat ancillary income (parking, events) with no occupancy or rate driver
    Ancillary {
        annual_revenue: f64,
        expense_ratio: f64,
        #[serde(default)]
        growth: f64,
    },
}

/// A revenue-producing operation within the property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub name: String,
    pub kind: OperationKind,
}

impl Operation {
    /// Mutable access to the occupancy curve, if this operation has one
    pub fn occupancy_mut(&mut self) -> Option<&mut OccupancyCurve> {
        match &mut self.kind {
            OperationKind::Hotel { occupancy, .. } | OperationKind::Leasing { occupancy, .. } => {
                Some(occupancy)
            }
            OperationKind::Ancillary { .. } => None,
        }
    }

    #[must_use]
    pub fn occupancy(&self) -> Option<&OccupancyCurve> {
        match &self.kind {
            OperationKind::Hotel { occupancy, .. } | OperationKind::Leasing { occupancy, .. } => {
                Some(occupancy)
            }
            OperationKind::Ancillary { .. } => None,
        }
    }

    /// Mutable access to the price driver (ADR for hotels, rent for leasing)
    pub fn rate_mut(&mut self) -> Option<&mut f64> {
        match &mut self.kind {
            OperationKind::Hotel { adr, .. } => Some(adr),
            OperationKind::Leasing {
                annual_rent_per_unit,
                ..
            } => Some(annual_rent_per_unit),
            OperationKind::Ancillary { .. } => None,
        }
    }

    #[must_use]
    pub fn rate(&self) -> Option<f64> {
        match &self.kind {
            OperationKind::Hotel { adr, .. } => Some(*adr),
            OperationKind::Leasing {
                annual_rent_per_unit,
                ..
            } => Some(*annual_rent_per_unit),
            OperationKind::Ancillary { .. } => None,
        }
    }

    #[must_use]
    pub fn expense_ratio(&self) -> f64 {
        match &self.kind {
            OperationKind::Hotel { expense_ratio, .. }
            | OperationKind::Leasing { expense_ratio, .. }
            | OperationKind::Ancillary { expense_ratio, .. } => *expense_ratio,
        }
    }
}

/// Project-level parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectParams {
    /// First day of operations; month boundaries drive the occupancy curve
    pub start_date: Date,
    pub hold_years: u16,
    pub discount_rate: f64,
    /// Total acquisition / development cost funded at t=0
    pub initial_investment: f64,
    /// Perpetual NOI growth after exit, used for the terminal value
    pub terminal_growth_rate: f64,
}

impl Default for ProjectParams {
    fn default() -> Self {
        Self {
            start_date: jiff::civil::date(2025, 1, 1),
            hold_years: 10,
            discount_rate: 0.10,
            initial_investment: 0.0,
            terminal_growth_rate: 0.02,
        }
    }
}

/// A single debt tranche, funded at t=0 and repaid at exit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtTranche {
    pub id: TrancheId,
    pub name: String,
    pub principal: f64,
    pub interest_rate: f64,
    /// Amortization period in years; 0 means interest-only
    #[serde(default)]
    pub amortization_years: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquityRole {
    /// Passive investor
    #[default]
    Limited,
    /// Sponsor; receives the promote
    General,
}

/// A class of equity partners sharing one set of terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityClass {
    pub id: EquityClassId,
    pub name: String,
    #[serde(default)]
    pub role: EquityRole,
    /// Share of contributed equity (normalized across classes)
    pub share: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapitalStructure {
    #[serde(default)]
    pub debt: Vec<DebtTranche>,
    #[serde(default)]
    pub equity: Vec<EquityClass>,
}

impl CapitalStructure {
    #[must_use]
    pub fn total_debt(&self) -> f64 {
        self.debt.iter().map(|t| t.principal).sum()
    }

    /// The senior tranche: the first one listed
    #[must_use]
    pub fn senior(&self) -> Option<&DebtTranche> {
        self.debt.first()
    }

    pub fn senior_mut(&mut self) -> Option<&mut DebtTranche> {
        self.debt.first_mut()
    }
}

/// One tier of the distribution waterfall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallTier {
    /// Tier applies until cumulative distributions reach this multiple of
    /// contributed equity. `None` is the residual tier.
    pub up_to_multiple: Option<f64>,
    /// Fraction of this tier's cash that goes to General classes
    pub general_share: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Waterfall {
    #[serde(default)]
    pub tiers: Vec<WaterfallTier>,
}

/// Complete scenario: the sole input of the valuation pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub name: String,
    pub project: ProjectParams,
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub capital: CapitalStructure,
    #[serde(default)]
    pub waterfall: Waterfall,
}

impl ScenarioConfig {
    #[must_use]
    pub fn operation(&self, id: OperationId) -> Option<&Operation> {
        self.operations.iter().find(|op| op.id == id)
    }

    pub fn operation_mut(&mut self, id: OperationId) -> Option<&mut Operation> {
        self.operations.iter_mut().find(|op| op.id == id)
    }

    /// Equity funded at t=0 (investment not covered by debt), floored at zero
    #[must_use]
    pub fn equity_contribution(&self) -> f64 {
        (self.project.initial_investment - self.capital.total_debt()).max(0.0)
    }

    /// Structural checks. Returns every problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.project.hold_years == 0 {
            problems.push("hold_years must be at least 1".to_string());
        }
        if !self.project.initial_investment.is_finite() || self.project.initial_investment < 0.0 {
            problems.push(format!(
                "initial_investment must be a non-negative number (got {})",
                self.project.initial_investment
            ));
        }
        if self.operations.is_empty() {
            problems.push("scenario has no operations".to_string());
        }

        let mut seen = rustc_hash::FxHashSet::default();
        for op in &self.operations {
            if !seen.insert(op.id) {
                problems.push(format!("duplicate operation id {}", op.id.0));
            }
            if let Some(curve) = op.occupancy()
                && curve.0.iter().any(|m| !(0.0..=1.0).contains(m))
            {
                problems.push(format!("operation '{}' has occupancy outside [0, 1]", op.name));
            }
            if let Some(rate) = op.rate()
                && rate < 0.0
            {
                problems.push(format!("operation '{}' has a negative rate", op.name));
            }
            if !(0.0..=1.0).contains(&op.expense_ratio()) {
                problems.push(format!(
                    "operation '{}' has expense_ratio outside [0, 1]",
                    op.name
                ));
            }
        }

        for tranche in &self.capital.debt {
            if tranche.principal < 0.0 || tranche.interest_rate < 0.0 {
                problems.push(format!(
                    "debt tranche '{}' has a negative principal or rate",
                    tranche.name
                ));
            }
        }

        if !self.capital.equity.is_empty() {
            let total_share: f64 = self.capital.equity.iter().map(|c| c.share).sum();
            if total_share <= 0.0 || self.capital.equity.iter().any(|c| c.share < 0.0) {
                problems.push("equity class shares must be non-negative and sum above 0".into());
            }
        }

        for tier in &self.waterfall.tiers {
            if !(0.0..=1.0).contains(&tier.general_share) {
                problems.push("waterfall general_share must be within [0, 1]".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}
