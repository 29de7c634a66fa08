//! Scenario Builder
//!
//! The ScenarioBuilder provides a fluent API for creating scenarios with
//! automatic ID assignment for operations, tranches and equity classes.
//!
//! # Example
//!
//! ```ignore
//! use reval_core::config::ScenarioBuilder;
//!
//! let scenario = ScenarioBuilder::new()
//!     .name("Harbor Hotel")
//!     .start(2025, 1, 1)
//!     .hold_years(10)
//!     .discount_rate(0.10)
//!     .initial_investment(20_000_000.0)
//!     .hotel("Harbor Hotel", 100, 200.0, 0.70)
//!     .senior_debt(10_000_000.0, 0.06, 25)
//!     .equity("Investors", EquityRole::Limited, 0.9)
//!     .equity("Sponsor", EquityRole::General, 0.1)
//!     .tier(Some(1.5), 0.1)
//!     .tier(None, 0.3)
//!     .build();
//! ```

use crate::model::{
    DebtTranche, EquityClass, EquityClassId, EquityRole, OccupancyCurve, Operation,
    OperationId, OperationKind, ScenarioConfig, TrancheId, WaterfallTier,
};

pub const DEFAULT_HOTEL_EXPENSE_RATIO: f64 = 0.65;
pub const DEFAULT_LEASING_EXPENSE_RATIO: f64 = 0.25;
pub const DEFAULT_ANCILLARY_EXPENSE_RATIO: f64 = 0.40;

/// Builder for creating scenarios with automatic ID assignment
pub struct ScenarioBuilder {
    config: ScenarioConfig,
    next_operation_id: u16,
    next_tranche_id: u16,
    next_equity_id: u16,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioBuilder {
    /// Create a new scenario builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ScenarioConfig::default(),
            next_operation_id: 1,
            next_tranche_id: 1,
            next_equity_id: 1,
        }
    }

    // =========================================================================
    // Project Parameters
    // =========================================================================

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the first day of operations
    #[must_use]
    pub fn start(mut self, year: i16, month: i8, day: i8) -> Self {
        self.config.project.start_date = jiff::civil::date(year, month, day);
        self
    }

    #[must_use]
    pub fn hold_years(mut self, years: u16) -> Self {
        self.config.project.hold_years = years;
        self
    }

    #[must_use]
    pub fn discount_rate(mut self, rate: f64) -> Self {
        self.config.project.discount_rate = rate;
        self
    }

    #[must_use]
    pub fn terminal_growth_rate(mut self, rate: f64) -> Self {
        self.config.project.terminal_growth_rate = rate;
        self
    }

    #[must_use]
    pub fn initial_investment(mut self, amount: f64) -> Self {
        self.config.project.initial_investment = amount;
        self
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Add an operation of any kind
    #[must_use]
    pub fn operation(mut self, name: impl Into<String>, kind: OperationKind) -> Self {
        let id = OperationId(self.next_operation_id);
        self.next_operation_id += 1;
        self.config.operations.push(Operation {
            id,
            name: name.into(),
            kind,
        });
        self
    }

    /// Add a hotel with flat occupancy and the default expense ratio
    #[must_use]
    pub fn hotel(self, name: impl Into<String>, rooms: u32, adr: f64, occupancy: f64) -> Self {
        self.operation(
            name,
            OperationKind::Hotel {
                rooms,
                adr,
                occupancy: OccupancyCurve::flat(occupancy),
                expense_ratio: DEFAULT_HOTEL_EXPENSE_RATIO,
                rate_growth: 0.0,
            },
        )
    }

    /// Add a hotel with a seasonal occupancy curve
    #[must_use]
    pub fn seasonal_hotel(
        self,
        name: impl Into<String>,
        rooms: u32,
        adr: f64,
        occupancy: [f64; 12],
    ) -> Self {
        self.operation(
            name,
            OperationKind::Hotel {
                rooms,
                adr,
                occupancy: OccupancyCurve(occupancy),
                expense_ratio: DEFAULT_HOTEL_EXPENSE_RATIO,
                rate_growth: 0.0,
            },
        )
    }

    #[must_use]
    pub fn leasing(
        self,
        name: impl Into<String>,
        leasable_area: f64,
        annual_rent_per_unit: f64,
        occupancy: f64,
    ) -> Self {
        self.operation(
            name,
            OperationKind::Leasing {
                leasable_area,
                annual_rent_per_unit,
                occupancy: OccupancyCurve::flat(occupancy),
                expense_ratio: DEFAULT_LEASING_EXPENSE_RATIO,
                rent_growth: 0.0,
            },
        )
    }

    #[must_use]
    pub fn ancillary(self, name: impl Into<String>, annual_revenue: f64) -> Self {
        self.operation(
            name,
            OperationKind::Ancillary {
                annual_revenue,
                expense_ratio: DEFAULT_ANCILLARY_EXPENSE_RATIO,
                growth: 0.0,
            },
        )
    }

    // =========================================================================
    // Capital Structure
    // =========================================================================

    /// Add a debt tranche. The first tranche added is the senior one.
    #[must_use]
    pub fn tranche(
        mut self,
        name: impl Into<String>,
        principal: f64,
        interest_rate: f64,
        amortization_years: u16,
    ) -> Self {
        let id = TrancheId(self.next_tranche_id);
        self.next_tranche_id += 1;
        self.config.capital.debt.push(DebtTranche {
            id,
            name: name.into(),
            principal,
            interest_rate,
            amortization_years,
        });
        self
    }

    #[must_use]
    pub fn senior_debt(self, principal: f64, interest_rate: f64, amortization_years: u16) -> Self {
        self.tranche("Senior Loan", principal, interest_rate, amortization_years)
    }

    #[must_use]
    pub fn equity(mut self, name: impl Into<String>, role: EquityRole, share: f64) -> Self {
        let id = EquityClassId(self.next_equity_id);
        self.next_equity_id += 1;
        self.config.capital.equity.push(EquityClass {
            id,
            name: name.into(),
            role,
            share,
        });
        self
    }

    /// Add a waterfall tier; `None` makes it the residual tier
    #[must_use]
    pub fn tier(mut self, up_to_multiple: Option<f64>, general_share: f64) -> Self {
        self.config.waterfall.tiers.push(WaterfallTier {
            up_to_multiple,
            general_share,
        });
        self
    }

    #[must_use]
    pub fn build(self) -> ScenarioConfig {
        self.config
    }
}
