//! Valuation outputs and the KPIs extracted from them

use serde::{Deserialize, Serialize};

use super::ids::EquityClassId;

/// One year of the pro-forma
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualCashFlow {
    pub year: u16,
    pub revenue: f64,
    pub net_operating_income: f64,
    pub debt_service: f64,
    /// NOI plus terminal value in the exit year
    pub unlevered_cash_flow: f64,
    /// Unlevered cash flow after debt service and, in the exit year, debt payoff
    pub levered_cash_flow: f64,
}

/// Returns to one equity class after the waterfall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerReturn {
    pub class_id: EquityClassId,
    pub contributed: f64,
    pub distributed: f64,
    pub irr: Option<f64>,
    pub multiple: Option<f64>,
}

/// Full output of one valuation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    pub annual: Vec<AnnualCashFlow>,
    pub terminal_value: f64,
    /// NPV of unlevered cash flows at the scenario discount rate
    pub npv: f64,
    pub unlevered_irr: Option<f64>,
    /// Unlevered inflows over the initial investment
    pub equity_multiple: Option<f64>,
    /// Partner-level IRR on aggregate equity cash flows; `None` without equity classes
    pub levered_irr: Option<f64>,
    /// Total distributions over contributed equity; `None` without equity classes
    pub moic: Option<f64>,
    /// Lowest annual NOI / debt service; `None` without debt
    pub min_dscr: Option<f64>,
    pub partners: Vec<PartnerReturn>,
}

/// KPI that a goal-seek can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKpi {
    Npv,
    UnleveredIrr,
    LeveredIrr,
    EquityMultiple,
    Moic,
}

impl TargetKpi {
    pub const ALL: [TargetKpi; 5] = [
        TargetKpi::Npv,
        TargetKpi::UnleveredIrr,
        TargetKpi::LeveredIrr,
        TargetKpi::EquityMultiple,
        TargetKpi::Moic,
    ];

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            TargetKpi::Npv => "npv",
            TargetKpi::UnleveredIrr => "unlevered-irr",
            TargetKpi::LeveredIrr => "levered-irr",
            TargetKpi::EquityMultiple => "equity-multiple",
            TargetKpi::Moic => "moic",
        }
    }
}

impl std::fmt::Display for TargetKpi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for TargetKpi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "npv" => Ok(TargetKpi::Npv),
            "unlevered-irr" | "irr" => Ok(TargetKpi::UnleveredIrr),
            "levered-irr" => Ok(TargetKpi::LeveredIrr),
            "equity-multiple" => Ok(TargetKpi::EquityMultiple),
            "moic" => Ok(TargetKpi::Moic),
            other => Err(format!("unknown KPI '{other}'")),
        }
    }
}

/// All KPIs from one trial. Compact enough to keep thousands in memory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub npv: f64,
    pub unlevered_irr: Option<f64>,
    pub equity_multiple: Option<f64>,
    pub levered_irr: Option<f64>,
    pub moic: Option<f64>,
    pub min_dscr: Option<f64>,
}

impl KpiSnapshot {
    #[must_use]
    pub fn from_output(output: &ModelOutput) -> Self {
        Self {
            npv: output.npv,
            unlevered_irr: output.unlevered_irr,
            equity_multiple: output.equity_multiple,
            levered_irr: output.levered_irr,
            moic: output.moic,
            min_dscr: output.min_dscr.filter(|v| v.is_finite()),
        }
    }

    /// Value of a target KPI, `None` if the model could not compute it or
    /// produced a non-finite number
    #[must_use]
    pub fn get(&self, kpi: TargetKpi) -> Option<f64> {
        match kpi {
            TargetKpi::Npv => Some(self.npv),
            TargetKpi::UnleveredIrr => self.unlevered_irr,
            TargetKpi::LeveredIrr => self.levered_irr,
            TargetKpi::EquityMultiple => self.equity_multiple,
            TargetKpi::Moic => self.moic,
        }
        .filter(|v| v.is_finite())
    }
}
