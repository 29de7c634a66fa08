mod ids;
mod output;
mod scenario;

pub use ids::{EquityClassId, OperationId, TrancheId};
pub use output::{AnnualCashFlow, KpiSnapshot, ModelOutput, PartnerReturn, TargetKpi};
pub use scenario::{
    CapitalStructure, DebtTranche, EquityClass, EquityRole, OccupancyCurve, Operation,
    OperationKind, ProjectParams, ScenarioConfig, Waterfall, WaterfallTier,
};
