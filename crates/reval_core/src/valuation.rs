//! The valuation pipeline interface and a compact annual pro-forma.
//!
//! Analysis engines treat valuation as a pure function of the scenario and
//! only reach it through [`Valuation`]. [`ProForma`] is the default
//! implementation used by the CLI and tests: monthly revenue by calendar days,
//! NOI after an expense ratio, a Gordon-growth terminal value, annuity or
//! interest-only debt, and a multiple-hurdle promote waterfall.

use jiff::ToSpan;
use jiff::civil::Date;

use crate::error::ModelEvaluationError;
use crate::model::{
    AnnualCashFlow, EquityRole, ModelOutput, OccupancyCurve, Operation, OperationKind,
    PartnerReturn, ScenarioConfig,
};

/// A deterministic, side-effect-free valuation of a scenario
pub trait Valuation: Send + Sync {
    fn evaluate(&self, scenario: &ScenarioConfig) -> Result<ModelOutput, ModelEvaluationError>;
}

impl<F> Valuation for F
where
    F: Fn(&ScenarioConfig) -> Result<ModelOutput, ModelEvaluationError> + Send + Sync,
{
    fn evaluate(&self, scenario: &ScenarioConfig) -> Result<ModelOutput, ModelEvaluationError> {
        self(scenario)
    }
}

/// Annual pro-forma valuation
#[derive(Debug, Clone, Copy, Default)]
pub struct ProForma;

impl Valuation for ProForma {
    fn evaluate(&self, scenario: &ScenarioConfig) -> Result<ModelOutput, ModelEvaluationError> {
        scenario
            .validate()
            .map_err(|problems| ModelEvaluationError::new(problems.join("; ")))?;

        let project = &scenario.project;
        let r = project.discount_rate;
        let g = project.terminal_growth_rate;
        if r <= g {
            return Err(ModelEvaluationError::new(format!(
                "discount rate ({r}) must exceed terminal growth rate ({g})"
            )));
        }

        let hold = project.hold_years as usize;
        let first_month = project.start_date.first_of_month();

        let mut revenue = vec![0.0; hold];
        let mut noi = vec![0.0; hold];
        for (y, (rev, net)) in revenue.iter_mut().zip(noi.iter_mut()).enumerate() {
            for op in &scenario.operations {
                let op_revenue = operation_revenue(op, first_month, y)?;
                *rev += op_revenue;
                *net += op_revenue * (1.0 - op.expense_ratio());
            }
        }

        let debt = debt_schedule(scenario, hold);
        let exit_noi = noi[hold - 1];
        let terminal_value = exit_noi * (1.0 + g) / (r - g);

        let mut unlevered = Vec::with_capacity(hold + 1);
        let mut levered = Vec::with_capacity(hold + 1);
        let equity = scenario.equity_contribution();
        unlevered.push(-project.initial_investment);
        levered.push(-equity);

        let mut annual = Vec::with_capacity(hold);
        for y in 0..hold {
            let exit = y == hold - 1;
            let unlevered_cf = noi[y] + if exit { terminal_value } else { 0.0 };
            let payoff = if exit { debt.closing_balance } else { 0.0 };
            let levered_cf = unlevered_cf - debt.service[y] - payoff;
            unlevered.push(unlevered_cf);
            levered.push(levered_cf);
            annual.push(AnnualCashFlow {
                year: (y + 1) as u16,
                revenue: revenue[y],
                net_operating_income: noi[y],
                debt_service: debt.service[y],
                unlevered_cash_flow: unlevered_cf,
                levered_cash_flow: levered_cf,
            });
        }

        let npv = present_value(&unlevered, r);
        let unlevered_irr = irr(&unlevered);
        let equity_multiple = (project.initial_investment > 0.0)
            .then(|| unlevered[1..].iter().sum::<f64>() / project.initial_investment);

        let min_dscr = (scenario.capital.total_debt() > 0.0)
            .then(|| {
                noi.iter()
                    .zip(&debt.service)
                    .filter(|(_, service)| **service > 0.0)
                    .map(|(n, service)| n / service)
                    .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
            })
            .flatten();

        let has_partners = !scenario.capital.equity.is_empty() && equity > 0.0;
        let (levered_irr, moic, partners) = if has_partners {
            let contributed: f64 = levered.iter().filter(|cf| **cf < 0.0).map(|cf| -cf).sum();
            let distributed: f64 = levered.iter().filter(|cf| **cf > 0.0).sum();
            (
                irr(&levered),
                Some(distributed / contributed),
                run_waterfall(scenario, &levered),
            )
        } else {
            (None, None, Vec::new())
        };

        Ok(ModelOutput {
            annual,
            terminal_value,
            npv,
            unlevered_irr,
            equity_multiple,
            levered_irr,
            moic,
            min_dscr,
            partners,
        })
    }
}

/// Revenue of one operation in hold year `year` (0-based)
fn operation_revenue(
    op: &Operation,
    first_month: Date,
    year: usize,
) -> Result<f64, ModelEvaluationError> {
    let growth_factor = |growth: f64| (1.0 + growth).powi(year as i32);

    let monthly = |per_day: f64, occupancy: &OccupancyCurve| -> Result<f64, ModelEvaluationError> {
        let mut total = 0.0;
        for m in 0..12 {
            let offset = (year * 12 + m) as i64;
            let date = first_month
                .checked_add(offset.months())
                .map_err(|e| ModelEvaluationError::new(format!("calendar overflow: {e}")))?;
            total += per_day * occupancy.month(date.month()) * f64::from(date.days_in_month());
        }
        Ok(total)
    };

    match &op.kind {
        OperationKind::Hotel {
            rooms,
            adr,
            occupancy,
            rate_growth,
            ..
        } => monthly(f64::from(*rooms) * adr * growth_factor(*rate_growth), occupancy),
        OperationKind::Leasing {
            leasable_area,
            annual_rent_per_unit,
            occupancy,
            rent_growth,
            ..
        } => {
            // Rent is billed by month, not by day
            let per_month = leasable_area * annual_rent_per_unit * growth_factor(*rent_growth) / 12.0;
            Ok(occupancy.0.iter().map(|occ| per_month * occ).sum())
        }
        OperationKind::Ancillary {
            annual_revenue,
            growth,
            ..
        } => Ok(annual_revenue * growth_factor(*growth)),
    }
}

struct DebtSchedule {
    service: Vec<f64>,
    closing_balance: f64,
}

fn debt_schedule(scenario: &ScenarioConfig, hold: usize) -> DebtSchedule {
    let mut service = vec![0.0; hold];
    let mut closing_balance = 0.0;

    for tranche in &scenario.capital.debt {
        let rate = tranche.interest_rate;
        let mut balance = tranche.principal;
        let payment = match tranche.amortization_years {
            0 => balance * rate,
            n if rate == 0.0 => balance / f64::from(n),
            n => balance * rate / (1.0 - (1.0 + rate).powi(-i32::from(n))),
        };

        for year_service in service.iter_mut() {
            let interest = balance * rate;
            let principal = if tranche.amortization_years == 0 {
                0.0
            } else {
                (payment - interest).clamp(0.0, balance)
            };
            balance -= principal;
            *year_service += interest + principal;
        }
        closing_balance += balance;
    }

    DebtSchedule {
        service,
        closing_balance,
    }
}

/// Present value of cash flows at t = 0, 1, 2, ...
#[must_use]
pub fn present_value(cash_flows: &[f64], rate: f64) -> f64 {
    cash_flows
        .iter()
        .enumerate()
        .map(|(t, cf)| cf / (1.0 + rate).powi(t as i32))
        .sum()
}

/// Internal rate of return by bisection; `None` without a sign change in (-99%, 1000%)
#[must_use]
pub fn irr(cash_flows: &[f64]) -> Option<f64> {
    const MAX_ITERATIONS: usize = 200;
    let (mut low, mut high) = (-0.99, 10.0);
    let mut f_low = present_value(cash_flows, low);
    let f_high = present_value(cash_flows, high);
    if !f_low.is_finite() || !f_high.is_finite() || f_low.signum() == f_high.signum() {
        return None;
    }

    for _ in 0..MAX_ITERATIONS {
        let mid = f64::midpoint(low, high);
        let f_mid = present_value(cash_flows, mid);
        if f_mid == 0.0 || (high - low) < 1e-12 {
            return Some(mid);
        }
        if f_mid.signum() == f_low.signum() {
            low = mid;
            f_low = f_mid;
        } else {
            high = mid;
        }
    }
    Some(f64::midpoint(low, high))
}

/// Split levered cash flows between equity classes.
///
/// Capital calls (negative flows) are shared pro rata. Distributions fill the
/// tiers in order; each tier runs until aggregate distributions reach its
/// multiple of aggregate contributions, with `general_share` of the tier going
/// to General classes. Cash beyond the last capped tier is shared pro rata.
fn run_waterfall(scenario: &ScenarioConfig, levered: &[f64]) -> Vec<PartnerReturn> {
    let classes = &scenario.capital.equity;
    let total_share: f64 = classes.iter().map(|c| c.share).sum();
    let weights: Vec<f64> = classes.iter().map(|c| c.share / total_share).collect();
    let general_weight: f64 = classes
        .iter()
        .zip(&weights)
        .filter(|(c, _)| c.role == EquityRole::General)
        .map(|(_, w)| w)
        .sum();
    let limited_weight = 1.0 - general_weight;

    let mut flows = vec![vec![0.0; levered.len()]; classes.len()];
    let mut contributed_total = 0.0;
    let mut distributed_total = 0.0;

    for (t, &cf) in levered.iter().enumerate() {
        if cf <= 0.0 {
            for (flow, w) in flows.iter_mut().zip(&weights) {
                flow[t] += cf * w;
            }
            contributed_total -= cf;
            continue;
        }

        let mut remaining = cf;
        for tier in &scenario.waterfall.tiers {
            if remaining <= 0.0 {
                break;
            }
            let capacity = tier.up_to_multiple.map_or(f64::INFINITY, |m| {
                (m * contributed_total - distributed_total).max(0.0)
            });
            let amount = remaining.min(capacity);
            if amount <= 0.0 {
                continue;
            }

            let general_part = if limited_weight <= 0.0 {
                amount
            } else if general_weight > 0.0 {
                amount * tier.general_share
            } else {
                0.0
            };
            let limited_part = amount - general_part;

            for ((flow, class), w) in flows.iter_mut().zip(classes).zip(&weights) {
                flow[t] += match class.role {
                    EquityRole::General => general_part * w / general_weight,
                    EquityRole::Limited => limited_part * w / limited_weight,
                };
            }
            distributed_total += amount;
            remaining -= amount;
        }

        if remaining > 0.0 {
            for (flow, w) in flows.iter_mut().zip(&weights) {
                flow[t] += remaining * w;
            }
            distributed_total += remaining;
        }
    }

    classes
        .iter()
        .zip(flows)
        .map(|(class, flow)| {
            let contributed: f64 = flow.iter().filter(|cf| **cf < 0.0).map(|cf| -cf).sum();
            let distributed: f64 = flow.iter().filter(|cf| **cf > 0.0).sum();
            PartnerReturn {
                class_id: class.id,
                contributed,
                distributed,
                irr: irr(&flow),
                multiple: (contributed > 0.0).then(|| distributed / contributed),
            }
        })
        .collect()
}
