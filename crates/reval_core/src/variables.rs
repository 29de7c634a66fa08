//! Input variables and the accessor that writes them into a scenario.
//!
//! Every engine mutates trial scenarios exclusively through this module, so the
//! mapping from a logical variable ("occupancy") to concrete fields ("every
//! month of every occupancy-bearing operation") lives in one place.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{Operation, OperationId, ScenarioConfig};

/// Logical inputs that analyses can vary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputVariable {
    /// ADR for hotels, rent per unit for leasing operations
    #[serde(alias = "adr")]
    RoomRate,
    Occupancy,
    DiscountRate,
    InitialInvestment,
    /// Senior tranche principal
    #[serde(alias = "debt-principal")]
    DebtAmount,
    /// Senior tranche interest rate
    InterestRate,
    TerminalGrowthRate,
}

/// How sweep and simulation values are written into the scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    /// The value replaces the field
    Absolute,
    /// The value multiplies the base field (1.0 = unchanged)
    Multiplier,
}

impl InputVariable {
    pub const ALL: [InputVariable; 7] = [
        InputVariable::RoomRate,
        InputVariable::Occupancy,
        InputVariable::DiscountRate,
        InputVariable::InitialInvestment,
        InputVariable::DebtAmount,
        InputVariable::InterestRate,
        InputVariable::TerminalGrowthRate,
    ];

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            InputVariable::RoomRate => "room-rate",
            InputVariable::Occupancy => "occupancy",
            InputVariable::DiscountRate => "discount-rate",
            InputVariable::InitialInvestment => "initial-investment",
            InputVariable::DebtAmount => "debt-amount",
            InputVariable::InterestRate => "interest-rate",
            InputVariable::TerminalGrowthRate => "terminal-growth-rate",
        }
    }

    /// Default goal-seek bracket, in absolute field units. The discount-rate
    /// floor sits above the terminal-growth ceiling so a Gordon exit value
    /// always exists.
    #[must_use]
    pub fn default_bounds(&self) -> (f64, f64) {
        match self {
            InputVariable::RoomRate => (10.0, 2_000.0),
            InputVariable::Occupancy => (0.0, 1.0),
            InputVariable::DiscountRate => (0.085, 0.30),
            InputVariable::InitialInvestment => (1_000_000.0, 1_000_000_000.0),
            InputVariable::DebtAmount => (0.0, 500_000_000.0),
            InputVariable::InterestRate => (0.0, 0.20),
            InputVariable::TerminalGrowthRate => (-0.05, 0.08),
        }
    }

    /// Values the field can physically take
    #[must_use]
    pub fn natural_domain(&self) -> (f64, f64) {
        match self {
            InputVariable::Occupancy => (0.0, 1.0),
            InputVariable::DiscountRate | InputVariable::InterestRate => (0.0, 1.0),
            InputVariable::TerminalGrowthRate => (-0.5, 0.5),
            InputVariable::RoomRate
            | InputVariable::InitialInvestment
            | InputVariable::DebtAmount => (0.0, f64::INFINITY),
        }
    }

    #[must_use]
    pub fn sweep_mode(&self) -> SweepMode {
        match self {
            InputVariable::RoomRate
            | InputVariable::InitialInvestment
            | InputVariable::DebtAmount => SweepMode::Multiplier,
            InputVariable::Occupancy
            | InputVariable::DiscountRate
            | InputVariable::InterestRate
            | InputVariable::TerminalGrowthRate => SweepMode::Absolute,
        }
    }

    /// Clip a value into the natural domain (used for sampled values)
    #[must_use]
    pub fn clip(&self, value: f64) -> f64 {
        let (min, max) = self.natural_domain();
        value.clamp(min, max)
    }
}

impl std::fmt::Display for InputVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for InputVariable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "room-rate" | "adr" | "rate" => Ok(InputVariable::RoomRate),
            "occupancy" => Ok(InputVariable::Occupancy),
            "discount-rate" => Ok(InputVariable::DiscountRate),
            "initial-investment" => Ok(InputVariable::InitialInvestment),
            "debt-amount" | "debt-principal" => Ok(InputVariable::DebtAmount),
            "interest-rate" => Ok(InputVariable::InterestRate),
            "terminal-growth-rate" => Ok(InputVariable::TerminalGrowthRate),
            other => Err(format!("unknown input variable '{other}'")),
        }
    }
}

/// Collect the operations a variable addresses, honoring the optional scope.
fn target_operations<'a>(
    config: &'a mut ScenarioConfig,
    variable: InputVariable,
    scope: Option<OperationId>,
    applies: fn(&Operation) -> bool,
) -> Result<Vec<&'a mut Operation>, ConfigError> {
    if let Some(id) = scope {
        let op = config
            .operation_mut(id)
            .ok_or(ConfigError::OperationNotFound(id))?;
        if !applies(op) {
            return Err(ConfigError::NotApplicable {
                variable,
                operation: Some(id),
            });
        }
        return Ok(vec![op]);
    }

    let ops: Vec<&mut Operation> = config
        .operations
        .iter_mut()
        .filter(|op| applies(op))
        .collect();
    if ops.is_empty() {
        return Err(ConfigError::NotApplicable {
            variable,
            operation: None,
        });
    }
    Ok(ops)
}

fn has_rate(op: &Operation) -> bool {
    op.rate().is_some()
}

fn has_occupancy(op: &Operation) -> bool {
    op.occupancy().is_some()
}

fn check_domain(variable: InputVariable, value: f64) -> Result<(), ConfigError> {
    let (min, max) = variable.natural_domain();
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::OutOfDomain {
            variable,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Write an absolute value into every field the variable addresses.
pub fn set_value(
    config: &mut ScenarioConfig,
    variable: InputVariable,
    value: f64,
    scope: Option<OperationId>,
) -> Result<(), ConfigError> {
    check_domain(variable, value)?;

    match variable {
        InputVariable::RoomRate => {
            for op in target_operations(config, variable, scope, has_rate)? {
                if let Some(rate) = op.rate_mut() {
                    *rate = value;
                }
            }
        }
        InputVariable::Occupancy => {
            for op in target_operations(config, variable, scope, has_occupancy)? {
                if let Some(curve) = op.occupancy_mut() {
                    curve.fill(value);
                }
            }
        }
        InputVariable::DiscountRate => config.project.discount_rate = value,
        InputVariable::InitialInvestment => config.project.initial_investment = value,
        InputVariable::TerminalGrowthRate => config.project.terminal_growth_rate = value,
        InputVariable::DebtAmount => {
            config
                .capital
                .senior_mut()
                .ok_or(ConfigError::NoDebtTranche { variable })?
                .principal = value;
        }
        InputVariable::InterestRate => {
            config
                .capital
                .senior_mut()
                .ok_or(ConfigError::NoDebtTranche { variable })?
                .interest_rate = value;
        }
    }
    Ok(())
}

/// Multiply every field the variable addresses by `factor`.
///
/// Occupancy is clipped to [0, 1] month by month.
pub fn scale_value(
    config: &mut ScenarioConfig,
    variable: InputVariable,
    factor: f64,
    scope: Option<OperationId>,
) -> Result<(), ConfigError> {
    if !factor.is_finite() || factor < 0.0 {
        return Err(ConfigError::OutOfDomain {
            variable,
            value: factor,
            min: 0.0,
            max: f64::INFINITY,
        });
    }

    match variable {
        InputVariable::RoomRate => {
            for op in target_operations(config, variable, scope, has_rate)? {
                if let Some(rate) = op.rate_mut() {
                    *rate *= factor;
                }
            }
        }
        InputVariable::Occupancy => {
            for op in target_operations(config, variable, scope, has_occupancy)? {
                if let Some(curve) = op.occupancy_mut() {
                    curve.scale(factor);
                }
            }
        }
        _ => {
            let current = read_value(config, variable, scope)?;
            set_value(config, variable, variable.clip(current * factor), scope)?;
        }
    }
    Ok(())
}

/// Current value of a variable. Multi-operation variables report the mean
/// across addressed operations.
pub fn read_value(
    config: &ScenarioConfig,
    variable: InputVariable,
    scope: Option<OperationId>,
) -> Result<f64, ConfigError> {
    let mean_over = |values: Vec<f64>| -> Result<f64, ConfigError> {
        if values.is_empty() {
            return Err(ConfigError::NotApplicable {
                variable,
                operation: scope,
            });
        }
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    };

    let scoped: Vec<&Operation> = match scope {
        Some(id) => vec![config
            .operation(id)
            .ok_or(ConfigError::OperationNotFound(id))?],
        None => config.operations.iter().collect(),
    };

    match variable {
        InputVariable::RoomRate => mean_over(scoped.iter().filter_map(|op| op.rate()).collect()),
        InputVariable::Occupancy => mean_over(
            scoped
                .iter()
                .filter_map(|op| op.occupancy().map(|c| c.mean()))
                .collect(),
        ),
        InputVariable::DiscountRate => Ok(config.project.discount_rate),
        InputVariable::InitialInvestment => Ok(config.project.initial_investment),
        InputVariable::TerminalGrowthRate => Ok(config.project.terminal_growth_rate),
        InputVariable::DebtAmount => config
            .capital
            .senior()
            .map(|t| t.principal)
            .ok_or(ConfigError::NoDebtTranche { variable }),
        InputVariable::InterestRate => config
            .capital
            .senior()
            .map(|t| t.interest_rate)
            .ok_or(ConfigError::NoDebtTranche { variable }),
    }
}

/// Apply a sweep/simulation value using the variable's [`SweepMode`].
pub fn apply_sweep_value(
    config: &mut ScenarioConfig,
    variable: InputVariable,
    value: f64,
    scope: Option<OperationId>,
) -> Result<(), ConfigError> {
    match variable.sweep_mode() {
        SweepMode::Absolute => set_value(config, variable, value, scope),
        SweepMode::Multiplier => scale_value(config, variable, value, scope),
    }
}

/// Check up front that a variable can be applied to this scenario, so that
/// configuration problems surface before the first model evaluation.
pub fn check_applicable(
    config: &ScenarioConfig,
    variable: InputVariable,
    scope: Option<OperationId>,
) -> Result<(), ConfigError> {
    read_value(config, variable, scope).map(|_| ())
}
