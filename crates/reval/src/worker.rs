//! Background worker for running analyses off the caller's thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use reval_core::goal_seek::{GoalSeekResult, ProgressCallback, SolverConfig, goal_seek};
use reval_core::monte_carlo::{SimulationConfig, SimulationResult, simulate};
use reval_core::scenarios::{
    NamedScenario, ScenarioKpis, ScenarioVariant, TriadResult, VariantOutcome, compare_scenarios,
    run_triad, run_variants,
};
use reval_core::sensitivity::{SensitivityConfig, SensitivityResult, TornadoBar, sweep, tornado};
use reval_core::{
    AnalysisError, AnalysisProgress, InputVariable, ProForma, ScenarioConfig, TargetKpi, Valuation,
};

/// Request sent to the background worker
#[derive(Debug)]
pub enum AnalysisRequest {
    GoalSeek {
        scenario: ScenarioConfig,
        config: SolverConfig,
    },
    Sweep {
        scenario: ScenarioConfig,
        config: SensitivityConfig,
    },
    Tornado {
        scenario: ScenarioConfig,
        variables: Vec<InputVariable>,
        low: f64,
        high: f64,
        kpi: TargetKpi,
    },
    Simulate {
        scenario: ScenarioConfig,
        config: SimulationConfig,
    },
    Triad {
        scenario: ScenarioConfig,
        stress_pct: f64,
    },
    Variants {
        scenario: ScenarioConfig,
        variants: Vec<ScenarioVariant>,
    },
    Compare {
        scenarios: Vec<NamedScenario>,
    },
    /// Graceful shutdown
    Shutdown,
}

impl AnalysisRequest {
    /// Short name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisRequest::GoalSeek { .. } => "goal-seek",
            AnalysisRequest::Sweep { .. } => "sweep",
            AnalysisRequest::Tornado { .. } => "tornado",
            AnalysisRequest::Simulate { .. } => "simulate",
            AnalysisRequest::Triad { .. } => "triad",
            AnalysisRequest::Variants { .. } => "variants",
            AnalysisRequest::Compare { .. } => "compare",
            AnalysisRequest::Shutdown => "shutdown",
        }
    }
}

/// Finished analysis
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    GoalSeek {
        config: SolverConfig,
        result: GoalSeekResult,
    },
    Sweep(Box<SensitivityResult>),
    Tornado {
        kpi: TargetKpi,
        low: f64,
        high: f64,
        bars: Vec<TornadoBar>,
    },
    Simulation(Box<SimulationResult>),
    Triad(TriadResult),
    Variants(Vec<VariantOutcome>),
    Compare(Vec<ScenarioKpis>),
}

/// Response from the background worker
#[derive(Debug)]
pub enum AnalysisResponse {
    /// Completion percentage, sent only when it advances
    Progress(u8),
    Complete(Box<AnalysisOutcome>),
    Cancelled,
    Error(String),
}

/// Background worker that runs analyses on a separate thread
pub struct AnalysisWorker {
    request_tx: Sender<AnalysisRequest>,
    response_rx: Receiver<AnalysisResponse>,
    cancel_flag: Arc<AtomicBool>,
    completed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
    thread: Option<JoinHandle<()>>,
}

impl AnalysisWorker {
    /// Worker evaluating scenarios with the built-in pro-forma
    pub fn new() -> Self {
        Self::with_model(Arc::new(ProForma))
    }

    pub fn with_model(model: Arc<dyn Valuation>) -> Self {
        let (request_tx, request_rx) = channel();
        let (response_tx, response_rx) = channel();
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let completed = Arc::new(AtomicUsize::new(0));
        let total = Arc::new(AtomicUsize::new(0));

        let ctx = WorkerContext {
            model,
            response_tx,
            cancel_flag: cancel_flag.clone(),
            completed: completed.clone(),
            total: total.clone(),
        };

        let thread = thread::spawn(move || {
            ctx.run(request_rx);
        });

        Self {
            request_tx,
            response_rx,
            cancel_flag,
            completed,
            total,
            thread: Some(thread),
        }
    }

    /// Queue a request. Returns false if the worker thread has gone away.
    pub fn send(&self, request: AnalysisRequest) -> bool {
        // Clear cancel flag for new work
        self.cancel_flag.store(false, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.request_tx.send(request).is_ok()
    }

    /// Wait up to `timeout` for a response. `Err` means the worker is gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<AnalysisResponse>, String> {
        match self.response_rx.recv_timeout(timeout) {
            Ok(response) => Ok(Some(response)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err("analysis worker stopped".to_string()),
        }
    }

    /// Trials finished and planned for the current sweep or simulation
    pub fn progress(&self) -> (usize, usize) {
        (
            self.completed.load(Ordering::SeqCst),
            self.total.load(Ordering::SeqCst),
        )
    }

    /// Request cancellation of the current operation
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        let _ = self.request_tx.send(AnalysisRequest::Shutdown);
    }
}

impl Default for AnalysisWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        self.cancel();
        self.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Shared state for the background worker thread.
struct WorkerContext {
    model: Arc<dyn Valuation>,
    response_tx: Sender<AnalysisResponse>,
    cancel_flag: Arc<AtomicBool>,
    completed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl WorkerContext {
    fn run(&self, request_rx: Receiver<AnalysisRequest>) {
        while let Ok(request) = request_rx.recv() {
            if let AnalysisRequest::Shutdown = request {
                break;
            }
            let kind = request.kind();
            tracing::info!(analysis = kind, "Starting analysis");

            if self.cancel_flag.load(Ordering::SeqCst) {
                let _ = self.response_tx.send(AnalysisResponse::Cancelled);
                continue;
            }

            let response = match self.execute(request) {
                Ok(outcome) => {
                    tracing::info!(analysis = kind, "Analysis complete");
                    AnalysisResponse::Complete(Box::new(outcome))
                }
                Err(AnalysisError::Cancelled) => {
                    tracing::info!(analysis = kind, "Analysis cancelled");
                    AnalysisResponse::Cancelled
                }
                Err(e) => {
                    tracing::warn!(analysis = kind, error = %e, "Analysis failed");
                    AnalysisResponse::Error(e.to_string())
                }
            };
            let _ = self.response_tx.send(response);
        }
        tracing::debug!("Analysis worker shutting down");
    }

    /// Progress shared with the caller, forwarding percentage changes
    fn progress(&self) -> AnalysisProgress {
        let tx = self.response_tx.clone();
        AnalysisProgress::from_atomics(
            self.completed.clone(),
            self.total.clone(),
            self.cancel_flag.clone(),
        )
        .with_listener(move |percent| {
            let _ = tx.send(AnalysisResponse::Progress(percent));
        })
    }

    fn execute(&self, request: AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        let model = self.model.as_ref();
        match request {
            AnalysisRequest::GoalSeek { scenario, config } => {
                let tx = self.response_tx.clone();
                let max_iterations = config.max_iterations.max(1);
                let callback: ProgressCallback = Box::new(move |iteration, input, kpi| {
                    tracing::debug!(iteration, input, kpi, "Goal-seek step");
                    let percent = (iteration * 100 / max_iterations).min(99) as u8;
                    if percent > 0 {
                        let _ = tx.send(AnalysisResponse::Progress(percent));
                    }
                });
                let result = goal_seek(model, &scenario, &config, Some(callback))?;
                tracing::info!(
                    variable = %config.input_variable,
                    value = result.value,
                    iterations = result.iterations,
                    converged = result.converged,
                    "Goal-seek finished"
                );
                Ok(AnalysisOutcome::GoalSeek { config, result })
            }
            AnalysisRequest::Sweep { scenario, config } => {
                tracing::info!(total_points = config.total_points(), "Starting sweep");
                let progress = self.progress();
                let result = sweep(model, &scenario, &config, Some(&progress))?;
                Ok(AnalysisOutcome::Sweep(Box::new(result)))
            }
            AnalysisRequest::Tornado {
                scenario,
                variables,
                low,
                high,
                kpi,
            } => {
                tracing::info!(variables = variables.len(), "Starting tornado");
                let progress = self.progress();
                let bars = tornado(
                    model,
                    &scenario,
                    &variables,
                    low,
                    high,
                    kpi,
                    Some(&progress),
                )?;
                Ok(AnalysisOutcome::Tornado {
                    kpi,
                    low,
                    high,
                    bars,
                })
            }
            AnalysisRequest::Simulate { scenario, config } => {
                tracing::info!(
                    iterations = config.iterations,
                    seed = ?config.seed,
                    variables = config.variables.len(),
                    "Starting Monte Carlo simulation"
                );
                let progress = self.progress();
                let result = simulate(model, &scenario, &config, Some(&progress))?;
                tracing::info!(seed = result.seed, samples = result.len(), "Simulation finished");
                Ok(AnalysisOutcome::Simulation(Box::new(result)))
            }
            AnalysisRequest::Triad {
                scenario,
                stress_pct,
            } => Ok(AnalysisOutcome::Triad(run_triad(model, &scenario, stress_pct)?)),
            AnalysisRequest::Variants { scenario, variants } => Ok(AnalysisOutcome::Variants(
                run_variants(model, &scenario, &variants)?,
            )),
            AnalysisRequest::Compare { scenarios } => {
                tracing::info!(scenarios = scenarios.len(), "Comparing scenarios");
                Ok(AnalysisOutcome::Compare(compare_scenarios(model, &scenarios)?))
            }
            AnalysisRequest::Shutdown => Err(AnalysisError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reval_core::model::ModelOutput;
    use reval_core::sensitivity::Range;
    use reval_core::{ModelEvaluationError, ScenarioBuilder};

    const WAIT: Duration = Duration::from_secs(30);

    fn harbor() -> ScenarioConfig {
        ScenarioBuilder::new()
            .hotel("Harbor Hotel", 100, 200.0, 0.70)
            .initial_investment(20_000_000.0)
            .senior_debt(10_000_000.0, 0.06, 25)
            .build()
    }

    /// Drain responses until a terminal one arrives
    fn finish(worker: &AnalysisWorker) -> (Vec<u8>, AnalysisResponse) {
        let mut percents = Vec::new();
        loop {
            match worker.recv_timeout(WAIT).unwrap() {
                Some(AnalysisResponse::Progress(p)) => percents.push(p),
                Some(other) => return (percents, other),
                None => panic!("worker timed out"),
            }
        }
    }

    #[test]
    fn test_simulation_reports_progress_then_result() {
        let worker = AnalysisWorker::new();
        let config = SimulationConfig::defaults_for(&harbor())
            .with_seed(4)
            .with_iterations(500);
        assert!(worker.send(AnalysisRequest::Simulate {
            scenario: harbor(),
            config,
        }));

        let (percents, response) = finish(&worker);
        match response {
            AnalysisResponse::Complete(outcome) => match *outcome {
                AnalysisOutcome::Simulation(result) => assert_eq!(result.len(), 500),
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
        // Batches finish out of order, but each percentage is sent once
        assert!(percents.contains(&100));
        let mut unique = percents.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), percents.len());
        assert_eq!(worker.progress(), (500, 500));
    }

    #[test]
    fn test_errors_come_back_as_messages() {
        let worker = AnalysisWorker::new();
        worker.send(AnalysisRequest::Triad {
            scenario: harbor(),
            stress_pct: 1.5,
        });
        match finish(&worker).1 {
            AnalysisResponse::Error(msg) => assert!(msg.contains("stress percentage")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_cancel_stops_a_running_sweep() {
        let slow = |_: &ScenarioConfig| -> Result<ModelOutput, ModelEvaluationError> {
            thread::sleep(Duration::from_millis(20));
            ProForma.evaluate(&ScenarioBuilder::new().hotel("Inn", 10, 100.0, 0.5).build())
        };
        let worker = AnalysisWorker::with_model(Arc::new(slow));
        let config = SensitivityConfig::two_way(
            InputVariable::RoomRate,
            Range::new(0.5, 1.5, 40),
            InputVariable::Occupancy,
            Range::new(0.1, 1.0, 40),
        );
        worker.send(AnalysisRequest::Sweep {
            scenario: harbor(),
            config,
        });
        thread::sleep(Duration::from_millis(100));
        worker.cancel();

        assert!(matches!(finish(&worker).1, AnalysisResponse::Cancelled));
    }

    #[test]
    fn test_worker_handles_consecutive_requests() {
        let worker = AnalysisWorker::new();
        for stress_pct in [0.1, 0.2] {
            worker.send(AnalysisRequest::Triad {
                scenario: harbor(),
                stress_pct,
            });
            match finish(&worker).1 {
                AnalysisResponse::Complete(outcome) => {
                    assert!(matches!(*outcome, AnalysisOutcome::Triad(t) if t.stress_pct == stress_pct));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
