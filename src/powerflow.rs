use nalgebra::Vector2;
use nalgebra_sparse::CsrMatrix;
use num_complex::Complex64;

use crate::GridError;
use crate::basic::solver::{DefaultSolver, Solve};
use crate::basic::{BusOrdering, Setpoints, SolutionState, classify, newton_pf};
use crate::model::{BranchFlow, BusRole, Element, Network, compose_y};

/// Iteration control of the Newton-Raphson solver.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Largest acceptable power mismatch, in per-unit.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Apply the Iwamoto step-length correction on every iteration instead
    /// of only as a fallback after a failed plain run.
    pub with_iwamoto: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            max_iterations: 25,
            with_iwamoto: false,
        }
    }
}

/// Outcome of one power flow evaluation.
///
/// Non-convergence is a reported result, not an error; the last state is
/// still projected onto the network so callers can inspect it.
#[derive(Debug, Clone, Copy)]
pub struct PowerFlowReport {
    pub converged: bool,
    pub iterations: usize,
    /// Whether the Iwamoto multiplier was active in the reported run.
    pub accelerated: bool,
}

/// Newton-Raphson power flow solver in polar coordinates.
///
/// Construction classifies every node from its attached components, derives
/// the per-unit base power and composes the admittance matrix; structural
/// problems abort right there. Each [`NrPolarSolver::solve`] call then
/// initializes the solution vectors (flat or warm), runs the iteration and
/// projects the result back onto the network model.
#[derive(Debug)]
pub struct NrPolarSolver {
    net: Network,
    config: SolverConfig,
    s_base: f64,
    ordering: BusOrdering,
    y_bus: CsrMatrix<Complex64>,
    state: SolutionState,
    setpoints: Setpoints,
    solver: DefaultSolver,
    has_solution: bool,
}

impl NrPolarSolver {
    pub fn new(net: Network, config: SolverConfig) -> Result<Self, GridError> {
        let mut net = net;
        log::info!(
            "initializing Newton-Raphson polar solver: {} nodes, {} elements",
            net.nodes.len(),
            net.elements.len()
        );

        let s_base = select_base_power(&net);
        let ordering = classify(&net)?;
        if ordering.slack.len() > 1 {
            return Err(GridError::MultipleSlackBuses {
                count: ordering.slack.len(),
            });
        }
        let y_bus = compose_y(&mut net, s_base)?;

        let n = net.nodes.len();
        Ok(Self {
            net,
            config,
            s_base,
            ordering,
            y_bus,
            state: SolutionState::zeros(n),
            setpoints: Setpoints::zeros(n),
            solver: DefaultSolver::default(),
            has_solution: false,
        })
    }

    pub fn network(&self) -> &Network {
        &self.net
    }

    pub fn state(&self) -> &SolutionState {
        &self.state
    }

    pub fn base_power(&self) -> f64 {
        self.s_base
    }

    pub fn ordering(&self) -> &BusOrdering {
        &self.ordering
    }

    /// Runs one power flow evaluation at `time`.
    ///
    /// With `warm_start` the voltage state of the previous evaluation is the
    /// starting point; otherwise a flat start is used. Specified injections
    /// are refreshed either way, so load profiles advance with `time`.
    ///
    /// A plain Newton run comes first. If it exhausts its iterations the
    /// whole evaluation restarts from the same initial condition with the
    /// Iwamoto multiplier enabled throughout. The final state, converged or
    /// not, is projected onto the network model.
    pub fn solve(&mut self, time: f64, warm_start: bool) -> Result<PowerFlowReport, GridError> {
        self.initialize_solution(time, warm_start && self.has_solution);
        let initial = self.state.clone();

        let mut accelerated = self.config.with_iwamoto;
        let mut outcome = newton_pf(
            &self.y_bus,
            &self.ordering,
            &mut self.state,
            &self.setpoints,
            self.config.tolerance,
            self.config.max_iterations,
            self.config.with_iwamoto,
            &mut self.solver,
        )?;

        if !outcome.converged && !self.config.with_iwamoto {
            log::info!("retrying from the initial condition with the optimal multiplier");
            self.state = initial;
            accelerated = true;
            outcome = newton_pf(
                &self.y_bus,
                &self.ordering,
                &mut self.state,
                &self.setpoints,
                self.config.tolerance,
                self.config.max_iterations,
                true,
                &mut self.solver,
            )?;
        }

        self.project_solution(outcome.converged);
        self.has_solution = true;
        Ok(PowerFlowReport {
            converged: outcome.converged,
            iterations: outcome.iterations,
            accelerated,
        })
    }

    /// Re-assigns the slack role to the named node and rebuilds the bus
    /// classification.
    pub fn set_slack_node(&mut self, name: &str) -> Result<(), GridError> {
        self.net.set_slack_node(name)?;
        self.reclassify()
    }

    /// Changes the role of the named generator or external grid and rebuilds
    /// the bus classification.
    pub fn set_element_role(&mut self, name: &str, role: BusRole) -> Result<(), GridError> {
        self.net.set_element_role(name, role);
        self.reclassify()
    }

    fn reclassify(&mut self) -> Result<(), GridError> {
        let ordering = classify(&self.net)?;
        if ordering.slack.len() > 1 {
            return Err(GridError::MultipleSlackBuses {
                count: ordering.slack.len(),
            });
        }
        self.ordering = ordering;
        self.solver.reset();
        self.has_solution = false;
        Ok(())
    }

    /// (Re)initializes the solution vectors and the specified injections.
    ///
    /// Injections accumulate per node: loads subtract their consumption, PV
    /// generators add their set-point. With `keep_last_solution` the voltage
    /// state of the previous run is carried over; set-point magnitudes are
    /// re-applied to PV and slack buses either way.
    fn initialize_solution(&mut self, time: f64, keep_last_solution: bool) {
        let state = &mut self.state;
        state.p.fill(0.0);
        state.q.fill(0.0);

        let attached = self.net.elements_at_node();
        for &pq in &self.ordering.pq {
            if !keep_last_solution {
                state.v[pq] = 1.0;
                state.d[pq] = 0.0;
            }
            for &idx in &attached[pq] {
                if let Element::Load(load) = &self.net.elements[idx] {
                    let (p, q) = load.power_at(time);
                    state.p[pq] -= p / self.s_base;
                    state.q[pq] -= q / self.s_base;
                }
            }
        }
        for &pv in &self.ordering.pv {
            if !keep_last_solution {
                state.d[pv] = 0.0;
            }
            for &idx in &attached[pv] {
                match &self.net.elements[idx] {
                    Element::Generator(r#gen) => {
                        state.p[pv] += r#gen.p_set / self.s_base;
                        state.v[pv] = r#gen.v_set;
                    }
                    Element::Load(load) => {
                        let (p, q) = load.power_at(time);
                        state.p[pv] -= p / self.s_base;
                        state.q[pv] -= q / self.s_base;
                    }
                    _ => {}
                }
            }
        }
        for &vd in &self.ordering.slack {
            state.v[vd] = 1.0;
            state.d[vd] = 0.0;
            for &idx in &attached[vd] {
                match &self.net.elements[idx] {
                    Element::ExternalGrid(ext) => {
                        state.v[vd] = ext.v_set;
                        state.d[vd] = ext.phase;
                    }
                    Element::Generator(r#gen) if r#gen.role == BusRole::VD => {
                        state.v[vd] = r#gen.v_set;
                        state.d[vd] = 0.0;
                    }
                    _ => {}
                }
            }
        }

        self.setpoints.p = state.p.clone();
        self.setpoints.q = state.q.clone();
        self.setpoints.v = state.v.clone();
    }

    /// Publishes the solved state onto the network model.
    ///
    /// Slack injections close the power balance, node voltages are scaled by
    /// the base voltage of the first branch element touching them, and every
    /// line and transformer receives its current and two-ended power flow.
    fn project_solution(&mut self, converged: bool) {
        if converged {
            self.calculate_slack_power();
        } else {
            log::warn!("projecting a non-converged state");
        }

        let attached = self.net.elements_at_node();
        for k in 0..self.net.nodes.len() {
            let mut base_voltage = 0.0;
            for &idx in &attached[k] {
                match &self.net.elements[idx] {
                    Element::Line(line) => {
                        base_voltage = line.base_voltage;
                        break;
                    }
                    Element::Transformer(trafo) => {
                        base_voltage = trafo.base_voltage_at(k).unwrap_or(0.0);
                        break;
                    }
                    _ => {}
                }
            }
            self.net.nodes[k].voltage = self.state.complex_voltage(k) * base_voltage;
            self.net.nodes[k].power = self.state.complex_power(k) * self.s_base;
        }

        self.calculate_branch_flow();
        self.calculate_nodal_injection();
    }

    /// Slack-bus injected power from the admittance-weighted neighbor
    /// voltages: `S_k = V_k * conj(sum_j Y_kj V_j)`.
    fn calculate_slack_power(&mut self) {
        for &k in &self.ordering.slack {
            let row = self.y_bus.row(k);
            let mut current = Complex64::new(0.0, 0.0);
            for (&j, y_kj) in row.col_indices().iter().zip(row.values()) {
                current += y_kj * self.state.complex_voltage(j);
            }
            let s = self.state.complex_voltage(k) * current.conj();
            self.state.p[k] = s.re;
            self.state.q[k] = s.im;
        }
    }

    fn calculate_branch_flow(&mut self) {
        let state = &self.state;
        for element in self.net.elements.iter_mut() {
            let (port, y_element, flow) = match element {
                Element::Line(line) => (&line.port, &line.y_element, &mut line.flow),
                Element::Transformer(trafo) => {
                    (&trafo.port, &trafo.y_element, &mut trafo.flow)
                }
                _ => continue,
            };
            let Some(y) = y_element else { continue };
            let v = Vector2::new(
                state.complex_voltage(port.from_node()),
                state.complex_voltage(port.to_node()),
            );
            let current = y * v;
            let power = v.component_mul(&current.conjugate());
            *flow = Some(BranchFlow { current, power });
        }
    }

    /// Stores the nodal power injection on the first line touching each
    /// node, falling back to the first transformer, so terminal-level
    /// accounting stays consistent for nodes without a line.
    fn calculate_nodal_injection(&mut self) {
        let attached = self.net.elements_at_node();
        for k in 0..self.net.nodes.len() {
            let s = self.state.complex_power(k);
            let line = attached[k].iter().find_map(|&idx| {
                matches!(self.net.elements[idx], Element::Line(_)).then_some(idx)
            });
            let target = line.or_else(|| {
                attached[k].iter().find_map(|&idx| {
                    matches!(self.net.elements[idx], Element::Transformer(_)).then_some(idx)
                })
            });
            match target.map(|idx| &mut self.net.elements[idx]) {
                Some(Element::Line(l)) => l.nodal_injection = Some(s),
                Some(Element::Transformer(t)) => t.nodal_injection = Some(s),
                _ => {}
            }
        }
    }
}

/// Derives the network base power in VA.
///
/// The smallest power of ten above the largest generator set-point, falling
/// back to transformer ratings, fixes the base; 100 kVA when neither exists.
pub fn select_base_power(net: &Network) -> f64 {
    let mut max_power = 0.0f64;
    let gens: Vec<_> = net
        .elements
        .iter()
        .filter_map(|e| match e {
            Element::Generator(r#gen) => Some(r#gen),
            _ => None,
        })
        .collect();
    if !gens.is_empty() {
        for r#gen in gens {
            max_power = max_power.max(r#gen.p_set.abs());
        }
    } else {
        for element in &net.elements {
            if let Element::Transformer(trafo) = element {
                max_power = max_power.max(trafo.rated_power);
            }
        }
    }

    if max_power != 0.0 {
        let s_base = 10f64.powi(1 + max_power.log10().floor() as i32);
        log::info!("base power = {} VA", s_base);
        s_base
    } else {
        log::warn!("no suitable quantity found for setting the base power, using 100 kVA");
        100e3
    }
}
