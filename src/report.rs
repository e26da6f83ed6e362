//! Tabular rendering of power flow results.

use std::fmt;

use tabled::{Table, Tabled, settings::Style};

use crate::model::Element;
use crate::powerflow::NrPolarSolver;

/// A wrapper around a float that limits the number of decimal places when
/// printed.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub(crate) struct FloatCell {
    value: f64,
    precision: usize,
}

impl FloatCell {
    pub fn new(value: f64, precision: usize) -> Self {
        FloatCell { value, precision }
    }
}

impl fmt::Display for FloatCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

impl fmt::Debug for FloatCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

#[derive(Debug, Tabled)]
struct BusRow {
    bus: String,
    vm_pu: FloatCell,
    va_degree: FloatCell,
    p_mw: FloatCell,
    q_mvar: FloatCell,
}

#[derive(Debug, Tabled)]
struct BranchRow {
    name: String,
    from: usize,
    to: usize,
    p_from_mw: FloatCell,
    q_from_mvar: FloatCell,
    p_to_mw: FloatCell,
    q_to_mvar: FloatCell,
    pl_mw: FloatCell,
    ql_mvar: FloatCell,
}

impl NrPolarSolver {
    /// Renders the per-bus solution (magnitude, angle, injections).
    pub fn bus_report(&self) -> String {
        let state = self.state();
        let s_base_mva = self.base_power() / 1e6;
        let rows: Vec<BusRow> = self
            .network()
            .nodes
            .iter()
            .enumerate()
            .map(|(k, node)| BusRow {
                bus: node.name.clone(),
                vm_pu: FloatCell::new(state.v[k], 5),
                va_degree: FloatCell::new(state.d[k].to_degrees(), 5),
                p_mw: FloatCell::new(state.p[k] * s_base_mva, 6),
                q_mvar: FloatCell::new(state.q[k] * s_base_mva, 6),
            })
            .collect();
        Table::new(rows).with(Style::rounded()).to_string()
    }

    /// Renders per-branch flows and losses for lines and transformers.
    pub fn branch_report(&self) -> String {
        let s_base_mva = self.base_power() / 1e6;
        let mut rows = Vec::new();
        for element in &self.network().elements {
            let (name, port, flow) = match element {
                Element::Line(line) => (&line.name, &line.port, &line.flow),
                Element::Transformer(trafo) => (&trafo.name, &trafo.port, &trafo.flow),
                _ => continue,
            };
            let Some(flow) = flow else { continue };
            rows.push(BranchRow {
                name: name.clone(),
                from: port.from_node(),
                to: port.to_node(),
                p_from_mw: FloatCell::new(flow.power[0].re * s_base_mva, 6),
                q_from_mvar: FloatCell::new(flow.power[0].im * s_base_mva, 6),
                p_to_mw: FloatCell::new(flow.power[1].re * s_base_mva, 6),
                q_to_mvar: FloatCell::new(flow.power[1].im * s_base_mva, 6),
                pl_mw: FloatCell::new((flow.power[0].re + flow.power[1].re) * s_base_mva, 6),
                ql_mvar: FloatCell::new((flow.power[0].im + flow.power[1].im) * s_base_mva, 6),
            });
        }
        Table::new(rows).with(Style::rounded()).to_string()
    }
}
