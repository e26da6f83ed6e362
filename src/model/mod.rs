pub mod admittance;
pub mod elements;

pub use admittance::{Port2, compose_y};
pub use elements::{
    BranchFlow, BusRole, ExternalGrid, Generator, Line, Load, PowerProfile, ProfileSample, Shunt,
    Transformer,
};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::GridError;

/// A single-phase-equivalent network node.
///
/// The solved complex voltage (in V, scaled by the node's base voltage) and
/// the solved complex power injection (in VA) are published here after a
/// power flow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default = "zero_complex")]
    pub voltage: Complex64,
    #[serde(default = "zero_complex")]
    pub power: Complex64,
}

fn zero_complex() -> Complex64 {
    Complex64::new(0.0, 0.0)
}

/// The closed set of component kinds the power flow engine understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Element {
    Load(Load),
    Generator(Generator),
    ExternalGrid(ExternalGrid),
    Line(Line),
    Transformer(Transformer),
    Shunt(Shunt),
}

impl Element {
    pub fn name(&self) -> &str {
        match self {
            Element::Load(e) => &e.name,
            Element::Generator(e) => &e.name,
            Element::ExternalGrid(e) => &e.name,
            Element::Line(e) => &e.name,
            Element::Transformer(e) => &e.name,
            Element::Shunt(e) => &e.name,
        }
    }

    /// Node indices this element is attached to.
    pub fn nodes(&self) -> (usize, Option<usize>) {
        match self {
            Element::Load(e) => (e.node, None),
            Element::Generator(e) => (e.node, None),
            Element::ExternalGrid(e) => (e.node, None),
            Element::Line(e) => (e.port.from_node(), Some(e.port.to_node())),
            Element::Transformer(e) => (e.port.from_node(), Some(e.port.to_node())),
            Element::Shunt(e) => (e.node, None),
        }
    }
}

/// Topology and component data of a network.
///
/// Nodes are referenced by index; component attributes use SI units and the
/// per-unit normalization happens inside the solver against the derived base
/// power.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    /// System frequency in Hz.
    pub frequency: f64,
    pub nodes: Vec<Node>,
    pub elements: Vec<Element>,
}

impl Network {
    pub fn new(frequency: f64) -> Self {
        Self {
            frequency,
            nodes: Vec::new(),
            elements: Vec::new(),
        }
    }

    /// System angular frequency in rad/s.
    pub fn omega(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.frequency
    }

    /// Adds a node and returns its index.
    pub fn add_node(&mut self, name: impl Into<String>) -> usize {
        self.nodes.push(Node {
            name: name.into(),
            voltage: zero_complex(),
            power: zero_complex(),
        });
        self.nodes.len() - 1
    }

    pub fn add_element(&mut self, element: Element) -> usize {
        self.elements.push(element);
        self.elements.len() - 1
    }

    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// Element indices attached to each node, in insertion order.
    pub fn elements_at_node(&self) -> Vec<Vec<usize>> {
        let mut attached = vec![Vec::new(); self.nodes.len()];
        for (idx, element) in self.elements.iter().enumerate() {
            let (a, b) = element.nodes();
            attached[a].push(idx);
            if let Some(b) = b {
                attached[b].push(idx);
            }
        }
        attached
    }

    /// Re-assigns the slack role to the named node.
    ///
    /// An external grid anywhere in the network takes precedence; otherwise
    /// a generator attached to the node is switched to the VD role. Fails if
    /// the node does not exist or no suitable source is attached.
    pub fn set_slack_node(&mut self, name: &str) -> Result<(), GridError> {
        let node = self
            .node_index(name)
            .ok_or_else(|| GridError::UnknownNode { name: name.into() })?;

        for element in self.elements.iter_mut() {
            if let Element::ExternalGrid(ext) = element {
                if ext.node == node {
                    ext.role = BusRole::VD;
                    return Ok(());
                }
            }
        }
        for element in self.elements.iter_mut() {
            if let Element::Generator(r#gen) = element {
                if r#gen.node == node {
                    r#gen.role = BusRole::VD;
                    return Ok(());
                }
            }
        }
        Err(GridError::NoSlackCandidate { node: name.into() })
    }

    /// Changes the power flow role of the named generator or external grid.
    pub fn set_element_role(&mut self, name: &str, role: BusRole) {
        for element in self.elements.iter_mut() {
            match element {
                Element::Generator(r#gen) if r#gen.name == name => r#gen.role = role,
                Element::ExternalGrid(ext) if ext.name == name => ext.role = role,
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elements_at_node_tracks_both_branch_ends() {
        let net = crate::testcases::two_bus();
        let attached = net.elements_at_node();
        // the line shows up at both of its terminals
        assert!(attached[0].len() >= 2); // external grid + line
        assert!(attached[1].len() >= 2); // load + line
    }

    #[test]
    fn slack_reassignment_prefers_external_grid() {
        let mut net = crate::testcases::three_bus();
        net.set_slack_node("bus0").unwrap();
        let ext = net
            .elements
            .iter()
            .find_map(|e| match e {
                Element::ExternalGrid(ext) => Some(ext),
                _ => None,
            })
            .unwrap();
        assert_eq!(ext.role, BusRole::VD);

        let err = net.set_slack_node("nope").unwrap_err();
        assert!(matches!(err, GridError::UnknownNode { .. }));
    }
}
