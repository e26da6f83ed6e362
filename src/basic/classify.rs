use crate::GridError;
use crate::model::{BusRole, Element, Network};

/// Power flow role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    /// Specified P and Q, unknown voltage magnitude and angle.
    PQ,
    /// Specified P and |V|, unknown angle and Q.
    PV,
    /// Specified |V| and angle, unknown P and Q (VD bus).
    Slack,
}

/// The frozen index partition produced by bus classification.
///
/// `pqpv` is the PQ indices followed by the PV indices, in insertion order.
/// That ordering fixes the row/column layout of the Jacobian and of the
/// unknown vector: angles for all `pqpv` entries, magnitude corrections for
/// the leading `npq` entries. Everything downstream of classification reads
/// the partition through this struct and must not reorder it.
#[derive(Debug, Clone)]
pub struct BusOrdering {
    pub pq: Vec<usize>,
    pub pv: Vec<usize>,
    pub slack: Vec<usize>,
    pub pqpv: Vec<usize>,
    unknown_pos: Vec<Option<usize>>,
}

impl BusOrdering {
    pub fn npq(&self) -> usize {
        self.pq.len()
    }

    pub fn npv(&self) -> usize {
        self.pv.len()
    }

    pub fn npqpv(&self) -> usize {
        self.pqpv.len()
    }

    /// Dimension of the unknown vector, `2*npq + npv`.
    pub fn num_unknowns(&self) -> usize {
        2 * self.npq() + self.npv()
    }

    /// Position of node `k` in the `pqpv` ordering, `None` for slack nodes.
    pub fn position(&self, k: usize) -> Option<usize> {
        self.unknown_pos[k]
    }

    pub fn bus_type(&self, k: usize) -> BusType {
        match self.unknown_pos[k] {
            Some(a) if a < self.npq() => BusType::PQ,
            Some(_) => BusType::PV,
            None => BusType::Slack,
        }
    }
}

/// Determines the power flow bus type of every node from the components
/// attached to it.
///
/// A node is PQ when only loads (or nothing) are attached, PV when a
/// PV-role generator is attached and no VD source, and slack when a VD-role
/// source stands alone. Every other combination is a topology error naming
/// the node. The classification is pure and can be re-run after a role
/// change; it always builds the partition from scratch.
pub fn classify(net: &Network) -> Result<BusOrdering, GridError> {
    let mut pq = Vec::new();
    let mut pv = Vec::new();
    let mut slack = Vec::new();

    let attached = net.elements_at_node();
    for (node, elements) in attached.iter().enumerate() {
        let mut connected_pq = false;
        let mut connected_pv = false;
        let mut connected_vd = false;

        for &idx in elements {
            match &net.elements[idx] {
                Element::Load(_) => connected_pq = true,
                Element::Generator(r#gen) => match r#gen.role {
                    BusRole::PV => connected_pv = true,
                    BusRole::VD => connected_vd = true,
                },
                Element::ExternalGrid(ext) => {
                    if ext.role == BusRole::VD {
                        connected_vd = true;
                    }
                }
                _ => {}
            }
        }

        if !connected_pv && !connected_vd {
            pq.push(node);
        } else if connected_pv && !connected_vd {
            pv.push(node);
        } else if !connected_pv && !connected_pq && connected_vd {
            slack.push(node);
        } else {
            return Err(GridError::InvalidBusRoles {
                node: net.nodes[node].name.clone(),
            });
        }
    }

    let mut pqpv = Vec::with_capacity(pq.len() + pv.len());
    pqpv.extend_from_slice(&pq);
    pqpv.extend_from_slice(&pv);

    let mut unknown_pos = vec![None; net.nodes.len()];
    for (a, &k) in pqpv.iter().enumerate() {
        unknown_pos[k] = Some(a);
    }

    log::info!("PQ: {:?}", pq);
    log::info!("PV: {:?}", pv);
    log::info!("VD: {:?}", slack);
    log::info!("PQPV: {:?}", pqpv);
    if slack.is_empty() {
        log::warn!("network has no slack bus; the problem is under-determined");
    }

    Ok(BusOrdering {
        pq,
        pv,
        slack,
        pqpv,
        unknown_pos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExternalGrid, Generator, Network};
    use crate::testcases;

    #[test]
    fn roles_are_assigned_from_attached_components() {
        let net = testcases::three_bus();
        let ordering = classify(&net).unwrap();
        assert_eq!(ordering.slack, vec![0]);
        assert_eq!(ordering.pq, vec![1]);
        assert_eq!(ordering.pv, vec![2]);
        assert_eq!(ordering.pqpv, vec![1, 2]);
        assert_eq!(ordering.num_unknowns(), 3);
        assert_eq!(ordering.bus_type(0), BusType::Slack);
        assert_eq!(ordering.bus_type(1), BusType::PQ);
        assert_eq!(ordering.bus_type(2), BusType::PV);
    }

    #[test]
    fn classification_is_idempotent() {
        let net = testcases::three_bus();
        let first = classify(&net).unwrap();
        let second = classify(&net).unwrap();
        assert_eq!(first.pqpv, second.pqpv);
        assert_eq!(first.slack, second.slack);
        for k in 0..net.nodes.len() {
            assert_eq!(first.bus_type(k), second.bus_type(k));
        }
    }

    #[test]
    fn bare_node_defaults_to_pq() {
        let mut net = testcases::two_bus();
        let extra = net.add_node("bus2");
        let ordering = classify(&net).unwrap();
        assert_eq!(ordering.bus_type(extra), BusType::PQ);
    }

    #[test]
    fn pv_generator_next_to_slack_source_is_invalid() {
        let mut net = Network::new(50.0);
        let bus = net.add_node("bus0");
        net.add_element(crate::model::Element::ExternalGrid(ExternalGrid::new(
            "grid", bus,
        )));
        net.add_element(crate::model::Element::Generator(Generator {
            name: "gen".into(),
            node: bus,
            p_set: 10e3,
            v_set: 1.0,
            role: crate::model::BusRole::PV,
        }));
        let err = classify(&net).unwrap_err();
        assert!(matches!(err, GridError::InvalidBusRoles { .. }));
    }
}
