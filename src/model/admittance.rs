use nalgebra::Vector2;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::{Element, Network};
use crate::GridError;

/// Represents the two terminals of a branch element.
///
/// `Port2` holds the node indices of the from-end and the to-end.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Port2(pub Vector2<usize>);

impl Port2 {
    pub fn new(from: usize, to: usize) -> Self {
        Self(Vector2::new(from, to))
    }

    pub fn from_node(&self) -> usize {
        self.0[0]
    }

    pub fn to_node(&self) -> usize {
        self.0[1]
    }
}

/// Composes the network admittance matrix from element stamps.
///
/// Each branch element knows the indices of the nodes it connects and
/// exposes its own per-unit admittance stamp. The network matrix is the sum
/// of all element stamps, collected as triplets and compressed at the end;
/// overlapping entries add up, which is exactly the stamping contract.
///
/// Transformers with zero series impedance are skipped. A network without a
/// single line or transformer cannot be solved and is rejected.
pub fn compose_y(net: &mut Network, s_base: f64) -> Result<CsrMatrix<Complex64>, GridError> {
    let n = net.nodes.len();
    let omega = net.omega();
    let mut triplets = CooMatrix::new(n, n);

    let mut branches = 0usize;
    for element in net.elements.iter_mut() {
        match element {
            Element::Line(line) => {
                line.set_per_unit(s_base, omega);
                line.stamp(&mut triplets);
                branches += 1;
            }
            Element::Transformer(trafo) => {
                branches += 1;
                if trafo.r == 0.0 && trafo.l == 0.0 {
                    log::info!("transformer {} ignored for R = 0 and L = 0", trafo.name);
                    continue;
                }
                trafo.set_per_unit(s_base, omega);
                trafo.stamp(&mut triplets);
            }
            Element::Shunt(shunt) => {
                shunt.set_per_unit(s_base, omega);
                shunt.stamp(&mut triplets);
            }
            _ => {}
        }
    }

    if branches == 0 {
        return Err(GridError::NoBranchElements);
    }

    Ok(CsrMatrix::from(&triplets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases;

    #[test]
    fn two_bus_line_stamp() {
        let mut net = testcases::two_bus();
        let y = compose_y(&mut net, 100e3).unwrap();

        // 10 ohm + j100 ohm on a 1000 ohm base -> 0.01 + j0.1 pu series
        let ys = Complex64::new(1.0, 0.0) / Complex64::new(0.01, 0.1);
        let y00 = y.get_entry(0, 0).unwrap().into_value();
        let y01 = y.get_entry(0, 1).unwrap().into_value();
        let y11 = y.get_entry(1, 1).unwrap().into_value();
        assert!((y00 - ys).norm() < 1e-9, "Y00 = {}", y00);
        assert!((y01 + ys).norm() < 1e-9, "Y01 = {}", y01);
        assert!((y11 - ys).norm() < 1e-9, "Y11 = {}", y11);
    }

    #[test]
    fn no_branch_elements_is_rejected() {
        let mut net = Network::new(50.0);
        net.add_node("bus0");
        let err = compose_y(&mut net, 100e3).unwrap_err();
        assert!(matches!(err, GridError::NoBranchElements));
    }

    #[test]
    fn zero_impedance_transformer_is_skipped() {
        let mut net = testcases::two_bus();
        let from = 0;
        let to = 1;
        net.elements.push(Element::Transformer(crate::model::Transformer {
            name: "t0".into(),
            port: Port2::new(from, to),
            base_voltage_end1: 10e3,
            base_voltage_end2: 10e3,
            ratio_abs: 1.0,
            ratio_phase: 0.0,
            r: 0.0,
            l: 0.0,
            rated_power: 400e3,
            y_element: None,
            flow: None,
            nodal_injection: None,
        }));
        let y = compose_y(&mut net, 100e3).unwrap();
        // the transformer must not have contributed anything
        let ys = Complex64::new(1.0, 0.0) / Complex64::new(0.01, 0.1);
        let y00 = y.get_entry(0, 0).unwrap().into_value();
        assert!((y00 - ys).norm() < 1e-9, "Y00 = {}", y00);
    }
}
