use nalgebra::{Matrix2, Vector2};
use nalgebra_sparse::CooMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::admittance::Port2;

/// Role a voltage-controlling component plays in the power flow problem.
///
/// `PV` holds active power and voltage magnitude, `VD` (the slack role) holds
/// voltage magnitude and angle. Loads are implicitly `PQ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusRole {
    PV,
    VD,
}

/// A time-indexed active/reactive power profile for a load.
///
/// Samples are kept sorted by time; a lookup returns the most recent sample
/// at or before the requested time, or the first sample for times before the
/// profile starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PowerProfile {
    samples: Vec<ProfileSample>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProfileSample {
    pub time: f64,
    pub p: f64,
    pub q: f64,
}

impl PowerProfile {
    pub fn new(mut samples: Vec<ProfileSample>) -> Self {
        samples.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { samples }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Active/reactive power at `time`.
    pub fn at(&self, time: f64) -> Option<(f64, f64)> {
        let mut current = self.samples.first()?;
        for sample in &self.samples {
            if sample.time > time {
                break;
            }
            current = sample;
        }
        Some((current.p, current.q))
    }
}

/// A constant-power load, optionally driven by a time profile.
///
/// Powers are in SI units (W, var), consumed from the network, so a positive
/// `p` lowers the net injection at its node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Load {
    pub name: String,
    pub node: usize,
    pub p: f64,
    pub q: f64,
    #[serde(default)]
    pub profile: Option<PowerProfile>,
}

impl Load {
    /// Consumed power at `time`, falling back to the fixed set-point when no
    /// profile is attached.
    pub fn power_at(&self, time: f64) -> (f64, f64) {
        match &self.profile {
            Some(profile) => profile.at(time).unwrap_or((self.p, self.q)),
            None => (self.p, self.q),
        }
    }
}

/// A generator with an active-power set-point and a voltage set-point.
///
/// Runs as a PV machine by default; re-assigning [`BusRole::VD`] turns it
/// into the network's voltage/angle reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
    pub name: String,
    pub node: usize,
    /// Active power set-point in W.
    pub p_set: f64,
    /// Voltage magnitude set-point in p.u.
    pub v_set: f64,
    pub role: BusRole,
}

/// An external grid injection, the usual slack source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalGrid {
    pub name: String,
    pub node: usize,
    /// Voltage magnitude set-point in p.u.
    pub v_set: f64,
    /// Reference angle in rad.
    pub phase: f64,
    pub role: BusRole,
}

impl ExternalGrid {
    pub fn new(name: impl Into<String>, node: usize) -> Self {
        Self {
            name: name.into(),
            node,
            v_set: 1.0,
            phase: 0.0,
            role: BusRole::VD,
        }
    }
}

/// Solved current and two-ended complex power flow of a branch element,
/// in per-unit, published by the post-solve projection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BranchFlow {
    /// Current at the from-end and to-end.
    pub current: Vector2<Complex64>,
    /// Complex power entering the branch at each end.
    pub power: Vector2<Complex64>,
}

/// A pi-model transmission line.
///
/// Parameters are in SI units: series resistance `r` (ohm), series
/// inductance `l` (H), total shunt capacitance `c` (F) and shunt conductance
/// `g` (S), split evenly across both ends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Line {
    pub name: String,
    pub port: Port2,
    /// Base voltage in V, used for the per-unit conversion of this line and
    /// of the nodes it touches.
    pub base_voltage: f64,
    pub r: f64,
    pub l: f64,
    pub c: f64,
    pub g: f64,
    /// Per-unit two-port admittance, fixed by [`Line::set_per_unit`].
    #[serde(default, skip)]
    pub y_element: Option<Matrix2<Complex64>>,
    #[serde(default)]
    pub flow: Option<BranchFlow>,
    #[serde(default)]
    pub nodal_injection: Option<Complex64>,
}

impl Line {
    /// Fixes the per-unit admittance of this line for the given base power
    /// and angular frequency.
    pub fn set_per_unit(&mut self, s_base: f64, omega: f64) {
        let z_base = self.base_voltage * self.base_voltage / s_base;
        let y_series = Complex64::new(z_base, 0.0) / Complex64::new(self.r, omega * self.l);
        let y_shunt = Complex64::new(self.g, omega * self.c) * z_base;
        let half = y_shunt * 0.5;
        self.y_element = Some(Matrix2::new(
            y_series + half,
            -y_series,
            -y_series,
            y_series + half,
        ));
    }

    /// Adds this line's admittance stamp to the network matrix.
    pub fn stamp(&self, y_bus: &mut CooMatrix<Complex64>) {
        stamp_two_port(y_bus, &self.port, &self.y_element.unwrap_or_default());
    }
}

/// A two-winding transformer with a complex tap ratio on the from-end.
///
/// The series impedance is referred to the from-end (end 1) voltage base.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transformer {
    pub name: String,
    pub port: Port2,
    pub base_voltage_end1: f64,
    pub base_voltage_end2: f64,
    pub ratio_abs: f64,
    pub ratio_phase: f64,
    pub r: f64,
    pub l: f64,
    /// Rated apparent power in VA, a candidate for the network power base.
    pub rated_power: f64,
    #[serde(default, skip)]
    pub y_element: Option<Matrix2<Complex64>>,
    #[serde(default)]
    pub flow: Option<BranchFlow>,
    #[serde(default)]
    pub nodal_injection: Option<Complex64>,
}

impl Transformer {
    pub fn set_per_unit(&mut self, s_base: f64, omega: f64) {
        let z_base = self.base_voltage_end1 * self.base_voltage_end1 / s_base;
        let y = Complex64::new(z_base, 0.0) / Complex64::new(self.r, omega * self.l);
        let ratio = Complex64::from_polar(self.ratio_abs, self.ratio_phase);
        self.y_element = Some(Matrix2::new(
            y / (ratio * ratio.conj()),
            -y / ratio.conj(),
            -y / ratio,
            y,
        ));
    }

    pub fn stamp(&self, y_bus: &mut CooMatrix<Complex64>) {
        stamp_two_port(y_bus, &self.port, &self.y_element.unwrap_or_default());
    }

    /// Base voltage of the winding connected to `node`, if any.
    pub fn base_voltage_at(&self, node: usize) -> Option<f64> {
        if self.port.from_node() == node {
            Some(self.base_voltage_end1)
        } else if self.port.to_node() == node {
            Some(self.base_voltage_end2)
        } else {
            None
        }
    }
}

/// A shunt element fixed to one node, with conductance and susceptance in S.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Shunt {
    pub name: String,
    pub node: usize,
    pub g: f64,
    pub b: f64,
    pub base_voltage: f64,
    #[serde(default, skip)]
    pub y_element: Option<Complex64>,
}

impl Shunt {
    pub fn set_per_unit(&mut self, s_base: f64, _omega: f64) {
        let z_base = self.base_voltage * self.base_voltage / s_base;
        self.y_element = Some(Complex64::new(self.g, self.b) * z_base);
    }

    pub fn stamp(&self, y_bus: &mut CooMatrix<Complex64>) {
        y_bus.push(self.node, self.node, self.y_element.unwrap_or_default());
    }
}

fn stamp_two_port(y_bus: &mut CooMatrix<Complex64>, port: &Port2, y: &Matrix2<Complex64>) {
    let f = port.from_node();
    let t = port.to_node();
    y_bus.push(f, f, y[(0, 0)]);
    y_bus.push(f, t, y[(0, 1)]);
    y_bus.push(t, f, y[(1, 0)]);
    y_bus.push(t, t, y[(1, 1)]);
}
