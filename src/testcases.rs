//! Small fixture networks used across the test suite and by examples.

use std::f64::consts::PI;

use crate::model::{
    BusRole, Element, ExternalGrid, Generator, Line, Load, Network, Port2,
};

/// 100 ohm of series reactance at 50 Hz.
fn henry_for_100_ohm() -> f64 {
    100.0 / (2.0 * PI * 50.0)
}

fn line(name: &str, from: usize, to: usize) -> Line {
    Line {
        name: name.into(),
        port: Port2::new(from, to),
        base_voltage: 10e3,
        r: 10.0,
        l: henry_for_100_ohm(),
        c: 0.0,
        g: 0.0,
        ..Default::default()
    }
}

/// An external grid at bus0 feeding a 10 kW / 2 kvar load at bus1 over a
/// 10 + j100 ohm line on a 10 kV base. With the default 100 kVA base power
/// the line is 0.01 + j0.1 pu and the load 0.1 + j0.02 pu.
pub fn two_bus() -> Network {
    let mut net = Network::new(50.0);
    let bus0 = net.add_node("bus0");
    let bus1 = net.add_node("bus1");

    net.add_element(Element::ExternalGrid(ExternalGrid::new("grid", bus0)));
    net.add_element(Element::Load(Load {
        name: "load1".into(),
        node: bus1,
        p: 10e3,
        q: 2e3,
        profile: None,
    }));
    net.add_element(Element::Line(line("line01", bus0, bus1)));
    net
}

/// Slack at bus0, a 50 kW / 10 kvar load at bus1 and a PV machine at bus2
/// (20 kW at 1.02 pu), chained over two lines.
pub fn three_bus() -> Network {
    let mut net = Network::new(50.0);
    let bus0 = net.add_node("bus0");
    let bus1 = net.add_node("bus1");
    let bus2 = net.add_node("bus2");

    net.add_element(Element::ExternalGrid(ExternalGrid::new("grid", bus0)));
    net.add_element(Element::Load(Load {
        name: "load1".into(),
        node: bus1,
        p: 50e3,
        q: 10e3,
        profile: None,
    }));
    net.add_element(Element::Generator(Generator {
        name: "gen2".into(),
        node: bus2,
        p_set: 20e3,
        v_set: 1.02,
        role: BusRole::PV,
    }));
    net.add_element(Element::Line(line("line01", bus0, bus1)));
    net.add_element(Element::Line(line("line12", bus1, bus2)));
    net
}

/// The two-bus fixture as a JSON document, as produced by the network
/// serialization.
pub const TWO_BUS_JSON: &str = r#"{
  "frequency": 50.0,
  "nodes": [
    { "name": "bus0" },
    { "name": "bus1" }
  ],
  "elements": [
    { "ExternalGrid": { "name": "grid", "node": 0, "v_set": 1.0, "phase": 0.0, "role": "VD" } },
    { "Load": { "name": "load1", "node": 1, "p": 10000.0, "q": 2000.0, "profile": null } },
    { "Line": {
        "name": "line01", "port": [0, 1], "base_voltage": 10000.0,
        "r": 10.0, "l": 0.3183098861837907, "c": 0.0, "g": 0.0,
        "flow": null, "nodal_injection": null
    } }
  ]
}"#;

