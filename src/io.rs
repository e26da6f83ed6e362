//! JSON network files and CSV load profiles.

use std::fs;
use std::path::Path;

use csv::ReaderBuilder;

use crate::GridError;
use crate::model::{Network, PowerProfile, ProfileSample};

/// Loads a network from a JSON file.
pub fn load_network<P: AsRef<Path>>(path: P) -> Result<Network, GridError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Parses a network from a JSON string.
pub fn network_from_json(raw: &str) -> Result<Network, GridError> {
    Ok(serde_json::from_str(raw)?)
}

/// Serializes a network to a JSON file.
pub fn save_network<P: AsRef<Path>>(path: P, net: &Network) -> Result<(), GridError> {
    fs::write(path, serde_json::to_string_pretty(net)?)?;
    Ok(())
}

/// Loads a load profile from a CSV file with `time,p,q` records.
pub fn load_profile<P: AsRef<Path>>(path: P) -> Result<PowerProfile, GridError> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut samples = Vec::new();
    for record in reader.deserialize() {
        let sample: ProfileSample = record?;
        samples.push(sample);
    }
    Ok(PowerProfile::new(samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Element;
    use crate::testcases;

    #[test]
    fn embedded_fixture_parses() {
        let net = network_from_json(testcases::TWO_BUS_JSON).unwrap();
        assert_eq!(net.nodes.len(), 2);
        assert_eq!(net.elements.len(), 3);
        let built = testcases::two_bus();
        let line = |n: &Network| {
            n.elements
                .iter()
                .find_map(|e| match e {
                    Element::Line(line) => Some(line.clone()),
                    _ => None,
                })
                .unwrap()
        };
        let parsed = line(&net);
        let reference = line(&built);
        assert_eq!(parsed.port, reference.port);
        assert!((parsed.l - reference.l).abs() < 1e-12);
    }

    #[test]
    fn network_round_trips_through_json() {
        let net = testcases::three_bus();
        let raw = serde_json::to_string(&net).unwrap();
        let back = network_from_json(&raw).unwrap();
        assert_eq!(back.nodes.len(), net.nodes.len());
        assert_eq!(back.elements.len(), net.elements.len());
        for (a, b) in net.elements.iter().zip(&back.elements) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.nodes(), b.nodes());
        }
    }

    #[test]
    fn profile_csv_parses_and_sorts() {
        let dir = std::env::temp_dir().join("gridflow-io-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("profile.csv");
        std::fs::write(&path, "time,p,q\n1.0,2000.0,400.0\n0.0,1000.0,200.0\n").unwrap();

        let profile = load_profile(&path).unwrap();
        assert_eq!(profile.at(0.5), Some((1000.0, 200.0)));
        assert_eq!(profile.at(2.0), Some((2000.0, 400.0)));
    }
}
