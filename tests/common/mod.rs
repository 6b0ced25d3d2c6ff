//! Shared fixtures for the integration tests

#![allow(dead_code)]

use gmlschema::{Decoder, QName, SchemaRegistry};
use std::path::PathBuf;
use std::sync::Arc;

/// Namespace of the road network fixture schema
pub const ROADS_NS: &str = "http://example.com/roads";

pub fn fixtures_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path
}

pub fn fixture(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

pub fn registry() -> Arc<SchemaRegistry> {
    Arc::new(SchemaRegistry::from_xsd_file(fixture("roads.xsd")).expect("roads.xsd should load"))
}

pub fn decoder() -> Decoder {
    Decoder::new(registry())
}

pub fn roads(local_name: &str) -> QName {
    QName::namespaced(ROADS_NS, local_name)
}

/// Wrap feature members into a road network document
pub fn network(members: &[&str]) -> String {
    let members: String = members
        .iter()
        .map(|m| format!("<gml:featureMember>{}</gml:featureMember>", m))
        .collect();
    format!(
        r#"<app:RoadNetwork xmlns:app="{}" xmlns:gml="http://www.opengis.net/gml">{}</app:RoadNetwork>"#,
        ROADS_NS, members
    )
}
