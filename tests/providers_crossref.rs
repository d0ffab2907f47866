// tests/providers_crossref.rs

use lab_autowatch::ingest::providers::crossref::{parse_works_json, NAME};
use lab_autowatch::ingest::ABSTRACT_MAX_CHARS;

const WORKS: &str = include_str!("fixtures/crossref_works.json");

#[test]
fn works_fixture_maps_items() {
    let out = parse_works_json(WORKS).expect("parse works");
    assert_eq!(out.len(), 2);

    let a = &out[0];
    assert_eq!(a.source, NAME);
    assert_eq!(a.title, "Radium isotopes in groundwater & soil");
    assert_eq!(a.doi, "10.1000/Radium.2023.1");
    assert_eq!(a.year, "2023");
    assert_eq!(a.authors, "Marie Curie, Pierre Curie");
    assert_eq!(a.url, "https://doi.org/10.1000/Radium.2023.1");
    assert_eq!(a.pdf_url.as_deref(), Some("https://doi.org/10.1000/Radium.2023.1"));
    assert_eq!(a.abstract_text.chars().count(), ABSTRACT_MAX_CHARS);
    assert!(!a.abstract_text.contains("jats"));
}

#[test]
fn item_without_doi_falls_back_to_url() {
    let a = &parse_works_json(WORKS).unwrap()[1];
    assert_eq!(a.doi, "");
    assert_eq!(a.year, "");
    assert_eq!(a.url, "https://example.org/wp/1");
    assert!(a.pdf_url.is_none());
    assert_eq!(a.authors, "Lab Collective");
}

#[test]
fn missing_message_is_an_error() {
    assert!(parse_works_json(r#"{"status":"failed"}"#).is_err());
}
