// tests/providers_arxiv.rs

use lab_autowatch::ingest::providers::arxiv::{parse_atom_feed, NAME};

const FEED: &str = include_str!("fixtures/arxiv_feed.xml");

#[test]
fn feed_fixture_parses_both_entries() {
    let out = parse_atom_feed(FEED).expect("parse atom");
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|a| a.source == NAME));
}

#[test]
fn entry_fields_are_normalized() {
    let a = &parse_atom_feed(FEED).unwrap()[0];
    assert_eq!(a.title, "Radium Study: Decay Chains in Practice");
    assert_eq!(a.abstract_text, "We study radium decay chains across several samples.");
    assert_eq!(a.year, "2024");
    assert_eq!(a.authors, "Marie Curie, Pierre Curie");
    // namespaced arxiv:doi is picked up by local name
    assert_eq!(a.doi, "10.1000/radium.2023.1");
    assert_eq!(a.url, "https://arxiv.org/abs/2401.01234v2");
    assert_eq!(a.pdf_url.as_deref(), Some("https://arxiv.org/pdf/2401.01234v2"));
}

#[test]
fn old_style_ids_and_author_cap() {
    let a = &parse_atom_feed(FEED).unwrap()[1];
    assert_eq!(a.url, "https://arxiv.org/abs/cond-mat/0102536v1");
    assert_eq!(a.doi, "");
    assert_eq!(a.year, "2001");
    assert_eq!(a.authors, "A. Author, B. Author, C. Author et al.");
    assert_eq!(a.abstract_text, "Short summary & more.");
}

#[test]
fn empty_feed_is_empty() {
    let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>nothing</title></feed>"#;
    assert!(parse_atom_feed(xml).unwrap().is_empty());
}
