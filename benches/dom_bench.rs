#![allow(clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fmt::Write;
use xmldom::dom::{DomNode, NodeCollection};
use xmldom::engine::{HostEngine, ParseOptions};
use xmldom::{node_to_string, parse, remove_whitespace, XmlParser};

// ---------------------------------------------------------------------------
// Document generators
// ---------------------------------------------------------------------------

/// Generates a catalog with `count` indented book entries.
fn make_catalog_xml(count: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<catalog>\n");
    for i in 0..count {
        let _ = writeln!(
            xml,
            "  <book id=\"bk{i}\">\n    <title>Title {i}</title>\n    \
             <price>{}.99</price>\n  </book>",
            10 + i
        );
    }
    xml.push_str("</catalog>\n");
    xml
}

/// Generates a document that breaks near the end, so the partial tree is
/// as large as possible.
fn make_truncated_xml(count: usize) -> String {
    let mut xml = make_catalog_xml(count);
    xml.truncate(xml.len() - "</catalog>\n".len());
    xml.push_str("<oops></catalog>");
    xml
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_parse(c: &mut Criterion) {
    let small = make_catalog_xml(10);
    let large = make_catalog_xml(1000);
    c.bench_function("parse_small", |b| {
        b.iter(|| parse(black_box(&small)));
    });
    c.bench_function("parse_large", |b| {
        b.iter(|| parse(black_box(&large)));
    });
}

fn bench_parse_error(c: &mut Criterion) {
    let xml = make_truncated_xml(500);
    let gecko = XmlParser::new();
    let blink = XmlParser::new().options(ParseOptions::default().host(HostEngine::Blink));
    c.bench_function("parse_error_gecko", |b| {
        b.iter(|| gecko.parse(black_box(&xml)));
    });
    c.bench_function("parse_error_blink", |b| {
        b.iter(|| blink.parse(black_box(&xml)));
    });
}

fn bench_serialize(c: &mut Criterion) {
    let doc = parse(&make_catalog_xml(1000)).expect("catalog parses");
    c.bench_function("serialize_large", |b| {
        b.iter(|| node_to_string(black_box(&doc)));
    });
}

fn bench_remove_whitespace(c: &mut Criterion) {
    let xml = make_catalog_xml(500);
    c.bench_function("remove_whitespace", |b| {
        b.iter(|| {
            let doc = parse(&xml).expect("catalog parses");
            remove_whitespace(&doc).expect("removal succeeds");
            doc
        });
    });
}

fn bench_tag_name_lookup(c: &mut Criterion) {
    let doc = parse(&make_catalog_xml(1000)).expect("catalog parses");
    c.bench_function("elements_by_tag_name", |b| {
        b.iter(|| doc.elements_by_tag_name(black_box("title")).length());
    });
}

fn bench_build_tree(c: &mut Criterion) {
    c.bench_function("build_tree", |b| {
        b.iter(|| {
            let doc = xmldom::create_document();
            let root = doc.create_element("root").expect("valid name");
            doc.append_child(&root).expect("first element");
            for i in 0..100 {
                let item = doc.create_element("item").expect("valid name");
                item.set_attribute("n", &i.to_string()).expect("valid name");
                item.append_child(&doc.create_text_node("value"))
                    .expect("text under element");
                root.append_child(&item).expect("element under element");
            }
            doc
        });
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_parse_error,
    bench_serialize,
    bench_remove_whitespace,
    bench_tag_name_lookup,
    bench_build_tree,
);
criterion_main!(benches);
