//! Benchmarks for carbonfill expansion performance.
//!
//! Run with: cargo bench
//!
//! These benchmarks expand a synthetic template against synthetic
//! organisations of growing size.

use carbonfill::model::{Block, Document, Paragraph};
use carbonfill::{expand, Backends, Carbonfill, DocxPackage, ExpandOptions, ReportContext, ReportData};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const POSTES: [&str; 8] = [
    "ELEC", "FUEL", "REACTIFS", "BOUES", "TRAVAUX", "IMMO", "TRANSPORT", "DECHETS",
];

/// Creates report data with `lots` lots, each running both activities.
fn create_context(lots: usize) -> ReportContext {
    let mut nodes =
        vec![r#"{"node_id": "ORG", "node_type": "ORG", "node_name": "Syndicat"}"#.to_string()];
    let mut emissions = Vec::new();

    for l in 0..lots {
        nodes.push(format!(
            r#"{{"node_id": "L{l}", "parent_id": "ORG", "node_type": "LOT", "node_name": "Lot {l}"}}"#
        ));
        for activity in ["EU", "AEP"] {
            let ent = format!("E{l}{activity}");
            nodes.push(format!(
                r#"{{"node_id": "{ent}", "parent_id": "L{l}", "node_type": "ENT", "node_name": "Site {ent}", "activity": "{activity}"}}"#
            ));
            for (i, poste) in POSTES.iter().enumerate() {
                emissions.push(format!(
                    r#"{{"node_id": "{ent}", "poste_l1_code": "{poste}", "scope": {}, "tco2e": {}}}"#,
                    i % 3 + 1,
                    (i + 1) as f64 * 12.5 + l as f64
                ));
            }
        }
    }

    let json = format!(
        r#"{{"year": 2024, "org_tree": [{}], "emissions": [{}]}}"#,
        nodes.join(","),
        emissions.join(",")
    );
    ReportContext::build(ReportData::from_json_str(&json).unwrap()).unwrap()
}

/// Creates the nested lot / activity / post template.
fn create_template() -> Document {
    let lines = [
        "{{ORG_NAME}} – {{annee}} : {{TOTAL_EMISSIONS}} tCO₂e",
        "[[START_LOT]]",
        "{{LOT_NAME}} : {{LOT_TOTAL}} tCO₂e ({{LOT_SHARE}} %)",
        "[[START_ACTIVITY]]",
        "{{ENT_ACTIVITY}} – {{ENTITY_TOTAL}} tCO₂e",
        "[[START_POST]]",
        "{{POST_RANK}}. {{POST_NAME}} : {{POST_TCO2E}} tCO₂e",
        "[[END_POST]]",
        "[[START_OTHER_POST]]",
        "{{OTHER_POST_NAME}}",
        "[[END_OTHER_POST]]",
        "[[END_ACTIVITY]]",
        "[[END_LOT]]",
    ];
    Document::from_blocks(
        lines
            .iter()
            .map(|l| Block::Paragraph(Paragraph::with_text(*l)))
            .collect(),
    )
}

/// Benchmark in-memory expansion at various organisation sizes.
fn bench_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("expansion");
    let template = create_template();
    let backends = Backends::default();
    let options = ExpandOptions::new().with_media(false);

    for lots in [1, 10, 50].iter() {
        let ctx = create_context(*lots);

        group.bench_function(format!("{}_lots", lots), |b| {
            b.iter(|| {
                let mut doc = template.clone();
                expand(black_box(&mut doc), &ctx, &backends, &options)
            });
        });
    }

    group.finish();
}

/// Benchmark a full render with charts, back to .docx bytes.
fn bench_package_render(c: &mut Criterion) {
    let package = DocxPackage::blank();
    let mut doc = package.document().unwrap();
    for (i, block) in create_template().body.into_iter().enumerate() {
        doc.insert(i, block);
    }
    doc.insert(
        0,
        Block::Paragraph(Paragraph::with_text("{{chart_emissions_scope_org}}")),
    );
    let template = DocxPackage::from_bytes(&package.to_bytes(&doc).unwrap()).unwrap();
    let ctx = create_context(5);
    let builder = Carbonfill::new();

    c.bench_function("render_to_docx_5_lots", |b| {
        b.iter(|| {
            builder
                .render(black_box(&template), &ctx)
                .and_then(|out| out.to_docx_bytes())
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_expansion, bench_package_render);
criterion_main!(benches);
