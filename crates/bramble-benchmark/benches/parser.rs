use std::hint::black_box;

use bramble::{InputEdit, LanguageHandle, load_language};
use codspeed_criterion_compat::{
    BenchmarkId, Criterion, Throughput, criterion_group, criterion_main,
};
use text_size::{TextRange, TextSize};

fn load(name: &str) -> LanguageHandle {
    let path = format!("{}/../../grammars/{name}.json", env!("CARGO_MANIFEST_DIR"));
    load_language(&std::fs::read(path).unwrap()).unwrap()
}

fn statements(count: usize) -> String {
    (0..count).map(|i| format!("x{i} = a{i} {i} b;\n# step {i}\n")).collect()
}

fn arithmetic(count: usize) -> String {
    let terms: Vec<_> = (0..count).map(|i| format!("({i} + {i}) * {i}")).collect();
    terms.join(" + ")
}

fn outline(count: usize) -> String {
    (0..count).map(|i| format!("section{i}\n  item{i}\n    detail{i}\n  item{i}\n")).collect()
}

fn benchmark_parse(c: &mut Criterion) {
    let inputs = [
        ("statements", load("statements"), statements(200)),
        ("arithmetic", load("arithmetic"), arithmetic(200)),
        ("outline", load("outline"), outline(200)),
    ];

    let mut group = c.benchmark_group("Parser Benchmark");
    for (name, language, text) in &inputs {
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", name), text, |b, text| {
            b.iter(|| black_box(language.parse(text)));
        });
    }
    group.finish();
}

fn benchmark_reparse(c: &mut Criterion) {
    let language = load("statements");
    let text = statements(200);
    let tree = language.parse(&text);

    // Rename one identifier in the middle of the file.
    let offset = text.len() / 2;
    let start = text[offset..].find('x').map_or(offset, |found| offset + found);
    let range = TextRange::at(TextSize::try_from(start).unwrap(), 1.into());
    let edit = InputEdit::from_replacement(&text, range, "renamed");
    let mut edited = text.clone();
    edited.replace_range(start..start + 1, "renamed");

    let mut group = c.benchmark_group("Reparse Benchmark");
    group.throughput(Throughput::Bytes(edited.len() as u64));
    group.bench_function("reparse_small_edit", |b| {
        b.iter(|| black_box(language.reparse(&edited, &tree, &[edit])));
    });
    group.bench_function("parse_after_edit", |b| {
        b.iter(|| black_box(language.parse(&edited)));
    });
    group.finish();
}

criterion_group!(benches, benchmark_parse, benchmark_reparse);
criterion_main!(benches);
