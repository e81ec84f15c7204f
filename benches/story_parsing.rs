use brave_bunny_server::services::story_formatter::{build_prompt, parse_story_text};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn story_body(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| {
            format!(
                "Paragraph {} where the bunny hops through the meadow, meets a friendly owl \
and learns that being brave means trying even when you feel small.",
                i
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn bench_parse_story_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_story_text");

    for paragraphs in [1, 8, 32] {
        let body = story_body(paragraphs);
        let inputs = [
            ("blank_line", format!("# Title: The Brave Bunny\n\n{}", body)),
            ("first_line", format!("The Brave Bunny\n{}", body.replace("\n\n", "\n"))),
            ("fallback", body.replace("\n\n", " ")),
        ];

        for (tier, input) in inputs.iter() {
            group.bench_with_input(
                BenchmarkId::new(*tier, paragraphs),
                input,
                |b, input| b.iter(|| parse_story_text(black_box(input), black_box("Mia"))),
            );
        }
    }

    group.finish();
}

fn bench_build_prompt(c: &mut Criterion) {
    c.bench_function("build_prompt", |b| {
        b.iter(|| build_prompt(black_box("Mia"), black_box("girl"), black_box("dragons, rain")))
    });
}

criterion_group!(benches, bench_parse_story_text, bench_build_prompt);
criterion_main!(benches);
