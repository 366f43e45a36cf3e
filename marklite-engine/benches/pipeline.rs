#![allow(
  clippy::expect_used,
  clippy::unwrap_used,
  reason = "Fine in benchmarks"
)]
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use marklite_engine::{Lexer, LexerOptions, Pipeline};

const SECTION: &str = r#"## <a name="install-SECTION"></a>Install SECTION

Some **bold** text, some *emphasis*, a `code span` and a [link](https://example.com "Example").
See @System.String and <xref:System.Int32> for details.

> [!NOTE]
> Notes are blockquotes with a marker on their first line.

- first item
- second item with https://example.com/path
  - nested item

| Column | Other |
|:-------|------:|
| a      | b     |

```csharp
var x = 1;
```

# [Linux](#tab/linux)

Linux content.

# [Windows](#tab/windows)

Windows content.

---

[!code-csharp[Main](src/Program.cs#L1-L10 "Program")]

"#;

fn document(sections: usize) -> String {
  let mut out = String::from("---\ntitle: Benchmark\n---\n\n# Benchmark\n\n");
  for i in 0..sections {
    out.push_str(&SECTION.replace("SECTION", &i.to_string()));
  }
  out
}

fn bench_lexer(c: &mut Criterion) {
  let mut group = c.benchmark_group("lex");
  for sections in [1, 10, 100] {
    let source = document(sections);
    for (name, options) in [
      ("markdown", LexerOptions::markdown()),
      ("dfm", LexerOptions::dfm()),
    ] {
      let lexer = Lexer::new(options);
      group.bench_with_input(
        BenchmarkId::new(name, sections),
        &source,
        |b, source| b.iter(|| lexer.tokenize(black_box(source), None).unwrap()),
      );
    }
  }
  group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
  let pipeline = Pipeline::new(LexerOptions::dfm());
  let source = document(50);
  c.bench_function("pipeline/dfm/50", |b| {
    b.iter(|| pipeline.process(black_box(&source), Some("bench.md")).unwrap());
  });

  let batch: Vec<(String, String)> = (0..32)
    .map(|i| (format!("doc-{i}.md"), document(5)))
    .collect();
  c.bench_function("pipeline/batch/32", |b| {
    b.iter(|| pipeline.process_batch(black_box(&batch)));
  });
}

criterion_group!(benches, bench_lexer, bench_pipeline);
criterion_main!(benches);
