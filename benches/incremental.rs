//! Incremental compilation benchmarks
//!
//! Measures a full compile of a generated model against recompiling after
//! a single edit.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pure_core::{CompilerConfig, IncrementalCompiler};

/// One class per module extending its predecessor, plus a function using it.
fn generate_module(id: usize) -> String {
    let mut content = String::new();
    if id == 0 {
        content.push_str("Class bench::Class_0\n{\n  name: String[1];\n}\n");
    } else {
        content.push_str(&format!(
            "Class bench::Class_{} extends bench::Class_{}\n{{\n  field_{}: Integer[0..1];\n  previous: bench::Class_{}[*];\n}}\n",
            id,
            id - 1,
            id,
            id - 1
        ));
    }
    content.push_str(&format!(
        "function bench::describe_{}(c: bench::Class_{}[1]): String[1]\n{{\n  $c.name\n}}\n",
        id, id
    ));
    content
}

fn sources(size: usize) -> Vec<(String, String)> {
    (0..size).map(|i| (format!("/bench/module_{}.pure", i), generate_module(i))).collect()
}

fn compiled(size: usize) -> IncrementalCompiler {
    let mut compiler = IncrementalCompiler::new(CompilerConfig::default()).unwrap();
    for (id, text) in sources(size) {
        compiler.create_source(&id, &text).unwrap();
    }
    compiler.compile().unwrap();
    compiler
}

fn bench_full_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_compile");

    for size in [10, 50, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(compiled(size)));
        });
    }

    group.finish();
}

fn bench_incremental_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental_update");

    for size in [50, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut compiler = compiled(size);
            let last = format!("/bench/module_{}.pure", size - 1);
            let original = generate_module(size - 1);
            let mut toggle = false;

            b.iter(|| {
                // Alternate a layout-only edit of the last module with its
                // original text.
                toggle = !toggle;
                let text = if toggle { format!("// edited\n{}", original) } else { original.clone() };
                compiler.modify(&last, &text).unwrap();
                black_box(compiler.compile().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_root_change(c: &mut Criterion) {
    let mut group = c.benchmark_group("root_change");

    for size in [50, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut compiler = compiled(size);
            let root = "/bench/module_0.pure";
            let original = generate_module(0);
            let widened = "Class bench::Class_0\n{\n  name: String[1];\n  extra: Boolean[0..1];\n}\n\
                           function bench::describe_0(c: bench::Class_0[1]): String[1]\n{\n  $c.name\n}\n";
            let mut toggle = false;

            // Every class inherits from the root, so each edit revalidates the
            // whole chain.
            b.iter(|| {
                toggle = !toggle;
                let text = if toggle { widened } else { original.as_str() };
                compiler.modify(root, text).unwrap();
                black_box(compiler.compile().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_parse_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_cache");

    group.bench_function("recreate_hit", |b| {
        let mut compiler = compiled(10);
        let id = "/bench/extra.pure";
        let text = "Class bench::Extra { value: String[1]; }\n";

        b.iter(|| {
            compiler.create_source(id, text).unwrap();
            compiler.compile().unwrap();
            compiler.delete(id).unwrap();
            black_box(compiler.compile().unwrap())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_full_compile,
    bench_incremental_update,
    bench_root_change,
    bench_parse_cache,
);
criterion_main!(benches);
