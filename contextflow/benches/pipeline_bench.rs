//! Benchmarks for pipeline execution.

use contextflow::config::{EngineConfig, RagConfig};
use contextflow::context::InitialState;
use contextflow::core::Message;
use contextflow::pipeline::{AssemblyParams, MessagesAssembler};
use contextflow::stages::{select_chunks, RagChunk};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn chunks(count: usize) -> Vec<RagChunk> {
    (0..count)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let similarity = (i % 100) as f64 / 100.0;
            RagChunk::new(format!("chunk {i} ").repeat(20), similarity)
        })
        .collect()
}

fn rag_selection_benchmark(c: &mut Criterion) {
    let input = chunks(500);
    let config = RagConfig::default()
        .with_min_similarity(0.3)
        .with_max_context_length(4000);

    c.bench_function("select_chunks_500", |b| {
        b.iter(|| select_chunks(black_box(&input), black_box(&config)));
    });
}

fn assembly_benchmark(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Builder::new_current_thread().build() else {
        return;
    };
    let assembler = MessagesAssembler::new(AssemblyParams {
        config: EngineConfig::default()
            .with_history_summary("Earlier turns covered travel plans.")
            .with_input_template("Question: {{text}}")
            .with_variable("city", "Lisbon"),
        rag_chunks: chunks(20),
        ..AssemblyParams::default()
    });
    let messages: Vec<Message> = (0..40)
        .map(|i| {
            if i % 2 == 0 {
                Message::user(format!("What about {{{{city}}}} on day {i}?"))
            } else {
                Message::assistant(format!("Answer {i}"))
            }
        })
        .collect();
    let state = InitialState::new("gpt-4o", "openai")
        .with_system_role("You are a travel assistant.")
        .with_messages(messages);

    c.bench_function("default_assembly_40_messages", |b| {
        b.iter(|| runtime.block_on(assembler.process(black_box(state.clone()))));
    });
}

criterion_group!(benches, rag_selection_benchmark, assembly_benchmark);
criterion_main!(benches);
