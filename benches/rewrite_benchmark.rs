use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sql_emulation::prelude::*;
use sql_emulation::rewrite::escape::escape_string;
use sql_emulation::test_utils::{connect_fake, people_server};
use std::hint::black_box;
use tokio::runtime::Runtime;

fn get_benchmark_params() -> usize {
    std::env::var("BENCH_PARAMS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(16)
}

// Deterministic INSERT template with `count` markers plus a quoted decoy.
fn insert_template(count: usize) -> String {
    let columns: Vec<String> = (0..count).map(|i| format!("c{i}")).collect();
    let markers = vec!["?"; count].join(", ");
    format!(
        "INSERT INTO bench /* 'not a ? marker' */ ({}) VALUES ({markers})",
        columns.join(", ")
    )
}

fn generate_params(count: usize) -> Vec<BoundParam> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    (0..count)
        .map(|i| match i % 4 {
            0 => BoundParam::new(RowValues::Int(rng.random_range(-1000..1000)), None),
            1 => BoundParam::new(RowValues::Float(rng.random_range(0.0..1000.0)), None),
            2 => BoundParam::new(
                RowValues::Text(format!("it's text-{} with \\ and ?", rng.random_range(1..1000))),
                None,
            ),
            _ => BoundParam::new(RowValues::Null, Some(SqlType::Varchar)),
        })
        .collect()
}

fn benchmark_rewrite(c: &mut Criterion) {
    let base = get_benchmark_params();
    let mut group = c.benchmark_group("rewrite");

    for count in [1, base, base * 8] {
        let sql = insert_template(count);
        let params = generate_params(count);
        group.throughput(Throughput::Bytes(sql.len() as u64));

        group.bench_with_input(BenchmarkId::new("count_placeholders", count), &sql, |b, sql| {
            b.iter(|| count_placeholders(black_box(sql)));
        });

        for inference in [TypeInference::Off, TypeInference::Strict] {
            group.bench_with_input(
                BenchmarkId::new(format!("rewrite_{inference:?}").to_lowercase(), count),
                &(&sql, &params),
                |b, (sql, params)| {
                    b.iter(|| rewrite(black_box(sql), black_box(params), inference, escape_string));
                },
            );
        }
    }

    group.finish();
}

fn benchmark_limit_rewrite(c: &mut Criterion) {
    let sql = "SELECT id, name FROM people WHERE name = ? ORDER BY id LIMIT ?, ?";
    let params = vec![
        BoundParam::new(RowValues::Text("o'brien".into()), None),
        BoundParam::new(RowValues::Text("10; DROP TABLE people".into()), None),
        BoundParam::new(RowValues::Int(25), None),
    ];

    c.bench_function("rewrite_limit", |b| {
        b.iter(|| rewrite(black_box(sql), black_box(&params), TypeInference::Off, escape_string));
    });
}

// Full round trip against the in-memory server, per execution path.
fn benchmark_execute(c: &mut Criterion) {
    let rt = match Runtime::new() {
        Ok(rt) => rt,
        Err(err) => panic!("tokio runtime: {err}"),
    };
    let mut group = c.benchmark_group("execute");

    for server_prepare in [false, true] {
        let label = if server_prepare { "native" } else { "emulated" };
        let server = people_server();
        let options = ConnectionOptions::builder().server_prepare(server_prepare).finish();
        let (mut conn, mut stmt) = rt
            .block_on(async {
                let mut conn = connect_fake(&server, options).await?;
                let stmt = conn
                    .prepare("SELECT name, score FROM people WHERE id = ?", StatementOptions::default())
                    .await?;
                Ok::<_, SqlEmulationError>((conn, stmt))
            })
            .unwrap_or_else(|err| panic!("setup failed: {err}"));

        let mut id = 0i64;
        group.bench_function(BenchmarkId::new("select_by_id", label), |b| {
            b.iter(|| {
                id = id % 3 + 1;
                rt.block_on(async {
                    stmt.bind(1, RowValues::Int(id), None)?;
                    stmt.execute(&mut conn).await?;
                    let rows = stmt.fetch_all(&mut conn).await?;
                    Ok::<_, SqlEmulationError>(black_box(rows.results.len()))
                })
            });
        });
        rt.block_on(async {
            let _ = stmt.destroy(&mut conn).await;
            conn.disconnect().await;
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_rewrite, benchmark_limit_rewrite, benchmark_execute);
criterion_main!(benches);
