//! Load and run phases driven by concurrent worker clients.

use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use record::{Config, FieldMap, FieldSet, RecordDb, Status};

const TABLE: &str = "usertable";

/// Parameters for one workload run.
#[derive(Debug, Clone)]
pub struct Params {
    pub workers: usize,
    pub records: usize,
    pub operations: usize,
    pub read_proportion: f64,
    pub field_count: usize,
    pub field_length: usize,
}

/// Counts of operation outcomes for one phase.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhaseStats {
    pub ok: u64,
    pub not_found: u64,
    pub errors: u64,
    pub elapsed: Duration,
}

impl PhaseStats {
    fn record(&mut self, status: Status) {
        match status {
            Status::Ok => self.ok += 1,
            Status::NotFound => self.not_found += 1,
            Status::Error | Status::NotImplemented => self.errors += 1,
        }
    }

    fn merge(&mut self, other: PhaseStats) {
        self.ok += other.ok;
        self.not_found += other.not_found;
        self.errors += other.errors;
    }

    fn total(&self) -> u64 {
        self.ok + self.not_found + self.errors
    }

    fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.total() as f64 / secs
    }
}

/// Results of a load phase followed by a run phase.
#[derive(Debug)]
pub struct Summary {
    pub load: PhaseStats,
    pub reads: PhaseStats,
    pub updates: PhaseStats,
    pub run_elapsed: Duration,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[LOAD]   ops={} ok={} errors={} elapsed_ms={} throughput_ops={:.1}",
            self.load.total(),
            self.load.ok,
            self.load.errors,
            self.load.elapsed.as_millis(),
            self.load.throughput()
        )?;
        let run_ops = self.reads.total() + self.updates.total();
        let run_secs = self.run_elapsed.as_secs_f64();
        writeln!(
            f,
            "[RUN]    ops={} elapsed_ms={} throughput_ops={:.1}",
            run_ops,
            self.run_elapsed.as_millis(),
            if run_secs > 0.0 {
                run_ops as f64 / run_secs
            } else {
                0.0
            }
        )?;
        writeln!(
            f,
            "[READ]   ops={} ok={} not_found={} errors={}",
            self.reads.total(),
            self.reads.ok,
            self.reads.not_found,
            self.reads.errors
        )?;
        write!(
            f,
            "[UPDATE] ops={} ok={} errors={}",
            self.updates.total(),
            self.updates.ok,
            self.updates.errors
        )
    }
}

fn record_key(i: usize) -> String {
    format!("user{}", i)
}

fn field_name(i: usize) -> String {
    format!("field{}", i)
}

fn random_values(
    rng: &mut StdRng,
    params: &Params,
    fields: impl Iterator<Item = usize>,
) -> FieldMap {
    fields
        .map(|f| {
            let value: Vec<u8> = (0..params.field_length)
                .map(|_| rng.gen_range(b'a'..=b'z'))
                .collect();
            (field_name(f), Bytes::from(value))
        })
        .collect()
}

/// Inserts every record, then runs the read/update mix, then shuts down.
pub async fn run(config: Config, params: &Params) -> anyhow::Result<Summary> {
    let db = RecordDb::new(config);

    let start = Instant::now();
    let mut load = spawn_workers(&db, params, load_worker).await?;
    load.elapsed = start.elapsed();
    tracing::info!(ok = load.ok, errors = load.errors, "Load phase finished");

    let start = Instant::now();
    let results = spawn_workers(&db, params, run_worker).await?;
    let run_elapsed = start.elapsed();
    let (mut reads, mut updates) = results;
    reads.elapsed = run_elapsed;
    updates.elapsed = run_elapsed;

    db.shutdown().await?;
    Ok(Summary {
        load,
        reads,
        updates,
        run_elapsed,
    })
}

/// Starts one task per worker and merges what they return.
async fn spawn_workers<T, F, Fut>(db: &RecordDb, params: &Params, worker: F) -> anyhow::Result<T>
where
    T: Merge + Default + Send + 'static,
    F: Fn(RecordDb, Params, usize) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
{
    let handles: Vec<_> = (0..params.workers)
        .map(|id| tokio::spawn(worker(db.clone(), params.clone(), id)))
        .collect();
    let mut merged = T::default();
    for handle in handles {
        merged.merge_from(handle.await??);
    }
    Ok(merged)
}

trait Merge {
    fn merge_from(&mut self, other: Self);
}

impl Merge for PhaseStats {
    fn merge_from(&mut self, other: Self) {
        self.merge(other);
    }
}

impl Merge for (PhaseStats, PhaseStats) {
    fn merge_from(&mut self, other: Self) {
        self.0.merge(other.0);
        self.1.merge(other.1);
    }
}

/// Inserts the records whose index is congruent to `id` modulo the worker count.
async fn load_worker(db: RecordDb, params: Params, id: usize) -> anyhow::Result<PhaseStats> {
    let mut rng = StdRng::from_entropy();
    let mut client = db.client();
    client.init().await?;

    let mut stats = PhaseStats::default();
    for i in (id..params.records).step_by(params.workers) {
        let values = random_values(&mut rng, &params, 0..params.field_count);
        stats.record(client.insert(TABLE, &record_key(i), &values).await);
    }

    client.cleanup()?;
    Ok(stats)
}

/// Issues this worker's share of reads and single-field updates on random keys.
async fn run_worker(
    db: RecordDb,
    params: Params,
    id: usize,
) -> anyhow::Result<(PhaseStats, PhaseStats)> {
    let mut rng = StdRng::from_entropy();
    let mut client = db.client();
    client.init().await?;

    let share = params.operations / params.workers
        + usize::from(id < params.operations % params.workers);
    let mut reads = PhaseStats::default();
    let mut updates = PhaseStats::default();
    for _ in 0..share {
        let key = record_key(rng.gen_range(0..params.records));
        let field = rng.gen_range(0..params.field_count);
        if rng.gen_bool(params.read_proportion) {
            let mut result = FieldMap::new();
            let fields = FieldSet::from([field_name(field)]);
            reads.record(client.read(TABLE, &key, Some(&fields), &mut result).await);
        } else {
            let values = random_values(&mut rng, &params, std::iter::once(field));
            updates.record(client.update(TABLE, &key, &values).await);
        }
    }

    client.cleanup()?;
    Ok((reads, updates))
}

#[cfg(test)]
mod tests {
    use record::Endpoints;

    use super::*;

    fn params() -> Params {
        Params {
            workers: 3,
            records: 20,
            operations: 50,
            read_proportion: 0.5,
            field_count: 4,
            field_length: 8,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn should_run_load_and_mix_against_in_memory_store() {
        // given
        let config = Config {
            hosts: Endpoints::parse("127.0.0.1:2379"),
            ..Default::default()
        };

        // when
        let summary = run(config, &params()).await.unwrap();

        // then
        assert_eq!(summary.load.ok, 20);
        assert_eq!(summary.load.errors, 0);
        assert_eq!(summary.reads.total() + summary.updates.total(), 50);
        assert_eq!(summary.reads.not_found + summary.reads.errors, 0);
        assert_eq!(summary.updates.errors, 0);
    }

    #[test]
    fn should_report_zero_throughput_for_empty_phase() {
        assert_eq!(PhaseStats::default().throughput(), 0.0);
    }
}
