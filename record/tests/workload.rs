use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use common::storage::in_memory::InMemoryStorage;
use common::{Storage, StorageResult};
use record::{
    CacheConfig, Config, Connector, Encoding, Endpoints, FieldMap, FieldSet, RecordDb, Status,
};
use rstest::rstest;

const WORKERS: usize = 8;
const RECORDS_PER_WORKER: usize = 25;

/// Hands out one in-memory store per dial and counts the dials.
#[derive(Default)]
struct InMemoryConnector {
    connects: AtomicUsize,
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn connect(&self, _endpoints: &Endpoints) -> StorageResult<Arc<dyn Storage>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        Ok(Arc::new(InMemoryStorage::new()))
    }
}

fn config(encoding: Encoding, cached: bool) -> Config {
    Config {
        hosts: Endpoints::parse("127.0.0.1:2379"),
        encoding,
        cache: cached.then(CacheConfig::default),
        ..Default::default()
    }
}

fn record(worker: usize, i: usize) -> FieldMap {
    (0..3)
        .map(|f| {
            (
                format!("field{}", f),
                Bytes::from(format!("w{}-r{}-f{}", worker, i, f)),
            )
        })
        .collect()
}

#[rstest]
#[case(Encoding::PerField, false)]
#[case(Encoding::PerField, true)]
#[case(Encoding::WholeRecord, false)]
#[case(Encoding::WholeRecord, true)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn should_serve_concurrent_workers_from_one_connection(
    #[case] encoding: Encoding,
    #[case] cached: bool,
) {
    // given
    let connector = Arc::new(InMemoryConnector::default());
    let db = RecordDb::with_connector(config(encoding, cached), connector.clone());

    // when
    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let db = db.clone();
            tokio::spawn(async move {
                let mut client = db.client();
                client.init().await.unwrap();
                for i in 0..RECORDS_PER_WORKER {
                    let key = format!("user{}-{}", worker, i);
                    assert_eq!(
                        client.insert("usertable", &key, &record(worker, i)).await,
                        Status::Ok
                    );
                }
                for i in 0..RECORDS_PER_WORKER {
                    let key = format!("user{}-{}", worker, i);
                    let mut result = FieldMap::new();
                    assert_eq!(
                        client.read("usertable", &key, None, &mut result).await,
                        Status::Ok
                    );
                    assert_eq!(result, record(worker, i));
                }
                client.cleanup().unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.await.unwrap();
    }

    // then
    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    assert_eq!(db.manager().user_count(), 0);
    assert!(db.manager().is_connected().await);
}

#[rstest]
#[case(Encoding::PerField)]
#[case(Encoding::WholeRecord)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn should_keep_every_concurrent_field_update(#[case] encoding: Encoding) {
    // given
    let db = RecordDb::new(config(encoding, true));
    let mut setup = db.client();
    setup.init().await.unwrap();
    let base = FieldMap::from([("base".to_string(), Bytes::from("0"))]);
    assert_eq!(setup.insert("usertable", "hot", &base).await, Status::Ok);

    // when
    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let db = db.clone();
            tokio::spawn(async move {
                let mut client = db.client();
                client.init().await.unwrap();
                let field = format!("field{}", worker);
                let wanted = FieldSet::from([field.clone()]);
                let update = FieldMap::from([(field, Bytes::from(format!("w{}", worker)))]);
                assert_eq!(client.update("usertable", "hot", &update).await, Status::Ok);
                let mut seen = FieldMap::new();
                assert_eq!(
                    client
                        .read("usertable", "hot", Some(&wanted), &mut seen)
                        .await,
                    Status::Ok
                );
                assert_eq!(seen, update);
                client.cleanup().unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.await.unwrap();
    }

    // then
    let mut result = FieldMap::new();
    assert_eq!(
        setup.read("usertable", "hot", None, &mut result).await,
        Status::Ok
    );
    assert_eq!(result.len(), WORKERS + 1);
    setup.cleanup().unwrap();
}

#[rstest]
#[case(Encoding::PerField)]
#[case(Encoding::WholeRecord)]
#[tokio::test]
async fn should_delete_only_the_named_record(#[case] encoding: Encoding) {
    // given
    let db = RecordDb::new(config(encoding, true));
    let mut client = db.client();
    client.init().await.unwrap();
    assert_eq!(
        client.insert("usertable", "user1", &record(0, 1)).await,
        Status::Ok
    );
    assert_eq!(
        client.insert("usertable", "user10", &record(0, 10)).await,
        Status::Ok
    );

    // when
    let status = client.delete("usertable", "user1").await;

    // then
    assert_eq!(status, Status::Ok);
    let mut deleted = FieldMap::new();
    assert_eq!(
        client.read("usertable", "user1", None, &mut deleted).await,
        Status::NotFound
    );
    let mut sibling = FieldMap::new();
    assert_eq!(
        client.read("usertable", "user10", None, &mut sibling).await,
        Status::Ok
    );
    assert_eq!(sibling, record(0, 10));
    client.cleanup().unwrap();
}

#[tokio::test]
async fn should_redial_after_shutdown() {
    // given
    let connector = Arc::new(InMemoryConnector::default());
    let db = RecordDb::with_connector(config(Encoding::PerField, false), connector.clone());
    let mut client = db.client();
    client.init().await.unwrap();
    client.cleanup().unwrap();

    // when
    db.shutdown().await.unwrap();
    client.init().await.unwrap();

    // then
    assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    assert_eq!(db.manager().user_count(), 1);
    client.cleanup().unwrap();
}
