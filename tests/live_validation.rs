use std::{env, sync::Once};

use lawpipe::{
    config,
    embedding::{EmbeddingClient, build_embedding_client},
    metadata_store::{MetadataStore, MongoMetadataStore},
    qdrant::{QdrantService, VectorIndex},
};
use serde_json::json;

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() -> &'static config::Config {
    INIT.call_once(|| {
        set_default_env("QDRANT_URL", "http://127.0.0.1:6333");
        set_default_env("QDRANT_COLLECTION", "lawpipe-live");
        set_default_env("MONGO_URI", "mongodb://127.0.0.1:27017/");
        set_default_env("MONGO_DB", "lawpipe_live");
        set_default_env("EMBEDDING_PROVIDER", "ollama");
        set_default_env("EMBEDDING_MODEL", "nomic-embed-text");
        set_default_env("EMBEDDING_DIMENSION", "768");
        set_default_env("OLLAMA_URL", "http://127.0.0.1:11434");
        config::init_config().expect("live configuration");
    });
    config::CONFIG.get().expect("live configuration loaded")
}

#[tokio::test]
#[ignore = "Requires live Qdrant"]
async fn live_qdrant_collection_and_upsert() {
    let config = init_config_once();
    let service = QdrantService::new(&config.qdrant_url, config.qdrant_api_key.clone())
        .expect("qdrant client");
    let dimension = config.embedding_dimension as u64;
    service
        .ensure_collection(&config.qdrant_collection_name, dimension)
        .await
        .expect("collection should be ensured");
    service
        .ensure_payload_indexes(&config.qdrant_collection_name)
        .await
        .expect("payload indexes");
    service
        .upsert_point(
            &config.qdrant_collection_name,
            1,
            vec![0.01; config.embedding_dimension],
            json!({"id": 1, "title": "Live Act"}),
        )
        .await
        .expect("upsert should succeed");
    assert!(
        !service
            .ensure_collection(&config.qdrant_collection_name, dimension)
            .await
            .expect("second ensure"),
        "collection must already exist on the second call"
    );
}

#[tokio::test]
#[ignore = "Requires live MongoDB"]
async fn live_mongo_upsert_is_idempotent() {
    let config = init_config_once();
    let store = MongoMetadataStore::connect(&config.mongo_uri, &config.mongo_db, "live_validation")
        .await
        .expect("mongo client");
    store.ping().await.expect("mongo should be reachable");
    store.ensure_indexes().await.expect("indexes");
    let metadata = json!({"id": 1, "title": "Live Act", "court": "Supreme Court", "year": 2001});
    store.upsert(1, &metadata).await.expect("first upsert");
    store.upsert(1, &metadata).await.expect("repeated upsert");
}

#[tokio::test]
#[ignore = "Requires live Ollama embeddings"]
async fn live_ollama_embedding_roundtrip() {
    let config = init_config_once();
    let client = build_embedding_client(config).expect("embedding client");
    let vectors = client
        .generate_embeddings(vec!["Act | Live Act | section | Year 2001 | body".to_string()])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 1, "expected embedding per input chunk");
    assert_eq!(
        vectors[0].len(),
        config.embedding_dimension,
        "embedding dimension mismatch"
    );
}
