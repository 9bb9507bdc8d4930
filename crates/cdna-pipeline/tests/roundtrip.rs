//! Integration test: ingest → retrieve round trips with in-memory storage
//!
//! Exercises the whole pipeline: chunk → store → manifest → deflate → DNA
//! encode → chaotic key stream → substitution → persist, then back again with
//! integrity verification. Uses OpenDAL's in-memory backend.

use std::io::Cursor;

use cdna_core::config::CdnaConfig;
use cdna_core::HashAlgorithm;
use cdna_pipeline::{IntegrityStatus, Pipeline, PipelineSettings};

fn memory_pipeline() -> Pipeline {
    let op = cdna_storage::memory_operator().expect("memory operator");
    Pipeline::new(op, "test", PipelineSettings::default())
}

fn pseudo_random(len: usize) -> Vec<u8> {
    (0u64..len as u64)
        .map(|i| (i.wrapping_mul(2654435761) ^ (i >> 7)) as u8)
        .collect()
}

#[tokio::test]
async fn large_file_splits_into_three_fragments() {
    let pipeline = memory_pipeline();
    let original = pseudo_random(1_300_000);

    let report = pipeline
        .ingest("large.bin", Cursor::new(original.clone()))
        .await
        .expect("ingest should succeed");

    assert_eq!(report.chunk_size_bytes, 524_288);
    assert_eq!(report.fragments.len(), 3);
    assert_eq!(
        report.fragments.iter().map(|f| f.offset).collect::<Vec<_>>(),
        vec![0, 524_288, 1_048_576]
    );
    assert_eq!(
        report.fragments.iter().map(|f| f.size).collect::<Vec<_>>(),
        vec![524_288, 524_288, 251_424]
    );
    assert_eq!(report.compression.original_size, 1_300_000);
    assert_eq!(
        report.encryption.symbol_length,
        report.compression.compressed_size * 4
    );
    assert!(!report.reused);

    let retrieved = pipeline
        .retrieve(&report.file_hash)
        .await
        .expect("retrieve should succeed");
    assert_eq!(retrieved.integrity, IntegrityStatus::Verified);
    assert_eq!(retrieved.filename, "large.bin");
    assert_eq!(retrieved.data, original, "retrieved bytes must match original");
}

#[tokio::test]
async fn empty_file_round_trips() {
    let pipeline = memory_pipeline();
    let report = pipeline.ingest_bytes("empty.txt", b"").await.unwrap();

    assert!(report.fragments.is_empty());
    assert_eq!(report.compression.original_size, 0);
    assert_eq!(report.compression.ratio, 0.0);
    // a zlib stream is never empty, so neither is the ciphertext
    assert!(report.encryption.symbol_length > 0);

    let retrieved = pipeline.retrieve(&report.file_hash).await.unwrap();
    assert!(retrieved.is_verified());
    assert!(retrieved.data.is_empty());
}

#[tokio::test]
async fn short_text_round_trips() {
    let pipeline = memory_pipeline();
    let report = pipeline.ingest_bytes("a.txt", b"AAAA").await.unwrap();

    assert_eq!(report.fragments.len(), 1);
    assert_eq!(report.fragments[0].size, 4);
    assert_eq!(report.encryption.plain_distribution.total(), report.encryption.symbol_length);
    assert_eq!(report.encryption.cipher_distribution.total(), report.encryption.symbol_length);
    assert!((0.0001..0.9999).contains(&report.encryption.x0));
    assert_eq!(report.encryption.r, 3.99);

    let data = pipeline
        .retrieve(&report.file_hash)
        .await
        .unwrap()
        .into_verified()
        .unwrap();
    assert_eq!(data, b"AAAA");
}

#[tokio::test]
async fn compressible_input_reports_positive_ratio() {
    let pipeline = memory_pipeline();
    let report = pipeline
        .ingest_bytes("zeros.bin", &vec![0u8; 100_000])
        .await
        .unwrap();
    assert!(report.compression.ratio > 90.0, "ratio {}", report.compression.ratio);
    assert!(report.compression.compressed_size < 1_000);
}

#[tokio::test]
async fn reingest_reuses_encrypted_artifact() {
    let pipeline = memory_pipeline();
    let data = pseudo_random(10_000);

    let first = pipeline.ingest_bytes("one.bin", &data).await.unwrap();
    let second = pipeline.ingest_bytes("two.bin", &data).await.unwrap();

    assert_eq!(first.file_hash, second.file_hash);
    assert!(!first.reused);
    assert!(second.reused);
    assert_eq!(second.new_chunks, 0);
    assert_eq!(first.encryption.x0.to_bits(), second.encryption.x0.to_bits());

    // the first upload's name is kept
    let manifest = pipeline.manifest(&first.file_hash).await.unwrap();
    assert_eq!(manifest.filename, "one.bin");

    let retrieved = pipeline.retrieve(&first.file_hash).await.unwrap();
    assert!(retrieved.is_verified());
    assert_eq!(retrieved.data, data);
}

#[tokio::test]
async fn same_name_different_content_never_clobbers() {
    let pipeline = memory_pipeline();
    let a = pipeline.ingest_bytes("report.pdf", b"version one").await.unwrap();
    let b = pipeline.ingest_bytes("report.pdf", b"version two").await.unwrap();
    assert_ne!(a.file_hash, b.file_hash);

    let ra = pipeline.retrieve(&a.file_hash).await.unwrap().into_verified().unwrap();
    let rb = pipeline.retrieve(&b.file_hash).await.unwrap().into_verified().unwrap();
    assert_eq!(ra, b"version one");
    assert_eq!(rb, b"version two");
}

#[tokio::test]
async fn concurrent_ingests_of_identical_content_agree() {
    let pipeline = memory_pipeline();
    let data = pseudo_random(700_000);

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let pipeline = pipeline.clone();
            let data = data.clone();
            tokio::spawn(async move {
                pipeline
                    .ingest_bytes(&format!("copy-{i}.bin"), &data)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut reports = Vec::new();
    for h in handles {
        reports.push(h.await.unwrap());
    }
    assert!(reports.windows(2).all(|w| w[0].file_hash == w[1].file_hash));
    assert_eq!(reports.iter().filter(|r| !r.reused).count(), 1);

    let stored = pipeline.metadata(&reports[0].file_hash).await.unwrap();
    for r in &reports {
        assert_eq!(r.encryption.x0.to_bits(), stored.params().x0().to_bits());
    }

    let retrieved = pipeline.retrieve(&reports[0].file_hash).await.unwrap();
    assert!(retrieved.is_verified());
    assert_eq!(retrieved.data, data);
}

#[tokio::test]
async fn metadata_reproduces_the_ciphertext() {
    let pipeline = memory_pipeline();
    let report = pipeline.ingest_bytes("seed.txt", b"chaos is deterministic").await.unwrap();

    let meta = pipeline.metadata(&report.file_hash).await.unwrap();
    let artifact = pipeline.fetch_ciphertext(&report.file_hash).await.unwrap();
    assert_eq!(artifact.filename, "seed.txt");
    assert_eq!(artifact.ciphertext.len() as u64, meta.symbol_length);
    assert!(artifact.ciphertext.iter().all(|b| b"ATCG".contains(b)));

    let compressed = cdna_chunks::compress(b"chaos is deterministic", 6).unwrap();
    let plain = cdna_cipher::encode(&compressed);
    let again = cdna_cipher::encrypt_with(&plain, &meta.params()).unwrap();
    assert_eq!(again.to_ascii(), artifact.ciphertext);
}

#[tokio::test]
async fn list_reports_every_ingested_file() {
    let pipeline = memory_pipeline();
    assert!(pipeline.list().await.unwrap().is_empty());

    let a = pipeline.ingest_bytes("a", b"alpha").await.unwrap();
    let b = pipeline.ingest_bytes("b", b"beta").await.unwrap();
    pipeline.ingest_bytes("a-again", b"alpha").await.unwrap();

    let listed: Vec<String> = pipeline
        .list()
        .await
        .unwrap()
        .iter()
        .map(|h| h.to_hex())
        .collect();
    assert_eq!(listed.len(), 2);
    assert!(listed.contains(&a.file_hash));
    assert!(listed.contains(&b.file_hash));
    let mut sorted = listed.clone();
    sorted.sort();
    assert_eq!(listed, sorted);
}

#[tokio::test]
async fn blake3_pipeline_records_its_algorithm() {
    let op = cdna_storage::memory_operator().unwrap();
    let settings = PipelineSettings {
        hash_algorithm: HashAlgorithm::Blake3,
        chunk_size_bytes: 4096,
        ..PipelineSettings::default()
    };
    let pipeline = Pipeline::new(op, "b3", settings);
    let data = pseudo_random(20_000);

    let report = pipeline.ingest_bytes("b3.bin", &data).await.unwrap();
    assert_eq!(report.fragments.len(), 5);
    assert_eq!(
        report.file_hash,
        cdna_chunks::hash_bytes(HashAlgorithm::Blake3, &data).to_hex()
    );

    let manifest = pipeline.manifest(&report.file_hash).await.unwrap();
    assert_eq!(manifest.hash_algorithm, HashAlgorithm::Blake3);
    assert!(pipeline.retrieve(&report.file_hash).await.unwrap().is_verified());
}

#[tokio::test]
async fn progress_callback_sees_each_stage() {
    use std::sync::{Arc, Mutex};

    let pipeline = memory_pipeline();
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&seen);
    let progress: cdna_pipeline::ProgressFn = Box::new(move |_, _, msg| {
        sink.lock().unwrap().push(msg.to_string());
    });

    pipeline
        .ingest_with_progress("p.txt", &b"progress"[..], Some(&progress))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen.iter().any(|m| m.starts_with("stored")));
    assert!(seen.iter().any(|m| m == "encrypting"));
}

#[tokio::test]
async fn fs_backend_round_trip() {
    let tmp = tempfile::TempDir::new().unwrap();
    let mut config = CdnaConfig::default();
    config.storage.backend = "fs".into();
    config.storage.root = tmp.path().to_path_buf();
    config.chunking.chunk_size_bytes = 1024;

    let op = cdna_storage::build_operator(&config.storage, None).expect("fs operator");
    let pipeline = Pipeline::from_config(op, &config).unwrap();

    let original = pseudo_random(5_000);
    let report = pipeline.ingest_bytes("disk.bin", &original).await.unwrap();
    assert_eq!(report.fragments.len(), 5);

    let manifest_path = tmp.path().join(&report.manifest_key);
    assert!(manifest_path.exists(), "manifest written at {}", manifest_path.display());
    assert!(tmp
        .path()
        .join(format!("cdna/encrypted/{}.dna", report.file_hash))
        .exists());

    let retrieved = pipeline.retrieve(&report.file_hash).await.unwrap();
    assert_eq!(retrieved.into_verified().unwrap(), original);
}
