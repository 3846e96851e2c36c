use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{StoreFiles, random_doc, write_store};
use crate::compression::CompressionMode;
use crate::dsl::{Document, Field, FieldInfos};
use crate::segment::merger::{LiveDocs, MergeSource, MergeStats, StoreMerger};
use crate::segment::store::{StoreConfig, StoreReader, StoreWriter};

fn config() -> StoreConfig {
    StoreConfig {
        chunk_size: 4096,
        max_docs_per_chunk: 20,
        block_size: 4,
        ..StoreConfig::default()
    }
}

fn id_text_bytes() -> FieldInfos {
    FieldInfos::from_pairs([("id", 0), ("text", 1), ("payload", 2)]).unwrap()
}

fn source(files: &StoreFiles, field_infos: FieldInfos, live_docs: Option<LiveDocs>) -> MergeSource {
    MergeSource {
        reader: files.open(),
        field_infos,
        live_docs,
    }
}

/// Merge and reopen the result
fn merge(
    config: StoreConfig,
    sources: &[MergeSource],
    merged: &FieldInfos,
) -> (MergeStats, StoreReader) {
    let mut writer = StoreWriter::new(Vec::new(), Vec::new(), config).unwrap();
    let stats = StoreMerger::new(&mut writer)
        .merge(sources, merged)
        .unwrap();
    let finish = writer.finish().unwrap();
    let files = StoreFiles {
        data: finish.data,
        index: finish.index,
        meta: finish.meta,
    };
    (stats, files.open())
}

fn random_docs(seed: u64, n: u32) -> Vec<Document> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|i| random_doc(&mut rng, i)).collect()
}

#[test]
fn test_matching_sources_copy_chunks() {
    let a = random_docs(1, 200);
    let b = random_docs(2, 150);
    let fa = write_store(config(), &a);
    let fb = write_store(config(), &b);
    let merged = id_text_bytes();

    let sources = [
        source(&fa, merged.clone(), None),
        source(&fb, merged.clone(), None),
    ];
    let (stats, mut reader) = merge(config(), &sources, &merged);

    assert_eq!(stats.matching_sources, 2);
    assert_eq!(stats.docs_merged, 350);
    assert_eq!(stats.docs_remapped, 0);
    assert!(stats.chunks_copied > 0);
    assert!(stats.docs_copied_raw < 350);

    assert_eq!(reader.num_docs(), 350);
    for (i, doc) in a.iter().chain(&b).enumerate() {
        assert_eq!(&reader.document(i as u32).unwrap(), doc);
    }
}

#[test]
fn test_deleted_docs_skip_chunk_copy() {
    let a = random_docs(3, 100);
    let fa = write_store(config(), &a);
    let merged = id_text_bytes();

    let mut live = LiveDocs::all_live(100);
    for doc in [0, 41, 42, 99] {
        live.delete(doc);
    }
    let expected: Vec<&Document> = a
        .iter()
        .enumerate()
        .filter(|(i, _)| live.is_live(*i as u32))
        .map(|(_, d)| d)
        .collect();

    let sources = [source(&fa, merged.clone(), Some(live))];
    let (stats, mut reader) = merge(config(), &sources, &merged);

    assert_eq!(stats.docs_merged, 96);
    assert_eq!(reader.num_docs(), 96);
    for (i, doc) in expected.into_iter().enumerate() {
        assert_eq!(&reader.document(i as u32).unwrap(), doc);
    }
}

#[test]
fn test_non_matching_source_is_remapped() {
    let a = random_docs(4, 60);
    let fa = write_store(config(), &a);
    // Source numbering differs from the merged one
    let source_infos = id_text_bytes();
    let merged = FieldInfos::from_pairs([("payload", 0), ("id", 1), ("text", 2)]).unwrap();

    let sources = [source(&fa, source_infos, None)];
    let (stats, mut reader) = merge(config(), &sources, &merged);

    assert_eq!(stats.matching_sources, 0);
    assert_eq!(stats.docs_remapped, 60);
    assert_eq!(stats.chunks_copied, 0);

    for (i, original) in a.iter().enumerate() {
        let doc = reader.document(i as u32).unwrap();
        assert_eq!(
            doc.get_first(Field(1)),
            original.get_first(Field(0)),
            "id moved to field 1"
        );
        assert_eq!(doc.get_first(Field(2)), original.get_first(Field(1)));
        assert_eq!(doc.get_first(Field(0)), original.get_first(Field(2)));
    }
}

#[test]
fn test_incompatible_mode_rebuffers() {
    let a = random_docs(5, 80);
    let source_config = StoreConfig {
        compression: CompressionMode::FastDecompression,
        ..config()
    };
    let fa = write_store(source_config, &a);
    let merged = id_text_bytes();

    let sources = [source(&fa, merged.clone(), None)];
    let (stats, mut reader) = merge(config(), &sources, &merged);

    assert_eq!(stats.matching_sources, 1);
    assert_eq!(stats.chunks_copied, 0);
    assert_eq!(stats.docs_copied_raw, 80);
    assert_eq!(reader.compression(), CompressionMode::Fast);
    for (i, doc) in a.iter().enumerate() {
        assert_eq!(&reader.document(i as u32).unwrap(), doc);
    }
}

#[test]
fn test_missing_field_fails_remap() {
    let a = random_docs(6, 10);
    let fa = write_store(config(), &a);
    // every doc has a text field, which the merged numbering lacks
    let merged = FieldInfos::from_pairs([("id", 0), ("payload", 1)]).unwrap();

    let sources = [source(&fa, id_text_bytes(), None)];
    let mut writer = StoreWriter::new(Vec::new(), Vec::new(), config()).unwrap();
    let err = StoreMerger::new(&mut writer)
        .merge(&sources, &merged)
        .unwrap_err();
    assert!(matches!(err, crate::Error::FieldNotFound(name) if name == "text"));
}

#[test]
fn test_live_docs_must_cover_source() {
    let a = random_docs(7, 30);
    let fa = write_store(config(), &a);
    let merged = id_text_bytes();

    // Sized for fewer docs than the store holds
    let sources = [source(&fa, merged.clone(), Some(LiveDocs::all_live(20)))];
    let mut writer = StoreWriter::new(Vec::new(), Vec::new(), config()).unwrap();
    let err = StoreMerger::new(&mut writer)
        .merge(&sources, &merged)
        .unwrap_err();
    assert!(matches!(err, crate::Error::Consistency(_)));
    assert_eq!(writer.num_docs(), 0);
}
