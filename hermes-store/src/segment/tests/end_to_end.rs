use std::thread;

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{random_doc, write_store};
use crate::compression::CompressionMode;
use crate::segment::store::StoreConfig;

#[test]
fn test_2500_records_all_modes() {
    let mut rng = StdRng::seed_from_u64(2500);
    let docs: Vec<_> = (0..2500).map(|i| random_doc(&mut rng, i)).collect();

    for compression in CompressionMode::ALL {
        for block_size in [1024, 16] {
            let config = StoreConfig {
                compression,
                chunk_size: 16 * 1024,
                max_docs_per_chunk: 10_000,
                block_size,
            };
            let files = write_store(config, &docs);
            let chunk_count = files.meta.num_chunks as usize;
            assert!(chunk_count > 1);
            assert_eq!(files.meta.num_docs, 2500);

            let mut reader = files.open();
            let index = reader.index().clone();
            assert_eq!(index.num_chunks() as usize, chunk_count);
            assert_eq!(index.num_blocks(), chunk_count.div_ceil(block_size));
            let last_block = index.blocks().last().unwrap();
            let expected_last = match chunk_count % block_size {
                0 => block_size,
                n => n,
            };
            assert_eq!(last_block.num_chunks, expected_last);

            // Every lookup lands in the chunk that really holds the doc
            let chunks: Vec<_> = index.chunks().collect();
            for doc in 0..2500u32 {
                let loc = index.locate(doc).unwrap();
                let pos = chunks.partition_point(|c| c.doc_base <= doc) - 1;
                assert_eq!(loc, chunks[pos], "doc {}", doc);
            }
            for (i, doc) in docs.iter().enumerate() {
                assert_eq!(&reader.document(i as u32).unwrap(), doc, "{}", compression);
            }
        }
    }
}

#[test]
fn test_chunks_are_monotonic() {
    let mut rng = StdRng::seed_from_u64(11);
    let docs: Vec<_> = (0..600).map(|i| random_doc(&mut rng, i)).collect();
    let config = StoreConfig {
        chunk_size: 4096,
        max_docs_per_chunk: 16,
        block_size: 5,
        ..StoreConfig::default()
    };
    let reader = write_store(config, &docs).open();

    let chunks: Vec<_> = reader.index().chunks().collect();
    assert_eq!(chunks[0].doc_base, 0);
    assert!(chunks[0].start_pointer > 0);
    for pair in chunks.windows(2) {
        assert!(pair[1].doc_base > pair[0].doc_base);
        assert!(pair[1].start_pointer > pair[0].start_pointer);
    }
    // Chunk ends tile the data region exactly
    for pair in chunks.windows(2) {
        assert_eq!(reader.index().chunk_end(&pair[0]), pair[1].start_pointer);
    }
}

#[test]
fn test_single_chunk_store_has_zero_averages() {
    let mut rng = StdRng::seed_from_u64(3);
    let docs: Vec<_> = (0..5).map(|i| random_doc(&mut rng, i)).collect();
    let reader = write_store(StoreConfig::default(), &docs).open();

    let blocks: Vec<_> = reader.index().blocks().collect();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].num_chunks, 1);
    assert_eq!(blocks[0].avg_chunk_docs, 0);
    assert_eq!(blocks[0].avg_chunk_size, 0);
}

#[test]
fn test_cloned_readers_on_threads() {
    let mut rng = StdRng::seed_from_u64(99);
    let docs: Vec<_> = (0..400).map(|i| random_doc(&mut rng, i)).collect();
    let config = StoreConfig {
        compression: CompressionMode::HighCompression,
        chunk_size: 2048,
        ..StoreConfig::default()
    };
    let reader = write_store(config, &docs).open();

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let mut reader = reader.clone();
            let docs = docs.clone();
            thread::spawn(move || {
                for doc in (t..400).step_by(4) {
                    assert_eq!(reader.document(doc).unwrap(), docs[doc as usize]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[cfg(feature = "native")]
#[test]
fn test_mmap_directory_store() {
    use crate::directories::MmapDirectory;
    use crate::segment::store::{StoreReader, StoreWriter};

    let temp_dir = tempfile::TempDir::new().unwrap();
    let dir = MmapDirectory::new(temp_dir.path());
    let mut rng = StdRng::seed_from_u64(7);
    let docs: Vec<_> = (0..300).map(|i| random_doc(&mut rng, i)).collect();
    let config = StoreConfig {
        compression: CompressionMode::FastDecompression,
        chunk_size: 4096,
        ..StoreConfig::default()
    };

    let mut writer = StoreWriter::create_in(&dir, "seg_1", config).unwrap();
    for doc in &docs {
        writer.add_document(doc).unwrap();
    }
    let meta = writer.finish().unwrap().commit(&dir, "seg_1").unwrap();
    assert_eq!(meta.num_docs, 300);

    let mut reader = StoreReader::open_in(&dir, "seg_1").unwrap();
    assert_eq!(reader.compression(), CompressionMode::FastDecompression);
    for doc in [0u32, 1, 150, 299] {
        assert_eq!(reader.document(doc).unwrap(), docs[doc as usize]);
    }
}
