//! Store scenarios spanning writer, index, reader and merger

mod end_to_end;
mod merge;

use rand::Rng;
use rand::rngs::StdRng;

use crate::directories::OwnedBytes;
use crate::dsl::{Document, Field};
use crate::segment::store::{StoreConfig, StoreMeta, StoreReader, StoreWriter};

const WORDS: [&str; 8] = [
    "stored", "fields", "chunk", "block", "index", "delta", "zigzag", "packed",
];

/// A document with an id, a text of random length and a payload.
fn random_doc(rng: &mut StdRng, id: u32) -> Document {
    let mut doc = Document::new();
    doc.add_u64(Field(0), id as u64);
    let words = rng.gen_range(5..300);
    let text: Vec<&str> = (0..words)
        .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
        .collect();
    doc.add_text(Field(1), text.join(" "));
    if rng.gen_bool(0.3) {
        let payload: Vec<u8> = (0..rng.gen_range(0..64)).map(|_| rng.r#gen()).collect();
        doc.add_bytes(Field(2), payload);
    }
    doc
}

/// Raw file bytes of a finished store
struct StoreFiles {
    data: Vec<u8>,
    index: Vec<u8>,
    meta: StoreMeta,
}

impl StoreFiles {
    fn open(&self) -> StoreReader {
        StoreReader::open(
            OwnedBytes::new(self.data.clone()),
            OwnedBytes::new(self.index.clone()),
            &self.meta.config(),
        )
        .unwrap()
    }
}

fn write_store(config: StoreConfig, docs: &[Document]) -> StoreFiles {
    let mut writer = StoreWriter::new(Vec::new(), Vec::new(), config).unwrap();
    for (i, doc) in docs.iter().enumerate() {
        assert_eq!(writer.add_document(doc).unwrap(), i as u32);
    }
    let finish = writer.finish().unwrap();
    StoreFiles {
        data: finish.data,
        index: finish.index,
        meta: finish.meta,
    }
}
