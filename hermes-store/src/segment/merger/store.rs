//! Document store merge.
//!
//! Sources whose field numbering matches the merged numbering have their
//! full, deletion-free chunks copied without decompression. Their other
//! chunks are decompressed and re-buffered as raw documents. Sources with
//! a different numbering are decoded and re-encoded field by field.

use std::io::Write;

use log::{debug, warn};

use super::MatchingReaders;
use crate::DocId;
use crate::dsl::{Document, FieldInfos, deserialize_document};
use crate::error::{Error, Result};
use crate::segment::store::{ChunkIterator, StoreReader, StoreWriter};

/// Live documents of a source store, as a bitset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveDocs {
    words: Vec<u64>,
    num_docs: DocId,
    num_live: DocId,
}

impl LiveDocs {
    /// Every document live
    pub fn all_live(num_docs: DocId) -> Self {
        let mut words = vec![u64::MAX; (num_docs as usize).div_ceil(64)];
        let tail = num_docs % 64;
        if let Some(last) = words.last_mut().filter(|_| tail != 0) {
            *last = (1u64 << tail) - 1;
        }
        Self {
            words,
            num_docs,
            num_live: num_docs,
        }
    }

    pub fn is_live(&self, doc: DocId) -> bool {
        doc < self.num_docs && self.words[(doc / 64) as usize] & (1u64 << (doc % 64)) != 0
    }

    /// Mark `doc` deleted; returns whether it was live.
    pub fn delete(&mut self, doc: DocId) -> bool {
        if !self.is_live(doc) {
            return false;
        }
        self.words[(doc / 64) as usize] &= !(1u64 << (doc % 64));
        self.num_live -= 1;
        true
    }

    pub fn num_live(&self) -> DocId {
        self.num_live
    }

    pub fn num_docs(&self) -> DocId {
        self.num_docs
    }

    fn all_live_in(&self, start: DocId, len: u32) -> bool {
        (start..start + len).all(|doc| self.is_live(doc))
    }
}

/// One store to merge
#[derive(Debug, Clone)]
pub struct MergeSource {
    pub reader: StoreReader,
    pub field_infos: FieldInfos,
    /// `None` when nothing was deleted
    pub live_docs: Option<LiveDocs>,
}

impl MergeSource {
    fn is_live(&self, doc: DocId) -> bool {
        self.live_docs.as_ref().is_none_or(|live| live.is_live(doc))
    }
}

/// What a merge did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Documents written to the merged store
    pub docs_merged: u32,
    /// Chunks copied without decompression
    pub chunks_copied: u32,
    /// Documents re-buffered as raw bytes
    pub docs_copied_raw: u32,
    /// Documents decoded and re-encoded under the merged numbering
    pub docs_remapped: u32,
    pub matching_sources: usize,
}

/// Appends the live documents of several stores to one writer
pub struct StoreMerger<'a, W: Write, I: Write> {
    writer: &'a mut StoreWriter<W, I>,
    stats: MergeStats,
}

impl<'a, W: Write, I: Write> StoreMerger<'a, W, I> {
    pub fn new(writer: &'a mut StoreWriter<W, I>) -> Self {
        Self {
            writer,
            stats: MergeStats::default(),
        }
    }

    /// Merge `sources` in order. `merged` is the field numbering of the
    /// output store.
    pub fn merge(mut self, sources: &[MergeSource], merged: &FieldInfos) -> Result<MergeStats> {
        for (idx, source) in sources.iter().enumerate() {
            if let Some(live) = source
                .live_docs
                .as_ref()
                .filter(|live| live.num_docs() != source.reader.num_docs())
            {
                return Err(Error::Consistency(format!(
                    "store merge source {}: live docs cover {} docs, store has {}",
                    idx,
                    live.num_docs(),
                    source.reader.num_docs()
                )));
            }
        }
        let infos: Vec<&FieldInfos> = sources.iter().map(|s| &s.field_infos).collect();
        let matching = MatchingReaders::new(&infos, merged);
        self.stats.matching_sources = matching.count();
        debug!(
            "store merge: {} sources, {} matching",
            sources.len(),
            matching.count()
        );

        for (idx, source) in sources.iter().enumerate() {
            if !matching.is_matching(idx) {
                debug!("store merge source {}: remapping fields", idx);
                self.remap_source(source, merged)?;
                continue;
            }
            let config = *self.writer.config();
            let compatible = source.reader.compression() == config.compression
                && source.reader.chunk_size() as usize == config.chunk_size;
            if compatible {
                debug!("store merge source {}: chunk copy", idx);
                self.copy_source(source)?;
            } else {
                warn!(
                    "store merge source {}: matching fields but incompatible chunks \
                     ({} / {} bytes vs {} / {} bytes), re-buffering",
                    idx,
                    source.reader.compression(),
                    source.reader.chunk_size(),
                    config.compression,
                    config.chunk_size
                );
                self.rebuffer_source(source)?;
            }
        }

        debug!("store merge done: {:?}", self.stats);
        Ok(self.stats)
    }

    fn copy_source(&mut self, source: &MergeSource) -> Result<()> {
        let config = *self.writer.config();
        let mut chunks = source.reader.chunk_iterator();
        while chunks.advance()? {
            let chunk_docs = chunks.chunk_docs();
            let full = chunks.uncompressed_len() >= config.chunk_size as u64
                || chunk_docs as usize >= config.max_docs_per_chunk;
            let no_deletions = source
                .live_docs
                .as_ref()
                .is_none_or(|live| live.all_live_in(chunks.doc_base(), chunk_docs));

            if self.writer.num_buffered_docs() == 0 && full && no_deletions {
                self.writer
                    .add_compressed_chunk(chunk_docs, chunks.compressed_body()?)?;
                self.stats.chunks_copied += 1;
                self.stats.docs_merged += chunk_docs;
            } else {
                self.add_raw_chunk(source, &mut chunks)?;
            }
        }
        Ok(())
    }

    fn rebuffer_source(&mut self, source: &MergeSource) -> Result<()> {
        let mut chunks = source.reader.chunk_iterator();
        while chunks.advance()? {
            self.add_raw_chunk(source, &mut chunks)?;
        }
        Ok(())
    }

    /// Add the live documents of the current chunk as raw bytes.
    fn add_raw_chunk(&mut self, source: &MergeSource, chunks: &mut ChunkIterator) -> Result<()> {
        let doc_base = chunks.doc_base();
        let lengths = chunks.lengths().to_vec();
        let fields = chunks.num_stored_fields().to_vec();
        let decoded = chunks.decompress()?;

        let mut offset = 0usize;
        for (j, (&len, &num_fields)) in lengths.iter().zip(&fields).enumerate() {
            let end = offset + len as usize;
            if source.is_live(doc_base + j as DocId) {
                self.writer
                    .add_raw_document(&decoded[offset..end], num_fields)?;
                self.stats.docs_copied_raw += 1;
                self.stats.docs_merged += 1;
            }
            offset = end;
        }
        Ok(())
    }

    fn remap_source(&mut self, source: &MergeSource, merged: &FieldInfos) -> Result<()> {
        let mut chunks = source.reader.chunk_iterator();
        while chunks.advance()? {
            let doc_base = chunks.doc_base();
            let lengths = chunks.lengths().to_vec();
            let fields = chunks.num_stored_fields().to_vec();
            let decoded = chunks.decompress()?;

            let mut offset = 0usize;
            for (j, (&len, &num_fields)) in lengths.iter().zip(&fields).enumerate() {
                let end = offset + len as usize;
                if source.is_live(doc_base + j as DocId) {
                    let doc = deserialize_document(&decoded[offset..end], num_fields)?;
                    let doc = remap_document(&doc, &source.field_infos, merged)?;
                    self.writer.add_document(&doc)?;
                    self.stats.docs_remapped += 1;
                    self.stats.docs_merged += 1;
                }
                offset = end;
            }
        }
        Ok(())
    }
}

/// Renumber the fields of `doc` from `source` numbering to `merged`
/// numbering, matching by field name.
fn remap_document(doc: &Document, source: &FieldInfos, merged: &FieldInfos) -> Result<Document> {
    let mut remapped = Document::new();
    for (field, value) in doc.field_values() {
        let name = &source
            .field_info_by_number(field.0)
            .ok_or_else(|| Error::FieldNotFound(format!("#{}", field.0)))?
            .name;
        let target = merged
            .get_field(name)
            .ok_or_else(|| Error::FieldNotFound(name.clone()))?;
        remapped.add(target, value.clone());
    }
    Ok(remapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::Field;

    #[test]
    fn test_live_docs() {
        let mut live = LiveDocs::all_live(130);
        assert_eq!(live.num_live(), 130);
        assert!(live.is_live(129));
        assert!(!live.is_live(130));

        assert!(live.delete(64));
        assert!(!live.delete(64));
        assert!(!live.delete(500));
        assert_eq!(live.num_live(), 129);
        assert!(!live.is_live(64));
        assert!(live.all_live_in(0, 64));
        assert!(!live.all_live_in(60, 10));
    }

    #[test]
    fn test_remap_document() {
        let source = FieldInfos::from_pairs([("title", 0), ("body", 1)]).unwrap();
        let merged = FieldInfos::from_pairs([("body", 0), ("title", 1)]).unwrap();
        let mut doc = Document::new();
        doc.add_text(Field(0), "a title");
        doc.add_text(Field(1), "a body");

        let remapped = remap_document(&doc, &source, &merged).unwrap();
        assert_eq!(
            remapped.get_first(Field(1)).and_then(|v| v.as_text()),
            Some("a title")
        );
        assert_eq!(
            remapped.get_first(Field(0)).and_then(|v| v.as_text()),
            Some("a body")
        );

        let partial = FieldInfos::from_pairs([("body", 0)]).unwrap();
        assert!(matches!(
            remap_document(&doc, &source, &partial),
            Err(Error::FieldNotFound(name)) if name == "title"
        ));
    }
}
