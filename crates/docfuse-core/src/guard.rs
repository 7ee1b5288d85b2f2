//! Content-addressed admission control.
//!
//! Two fingerprints identify a document:
//!
//! - the **file hash**, SHA-256 over the raw bytes, catches byte-identical
//!   re-uploads without extracting anything;
//! - the **content hash**, SHA-256 over the normalized extracted text
//!   (lower-cased, whitespace collapsed), catches the same text delivered
//!   in a different file.
//!
//! The file hash is always consulted first. Admission is insert-if-absent:
//! a `New` decision immediately reserves both hashes under the new document
//! id, so a concurrent ingest of the same bytes sees the reservation and is
//! reported as a duplicate instead of being admitted twice.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

use crate::models::{DocId, Document};

/// SHA-256 (hex) of raw bytes.
pub fn file_hash(raw: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    format!("{:x}", hasher.finalize())
}

/// Case-fold and collapse all whitespace runs to single spaces.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// SHA-256 (hex) of already-normalized text.
pub fn content_hash(normalized: &str) -> String {
    file_hash(normalized.as_bytes())
}

/// Both identities of an incoming document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub file_hash: String,
    pub content_hash: String,
}

impl Fingerprint {
    /// Fingerprint raw bytes and their extracted text.
    pub fn compute(raw: &[u8], extracted_text: &str) -> Self {
        Self {
            file_hash: file_hash(raw),
            content_hash: content_hash(&normalize_text(extracted_text)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Admitted; both hashes are now reserved under this id.
    New(DocId),
    DuplicateFile(DocId),
    DuplicateContent(DocId),
}

/// Hash registry for committed and in-flight documents.
#[derive(Debug, Default)]
pub struct DuplicateGuard {
    by_file: HashMap<String, DocId>,
    by_content: HashMap<String, DocId>,
    pending: HashSet<DocId>,
}

impl DuplicateGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cheap pre-extraction lookup by file hash.
    pub fn find_by_file_hash(&self, file_hash: &str) -> Option<&DocId> {
        self.by_file.get(file_hash)
    }

    /// Decide admission and, for `New`, reserve both hashes.
    pub fn admit(&mut self, fingerprint: &Fingerprint) -> AdmissionDecision {
        if let Some(existing) = self.by_file.get(&fingerprint.file_hash) {
            return AdmissionDecision::DuplicateFile(existing.clone());
        }
        if let Some(existing) = self.by_content.get(&fingerprint.content_hash) {
            return AdmissionDecision::DuplicateContent(existing.clone());
        }

        let id = DocId::generate();
        self.by_file
            .insert(fingerprint.file_hash.clone(), id.clone());
        self.by_content
            .insert(fingerprint.content_hash.clone(), id.clone());
        self.pending.insert(id.clone());
        AdmissionDecision::New(id)
    }

    /// Drop a reservation made by [`admit`](Self::admit) that will never be committed.
    pub fn release(&mut self, doc_id: &DocId, fingerprint: &Fingerprint) {
        if !self.pending.remove(doc_id) {
            return;
        }
        if self.by_file.get(&fingerprint.file_hash) == Some(doc_id) {
            self.by_file.remove(&fingerprint.file_hash);
        }
        if self.by_content.get(&fingerprint.content_hash) == Some(doc_id) {
            self.by_content.remove(&fingerprint.content_hash);
        }
    }

    /// Record a committed document. Promotes a reservation if there is one.
    pub fn register(&mut self, document: &Document) {
        self.pending.remove(&document.id);
        self.by_file
            .insert(document.file_hash.clone(), document.id.clone());
        self.by_content
            .insert(document.content_hash.clone(), document.id.clone());
    }

    /// Forget a deleted document so its content can be ingested again.
    pub fn forget(&mut self, document: &Document) {
        if self.by_file.get(&document.file_hash) == Some(&document.id) {
            self.by_file.remove(&document.file_hash);
        }
        if self.by_content.get(&document.content_hash) == Some(&document.id) {
            self.by_content.remove(&document.content_hash);
        }
    }

    pub fn is_pending(&self, doc_id: &DocId) -> bool {
        self.pending.contains(doc_id)
    }

    /// Another document already holding either of `document`'s hashes.
    /// A reservation made for `document` itself is not a conflict.
    pub fn conflict(&self, document: &Document) -> Option<&DocId> {
        [
            self.by_file.get(&document.file_hash),
            self.by_content.get(&document.content_hash),
        ]
        .into_iter()
        .flatten()
        .find(|id| *id != &document.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(raw: &[u8], text: &str) -> Fingerprint {
        Fingerprint::compute(raw, text)
    }

    fn doc_for(id: &DocId, fingerprint: &Fingerprint) -> Document {
        Document {
            id: id.clone(),
            filename: "f.txt".to_string(),
            source: None,
            file_hash: fingerprint.file_hash.clone(),
            content_hash: fingerprint.content_hash.clone(),
            created_at: 0,
            chunk_ids: Vec::new(),
            keyword_only: false,
        }
    }

    #[test]
    fn test_normalize_text_collapses_and_folds() {
        assert_eq!(normalize_text("  Hello\n\tWORLD  again "), "hello world again");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_file_hash_is_sha256_hex() {
        assert_eq!(
            file_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_content_hash_ignores_case_and_spacing() {
        let a = fp(b"one", "Refund  Policy\n30 days");
        let b = fp(b"two", "refund policy 30 DAYS");
        assert_ne!(a.file_hash, b.file_hash);
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn test_admit_new_then_duplicate_file() {
        let mut guard = DuplicateGuard::new();
        let f = fp(b"bytes", "text");
        let id = match guard.admit(&f) {
            AdmissionDecision::New(id) => id,
            other => panic!("expected New, got {:?}", other),
        };
        assert!(guard.is_pending(&id));
        assert_eq!(guard.admit(&f), AdmissionDecision::DuplicateFile(id));
    }

    #[test]
    fn test_admit_duplicate_content_from_other_bytes() {
        let mut guard = DuplicateGuard::new();
        let first = fp(b"a", "Same Text");
        let AdmissionDecision::New(id) = guard.admit(&first) else {
            panic!("expected New");
        };
        let second = fp(b"b", "same   text");
        assert_eq!(guard.admit(&second), AdmissionDecision::DuplicateContent(id));
    }

    #[test]
    fn test_file_hash_checked_before_content_hash() {
        let mut guard = DuplicateGuard::new();
        let f = fp(b"a", "x");
        let AdmissionDecision::New(id) = guard.admit(&f) else {
            panic!("expected New");
        };
        // Same bytes and same content: the file match wins.
        assert!(matches!(guard.admit(&f), AdmissionDecision::DuplicateFile(d) if d == id));
    }

    #[test]
    fn test_release_frees_both_hashes() {
        let mut guard = DuplicateGuard::new();
        let f = fp(b"a", "x");
        let AdmissionDecision::New(id) = guard.admit(&f) else {
            panic!("expected New");
        };
        guard.release(&id, &f);
        assert!(!guard.is_pending(&id));
        assert!(guard.find_by_file_hash(&f.file_hash).is_none());
        assert!(matches!(guard.admit(&f), AdmissionDecision::New(_)));
    }

    #[test]
    fn test_release_ignores_committed_documents() {
        let mut guard = DuplicateGuard::new();
        let f = fp(b"a", "x");
        let AdmissionDecision::New(id) = guard.admit(&f) else {
            panic!("expected New");
        };
        guard.register(&doc_for(&id, &f));
        guard.release(&id, &f);
        assert_eq!(guard.find_by_file_hash(&f.file_hash), Some(&id));
    }

    #[test]
    fn test_forget_allows_reingest() {
        let mut guard = DuplicateGuard::new();
        let f = fp(b"a", "x");
        let AdmissionDecision::New(id) = guard.admit(&f) else {
            panic!("expected New");
        };
        let doc = doc_for(&id, &f);
        guard.register(&doc);
        guard.forget(&doc);
        assert!(matches!(guard.admit(&f), AdmissionDecision::New(new_id) if new_id != id));
    }

    #[test]
    fn test_conflict_reports_foreign_owner() {
        let mut guard = DuplicateGuard::new();
        let f = fp(b"a", "x");
        let AdmissionDecision::New(id) = guard.admit(&f) else {
            panic!("expected New");
        };
        assert_eq!(guard.conflict(&doc_for(&id, &f)), None);
        assert_eq!(guard.conflict(&doc_for(&DocId::from("other"), &f)), Some(&id));
        assert_eq!(guard.conflict(&doc_for(&DocId::from("x"), &fp(b"b", "y"))), None);
    }
}
