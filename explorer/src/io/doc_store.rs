//! Durable per-element documentation, one JSON file per element id.
//!
//! Merge policy is first-write-wins per verb: once a verb slot holds text it
//! is never overwritten, while other verbs of the same element stay writable.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use jsonschema::{Validator, validator_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::core::action::DocVerb;

const DOC_RECORD_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/doc_record/v1.schema.json"
));

pub const SCHEMA_VERSION: u32 = 1;

/// Description text per verb. An empty string means undocumented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbDocs {
    pub tap: String,
    pub text: String,
    pub v_swipe: String,
    pub h_swipe: String,
    pub long_press: String,
}

impl VerbDocs {
    pub fn get(&self, verb: DocVerb) -> &str {
        match verb {
            DocVerb::Tap => &self.tap,
            DocVerb::Text => &self.text,
            DocVerb::VSwipe => &self.v_swipe,
            DocVerb::HSwipe => &self.h_swipe,
            DocVerb::LongPress => &self.long_press,
        }
    }

    fn slot_mut(&mut self, verb: DocVerb) -> &mut String {
        match verb {
            DocVerb::Tap => &mut self.tap,
            DocVerb::Text => &mut self.text,
            DocVerb::VSwipe => &mut self.v_swipe,
            DocVerb::HSwipe => &mut self.h_swipe,
            DocVerb::LongPress => &mut self.long_press,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationRecord {
    pub schema_version: u32,
    pub element_id: String,
    pub docs: VerbDocs,
}

impl DocumentationRecord {
    pub fn new(element_id: &str) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            element_id: element_id.to_string(),
            docs: VerbDocs::default(),
        }
    }

    pub fn is_documented(&self, verb: DocVerb) -> bool {
        !self.docs.get(verb).is_empty()
    }

    pub fn documented_verbs(&self) -> Vec<DocVerb> {
        DocVerb::ALL
            .into_iter()
            .filter(|verb| self.is_documented(*verb))
            .collect()
    }
}

/// Result of [`DocumentationStore::write_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Stored,
    /// The verb slot already held text; nothing was written.
    AlreadyDocumented,
    /// The description was blank; nothing was written.
    Blank,
}

/// Documentation directory (`apps/<app>/auto_docs`).
pub struct DocumentationStore {
    dir: PathBuf,
    validator: Validator,
}

impl DocumentationStore {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("create docs dir {}", dir.display()))?;
        let schema: Value =
            serde_json::from_str(DOC_RECORD_SCHEMA).context("parse doc record schema")?;
        let validator = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {err}"))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            validator,
        })
    }

    pub fn record_path(&self, element_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_file_stem(element_id)))
    }

    /// Load the record for `element_id`, or `None` if it was never written.
    pub fn load(&self, element_id: &str) -> Result<Option<DocumentationRecord>> {
        let path = self.record_path(element_id);
        if !path.exists() {
            return Ok(None);
        }
        let record = self.read_record(&path)?;
        if record.element_id != element_id {
            return Err(anyhow!(
                "doc record {} belongs to `{}`, expected `{element_id}`",
                path.display(),
                record.element_id
            ));
        }
        Ok(Some(record))
    }

    /// Store `text` under `verb` unless that slot is already documented.
    #[instrument(skip_all, fields(element_id = %element_id, verb = %verb))]
    pub fn write_if_absent(&self, element_id: &str, verb: DocVerb, text: &str) -> Result<WriteOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(WriteOutcome::Blank);
        }
        let mut record = self
            .load(element_id)?
            .unwrap_or_else(|| DocumentationRecord::new(element_id));
        if record.is_documented(verb) {
            info!("documentation already exists, skipping");
            return Ok(WriteOutcome::AlreadyDocumented);
        }
        *record.docs.slot_mut(verb) = text.to_string();
        self.write_record(&record)?;
        debug!(path = %self.record_path(element_id).display(), "documentation stored");
        Ok(WriteOutcome::Stored)
    }

    /// Every record in the store, ordered by element id.
    pub fn list(&self) -> Result<Vec<DocumentationRecord>> {
        let mut records = Vec::new();
        for entry in
            fs::read_dir(&self.dir).with_context(|| format!("read docs dir {}", self.dir.display()))?
        {
            let path = entry.context("read docs dir entry")?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                records.push(self.read_record(&path)?);
            }
        }
        records.sort_by(|a, b| a.element_id.cmp(&b.element_id));
        Ok(records)
    }

    fn read_record(&self, path: &Path) -> Result<DocumentationRecord> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read doc record {}", path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("parse doc record {}", path.display()))?;
        self.validate(&value)
            .with_context(|| format!("validate doc record {}", path.display()))?;
        serde_json::from_value(value)
            .with_context(|| format!("deserialize doc record {}", path.display()))
    }

    fn write_record(&self, record: &DocumentationRecord) -> Result<()> {
        let value = serde_json::to_value(record).context("serialize doc record")?;
        self.validate(&value)?;
        let mut buf = serde_json::to_string_pretty(&value)?;
        buf.push('\n');
        super::write_atomic(&self.record_path(&record.element_id), buf.as_bytes())
    }

    fn validate(&self, value: &Value) -> Result<()> {
        if self.validator.is_valid(value) {
            return Ok(());
        }
        let messages = self
            .validator
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        Err(anyhow!(
            "doc record schema validation failed: {}",
            messages.join("; ")
        ))
    }
}

/// Map an element id to a file stem.
///
/// Bytes outside `[A-Za-z0-9._-]` are written as `%XX`, so distinct ids never
/// share a file. `%` itself is encoded, which keeps the mapping reversible.
pub fn encode_file_stem(element_id: &str) -> String {
    let mut stem = String::with_capacity(element_id.len());
    for byte in element_id.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{byte:02X}"));
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, DocumentationStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = DocumentationStore::open(&temp.path().join("auto_docs")).expect("open");
        (temp, store)
    }

    #[test]
    fn first_write_creates_record_with_empty_slots() {
        let (_temp, store) = store();
        let outcome = store
            .write_if_absent("com.app.id_nav", DocVerb::Tap, "opens the side drawer")
            .expect("write");
        assert_eq!(outcome, WriteOutcome::Stored);

        let record = store.load("com.app.id_nav").expect("load").expect("record");
        assert_eq!(record.docs.tap, "opens the side drawer");
        assert_eq!(record.documented_verbs(), vec![DocVerb::Tap]);
        assert_eq!(record.docs.text, "");
        assert_eq!(record.docs.long_press, "");
    }

    #[test]
    fn second_write_to_same_verb_is_a_no_op() {
        let (_temp, store) = store();
        store
            .write_if_absent("app.id_btn", DocVerb::Tap, "first")
            .expect("write");
        let before = fs::read(store.record_path("app.id_btn")).expect("read");

        let outcome = store
            .write_if_absent("app.id_btn", DocVerb::Tap, "second")
            .expect("write");
        assert_eq!(outcome, WriteOutcome::AlreadyDocumented);
        assert_eq!(fs::read(store.record_path("app.id_btn")).expect("read"), before);
    }

    #[test]
    fn other_verbs_remain_writable() {
        let (_temp, store) = store();
        store.write_if_absent("list", DocVerb::Tap, "opens item").expect("tap");
        store
            .write_if_absent("list", DocVerb::VSwipe, "scrolls the list")
            .expect("swipe");
        let record = store.load("list").expect("load").expect("record");
        assert_eq!(record.docs.tap, "opens item");
        assert_eq!(record.docs.v_swipe, "scrolls the list");
    }

    #[test]
    fn blank_text_is_not_stored() {
        let (_temp, store) = store();
        let outcome = store.write_if_absent("x", DocVerb::Tap, "  ").expect("write");
        assert_eq!(outcome, WriteOutcome::Blank);
        assert!(store.load("x").expect("load").is_none());
    }

    #[test]
    fn record_not_matching_schema_is_rejected() {
        let (_temp, store) = store();
        fs::write(
            store.record_path("bad"),
            r#"{"schema_version":1,"element_id":"bad","docs":{"tap":"x"}}"#,
        )
        .expect("write");
        let err = store.load("bad").unwrap_err();
        assert!(format!("{err:#}").contains("schema validation failed"));
    }

    #[test]
    fn record_for_other_element_is_rejected() {
        let (_temp, store) = store();
        store.write_if_absent("a:b", DocVerb::Tap, "x").expect("write");
        fs::copy(store.record_path("a:b"), store.record_path("a_b")).expect("copy");
        let err = store.load("a_b").unwrap_err();
        assert!(err.to_string().contains("belongs to `a:b`"));
    }

    #[test]
    fn ids_differing_only_in_symbols_get_separate_files() {
        let (_temp, store) = store();
        let ids = [
            "android.widget.TextView_100_50_设置",
            "android.widget.TextView_100_50_关于",
            "android.widget.Button_80_40_OK?",
            "android.widget.Button_80_40_OK!",
            "android.widget.Button_80_40_OK_",
        ];
        for (i, id) in ids.iter().enumerate() {
            let outcome = store
                .write_if_absent(id, DocVerb::Tap, &format!("control {i}"))
                .expect("write");
            assert_eq!(outcome, WriteOutcome::Stored, "{id}");
        }
        for (i, id) in ids.iter().enumerate() {
            let record = store.load(id).expect("load").expect("record");
            assert_eq!(record.element_id, *id);
            assert_eq!(record.docs.tap, format!("control {i}"));
        }
        assert_eq!(store.list().expect("list").len(), ids.len());
    }

    #[test]
    fn list_returns_records_sorted() {
        let (_temp, store) = store();
        store.write_if_absent("zeta", DocVerb::Tap, "z").expect("write");
        store.write_if_absent("alpha", DocVerb::Text, "a").expect("write");
        let ids: Vec<String> = store
            .list()
            .expect("list")
            .into_iter()
            .map(|r| r.element_id)
            .collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
    }

    #[test]
    fn file_stem_escapes_path_characters() {
        assert_eq!(encode_file_stem("com.app.id_btn"), "com.app.id_btn");
        assert_eq!(encode_file_stem("a/b c:d"), "a%2Fb%20c%3Ad");
        assert_eq!(encode_file_stem("50%"), "50%25");
        assert_eq!(encode_file_stem("设"), "%E8%AE%BE");
    }
}
