//! In-memory search cores.

use crate::core_manager::{CoreHandle, CoreManager};
use crate::error::CoreError;
use crate::program::{CoreSchema, ID_FIELD};
use crate::types::{Document, FieldValue};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const AVAILABILITY_POLL: Duration = Duration::from_millis(5);

#[derive(Debug)]
enum PendingOp {
    Add(Document),
    Delete(String),
}

/// A core that keeps committed documents in memory.
///
/// Changes are buffered until `commit`. Search is an AND over the query
/// tokens, matched against the tokens of every indexed text field.
#[derive(Debug)]
pub struct MemoryCore {
    schema: CoreSchema,
    committed: RwLock<BTreeMap<String, Document>>,
    pending: Mutex<Vec<PendingOp>>,
    closed: AtomicBool,
}

impl MemoryCore {
    /// Creates an empty core.
    pub fn new(schema: CoreSchema) -> Self {
        Self {
            schema,
            committed: RwLock::new(BTreeMap::new()),
            pending: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the committed document ids in order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.committed.read().keys().cloned().collect()
    }

    /// Returns the number of uncommitted changes.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn ensure_open(&self) -> Result<(), CoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CoreError::Request("core has been deleted".into()));
        }
        Ok(())
    }

    fn check_fields(&self, document: &Document) -> Result<(), CoreError> {
        for name in document.fields.keys() {
            if self.schema.field(name).is_none() {
                return Err(CoreError::Request(format!(
                    "document {} has undefined field {name}",
                    document.id
                )));
            }
        }
        Ok(())
    }

    fn matches(&self, document: &Document, terms: &[(Option<&str>, Vec<String>)]) -> bool {
        terms.iter().all(|(field, tokens)| {
            let mut available = BTreeSet::new();
            for (name, values) in &document.fields {
                if field.is_some_and(|f| f != name.as_str()) {
                    continue;
                }
                let Some(spec) = self.schema.field(name) else {
                    continue;
                };
                if !spec.is_indexed() || !spec.field_type.is_text() {
                    continue;
                }
                for value in values {
                    if let FieldValue::Text(text) = value {
                        available.extend(tokenize(text));
                    }
                }
            }
            tokens.iter().all(|t| available.contains(t))
        })
    }
}

impl CoreHandle for MemoryCore {
    fn add(&self, document: Document) -> Result<(), CoreError> {
        self.ensure_open()?;
        if document.id.is_empty() {
            return Err(CoreError::Request("document id cannot be empty".into()));
        }
        self.check_fields(&document)?;
        self.pending.lock().push(PendingOp::Add(document));
        Ok(())
    }

    fn delete_by_id(&self, id: &str) -> Result<(), CoreError> {
        self.ensure_open()?;
        self.pending.lock().push(PendingOp::Delete(id.to_string()));
        Ok(())
    }

    fn commit(&self) -> Result<(), CoreError> {
        self.ensure_open()?;
        let ops = std::mem::take(&mut *self.pending.lock());
        let mut committed = self.committed.write();
        for op in ops {
            match op {
                PendingOp::Add(document) => {
                    committed.insert(document.id.clone(), document);
                }
                PendingOp::Delete(id) => {
                    committed.remove(&id);
                }
            }
        }
        Ok(())
    }

    fn schema(&self) -> CoreSchema {
        self.schema.clone()
    }

    fn document(&self, id: &str) -> Option<Document> {
        self.committed.read().get(id).cloned()
    }

    fn search(&self, query: &str) -> Result<Vec<String>, CoreError> {
        let mut terms = Vec::new();
        for term in query.split_whitespace() {
            match term.split_once(':') {
                Some((field, text)) if field == ID_FIELD => {
                    return Ok(self
                        .committed
                        .read()
                        .get(text)
                        .map(|d| vec![d.id.clone()])
                        .unwrap_or_default());
                }
                Some((field, text)) if self.schema.field(field).is_some() => {
                    terms.push((Some(field), tokenize(text)));
                }
                _ => terms.push((None, tokenize(term))),
            }
        }
        terms.retain(|(_, tokens)| !tokens.is_empty());
        if terms.is_empty() {
            return Err(CoreError::Request(format!("query {query:?} has no terms")));
        }

        Ok(self
            .committed
            .read()
            .values()
            .filter(|d| self.matches(d, &terms))
            .map(|d| d.id.clone())
            .collect())
    }

    fn num_docs(&self) -> usize {
        self.committed.read().len()
    }
}

/// Splits text on whitespace and ASCII punctuation into lowercase tokens.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Manages [`MemoryCore`]s by name.
///
/// Supports fault injection for tests: the next creation can be made to
/// fail, and individual names can be made unavailable to `core_handle`.
#[derive(Debug, Default)]
pub struct MemoryCoreManager {
    cores: RwLock<HashMap<String, Arc<MemoryCore>>>,
    unavailable: RwLock<HashSet<String>>,
    fail_next_create: AtomicBool,
    created: AtomicU64,
    swapped: AtomicU64,
}

impl MemoryCoreManager {
    /// Creates a manager without cores.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `create_core` call fail.
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    /// Marks a core name (un)available to `core_handle`.
    pub fn set_available(&self, name: &str, available: bool) {
        let mut unavailable = self.unavailable.write();
        if available {
            unavailable.remove(name);
        } else {
            unavailable.insert(name.to_string());
        }
    }

    /// Returns the concrete core behind a name.
    #[must_use]
    pub fn core(&self, name: &str) -> Option<Arc<MemoryCore>> {
        self.cores.read().get(name).cloned()
    }

    /// Returns all core names, sorted.
    #[must_use]
    pub fn core_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cores.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns how many cores were created.
    #[must_use]
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Returns how many swaps were performed.
    #[must_use]
    pub fn swap_count(&self) -> u64 {
        self.swapped.load(Ordering::Relaxed)
    }
}

impl CoreManager for MemoryCoreManager {
    fn create_core(
        &self,
        name: &str,
        schema: &CoreSchema,
    ) -> Result<Arc<dyn CoreHandle>, CoreError> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(CoreError::Creation {
                name: name.to_string(),
                message: "injected failure".into(),
            });
        }
        if schema.field(ID_FIELD).is_none() {
            return Err(CoreError::Creation {
                name: name.to_string(),
                message: format!("schema has no {ID_FIELD} field"),
            });
        }

        let mut cores = self.cores.write();
        if cores.contains_key(name) {
            return Err(CoreError::AlreadyExists {
                name: name.to_string(),
            });
        }
        let core = Arc::new(MemoryCore::new(schema.clone()));
        cores.insert(name.to_string(), Arc::clone(&core));
        self.created.fetch_add(1, Ordering::Relaxed);
        debug!(core = %name, fields = schema.fields.len(), "created core");
        Ok(core)
    }

    fn swap_cores(&self, logical: &str, temporary: &str) -> Result<(), CoreError> {
        let mut cores = self.cores.write();
        let first = cores.remove(logical).ok_or_else(|| CoreError::NotFound {
            name: logical.to_string(),
        })?;
        let Some(second) = cores.remove(temporary) else {
            cores.insert(logical.to_string(), first);
            return Err(CoreError::NotFound {
                name: temporary.to_string(),
            });
        };
        cores.insert(logical.to_string(), second);
        cores.insert(temporary.to_string(), first);
        self.swapped.fetch_add(1, Ordering::Relaxed);
        debug!(logical = %logical, temporary = %temporary, "swapped cores");
        Ok(())
    }

    fn delete_core(&self, name: &str, purge_data: bool) -> Result<(), CoreError> {
        let core = self
            .cores
            .write()
            .remove(name)
            .ok_or_else(|| CoreError::NotFound {
                name: name.to_string(),
            })?;
        core.close();
        self.unavailable.write().remove(name);
        debug!(core = %name, purge_data, "deleted core");
        Ok(())
    }

    fn is_managed_core(&self, name: &str) -> bool {
        self.cores.read().contains_key(name)
    }

    fn core_handle(&self, name: &str, wait: Duration) -> Option<Arc<dyn CoreHandle>> {
        let deadline = Instant::now() + wait;
        loop {
            if !self.unavailable.read().contains(name) {
                if let Some(core) = self.core(name) {
                    return Some(core);
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(AVAILABILITY_POLL);
        }
    }
}
