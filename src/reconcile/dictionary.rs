//! Synonym and value-substitution dictionaries.
//!
//! Both dictionaries share one on-disk shape, a JSON object mapping a
//! canonical term to its variants. Matching never walks that shape directly:
//! it is inverted into a lookup index once per run.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::reconcile::error::{ReconcileError, Result};
use crate::reconcile::normalize::normalize_header;

/// Canonical term → variants, as persisted by the dictionary store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dictionary {
    entries: BTreeMap<String, Vec<String>>,
}

impl Dictionary {
    /// Creates an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a dictionary file.
    ///
    /// A missing or unreadable file yields an empty dictionary so that a run
    /// can proceed without one.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "dictionary file absent, using empty dictionary");
            return Self::default();
        }
        match fs::read_to_string(path)
            .map_err(ReconcileError::from)
            .and_then(|data| serde_json::from_str::<Dictionary>(&data).map_err(ReconcileError::from))
        {
            Ok(dictionary) => dictionary,
            Err(error) => {
                warn!(path = %path.display(), %error, "unreadable dictionary file ignored");
                Self::default()
            }
        }
    }

    /// Persists the dictionary as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Inserts or replaces an entry. Variants are trimmed, de-duplicated and
    /// sorted; blank variants are dropped.
    pub fn upsert<I, S>(&mut self, canonical: &str, variants: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let canonical = canonical.trim();
        if canonical.is_empty() {
            return;
        }
        let variants: BTreeSet<String> = variants
            .into_iter()
            .map(|variant| variant.as_ref().trim().to_string())
            .filter(|variant| !variant.is_empty())
            .collect();
        self.entries
            .insert(canonical.to_string(), variants.into_iter().collect());
    }

    /// Removes an entry, returning whether it existed.
    pub fn remove(&mut self, canonical: &str) -> bool {
        self.entries.remove(canonical).is_some()
    }

    /// Variants registered for a canonical term.
    pub fn get(&self, canonical: &str) -> Option<&[String]> {
        self.entries.get(canonical).map(Vec::as_slice)
    }

    /// Iterates over entries in canonical-term order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        self.entries
            .iter()
            .map(|(canonical, variants)| (canonical.as_str(), variants.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the header-matching index. The canonical term is registered as
    /// a variant of itself; on conflicting variants the later entry wins.
    pub fn synonym_index(&self) -> SynonymIndex {
        let mut lookup = HashMap::new();
        for (canonical, variants) in &self.entries {
            for variant in variants.iter().chain(std::iter::once(canonical)) {
                lookup.insert(normalize_header(variant), canonical.clone());
            }
        }
        SynonymIndex { lookup }
    }

    /// Builds the literal replacement index. Empty literals are skipped.
    pub fn substitution_index(&self) -> SubstitutionIndex {
        let mut lookup = HashMap::new();
        for (canonical, literals) in &self.entries {
            for literal in literals.iter().filter(|literal| !literal.is_empty()) {
                lookup.insert(literal.clone(), canonical.clone());
            }
        }
        SubstitutionIndex { lookup }
    }
}

impl<K, V, S> FromIterator<(K, V)> for Dictionary
where
    K: AsRef<str>,
    V: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut dictionary = Dictionary::new();
        for (canonical, variants) in iter {
            dictionary.upsert(canonical.as_ref(), variants);
        }
        dictionary
    }
}

/// Normalized variant → canonical term.
#[derive(Debug, Clone, Default)]
pub struct SynonymIndex {
    lookup: HashMap<String, String>,
}

impl SynonymIndex {
    /// Looks up an already normalized header.
    pub fn canonical(&self, normalized: &str) -> Option<&str> {
        self.lookup.get(normalized).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}

/// Literal value → replacement value.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionIndex {
    lookup: HashMap<String, String>,
}

impl SubstitutionIndex {
    /// Replacement registered for an exact literal.
    pub fn replacement(&self, literal: &str) -> Option<&str> {
        self.lookup.get(literal).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}
