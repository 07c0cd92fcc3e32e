// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Label taxonomy: class index to human-readable name

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

/// One class of the taxonomy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyEntry {
    /// WordNet synset id when the source provides one (e.g. "n01440764")
    pub synset: Option<String>,
    /// Raw label as stored in the taxonomy file (e.g. "golden_retriever")
    pub label: String,
}

/// Fixed, ordered set of labels the classifier can output
#[derive(Debug, Clone)]
pub struct Taxonomy {
    entries: Vec<TaxonomyEntry>,
}

impl Taxonomy {
    /// Build a taxonomy from plain labels (index = position)
    pub fn from_labels<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<TaxonomyEntry> = labels
            .into_iter()
            .map(|label| TaxonomyEntry {
                synset: None,
                label: label.into(),
            })
            .collect();

        if entries.is_empty() {
            anyhow::bail!("Taxonomy must contain at least one label");
        }

        Ok(Self { entries })
    }

    /// Load a taxonomy file
    ///
    /// Accepts the Keras `imagenet_class_index.json` layout
    /// (`{"0": ["n01440764", "tench"], ...}`) or a text file with one label per line.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read taxonomy file {}", path.display()))?;

        let taxonomy = if content.trim_start().starts_with('{') {
            Self::parse_class_index_json(&content)
                .with_context(|| format!("Invalid class index JSON in {}", path.display()))?
        } else {
            Self::parse_lines(&content)?
        };

        tracing::info!(
            "✅ Loaded taxonomy with {} classes from {}",
            taxonomy.len(),
            path.display()
        );
        Ok(taxonomy)
    }

    /// Parse the Keras class index format
    pub fn parse_class_index_json(content: &str) -> Result<Self> {
        let raw: BTreeMap<String, (String, String)> =
            serde_json::from_str(content).context("Failed to parse class index JSON")?;

        let mut indexed = BTreeMap::new();
        for (key, (synset, label)) in raw {
            let index: usize = key
                .parse()
                .with_context(|| format!("Class index key '{}' is not a number", key))?;
            indexed.insert(
                index,
                TaxonomyEntry {
                    synset: Some(synset),
                    label,
                },
            );
        }

        // Indices must be exactly 0..N
        for (expected, index) in indexed.keys().enumerate() {
            if *index != expected {
                anyhow::bail!("Class index has a gap: expected {}, found {}", expected, index);
            }
        }

        if indexed.is_empty() {
            anyhow::bail!("Taxonomy must contain at least one label");
        }

        Ok(Self {
            entries: indexed.into_values().collect(),
        })
    }

    /// Parse one label per line, skipping blank lines
    pub fn parse_lines(content: &str) -> Result<Self> {
        Self::from_labels(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty()),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TaxonomyEntry> {
        self.entries.get(index)
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.label.as_str())
    }
}
