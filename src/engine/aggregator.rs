//! Frequency counting per signature

use std::collections::HashMap;

use super::extractor::CandidateSequence;

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceCount {
    pub signature: String,
    pub domains: Vec<String>,
    pub length: usize,
    pub count: u32,
    /// Span of every occurrence, in extraction order
    pub spans_ms: Vec<i64>,
}

/// Signature -> count, iterated in first-seen order
///
/// First-seen order keeps qualification deterministic when a signature and
/// its reverse both cross the threshold in the same pass.
#[derive(Debug, Default)]
pub struct FrequencyTable {
    entries: Vec<SequenceCount>,
    index: HashMap<String, usize>,
}

impl FrequencyTable {
    pub fn from_sequences(sequences: impl IntoIterator<Item = CandidateSequence>) -> Self {
        let mut table = Self::default();
        for sequence in sequences {
            table.add(sequence);
        }
        table
    }

    pub fn add(&mut self, sequence: CandidateSequence) {
        match self.index.get(&sequence.signature) {
            Some(&slot) => {
                let entry = &mut self.entries[slot];
                entry.count += 1;
                entry.spans_ms.push(sequence.span_ms);
            }
            None => {
                self.index
                    .insert(sequence.signature.clone(), self.entries.len());
                self.entries.push(SequenceCount {
                    signature: sequence.signature,
                    domains: sequence.domains,
                    length: sequence.length,
                    count: 1,
                    spans_ms: vec![sequence.span_ms],
                });
            }
        }
    }

    pub fn get(&self, signature: &str) -> Option<&SequenceCount> {
        self.index.get(signature).map(|&slot| &self.entries[slot])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SequenceCount> {
        self.entries.iter()
    }
}
