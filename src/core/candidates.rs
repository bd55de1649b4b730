//! Scan candidates: raw material for building rules.
//!
//! The scan service reports regex and keyword candidates per file. Before a
//! user curates them they are merged across the selected files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A regex suggested by the scan service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexCandidate {
    pub id: String,
    pub regex: String,
    pub entity_type: String,
}

/// A keyword seen in scanned content, with its occurrence count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCandidate {
    pub keyword: String,
    pub count: u64,
}

/// Candidates reported for one scanned file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCandidates {
    pub file_id: String,
    #[serde(default)]
    pub regex_candidates: Vec<RegexCandidate>,
    #[serde(default)]
    pub keyword_candidates: Vec<KeywordCandidate>,
}

/// Candidates merged across files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CandidatePool {
    pub regexes: Vec<RegexCandidate>,
    pub keywords: Vec<KeywordCandidate>,
}

impl CandidatePool {
    /// Merge candidates from several files
    ///
    /// Regex candidates are keyed by id: the first occurrence fixes the
    /// position, later ones replace the value. Blank regexes are skipped.
    /// Keyword counts are summed, in first-seen order.
    pub fn collect<'a>(files: impl IntoIterator<Item = &'a FileCandidates>) -> Self {
        let mut regexes: Vec<RegexCandidate> = Vec::new();
        let mut regex_index: HashMap<String, usize> = HashMap::new();
        let mut keywords: Vec<KeywordCandidate> = Vec::new();
        let mut keyword_index: HashMap<String, usize> = HashMap::new();

        for file in files {
            for candidate in &file.regex_candidates {
                if candidate.regex.is_empty() {
                    continue;
                }
                match regex_index.get(&candidate.id) {
                    Some(&i) => regexes[i] = candidate.clone(),
                    None => {
                        regex_index.insert(candidate.id.clone(), regexes.len());
                        regexes.push(candidate.clone());
                    }
                }
            }

            for candidate in &file.keyword_candidates {
                match keyword_index.get(&candidate.keyword) {
                    Some(&i) => keywords[i].count += candidate.count,
                    None => {
                        keyword_index.insert(candidate.keyword.clone(), keywords.len());
                        keywords.push(candidate.clone());
                    }
                }
            }
        }

        Self { regexes, keywords }
    }

    /// Look up a regex candidate by id
    pub fn regex(&self, id: &str) -> Option<&RegexCandidate> {
        self.regexes.iter().find(|c| c.id == id)
    }
}
