//! Duplicate grouping over OCR text and pixel similarity.
//!
//! A candidate is a duplicate of a record only when BOTH the text score and
//! the image score reach their thresholds. Two clustering strategies are
//! available:
//!
//! - [`ClusterStrategy::RepresentativeGreedy`] compares each record against
//!   the representatives of the groups opened so far, in creation order, and
//!   joins the first one that matches. Members are never compared with each
//!   other, so two members of one group may fail the thresholds against each
//!   other.
//! - [`ClusterStrategy::TransitiveClosure`] compares every pair and merges
//!   connected components.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::similarity::{VisualComparator, text_similarity};

/// One input screenshot and the features extracted from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub name: String,
    /// Normalized OCR text of the top region; empty when OCR found nothing or failed.
    pub extracted_text: String,
    pub text_hash: String,
    pub file_size: u64,
    /// blake3 digest of the file bytes, when the file could be read.
    pub content_hash: Option<String>,
}

impl ImageRecord {
    pub fn new(path: impl Into<PathBuf>, extracted_text: impl Into<String>) -> Self {
        let path = path.into();
        let extracted_text = extracted_text.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let text_hash = blake3::hash(extracted_text.as_bytes()).to_hex()[..8].to_string();
        Self {
            path,
            name,
            extracted_text,
            text_hash,
            file_size: 0,
            content_hash: None,
        }
    }

    pub fn with_file_size(mut self, file_size: u64) -> Self {
        self.file_size = file_size;
        self
    }

    pub fn with_content_hash(mut self, content_hash: impl Into<String>) -> Self {
        self.content_hash = Some(content_hash.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub text: f64,
    pub image: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            text: 0.80,
            image: 0.95,
        }
    }
}

impl Thresholds {
    pub fn new(text: f64, image: f64) -> Self {
        Self { text, image }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("text similarity threshold", self.text),
            ("image similarity threshold", self.image),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { name, value });
            }
        }
        Ok(())
    }

    /// Both gates must pass.
    pub fn accepts(&self, scores: &MatchScores) -> bool {
        scores.text >= self.text && scores.image >= self.image
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchScores {
    pub text: f64,
    pub image: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterStrategy {
    #[default]
    RepresentativeGreedy,
    TransitiveClosure,
}

impl fmt::Display for ClusterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterStrategy::RepresentativeGreedy => write!(f, "representative-greedy"),
            ClusterStrategy::TransitiveClosure => write!(f, "transitive-closure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub record: ImageRecord,
    /// Name of the record this member was matched against.
    pub matched_with: String,
    pub scores: MatchScores,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub representative: ImageRecord,
    pub members: Vec<GroupMember>,
}

impl DuplicateGroup {
    fn new(representative: ImageRecord) -> Self {
        Self {
            representative,
            members: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len() + 1
    }

    pub fn is_singleton(&self) -> bool {
        self.members.is_empty()
    }
}

/// Result of one grouping pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grouping {
    pub groups: Vec<DuplicateGroup>,
    pub thresholds: Thresholds,
    pub strategy: ClusterStrategy,
}

impl Grouping {
    /// Non-representative members, in group order.
    pub fn duplicates(&self) -> impl Iterator<Item = &GroupMember> {
        self.groups.iter().flat_map(|g| g.members.iter())
    }

    pub fn duplicate_count(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }

    pub fn unique_count(&self) -> usize {
        self.groups.len()
    }

    pub fn total(&self) -> usize {
        self.groups.iter().map(DuplicateGroup::len).sum()
    }
}

/// Score a candidate against an existing record.
pub fn compare(
    candidate: &ImageRecord,
    existing: &ImageRecord,
    comparator: &dyn VisualComparator,
) -> MatchScores {
    let scores = MatchScores {
        text: text_similarity(&candidate.extracted_text, &existing.extracted_text),
        image: comparator.similarity(&candidate.path, &existing.path),
    };
    log::debug!(
        "{} vs {}: text={:.3}, image={:.3}",
        candidate.name,
        existing.name,
        scores.text,
        scores.image
    );
    scores
}

/// Partition `records` into duplicate groups, preserving input order.
pub fn group_records(
    records: Vec<ImageRecord>,
    thresholds: Thresholds,
    strategy: ClusterStrategy,
    comparator: &dyn VisualComparator,
) -> Grouping {
    let groups = match strategy {
        ClusterStrategy::RepresentativeGreedy => group_greedy(records, &thresholds, comparator),
        ClusterStrategy::TransitiveClosure => group_transitive(records, &thresholds, comparator),
    };
    log::info!(
        "Grouped into {} group(s) using {}",
        groups.len(),
        strategy
    );
    Grouping {
        groups,
        thresholds,
        strategy,
    }
}

fn group_greedy(
    records: Vec<ImageRecord>,
    thresholds: &Thresholds,
    comparator: &dyn VisualComparator,
) -> Vec<DuplicateGroup> {
    let mut groups: Vec<DuplicateGroup> = Vec::new();

    for record in records {
        let mut matched = None;
        for (index, group) in groups.iter().enumerate() {
            let scores = compare(&record, &group.representative, comparator);
            if thresholds.accepts(&scores) {
                matched = Some((index, scores));
                break;
            }
        }

        match matched {
            Some((index, scores)) => {
                let group = &mut groups[index];
                log::info!("{} is a duplicate of {}", record.name, group.representative.name);
                let matched_with = group.representative.name.clone();
                group.members.push(GroupMember {
                    record,
                    matched_with,
                    scores,
                });
            }
            None => {
                log::debug!("{} opens group {}", record.name, groups.len() + 1);
                groups.push(DuplicateGroup::new(record));
            }
        }
    }

    groups
}

/// Disjoint-set forest over record indices.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

fn group_transitive(
    records: Vec<ImageRecord>,
    thresholds: &Thresholds,
    comparator: &dyn VisualComparator,
) -> Vec<DuplicateGroup> {
    let len = records.len();
    let mut sets = UnionFind::new(len);
    // first accepted edge seen for each record, in either direction
    let mut links: Vec<Option<(usize, MatchScores)>> = vec![None; len];

    for i in 1..len {
        for j in 0..i {
            let scores = compare(&records[i], &records[j], comparator);
            if thresholds.accepts(&scores) {
                sets.union(i, j);
                if links[i].is_none() {
                    links[i] = Some((j, scores));
                }
                if links[j].is_none() {
                    links[j] = Some((i, scores));
                }
            }
        }
    }

    let names: Vec<String> = records.iter().map(|r| r.name.clone()).collect();
    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<DuplicateGroup> = Vec::new();

    for (i, record) in records.into_iter().enumerate() {
        let root = sets.find(i);
        match group_of_root.get(&root) {
            Some(&index) => {
                // every non-first member of a component has at least one edge
                let (j, scores) = links[i].unwrap_or_default();
                groups[index].members.push(GroupMember {
                    record,
                    matched_with: names[j].clone(),
                    scores,
                });
            }
            None => {
                group_of_root.insert(root, groups.len());
                groups.push(DuplicateGroup::new(record));
            }
        }
    }

    groups
}
