//! Aggregation pipeline stages and find options.

use std::cmp::Ordering;

use catalogdb_codec::{Document, Value};

use crate::error::StoreResult;
use crate::filter::Filter;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// One aggregation stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keep documents matching the filter.
    Match(Filter),
    /// Emit one document per element of the array at path, with the array
    /// replaced by the element. Missing or empty arrays drop the document.
    Unwind(String),
    /// Keep only the listed paths.
    Project(Vec<String>),
    /// Stable sort by the listed keys.
    Sort(Vec<(String, SortOrder)>),
    /// Drop the first n documents.
    Skip(usize),
    /// Keep at most n documents.
    Limit(usize),
}

/// Options for `find`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Sort keys, applied before skip and limit.
    pub sort: Vec<(String, SortOrder)>,
    /// Number of documents to skip.
    pub skip: usize,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Paths to keep; `None` returns whole documents.
    pub projection: Option<Vec<String>>,
}

impl FindOptions {
    /// Add a sort key.
    #[must_use]
    pub fn sort_by(mut self, path: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((path.into(), order));
        self
    }

    /// Skip documents.
    #[must_use]
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Limit the result size.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Keep only the given paths.
    #[must_use]
    pub fn project(mut self, paths: Vec<String>) -> Self {
        self.projection = Some(paths);
        self
    }

    /// Express these options as pipeline stages.
    pub fn to_stages(&self) -> Vec<Stage> {
        let mut stages = Vec::new();
        if !self.sort.is_empty() {
            stages.push(Stage::Sort(self.sort.clone()));
        }
        if self.skip > 0 {
            stages.push(Stage::Skip(self.skip));
        }
        if let Some(limit) = self.limit {
            stages.push(Stage::Limit(limit));
        }
        if let Some(paths) = &self.projection {
            stages.push(Stage::Project(paths.clone()));
        }
        stages
    }
}

/// Run documents through a pipeline.
///
/// # Errors
///
/// Fails if a stage writes through a non-document path.
pub fn run_pipeline(mut docs: Vec<Document>, stages: &[Stage]) -> StoreResult<Vec<Document>> {
    for stage in stages {
        docs = match stage {
            Stage::Match(filter) => docs.into_iter().filter(|d| filter.matches(d)).collect(),
            Stage::Unwind(path) => {
                let mut out = Vec::new();
                for doc in docs {
                    let Some(items) = doc.get_array(path).map(<[Value]>::to_vec) else {
                        continue;
                    };
                    for item in items {
                        let mut copy = doc.clone();
                        copy.set_path(path, item)?;
                        out.push(copy);
                    }
                }
                out
            }
            Stage::Project(paths) => {
                let mut out = Vec::with_capacity(docs.len());
                for doc in &docs {
                    let mut projected = Document::new();
                    for path in paths {
                        if let Some(value) = doc.get_path(path) {
                            projected.set_path(path, value.clone())?;
                        }
                    }
                    out.push(projected);
                }
                out
            }
            Stage::Sort(keys) => {
                docs.sort_by(|a, b| compare_by(a, b, keys));
                docs
            }
            Stage::Skip(n) => docs.into_iter().skip(*n).collect(),
            Stage::Limit(n) => docs.into_iter().take(*n).collect(),
        };
    }
    Ok(docs)
}

fn compare_by(a: &Document, b: &Document, keys: &[(String, SortOrder)]) -> Ordering {
    for (path, order) in keys {
        let ord = match (a.get_path(path), b.get_path(path)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
        };
        let ord = match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn study(uid: i64, acl: &[&str]) -> Document {
        Document::new()
            .with("uid", uid)
            .with("_acl", Value::from(acl.to_vec()))
    }

    #[test]
    fn unwind_then_match_projects_acl_entries() {
        let docs = vec![study(1, &["u1__VIEW", "u2__WRITE"]), study(2, &[])];
        let out = run_pipeline(
            docs,
            &[
                Stage::Unwind("_acl".into()),
                Stage::Match(Filter::regex("_acl", "^u1__").unwrap()),
                Stage::Project(vec!["_acl".into()]),
            ],
        )
        .unwrap();
        assert_eq!(out, vec![Document::new().with("_acl", "u1__VIEW")]);
    }

    #[test]
    fn sort_skip_limit() {
        let docs = (1..=5).map(|v| Document::new().with("version", v as i64)).collect();
        let options = FindOptions::default()
            .sort_by("version", SortOrder::Descending)
            .skip(1)
            .limit(2);
        let out = run_pipeline(docs, &options.to_stages()).unwrap();
        let versions: Vec<i64> = out.iter().filter_map(|d| d.get_i64("version")).collect();
        assert_eq!(versions, vec![4, 3]);
    }
}
