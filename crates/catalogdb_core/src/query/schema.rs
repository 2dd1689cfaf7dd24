//! Queryable fields per entity kind.

use crate::error::{CatalogError, CatalogResult};
use crate::types::{fields, EntityKind};

/// How a field's values are typed and compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Entity uid, stored under the private key.
    Uid,
    /// Owning study uid, stored under the private key.
    StudyUid,
    /// Free text.
    Text,
    /// Whole number.
    Integer,
    /// Floating point number.
    Decimal,
    /// `true` / `false`.
    Boolean,
    /// `yyyyMMddHHmmss` timestamp, compared as text.
    Date,
    /// Text attribute namespace, `attributes.<key>`.
    Attributes,
    /// Boolean attribute namespace, `battributes.<key>`.
    BoolAttributes,
    /// Numeric attribute namespace, `nattributes.<key>`.
    NumAttributes,
    /// Annotation mini-grammar.
    Annotation,
    /// Variable set an annotation set follows.
    VariableSet,
    /// Version selector.
    Version,
    /// Release snapshot selector.
    Snapshot,
    /// Release a version was created in.
    Release,
    /// Business status id.
    Status,
    /// Lifecycle status id.
    InternalStatus,
}

impl FieldKind {
    /// Whether the field addresses a namespace through `name.<key>`.
    #[must_use]
    pub const fn is_namespace(self) -> bool {
        matches!(
            self,
            Self::Attributes | Self::BoolAttributes | Self::NumAttributes
        )
    }
}

/// A queryable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Public field name.
    pub name: &'static str,
    /// Stored path.
    pub path: &'static str,
    /// Value class.
    pub kind: FieldKind,
}

const fn field(name: &'static str, path: &'static str, kind: FieldKind) -> FieldDescriptor {
    FieldDescriptor { name, path, kind }
}

/// Fields every entity answers to.
const COMMON: &[FieldDescriptor] = &[
    field("uid", fields::UID, FieldKind::Uid),
    field("studyUid", fields::STUDY_UID, FieldKind::StudyUid),
    field("id", fields::ID, FieldKind::Text),
    field("version", fields::VERSION, FieldKind::Version),
    field("snapshot", fields::RELEASE_FROM_VERSION, FieldKind::Snapshot),
    field("release", fields::RELEASE, FieldKind::Release),
    field("status", fields::STATUS_ID, FieldKind::Status),
    field("internalStatus", fields::INTERNAL_STATUS_ID, FieldKind::InternalStatus),
    field("creationDate", fields::CREATION_DATE, FieldKind::Date),
    field("modificationDate", fields::MODIFICATION_DATE, FieldKind::Date),
    field("attributes", "attributes", FieldKind::Attributes),
    field("battributes", "attributes", FieldKind::BoolAttributes),
    field("nattributes", "attributes", FieldKind::NumAttributes),
    field("annotation", fields::ANNOTATION_SETS, FieldKind::Annotation),
    field(
        "variableSet",
        "annotationSets.variableSetId",
        FieldKind::VariableSet,
    ),
];

const PROJECT: &[FieldDescriptor] = &[
    field("name", "name", FieldKind::Text),
    field("currentRelease", "currentRelease", FieldKind::Integer),
];

const STUDY: &[FieldDescriptor] = &[
    field("name", "name", FieldKind::Text),
    field("projectUid", "_projectUid", FieldKind::Integer),
    field("owner", "_ownerId", FieldKind::Text),
];

const SAMPLE: &[FieldDescriptor] = &[
    field("description", "description", FieldKind::Text),
    field("individualId", "individual.id", FieldKind::Text),
    field("individualUid", "individual.uid", FieldKind::Integer),
    field("somatic", "somatic", FieldKind::Boolean),
];

const INDIVIDUAL: &[FieldDescriptor] = &[
    field("name", "name", FieldKind::Text),
    field("sex", "sex", FieldKind::Text),
    field("fatherId", "father.id", FieldKind::Text),
    field("fatherUid", "father.uid", FieldKind::Integer),
    field("motherId", "mother.id", FieldKind::Text),
    field("motherUid", "mother.uid", FieldKind::Integer),
    field("sampleId", "samples.id", FieldKind::Text),
    field("sampleUid", "samples.uid", FieldKind::Integer),
];

const FAMILY: &[FieldDescriptor] = &[
    field("name", "name", FieldKind::Text),
    field("memberId", "members.id", FieldKind::Text),
    field("memberUid", "members.uid", FieldKind::Integer),
    field("locked", fields::LOCKED, FieldKind::Boolean),
];

const FILE: &[FieldDescriptor] = &[
    field("name", "name", FieldKind::Text),
    field("path", "path", FieldKind::Text),
    field("format", "format", FieldKind::Text),
    field("size", "size", FieldKind::Integer),
];

const DATASET: &[FieldDescriptor] = &[
    field("name", "name", FieldKind::Text),
    field("fileId", "files.id", FieldKind::Text),
    field("fileUid", "files.uid", FieldKind::Integer),
    field("locked", fields::LOCKED, FieldKind::Boolean),
];

const JOB: &[FieldDescriptor] = &[
    field("tool", "tool", FieldKind::Text),
    field("inputUid", "input.uid", FieldKind::Integer),
    field("outputUid", "output.uid", FieldKind::Integer),
];

/// A query key resolved against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    /// The key as written in the query.
    pub key: String,
    /// Stored path, including any namespace key.
    pub path: String,
    /// Value class.
    pub kind: FieldKind,
}

/// The queryable fields of one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    kind: EntityKind,
    fields: &'static [FieldDescriptor],
}

impl EntitySchema {
    /// Schema of an entity kind.
    #[must_use]
    pub const fn of(kind: EntityKind) -> Self {
        let fields = match kind {
            EntityKind::Project => PROJECT,
            EntityKind::Study => STUDY,
            EntityKind::Sample => SAMPLE,
            EntityKind::Individual => INDIVIDUAL,
            EntityKind::Family => FAMILY,
            EntityKind::File => FILE,
            EntityKind::Dataset => DATASET,
            EntityKind::Job => JOB,
        };
        Self { kind, fields }
    }

    /// Entity kind described.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Every field: entity specific first, then common ones.
    pub fn fields(&self) -> impl Iterator<Item = &'static FieldDescriptor> {
        self.fields.iter().chain(COMMON.iter())
    }

    /// Resolves a query key.
    ///
    /// # Errors
    ///
    /// `Query` for keys the schema does not know.
    pub fn resolve(&self, key: &str) -> CatalogResult<ResolvedField> {
        let (name, sub_key) = match key.split_once('.') {
            Some((name, sub_key)) => (name, Some(sub_key)),
            None => (key, None),
        };
        let descriptor = self.fields().find(|d| d.name == name).ok_or_else(|| {
            CatalogError::query(format!("unknown field '{key}' for {}", self.kind))
        })?;

        let path = match (descriptor.kind.is_namespace(), sub_key) {
            (true, Some(sub_key)) if !sub_key.is_empty() => {
                format!("{}.{sub_key}", descriptor.path)
            }
            (true, _) => {
                return Err(CatalogError::query(format!(
                    "field '{key}' needs a key, e.g. '{name}.key'"
                )))
            }
            (false, Some(_)) => {
                return Err(CatalogError::query(format!(
                    "unknown field '{key}' for {}",
                    self.kind
                )))
            }
            (false, None) => descriptor.path.to_string(),
        };
        Ok(ResolvedField {
            key: key.to_string(),
            path,
            kind: descriptor.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_fields_map_to_private_keys() {
        let schema = EntitySchema::of(EntityKind::Sample);
        assert_eq!(schema.resolve("uid").unwrap().path, "_uid");
        assert_eq!(schema.resolve("studyUid").unwrap().path, "_studyUid");
    }

    #[test]
    fn attribute_namespaces_share_a_path() {
        let schema = EntitySchema::of(EntityKind::Individual);
        let field = schema.resolve("nattributes.age").unwrap();
        assert_eq!(field.path, "attributes.age");
        assert_eq!(field.kind, FieldKind::NumAttributes);
        assert!(schema.resolve("attributes").is_err());
    }

    #[test]
    fn unknown_fields_are_query_errors() {
        let schema = EntitySchema::of(EntityKind::File);
        assert!(matches!(
            schema.resolve("members"),
            Err(CatalogError::Query { .. })
        ));
        assert!(schema.resolve("id.sub").is_err());
    }
}
