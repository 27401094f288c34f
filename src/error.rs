use crate::model::{FieldType, Id, IndexFieldType, Triple};

/// Template configuration errors. They are detected when templates are saved
/// or the schema is loaded, and prevent the offending template from being saved.
#[derive(Debug, thiserror::Error)]
pub enum InheritanceError {
    #[error("Template not found: {0}")]
    UnknownTemplate(Id),

    #[error("Property '{property}' not found in template '{template}'")]
    UnknownProperty { template: Id, property: String },

    #[error("Property '{template}.{property}' inherits '{source_property}', which no candidate template defines")]
    MissingSourceProperty {
        template: Id,
        property: String,
        source_property: String,
    },

    #[error("Inheritance cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("Property '{template}.{property}' inherits from templates whose source types differ: {types:?}")]
    ConflictingSourceTypes {
        template: Id,
        property: String,
        types: Vec<FieldType>,
    },

    #[error("Property '{property}' is indexed as {first:?} by one template and {second:?} by another")]
    ConflictingFieldTypes {
        property: String,
        first: IndexFieldType,
        second: IndexFieldType,
    },
}

/// Failure of a propagation pass. Updates committed before the failure stay
/// valid; triples after it are left stale until the next write touches them.
#[derive(Debug, thiserror::Error)]
pub enum PropagationError {
    #[error("Failed to persist {triple} after {committed} committed updates: {source}")]
    Persistence {
        triple: Triple,
        committed: usize,
        source: anyhow::Error,
    },

    #[error("Failed to read {triple}: {source}")]
    Read { triple: Triple, source: anyhow::Error },

    #[error(transparent)]
    Configuration(#[from] InheritanceError),
}

#[derive(Debug, thiserror::Error)]
pub enum IndexingError {
    #[error("Unknown index field: {0}")]
    UnknownField(String),

    #[error("Filter on '{field}' does not apply to {field_type:?} fields")]
    FilterMismatch {
        field: String,
        field_type: IndexFieldType,
    },

    #[error("Field '{0}' is not sortable")]
    NotSortable(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Errors surfaced to callers of the engine facade
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error(transparent)]
    Configuration(#[from] InheritanceError),

    #[error(transparent)]
    Indexing(#[from] IndexingError),

    #[error(transparent)]
    Propagation(#[from] PropagationError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
