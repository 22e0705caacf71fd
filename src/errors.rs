/*!
 * Error types for the headless CMS core.
 *
 * This module contains custom error types for the different layers of the
 * crate, using the thiserror crate for ergonomic error definitions:
 * - `StorageError`: revision store and entity persistence failures
 * - `ProviderError`: failures talking to an LLM provider
 * - `TranslationError`: failures of the translation engines and pipeline
 * - `SchemaError`: invalid content type declarations
 * - `CmsError`: the error surfaced by publication and translation operations
 */

use thiserror::Error;

use crate::content::EntityRef;

/// Errors that can occur when reading or writing the revision store
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error reported by SQLite
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Error (de)serializing stored field data
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The requested entity does not exist
    #[error("Entity not found: {0}")]
    NotFound(EntityRef),

    /// The snapshot is referenced as a `published_version` and cannot be deleted
    #[error("Snapshot {0} is currently published and cannot be deleted")]
    PublishedSnapshot(i64),

    /// The snapshot does not belong to the entity it was assigned to
    #[error("Snapshot {snapshot_id} does not belong to {entity}")]
    ForeignSnapshot {
        /// Entity the snapshot was assigned to
        entity: EntityRef,
        /// Offending snapshot id
        snapshot_id: i64,
    },

    /// A retention period that does not fit the calendar
    #[error("Retention period of {0} days is out of range")]
    InvalidRetention(i64),

    /// Failure acquiring the connection or running the blocking task
    #[error("Storage task failed: {0}")]
    Task(String),
}

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The request did not complete in time
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The answer was still cut off after every allowed continuation
    #[error("Answer still truncated after {continuations} continuation(s) ({received_chars} chars received)")]
    Truncated {
        /// Follow-up requests sent
        continuations: usize,
        /// Characters received before giving up
        received_chars: usize,
    },
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The engine answered with output that is not the expected structure
    #[error("Unparseable translation for '{language}': {message}")]
    Parse {
        /// Target language of the failed batch
        language: String,
        /// Parser message
        message: String,
    },

    /// The engine does not implement whole-object translation
    #[error("Batch translation is not supported by this engine")]
    BatchUnsupported,

    /// Error loading or storing translated children
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors raised while building a content schema
#[derive(Error, Debug, PartialEq)]
pub enum SchemaError {
    #[error("Content type '{0}' is declared more than once")]
    DuplicateType(String),

    #[error("Relation '{relation}' on '{kind}' targets unknown type '{target}'")]
    UnknownTarget {
        kind: String,
        relation: String,
        target: String,
    },

    #[error("Relation name '{relation}' is used twice on '{kind}'")]
    DuplicateRelation { kind: String, relation: String },

    #[error("Unknown content type '{0}'")]
    UnknownType(String),
}

/// Error surfaced by publication and translation operations
#[derive(Error, Debug)]
pub enum CmsError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Publication was requested for a type outside the publication model
    #[error("{0} does not participate in publication")]
    NotVersioned(EntityRef),

    /// An action failed while walking the dependency graph; earlier nodes keep their changes
    #[error("Graph walk aborted at {entity}: {source}")]
    GraphWalk {
        entity: EntityRef,
        #[source]
        source: Box<CmsError>,
    },
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Task(error.to_string())
    }
}
