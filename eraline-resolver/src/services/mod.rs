//! External collaborators: reference knowledge base and upstream metadata

pub mod metadata_provider;
pub mod reference_client;

pub use metadata_provider::{MetadataProvider, TmdbClient};
pub use reference_client::{
    extract_from_prose, ReferenceLookup, ReferenceMatch, ReferenceOutcome, WikipediaClient,
};
