//! Schema discovery
//!
//! Record schemas are not hand-maintained; they come from Mailchimp's
//! published OpenAPI (Swagger 2.0) document. [`OpenApiSource`] fetches and
//! caches that document once per run, and [`SchemaResolver`] extracts the
//! per-resource fragment, widens non-key property types to accept null,
//! applies any registered corrective patch, and memoizes the result per
//! [`ResourceKey`].

mod patches;
mod resolver;

pub use patches::{builtin_patches, PatchRegistry, SchemaPatch};
pub use resolver::{OpenApiSource, ResourceKey, SchemaResolver};

#[cfg(test)]
mod tests;
