pub mod compare;
pub mod descriptor;

pub use compare::{bson_semantic_eq, conflicts, equivalent};
pub use descriptor::{DescriptorError, IndexDescriptor, IndexDirection, KeyPattern, ENVELOPE_FIELDS, ID_INDEX_NAME};
