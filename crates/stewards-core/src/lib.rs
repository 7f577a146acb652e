pub mod incident;
pub mod record;
pub mod schema;

pub use incident::Incident;
pub use record::{AnnotationRecord, Document};
pub use schema::incidents;
