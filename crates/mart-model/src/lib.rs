//! Shared data model for the retail transform-and-load pipeline.

pub mod entity;
pub mod error;
pub mod issue;
pub mod lookup;
pub mod options;
pub mod source;
pub mod stage;

pub use entity::{
    CanonicalEntity, Customer, CustomerDraft, EntityType, Order, OrderDraft, OrderItem,
    OrderItemDraft, Product, ProductDraft, SalesLine, SurrogateKey,
};
pub use error::{ConfigError, Result};
pub use issue::{Issue, IssueKind, TerminalState};
pub use lookup::CaseFoldMap;
pub use options::{
    CategoryOptions, DateOptions, FieldPolicies, FieldPolicy, PhoneOptions, PipelineConfig,
    RetryOptions, natural_key_fields,
};
pub use source::{
    CleanRecord, RawRecord, RecordRef, SourceKind, normalize_field_name, normalize_natural_key,
};
pub use stage::StageOutput;
