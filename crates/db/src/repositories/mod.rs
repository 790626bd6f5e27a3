//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Pipeline-facing methods take `&mut PgConnection` so that every call of a
//! cycle runs inside that cycle's transaction; pass `&mut *tx`.
//!
//! Tenant-aware reads take a `tenant: Option<DbId>` filter where `None`
//! means "all tenants" (see `tripwire_core::tenant::TenantScope`).

pub mod asset_repo;
pub mod breach_state_repo;
pub mod lookup_repo;
pub mod metric_repo;
pub mod notification_repo;
pub mod rule_repo;
pub mod signal_repo;

pub use asset_repo::AssetRepo;
pub use breach_state_repo::BreachStateRepo;
pub use lookup_repo::LookupRepo;
pub use metric_repo::MetricRepo;
pub use notification_repo::NotificationRepo;
pub use rule_repo::RuleRepo;
pub use signal_repo::SignalRepo;
