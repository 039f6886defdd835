//! Infrastructure layer: store, lifecycle orchestration, read side, config,
//! external collaborators.

pub mod audit;
pub mod auto_join;
pub mod config;
pub mod directory;
pub mod lifecycle;
pub mod mail;
pub mod payment;
pub mod seed;
pub mod store;

pub use auto_join::{AutoJoinOutcome, RelocateOutcome};
pub use config::AppConfig;
pub use directory::{Directory, DirectoryError, Page, Paged};
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleResult};
pub use mail::{InviteDispatcher, LogMailer, Mailer, RecordingMailer};
pub use payment::PaymentVerifier;
pub use store::{InMemoryStore, Store, StoreError};
