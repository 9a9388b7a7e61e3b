//! Infrastructure layer: event stores, command dispatch, projections,
//! deployment record and on-disk configuration.

pub mod command_dispatcher;
pub mod config;
pub mod deployment;
pub mod event_store;
pub mod projections;
pub mod service;


pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use config::StoragePaths;
pub use deployment::{ContractAddress, DeploymentError, load_contract_address, save_contract_address};
pub use service::{RecordedEvent, SharedBus, TokenService};
