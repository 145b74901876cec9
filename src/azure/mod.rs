//! Azure Resource Manager interaction
//!
//! # Module Structure
//!
//! - [`client`] - [`ArmClient`], the HTTPS implementation of the provider API
//! - [`http`] - HTTP utilities and status classification
//! - [`regions`] - The region catalogue and its configuration overrides
//!
//! # Example
//!
//! ```ignore
//! use azrefresh::azure::ArmClient;
//! use azrefresh::resource::{ProviderApi, RawKind};
//!
//! async fn example() -> Result<(), azrefresh::error::ProviderError> {
//!     let client = ArmClient::new("https://management.azure.com", "token", std::time::Duration::from_secs(30))?;
//!     let vm = client.fetch_by_id(RawKind::VirtualMachine, "/subscriptions/.../virtualMachines/vm1").await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod regions;

pub use client::{ArmClient, DEFAULT_ENDPOINT};
pub use regions::{Region, RegionSettings};
