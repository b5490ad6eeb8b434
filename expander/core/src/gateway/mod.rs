//! Host Gateways
//!
//! Abstracted access to the host's block attribute and fold/unfold APIs
//! through two narrow traits.
//!
//! # Available Gateways
//!
//! - **SiYuan**: the kernel HTTP API (default)
//! - **In-memory**: local fold-state set, for dry runs and tests
//!
//! # Usage
//!
//! ```ignore
//! use expander_core::gateway::{AttributeGateway, SiyuanGateway};
//!
//! let gateway = SiyuanGateway::new("http://127.0.0.1:6806", None, None)?;
//! let state = gateway.fold_state(&"20240101120000-abcdefg".into()).await?;
//! ```

mod memory;
mod siyuan;
mod traits;

pub use memory::{GatewayCall, InMemoryGateway};
pub use siyuan::{SiyuanGateway, FOLD_BLOCK, GET_BLOCK_ATTRS, UNFOLD_BLOCK};
pub use traits::{Ack, AttributeGateway, CommandGateway};
