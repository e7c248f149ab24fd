//! Server-to-server cache refresh.
//!
//! - [`BatchedServerMessenger`]: applies refreshes locally and batches them per request
//! - [`RefreshReceiver`]: applies batches arriving from peers
//! - [`CacheRefresher`]: the handlers both sides dispatch to

mod config;
mod error;
mod identity;
pub mod instructions;
mod messenger;
mod middleware;
mod receiver;
mod refresher;
mod scope;
mod transport;

pub use config::{Credentials, MessagingConfig, MessagingMode};
pub use error::{MessengerError, TransportError};
pub use identity::LocalIdentity;
pub use messenger::{BatchedServerMessenger, FlushSummary};
pub use middleware::batch_refresh_requests;
pub use receiver::RefreshReceiver;
pub use refresher::{CacheRefresher, RefresherRegistry, apply_instruction, apply_payload};
pub use scope::RequestScope;
pub use transport::{HttpRefreshTransport, RefreshTransport};
