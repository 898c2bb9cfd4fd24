//! The hub's aggregate store
//!
//! [`Store`] owns the rule engine, the scheduler, the saved states and the
//! externally visible device list, plus the collections the transport layer
//! maintains (nodes, connections, certificates, persons, destinations).
//! Every mutation that changes something runs the registered update
//! callbacks with the [`Area`] that changed.

mod area;
mod certificates;
mod connections;
mod destinations;
mod devices;
mod error;
mod logic;
mod nodes;
mod notification;
mod persons;
mod server;
mod store;

pub use area::Area;
pub use certificates::Certificate;
pub use connections::{Connection, Connections};
pub use destinations::{Destination, Destinations};
pub use error::{StoreError, StoreResult};
pub use nodes::{Node, Nodes};
pub use notification::{Notification, NotificationKind, NotificationRouter};
pub use persons::{Person, Persons};
pub use server::ServerState;
pub use store::{Store, UpdateCallback};
