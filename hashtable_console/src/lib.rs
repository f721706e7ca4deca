//! `hashtable_console`
//!
//! Interactive front end for the hashtable registry:
//! - Loads tables from a JSON config at startup
//! - Reads console commands from stdin
//! - Runs create/import/find/size against the registry

pub mod session;

pub use session::TableSession;
