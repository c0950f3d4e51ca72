//! Fundamental types for the Tessera DAG consensus core.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! unit and ball identifiers, addresses and definitions, units and joints,
//! persisted DAG-position metadata, and protocol parameters.

pub mod address;
pub mod error;
pub mod hash;
pub mod keys;
pub mod params;
pub mod props;
pub mod time;
pub mod unit;

pub use address::Address;
pub use error::TesseraError;
pub use hash::{BallHash, UnitId};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use params::ProtocolParams;
pub use props::{Level, Mci, Sequence, UnitProps};
pub use time::Timestamp;
pub use unit::{
    Author, Definition, DefinitionChange, Joint, Message, Output, Payload, Payment, SpendKey, Unit,
};
