#![warn(rust_2018_idioms)]

pub mod config;
mod completion;
mod error;
pub mod lookup;
pub mod message;
pub mod resolver;
pub mod sender;
pub mod socket;

pub use completion::Callback;
pub use error::{Error, IoError, Result};
pub use lookup::{instance_lookup, InstanceLookup};
