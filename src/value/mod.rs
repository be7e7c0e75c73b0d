//! Value module - In-memory representation of YAML/JSON manifest documents.
//!
//! Documents are decoded into this generic tree so that fields the tool does
//! not know about survive a read/write cycle untouched.

mod value;

pub use value::*;
