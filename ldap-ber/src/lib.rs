//! A small ASN.1/BER codec covering the subset of tags an LDAPv3 server
//! needs to decode requests and encode responses.

pub mod encode;
pub mod parse;
pub mod tag;

pub use parse::{parse_tag, peek_op_tag, BerError};
pub use tag::{Payload, Tag, TagClass};
