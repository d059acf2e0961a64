//! A read-only LDAPv3 front end that projects an AREDN mesh node's service
//! catalog as a phone-book directory, for SIP phones that only speak LDAP.

pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod ldap_message;
pub mod logging;
pub mod model;
pub mod server;
pub mod upstream;
pub mod util;
