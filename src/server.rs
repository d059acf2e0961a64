//! The TCP acceptor and per-connection state machine.
//!
//! One thread per connection, matching a `ThreadingTCPServer` model: the
//! acceptor spawns and forgets a thread for every inbound socket, and
//! connections share only the cache and the live config snapshot, both
//! behind an `Arc`.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use log::{debug, info, warn};

use crate::cache::LazyCache;
use crate::config::Config;
use crate::error::ResultCode;
use crate::ldap_message::{self, ProtocolOp};

/// A buffered, unparsed message longer than this is a protocol violation:
/// drop the connection rather than keep growing the buffer unboundedly.
const MAX_MESSAGE_BYTES: usize = 64 * 1024;

pub struct Server {
    listener: TcpListener,
    cache: Arc<LazyCache>,
    config: Arc<Mutex<Arc<Config>>>,
}

impl Server {
    pub fn bind(
        cache: Arc<LazyCache>,
        config: Arc<Mutex<Arc<Config>>>,
    ) -> std::io::Result<Server> {
        let (address, port) = {
            let config = config.lock().unwrap();
            (config.listen_address.clone(), config.listen_port)
        };
        let listener = TcpListener::bind((address.as_str(), port))?;
        Ok(Server {
            listener,
            cache,
            config,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the listener errors out (which, for a bound
    /// `TcpListener`, only happens on process shutdown tearing it down).
    pub fn serve_forever(&self) {
        for incoming in self.listener.incoming() {
            let stream = match incoming {
                Ok(s) => s,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            };
            let cache = Arc::clone(&self.cache);
            let config = Arc::clone(&self.config);
            thread::spawn(move || handle_connection(stream, cache, config));
        }
    }
}

fn handle_connection(mut stream: TcpStream, cache: Arc<LazyCache>, config: Arc<Mutex<Arc<Config>>>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "?".to_string());
    debug!("connection opened: {peer}");

    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match ldap_message::decode_message(&buf) {
            Ok(Some((msg, consumed))) => {
                buf.drain(..consumed);
                let config = Arc::clone(&config.lock().unwrap());
                match dispatch(&msg, &mut stream, &cache, &config) {
                    Ok(true) => continue,
                    Ok(false) => {
                        debug!("connection closed by peer request: {peer}");
                        return;
                    }
                    Err(e) => {
                        warn!("write failed for {peer}: {e}");
                        return;
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                let op_tag = ldap_message::peek_op_tag(&buf);
                warn!("decode error from {peer} (op tag {op_tag:?}): {e}");
                return;
            }
        }

        match stream.read(&mut chunk) {
            Ok(0) => {
                debug!("connection EOF: {peer}");
                return;
            }
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) => {
                warn!("read failed for {peer}: {e}");
                return;
            }
        }

        if buf.len() > MAX_MESSAGE_BYTES {
            warn!("oversize message from {peer} ({} bytes), closing", buf.len());
            return;
        }
    }
}

/// Handle one decoded message, writing its response(s). Returns `Ok(false)`
/// when the connection should close next (an `unbindRequest`), `Ok(true)`
/// to keep reading.
fn dispatch(
    msg: &ldap_message::LdapMessage,
    stream: &mut TcpStream,
    cache: &LazyCache,
    config: &Config,
) -> std::io::Result<bool> {
    match &msg.op {
        ProtocolOp::BindRequest { name } => {
            info!(
                "bind from {:?}: {}",
                stream.peer_addr().ok(),
                String::from_utf8_lossy(name)
            );
            let response = ldap_message::encode_bind_response(msg.message_id, ResultCode::SUCCESS);
            stream.write_all(&response)?;
            Ok(true)
        }
        ProtocolOp::UnbindRequest => Ok(false),
        ProtocolOp::SearchRequest { base_dn, filter } => {
            info!(
                "search from {:?}: base={}",
                stream.peer_addr().ok(),
                String::from_utf8_lossy(base_dn)
            );
            let entries = cache.get_entries();
            let matched = crate::filter::filter_entries(&entries, filter, config.max_results);
            for entry in &matched {
                let attributes = [
                    ("uid", vec![entry.uid.as_str()]),
                    ("cn", vec![entry.cn.as_str()]),
                    ("telephoneNumber", vec![entry.telephone_number.as_str()]),
                    ("objectClass", entry.object_classes.to_vec()),
                ];
                let pdu = ldap_message::encode_search_result_entry(msg.message_id, &entry.dn, &attributes);
                stream.write_all(&pdu)?;
            }
            let done = ldap_message::encode_search_result_done(msg.message_id, ResultCode::SUCCESS);
            stream.write_all(&done)?;
            Ok(true)
        }
        ProtocolOp::Abandon => Ok(true),
        ProtocolOp::WriteRequest { response_tag } => {
            let response = ldap_message::encode_write_response(
                msg.message_id,
                *response_tag,
                ResultCode::INSUFFICIENT_ACCESS_RIGHTS,
            );
            stream.write_all(&response)?;
            Ok(true)
        }
        ProtocolOp::ExtendedRequest => {
            let response = ldap_message::encode_extended_response(
                msg.message_id,
                ResultCode::INSUFFICIENT_ACCESS_RIGHTS,
            );
            stream.write_all(&response)?;
            Ok(true)
        }
        ProtocolOp::Unsupported(tag) => {
            debug!("ignoring unsupported protocolOp tag {tag}");
            Ok(true)
        }
    }
}
