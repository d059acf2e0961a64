//! Decoding `LDAPMessage` PDUs off the wire and encoding the responses this
//! server ever sends, for the operation subset described in RFC 4511
//! that this bridge supports.

use ldap_ber::{encode, parse_tag, BerError, Payload, Tag, TagClass};

use crate::error::{CodecError, ResultCode};

/// The operations this server accepts. Every write-class operation reaches
/// the handler only to be answered with `insufficientAccessRights`; they're
/// still decoded far enough to recover the `messageID`.
#[derive(Debug)]
pub enum ProtocolOp {
    BindRequest { name: Vec<u8> },
    UnbindRequest,
    SearchRequest { base_dn: Vec<u8>, filter: Vec<u8> },
    Abandon,
    /// A modify/add/delete/compare/modifyDN request. Carries the
    /// *response* tag to reply with, since each has its own.
    WriteRequest { response_tag: u64 },
    ExtendedRequest,
    Unsupported(u64),
}

#[derive(Debug)]
pub struct LdapMessage {
    pub message_id: i64,
    pub op: ProtocolOp,
}

// Application-class protocolOp tag numbers, per RFC 4511 Appendix B.
mod op_tag {
    pub const BIND_REQUEST: u64 = 0;
    pub const UNBIND_REQUEST: u64 = 2;
    pub const SEARCH_REQUEST: u64 = 3;
    pub const MODIFY_REQUEST: u64 = 6;
    pub const ADD_REQUEST: u64 = 8;
    pub const DEL_REQUEST: u64 = 10;
    pub const MODIFY_DN_REQUEST: u64 = 12;
    pub const COMPARE_REQUEST: u64 = 14;
    pub const ABANDON_REQUEST: u64 = 16;
    pub const EXTENDED_REQUEST: u64 = 23;

    pub const BIND_RESPONSE: u64 = 1;
    pub const SEARCH_RES_ENTRY: u64 = 4;
    pub const SEARCH_RES_DONE: u64 = 5;
    pub const MODIFY_RESPONSE: u64 = 7;
    pub const ADD_RESPONSE: u64 = 9;
    pub const DEL_RESPONSE: u64 = 11;
    pub const MODIFY_DN_RESPONSE: u64 = 13;
    pub const COMPARE_RESPONSE: u64 = 15;
    pub const EXTENDED_RESPONSE: u64 = 24;
}

/// Decode one complete `LDAPMessage` from the front of `buf`.
///
/// Returns `Ok(None)` when `buf` doesn't yet hold a whole message — the
/// caller should read more bytes and retry — and `Err` for data that is
/// present but doesn't parse, which should close the connection.
pub fn decode_message(buf: &[u8]) -> Result<Option<(LdapMessage, usize)>, CodecError> {
    match parse_tag(buf) {
        Ok((rest, tag)) => {
            let consumed = buf.len() - rest.len();
            Ok(Some((LdapMessage::from_tag(&tag)?, consumed)))
        }
        Err(BerError::Incomplete) | Err(BerError::LengthOverflow) => Ok(None),
        Err(e) => Err(CodecError::Ber(e)),
    }
}

/// Inspect the outermost operation tag of a message without fully decoding
/// it — used for diagnostics when `decode_message` rejects the input.
pub fn peek_op_tag(buf: &[u8]) -> Option<u64> {
    ldap_ber::peek_op_tag(buf)
}

impl LdapMessage {
    fn from_tag(tag: &Tag) -> Result<LdapMessage, CodecError> {
        if tag.class != TagClass::Universal || tag.id != 16 {
            return Err(CodecError::Malformed("LDAPMessage is not a SEQUENCE"));
        }
        let children = tag
            .children()
            .ok_or(CodecError::Malformed("LDAPMessage has no components"))?;
        let message_id_tag = children
            .first()
            .ok_or(CodecError::Malformed("LDAPMessage missing messageID"))?;
        let protocol_op = children
            .get(1)
            .ok_or(CodecError::Malformed("LDAPMessage missing protocolOp"))?;

        let message_id = decode_integer(message_id_tag)
            .ok_or(CodecError::Malformed("messageID is not an INTEGER"))?;
        let op = decode_op(protocol_op)?;
        Ok(LdapMessage { message_id, op })
    }
}

fn decode_op(op: &Tag) -> Result<ProtocolOp, CodecError> {
    if op.class != TagClass::Application {
        return Ok(ProtocolOp::Unsupported(op.id));
    }
    let op = match op.id {
        op_tag::BIND_REQUEST => {
            let name = op
                .children()
                .and_then(|c| c.get(1))
                .and_then(Tag::as_slice)
                .unwrap_or(&[])
                .to_vec();
            ProtocolOp::BindRequest { name }
        }
        op_tag::UNBIND_REQUEST => ProtocolOp::UnbindRequest,
        op_tag::SEARCH_REQUEST => {
            let children = op.children().unwrap_or(&[]);
            let base_dn = children
                .first()
                .and_then(Tag::as_slice)
                .unwrap_or(&[])
                .to_vec();
            let filter = children.get(6).map(|t| t.raw.clone()).unwrap_or_default();
            ProtocolOp::SearchRequest { base_dn, filter }
        }
        op_tag::ABANDON_REQUEST => ProtocolOp::Abandon,
        op_tag::MODIFY_REQUEST => ProtocolOp::WriteRequest {
            response_tag: op_tag::MODIFY_RESPONSE,
        },
        op_tag::ADD_REQUEST => ProtocolOp::WriteRequest {
            response_tag: op_tag::ADD_RESPONSE,
        },
        op_tag::DEL_REQUEST => ProtocolOp::WriteRequest {
            response_tag: op_tag::DEL_RESPONSE,
        },
        op_tag::MODIFY_DN_REQUEST => ProtocolOp::WriteRequest {
            response_tag: op_tag::MODIFY_DN_RESPONSE,
        },
        op_tag::COMPARE_REQUEST => ProtocolOp::WriteRequest {
            response_tag: op_tag::COMPARE_RESPONSE,
        },
        op_tag::EXTENDED_REQUEST => ProtocolOp::ExtendedRequest,
        other => ProtocolOp::Unsupported(other),
    };
    Ok(op)
}

fn decode_integer(tag: &Tag) -> Option<i64> {
    let bytes = tag.as_slice()?;
    if bytes.is_empty() {
        return Some(0);
    }
    let negative = bytes[0] & 0x80 != 0;
    let mut value: i64 = if negative { -1 } else { 0 };
    for &b in bytes {
        value = (value << 8) | i64::from(b);
    }
    Some(value)
}

fn message_envelope(message_id: i64, op: Vec<u8>) -> Vec<u8> {
    let id = encode::integer(TagClass::Universal, 2, message_id);
    encode::constructed(TagClass::Universal, 16, &[id, op])
}

/// `LDAPResult`-shaped body shared by every response PDU this server sends:
/// `{ resultCode ENUMERATED, matchedDN LDAPDN, diagnosticMessage LDAPString }`.
/// `matchedDN`/`diagnosticMessage` are always empty strings.
fn result_body(rc: ResultCode) -> Vec<Vec<u8>> {
    vec![
        encode::integer(TagClass::Universal, 10, i64::from(rc.0)),
        encode::octet_string(TagClass::Universal, 4, &[]),
        encode::octet_string(TagClass::Universal, 4, &[]),
    ]
}

fn result_response(message_id: i64, app_tag: u64, rc: ResultCode) -> Vec<u8> {
    let body = result_body(rc);
    let op = encode::constructed(TagClass::Application, app_tag, &body);
    message_envelope(message_id, op)
}

pub fn encode_bind_response(message_id: i64, rc: ResultCode) -> Vec<u8> {
    result_response(message_id, op_tag::BIND_RESPONSE, rc)
}

pub fn encode_search_result_done(message_id: i64, rc: ResultCode) -> Vec<u8> {
    result_response(message_id, op_tag::SEARCH_RES_DONE, rc)
}

/// Encode the response for a decoded [`ProtocolOp::WriteRequest`], using
/// the `response_tag` it carries.
pub fn encode_write_response(message_id: i64, response_tag: u64, rc: ResultCode) -> Vec<u8> {
    result_response(message_id, response_tag, rc)
}

pub fn encode_extended_response(message_id: i64, rc: ResultCode) -> Vec<u8> {
    result_response(message_id, op_tag::EXTENDED_RESPONSE, rc)
}

/// One `searchResEntry`: `{ objectName LDAPDN, attributes SEQUENCE OF PartialAttribute }`.
pub fn encode_search_result_entry(
    message_id: i64,
    dn: &str,
    attributes: &[(&str, Vec<&str>)],
) -> Vec<u8> {
    let object_name = encode::octet_string(TagClass::Universal, 4, dn.as_bytes());
    let attrs: Vec<Vec<u8>> = attributes
        .iter()
        .map(|(name, values)| {
            let type_tlv = encode::octet_string(TagClass::Universal, 4, name.as_bytes());
            let value_tlvs: Vec<Vec<u8>> = values
                .iter()
                .map(|v| encode::octet_string(TagClass::Universal, 4, v.as_bytes()))
                .collect();
            let vals = encode::constructed(TagClass::Universal, 17, &value_tlvs);
            encode::constructed(TagClass::Universal, 16, &[type_tlv, vals])
        })
        .collect();
    let attrs_seq = encode::constructed(TagClass::Universal, 16, &attrs);
    let op = encode::constructed(
        TagClass::Application,
        op_tag::SEARCH_RES_ENTRY,
        &[object_name, attrs_seq],
    );
    message_envelope(message_id, op)
}
