//! BER TLV decoding.
//!
//! The identifier octet is parsed with `nom`'s primitive combinators rather
//! than the macro style of earlier `nom` releases; the recursion into
//! constructed content and the length forms follow X.690 8.1.

use nom::bytes::complete::take;
use nom::number::complete::u8 as take_u8;

use crate::tag::{Payload, Tag, TagClass};

use thiserror::Error;

/// Guards against pathologically deep constructed nesting in untrusted input.
const MAX_NEST_DEPTH: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BerError {
    #[error("truncated BER data")]
    Incomplete,
    #[error("indefinite length encoding is not supported")]
    IndefiniteLength,
    #[error("TLV length exceeds remaining buffer")]
    LengthOverflow,
    #[error("constructed tag nesting too deep")]
    TooDeep,
}

type NomErr<'a> = nom::Err<nom::error::Error<&'a [u8]>>;

fn incomplete(_: NomErr<'_>) -> BerError {
    BerError::Incomplete
}

fn identifier(input: &[u8]) -> Result<(&[u8], TagClass, bool, u64), BerError> {
    let (rest, b) = take_u8::<_, nom::error::Error<&[u8]>>(input).map_err(incomplete)?;
    let class = TagClass::from_u8((b >> 6) & 0x03).expect("2 bits always map to a class");
    let constructed = b & 0x20 != 0;
    let id = u64::from(b & 0x1F);
    Ok((rest, class, constructed, id))
}

fn length(input: &[u8]) -> Result<(&[u8], u64), BerError> {
    let (rest, b) = take_u8::<_, nom::error::Error<&[u8]>>(input).map_err(incomplete)?;
    if b & 0x80 == 0 {
        return Ok((rest, u64::from(b)));
    }
    let num_len_bytes = (b & 0x7F) as usize;
    if num_len_bytes == 0 {
        return Err(BerError::IndefiniteLength);
    }
    let (rest, len_bytes) =
        take::<_, _, nom::error::Error<&[u8]>>(num_len_bytes)(rest).map_err(incomplete)?;
    let len = len_bytes
        .iter()
        .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte));
    Ok((rest, len))
}

/// Decode one TLV from the front of `input`, returning it along with the
/// unconsumed remainder.
pub fn parse_tag(input: &[u8]) -> Result<(&[u8], Tag), BerError> {
    parse_tag_at_depth(input, 0)
}

fn parse_tag_at_depth<'a>(input: &'a [u8], depth: usize) -> Result<(&'a [u8], Tag), BerError> {
    if depth > MAX_NEST_DEPTH {
        return Err(BerError::TooDeep);
    }
    let start_len = input.len();
    let (after_id, class, constructed, id) = identifier(input)?;
    let (after_len, len) = length(after_id)?;
    let len = len as usize;
    if len > after_len.len() {
        return Err(BerError::LengthOverflow);
    }
    let (content, rest) = after_len.split_at(len);
    let raw = input[..start_len - rest.len()].to_vec();

    let payload = if constructed {
        let mut children = Vec::new();
        let mut remaining = content;
        while !remaining.is_empty() {
            let (next, child) = parse_tag_at_depth(remaining, depth + 1)?;
            children.push(child);
            remaining = next;
        }
        Payload::Constructed(children)
    } else {
        Payload::Primitive(content.to_vec())
    };

    Ok((
        rest,
        Tag {
            class,
            id,
            payload,
            raw,
        },
    ))
}

/// Inspect the outermost `protocolOp` application tag of an `LDAPMessage`
/// without fully decoding it, for diagnostics on otherwise-malformed input.
pub fn peek_op_tag(message_bytes: &[u8]) -> Option<u64> {
    let (_, top) = parse_tag(message_bytes).ok()?;
    let children = top.children()?;
    let op = children.get(1)?;
    if op.class == TagClass::Application {
        Some(op.id)
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_primitive() {
        let bytes: Vec<u8> = vec![2, 2, 255, 127];
        let (rest, tag) = parse_tag(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(tag.class, TagClass::Universal);
        assert_eq!(tag.id, 2);
        assert_eq!(tag.payload, Payload::Primitive(vec![255, 127]));
    }

    #[test]
    fn test_constructed() {
        let bytes: Vec<u8> = vec![
            48, 14, 12, 12, 72, 101, 108, 108, 111, 32, 87, 111, 114, 108, 100, 33,
        ];
        let (rest, tag) = parse_tag(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(tag.class, TagClass::Universal);
        assert_eq!(tag.id, 16);
        let children = tag.children().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(
            children[0].payload,
            Payload::Primitive(b"Hello World!".to_vec())
        );
    }

    #[test]
    fn test_long_length() {
        let mut bytes = vec![0x30, 0x82, 0x00, 0x91];
        bytes.extend_from_slice(&[0x80, 0x0C]);
        bytes.extend_from_slice(b"JustALongTag");
        bytes.extend_from_slice(&[0x81, 0x81]);
        bytes.extend(std::iter::repeat(b'x').take(129));

        let (rest, tag) = parse_tag(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(tag.id, 16);
        let children = tag.children().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].id, 0);
        assert_eq!(children[1].id, 1);
        assert_eq!(children[1].as_slice().unwrap().len(), 129);
    }

    #[test]
    fn test_indefinite_length_rejected() {
        let bytes: Vec<u8> = vec![0x30, 0x80];
        assert_eq!(parse_tag(&bytes), Err(BerError::IndefiniteLength));
    }

    #[test]
    fn test_truncated_is_incomplete_not_overflow() {
        let bytes: Vec<u8> = vec![0x30, 0x05, 0x02, 0x01];
        assert_eq!(parse_tag(&bytes), Err(BerError::LengthOverflow));
    }

    #[test]
    fn test_peek_op_tag_search_request() {
        // messageID=1, protocolOp = [APPLICATION 3] (searchRequest), constructed, empty body
        let msg_id = vec![0x02, 0x01, 0x01];
        let op = vec![0x63, 0x00];
        let mut body = msg_id;
        body.extend_from_slice(&op);
        let mut full = vec![0x30, body.len() as u8];
        full.extend_from_slice(&body);
        assert_eq!(peek_op_tag(&full), Some(3));
    }
}
