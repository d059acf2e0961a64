/// Class of a BER tag's identifier octet.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TagClass {
    Universal = 0,
    Application = 1,
    Context = 2,
    Private = 3,
}

impl TagClass {
    pub fn from_u8(n: u8) -> Option<TagClass> {
        match n {
            0 => Some(TagClass::Universal),
            1 => Some(TagClass::Application),
            2 => Some(TagClass::Context),
            3 => Some(TagClass::Private),
            _ => None,
        }
    }
}

/// Content of a decoded tag: either a raw octet string, or a nested sequence
/// of further tags.
#[derive(Clone, PartialEq, Debug)]
pub enum Payload {
    Primitive(Vec<u8>),
    Constructed(Vec<Tag>),
}

/// A decoded BER TLV.
///
/// `raw` retains the exact encoded bytes (identifier, length, and content
/// octets) this tag was parsed from, so a caller that only cares about one
/// nested element — the LDAP `Filter` inside a `SearchRequest`, say — can
/// hand it to a different decoder without re-serializing anything.
#[derive(Clone, PartialEq, Debug)]
pub struct Tag {
    pub class: TagClass,
    pub id: u64,
    pub payload: Payload,
    pub raw: Vec<u8>,
}

impl Tag {
    pub fn is_constructed(&self) -> bool {
        matches!(self.payload, Payload::Constructed(_))
    }

    /// Borrow the content bytes if this is a primitive tag.
    pub fn as_slice(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Primitive(v) => Some(v),
            Payload::Constructed(_) => None,
        }
    }

    /// Borrow the children if this is a constructed tag.
    pub fn children(&self) -> Option<&[Tag]> {
        match &self.payload {
            Payload::Constructed(v) => Some(v),
            Payload::Primitive(_) => None,
        }
    }
}
