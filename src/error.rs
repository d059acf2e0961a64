//! Error types for each fallible subsystem boundary, plus the RFC 4511
//! result-code vocabulary shared by every response PDU.

use thiserror::Error;

/// Failures while decoding bytes off the wire as an `LDAPMessage`.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("BER decode error: {0}")]
    Ber(#[from] ldap_ber::BerError),
    #[error("LDAPMessage did not have the expected shape: {0}")]
    Malformed(&'static str),
}

/// Failures while reading the INI config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ini::Error,
    },
}

/// Failures while fetching the service list from an upstream node.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("no upstream nodes are configured")]
    NoNodes,
    #[error("request to {node} failed: {source}")]
    Request {
        node: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("response from {node} was not valid JSON: {source}")]
    InvalidJson {
        node: String,
        #[source]
        source: serde_json::Error,
    },
}

/// An RFC 4511 Appendix A.1 result code.
///
/// This deliberately mirrors a C-like numeric-code struct rather than an
/// automatic `Result`-like wrapper: response PDUs carry the code as a bare
/// `ENUMERATED`, and a from-the-wire match against it is the common case on
/// this side of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultCode(pub u32);

impl ResultCode {
    pub const SUCCESS: ResultCode = ResultCode(0);
    pub const INSUFFICIENT_ACCESS_RIGHTS: ResultCode = ResultCode(50);

    /// The RFC 4511 mnemonic for this code, or `"unknown"` for values the
    /// standard doesn't define.
    pub fn description(&self) -> &'static str {
        match self.0 {
            0 => "success",
            1 => "operationsError",
            2 => "protocolError",
            3 => "timeLimitExceeded",
            4 => "sizeLimitExceeded",
            5 => "compareFalse",
            6 => "compareTrue",
            7 => "authMethodNotSupported",
            8 => "strongerAuthRequired",
            10 => "referral",
            11 => "adminLimitExceeded",
            12 => "unavailableCriticalExtension",
            13 => "confidentialityRequired",
            14 => "saslBindInProgress",
            16 => "noSuchAttribute",
            17 => "undefinedAttributeType",
            18 => "inappropriateMatching",
            19 => "constraintViolation",
            20 => "attributeOrValueExists",
            21 => "invalidAttributeSyntax",
            32 => "noSuchObject",
            33 => "aliasProblem",
            34 => "invalidDNSyntax",
            36 => "aliasDereferencingProblem",
            48 => "inappropriateAuthentication",
            49 => "invalidCredentials",
            50 => "insufficientAccessRights",
            51 => "busy",
            52 => "unavailable",
            53 => "unwillingToPerform",
            54 => "loopDetect",
            64 => "namingViolation",
            65 => "objectClassViolation",
            66 => "notAllowedOnNonLeaf",
            67 => "notAllowedOnRDN",
            68 => "entryAlreadyExists",
            69 => "objectClassModsProhibited",
            71 => "affectsMultipleDSAs",
            80 => "other",
            88 => "abandoned",
            _ => "unknown",
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.0, self.description())
    }
}
