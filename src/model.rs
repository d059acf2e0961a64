//! The directory entry shape served to clients, and the projection from an
//! upstream service record into it.

use lazy_static::lazy_static;
use regex::Regex;

use crate::upstream::Service;
use crate::util::stable_uid;

/// A single phone-book entry, immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub uid: String,
    pub cn: String,
    pub telephone_number: String,
    pub dn: String,
    pub link: String,
    pub object_classes: &'static [&'static str],
}

const OBJECT_CLASSES: &[&str] = &["top", "inetOrgPerson"];

/// Two fixed entries, useful as test fixtures and as a smoke-test dataset
/// when no upstream is reachable.
pub fn build_static_entries(base_dn: &str) -> Vec<DirectoryEntry> {
    vec![
        DirectoryEntry {
            uid: "static-001".to_string(),
            cn: "AREDN Echo Test".to_string(),
            telephone_number: "sip:10.0.0.10".to_string(),
            dn: format!("uid=static-001,{base_dn}"),
            link: String::new(),
            object_classes: OBJECT_CLASSES,
        },
        DirectoryEntry {
            uid: "static-002".to_string(),
            cn: "AREDN Radio Room".to_string(),
            telephone_number: "sip:10.0.0.20".to_string(),
            dn: format!("uid=static-002,{base_dn}"),
            link: String::new(),
            object_classes: OBJECT_CLASSES,
        },
    ]
}

lazy_static! {
    static ref TRAILING_BRACKET_TAG: Regex = Regex::new(r"\s*\[[^\]]+\]\s*$").unwrap();
}

/// Strip one trailing bracketed marker like `" [phone]"` from a service name.
fn display_name(name: &str) -> String {
    TRAILING_BRACKET_TAG.replace(name, "").trim().to_string()
}

fn telephone_number(ip: &str, link: &str) -> String {
    if let Some(rest) = strip_sip_prefix(link) {
        let suffix = rest.replace('/', "");
        if suffix.is_empty() {
            format!("sip:{ip}")
        } else {
            format!("sip:{suffix}")
        }
    } else {
        format!("sip:{ip}")
    }
}

fn strip_sip_prefix(link: &str) -> Option<&str> {
    if link.len() >= 4 && link[..4].eq_ignore_ascii_case("sip:") {
        Some(&link[4..])
    } else {
        None
    }
}

/// Project upstream service records into directory entries, dropping any
/// record missing a name or an IP.
pub fn entries_from_services(services: &[Service], base_dn: &str) -> Vec<DirectoryEntry> {
    services
        .iter()
        .filter_map(|service| {
            let name = service.name.trim();
            let ip = service.ip.trim();
            if name.is_empty() || ip.is_empty() {
                return None;
            }
            let link = service.link.as_deref().unwrap_or("").trim().to_string();
            let uid = stable_uid(ip, name);
            Some(DirectoryEntry {
                dn: format!("uid={uid},{base_dn}"),
                uid,
                cn: display_name(name),
                telephone_number: telephone_number(ip, &link),
                link,
                object_classes: OBJECT_CLASSES,
            })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn service(name: &str, ip: &str, link: &str, protocol: &str) -> Service {
        Service {
            name: name.to_string(),
            ip: ip.to_string(),
            link: Some(link.to_string()),
            protocol: Some(protocol.to_string()),
        }
    }

    #[test]
    fn test_entry_projection() {
        let services = vec![service("Shack [phone]", "10.0.0.5", "sip:10.0.0.5", "phone")];
        let entries = entries_from_services(&services, "dc=local,dc=mesh");
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.cn, "Shack");
        assert_eq!(entry.telephone_number, "sip:10.0.0.5");
        assert_eq!(entry.dn, format!("uid={},dc=local,dc=mesh", entry.uid));
    }

    #[test]
    fn test_drops_empty_name_or_ip() {
        let services = vec![
            service("", "10.0.0.1", "", "phone"),
            service("No IP", "", "", "phone"),
        ];
        assert!(entries_from_services(&services, "dc=local,dc=mesh").is_empty());
    }

    #[test]
    fn test_telephone_number_falls_back_to_ip() {
        let services = vec![service("Plain", "10.0.0.9", "", "phone")];
        let entries = entries_from_services(&services, "dc=local,dc=mesh");
        assert_eq!(entries[0].telephone_number, "sip:10.0.0.9");
    }

    #[test]
    fn test_telephone_number_strips_slashes_from_link_suffix() {
        let services = vec![service("Slashy", "10.0.0.9", "sip://10.0.0.9:5060", "phone")];
        let entries = entries_from_services(&services, "dc=local,dc=mesh");
        assert_eq!(entries[0].telephone_number, "sip:10.0.0.9:5060");
    }

    #[test]
    fn test_static_entries_have_expected_shape() {
        let entries = build_static_entries("dc=local,dc=mesh");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].uid, "static-001");
        assert_eq!(entries[0].dn, "uid=static-001,dc=local,dc=mesh");
    }
}
