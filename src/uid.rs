//! Canonical tag identifiers and the allow-list.

use core::fmt::{self, Write as FmtWrite};

use heapless::{String, Vec};

use crate::config::MAX_ALLOWED_UIDS;
use crate::Error;

pub const UID_BYTES: usize = 4;
/// "XX XX XX XX" plus headroom, matching the transceiver's 20-byte text slot.
pub const UID_TEXT_LEN: usize = 19;

/// Tag UID in canonical text form: uppercase hex bytes separated by single
/// spaces ("DE AD BE EF").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagUid(String<UID_TEXT_LEN>);

impl TagUid {
    pub fn from_bytes(bytes: [u8; UID_BYTES]) -> Self {
        let mut text = String::new();
        for (i, byte) in bytes.iter().enumerate() {
            if i > 0 {
                let _ = text.push(' ');
            }
            // 11 chars always fit in UID_TEXT_LEN
            let _ = write!(text, "{:02X}", byte);
        }
        Self(text)
    }

    /// Parse a UID written as four hex bytes separated by whitespace, in any
    /// case ("de ad  be ef"). The result is canonical.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let mut bytes = [0u8; UID_BYTES];
        let mut count = 0;
        for part in s.split_whitespace() {
            if count >= UID_BYTES
                || part.len() != 2
                || !part.bytes().all(|b| b.is_ascii_hexdigit())
            {
                return Err(Error::InvalidUid);
            }
            bytes[count] = u8::from_str_radix(part, 16).map_err(|_| Error::InvalidUid)?;
            count += 1;
        }
        if count != UID_BYTES {
            return Err(Error::InvalidUid);
        }
        Ok(Self::from_bytes(bytes))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for TagUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of authorized UIDs. Read-only after construction.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    uids: Vec<TagUid, MAX_ALLOWED_UIDS>,
}

impl AllowList {
    /// Build from a comma-separated list of UIDs.
    ///
    /// Invalid entries and entries beyond capacity are logged and skipped;
    /// duplicates collapse.
    pub fn parse(list: &str) -> Self {
        let mut allow = Self::default();
        for entry in list.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            match TagUid::parse(entry) {
                Ok(uid) => {
                    if allow.contains(&uid) {
                        continue;
                    }
                    if allow.uids.push(uid).is_err() {
                        log::warn!(
                            "config: allow-list full ({} uids), ignoring {}",
                            MAX_ALLOWED_UIDS,
                            entry
                        );
                        break;
                    }
                }
                Err(e) => log::warn!("config: skipping allow-list entry {:?}: {}", entry, e),
            }
        }
        allow
    }

    pub fn contains(&self, uid: &TagUid) -> bool {
        self.uids.iter().any(|allowed| allowed == uid)
    }

    pub fn len(&self) -> usize {
        self.uids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagUid> {
        self.uids.iter()
    }
}
