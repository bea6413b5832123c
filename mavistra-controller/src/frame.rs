/// One inbound frame: `IDENTIFIER` or `IDENTIFIER:PAYLOAD`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub identifier: &'a str,
    // Opaque bytes. Not interpreted by the command registry
    pub payload: Option<&'a [u8]>,
}

/// Parse a single complete frame as written by the peer.
///
/// Trailing CR/LF is tolerated and stripped. Returns `None` for frames that
/// are empty or whose identifier is empty or not valid UTF-8. The payload
/// may hold any bytes.
pub fn parse_frame(raw: &[u8]) -> Option<Frame<'_>> {
    let end = raw
        .iter()
        .rposition(|byte| !matches!(byte, b'\r' | b'\n'))
        .map_or(0, |last| last + 1);
    let raw = &raw[..end];
    if raw.is_empty() {
        return None;
    }

    let (identifier, payload) = match raw.iter().position(|&byte| byte == b':') {
        Some(colon) => (&raw[..colon], Some(&raw[colon + 1..])),
        None => (raw, None),
    };

    if identifier.is_empty() {
        return None;
    }

    Some(Frame {
        identifier: core::str::from_utf8(identifier).ok()?,
        payload,
    })
}
