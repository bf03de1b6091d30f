//! Big-endian box assembly, the writing counterpart of the demux reader.

/// Accumulates one box body; [`seal`](BoxWriter::seal) prepends the
/// `size | fourcc` header once the body is complete.
pub(crate) struct BoxWriter {
    buf: Vec<u8>,
}

impl BoxWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Body of a full box: version byte followed by 24-bit flags.
    pub fn full(version: u8, flags: u32) -> Self {
        let mut w = Self::new();
        w.u8(version);
        w.bytes(&flags.to_be_bytes()[1..]);
        w
    }

    pub fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn bytes(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    pub fn zeros(&mut self, count: usize) {
        self.buf.resize(self.buf.len() + count, 0);
    }

    /// Append an already sealed child box.
    pub fn child(&mut self, sealed: Vec<u8>) {
        self.buf.extend_from_slice(&sealed);
    }

    pub fn seal(self, fourcc: &[u8; 4]) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.buf.len());
        out.extend_from_slice(&(self.buf.len() as u32 + 8).to_be_bytes());
        out.extend_from_slice(fourcc);
        out.extend_from_slice(&self.buf);
        out
    }
}

/// MPEG-4 descriptor: tag byte, expandable base-128 length, body.
pub(crate) fn descriptor(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = body.len() as u32;
    let mut started = false;
    for shift in [21u32, 14, 7] {
        let part = ((len >> shift) & 0x7F) as u8;
        if part != 0 || started {
            out.push(part | 0x80);
            started = true;
        }
    }
    out.push((len & 0x7F) as u8);
    out.extend_from_slice(body);
    out
}
