//! Index extensions: TREE (understood) and opaque others.

pub mod tree;

/// Raw extension (preserved verbatim for round-trip). Every extension other
/// than `TREE` is treated this way — the index carries whatever bytes it
/// found on read and re-emits them unchanged on write.
#[derive(Debug, Clone)]
pub struct RawExtension {
    pub signature: [u8; 4],
    pub data: Vec<u8>,
}
