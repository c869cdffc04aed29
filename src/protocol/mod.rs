pub mod decode;
pub mod encode;
pub mod response;
pub mod scan;

#[cfg(test)]
mod decode_test;

/// First fragment of every envelope.
pub const ARRAY_OPEN: &str = "[\n";

/// Fragment emitted between consecutive row objects.
pub const ROW_SEPARATOR: &str = ",\n";

/// Terminal fragment of a well-formed envelope.
pub const ARRAY_CLOSE: &str = "\n]";
