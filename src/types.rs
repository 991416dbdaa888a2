//! Core identifier types for the pollen catalog.

/// RecordId: opaque, unique record identity (decimal epoch milliseconds)
pub type RecordId = String;

/// ImageKey: identity of an image blob, or a URL used directly
pub type ImageKey = String;

/// EncodedImage: self-describing `data:` URI usable directly as an image source
pub type EncodedImage = String;
