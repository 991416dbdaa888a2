//! Integration tests for the pollen catalog

mod catalog_lifecycle;
mod image_fallback;
mod store_roundtrip;
