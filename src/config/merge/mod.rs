pub mod service;

pub use service::MergeService;
