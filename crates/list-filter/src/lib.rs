//! # list-filter
//!
//! Server-side filtering of Kubernetes-style list responses.  The gateway
//! lets clients narrow a `{"items": [...]}` payload with free-form query
//! parameters (`status=running`, `metadata.labels=env=prod`, ...) before it
//! is returned, so list pages stay small even against large clusters.
//!
//! The engine is a pure function over bytes: it performs no I/O and never
//! fails. A malformed body simply filters down to an empty item list.
//!
//! ## Quick start
//!
//! ```rust
//! use list_filter::{filter, FilterQuery};
//!
//! let body = br#"{"items": [{"status": "Running"}, {"status": "Stopped"}]}"#;
//! let query = FilterQuery::from_pairs([("status".to_string(), "run".to_string())]);
//! let out = filter(body, &query);
//! assert_eq!(out["totalItems"], 2);
//! assert_eq!(out["items"].as_array().unwrap().len(), 1);
//! ```

mod filter;
mod matcher;
mod value;

// Re-export the primary public API at the crate root.
pub use filter::{filter, FilterQuery};
pub use value::FieldValue;
