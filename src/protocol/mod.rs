//! Declarations and protocol constants.
//!
//! - **[constants]** - attribute names, notification names, defaults
//! - **[declarations]** - resolution of element attributes into typed values
//!
//! # Examples
//!
//! ```
//! use sse_trigger::protocol::{constants, parse_name_list};
//!
//! assert_eq!(constants::attributes::SSE_SWAP, "sse-swap");
//! assert_eq!(parse_name_list("a, b"), vec!["a", "b"]);
//! ```

pub mod constants;
pub mod declarations;

pub use declarations::{
    attribute_value, has_attribute, oob_directive, parse_name_list, query_this_or_children,
    resolve_source, resolve_subscription, resolve_swap_targets, resolve_url, source_owners,
    StreamSource, SOURCE_VERBS,
};
