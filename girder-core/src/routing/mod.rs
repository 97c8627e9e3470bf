//! Routing: templates, the route table and the matcher.
//!
//! Routes are matched by specificity, never by registration order. Each
//! template segment ranks literal > typed placeholder > untyped placeholder >
//! wildcard, and segments compare left to right; an explicit method beats
//! `ANY`; the route weight breaks any remaining tie. Two routes that still
//! score the same for a request make that request fail with
//! [`Error::AmbiguousRoute`](crate::Error::AmbiguousRoute).

mod constraint;
mod matcher;
mod registry;
mod table;
mod template;

pub use constraint::{
    AlphaConstraint, AlphaNumConstraint, ConstraintSet, EnumConstraint, FloatConstraint,
    IntConstraint, LengthConstraint, RangeConstraint, RegexConstraint, SegmentConstraint,
    SlugConstraint, UIntConstraint, UuidConstraint,
};
pub use matcher::{
    MatchOptions, MatchResult, RouteScore, Router, parse_query_string, split_path,
};
pub use registry::{RouteDeclaration, declared_routes};
pub use table::{MethodSet, RouteBuilder, RouteEntry, RouteId, RouteTable, Routes};
pub use template::{Ranks, RouteTemplate, Segment, SegmentRank};
