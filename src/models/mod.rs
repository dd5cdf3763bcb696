// Adventure domain models - the wire and storage shapes of a story graph

pub mod adventure;
pub mod catalog;
pub mod graph;
pub mod props;

pub use adventure::{Adventure, AdventureFields, AdventureListing, AdventureSkeleton};
pub use catalog::{Category, NodeStat, Report, ReportRequest, User};
pub use graph::{GraphRow, Link, Node};
pub use props::{AdventureProps, LinkProps, NodeProps, Props};
