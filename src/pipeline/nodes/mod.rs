//! Built-in pipeline operators.
//!
//! Each file adds a group of combinators to [`Flow`](crate::pipeline::Flow)
//! together with the [`Operator`](crate::pipeline::Operator) node behind them.

pub mod adapter;
pub mod concat;
pub mod join;
pub mod mode_override;
pub mod select_many;
pub mod sink;
pub mod source;
pub mod transform;

pub use adapter::Adapter;
pub use concat::Concat;
pub use join::{Join, JoinKey};
pub use mode_override::ModeOverride;
pub use select_many::SelectMany;
pub use source::SourceNode;
pub use transform::Transform;
