//! Filter compilation: keyword filters plus scope become an AND-conjunction
//! of typed conditions the document store can evaluate.

pub mod array_param;
pub mod compiler;
pub mod filter;
pub mod predicate;

pub use array_param::parse_array_parameter;
pub use compiler::{CompileMode, FilterCompiler};
pub use filter::{FilterRequest, Scope};
pub use predicate::{
    CompiledPredicate, Condition, DropReason, DroppedFilter, Operator, SortDirection, SortKey,
};
