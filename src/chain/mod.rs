mod metrics;
mod namer;
mod parent;

pub use metrics::{compute_total, ChangeMetric};
#[allow(unused_imports)]
pub use namer::{next_chain_name, next_name, next_root_name, normalize_user, root_prefix};
#[allow(unused_imports)]
pub use parent::{
    is_root_branch, resolve_parent, resolve_parent_from, split_numeric_suffix, ParentRef,
    FALLBACK_PARENT, ROOT_BRANCHES,
};
