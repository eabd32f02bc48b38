//! Process-wide Z3 parameters.
//!
//! Z3 rewriter options are global to the process, not per context, so they
//! are applied once no matter how many sessions get created.

use std::sync::Once;
use tracing::debug;

static GLOBAL_PARAMS: Once = Once::new();

/// Apply the global rewriter settings. Later calls are no-ops.
pub fn init_global_params() {
    GLOBAL_PARAMS.call_once(|| {
        z3::set_global_param("rewriter.pull_cheap_ite", "true");
        debug!("applied global Z3 params");
    });
}

/// Whether [`init_global_params`] has run in this process.
pub fn global_params_initialized() -> bool {
    GLOBAL_PARAMS.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_global_params();
        assert!(global_params_initialized());
        init_global_params();
        assert!(global_params_initialized());
    }
}
