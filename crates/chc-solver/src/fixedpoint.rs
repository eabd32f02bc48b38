//! Minimal safe wrapper around the z3-sys fixedpoint (Spacer/IC3) API.

use crate::config::SessionConfig;
use crate::engine::{EngineAnswer, EngineFault, HornEngine};
use crate::{SolverError, SolverResult};
use std::ffi::{CStr, CString};
use z3::Context;

/// Wrapper around Z3's fixedpoint engine.
pub struct Fixedpoint {
    ctx: z3_sys::Z3_context,
    fp: z3_sys::Z3_fixedpoint,
}

impl Fixedpoint {
    /// Create a fixedpoint engine on the thread-local Z3 context.
    pub fn new(config: &SessionConfig) -> SolverResult<Self> {
        let ctx = Context::thread_local().get_z3_context();
        // Report errors through error codes instead of aborting.
        unsafe { z3_sys::Z3_set_error_handler(ctx, None) };

        let fp = unsafe { z3_sys::Z3_mk_fixedpoint(ctx) }
            .ok_or_else(|| SolverError::Z3(last_error_message(ctx)))?;
        unsafe { z3_sys::Z3_fixedpoint_inc_ref(ctx, fp) };

        let fixedpoint = Fixedpoint { ctx, fp };
        fixedpoint.set_params(config)?;
        Ok(fixedpoint)
    }

    fn set_params(&self, config: &SessionConfig) -> SolverResult<()> {
        let ctx = self.ctx;
        let params = unsafe { z3_sys::Z3_mk_params(ctx) }
            .ok_or_else(|| SolverError::Z3(last_error_message(ctx)))?;
        unsafe { z3_sys::Z3_params_inc_ref(ctx, params) };

        let result = (|| {
            let engine_key = self.symbol(c"engine")?;
            let engine_val = self.symbol(config.engine.param_value())?;
            unsafe { z3_sys::Z3_params_set_symbol(ctx, params, engine_key, engine_val) };

            let cert_key = self.symbol(c"print_certificate")?;
            unsafe { z3_sys::Z3_params_set_bool(ctx, params, cert_key, config.print_certificate) };

            if let Some(ms) = config.timeout_ms() {
                let timeout_key = self.symbol(c"timeout")?;
                unsafe { z3_sys::Z3_params_set_uint(ctx, params, timeout_key, ms) };
            }

            unsafe { z3_sys::Z3_fixedpoint_set_params(ctx, self.fp, params) };
            self.check_error().map_err(SolverError::Z3)
        })();

        unsafe { z3_sys::Z3_params_dec_ref(ctx, params) };
        result
    }

    fn symbol(&self, name: &CStr) -> SolverResult<z3_sys::Z3_symbol> {
        unsafe { z3_sys::Z3_mk_string_symbol(self.ctx, name.as_ptr()) }
            .ok_or_else(|| SolverError::Z3(last_error_message(self.ctx)))
    }

    /// Error message if the last API call on this context failed.
    fn check_error(&self) -> Result<(), String> {
        let code = unsafe { z3_sys::Z3_get_error_code(self.ctx) };
        if matches!(code, z3_sys::ErrorCode::Ok) {
            Ok(())
        } else {
            Err(last_error_message(self.ctx))
        }
    }

    /// Get the reason for an unknown result.
    pub fn get_reason_unknown(&self) -> String {
        let s = unsafe { z3_sys::Z3_fixedpoint_get_reason_unknown(self.ctx, self.fp) };
        if s.is_null() {
            return "(null)".to_string();
        }
        unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned()
    }
}

/// Message for the error code currently set on `ctx`.
fn last_error_message(ctx: z3_sys::Z3_context) -> String {
    let code = unsafe { z3_sys::Z3_get_error_code(ctx) };
    let msg = unsafe { z3_sys::Z3_get_error_msg(ctx, code) };
    if msg.is_null() {
        return format!("{:?}", code);
    }
    unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
}

impl HornEngine for Fixedpoint {
    fn create(config: &SessionConfig) -> SolverResult<Self> {
        Fixedpoint::new(config)
    }

    fn register_relation(&mut self, decl: z3_sys::Z3_func_decl) -> SolverResult<()> {
        unsafe { z3_sys::Z3_fixedpoint_register_relation(self.ctx, self.fp, decl) };
        self.check_error().map_err(SolverError::Z3)
    }

    fn add_rule(&mut self, rule: z3_sys::Z3_ast, name: &str) -> SolverResult<()> {
        let cname = CString::new(name)
            .map_err(|_| SolverError::Z3(format!("rule name {:?} contains NUL", name)))?;
        let sym = self.symbol(&cname)?;
        unsafe { z3_sys::Z3_fixedpoint_add_rule(self.ctx, self.fp, rule, sym) };
        self.check_error().map_err(SolverError::Z3)
    }

    fn query(&mut self, goal: z3_sys::Z3_ast) -> Result<EngineAnswer, EngineFault> {
        let answer = unsafe { z3_sys::Z3_fixedpoint_query(self.ctx, self.fp, goal) };
        self.check_error().map_err(EngineFault::new)?;
        match answer {
            z3_sys::Z3_L_TRUE => Ok(EngineAnswer::Reachable),
            z3_sys::Z3_L_FALSE => Ok(EngineAnswer::Unreachable),
            _ => Ok(EngineAnswer::Unknown {
                reason: self.get_reason_unknown(),
            }),
        }
    }

    fn dump(&self) -> String {
        let s = unsafe {
            z3_sys::Z3_fixedpoint_to_string(self.ctx, self.fp, 0, std::ptr::null_mut())
        };
        if s.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned()
    }
}

impl Drop for Fixedpoint {
    fn drop(&mut self) {
        unsafe { z3_sys::Z3_fixedpoint_dec_ref(self.ctx, self.fp) };
    }
}
