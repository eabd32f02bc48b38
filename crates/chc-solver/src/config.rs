//! Session configuration.

use std::time::Duration;

/// Per-query timeout used when none is configured explicitly.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Which fixedpoint engine answers queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HornEngineKind {
    /// IC3/PDR-style unbounded model checking.
    #[default]
    Spacer,
    /// Bounded model checking; only finds derivations, never proves unreachability of
    /// unbounded systems.
    Bmc,
    /// Bottom-up Datalog evaluation over finite domains.
    Datalog,
}

impl HornEngineKind {
    /// Value of Z3's fixedpoint `engine` parameter.
    pub fn param_value(self) -> &'static std::ffi::CStr {
        match self {
            HornEngineKind::Spacer => c"spacer",
            HornEngineKind::Bmc => c"bmc",
            HornEngineKind::Datalog => c"datalog",
        }
    }
}

/// Which variables a rule is universally closed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quantification {
    /// Every constant declared in the session so far, whether or not it occurs in the rule.
    #[default]
    Session,
    /// Only the declared constants occurring in the rule.
    Minimal,
}

/// Settings fixed at session construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Per-query timeout enforced by the engine. `None` disables it.
    pub timeout: Option<Duration>,
    /// Ask the engine to produce derivation certificates.
    pub print_certificate: bool,
    pub engine: HornEngineKind,
    pub quantification: Quantification,
    /// Emit the full rule set at debug level before every query.
    pub trace_rules: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            timeout: Some(DEFAULT_QUERY_TIMEOUT),
            print_certificate: true,
            engine: HornEngineKind::default(),
            quantification: Quantification::default(),
            trace_rules: false,
        }
    }
}

impl SessionConfig {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_engine(mut self, engine: HornEngineKind) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_quantification(mut self, quantification: Quantification) -> Self {
        self.quantification = quantification;
        self
    }

    pub fn with_certificates(mut self, print_certificate: bool) -> Self {
        self.print_certificate = print_certificate;
        self
    }

    pub fn with_rule_trace(mut self, trace_rules: bool) -> Self {
        self.trace_rules = trace_rules;
        self
    }

    /// Timeout in milliseconds as Z3 expects it, saturating at `u32::MAX`.
    pub fn timeout_ms(&self) -> Option<u32> {
        self.timeout.map(|t| u32::try_from(t.as_millis()).unwrap_or(u32::MAX))
    }
}
