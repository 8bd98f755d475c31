//! Session configuration
//!
//! Defaults follow the shipped profile (`exact` strategy, core theory pack
//! on); every knob can be overridden programmatically or through the stable
//! environment variables `HDC_STRATEGY`, `AUTO_LOAD_CORE`, `DEBUG_TRACE`,
//! and `REASONING_PRIORITY`.

use crate::hdc::{
    DEFAULT_DENSE_GEOMETRY, STRATEGY_DENSE_BINARY, STRATEGY_EXACT, STRATEGY_METRIC_AFFINE,
    STRATEGY_SPARSE_POLYNOMIAL,
};
use crate::kb::DEFAULT_MAX_FACTS;
use crate::reason::ProofOptions;
use crate::vocabulary::{DEFAULT_MAX_ATOMS, MAX_POSITIONS};
use serde::{Deserialize, Serialize};

/// Which engine leads when both could answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReasoningPriority {
    /// Symbolic search first, vectors as confirmation (default)
    #[default]
    SymbolicPriority,
    /// Vector decoding first, symbolic search as verification
    HolographicPriority,
}

impl std::str::FromStr for ReasoningPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "symbolicPriority" => Ok(ReasoningPriority::SymbolicPriority),
            "holographicPriority" => Ok(ReasoningPriority::HolographicPriority),
            other => Err(format!("Unknown reasoning priority: {}", other)),
        }
    }
}

/// Resource ceilings, all configurable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLimits {
    pub max_depth: usize,
    pub proof_timeout_ms: u64,
    pub max_reasoning_steps: usize,
    pub max_holes_per_query: usize,
    pub max_nesting_depth: usize,
    pub max_positions: usize,
    pub max_atoms: usize,
    pub max_facts: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_depth: 200,
            proof_timeout_ms: 5000,
            max_reasoning_steps: 1000,
            max_holes_per_query: 3,
            max_nesting_depth: 3,
            max_positions: MAX_POSITIONS,
            max_atoms: DEFAULT_MAX_ATOMS,
            max_facts: DEFAULT_MAX_FACTS,
        }
    }
}

/// Full session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Registered strategy id
    pub strategy_id: String,
    /// Vector geometry; 0 picks the strategy's default
    pub geometry: usize,
    /// Load the embedded core theory pack at construction
    pub auto_load_core: bool,
    /// Collect human-readable search traces
    pub debug_trace: bool,
    pub reasoning_priority: ReasoningPriority,
    /// Closed-world assumption for negation goals
    pub closed_world: bool,
    /// Reject unknown identifiers instead of auto-creating atoms
    pub strict_dependencies: bool,
    pub limits: ResourceLimits,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            strategy_id: STRATEGY_EXACT.to_string(),
            geometry: 0,
            auto_load_core: true,
            debug_trace: false,
            reasoning_priority: ReasoningPriority::default(),
            closed_world: false,
            strict_dependencies: false,
            limits: ResourceLimits::default(),
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by the stable environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(strategy) = std::env::var("HDC_STRATEGY") {
            if !strategy.is_empty() {
                config.strategy_id = strategy;
            }
        }
        if let Ok(auto) = std::env::var("AUTO_LOAD_CORE") {
            config.auto_load_core = parse_bool(&auto, config.auto_load_core);
        }
        if let Ok(trace) = std::env::var("DEBUG_TRACE") {
            config.debug_trace = parse_bool(&trace, config.debug_trace);
        }
        if let Ok(priority) = std::env::var("REASONING_PRIORITY") {
            if let Ok(parsed) = priority.parse() {
                config.reasoning_priority = parsed;
            }
        }
        config
    }

    /// Effective geometry: an explicit value wins, otherwise the strategy's
    /// production default
    pub fn effective_geometry(&self) -> usize {
        if self.geometry > 0 {
            return self.geometry;
        }
        match self.strategy_id.as_str() {
            STRATEGY_DENSE_BINARY => DEFAULT_DENSE_GEOMETRY,
            STRATEGY_SPARSE_POLYNOMIAL => 2048,
            STRATEGY_METRIC_AFFINE => 1024,
            _ => 0,
        }
    }

    /// Proof budgets and flags derived from this configuration
    pub fn proof_options(&self) -> ProofOptions {
        ProofOptions {
            max_depth: self.limits.max_depth,
            max_steps: self.limits.max_reasoning_steps,
            timeout_ms: self.limits.proof_timeout_ms,
            closed_world: self.closed_world,
            trace_enabled: self.debug_trace,
        }
    }
}

fn parse_bool(value: &str, fallback: bool) -> bool {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => fallback,
    }
}

// ============================================================================
// TESTS
// ============================================================================
