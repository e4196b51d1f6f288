//! Generation tuning knobs.

/// Configuration for statement generation and mutation.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Probability of invoking a method on an existing variable instead
    /// of inserting a fresh callable.
    pub p_local_variables: f64,
    /// Probability of drawing a primitive literal from the constant
    /// pool instead of sampling a fresh one.
    pub p_constant_pool: f64,
    /// Whether the constant pool is consulted at all.
    pub use_constant_pool: bool,
    /// Hard cap on the number of statements in a test case; the only
    /// built-in safeguard against unbounded recursive generation.
    pub max_statements: usize,
    /// Lower bound for the target size when seeding fresh test cases.
    pub initial_statements: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            p_local_variables: 0.5,
            p_constant_pool: 0.3,
            use_constant_pool: true,
            max_statements: 25,
            initial_statements: 5,
        }
    }
}
