//! Random test-case seeding.
//!
//! Produces fresh test cases for the initial population: pick a target
//! size uniformly between the configured bounds and insert random
//! statements until the target is reached or insertion stalls.

use crate::config::GenerationConfig;
use crate::context::{ConstantPool, TypeContext};
use crate::testcase::TestCase;
use rand::Rng;
use tracing::debug;

/// Consecutive failed insertions before a seed is returned as-is.
const MAX_STALLED_INSERTIONS: usize = 10;

/// Seeds test cases by random statement insertion.
pub struct RandomTestCaseGenerator<'a> {
    ctx: &'a dyn TypeContext,
    pool: &'a dyn ConstantPool,
    config: GenerationConfig,
    next_id: u32,
}

impl<'a> RandomTestCaseGenerator<'a> {
    pub fn new(
        ctx: &'a dyn TypeContext,
        pool: &'a dyn ConstantPool,
        config: GenerationConfig,
    ) -> Self {
        Self {
            ctx,
            pool,
            config,
            next_id: 0,
        }
    }

    /// Generate one fresh test case. The target length is drawn
    /// uniformly from `[initial_statements, max_statements)`; a test
    /// case may come back shorter when the catalog cannot supply
    /// enough insertable statements.
    pub fn generate(&mut self, rng: &mut impl Rng) -> TestCase {
        let id = self.next_id;
        self.next_id += 1;

        let target = rng.gen_range(self.config.initial_statements..self.config.max_statements);
        let mut tc = TestCase::new(id, self.config.clone());

        let mut stalled = 0;
        while tc.size() < target && stalled < MAX_STALLED_INSERTIONS {
            let before = tc.size();
            tc.insert_random_stmt(self.ctx, self.pool, rng);
            if tc.size() > before {
                stalled = 0;
            } else {
                stalled += 1;
            }
        }
        tc.cleanup();

        debug!(test = tc.id(), target, size = tc.size(), "seeded test case");
        tc
    }

    /// Generate a whole initial population.
    pub fn generate_population(&mut self, count: usize, rng: &mut impl Rng) -> Vec<TestCase> {
        (0..count).map(|_| self.generate(rng)).collect()
    }
}
