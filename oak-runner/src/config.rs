use std::time::Duration;

/// Limits applied by the workflow runner and the default HTTP executor.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Upper bound on step executions per run, counting retries and `goto` jumps.
    pub max_step_executions: usize,
    /// Nesting limit for steps that invoke another workflow.
    pub max_workflow_depth: usize,
    pub http_timeout: Duration,
    pub max_response_bytes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_step_executions: 1000,
            max_workflow_depth: 8,
            http_timeout: Duration::from_secs(30),
            max_response_bytes: 4 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
        }
    }
}
