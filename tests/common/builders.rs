//! Test pipeline builders

use lazyflow_rs::{Flow, PipelineError};
use std::time::Duration;

/// Builder for flows whose items each take a known time to process
pub struct DelayFlowBuilder {
    delays_ms: Vec<u64>,
    failing: Vec<u64>,
}

impl DelayFlowBuilder {
    pub fn new(delays_ms: &[u64]) -> Self {
        Self {
            delays_ms: delays_ms.to_vec(),
            failing: Vec::new(),
        }
    }

    /// Items with this delay fail instead of echoing
    pub fn fail_on(mut self, delay_ms: u64) -> Self {
        self.failing.push(delay_ms);
        self
    }

    /// Source of the raw delay values
    pub fn source(&self) -> Flow<u64> {
        Flow::from_iter(self.delays_ms.clone())
    }

    /// Attach the sleeping echo stage to `source`
    pub fn echo(&self, source: Flow<u64>) -> Flow<u64> {
        let failing = self.failing.clone();
        source.then(move |ms| {
            let fails = failing.contains(&ms);
            async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                if fails {
                    return Err(PipelineError::msg(format!("item {} failed", ms)));
                }
                Ok(ms)
            }
        })
    }

    pub fn concurrent(&self, preserve_order: bool) -> Flow<u64> {
        self.echo(self.source().as_concurrent(preserve_order))
    }

    pub fn parallel(&self, preserve_order: bool) -> Flow<u64> {
        self.echo(self.source().as_parallel(preserve_order))
    }

    pub fn sequential(&self) -> Flow<u64> {
        self.echo(self.source())
    }

    /// Items sorted by delay, the expected completion order
    pub fn by_completion(&self) -> Vec<u64> {
        let mut sorted = self.delays_ms.clone();
        sorted.sort_unstable();
        sorted
    }

    pub fn by_input(&self) -> Vec<u64> {
        self.delays_ms.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_orders() {
        let builder = DelayFlowBuilder::new(&[30, 10, 20]);
        assert_eq!(builder.by_completion(), vec![10, 20, 30]);
        assert_eq!(builder.by_input(), vec![30, 10, 20]);
    }
}
