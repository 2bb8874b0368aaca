use async_trait::async_trait;
use tracing::{debug, trace};

use super::{Admission, IsolatedExecutor};
use crate::{
    error::ExecutorError,
    runner::{JobContext, JobTicket, run_job},
};

/// Runs each job as a tokio task of the current process.
///
/// Jobs share the process and its store connection. Operation panics are contained and
/// recorded, but a job that aborts the process takes every other job with it.
#[derive(Clone)]
pub struct TaskExecutor {
    ctx: JobContext,
    admission: Admission,
}

impl TaskExecutor {
    pub fn new(ctx: JobContext) -> Self {
        Self {
            ctx,
            admission: Admission::unbounded(),
        }
    }

    pub fn with_admission(mut self, admission: Admission) -> Self {
        self.admission = admission;
        self
    }
}

#[async_trait]
impl IsolatedExecutor for TaskExecutor {
    fn name(&self) -> &'static str {
        "task"
    }

    async fn launch(&self, ticket: JobTicket) -> Result<(), ExecutorError> {
        let ctx = self.ctx.clone();
        let admission = self.admission.clone();
        debug!(target: "cmdrun.job", job = %ticket.id, executor = "task", "launching");

        tokio::spawn(async move {
            let _permit = match admission.try_acquire() {
                Some(permit) => permit,
                None => {
                    trace!(target: "cmdrun.job", job = %ticket.id, "waiting for a free slot");
                    admission.acquire().await
                }
            };
            run_job(&ctx, &ticket).await;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use cmdrun_model::{JobId, StatusRecord};

    use super::*;
    use crate::{
        cache::MemoryCache,
        catalog::{Operation, OperationRegistry},
        error::OperationError,
        filter::{CommandIo, FlushPolicy},
        limits::StoreLimits,
        metrics::noop_metrics,
        store::StatusStore,
    };

    struct Sleepy;

    #[async_trait]
    impl Operation for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }
        async fn run(&self, _args: &[String], io: &mut CommandIo) -> Result<(), OperationError> {
            io.outln("start");
            tokio::time::sleep(Duration::from_millis(200)).await;
            io.outln("done");
            Ok(())
        }
    }

    fn context() -> JobContext {
        JobContext {
            store: StatusStore::new(Arc::new(MemoryCache::default()), StoreLimits::default()),
            catalog: Arc::new(OperationRegistry::new().with(Sleepy).unwrap()),
            flush: FlushPolicy::default(),
            metrics: noop_metrics(),
        }
    }

    async fn wait_finished(store: &StatusStore, ticket: &JobTicket) -> StatusRecord {
        for _ in 0..100 {
            if let Some(rec) = store.get(&ticket.key).unwrap()
                && rec.finished
            {
                return rec;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {} did not finish", ticket.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn launch_returns_before_job_finishes() {
        let ctx = context();
        let exec = TaskExecutor::new(ctx.clone());
        let ticket = JobTicket::new(JobId::generate(), "sleepy", vec![]);
        ctx.store.init(&ticket.key).unwrap();

        exec.launch(ticket.clone()).await.unwrap();
        assert!(!ctx.store.get(&ticket.key).unwrap().unwrap().finished);

        let rec = wait_finished(&ctx.store, &ticket).await;
        assert_eq!(rec.output, "start\ndone\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn admission_serialises_jobs_over_the_limit() {
        let ctx = context();
        let exec = TaskExecutor::new(ctx.clone()).with_admission(Admission::new(Some(1)));
        let first = JobTicket::new(JobId::generate(), "sleepy", vec![]);
        let second = JobTicket::new(JobId::generate(), "sleepy", vec![]);
        ctx.store.init(&first.key).unwrap();
        ctx.store.init(&second.key).unwrap();

        exec.launch(first.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        exec.launch(second.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The second job has not produced output yet: it waits for the slot.
        assert_eq!(
            ctx.store.get(&second.key).unwrap(),
            Some(StatusRecord::pending())
        );

        wait_finished(&ctx.store, &first).await;
        let rec = wait_finished(&ctx.store, &second).await;
        assert_eq!(rec.output, "start\ndone\n");
    }
}
