pub mod job;
pub mod results;
pub mod task;
pub mod wordcount;
pub mod worker;

pub use job::{JobDoneResponse, JobStatus};
pub use results::JobResults;
pub use task::{MapTask, Phase, ReduceTask, Task, TaskSeq};
pub use worker::{
    CompletionOutcome, TaskAssignment, TaskCompleteRequest, TaskCompleteResponse,
    TaskRequest, TaskRequeueRequest, TaskRequeueResponse, WorkerId,
};
