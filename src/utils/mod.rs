pub mod task_supervisor;
