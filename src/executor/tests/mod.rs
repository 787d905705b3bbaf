//! Executor 单元测试
//!
//! 测试生命周期状态机、任务队列、准入策略和优雅关闭

mod executor;
