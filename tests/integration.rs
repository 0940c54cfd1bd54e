#[path = "integration/scheduler.rs"]
mod scheduler;
#[path = "integration/scripts.rs"]
mod scripts;
#[path = "integration/cli.rs"]
mod cli;
