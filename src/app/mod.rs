mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod types;

#[cfg(test)]
mod tests;

pub use orchestrator::LaserFenceApp;
pub use types::AppState;
