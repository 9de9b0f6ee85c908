pub mod chart;
pub mod error;
pub mod ingest;
pub mod report;
pub mod store;

pub mod util {
    pub mod env;
}
