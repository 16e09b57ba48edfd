pub mod db;
pub mod provision;

pub use provision::ProvisionError;
