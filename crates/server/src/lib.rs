pub mod file_logging;
