pub mod analyze_service;
pub mod merge_service;
