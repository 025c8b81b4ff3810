pub mod backend;
pub mod bounding_box;
pub mod box_extractor;
pub mod diagnostics;
pub mod fragment_merger;
pub mod gap_filler;
pub mod line_extraction;
pub mod nested_remover;
pub mod region_splitter;
pub mod render;
pub mod row_grouper;
pub mod statistics;
pub mod utils;
