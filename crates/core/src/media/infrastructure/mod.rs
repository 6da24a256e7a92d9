pub mod snapshot_file_source;
