pub mod handle_table;
