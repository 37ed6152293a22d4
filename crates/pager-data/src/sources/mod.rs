pub mod csv_source;
pub mod local_source;
pub mod sqlite_source;

pub use csv_source::CsvSource;
pub use local_source::LocalSource;
pub use sqlite_source::SqliteSource;
