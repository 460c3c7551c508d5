pub mod csv_export;
pub mod sheets;

pub use csv_export::CsvExport;
pub use sheets::SheetsPublisher;
