// Ingestion: archive unpacking, DOCX→PDF conversion, text extraction, noise filters.

pub mod archive;
pub mod convert;
pub mod extractor;
pub mod normalizer;
