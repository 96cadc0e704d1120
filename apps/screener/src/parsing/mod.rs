// Résumé parsing: schema rules, field extraction, profile synthesis.
// Everything here is synchronous and CPU-bound; callers run it on the blocking pool.

pub mod fields;
pub mod parser;
pub mod profile;
pub mod rules;
