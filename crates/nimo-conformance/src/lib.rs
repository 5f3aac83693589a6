//! No library surface of its own — `tests/*.rs` drives the §8
//! end-to-end scenarios over a Registry spun up in-process.
