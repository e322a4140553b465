// guidestore-memory — in-memory document store adapter.
//
// HashMap-backed collections of JSON documents. Used as the test database,
// for local development, and as the reference adapter semantics.

pub mod adapter;

pub use adapter::MemoryAdapter;
