// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Traits are Rust's way of defining shared behaviour —
// similar to interfaces in Java or abstract classes in Python.
//
// By programming against traits instead of concrete types,
// we can swap implementations without changing the code
// that uses them. For example:
//   - InMemorySource implements ShardSource
//   - A closure `|count, index| ...` implements ShardSource too,
//     thanks to the blanket impl below
//   - The shard writer only sees ShardSource and works with
//     both without any changes
//
// This is the Dependency Inversion Principle from SOLID,
// applied using Rust's trait system.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)
//            Rust Book §13 (Closures)

use crate::domain::record::Record;

// ─── ShardSource ──────────────────────────────────────────────────────────────
/// Any component that can hand out one shard's worth of records.
///
/// The writer asks for `shard(shard_count, shard_index)` once per shard
/// file; the source decides which records belong to that shard. Shards
/// must be disjoint and together cover the whole dataset, but the trait
/// itself does not enforce this.
pub trait ShardSource {
    type Iter: Iterator<Item = Record>;

    /// Records belonging to shard `shard_index` of `shard_count` total.
    fn shard(&self, shard_count: usize, shard_index: usize) -> Self::Iter;
}

/// Blanket impl so a plain closure can act as a shard source:
///
///   let source = |count: usize, index: usize| some_records(count, index);
///
/// Anything callable as `(usize, usize) -> IntoIterator<Item = Record>`
/// plugs directly into the writer.
impl<F, I> ShardSource for F
where
    F: Fn(usize, usize) -> I,
    I: IntoIterator<Item = Record>,
{
    type Iter = I::IntoIter;

    fn shard(&self, shard_count: usize, shard_index: usize) -> Self::Iter {
        self(shard_count, shard_index).into_iter()
    }
}

// ─── RecordTransform ──────────────────────────────────────────────────────────
/// A preprocessing hook applied to one blob (feature or label) right
/// before it is written. Applied at most once per record.
///
/// The lifetime parameter keeps the trait object's default bound tied
/// to the borrow at the use site instead of `'static`, so callers may
/// pass closures that capture by reference.
pub type RecordTransform<'a> = dyn Fn(Vec<u8>) -> Vec<u8> + 'a;
