mod heap;

pub use heap::HeapManager;
